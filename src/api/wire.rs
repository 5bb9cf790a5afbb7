use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;
use crate::chat::{Content, Message, MessageDates, RoomSummary};

/// Inclusive range of positions in a room's history, 0 being the newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub min: u64,
    pub max: u64,
}

impl IndexRange {
    pub fn new(min: u64, max: u64) -> Result<Self, ApiError> {
        if max < min {
            return Err(ApiError::Request(format!(
                "index range {min}..={max} is empty"
            )));
        }
        Ok(Self { min, max })
    }

    /// `count` positions starting at `min`, clipped to `all_count`.
    pub fn page(min: u64, count: u64, all_count: u64) -> Option<Self> {
        if count == 0 || min >= all_count {
            return None;
        }
        let max = (min + count).min(all_count) - 1;
        Some(Self { min, max })
    }

    pub fn len(&self) -> u64 {
        self.max - self.min + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRange {
    pub min: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageRange {
    IndexRange(IndexRange),
    CreatedRange(CreatedRange),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMessagesRequest<'a> {
    pub room_id: &'a str,
    #[serde(flatten)]
    pub range: MessageRange,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesPage {
    #[serde(default)]
    pub messages: Vec<Message>,
    pub all_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest<'a> {
    pub room_id: &'a str,
    pub to_compare: &'a [MessageDates],
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub is_equal: bool,
    #[serde(default)]
    pub to_remove: Option<Vec<i64>>,
    #[serde(default)]
    pub to_update: Option<Vec<Message>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage<'a> {
    pub content: &'a Content,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest<'a> {
    pub room_id: &'a str,
    pub message: NewMessage<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditedMessage<'a> {
    pub content: &'a Content,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest<'a> {
    pub room_id: &'a str,
    pub message: EditedMessage<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UpdatedDates {
    pub created: i64,
    pub modified: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UpdateResponse {
    pub dates: UpdatedDates,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest<'a> {
    pub room_id: &'a str,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRoomsRequest {
    pub index_range: IndexRange,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsPage {
    #[serde(default)]
    pub rooms: Vec<RoomSummary>,
    pub all_count: u64,
}

/// Decode a response body, checking the `access` and `success` flags before
/// the payload. `status_ok` is whether the HTTP status was a success.
pub fn unpack<T: DeserializeOwned>(status_ok: bool, body: &str) -> Result<T, ApiError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !status_ok => {
            return Err(ApiError::Unknown(format!("unexpected response: {body:.80}")))
        }
        Err(err) => return Err(err.into()),
    };

    if !status_ok {
        let message = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str);
        return Err(match message {
            Some(message) => ApiError::Response(message.to_string()),
            None => ApiError::Unknown("server returned an error status".to_string()),
        });
    }

    if value.get("access").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::AccessDenied);
    }
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Failed);
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::IgnoredAny;

    #[test]
    fn read_request_shapes() {
        let by_index = ReadMessagesRequest {
            room_id: "r1",
            range: MessageRange::IndexRange(IndexRange { min: 0, max: 19 }),
        };
        assert_eq!(
            serde_json::to_value(&by_index).unwrap(),
            serde_json::json!({"roomId": "r1", "indexRange": {"min": 0, "max": 19}})
        );

        let by_created = ReadMessagesRequest {
            room_id: "r1",
            range: MessageRange::CreatedRange(CreatedRange { min: 42, max: None }),
        };
        assert_eq!(
            serde_json::to_value(&by_created).unwrap(),
            serde_json::json!({"roomId": "r1", "createdRange": {"min": 42}})
        );
    }

    #[test]
    fn page_ranges_are_clipped() {
        assert_eq!(IndexRange::page(0, 20, 5), Some(IndexRange { min: 0, max: 4 }));
        assert_eq!(IndexRange::page(20, 10, 25), Some(IndexRange { min: 20, max: 24 }));
        assert_eq!(IndexRange::page(25, 10, 25), None);
        assert!(IndexRange::new(3, 2).is_err());
        assert_eq!(IndexRange { min: 2, max: 4 }.len(), 3);
    }

    #[test]
    fn access_and_success_flags() {
        let denied = unpack::<IgnoredAny>(true, r#"{"access":false,"success":false}"#);
        assert_eq!(denied.unwrap_err(), ApiError::AccessDenied);

        let failed = unpack::<IgnoredAny>(true, r#"{"access":true,"success":false}"#);
        assert_eq!(failed.unwrap_err(), ApiError::Failed);

        let page: MessagesPage =
            unpack(true, r#"{"access":true,"success":true,"messages":[],"allCount":3}"#).unwrap();
        assert_eq!(page.all_count, 3);
    }

    #[test]
    fn error_status_uses_server_message() {
        let err = unpack::<IgnoredAny>(false, r#"{"error":"Room not found"}"#).unwrap_err();
        assert_eq!(err, ApiError::Response("Room not found".into()));

        let err = unpack::<IgnoredAny>(false, "<html>502</html>").unwrap_err();
        assert!(matches!(err, ApiError::Unknown(_)));
    }

    #[test]
    fn compare_response_lists_are_optional() {
        let resp: CompareResponse =
            unpack(true, r#"{"access":true,"success":true,"isEqual":false,"toRemove":[4]}"#)
                .unwrap();
        assert_eq!(resp.to_remove, Some(vec![4]));
        assert_eq!(resp.to_update, None);
    }
}
