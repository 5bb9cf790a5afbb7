use async_trait::async_trait;
use reqwest::Url;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

use super::wire::{
    unpack, CompareRequest, CompareResponse, DeleteRequest, EditedMessage, IndexRange,
    MessageRange, MessagesPage, NewMessage, ReadMessagesRequest, ReadRoomsRequest, RoomsPage,
    SendRequest, UpdateRequest, UpdateResponse, UpdatedDates,
};
use super::{validate_text, ApiError, ChatApi};
use crate::chat::{Content, MessageDates};
use crate::config::ServerConfig;

/// [`ChatApi`] over HTTP+JSON.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpChatApi {
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let mut base = config.base_url.clone();
        // Url::join drops the last path segment without a trailing slash
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ApiError::Request(format!("invalid server url {base}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Request(format!("invalid path {path}: {e}")))?;

        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(path, %status, bytes = text.len(), "chat api response");
        trace!(path, body = %text);

        unpack(status.is_success(), &text)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn read_messages(
        &self,
        room_id: &str,
        range: MessageRange,
    ) -> Result<MessagesPage, ApiError> {
        if let MessageRange::IndexRange(range) = range {
            IndexRange::new(range.min, range.max)?;
        }
        self.post("messages/read", &ReadMessagesRequest { room_id, range })
            .await
    }

    async fn compare(
        &self,
        room_id: &str,
        to_compare: &[MessageDates],
    ) -> Result<CompareResponse, ApiError> {
        self.post("messages/compare", &CompareRequest { room_id, to_compare })
            .await
    }

    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), ApiError> {
        let content = Content::new(validate_text(text)?);
        let _: IgnoredAny = self
            .post(
                "messages/send",
                &SendRequest {
                    room_id,
                    message: NewMessage { content: &content },
                },
            )
            .await?;
        Ok(())
    }

    async fn update_message(
        &self,
        room_id: &str,
        created: i64,
        text: &str,
    ) -> Result<UpdatedDates, ApiError> {
        let content = Content::new(validate_text(text)?);
        let response: UpdateResponse = self
            .post(
                "messages/update",
                &UpdateRequest {
                    room_id,
                    message: EditedMessage {
                        content: &content,
                        created,
                    },
                },
            )
            .await?;
        Ok(response.dates)
    }

    async fn delete_message(&self, room_id: &str, created: i64) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .post("messages/delete", &DeleteRequest { room_id, created })
            .await?;
        Ok(())
    }

    async fn read_rooms(&self, range: IndexRange) -> Result<RoomsPage, ApiError> {
        IndexRange::new(range.min, range.max)?;
        self.post("rooms/read", &ReadRoomsRequest { index_range: range })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_its_path() {
        let config = ServerConfig {
            base_url: "http://localhost:8080/api".to_string(),
            ..ServerConfig::default()
        };
        let api = HttpChatApi::new(&config).unwrap();
        assert_eq!(
            api.base_url.join("messages/read").unwrap().as_str(),
            "http://localhost:8080/api/messages/read"
        );
    }

    #[test]
    fn bad_url_is_a_request_error() {
        let config = ServerConfig {
            base_url: "not a url".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            HttpChatApi::new(&config),
            Err(ApiError::Request(_))
        ));
    }
}
