use serde::{Deserialize, Serialize};

/// Author of a message as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthorId {
    /// The logged-in user.
    Own,
    /// Server generated notices (joins, leaves, renames).
    Service,
    /// Another user.
    User(String),
}

impl From<String> for AuthorId {
    fn from(value: String) -> Self {
        match value.as_str() {
            "self" => AuthorId::Own,
            "service" => AuthorId::Service,
            _ => AuthorId::User(value),
        }
    }
}

impl From<AuthorId> for String {
    fn from(value: AuthorId) -> Self {
        match value {
            AuthorId::Own => "self".to_string(),
            AuthorId::Service => "service".to_string(),
            AuthorId::User(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub text: String,
}

impl Content {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub author_id: AuthorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub content: Content,
    /// Millisecond timestamp, unique per room.
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

impl Message {
    pub fn dates(&self) -> MessageDates {
        MessageDates {
            created: self.created,
            modified: self.modified,
        }
    }

    pub fn is_own(&self) -> bool {
        self.author_id == AuthorId::Own
    }

    /// Display name for the author column.
    pub fn display_author(&self) -> &str {
        match &self.author_id {
            AuthorId::Own => "you",
            AuthorId::Service => "*",
            AuthorId::User(id) => self.username.as_deref().unwrap_or(id),
        }
    }

    /// Take the edited content and modification date of `updated`.
    ///
    /// `created` stays as it is; a `modified` older than the current one is ignored.
    pub fn patch_from(&mut self, updated: &Message) {
        self.content = updated.content.clone();
        if updated.modified >= self.modified {
            self.modified = updated.modified;
        }
    }
}

/// Identity and edit date of a message, sent when reconciling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDates {
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_id_wire_form() {
        let json = r#"{"authorId":"self","content":{"text":"hi"},"created":10}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.author_id, AuthorId::Own);
        assert_eq!(msg.modified, None);

        let json = r#"{"authorId":"42","username":"ann","content":{"text":"yo"},"created":11,"modified":12}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.author_id, AuthorId::User("42".into()));
        assert_eq!(msg.display_author(), "ann");
        assert_eq!(msg.dates(), MessageDates { created: 11, modified: Some(12) });

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["authorId"], "42");
    }

    #[test]
    fn patch_keeps_created_and_newest_modified() {
        let mut msg = Message {
            author_id: AuthorId::Own,
            username: None,
            content: Content::new("old"),
            created: 5,
            modified: Some(9),
        };
        let stale = Message {
            content: Content::new("new"),
            created: 99,
            modified: Some(7),
            ..msg.clone()
        };
        msg.patch_from(&stale);
        assert_eq!(msg.created, 5);
        assert_eq!(msg.content.text, "new");
        assert_eq!(msg.modified, Some(9));
    }
}
