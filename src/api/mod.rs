use async_trait::async_trait;

pub use error::{ApiError, FAILED_TEXT, NO_RIGHT_TEXT, UNKNOWN_TEXT};
pub use http::HttpChatApi;
pub use wire::{
    CompareResponse, CreatedRange, IndexRange, MessageRange, MessagesPage, RoomsPage,
    UpdatedDates,
};

mod error;
mod http;
mod wire;

use crate::chat::MessageDates;

/// Typed request functions of the chat server.
///
/// Every call checks the `access` and `success` flags of the response
/// independently of the HTTP status.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// Messages by position (0 = newest) or by creation time.
    async fn read_messages(&self, room_id: &str, range: MessageRange)
        -> Result<MessagesPage, ApiError>;

    /// Ask the server which of `to_compare` changed or vanished.
    async fn compare(
        &self,
        room_id: &str,
        to_compare: &[MessageDates],
    ) -> Result<CompareResponse, ApiError>;

    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), ApiError>;

    async fn update_message(
        &self,
        room_id: &str,
        created: i64,
        text: &str,
    ) -> Result<UpdatedDates, ApiError>;

    async fn delete_message(&self, room_id: &str, created: i64) -> Result<(), ApiError>;

    async fn read_rooms(&self, range: IndexRange) -> Result<RoomsPage, ApiError>;
}

/// Reject blank message bodies before they reach the server.
pub fn validate_text(text: &str) -> Result<&str, ApiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Request("Message is empty".to_string()));
    }
    Ok(trimmed)
}
