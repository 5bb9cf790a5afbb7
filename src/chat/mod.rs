pub use cache::{MessageCache, SharedCache, StaleWrite};
pub use compare::{compare_generator, CompareConfig};
pub use message::{AuthorId, Content, Message, MessageDates};
pub use reducer::{reduce, Transition};
pub use rooms::{RoomKind, RoomListState, RoomSummary};

mod cache;
mod compare;
mod message;
mod reducer;
mod rooms;

/// Server-side room identifier.
pub type RoomId = String;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Editable {
    #[default]
    NotEditing,
    Editing(Message),
}

impl Editable {
    pub fn message(&self) -> Option<&Message> {
        match self {
            Editable::NotEditing => None,
            Editable::Editing(message) => Some(message),
        }
    }
}

/// Cached view of one room's history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    /// Ascending by `created`; index 0 is the oldest loaded message.
    pub messages: Vec<Message>,
    pub all_count: u64,
    /// Distance from the bottom of the viewport.
    pub scroll_position: i64,
    pub is_first_load: bool,
    pub is_new_messages: bool,
    pub editable: Editable,
    /// Set once the first page has landed.
    pub initialized: bool,
    /// Bumped every time a view is opened on this room.
    pub generation: u64,
    /// Bumped on every transition that changed the state.
    pub version: u64,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            all_count: 0,
            scroll_position: 0,
            is_first_load: true,
            is_new_messages: false,
            editable: Editable::NotEditing,
            initialized: false,
            generation: 0,
            version: 0,
        }
    }
}

impl ChatState {
    pub fn newest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn loaded_count(&self) -> u64 {
        self.messages.len() as u64
    }

    pub fn has_older(&self) -> bool {
        self.loaded_count() < self.all_count
    }

    pub fn find(&self, created: i64) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&created, |m| m.created)
            .ok()
            .map(|idx| &self.messages[idx])
    }

    /// Newest message written by the current user.
    pub fn newest_own(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_own())
    }
}

/// Shallow update of a [`ChatState`]; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ChatPatch {
    pub messages: Option<Vec<Message>>,
    pub all_count: Option<u64>,
    pub scroll_position: Option<i64>,
    pub is_first_load: Option<bool>,
    pub is_new_messages: Option<bool>,
}

impl ChatPatch {
    pub fn scroll_position(position: i64) -> Self {
        Self {
            scroll_position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_new_messages(value: bool) -> Self {
        Self {
            is_new_messages: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_none()
            && self.all_count.is_none()
            && self.scroll_position.is_none()
            && self.is_first_load.is_none()
            && self.is_new_messages.is_none()
    }

    /// Merge into `state`, returning whether anything changed.
    pub fn apply_to(self, state: &mut ChatState) -> bool {
        let mut changed = false;
        if let Some(messages) = self.messages {
            changed |= state.messages != messages;
            state.messages = messages;
        }
        if let Some(all_count) = self.all_count {
            changed |= state.all_count != all_count;
            state.all_count = all_count;
        }
        if let Some(position) = self.scroll_position {
            changed |= state.scroll_position != position;
            state.scroll_position = position;
        }
        if let Some(first) = self.is_first_load {
            changed |= state.is_first_load != first;
            state.is_first_load = first;
        }
        if let Some(new) = self.is_new_messages {
            changed |= state.is_new_messages != new;
            state.is_new_messages = new;
        }
        changed
    }
}
