use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::{reduce, ChatPatch, ChatState, Message, RoomId, RoomListState, Transition};

/// Cache handle shared by the front end and the room sessions.
#[derive(Debug, Clone, Default)]
pub struct SharedCache(Arc<RwLock<MessageCache>>);

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write locks are only held for synchronous updates, never across an await.
    pub fn read(&self) -> RwLockReadGuard<'_, MessageCache> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, MessageCache> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of a room's state, taken under a short read lock.
    pub fn snapshot(&self, room_id: &str) -> Option<ChatState> {
        self.read().read(room_id).cloned()
    }
}

/// A result computed for a view that has since been reopened or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stale write to room {room_id}: generation {got}, current {current:?}")]
pub struct StaleWrite {
    pub room_id: RoomId,
    pub got: u64,
    pub current: Option<u64>,
}

/// In-memory per-room message store.
#[derive(Debug, Default)]
pub struct MessageCache {
    chats: HashMap<RoomId, ChatState>,
    rooms: RoomListState,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, room_id: &str) -> Option<&ChatState> {
        self.chats.get(room_id)
    }

    /// Insert `initial` for a room, replacing any previous entry.
    pub fn create(&mut self, room_id: &str, initial: ChatState) {
        self.chats.insert(room_id.to_string(), initial);
    }

    /// Shallow-merge `patch` into a room's state. Unknown rooms are ignored.
    pub fn update(&mut self, room_id: &str, patch: ChatPatch) -> bool {
        match self.chats.get_mut(room_id) {
            Some(state) => {
                let changed = patch.apply_to(state);
                if changed {
                    state.version += 1;
                }
                changed
            }
            None => false,
        }
    }

    /// Enter edit mode for `message`, or leave it when `on` is false.
    pub fn set_editable(&mut self, room_id: &str, on: bool, message: Option<Message>) -> bool {
        let transition = match (on, message) {
            (true, Some(message)) => Transition::EditStarted(message),
            _ => Transition::EditCleared,
        };
        let Some(state) = self.chats.get_mut(room_id) else {
            return false;
        };
        let next = reduce(state, transition);
        let changed = next.version != state.version;
        *state = next;
        changed
    }

    /// Register a newly mounted view on `room_id` and return its generation.
    ///
    /// The entry is created on first open and kept (with its scroll position
    /// and messages) for later mounts.
    pub fn open(&mut self, room_id: &str) -> u64 {
        let state = self.chats.entry(room_id.to_string()).or_default();
        state.generation += 1;
        state.generation
    }

    /// Run `transition` against the current state if `generation` is still
    /// the room's live one.
    pub fn apply(
        &mut self,
        room_id: &str,
        generation: u64,
        transition: Transition,
    ) -> Result<&ChatState, StaleWrite> {
        let state = match self.chats.get_mut(room_id) {
            Some(state) if state.generation == generation => state,
            other => {
                return Err(StaleWrite {
                    room_id: room_id.to_string(),
                    got: generation,
                    current: other.map(|s| s.generation),
                })
            }
        };
        *state = reduce(state, transition);
        Ok(state)
    }

    pub fn room_list(&self) -> &RoomListState {
        &self.rooms
    }

    pub fn room_list_mut(&mut self) -> &mut RoomListState {
        &mut self.rooms
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.chats.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{AuthorId, Content, Editable};

    fn own(created: i64) -> Message {
        Message {
            author_id: AuthorId::Own,
            username: None,
            content: Content::new("mine"),
            created,
            modified: None,
        }
    }

    #[test]
    fn open_creates_once_and_bumps_generation() {
        let mut cache = MessageCache::new();
        assert_eq!(cache.open("r"), 1);
        cache.update("r", ChatPatch::scroll_position(120));
        assert_eq!(cache.open("r"), 2);
        assert_eq!(cache.read("r").map(|s| s.scroll_position), Some(120));
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut cache = MessageCache::new();
        let first = cache.open("r");
        let second = cache.open("r");
        let err = cache
            .apply(
                "r",
                first,
                Transition::TailLoaded {
                    messages: vec![own(1)],
                    all_count: 1,
                },
            )
            .unwrap_err();
        assert_eq!(err.current, Some(second));
        assert!(cache.read("r").map_or(false, |s| s.messages.is_empty()));

        let state = cache
            .apply(
                "r",
                second,
                Transition::TailLoaded {
                    messages: vec![own(1)],
                    all_count: 1,
                },
            )
            .unwrap();
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn unknown_room_is_stale() {
        let mut cache = MessageCache::new();
        let err = cache.apply("nope", 1, Transition::EditCleared).unwrap_err();
        assert_eq!(err.current, None);
    }

    #[test]
    fn editable_toggles() {
        let mut cache = MessageCache::new();
        cache.create("r", ChatState::default());
        assert!(cache.set_editable("r", true, Some(own(3))));
        assert_eq!(
            cache.read("r").map(|s| s.editable.clone()),
            Some(Editable::Editing(own(3)))
        );
        assert!(cache.set_editable("r", false, None));
        assert!(!cache.set_editable("r", false, None));
    }

    #[test]
    fn update_is_shallow() {
        let mut cache = MessageCache::new();
        cache.create("r", ChatState::default());
        cache.update("r", ChatPatch::is_new_messages(true));
        let state = cache.read("r").unwrap();
        assert!(state.is_new_messages);
        assert!(state.is_first_load);
        assert_eq!(state.version, 1);
    }
}
