use std::fmt;

use crate::api::{ApiError, IndexRange};
use crate::chat::RoomId;

/// Work queued on a room session by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    LoadOlder(IndexRange),
    LoadTail,
    Reconcile,
    Send { text: String },
    Edit { created: i64, text: String },
    Delete { created: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    FirstPage,
    Older,
    Tail,
    Compare,
    Send,
    Edit,
    Delete,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncOp::FirstPage => "first page",
            SyncOp::Older => "older messages",
            SyncOp::Tail => "new messages",
            SyncOp::Compare => "compare",
            SyncOp::Send => "send",
            SyncOp::Edit => "edit",
            SyncOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of a session operation, published to the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The first page or a scroll-triggered page landed.
    OlderLoaded { room_id: RoomId, added: usize },
    /// Messages newer than the cached tail were merged.
    NewMessages { room_id: RoomId, added: usize },
    /// A compare round patched the cache.
    Reconciled {
        room_id: RoomId,
        updated: usize,
        removed: usize,
    },
    Sent { room_id: RoomId },
    Edited { room_id: RoomId, created: i64 },
    Deleted { room_id: RoomId, created: i64 },
    Failed {
        room_id: RoomId,
        op: SyncOp,
        error: ApiError,
    },
}

impl SyncEvent {
    pub fn room_id(&self) -> &str {
        match self {
            SyncEvent::OlderLoaded { room_id, .. }
            | SyncEvent::NewMessages { room_id, .. }
            | SyncEvent::Reconciled { room_id, .. }
            | SyncEvent::Sent { room_id }
            | SyncEvent::Edited { room_id, .. }
            | SyncEvent::Deleted { room_id, .. }
            | SyncEvent::Failed { room_id, .. } => room_id,
        }
    }
}
