use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use event::{SyncCommand, SyncEvent, SyncOp};

mod event;
mod session;

use crate::api::{ApiError, ChatApi, IndexRange};
use crate::chat::{CompareConfig, Editable, Message, RoomId, SharedCache};
use crate::config::SyncConfig;
use crate::notify::Notifier;
use session::RoomSession;

/// Entry point of the sync engine: opens room sessions and loads the room list.
pub struct ChatSync {
    api: Arc<dyn ChatApi>,
    cache: SharedCache,
    notifier: Arc<dyn Notifier>,
    events: mpsc::UnboundedSender<SyncEvent>,
    config: SyncConfig,
    compare: CompareConfig,
    seed: Option<u64>,
}

impl ChatSync {
    pub fn new(
        api: Arc<dyn ChatApi>,
        cache: SharedCache,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
        compare: CompareConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let sync = Self {
            api,
            cache,
            notifier,
            events,
            config,
            compare,
            seed: None,
        };
        (sync, events_rx)
    }

    /// Seed the compare sampling of every session opened from now on.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Mount a view on `room_id` and start its session.
    ///
    /// Results of sessions opened earlier for the same room are discarded from
    /// here on, even if their requests are still in flight.
    pub fn open_room(&self, room_id: &str) -> RoomHandle {
        let generation = self.cache.write().open(room_id);
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(generation)),
            None => StdRng::from_entropy(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let session = RoomSession {
            room_id: room_id.to_string(),
            generation,
            api: Arc::clone(&self.api),
            cache: self.cache.clone(),
            notifier: Arc::clone(&self.notifier),
            events: self.events.clone(),
            config: self.config,
            compare: self.compare,
            rng,
        };
        let task = tokio::spawn(session.run(rx));
        debug!(room_id, generation, "opened room");

        RoomHandle {
            room_id: room_id.to_string(),
            generation,
            cache: self.cache.clone(),
            commands: tx,
            task,
        }
    }

    /// Fetch the next page of the room list into the cache.
    pub async fn load_rooms(&self) -> Result<usize, ApiError> {
        let (loaded, all_count, known) = {
            let cache = self.cache.read();
            let list = cache.room_list();
            (list.loaded_count(), list.all_count, list.loaded_count() > 0)
        };
        let bound = if known { all_count } else { u64::MAX };
        let Some(range) = IndexRange::page(loaded, self.config.first_page.max(1), bound) else {
            return Ok(0);
        };

        match self.api.read_rooms(range).await {
            Ok(page) => Ok(self
                .cache
                .write()
                .room_list_mut()
                .apply_page(page.rooms, page.all_count)),
            Err(error) => {
                warn!(%error, "loading rooms failed");
                self.notifier.error(&error.user_message());
                Err(error)
            }
        }
    }
}

/// A mounted chat view. Dropping it stops the room's timers.
#[derive(Debug)]
pub struct RoomHandle {
    room_id: RoomId,
    generation: u64,
    cache: SharedCache,
    commands: mpsc::UnboundedSender<SyncCommand>,
    task: JoinHandle<()>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn load_older(&self, range: IndexRange) {
        self.queue(SyncCommand::LoadOlder(range));
    }

    pub fn load_tail(&self) {
        self.queue(SyncCommand::LoadTail);
    }

    pub fn reconcile(&self) {
        self.queue(SyncCommand::Reconcile);
    }

    /// Send `text`, or save it as the new content of the message being edited.
    pub fn submit(&self, text: &str) {
        let editing = self
            .cache
            .snapshot(&self.room_id)
            .and_then(|state| match state.editable {
                Editable::Editing(message) => Some(message.created),
                Editable::NotEditing => None,
            });
        let command = match editing {
            Some(created) => SyncCommand::Edit {
                created,
                text: text.to_string(),
            },
            None => SyncCommand::Send {
                text: text.to_string(),
            },
        };
        self.queue(command);
    }

    pub fn delete(&self, created: i64) {
        self.queue(SyncCommand::Delete { created });
    }

    pub fn start_edit(&self, message: Message) {
        self.cache
            .write()
            .set_editable(&self.room_id, true, Some(message));
    }

    pub fn cancel_edit(&self) {
        self.cache.write().set_editable(&self.room_id, false, None);
    }

    /// Stop the session. In-flight requests are dropped with it.
    pub fn close(self) {}

    fn queue(&self, command: SyncCommand) {
        if self.commands.send(command).is_err() {
            warn!(room_id = %self.room_id, "room session is gone");
        }
    }
}

impl Drop for RoomHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
