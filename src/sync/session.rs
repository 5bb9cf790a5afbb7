//! Per-room sync session.
//!
//! A session owns the tail and compare timers of one open room together with
//! its command queue, and awaits a single request at a time. Tail loads,
//! compare rounds, page loads and send/edit/delete for a room are therefore
//! never in flight together. Results are committed through the reducer
//! against the cache state that is current when they arrive, tagged with the
//! generation of the view that started the session.

use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::event::{SyncCommand, SyncEvent, SyncOp};
use crate::api::{validate_text, ApiError, ChatApi, CreatedRange, IndexRange, MessageRange};
use crate::chat::{
    compare_generator, CompareConfig, Content, Message, RoomId, SharedCache, Transition,
};
use crate::config::SyncConfig;
use crate::notify::Notifier;

/// Message counts before and after a committed transition.
#[derive(Debug, Clone, Copy)]
struct Commit {
    before: usize,
    after: usize,
    /// Cached messages whose content or edit date changed.
    patched: usize,
    changed: bool,
}

pub(super) struct RoomSession {
    pub(super) room_id: RoomId,
    pub(super) generation: u64,
    pub(super) api: Arc<dyn ChatApi>,
    pub(super) cache: SharedCache,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) events: mpsc::UnboundedSender<SyncEvent>,
    pub(super) config: SyncConfig,
    pub(super) compare: CompareConfig,
    pub(super) rng: StdRng,
}

impl RoomSession {
    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SyncCommand>) {
        info!(room_id = %self.room_id, generation = self.generation, "room session started");

        let initialized = self
            .cache
            .snapshot(&self.room_id)
            .map_or(false, |state| state.initialized);
        if initialized {
            self.load_tail().await;
        } else {
            self.load_first_page().await;
        }

        let start = Instant::now();
        let tail_period = self.config.tail_interval();
        let compare_period = self.config.compare_interval();
        let mut tail = interval_at(start + tail_period, tail_period);
        let mut compare = interval_at(start + compare_period, compare_period);
        tail.set_missed_tick_behavior(MissedTickBehavior::Delay);
        compare.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = tail.tick() => self.load_tail().await,
                _ = compare.tick() => self.reconcile().await,
            }
        }

        info!(room_id = %self.room_id, generation = self.generation, "room session closed");
    }

    async fn handle(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::LoadOlder(range) => self.load_older(range, SyncOp::Older).await,
            SyncCommand::LoadTail => self.load_tail().await,
            SyncCommand::Reconcile => self.reconcile().await,
            SyncCommand::Send { text } => self.send(&text).await,
            SyncCommand::Edit { created, text } => self.edit(created, &text).await,
            SyncCommand::Delete { created } => self.delete(created).await,
        }
    }

    async fn load_first_page(&mut self) {
        let range = IndexRange {
            min: 0,
            max: self.config.first_page.max(1) - 1,
        };
        self.load_older(range, SyncOp::FirstPage).await;
    }

    async fn load_older(&mut self, range: IndexRange, op: SyncOp) {
        debug!(room_id = %self.room_id, min = range.min, max = range.max, "loading older messages");
        let page = match self
            .api
            .read_messages(&self.room_id, MessageRange::IndexRange(range))
            .await
        {
            Ok(page) => page,
            Err(error) => return self.fail(op, error),
        };

        let transition = Transition::OlderLoaded {
            messages: page.messages,
            all_count: page.all_count,
        };
        if let Some(commit) = self.commit(transition) {
            self.emit(SyncEvent::OlderLoaded {
                room_id: self.room_id.clone(),
                added: commit.after.saturating_sub(commit.before),
            });
        }
    }

    async fn load_tail(&mut self) {
        let Some(state) = self.cache.snapshot(&self.room_id) else {
            return;
        };
        if !state.initialized {
            return self.load_first_page().await;
        }

        let min = state.newest().map_or(0, |m| m.created + 1);
        let range = MessageRange::CreatedRange(CreatedRange { min, max: None });
        let page = match self.api.read_messages(&self.room_id, range).await {
            Ok(page) => page,
            Err(error) => return self.fail(SyncOp::Tail, error),
        };

        let transition = Transition::TailLoaded {
            messages: page.messages,
            all_count: page.all_count,
        };
        if let Some(commit) = self.commit(transition) {
            let added = commit.after.saturating_sub(commit.before);
            if added > 0 {
                self.emit(SyncEvent::NewMessages {
                    room_id: self.room_id.clone(),
                    added,
                });
            }
        }
    }

    async fn reconcile(&mut self) {
        let to_compare = match self.cache.snapshot(&self.room_id) {
            Some(state) if state.initialized && !state.messages.is_empty() => {
                compare_generator(&state.messages, &self.compare, &mut self.rng)
            }
            _ => return,
        };

        debug!(room_id = %self.room_id, count = to_compare.len(), "comparing messages");
        let response = match self.api.compare(&self.room_id, &to_compare).await {
            Ok(response) => response,
            Err(error) => return self.fail(SyncOp::Compare, error),
        };

        if response.is_equal {
            return;
        }
        let transition = Transition::Reconciled {
            is_equal: response.is_equal,
            to_update: response.to_update,
            to_remove: response.to_remove,
        };
        if let Some(commit) = self.commit(transition) {
            if commit.changed {
                self.emit(SyncEvent::Reconciled {
                    room_id: self.room_id.clone(),
                    updated: commit.patched,
                    removed: commit.before.saturating_sub(commit.after),
                });
            }
        }
    }

    async fn send(&mut self, text: &str) {
        let result = match validate_text(text) {
            Ok(text) => self.api.send_message(&self.room_id, text).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            return self.fail(SyncOp::Send, error);
        }

        self.emit(SyncEvent::Sent {
            room_id: self.room_id.clone(),
        });
        // No local echo: the message shows up with the tail load
        self.load_tail().await;
    }

    async fn edit(&mut self, created: i64, text: &str) {
        let text = match validate_text(text) {
            Ok(text) => text,
            Err(error) => return self.fail(SyncOp::Edit, error),
        };
        let dates = match self.api.update_message(&self.room_id, created, text).await {
            Ok(dates) => dates,
            Err(error) => return self.fail(SyncOp::Edit, error),
        };

        let transition = Transition::Edited {
            created: dates.created,
            content: Content::new(text),
            modified: dates.modified,
        };
        if self.commit(transition).is_some() {
            self.emit(SyncEvent::Edited {
                room_id: self.room_id.clone(),
                created,
            });
        }
    }

    async fn delete(&mut self, created: i64) {
        if let Err(error) = self.api.delete_message(&self.room_id, created).await {
            return self.fail(SyncOp::Delete, error);
        }
        if self.commit(Transition::Deleted { created }).is_some() {
            self.notifier.info("Message deleted");
            self.emit(SyncEvent::Deleted {
                room_id: self.room_id.clone(),
                created,
            });
        }
    }

    /// Apply `transition` to the live state of the room.
    ///
    /// Returns `None` when the view that owns this session was replaced.
    fn commit(&self, transition: Transition) -> Option<Commit> {
        let name = transition.name();
        let patches = matches!(transition, Transition::Reconciled { .. });
        let mut cache = self.cache.write();
        let before = cache.read(&self.room_id).map_or(0, |s| s.messages.len());
        let previous_version = cache.read(&self.room_id).map_or(0, |s| s.version);
        let previous = if patches {
            cache.read(&self.room_id).map(|s| s.messages.clone())
        } else {
            None
        };
        match cache.apply(&self.room_id, self.generation, transition) {
            Ok(state) => {
                let commit = Commit {
                    before,
                    after: state.messages.len(),
                    patched: previous.map_or(0, |previous| patched_rows(&previous, &state.messages)),
                    changed: state.version != previous_version,
                };
                debug!(
                    room_id = %self.room_id,
                    transition = name,
                    before = commit.before,
                    after = commit.after,
                    all_count = state.all_count,
                    "committed"
                );
                Some(commit)
            }
            Err(stale) => {
                debug!(%stale, transition = name, "discarding result");
                None
            }
        }
    }

    fn fail(&self, op: SyncOp, error: ApiError) {
        warn!(room_id = %self.room_id, %op, %error, "sync operation failed");
        self.notifier.error(&error.user_message());
        self.emit(SyncEvent::Failed {
            room_id: self.room_id.clone(),
            op,
            error,
        });
    }

    fn emit(&self, event: SyncEvent) {
        // The front end may already be gone during shutdown
        let _ = self.events.send(event);
    }
}

/// Messages present in both ascending lists whose content or edit date differ.
fn patched_rows(before: &[Message], after: &[Message]) -> usize {
    after
        .iter()
        .filter(|message| {
            before
                .binary_search_by_key(&message.created, |m| m.created)
                .map_or(false, |idx| before[idx] != **message)
        })
        .count()
}
