//! In-memory chat server and helpers shared by the session tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatsync::api::{
    ApiError, ChatApi, CompareResponse, IndexRange, MessageRange, MessagesPage, RoomsPage,
    UpdatedDates,
};
use chatsync::chat::{
    AuthorId, CompareConfig, Content, Message, MessageDates, RoomKind, RoomSummary, SharedCache,
};
use chatsync::config::SyncConfig;
use chatsync::notify::{ChannelNotifier, Notice};
use chatsync::sync::{ChatSync, SyncEvent};
use tokio::sync::mpsc;

pub const ROOM: &str = "general";

/// Request names as recorded in [`FakeServer::calls`].
pub const READ_INDEX: &str = "read_index";
pub const READ_CREATED: &str = "read_created";
pub const COMPARE: &str = "compare";
pub const SEND: &str = "send";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";
pub const ROOMS: &str = "rooms";

#[derive(Debug, Default)]
pub struct FakeServer {
    /// Ascending by `created` per room.
    pub history: HashMap<String, Vec<Message>>,
    pub rooms: Vec<RoomSummary>,
    pub clock: i64,
    pub calls: Vec<&'static str>,
    pub failures: HashMap<&'static str, ApiError>,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

impl FakeServer {
    pub fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    pub fn messages(&self, room_id: &str) -> &[Message] {
        self.history.get(room_id).map_or(&[], Vec::as_slice)
    }

    pub fn post(&mut self, room_id: &str, author: AuthorId, text: &str) -> i64 {
        let created = self.tick();
        self.history
            .entry(room_id.to_string())
            .or_default()
            .push(Message {
                author_id: author,
                username: Some("peer".into()),
                content: Content::new(text),
                created,
                modified: None,
            });
        created
    }

    pub fn edit(&mut self, room_id: &str, created: i64, text: &str) -> Option<i64> {
        let modified = self.tick();
        let message = self
            .history
            .get_mut(room_id)?
            .iter_mut()
            .find(|m| m.created == created)?;
        message.content = Content::new(text);
        message.modified = Some(modified);
        Some(modified)
    }

    pub fn remove(&mut self, room_id: &str, created: i64) -> bool {
        let Some(history) = self.history.get_mut(room_id) else {
            return false;
        };
        let before = history.len();
        history.retain(|m| m.created != created);
        history.len() != before
    }
}

/// [`ChatApi`] over a [`FakeServer`], answering every request after `latency`.
#[derive(Debug, Clone)]
pub struct FakeApi {
    pub server: Arc<Mutex<FakeServer>>,
    pub latency: Duration,
}

impl FakeApi {
    pub fn new(latency: Duration) -> Self {
        Self {
            server: Arc::new(Mutex::new(FakeServer::default())),
            latency,
        }
    }

    pub fn server(&self) -> std::sync::MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap()
    }

    pub fn seed(&self, room_id: &str, count: usize) {
        let mut server = self.server();
        for i in 0..count {
            server.post(room_id, AuthorId::User("2".into()), &format!("hello {i}"));
        }
    }

    pub fn fail(&self, call: &'static str, error: ApiError) {
        self.server().failures.insert(call, error);
    }

    pub fn recover(&self, call: &'static str) {
        self.server().failures.remove(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.server().calls.clone()
    }

    async fn call<T>(
        &self,
        name: &'static str,
        handler: impl FnOnce(&mut FakeServer) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        {
            let mut server = self.server();
            server.calls.push(name);
            server.in_flight += 1;
            server.max_in_flight = server.max_in_flight.max(server.in_flight);
        }
        tokio::time::sleep(self.latency).await;

        let mut server = self.server();
        server.in_flight -= 1;
        if let Some(error) = server.failures.get(name) {
            return Err(error.clone());
        }
        handler(&mut *server)
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn read_messages(
        &self,
        room_id: &str,
        range: MessageRange,
    ) -> Result<MessagesPage, ApiError> {
        let name = match range {
            MessageRange::IndexRange(_) => READ_INDEX,
            MessageRange::CreatedRange(_) => READ_CREATED,
        };
        let room_id = room_id.to_string();
        self.call(name, move |server| {
            let history = server.messages(&room_id);
            let all_count = history.len() as u64;
            let messages = match range {
                MessageRange::IndexRange(IndexRange { min, max }) => {
                    let newest_first: Vec<&Message> = history.iter().rev().collect();
                    let mut page: Vec<Message> = newest_first
                        .iter()
                        .skip(min as usize)
                        .take((max - min + 1) as usize)
                        .map(|m| (*m).clone())
                        .collect();
                    page.reverse();
                    page
                }
                MessageRange::CreatedRange(range) => history
                    .iter()
                    .filter(|m| m.created >= range.min)
                    .filter(|m| range.max.map_or(true, |max| m.created <= max))
                    .cloned()
                    .collect(),
            };
            Ok(MessagesPage {
                messages,
                all_count,
            })
        })
        .await
    }

    async fn compare(
        &self,
        room_id: &str,
        to_compare: &[MessageDates],
    ) -> Result<CompareResponse, ApiError> {
        let room_id = room_id.to_string();
        let to_compare = to_compare.to_vec();
        self.call(COMPARE, move |server| {
            let history = server.messages(&room_id);
            let mut to_remove = Vec::new();
            let mut to_update = Vec::new();
            for dates in to_compare {
                match history.iter().find(|m| m.created == dates.created) {
                    None => to_remove.push(dates.created),
                    Some(message) if message.modified != dates.modified => {
                        to_update.push(message.clone())
                    }
                    Some(_) => {}
                }
            }
            Ok(CompareResponse {
                is_equal: to_remove.is_empty() && to_update.is_empty(),
                to_remove: (!to_remove.is_empty()).then_some(to_remove),
                to_update: (!to_update.is_empty()).then_some(to_update),
            })
        })
        .await
    }

    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), ApiError> {
        let room_id = room_id.to_string();
        let text = text.to_string();
        self.call(SEND, move |server| {
            server.post(&room_id, AuthorId::Own, &text);
            Ok(())
        })
        .await
    }

    async fn update_message(
        &self,
        room_id: &str,
        created: i64,
        text: &str,
    ) -> Result<UpdatedDates, ApiError> {
        let room_id = room_id.to_string();
        let text = text.to_string();
        self.call(UPDATE, move |server| {
            let modified = server.edit(&room_id, created, &text).ok_or(ApiError::Failed)?;
            Ok(UpdatedDates { created, modified })
        })
        .await
    }

    async fn delete_message(&self, room_id: &str, created: i64) -> Result<(), ApiError> {
        let room_id = room_id.to_string();
        self.call(DELETE, move |server| {
            if server.remove(&room_id, created) {
                Ok(())
            } else {
                Err(ApiError::Failed)
            }
        })
        .await
    }

    async fn read_rooms(&self, range: IndexRange) -> Result<RoomsPage, ApiError> {
        self.call(ROOMS, move |server| {
            let rooms = server
                .rooms
                .iter()
                .skip(range.min as usize)
                .take(range.len() as usize)
                .cloned()
                .collect();
            Ok(RoomsPage {
                rooms,
                all_count: server.rooms.len() as u64,
            })
        })
        .await
    }
}

pub fn room(id: &str, kind: RoomKind) -> RoomSummary {
    RoomSummary {
        id: id.to_string(),
        name: format!("#{id}"),
        kind,
    }
}

pub struct Harness {
    pub api: FakeApi,
    pub sync: ChatSync,
    pub cache: SharedCache,
    pub events: mpsc::UnboundedReceiver<SyncEvent>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        tail_interval_ms: 4000,
        compare_interval_ms: 8000,
        first_page: 20,
        page_size: 10,
    }
}

pub fn harness(latency: Duration) -> Harness {
    harness_with(latency, CompareConfig::default())
}

pub fn harness_with(latency: Duration, compare: CompareConfig) -> Harness {
    let api = FakeApi::new(latency);
    let cache = SharedCache::new();
    let (notifier, notices) = ChannelNotifier::channel();
    let (sync, events) = ChatSync::new(
        Arc::new(api.clone()),
        cache.clone(),
        Arc::new(notifier),
        sync_config(),
        compare,
    );
    Harness {
        api,
        sync: sync.with_seed(7),
        cache,
        events,
        notices,
    }
}

/// Wait for the next event, failing the test after a minute of virtual time.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("no sync event within a minute")
        .expect("event channel closed")
}

/// Skip events until one matches `pred`.
pub async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<SyncEvent>,
    pred: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

pub fn created_ids(cache: &SharedCache, room_id: &str) -> Vec<i64> {
    cache
        .snapshot(room_id)
        .map(|state| state.messages.iter().map(|m| m.created).collect())
        .unwrap_or_default()
}
