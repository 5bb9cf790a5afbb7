use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use chatsync::api::{ChatApi, HttpChatApi};
use chatsync::chat::{ChatPatch, ChatState, Editable, SharedCache};
use chatsync::config::Config;
use chatsync::notify::{ChannelNotifier, Notice, NoticeLevel};
use chatsync::scroll::{ScrollController, ScrollEffects, Viewport};
use chatsync::sync::{ChatSync, RoomHandle, SyncEvent, SyncOp};

/// Scroll units per terminal row.
pub const ROW_HEIGHT: i64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// The chat view currently mounted.
pub struct RoomView {
    pub handle: RoomHandle,
    pub scroll: ScrollController,
    /// Distance of the view's bottom from the bottom of the list.
    pub distance: i64,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub input: String,
    pub cursor_position: usize,
    /// Input is kept until the server answered the submit.
    pub submitting: bool,

    pub config: Config,
    pub sync: ChatSync,
    pub cache: SharedCache,
    pub room: Option<RoomView>,
    pub chat_rows: u16,
    pub status_messages: Vec<String>,

    event_rx: mpsc::UnboundedReceiver<SyncEvent>,
    notice_rx: mpsc::UnboundedReceiver<Notice>,
}

impl App {
    pub fn new(config: Config, auto_room: Option<&str>) -> Result<Self> {
        let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(&config.server)?);
        let cache = SharedCache::new();
        let (notifier, notice_rx) = ChannelNotifier::channel();
        let (sync, event_rx) = ChatSync::new(
            api,
            cache.clone(),
            Arc::new(notifier),
            config.sync,
            config.compare,
        );

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            cursor_position: 0,
            submitting: false,
            config,
            sync,
            cache,
            room: None,
            chat_rows: 0,
            status_messages: Vec::new(),
            event_rx,
            notice_rx,
        };

        app.add_status_message(format!(
            "chatsync v{} - server {}",
            env!("CARGO_PKG_VERSION"),
            app.config.server.base_url
        ));

        if let Some(room) = auto_room {
            app.join_room(room);
        }

        Ok(app)
    }

    pub async fn handle_input(&mut self, event: Event) -> Result<()> {
        if let Event::Key(key) = event {
            self.handle_key_event(key).await?;
        }
        Ok(())
    }

    async fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                }
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Editing;
                }
                KeyCode::Up => self.scroll_by(ROW_HEIGHT),
                KeyCode::Down => self.scroll_by(-ROW_HEIGHT),
                KeyCode::PageUp => self.scroll_by(10 * ROW_HEIGHT),
                KeyCode::PageDown => self.scroll_by(-10 * ROW_HEIGHT),
                KeyCode::End => self.scroll_to_bottom(),
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Enter => {
                    if !self.submitting {
                        self.submit_input().await?;
                    }
                }
                KeyCode::Char(c) => {
                    self.input.insert(self.cursor_position, c);
                    self.cursor_position += c.len_utf8();
                }
                KeyCode::Backspace => {
                    if let Some(c) = self.input[..self.cursor_position].chars().next_back() {
                        self.cursor_position -= c.len_utf8();
                        self.input.remove(self.cursor_position);
                    }
                }
                KeyCode::Delete => {
                    if self.cursor_position < self.input.len() {
                        self.input.remove(self.cursor_position);
                    }
                }
                KeyCode::Left => {
                    if let Some(c) = self.input[..self.cursor_position].chars().next_back() {
                        self.cursor_position -= c.len_utf8();
                    }
                }
                KeyCode::Right => {
                    if let Some(c) = self.input[self.cursor_position..].chars().next() {
                        self.cursor_position += c.len_utf8();
                    }
                }
                KeyCode::Home => {
                    self.cursor_position = 0;
                }
                KeyCode::End => {
                    self.cursor_position = self.input.len();
                }
                KeyCode::Esc => {
                    if let Some(room) = &self.room {
                        room.handle.cancel_edit();
                    }
                    self.clear_input();
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        Ok(())
    }

    async fn submit_input(&mut self) -> Result<()> {
        let input = self.input.trim().to_string();
        if input.is_empty() {
            return Ok(());
        }

        if input.starts_with('/') {
            self.handle_command(&input).await?;
            self.clear_input();
        } else if let Some(room) = &self.room {
            room.handle.submit(&input);
            self.submitting = true;
        } else {
            self.add_status_message("No room selected. Use /join <room> to open one.".to_string());
        }

        Ok(())
    }

    async fn handle_command(&mut self, input: &str) -> Result<()> {
        let parts: Vec<&str> = input[1..].split_whitespace().collect();
        if parts.is_empty() {
            return Ok(());
        }

        match parts[0].to_lowercase().as_str() {
            "join" | "j" => {
                if parts.len() != 2 {
                    self.add_status_message("Usage: /join <room>".to_string());
                    return Ok(());
                }
                self.join_room(parts[1]);
            }
            "leave" | "part" | "l" => {
                if let Some(room) = self.room.take() {
                    self.add_status_message(format!("Left room {}", room.handle.room_id()));
                    room.handle.close();
                } else {
                    self.add_status_message("No room to leave".to_string());
                }
            }
            "rooms" | "list" => {
                self.list_rooms().await;
            }
            "edit" | "e" => {
                self.edit_newest_own();
            }
            "delete" | "del" => {
                self.delete_message();
            }
            "help" | "h" | "commands" => {
                self.show_help();
            }
            "quit" | "q" | "exit" => {
                self.should_quit = true;
            }
            _ => {
                self.add_status_message(format!(
                    "Unknown command: {}. Type /help for available commands.",
                    parts[0]
                ));
            }
        }

        Ok(())
    }

    fn join_room(&mut self, room_id: &str) {
        if self.room.as_ref().map(|r| r.handle.room_id()) == Some(room_id) {
            return;
        }
        let handle = self.sync.open_room(room_id);
        info!(room_id, generation = handle.generation(), "joined room");
        self.room = Some(RoomView {
            handle,
            scroll: ScrollController::new(self.config.scroll, self.config.sync.page_size),
            distance: 0,
        });
        self.add_status_message(format!("Joined room {room_id}"));
    }

    async fn list_rooms(&mut self) {
        if self.sync.load_rooms().await.is_err() {
            return;
        }
        let lines: Vec<String> = {
            let cache = self.cache.read();
            let list = cache.room_list();
            list.rooms
                .iter()
                .map(|r| format!("  {} - {} ({:?})", r.id, r.name, r.kind))
                .chain(list.has_more().then(|| {
                    let remaining = list.all_count - list.loaded_count();
                    format!("  ... {remaining} more, /rooms again")
                }))
                .collect()
        };
        if lines.is_empty() {
            self.add_status_message("No rooms available".to_string());
            return;
        }
        self.add_status_message("Rooms:".to_string());
        for line in lines {
            self.add_status_message(line);
        }
    }

    fn edit_newest_own(&mut self) {
        let Some(state) = self.current_state() else {
            self.add_status_message("No room selected".to_string());
            return;
        };
        let Some(message) = state.newest_own().cloned() else {
            self.add_status_message("Nothing of yours to edit".to_string());
            return;
        };
        if let Some(room) = &self.room {
            room.handle.start_edit(message.clone());
        }
        self.input = message.content.text;
        self.cursor_position = self.input.len();
        self.input_mode = InputMode::Editing;
    }

    fn delete_message(&mut self) {
        let Some(state) = self.current_state() else {
            self.add_status_message("No room selected".to_string());
            return;
        };
        let target = match &state.editable {
            Editable::Editing(message) => Some(message.created),
            Editable::NotEditing => state.newest_own().map(|m| m.created),
        };
        let Some(created) = target else {
            self.add_status_message("Nothing of yours to delete".to_string());
            return;
        };
        if let Some(room) = &self.room {
            room.handle.delete(created);
        }
    }

    fn show_help(&mut self) {
        let help_text = [
            "chatsync commands:",
            "/join <room> - Open a room",
            "/leave - Close the current room",
            "/rooms - List rooms (repeat for the next page)",
            "/edit - Edit your newest message, Enter saves, Esc cancels",
            "/delete - Delete the message being edited or your newest one",
            "/help - Show this help",
            "/quit - Exit",
            "",
            "Keyboard:",
            "i=input mode, Esc=normal mode, q=quit (normal mode)",
            "Up/Down=scroll, PageUp/PageDown=fast scroll, End=jump to newest",
        ];
        for line in help_text {
            self.add_status_message(line.to_string());
        }
    }

    pub fn add_status_message(&mut self, message: String) {
        self.status_messages.push(format!(
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            message
        ));

        if self.status_messages.len() > 1000 {
            self.status_messages.remove(0);
        }
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
        self.submitting = false;
    }

    pub async fn on_tick(&mut self) -> Result<()> {
        while let Ok(notice) = self.notice_rx.try_recv() {
            let text = match notice.level {
                NoticeLevel::Info => notice.text,
                NoticeLevel::Error => format!("error: {}", notice.text),
            };
            self.add_status_message(text);
        }

        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_sync_event(event);
        }

        self.settle_scroll();
        Ok(())
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        debug!(?event, "sync event");
        let current = self.room.as_ref().map(|r| r.handle.room_id().to_string());
        if current.as_deref() != Some(event.room_id()) {
            return;
        }

        match event {
            SyncEvent::OlderLoaded { .. } => {
                if let Some(room) = &mut self.room {
                    room.scroll.finish_loading_older();
                }
            }
            SyncEvent::NewMessages { added, .. } => {
                let Some(state) = self.current_state() else {
                    return;
                };
                let viewport = self.viewport(&state);
                let effects = match &mut self.room {
                    Some(room) => room.scroll.on_new_messages(&state, viewport),
                    None => return,
                };
                if effects.is_empty() {
                    // Keep the rows the user is reading in place
                    let distance = self.room.as_ref().map_or(0, |r| r.distance);
                    self.set_distance(distance + added as i64 * ROW_HEIGHT);
                } else {
                    self.apply_effects(viewport, effects);
                }
            }
            SyncEvent::Sent { .. } | SyncEvent::Edited { .. } => {
                self.clear_input();
                self.input_mode = InputMode::Normal;
            }
            SyncEvent::Failed { op, .. } => match op {
                SyncOp::FirstPage | SyncOp::Older => {
                    if let Some(room) = &mut self.room {
                        room.scroll.finish_loading_older();
                    }
                }
                SyncOp::Send => self.clear_input(),
                // Edit mode stays on, so does its text
                SyncOp::Edit => self.submitting = false,
                SyncOp::Tail | SyncOp::Compare | SyncOp::Delete => {}
            },
            SyncEvent::Reconciled { .. } | SyncEvent::Deleted { .. } => {
                // Removed rows may leave the stored distance past the top
                let Some(state) = self.current_state() else {
                    return;
                };
                let scrollable = self.viewport(&state).scrollable();
                let distance = self.room.as_ref().map_or(0, |r| r.distance);
                if distance > scrollable {
                    self.set_distance(scrollable);
                }
            }
        }
    }

    /// Move the view and store the new position for the next visit.
    fn set_distance(&mut self, distance: i64) {
        let Some(room) = &mut self.room else {
            return;
        };
        room.distance = distance.max(0);
        self.cache
            .write()
            .update(room.handle.room_id(), ChatPatch::scroll_position(room.distance));
    }

    /// Restore the view once data is there and run due scroll events.
    fn settle_scroll(&mut self) {
        let Some(state) = self.current_state() else {
            return;
        };
        let viewport = self.viewport(&state);
        let now = Instant::now();
        let effects = match &mut self.room {
            Some(room) if !room.scroll.is_restored() => room.scroll.restore(&state, viewport),
            Some(room) => room.scroll.poll(&state, now),
            None => return,
        };
        self.apply_effects(viewport, effects);

        let Some(room) = &mut self.room else {
            return;
        };
        let effects = room.scroll.fill(&state, viewport);
        self.apply_effects(viewport, effects);
    }

    fn scroll_by(&mut self, delta: i64) {
        let Some(state) = self.current_state() else {
            return;
        };
        let viewport = self.viewport(&state);
        let Some(room) = &mut self.room else {
            return;
        };
        room.distance = (room.distance + delta).clamp(0, viewport.scrollable());
        let moved = viewport.with_scroll_top(viewport.scroll_top_for(room.distance));
        room.scroll.on_scroll(moved, Instant::now());
    }

    fn scroll_to_bottom(&mut self) {
        let Some(state) = self.current_state() else {
            return;
        };
        let viewport = self.viewport(&state);
        let effects = match &mut self.room {
            Some(room) => room.scroll.scroll_to_bottom(&state, viewport),
            None => return,
        };
        self.apply_effects(viewport, effects);
    }

    fn apply_effects(&mut self, viewport: Viewport, effects: ScrollEffects) {
        let Some(room) = &mut self.room else {
            return;
        };
        if let Some(top) = effects.scroll_top {
            room.distance = viewport.with_scroll_top(top).distance_from_bottom();
        }
        if !effects.patch.is_empty() {
            self.cache.write().update(room.handle.room_id(), effects.patch);
        }
        if let Some(range) = effects.load_older {
            room.handle.load_older(range);
        }
    }

    pub fn current_state(&self) -> Option<ChatState> {
        let room = self.room.as_ref()?;
        self.cache.snapshot(room.handle.room_id())
    }

    /// Geometry of the message pane in scroll units, one row per message.
    pub fn viewport(&self, state: &ChatState) -> Viewport {
        let base = Viewport {
            scroll_height: state.messages.len() as i64 * ROW_HEIGHT,
            offset_height: i64::from(self.chat_rows) * ROW_HEIGHT,
            scroll_top: 0,
        };
        let distance = self.room.as_ref().map_or(0, |r| r.distance);
        base.with_scroll_top(base.scroll_top_for(distance))
    }

    /// First row of the message list shown at the top of the pane.
    pub fn first_visible_row(&self, state: &ChatState) -> usize {
        (self.viewport(state).scroll_top / ROW_HEIGHT) as usize
    }

    pub fn show_scroll_button(&self) -> bool {
        self.room.as_ref().map_or(false, |r| r.scroll.show_button())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync::api::ApiError;
    use chatsync::chat::{AuthorId, Content, Message, Transition};
    use std::ops::RangeInclusive;
    use std::time::Duration;

    const ROOM: &str = "general";

    fn app(rows: u16) -> App {
        let mut config = Config::default();
        config.server.base_url = "http://127.0.0.1:9/".to_string();
        let mut app = App::new(config, Some(ROOM)).unwrap();
        app.chat_rows = rows;
        app
    }

    fn messages(created: RangeInclusive<i64>) -> Vec<Message> {
        created
            .map(|created| Message {
                author_id: AuthorId::User("2".into()),
                username: Some("bob".into()),
                content: Content::new(format!("m{created}")),
                created,
                modified: None,
            })
            .collect()
    }

    fn commit(app: &App, transition: Transition) {
        let generation = app.room.as_ref().unwrap().handle.generation();
        app.cache.write().apply(ROOM, generation, transition).unwrap();
    }

    fn typed(app: &mut App, text: &str) {
        app.input_mode = InputMode::Editing;
        app.input = text.to_string();
        app.cursor_position = text.len();
        app.submitting = true;
    }

    fn failed(room_id: &str, op: SyncOp) -> SyncEvent {
        SyncEvent::Failed {
            room_id: room_id.to_string(),
            op,
            error: ApiError::Failed,
        }
    }

    fn distance(app: &App) -> i64 {
        app.room.as_ref().unwrap().distance
    }

    #[tokio::test]
    async fn sent_message_clears_input() {
        let mut app = app(10);
        typed(&mut app, "hello");
        app.handle_sync_event(SyncEvent::Sent {
            room_id: ROOM.to_string(),
        });
        assert!(app.input.is_empty());
        assert!(!app.submitting);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn failed_send_clears_input() {
        let mut app = app(10);
        typed(&mut app, "hello");
        app.handle_sync_event(failed(ROOM, SyncOp::Send));
        assert!(app.input.is_empty());
        assert_eq!(app.cursor_position, 0);
        assert!(!app.submitting);
    }

    #[tokio::test]
    async fn failed_edit_keeps_text() {
        let mut app = app(10);
        typed(&mut app, "hello");
        app.handle_sync_event(failed(ROOM, SyncOp::Edit));
        assert_eq!(app.input, "hello");
        assert!(!app.submitting);
    }

    #[tokio::test]
    async fn events_of_other_rooms_are_ignored() {
        let mut app = app(10);
        typed(&mut app, "hello");
        app.handle_sync_event(failed("elsewhere", SyncOp::Send));
        assert_eq!(app.input, "hello");
        assert!(app.submitting);
    }

    #[tokio::test(start_paused = true)]
    async fn unfollowed_arrivals_keep_and_store_the_view() {
        let mut app = app(5);
        commit(
            &app,
            Transition::OlderLoaded {
                messages: messages(1..=20),
                all_count: 20,
            },
        );
        app.settle_scroll();
        assert_eq!(distance(&app), 0);

        app.scroll_by(10 * ROW_HEIGHT);
        tokio::time::advance(Duration::from_millis(250)).await;
        app.settle_scroll();
        assert!(app.show_scroll_button());
        assert_eq!(app.current_state().unwrap().scroll_position, 200);

        commit(
            &app,
            Transition::TailLoaded {
                messages: messages(21..=22),
                all_count: 22,
            },
        );
        app.handle_sync_event(SyncEvent::NewMessages {
            room_id: ROOM.to_string(),
            added: 2,
        });
        assert_eq!(distance(&app), 240);
        assert_eq!(app.current_state().unwrap().scroll_position, 240);

        commit(
            &app,
            Transition::Reconciled {
                is_equal: false,
                to_update: None,
                to_remove: Some((1..=12).collect()),
            },
        );
        app.handle_sync_event(SyncEvent::Reconciled {
            room_id: ROOM.to_string(),
            updated: 0,
            removed: 12,
        });
        // 10 rows left in a 5 row pane
        assert_eq!(distance(&app), 100);
        assert_eq!(app.current_state().unwrap().scroll_position, 100);
    }

    #[tokio::test]
    async fn short_room_pages_older_without_scrolling() {
        let mut app = app(30);
        commit(
            &app,
            Transition::OlderLoaded {
                messages: messages(41..=50),
                all_count: 50,
            },
        );
        app.settle_scroll();
        assert!(app.room.as_ref().unwrap().scroll.is_loading_older());
    }
}
