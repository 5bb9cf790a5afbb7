//! Scroll bookkeeping for a mounted chat view.
//!
//! Positions are stored as the distance from the bottom of the list, so a page
//! of older messages growing the list at the top leaves the view in place.
//! The controller is pure: it returns [`ScrollEffects`] and the caller applies
//! the patch to the cache, the scroll offset to the viewport and forwards any
//! page request to the room session.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::api::IndexRange;
use crate::chat::{ChatPatch, ChatState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub debounce_ms: u64,
    /// Distance from the bottom at which the "scroll to bottom" button appears.
    pub show_button_at: i64,
    /// Distance from the bottom at which it disappears again.
    pub hide_button_at: i64,
    /// Share of the scrollable range above the viewport's bottom that
    /// triggers loading older messages.
    pub load_older_ratio: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            show_button_at: 200,
            hide_button_at: 50,
            load_older_ratio: 0.75,
        }
    }
}

/// Geometry of the scrollable message list, DOM style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Total height of the content.
    pub scroll_height: i64,
    /// Height of the visible area.
    pub offset_height: i64,
    /// Offset of the visible area from the top of the content.
    pub scroll_top: i64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> i64 {
        (self.scroll_height - (self.offset_height + self.scroll_top)).max(0)
    }

    /// `scroll_top` that puts the bottom of the view `distance` above the
    /// bottom of the content.
    pub fn scroll_top_for(&self, distance: i64) -> i64 {
        (self.scroll_height - (self.offset_height + distance)).max(0)
    }

    pub fn scrollable(&self) -> i64 {
        (self.scroll_height - self.offset_height).max(0)
    }

    pub fn with_scroll_top(self, scroll_top: i64) -> Self {
        Self { scroll_top, ..self }
    }
}

/// What the caller has to do after a controller call.
#[derive(Debug, Clone, Default)]
pub struct ScrollEffects {
    pub scroll_top: Option<i64>,
    pub patch: ChatPatch,
    pub load_older: Option<IndexRange>,
}

impl ScrollEffects {
    pub fn is_empty(&self) -> bool {
        self.scroll_top.is_none() && self.patch.is_empty() && self.load_older.is_none()
    }

    fn to_bottom(viewport: Viewport, state: &ChatState) -> Self {
        let mut patch = ChatPatch::scroll_position(0);
        if state.is_new_messages {
            patch.is_new_messages = Some(false);
        }
        Self {
            scroll_top: Some(viewport.scroll_top_for(0)),
            patch,
            load_older: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrollController {
    config: ScrollConfig,
    page_size: u64,
    restored: bool,
    show_button: bool,
    loading_older: bool,
    /// State version of the last page requested by [`fill`](Self::fill).
    filled_at: Option<u64>,
    pending: Option<(Viewport, Instant)>,
}

impl ScrollController {
    pub fn new(config: ScrollConfig, page_size: u64) -> Self {
        Self {
            config,
            page_size,
            restored: false,
            show_button: false,
            loading_older: false,
            filled_at: None,
            pending: None,
        }
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub fn show_button(&self) -> bool {
        self.show_button
    }

    pub fn is_loading_older(&self) -> bool {
        self.loading_older
    }

    /// Place the view once the list is first attached with data.
    ///
    /// The very first visit of a room starts at the bottom; later visits
    /// restore the stored distance. Does nothing before the first page landed
    /// or after the view was already restored.
    pub fn restore(&mut self, state: &ChatState, viewport: Viewport) -> ScrollEffects {
        if self.restored || !state.initialized {
            return ScrollEffects::default();
        }
        self.restored = true;

        if state.is_first_load {
            let mut effects = ScrollEffects::to_bottom(viewport, state);
            effects.patch.is_first_load = Some(false);
            return effects;
        }

        let distance = state.scroll_position.clamp(0, viewport.scrollable());
        self.show_button = distance >= self.config.show_button_at;
        ScrollEffects {
            scroll_top: Some(viewport.scroll_top_for(distance)),
            ..ScrollEffects::default()
        }
    }

    /// Record a scroll event; it is handled once the debounce window passes
    /// without another one.
    pub fn on_scroll(&mut self, viewport: Viewport, now: Instant) {
        self.pending = Some((viewport, now));
    }

    /// When the pending scroll event becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .map(|(_, at)| at + Duration::from_millis(self.config.debounce_ms))
    }

    /// Handle the pending scroll event if its debounce window has passed.
    pub fn poll(&mut self, state: &ChatState, now: Instant) -> ScrollEffects {
        match self.deadline() {
            Some(deadline) if now >= deadline => {}
            _ => return ScrollEffects::default(),
        }
        let Some((viewport, _)) = self.pending.take() else {
            return ScrollEffects::default();
        };

        let distance = viewport.distance_from_bottom();
        let mut effects = ScrollEffects {
            patch: ChatPatch::scroll_position(distance),
            ..ScrollEffects::default()
        };

        if distance >= self.config.show_button_at {
            self.show_button = true;
        } else if distance <= self.config.hide_button_at {
            self.show_button = false;
            if state.is_new_messages {
                effects.patch.is_new_messages = Some(false);
            }
        }

        let scrollable = viewport.scrollable();
        // A list shorter than the view sits at the top already
        let near_top =
            scrollable == 0 || distance as f64 >= self.config.load_older_ratio * scrollable as f64;
        if near_top && !self.loading_older {
            effects.load_older =
                IndexRange::page(state.loaded_count(), self.page_size, state.all_count);
            self.loading_older = effects.load_older.is_some();
        }

        effects
    }

    /// Request older messages while the loaded ones do not fill the view.
    ///
    /// Such a view never scrolls, so no scroll event would ever reach the
    /// top. At most one page is requested per state version: a failed page is
    /// not retried until the room changes.
    pub fn fill(&mut self, state: &ChatState, viewport: Viewport) -> ScrollEffects {
        if !self.restored
            || self.loading_older
            || viewport.scrollable() > 0
            || self.filled_at == Some(state.version)
        {
            return ScrollEffects::default();
        }
        let load_older = IndexRange::page(state.loaded_count(), self.page_size, state.all_count);
        if load_older.is_some() {
            self.loading_older = true;
            self.filled_at = Some(state.version);
        }
        ScrollEffects {
            load_older,
            ..ScrollEffects::default()
        }
    }

    /// New messages were merged at the tail.
    ///
    /// Follows them when the user is not reading older history; otherwise the
    /// room keeps its `is_new_messages` flag.
    pub fn on_new_messages(&mut self, state: &ChatState, viewport: Viewport) -> ScrollEffects {
        if self.show_button || !self.restored {
            return ScrollEffects::default();
        }
        ScrollEffects::to_bottom(viewport, state)
    }

    /// The "scroll to bottom" button was pressed.
    pub fn scroll_to_bottom(&mut self, state: &ChatState, viewport: Viewport) -> ScrollEffects {
        self.pending = None;
        self.show_button = false;
        ScrollEffects::to_bottom(viewport, state)
    }

    /// A page request issued by [`poll`](Self::poll) finished, either way.
    pub fn finish_loading_older(&mut self) {
        self.loading_older = false;
    }
}
