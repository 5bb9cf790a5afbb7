//! Chat client core: a cached, paginated message window per room that is kept
//! in step with the server by tail polling and periodic compare rounds.
//!
//! # Components
//!
//! - [`chat`]: message cache, pure transitions, compare sampling, room list
//! - [`api`]: typed request functions and their HTTP implementation
//! - [`sync`]: per-room sessions owning the polling timers
//! - [`scroll`]: scroll restoration, auto-follow and page triggers
//! - [`notify`]: user notices
//! - [`config`]: TOML configuration

pub mod api;
pub mod chat;
pub mod config;
pub mod notify;
pub mod scroll;
pub mod sync;
