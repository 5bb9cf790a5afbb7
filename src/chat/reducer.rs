//! Pure transitions over [`ChatState`].
//!
//! Every write to the message cache is expressed as a [`Transition`] and
//! applied with [`reduce`] against the state that is current at write time,
//! never against a snapshot taken before a request was awaited.

use std::collections::HashSet;

use super::{ChatPatch, ChatState, Content, Editable, Message};

#[derive(Debug, Clone)]
pub enum Transition {
    /// A page of older messages arrived.
    OlderLoaded { messages: Vec<Message>, all_count: u64 },
    /// Messages newer than the newest cached one arrived.
    TailLoaded { messages: Vec<Message>, all_count: u64 },
    /// The server answered a compare request.
    Reconciled {
        is_equal: bool,
        to_update: Option<Vec<Message>>,
        to_remove: Option<Vec<i64>>,
    },
    /// An edit of our own message was accepted.
    Edited { created: i64, content: Content, modified: i64 },
    /// A message was deleted on the server.
    Deleted { created: i64 },
    EditStarted(Message),
    EditCleared,
    Patched(ChatPatch),
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::OlderLoaded { .. } => "older_loaded",
            Transition::TailLoaded { .. } => "tail_loaded",
            Transition::Reconciled { .. } => "reconciled",
            Transition::Edited { .. } => "edited",
            Transition::Deleted { .. } => "deleted",
            Transition::EditStarted(_) => "edit_started",
            Transition::EditCleared => "edit_cleared",
            Transition::Patched(_) => "patched",
        }
    }
}

/// Compute the state that follows `state` under `transition`.
///
/// `version` is bumped only when something actually changed, so an
/// unchanged version means the message list is untouched.
pub fn reduce(state: &ChatState, transition: Transition) -> ChatState {
    let mut next = state.clone();
    let changed = match transition {
        Transition::OlderLoaded { messages, all_count } => {
            let added = merge_messages(&mut next.messages, messages);
            let was_initialized = next.initialized;
            next.initialized = true;
            set_all_count(&mut next, all_count) || added > 0 || !was_initialized
        }
        Transition::TailLoaded { messages, all_count } => {
            let added = merge_messages(&mut next.messages, messages);
            if added > 0 {
                next.is_new_messages = true;
            }
            set_all_count(&mut next, all_count) || added > 0
        }
        Transition::Reconciled {
            is_equal,
            to_update,
            to_remove,
        } => compare_updater(&mut next, is_equal, to_update, to_remove),
        Transition::Edited {
            created,
            content,
            modified,
        } => {
            let mut changed = false;
            if let Ok(idx) = next.messages.binary_search_by_key(&created, |m| m.created) {
                let message = &mut next.messages[idx];
                message.content = content;
                if Some(modified) >= message.modified {
                    message.modified = Some(modified);
                }
                changed = true;
            }
            if next.editable != Editable::NotEditing {
                next.editable = Editable::NotEditing;
                changed = true;
            }
            changed
        }
        Transition::Deleted { created } => {
            let before = next.messages.len();
            next.messages.retain(|m| m.created != created);
            let removed = before - next.messages.len();
            if removed > 0 {
                next.all_count = next.all_count.saturating_sub(removed as u64);
            }
            let cleared = clear_edit_of(&mut next, |c| c == created);
            removed > 0 || cleared
        }
        Transition::EditStarted(message) => {
            let editing = Editable::Editing(message);
            let changed = next.editable != editing;
            next.editable = editing;
            changed
        }
        Transition::EditCleared => {
            let changed = next.editable != Editable::NotEditing;
            next.editable = Editable::NotEditing;
            changed
        }
        Transition::Patched(patch) => patch.apply_to(&mut next),
    };

    if changed {
        next.version += 1;
        next
    } else {
        state.clone()
    }
}

/// Patch cached messages with the outcome of a compare round.
///
/// Removals filter by `created` and keep relative order, updates replace
/// content and `modified` in place, and `all_count` drops by the number of
/// identities the server reported as removed.
fn compare_updater(
    state: &mut ChatState,
    is_equal: bool,
    to_update: Option<Vec<Message>>,
    to_remove: Option<Vec<i64>>,
) -> bool {
    if is_equal || (to_update.is_none() && to_remove.is_none()) {
        return false;
    }

    let mut changed = false;

    if let Some(to_remove) = to_remove {
        let removed: HashSet<i64> = to_remove.iter().copied().collect();
        let before = state.messages.len();
        state.messages.retain(|m| !removed.contains(&m.created));
        changed |= state.messages.len() != before;
        if !to_remove.is_empty() {
            state.all_count = state.all_count.saturating_sub(to_remove.len() as u64);
            changed = true;
        }
        changed |= clear_edit_of(state, |c| removed.contains(&c));
    }

    if let Some(to_update) = to_update {
        for updated in &to_update {
            if let Ok(idx) = state
                .messages
                .binary_search_by_key(&updated.created, |m| m.created)
            {
                let message = &mut state.messages[idx];
                if message != updated {
                    message.patch_from(updated);
                    changed = true;
                }
            }
        }
    }

    changed
}

fn set_all_count(state: &mut ChatState, all_count: u64) -> bool {
    let all_count = all_count.max(state.messages.len() as u64);
    let changed = state.all_count != all_count;
    state.all_count = all_count;
    changed
}

fn clear_edit_of(state: &mut ChatState, matches: impl Fn(i64) -> bool) -> bool {
    match &state.editable {
        Editable::Editing(message) if matches(message.created) => {
            state.editable = Editable::NotEditing;
            true
        }
        _ => false,
    }
}

/// Merge `incoming` into the ascending `messages`, returning how many new
/// identities were added. Duplicates patch the cached copy instead.
pub(crate) fn merge_messages(messages: &mut Vec<Message>, mut incoming: Vec<Message>) -> usize {
    if incoming.is_empty() {
        return 0;
    }
    incoming.sort_by_key(|m| m.created);
    incoming.dedup_by_key(|m| m.created);

    // Fast paths: a whole batch older than the window or newer than it
    let first = messages.first().map(|m| m.created);
    let last = messages.last().map(|m| m.created);
    let batch_first = incoming[0].created;
    let batch_last = incoming[incoming.len() - 1].created;

    if last.map_or(true, |last| batch_first > last) {
        let added = incoming.len();
        messages.extend(incoming);
        return added;
    }
    if first.map_or(false, |first| batch_last < first) {
        let added = incoming.len();
        incoming.append(messages);
        *messages = incoming;
        return added;
    }

    // Slow path: overlapping batch, insert one by one
    let mut added = 0;
    for message in incoming {
        match messages.binary_search_by_key(&message.created, |m| m.created) {
            Ok(idx) => messages[idx].patch_from(&message),
            Err(idx) => {
                messages.insert(idx, message);
                added += 1;
            }
        }
    }
    added
}
