use serde::{Deserialize, Serialize};

use super::RoomId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Public,
    Private,
    Single,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RoomKind,
}

/// Paginated list of rooms the user can see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomListState {
    pub rooms: Vec<RoomSummary>,
    pub all_count: u64,
}

impl RoomListState {
    pub fn loaded_count(&self) -> u64 {
        self.rooms.len() as u64
    }

    pub fn has_more(&self) -> bool {
        self.loaded_count() < self.all_count
    }

    /// Append a page of rooms, skipping ids already listed.
    pub fn apply_page(&mut self, rooms: Vec<RoomSummary>, all_count: u64) -> usize {
        let mut added = 0;
        for room in rooms {
            if !self.rooms.iter().any(|r| r.id == room.id) {
                self.rooms.push(room);
                added += 1;
            }
        }
        self.all_count = all_count.max(self.loaded_count());
        added
    }

    pub fn get(&self, id: &str) -> Option<&RoomSummary> {
        self.rooms.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomSummary {
        RoomSummary {
            id: id.to_string(),
            name: format!("room {id}"),
            kind: RoomKind::Public,
        }
    }

    #[test]
    fn pages_append_without_duplicates() {
        let mut list = RoomListState::default();
        assert_eq!(list.apply_page(vec![room("a"), room("b")], 3), 2);
        assert!(list.has_more());
        assert_eq!(list.apply_page(vec![room("b"), room("c")], 3), 1);
        assert!(!list.has_more());
        assert_eq!(list.get("c").map(|r| r.kind), Some(RoomKind::Public));
    }

    #[test]
    fn room_kind_wire_form() {
        let json = r#"{"id":"r1","name":"general","type":"single"}"#;
        let parsed: RoomSummary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, RoomKind::Single);
    }
}
