//! Read model published by the supervisor after every event

use crate::model::item_state::ItemState;
use crate::model::session_state::SessionState;
use crate::model::upload_file::ItemId;
use serde::{Deserialize, Serialize};

/// Point-in-time view of one upload item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    pub size: u64,
    pub state: ItemState,
}

/// Point-in-time view of a whole session, suitable for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Percentage in `0..=100`, absent until a cycle has started
    pub progress: Option<u8>,
    pub loaded: u64,
    pub total: u64,
    pub items: Vec<ItemSnapshot>,
}

impl SessionSnapshot {
    pub fn item(&self, id: ItemId) -> Option<&ItemSnapshot> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of items whose state matches the predicate
    pub fn count_items(&self, predicate: impl Fn(&ItemState) -> bool) -> usize {
        self.items.iter().filter(|item| predicate(&item.state)).count()
    }

    /// Names and messages of the items that failed
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.items
            .iter()
            .filter_map(|item| item.state.error().map(|e| (item.name.as_str(), e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, state: ItemState) -> ItemSnapshot {
        ItemSnapshot {
            id: ItemId::from(id),
            name: format!("file-{}", id),
            size: 10,
            state,
        }
    }

    #[test]
    fn test_count_and_failures() {
        let snapshot = SessionSnapshot {
            state: SessionState::Error,
            progress: Some(50),
            loaded: 10,
            total: 20,
            items: vec![item(1, ItemState::Uploaded), item(2, ItemState::Error("boom".into()))],
        };

        assert_eq!(snapshot.count_items(ItemState::is_terminal), 2);
        assert_eq!(snapshot.failures(), vec![("file-2", "boom")]);
        assert!(snapshot.item(ItemId::from(1)).is_some());
        assert!(snapshot.item(ItemId::from(3)).is_none());
    }

    #[test]
    fn test_json_shape() {
        let snapshot = SessionSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "idle");
        assert!(json["progress"].is_null());
    }
}
