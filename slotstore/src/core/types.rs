//! In-memory data model shared by the store, the mutation log and the codec.
//!
//! Collections are insertion-ordered `Vec`s so that serialized saves are
//! deterministic. Uniqueness of keys, inventory names and item ids is kept by
//! the mutation rules and re-checked by [`crate::core::invariants`] on load.

use serde::{Deserialize, Serialize};

/// A single string-keyed, string-valued record outside the inventory model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralEntry {
    pub key: String,
    pub value: String,
}

/// One item stack inside an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique within the owning inventory.
    pub item_id: String,
    pub name: String,
    pub quantity: i64,
}

/// A named, ordered collection of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub name: String,
    pub items: Vec<Item>,
}

impl Inventory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.item_id == item_id)
    }
}

/// Complete persisted state: general entries plus inventories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub general: Vec<GeneralEntry>,
    #[serde(default)]
    pub inventories: Vec<Inventory>,
}

impl StoreData {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.general
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    pub fn inventory(&self, name: &str) -> Option<&Inventory> {
        self.inventories.iter().find(|inv| inv.name == name)
    }

    pub fn inventory_mut(&mut self, name: &str) -> Option<&mut Inventory> {
        self.inventories.iter_mut().find(|inv| inv.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.inventories.is_empty()
    }
}
