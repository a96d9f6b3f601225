//! Test-only storage doubles and deterministic sample stores.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};

use crate::core::types::{GeneralEntry, Inventory, Item, StoreData};
use crate::io::storage::SlotStorage;
use crate::store::Store;

/// In-memory [`SlotStorage`]. Clones share the same slots.
///
/// A slot created but never written is `None`, mirroring an empty directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<BTreeMap<String, Option<Vec<u8>>>>>,
}

impl MemoryStorage {
    /// Store raw bytes in a slot, bypassing any codec.
    pub fn put_raw(&self, slot: &str, bytes: &[u8]) -> Result<()> {
        self.create_slot_if_absent(slot)?;
        self.write(slot, bytes)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Option<Vec<u8>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SlotStorage for MemoryStorage {
    fn exists(&self, slot: &str) -> Result<bool> {
        Ok(matches!(self.slots().get(slot), Some(Some(_))))
    }

    fn write(&self, slot: &str, bytes: &[u8]) -> Result<()> {
        let mut slots = self.slots();
        let entry = slots
            .get_mut(slot)
            .with_context(|| format!("slot '{}' not created", slot))?;
        *entry = Some(bytes.to_vec());
        Ok(())
    }

    fn read(&self, slot: &str) -> Result<Vec<u8>> {
        self.slots()
            .get(slot)
            .cloned()
            .flatten()
            .with_context(|| format!("read slot '{}'", slot))
    }

    fn list_slots(&self) -> Result<Vec<String>> {
        Ok(self.slots().keys().cloned().collect())
    }

    fn create_slot_if_absent(&self, slot: &str) -> Result<()> {
        self.slots().entry(slot.to_string()).or_insert(None);
        Ok(())
    }
}

/// Storage whose every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStorage;

impl SlotStorage for FailingStorage {
    fn exists(&self, _slot: &str) -> Result<bool> {
        Err(anyhow!("storage unavailable"))
    }

    fn write(&self, _slot: &str, _bytes: &[u8]) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }

    fn read(&self, _slot: &str) -> Result<Vec<u8>> {
        Err(anyhow!("storage unavailable"))
    }

    fn list_slots(&self) -> Result<Vec<String>> {
        Err(anyhow!("storage unavailable"))
    }

    fn create_slot_if_absent(&self, _slot: &str) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }
}

/// Deterministic data: two general entries and one inventory with two items.
pub fn sample_data() -> StoreData {
    StoreData {
        general: vec![
            GeneralEntry {
                key: "level".to_string(),
                value: "3".to_string(),
            },
            GeneralEntry {
                key: "player".to_string(),
                value: "Ada".to_string(),
            },
        ],
        inventories: vec![Inventory {
            name: "backpack".to_string(),
            items: vec![
                Item {
                    item_id: "sword".to_string(),
                    name: "Sword".to_string(),
                    quantity: 1,
                },
                Item {
                    item_id: "potion".to_string(),
                    name: "Potion".to_string(),
                    quantity: 5,
                },
            ],
        }],
    }
}

/// A [`Store`] holding [`sample_data`].
pub fn sample_store() -> Store {
    Store::from_data(sample_data())
}
