//! Deferred store mutations.
//!
//! Every write to a [`Store`](crate::store::Store) is captured as a
//! [`Mutation`] value, queued, and later applied by whichever thread drains the
//! queue. Applying is pure in-memory work with no I/O.

use tracing::debug;

use crate::core::types::{GeneralEntry, Inventory, Item, StoreData};

/// A queued write against [`StoreData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or overwrite a general entry.
    SetValue { key: String, value: String },
    /// Create an empty inventory; no-op if one with this name exists.
    CreateInventory { name: String },
    /// Create an item, or update an existing one.
    ///
    /// For an existing item `name` renames it and `quantity_delta` is added to
    /// the current quantity. A new item takes `name` (default empty) and
    /// `quantity_delta` (default 0) as its initial values. A missing inventory
    /// makes this a no-op.
    UpsertItem {
        inventory: String,
        item_id: String,
        name: Option<String>,
        quantity_delta: Option<i64>,
    },
    /// Delete an inventory with all its items; no-op if absent.
    RemoveInventory { name: String },
}

impl Mutation {
    /// Apply this mutation to `data`.
    ///
    /// Fails only on quantity overflow, in which case `data` is left unchanged.
    pub fn apply(self, data: &mut StoreData) -> Result<(), String> {
        match self {
            Mutation::SetValue { key, value } => {
                match data.general.iter_mut().find(|entry| entry.key == key) {
                    Some(entry) => entry.value = value,
                    None => data.general.push(GeneralEntry { key, value }),
                }
                Ok(())
            }
            Mutation::CreateInventory { name } => {
                if data.inventory(&name).is_none() {
                    data.inventories.push(Inventory::new(name));
                }
                Ok(())
            }
            Mutation::UpsertItem {
                inventory,
                item_id,
                name,
                quantity_delta,
            } => {
                let Some(target) = data.inventory_mut(&inventory) else {
                    debug!(%inventory, %item_id, "upsert skipped: inventory missing");
                    return Ok(());
                };
                match target.item_mut(&item_id) {
                    Some(item) => {
                        if let Some(delta) = quantity_delta {
                            item.quantity = item.quantity.checked_add(delta).ok_or_else(|| {
                                format!(
                                    "quantity overflow for item '{}' in inventory '{}': {} + {}",
                                    item_id, inventory, item.quantity, delta
                                )
                            })?;
                        }
                        if let Some(name) = name {
                            item.name = name;
                        }
                    }
                    None => target.items.push(Item {
                        item_id,
                        name: name.unwrap_or_default(),
                        quantity: quantity_delta.unwrap_or(0),
                    }),
                }
                Ok(())
            }
            Mutation::RemoveInventory { name } => {
                data.inventories.retain(|inv| inv.name != name);
                Ok(())
            }
        }
    }
}
