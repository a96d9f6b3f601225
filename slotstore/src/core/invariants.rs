//! Structural invariants for store data that arrives from outside the queue.

use std::collections::HashSet;

use crate::core::types::StoreData;

/// Check invariants the mutation rules maintain but a decoded save may violate:
/// - General entry keys are non-empty and unique
/// - Inventory names are non-empty and unique
/// - Item ids are unique within their inventory
pub fn validate_invariants(data: &StoreData) -> Vec<String> {
    let mut errors = Vec::new();

    let mut keys = HashSet::new();
    for entry in &data.general {
        if entry.key.is_empty() {
            errors.push("general entry with empty key".to_string());
        } else if !keys.insert(entry.key.as_str()) {
            errors.push(format!("duplicate general key '{}'", entry.key));
        }
    }

    let mut names = HashSet::new();
    for inventory in &data.inventories {
        if inventory.name.is_empty() {
            errors.push("inventory with empty name".to_string());
        } else if !names.insert(inventory.name.as_str()) {
            errors.push(format!("duplicate inventory '{}'", inventory.name));
        }

        let mut ids = HashSet::new();
        for item in &inventory.items {
            if !ids.insert(item.item_id.as_str()) {
                errors.push(format!(
                    "{}: duplicate item id '{}'",
                    inventory.name, item.item_id
                ));
            }
        }
    }

    errors
}
