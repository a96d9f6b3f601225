//! Slot identifier rules.
//!
//! Slot ids become directory names under the save root, so anything that could
//! escape the root or collide with temp files is rejected up front.

/// Return a description of why `slot` is not a usable slot id, if it is not.
pub fn slot_id_error(slot: &str) -> Option<String> {
    if slot.trim().is_empty() {
        return Some("slot id must be non-empty".to_string());
    }
    if slot.starts_with('.') {
        return Some(format!("slot id '{}' must not start with '.'", slot));
    }
    if slot.chars().any(|c| matches!(c, '/' | '\\' | '\0')) {
        return Some(format!(
            "slot id '{}' must not contain path separators",
            slot
        ));
    }
    None
}
