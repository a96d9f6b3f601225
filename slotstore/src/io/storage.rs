//! Slot-addressed blob storage.
//!
//! A slot is a named save destination. [`FsSlotStorage`] maps each slot to a
//! directory under a root, holding one save file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use super::atomic::write_atomic;

/// Byte storage keyed by slot id.
///
/// Slot ids handed to these methods have already been validated.
pub trait SlotStorage: Send + Sync {
    /// True if the slot holds a save.
    fn exists(&self, slot: &str) -> Result<bool>;
    /// Replace the slot's save. Must not expose a partially written save.
    fn write(&self, slot: &str, bytes: &[u8]) -> Result<()>;
    fn read(&self, slot: &str) -> Result<Vec<u8>>;
    /// Ids of all slots, sorted.
    fn list_slots(&self) -> Result<Vec<String>>;
    fn create_slot_if_absent(&self, slot: &str) -> Result<()>;
}

/// Filesystem storage: `<root>/<slot>/<file_name>`.
#[derive(Debug, Clone)]
pub struct FsSlotStorage {
    root: PathBuf,
    file_name: String,
}

impl FsSlotStorage {
    /// Open storage under `root`, creating the directory if missing.
    pub fn open(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create save directory {}", root.display()))?;
        Ok(Self {
            root,
            file_name: file_name.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_dir(&self, slot: &str) -> PathBuf {
        self.root.join(slot)
    }

    pub fn save_path(&self, slot: &str) -> PathBuf {
        self.slot_dir(slot).join(&self.file_name)
    }
}

impl SlotStorage for FsSlotStorage {
    fn exists(&self, slot: &str) -> Result<bool> {
        Ok(self.save_path(slot).is_file())
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn write(&self, slot: &str, bytes: &[u8]) -> Result<()> {
        let path = self.save_path(slot);
        write_atomic(&path, bytes).with_context(|| format!("write slot '{}'", slot))?;
        debug!(path = %path.display(), "slot written");
        Ok(())
    }

    fn read(&self, slot: &str) -> Result<Vec<u8>> {
        let path = self.save_path(slot);
        fs::read(&path).with_context(|| format!("read slot '{}' at {}", slot, path.display()))
    }

    fn list_slots(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("list save directory {}", self.root.display()));
            }
        };
        let mut slots = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("list save directory {}", self.root.display()))?;
            if entry.path().is_dir() {
                slots.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        slots.sort();
        Ok(slots)
    }

    fn create_slot_if_absent(&self, slot: &str) -> Result<()> {
        let dir = self.slot_dir(slot);
        fs::create_dir_all(&dir).with_context(|| format!("create slot directory {}", dir.display()))
    }
}
