//! Save/load orchestration over a shared [`Store`].
//!
//! Save and load each pause the store's mutation queue so they work on a
//! quiescent state, and both run under one lock so they never interleave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::slot::slot_id_error;
use crate::io::codec::{Codec, JsonCodec};
use crate::io::config::PersistenceConfig;
use crate::io::storage::{FsSlotStorage, SlotStorage};
use crate::store::Store;

/// Result of [`Persistence::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Slot existed; the store now holds its contents.
    Loaded,
    /// Slot holds no save; the store was left untouched.
    NotFound,
}

impl LoadOutcome {
    pub fn is_loaded(self) -> bool {
        self == LoadOutcome::Loaded
    }
}

/// Persistence context owning the storage and codec for one [`Store`].
pub struct Persistence<S, C = JsonCodec> {
    store: Arc<Store>,
    storage: S,
    codec: C,
    lock: Mutex<()>,
}

impl Persistence<FsSlotStorage, JsonCodec> {
    /// Filesystem persistence as described by `cfg`.
    pub fn from_config(store: Arc<Store>, cfg: &PersistenceConfig) -> Result<Self> {
        cfg.validate()?;
        let storage = FsSlotStorage::open(&cfg.save_dir, cfg.file_name.clone())?;
        let codec = JsonCodec {
            pretty: cfg.pretty_json,
        };
        Ok(Self::new(store, storage, codec))
    }
}

impl<S, C> Persistence<S, C>
where
    S: SlotStorage,
    C: Codec,
{
    pub fn new(store: Arc<Store>, storage: S, codec: C) -> Self {
        Self {
            store,
            storage,
            codec,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write every mutation submitted before this call to `slot`.
    ///
    /// Mutations submitted after the queue is paused are not part of the
    /// save. On failure any previous save in the slot stays intact.
    #[instrument(skip(self))]
    pub fn save(&self, slot: &str) -> Result<()> {
        check_slot(slot)?;
        let _guard = self.exclusive();

        let pause = self
            .store
            .pause()
            .context("apply pending mutations before save")?;
        let snapshot = self.store.snapshot();
        drop(pause);

        self.storage.create_slot_if_absent(slot)?;
        let bytes = self
            .codec
            .encode(&snapshot)
            .with_context(|| format!("encode slot '{}'", slot))?;
        self.storage.write(slot, &bytes)?;
        info!(
            entries = snapshot.general.len(),
            inventories = snapshot.inventories.len(),
            bytes = bytes.len(),
            "saved"
        );
        Ok(())
    }

    /// Replace the store's state with the contents of `slot`.
    ///
    /// Missing slots, unreadable bytes and invalid saves leave the store as
    /// it was. Mutations submitted during the load apply on top of the
    /// loaded state.
    #[instrument(skip(self))]
    pub fn load(&self, slot: &str) -> Result<LoadOutcome> {
        check_slot(slot)?;
        let _guard = self.exclusive();

        let pause = self
            .store
            .pause()
            .context("apply pending mutations before load")?;
        if !self.storage.exists(slot)? {
            warn!("slot not found");
            return Ok(LoadOutcome::NotFound);
        }
        let bytes = self.storage.read(slot)?;
        let data = self
            .codec
            .decode(&bytes)
            .with_context(|| format!("load slot '{}'", slot))?;
        info!(
            entries = data.general.len(),
            inventories = data.inventories.len(),
            bytes = bytes.len(),
            "loaded"
        );
        self.store.replace(data);
        drop(pause);
        Ok(LoadOutcome::Loaded)
    }

    /// True if storage holds no slots. Best effort: may race a concurrent save.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count_slots()? == 0)
    }

    /// Number of slots in storage. Best effort: may race a concurrent save.
    pub fn count_slots(&self) -> Result<usize> {
        let slots = self.storage.list_slots()?;
        debug!(count = slots.len(), "counted slots");
        Ok(slots.len())
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_slot(slot: &str) -> Result<()> {
    match slot_id_error(slot) {
        Some(err) => Err(anyhow!(err)),
        None => Ok(()),
    }
}
