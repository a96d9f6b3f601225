//! Thread-safe store of general entries and inventories.
//!
//! Reads go straight to the current in-memory state and may observe a drain in
//! progress. Writes are captured as [`Mutation`]s and applied through the
//! [`MutationQueue`], so they land in submission order with a single writer.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::mutation::Mutation;
use crate::core::types::{Item, StoreData};
use crate::queue::{MutationQueue, PauseGuard};

/// In-memory store shared by every caller of a persistence context.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<StoreData>,
    queue: MutationQueue<Mutation>,
}

/// Pause on a [`Store`]'s queue; resumes on [`PauseGuard::resume`] or drop.
pub type StorePause<'a> = PauseGuard<'a, Mutation, Box<dyn FnMut(Mutation) -> Result<()> + 'a>>;

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
            queue: MutationQueue::new(),
        }
    }

    /// Queue an upsert of a general entry. `key` must be non-empty.
    ///
    /// # Errors
    ///
    /// Fails if this call drained the queue and any mutation in that drain
    /// failed. The failing mutation may be an earlier one submitted by another
    /// caller, in which case this call's mutation stays queued for a later
    /// drain.
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            bail!("general entry key must be non-empty");
        }
        self.submit(Mutation::SetValue {
            key,
            value: value.into(),
        })
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        self.read().value(key).map(str::to_string)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.read().value(key).is_some()
    }

    /// Queue creation of an empty inventory; no-op if it already exists.
    /// Errors as for [`Store::set_value`].
    pub fn create_inventory(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            bail!("inventory name must be non-empty");
        }
        self.submit(Mutation::CreateInventory { name })
    }

    /// Queue an item upsert. See [`Mutation::UpsertItem`] for the rules; in
    /// particular `quantity_delta` is added to an existing item's quantity.
    /// Errors as for [`Store::set_value`].
    pub fn upsert_item(
        &self,
        inventory: impl Into<String>,
        item_id: impl Into<String>,
        name: Option<String>,
        quantity_delta: Option<i64>,
    ) -> Result<()> {
        self.submit(Mutation::UpsertItem {
            inventory: inventory.into(),
            item_id: item_id.into(),
            name,
            quantity_delta,
        })
    }

    /// Queue removal of an inventory. Errors as for [`Store::set_value`].
    pub fn remove_inventory(&self, name: impl Into<String>) -> Result<()> {
        self.submit(Mutation::RemoveInventory { name: name.into() })
    }

    /// Copies of the inventory's items in order, or `None` if it does not exist.
    pub fn list_items(&self, inventory: &str) -> Option<Vec<Item>> {
        self.read().inventory(inventory).map(|inv| inv.items.clone())
    }

    pub fn get_item(&self, inventory: &str, item_id: &str) -> Option<Item> {
        self.read()
            .inventory(inventory)
            .and_then(|inv| inv.item(item_id))
            .cloned()
    }

    pub fn inventory_exists(&self, name: &str) -> bool {
        self.read().inventory(name).is_some()
    }

    /// Copy of the full current state.
    pub fn snapshot(&self) -> StoreData {
        self.read().clone()
    }

    /// Block until every mutation submitted so far has been applied.
    pub fn flush(&self) -> Result<()> {
        self.queue.flush(|mutation| self.apply(mutation))
    }

    /// Mutations submitted but not yet picked up by a drain.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Flush, then hold new mutations back until the guard is released.
    ///
    /// While the guard lives the state is quiescent: [`Store::snapshot`] sees
    /// exactly the mutations submitted before the pause.
    #[instrument(skip_all)]
    pub fn pause(&self) -> Result<StorePause<'_>> {
        let run: Box<dyn FnMut(Mutation) -> Result<()> + '_> =
            Box::new(move |mutation| self.apply(mutation));
        self.queue.pause(run)
    }

    /// Swap in `data` wholesale. Callers hold a [`StorePause`] so no drain
    /// interleaves with the swap.
    pub(crate) fn replace(&self, data: StoreData) {
        let mut current = self.write();
        debug!(
            entries = data.general.len(),
            inventories = data.inventories.len(),
            "replacing store state"
        );
        *current = data;
    }

    fn submit(&self, mutation: Mutation) -> Result<()> {
        self.queue.enqueue(mutation, |mutation| self.apply(mutation))
    }

    fn apply(&self, mutation: Mutation) -> Result<()> {
        mutation.apply(&mut self.write()).map_err(|err| anyhow!(err))
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}
