//! Thread-safe, mutation-queuing persistence for a small structured store.
//!
//! The store holds string key/value entries plus named inventories of items.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure data model and mutation rules. No I/O, no locking.
//! - **[`io`]**: Codecs, slot storage and configuration. Isolated behind
//!   traits so tests can substitute in-memory doubles.
//!
//! Concurrency lives in between: [`queue`] serializes writers through a
//! double-buffered queue, [`store`] exposes the CRUD surface on top of it, and
//! [`persistence`] pauses the queue to save or load a quiescent snapshot.

pub mod core;
pub mod io;
pub mod logging;
pub mod persistence;
pub mod queue;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::types::{GeneralEntry, Inventory, Item, StoreData};
pub use crate::persistence::{LoadOutcome, Persistence};
pub use crate::store::Store;
