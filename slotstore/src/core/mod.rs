//! Deterministic, pure logic for the store's data model.
//!
//! Core modules must be free of I/O side effects and locking. They operate on
//! in-memory data and return plain results suitable for tests.

pub mod invariants;
pub mod mutation;
pub mod slot;
pub mod types;
