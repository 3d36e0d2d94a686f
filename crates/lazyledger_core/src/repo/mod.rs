//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the whole-collection `save`/`load` contract used by the service.
//! - Isolate SQLite encoding details from mutation logic.
//!
//! # Invariants
//! - Stores validate entries on both write and read paths.
//! - Store failures never reach in-memory ledger state.

pub mod expense_repo;
