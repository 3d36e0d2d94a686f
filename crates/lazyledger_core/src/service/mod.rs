//! Ledger use-case services.
//!
//! # Responsibility
//! - Own the mutation engine and its undo/redo history.
//! - Dispatch snapshots to persistence without blocking callers.
//! - Expose read-only selectors for UI layers.

pub mod ledger_service;
pub mod persist;
pub mod query;
