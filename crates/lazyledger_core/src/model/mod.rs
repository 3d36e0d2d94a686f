//! Ledger domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the mutation engine.
//! - Keep one entry shape for standalone, recurring-parent and occurrence rows.
//!
//! # Invariants
//! - Every ledger entry is identified by a stable `ExpenseId`.
//! - An entry's role is derived from its fields, never stored separately.

pub mod expense;
pub mod month;
