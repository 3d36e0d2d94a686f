//! Recurrence expansion for recurring ledger parents.
//!
//! # Responsibility
//! - Expand a parent's rule into dated occurrence entries.
//!
//! # Invariants
//! - Expansion is pure: identical inputs yield identical occurrence lists,
//!   ids included.
//! - Rules without a count or end date are capped by `GenerationLimits`.

pub mod generator;

pub use generator::{generate, nth_due_date, occurrence_id, GenerationLimits};
