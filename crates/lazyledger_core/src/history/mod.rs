//! Undo/redo history.
//!
//! # Responsibility
//! - Keep bounded past/future stacks of reversible actions (`stack`).
//! - Define the ledger command record and its generic reversal (`command`).
//!
//! # Invariants
//! - Every push clears the redo stack; there is no branching history.
//! - Overflow drops the oldest entry permanently.

pub mod command;
pub mod stack;

pub use command::{Command, CommandKind, EntityChange};
pub use stack::{History, HistoryEntry};
