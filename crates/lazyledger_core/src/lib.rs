//! Core domain logic for LazyLedger.
//! This crate owns every ledger mutation and its undo/redo history.

pub mod clock;
pub mod config;
pub mod db;
pub mod history;
pub mod logging;
pub mod model;
pub mod recurrence;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, IdSource, RandomIds, SequentialIds, SystemClock};
pub use config::{ConfigError, LedgerConfig};
pub use history::{Command, CommandKind, EntityChange, History, HistoryEntry};
pub use logging::{default_log_level, init_logging, logging_status, LogOptions, LoggingError};
pub use model::expense::{
    Expense, ExpenseDraft, ExpenseId, ExpensePatch, ExpenseRole, ExpenseType, Frequency,
    Importance, InitialState, MonthOverride, RecurrenceRule, ValidationError,
};
pub use model::month::YearMonth;
pub use repo::expense_repo::{ExpenseStore, SqliteExpenseStore, StoreError, StoreResult};
pub use service::ledger_service::{
    ChangeCause, EditScope, LedgerChange, LedgerError, LedgerResult, LedgerService, ListenerId,
};
pub use service::persist::{BackgroundPersister, NoopPersister, PersistStatus, Persister};
pub use service::query::ExpenseQuery;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
