//! Time and identity collaborators consumed by the ledger service.
//!
//! # Responsibility
//! - Abstract "now" and fresh-id generation so mutations stay testable.
//!
//! # Invariants
//! - `IdSource::next_id` never returns the nil UUID.

use crate::model::expense::ExpenseId;
use chrono::{DateTime, NaiveDate, Utc};
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

/// Wall-clock source.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date used for payment dates.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Unique-id source for newly created entries.
pub trait IdSource {
    fn next_id(&self) -> ExpenseId;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Random v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> ExpenseId {
        Uuid::new_v4()
    }
}

/// Monotonic ids (`00000000-0000-0000-0000-000000000001`, ...).
#[derive(Debug, Default)]
pub struct SequentialIds {
    last: Cell<u128>,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> ExpenseId {
        let next = self.last.get() + 1;
        self.last.set(next);
        Uuid::from_u128(next)
    }
}

/// Shares one clock between the service and its host.
///
/// The service owns a `Box<dyn Clock>`; handing it `Box::new(Rc::clone(&clock))`
/// lets the host keep driving the same `FixedClock` (replays, scripted
/// sessions) after construction.
impl<T: Clock + ?Sized> Clock for Rc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
