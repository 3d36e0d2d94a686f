//! Fire-and-forget persistence dispatch.
//!
//! # Responsibility
//! - Hand full ledger snapshots to a store after each visible change.
//! - Track the "last saved" indicator without ever blocking a mutation.
//!
//! # Invariants
//! - Store failures are logged and recorded in `PersistStatus`, never
//!   propagated to the caller.
//! - Only the newest queued snapshot is written when saves pile up.

use crate::model::expense::Expense;
use crate::repo::expense_repo::ExpenseStore;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Receives ledger snapshots after every committed change.
pub trait Persister {
    /// Schedules `entities` (state at `revision`) for saving. Must not block
    /// on I/O.
    fn persist(&self, revision: u64, entities: Vec<Expense>);
}

/// Discards every snapshot. Used for purely in-memory sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersister;

impl Persister for NoopPersister {
    fn persist(&self, _revision: u64, _entities: Vec<Expense>) {}
}

/// Outcome of the most recent save attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistStatus {
    pub last_saved_revision: Option<u64>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub failed_saves: u64,
}

impl PersistStatus {
    /// True when the latest requested revision has not been saved.
    pub fn is_stale(&self, current_revision: u64) -> bool {
        self.last_saved_revision
            .map_or(current_revision > 0, |saved| saved < current_revision)
    }
}

enum PersistMessage {
    Save {
        revision: u64,
        entities: Vec<Expense>,
    },
    Flush(Sender<()>),
}

/// Saves snapshots on a dedicated worker thread that owns the store.
pub struct BackgroundPersister {
    sender: Option<Sender<PersistMessage>>,
    status: Arc<Mutex<PersistStatus>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundPersister {
    /// Moves `store` onto a new worker thread.
    ///
    /// # Errors
    /// - Returns the OS error when the thread cannot be spawned.
    pub fn spawn<S>(store: S) -> std::io::Result<Self>
    where
        S: ExpenseStore + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let status = Arc::new(Mutex::new(PersistStatus::default()));
        let worker_status = Arc::clone(&status);
        let worker = thread::Builder::new()
            .name("lazyledger-persist".to_string())
            .spawn(move || run_worker(store, receiver, worker_status))?;

        Ok(Self {
            sender: Some(sender),
            status,
            worker: Some(worker),
        })
    }

    pub fn status(&self) -> PersistStatus {
        lock_status(&self.status).clone()
    }

    /// Blocks until every snapshot queued before this call was handled.
    ///
    /// Returns `false` when the worker is no longer running.
    pub fn flush(&self) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        let (ack_sender, ack_receiver) = mpsc::channel();
        if sender.send(PersistMessage::Flush(ack_sender)).is_err() {
            return false;
        }
        ack_receiver.recv().is_ok()
    }
}

impl Persister for BackgroundPersister {
    fn persist(&self, revision: u64, entities: Vec<Expense>) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender
            .send(PersistMessage::Save { revision, entities })
            .is_err()
        {
            error!(
                "event=ledger_persist module=persist status=error revision={} error_code=worker_gone",
                revision
            );
        }
    }
}

impl Drop for BackgroundPersister {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after queued saves.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(
                    "event=ledger_persist module=persist status=error error_code=worker_panicked"
                );
            }
        }
    }
}

fn run_worker<S: ExpenseStore>(
    mut store: S,
    receiver: Receiver<PersistMessage>,
    status: Arc<Mutex<PersistStatus>>,
) {
    while let Ok(message) = receiver.recv() {
        match message {
            PersistMessage::Save { revision, entities } => {
                let mut latest = (revision, entities);
                let mut pending_acks = Vec::new();
                let mut skipped = 0_usize;
                while let Ok(next) = receiver.try_recv() {
                    match next {
                        PersistMessage::Save { revision, entities } => {
                            latest = (revision, entities);
                            skipped += 1;
                        }
                        PersistMessage::Flush(ack) => {
                            pending_acks.push(ack);
                            break;
                        }
                    }
                }
                if skipped > 0 {
                    debug!(
                        "event=ledger_persist module=persist status=coalesced skipped={}",
                        skipped
                    );
                }

                save_snapshot(&mut store, &status, latest.0, &latest.1);
                for ack in pending_acks {
                    let _ = ack.send(());
                }
            }
            PersistMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

fn save_snapshot<S: ExpenseStore>(
    store: &mut S,
    status: &Mutex<PersistStatus>,
    revision: u64,
    entities: &[Expense],
) {
    let started_at = Instant::now();
    match store.save(entities) {
        Ok(()) => {
            let mut guard = lock_status(status);
            guard.last_saved_revision = Some(revision);
            guard.last_saved_at = Some(Utc::now());
            guard.last_error = None;
            info!(
                "event=ledger_persist module=persist status=ok revision={} count={} duration_ms={}",
                revision,
                entities.len(),
                started_at.elapsed().as_millis()
            );
        }
        Err(err) => {
            let mut guard = lock_status(status);
            guard.last_error = Some(err.to_string());
            guard.failed_saves += 1;
            error!(
                "event=ledger_persist module=persist status=error revision={} duration_ms={} error={}",
                revision,
                started_at.elapsed().as_millis(),
                err
            );
        }
    }
}

fn lock_status(status: &Mutex<PersistStatus>) -> MutexGuard<'_, PersistStatus> {
    status
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::{BackgroundPersister, PersistStatus, Persister};
    use crate::model::expense::{Expense, ExpenseDraft};
    use crate::repo::expense_repo::{ExpenseStore, StoreError, StoreResult};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct RecordingStore {
        saves: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl ExpenseStore for RecordingStore {
        fn save(&mut self, entities: &[Expense]) -> StoreResult<()> {
            if self.fail {
                return Err(StoreError::InvalidData("disk full".to_string()));
            }
            self.saves.lock().unwrap().push(entities.len());
            Ok(())
        }

        fn load(&self) -> StoreResult<Vec<Expense>> {
            Ok(Vec::new())
        }
    }

    fn sample() -> Expense {
        ExpenseDraft::new("Coffee", dec!(4.5), "food").into_expense(
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn flush_waits_for_queued_saves() {
        let store = RecordingStore::default();
        let saves = Arc::clone(&store.saves);
        let persister = BackgroundPersister::spawn(store).unwrap();

        persister.persist(1, vec![sample()]);
        persister.persist(2, vec![sample(), sample()]);
        assert!(persister.flush());

        let recorded = saves.lock().unwrap().clone();
        assert_eq!(recorded.last(), Some(&2));
        assert_eq!(persister.status().last_saved_revision, Some(2));
    }

    #[test]
    fn failures_are_recorded_not_raised() {
        let store = RecordingStore {
            fail: true,
            ..RecordingStore::default()
        };
        let persister = BackgroundPersister::spawn(store).unwrap();
        persister.persist(1, vec![sample()]);
        assert!(persister.flush());

        let status = persister.status();
        assert_eq!(status.last_saved_revision, None);
        assert_eq!(status.failed_saves, 1);
        assert!(status.last_error.unwrap().contains("disk full"));
        assert!(PersistStatus::default().is_stale(1));
    }
}
