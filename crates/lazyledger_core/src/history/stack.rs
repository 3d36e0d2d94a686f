//! Generic bounded undo/redo stack.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<T> {
    pub recorded_at: DateTime<Utc>,
    pub action: T,
}

/// Past/future stacks of opaque reversible actions.
///
/// The stack never interprets `T`; callers reverse or replay the action
/// returned by `undo`/`redo`.
#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<HistoryEntry<T>>,
    future: VecDeque<HistoryEntry<T>>,
    limit: usize,
}

impl<T> History<T> {
    /// Creates an empty history retaining at most `limit` past entries.
    ///
    /// A `limit` of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Records `action` and clears the redo stack.
    ///
    /// Returns the evicted oldest entry when the bound was exceeded.
    pub fn push(&mut self, action: T, recorded_at: DateTime<Utc>) -> Option<HistoryEntry<T>> {
        self.future.clear();
        self.past.push_back(HistoryEntry {
            recorded_at,
            action,
        });
        if self.past.len() > self.limit {
            return self.past.pop_front();
        }
        None
    }

    /// Moves the newest past entry to the front of the future stack.
    ///
    /// Returns `None` (and changes nothing) when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&HistoryEntry<T>> {
        let entry = self.past.pop_back()?;
        self.future.push_front(entry);
        self.future.front()
    }

    /// Moves the first future entry back onto the past stack.
    ///
    /// Returns `None` (and changes nothing) when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&HistoryEntry<T>> {
        let entry = self.future.pop_front()?;
        self.past.push_back(entry);
        self.past.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Oldest-first view of the undoable entries.
    pub fn past(&self) -> impl Iterator<Item = &HistoryEntry<T>> {
        self.past.iter()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use chrono::{TimeZone, Utc};

    fn at(second: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap()
    }

    #[test]
    fn undo_then_redo_moves_entries_between_stacks() {
        let mut history = History::new(10);
        history.push("a", at(1));
        history.push("b", at(2));

        assert_eq!(history.undo().map(|entry| entry.action), Some("b"));
        assert!(history.can_redo());
        assert_eq!(history.redo().map(|entry| entry.action), Some("b"));
        assert!(!history.can_redo());
        assert_eq!(history.past_len(), 2);
    }

    #[test]
    fn push_clears_future() {
        let mut history = History::new(10);
        history.push(1, at(1));
        history.undo();
        assert!(history.can_redo());

        history.push(2, at(2));
        assert!(!history.can_redo());
        assert_eq!(history.past().map(|entry| entry.action).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn empty_stacks_are_silent_no_ops() {
        let mut history: History<u8> = History::new(3);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn overflow_drops_oldest_entries() {
        let mut history = History::new(3);
        for value in 0..5 {
            history.push(value, at(value));
        }
        assert_eq!(history.past_len(), 3);
        assert_eq!(
            history.past().map(|entry| entry.action).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );

        let mut undone = Vec::new();
        while let Some(entry) = history.undo() {
            undone.push(entry.action);
        }
        assert_eq!(undone, vec![4, 3, 2]);
        assert_eq!(history.future_len(), 3);
    }
}
