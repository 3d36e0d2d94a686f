//! Ledger command record.
//!
//! # Invariants
//! - Every command has the same shape: a target change plus an ordered list
//!   of other entity changes from the same logical operation.
//! - `before`/`after` alone are enough to revert or replay; `None` means the
//!   entity is absent on that side.
//! - Entity ids are unique across the target and `affected`.

use crate::model::expense::{Expense, ExpenseId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Update,
    Delete,
    Archive,
    Unarchive,
    TogglePaid,
    Duplicate,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::TogglePaid => "toggle_paid",
            Self::Duplicate => "duplicate",
        }
    }
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Before/after snapshots of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityChange {
    pub id: ExpenseId,
    pub before: Option<Expense>,
    pub after: Option<Expense>,
}

impl EntityChange {
    pub fn created(after: Expense) -> Self {
        Self {
            id: after.id,
            before: None,
            after: Some(after),
        }
    }

    pub fn removed(before: Expense) -> Self {
        Self {
            id: before.id,
            before: Some(before),
            after: None,
        }
    }

    pub fn modified(before: Expense, after: Expense) -> Self {
        Self {
            id: after.id,
            before: Some(before),
            after: Some(after),
        }
    }

    /// Pairs two entity sets by id.
    ///
    /// Entries only in `before` become removals, entries only in `after`
    /// become creations. Order follows `before`, then new ids from `after`.
    pub fn diff(before: Vec<Expense>, after: Vec<Expense>) -> Vec<Self> {
        let mut changes: Vec<Self> = before.into_iter().map(Self::removed).collect();
        let mut positions: BTreeMap<ExpenseId, usize> = changes
            .iter()
            .enumerate()
            .map(|(index, change)| (change.id, index))
            .collect();

        for entity in after {
            match positions.get(&entity.id) {
                Some(&index) => changes[index].after = Some(entity),
                None => {
                    positions.insert(entity.id, changes.len());
                    changes.push(Self::created(entity));
                }
            }
        }

        changes
    }
}

/// One reversible ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub target_id: ExpenseId,
    pub before: Option<Expense>,
    pub after: Option<Expense>,
    pub affected: Vec<EntityChange>,
    pub timestamp: DateTime<Utc>,
}

impl Command {
    /// Restores every touched entity to its `before` snapshot.
    pub fn revert(&self, entities: &mut BTreeMap<ExpenseId, Expense>) {
        for change in self.affected.iter().rev() {
            apply_side(entities, change.id, change.before.as_ref());
        }
        apply_side(entities, self.target_id, self.before.as_ref());
    }

    /// Re-applies every touched entity's `after` snapshot.
    pub fn replay(&self, entities: &mut BTreeMap<ExpenseId, Expense>) {
        apply_side(entities, self.target_id, self.after.as_ref());
        for change in &self.affected {
            apply_side(entities, change.id, change.after.as_ref());
        }
    }

    /// Number of entities this command touches, target included.
    pub fn touched(&self) -> usize {
        self.affected.len() + 1
    }

    /// Ids of every touched entity, target first.
    pub fn touched_ids(&self) -> Vec<ExpenseId> {
        std::iter::once(self.target_id)
            .chain(self.affected.iter().map(|change| change.id))
            .collect()
    }
}

fn apply_side(
    entities: &mut BTreeMap<ExpenseId, Expense>,
    id: ExpenseId,
    snapshot: Option<&Expense>,
) {
    match snapshot {
        Some(entity) => {
            entities.insert(id, entity.clone());
        }
        None => {
            entities.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, CommandKind, EntityChange};
    use crate::model::expense::{Expense, ExpenseDraft};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn entry(id: u128, name: &str) -> Expense {
        ExpenseDraft::new(name, dec!(10), "misc").into_expense(
            Uuid::from_u128(id),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn collection(items: &[Expense]) -> BTreeMap<Uuid, Expense> {
        items.iter().map(|item| (item.id, item.clone())).collect()
    }

    #[test]
    fn diff_pairs_shared_ids() {
        let old = vec![entry(1, "a"), entry(2, "b")];
        let new = vec![entry(2, "b2"), entry(3, "c")];
        let changes = EntityChange::diff(old, new);

        assert_eq!(changes.len(), 3);
        assert!(changes[0].after.is_none());
        assert_eq!(changes[1].after.as_ref().map(|e| e.name.as_str()), Some("b2"));
        assert!(changes[2].before.is_none());
    }

    #[test]
    fn revert_and_replay_are_inverse() {
        let target_before = entry(1, "parent");
        let mut target_after = target_before.clone();
        target_after.name = "parent v2".to_string();

        let initial = collection(&[target_before.clone(), entry(2, "old child")]);
        let command = Command {
            kind: CommandKind::Update,
            target_id: target_before.id,
            before: Some(target_before),
            after: Some(target_after.clone()),
            affected: EntityChange::diff(vec![entry(2, "old child")], vec![entry(3, "new child")]),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };

        let mut state = initial.clone();
        command.replay(&mut state);
        let after_state = collection(&[target_after, entry(3, "new child")]);
        assert_eq!(state, after_state);

        command.revert(&mut state);
        assert_eq!(state, initial);
        assert_eq!(command.touched(), 3);
    }
}
