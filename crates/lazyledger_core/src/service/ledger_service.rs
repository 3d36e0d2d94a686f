//! Ledger mutation engine.
//!
//! # Responsibility
//! - Own the in-memory entry collection and every mutation on it.
//! - Record exactly one reversible `Command` per visible change.
//! - Reconcile regenerated occurrence sets with hand-edited occurrences.
//!
//! # Invariants
//! - Validation runs before any mutation; rejected input pushes nothing.
//! - Unknown ids and no-op requests are silent and push nothing.
//! - Every committed change is applied through `Command::replay`, so the
//!   recorded `after` side is exactly the new state.
//! - Parent-level delete/archive/unarchive/toggle-paid touch the parent and
//!   exactly its current occurrences.
//! - A regeneration never drops an occurrence that is paid or modified.

use crate::clock::{Clock, IdSource, RandomIds, SystemClock};
use crate::config::{ConfigError, LedgerConfig};
use crate::history::{Command, CommandKind, EntityChange, History};
use crate::model::expense::{
    Expense, ExpenseDraft, ExpenseId, ExpensePatch, ExpenseRole, ValidationError,
};
use crate::model::month::YearMonth;
use crate::recurrence::{generate, occurrence_id, GenerationLimits};
use crate::service::persist::{NoopPersister, Persister};
use crate::service::query::{month_total, select, ExpenseQuery};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error returned by ledger mutations.
///
/// Only rejected input is an error; missing targets are silent no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    Validation(ValidationError),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Whether an edit targets one occurrence or the whole series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditScope {
    Instance,
    Series,
}

/// Why the collection changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Command(CommandKind),
    Undo(CommandKind),
    Redo(CommandKind),
    Reset,
}

/// Notification delivered to listeners after each change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerChange {
    pub revision: u64,
    pub cause: ChangeCause,
}

pub type ListenerId = u64;

type Listener = Box<dyn Fn(&LedgerChange)>;

/// Single-writer handle over the ledger collection and its history.
///
/// Constructed once by the application root and passed to whatever needs it.
pub struct LedgerService<P: Persister = NoopPersister> {
    config: LedgerConfig,
    entities: BTreeMap<ExpenseId, Expense>,
    history: History<Command>,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
    persister: P,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
    revision: u64,
}

impl LedgerService<NoopPersister> {
    /// In-memory service using the system clock and random ids.
    pub fn in_memory(config: LedgerConfig) -> Result<Self, ConfigError> {
        Self::new(config, Box::new(SystemClock), Box::new(RandomIds), NoopPersister)
    }
}

impl<P: Persister> LedgerService<P> {
    /// Builds an empty service.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found by [`LedgerConfig::validate`];
    /// a zero history limit or generation bound never reaches the engine.
    pub fn new(
        config: LedgerConfig,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdSource>,
        persister: P,
    ) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            warn!("event=ledger_init module=ledger status=error error={err}");
            return Err(err);
        }
        let history = History::new(config.history_limit);
        Ok(Self {
            config,
            entities: BTreeMap::new(),
            history,
            clock,
            ids,
            persister,
            listeners: Vec::new(),
            next_listener_id: 0,
            revision: 0,
        })
    }

    /// Seeds the collection with previously loaded entries.
    ///
    /// Seeding is not a command and is not persisted back.
    pub fn with_entities(mut self, entities: Vec<Expense>) -> Self {
        self.entities = into_collection(entities);
        self
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    pub fn history(&self) -> &History<Command> {
        &self.history
    }

    /// Increments on every mutation, undo, redo and reset.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: ExpenseId) -> Option<&Expense> {
        self.entities.get(&id)
    }

    /// All entries ordered by id.
    pub fn entities(&self) -> impl Iterator<Item = &Expense> {
        self.entities.values()
    }

    /// Owned copy of the whole collection, ordered by id.
    pub fn snapshot(&self) -> Vec<Expense> {
        self.entities.values().cloned().collect()
    }

    /// Current occurrences of `parent_id`, ordered by due date.
    pub fn occurrences_of(&self, parent_id: ExpenseId) -> Vec<&Expense> {
        let mut children: Vec<&Expense> = self
            .entities
            .values()
            .filter(|entity| entity.is_occurrence_of(parent_id))
            .collect();
        children.sort_by_key(|child| (child.due_date, child.id));
        children
    }

    pub fn query(&self, query: &ExpenseQuery) -> Vec<&Expense> {
        select(self.entities.values(), query)
    }

    pub fn month_total(&self, month: YearMonth) -> Decimal {
        month_total(self.entities.values(), month)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Registers `listener` for change notifications.
    pub fn subscribe(&mut self, listener: impl Fn(&LedgerChange) + 'static) -> ListenerId {
        self.next_listener_id += 1;
        let id = self.next_listener_id;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Creates an entry and, when recurring, all of its occurrences.
    ///
    /// # Errors
    /// - `LedgerError::Validation` for blank names or malformed rules.
    pub fn create(&mut self, draft: ExpenseDraft) -> LedgerResult<ExpenseId> {
        if draft.is_recurring && draft.recurrence.is_none() {
            return Err(ValidationError::MissingRecurrence.into());
        }

        let now = self.clock.now();
        let mut parent = draft.into_expense(self.ids.next_id(), now);
        if !parent.is_recurring {
            parent.recurrence = None;
        }
        parent.validate()?;

        let occurrences = match parent.role() {
            ExpenseRole::Parent => self.expand(&parent)?,
            ExpenseRole::Standalone | ExpenseRole::Occurrence { .. } => Vec::new(),
        };

        let id = parent.id;
        self.commit(Command {
            kind: CommandKind::Create,
            target_id: id,
            before: None,
            after: Some(parent),
            affected: occurrences.into_iter().map(EntityChange::created).collect(),
            timestamp: now,
        });
        Ok(id)
    }

    /// Applies `patch` to `id` using the role/scope dispatch.
    ///
    /// Returns `Ok(false)` when `id` is unknown or nothing changed.
    ///
    /// # Errors
    /// - `LedgerError::Validation` when the patched entry or its rule is
    ///   invalid. Nothing is mutated.
    pub fn update(
        &mut self,
        id: ExpenseId,
        patch: &ExpensePatch,
        scope: EditScope,
    ) -> LedgerResult<bool> {
        let Some(current) = self.entities.get(&id).cloned() else {
            debug!("event=ledger_update module=ledger status=noop reason=not_found id={id}");
            return Ok(false);
        };
        if patch.is_empty() {
            return Ok(false);
        }

        match (current.role(), scope) {
            (ExpenseRole::Occurrence { .. }, EditScope::Instance) => {
                self.edit_instance(current, patch)
            }
            (ExpenseRole::Occurrence { parent_id }, EditScope::Series) => {
                match self.entities.get(&parent_id).cloned() {
                    Some(parent) => {
                        let series_patch = ExpensePatch {
                            due_date: None,
                            ..patch.clone()
                        };
                        self.edit_series(parent, &series_patch)
                    }
                    None => {
                        warn!(
                            "event=ledger_update module=ledger status=fallback reason=parent_missing id={id} parent_id={parent_id}"
                        );
                        self.edit_instance(current, patch)
                    }
                }
            }
            (ExpenseRole::Parent, EditScope::Instance | EditScope::Series) => {
                self.edit_series(current, patch)
            }
            (ExpenseRole::Standalone, EditScope::Instance | EditScope::Series) => {
                self.edit_standalone(current, patch)
            }
        }
    }

    /// Removes `id`; a parent takes its occurrences with it.
    pub fn delete(&mut self, id: ExpenseId) -> bool {
        let Some(target) = self.entities.get(&id).cloned() else {
            debug!("event=ledger_delete module=ledger status=noop reason=not_found id={id}");
            return false;
        };

        let children = self.series_children(&target);
        self.commit(Command {
            kind: CommandKind::Delete,
            target_id: id,
            before: Some(target),
            after: None,
            affected: children.into_iter().map(EntityChange::removed).collect(),
            timestamp: self.clock.now(),
        });
        true
    }

    pub fn archive(&mut self, id: ExpenseId) -> bool {
        self.set_archived(id, true)
    }

    pub fn unarchive(&mut self, id: ExpenseId) -> bool {
        self.set_archived(id, false)
    }

    /// Flips the paid flag of `id`.
    ///
    /// A parent moves every occurrence to the parent's new state; already
    /// paid occurrences keep their payment date. `is_modified` is untouched.
    pub fn toggle_paid(&mut self, id: ExpenseId) -> bool {
        let Some(target) = self.entities.get(&id).cloned() else {
            debug!("event=ledger_toggle_paid module=ledger status=noop reason=not_found id={id}");
            return false;
        };

        let now = self.clock.now();
        let today = self.clock.today();
        let paid = !target.is_paid;
        let children = self.series_children(&target);

        let mut after = target.clone();
        set_paid(&mut after, paid, today);
        after.updated_at = now;

        let affected = children
            .into_iter()
            .map(|child| {
                let mut next = child.clone();
                set_paid(&mut next, paid, today);
                if next != child {
                    next.updated_at = now;
                }
                EntityChange::modified(child, next)
            })
            .collect();

        self.commit(Command {
            kind: CommandKind::TogglePaid,
            target_id: id,
            before: Some(target),
            after: Some(after),
            affected,
            timestamp: now,
        });
        true
    }

    /// Copies `id` under fresh ids and returns the copy's id.
    ///
    /// Paid state, modification flag and timestamps are reset. A parent is
    /// copied with its occurrences; an occurrence becomes a standalone entry.
    pub fn duplicate(&mut self, id: ExpenseId) -> Option<ExpenseId> {
        let Some(source) = self.entities.get(&id).cloned() else {
            debug!("event=ledger_duplicate module=ledger status=noop reason=not_found id={id}");
            return None;
        };

        let now = self.clock.now();
        let mut copy = source.clone();
        copy.id = self.ids.next_id();
        copy.mark_unpaid();
        copy.is_modified = false;
        copy.created_at = now;
        copy.updated_at = now;

        let mut clones = Vec::new();
        match source.role() {
            ExpenseRole::Standalone => {}
            ExpenseRole::Occurrence { .. } => {
                copy.parent_id = None;
                copy.is_recurring = false;
                copy.recurrence = None;
                copy.initial_state = None;
            }
            ExpenseRole::Parent => {
                // Dated clones take the slot id regeneration will look for.
                let mut taken = BTreeSet::new();
                for child in self.occurrences_of(source.id) {
                    let mut clone = child.clone();
                    clone.id = match clone.due_date {
                        Some(due) if taken.insert(due) => occurrence_id(copy.id, due),
                        _ => self.ids.next_id(),
                    };
                    clone.parent_id = Some(copy.id);
                    clone.mark_unpaid();
                    clone.is_modified = false;
                    clone.initial_state = Some(clone.financial_snapshot());
                    clone.created_at = now;
                    clone.updated_at = now;
                    clones.push(clone);
                }
            }
        }

        let copy_id = copy.id;
        self.commit(Command {
            kind: CommandKind::Duplicate,
            target_id: copy_id,
            before: None,
            after: Some(copy),
            affected: clones.into_iter().map(EntityChange::created).collect(),
            timestamp: now,
        });
        Some(copy_id)
    }

    /// Reverts the newest command and returns its kind.
    pub fn undo(&mut self) -> Option<CommandKind> {
        let Some(entry) = self.history.undo() else {
            debug!("event=ledger_undo module=ledger status=noop reason=empty");
            return None;
        };
        entry.action.revert(&mut self.entities);
        let kind = entry.action.kind;
        let touched = entry.action.touched();
        info!("event=ledger_undo module=ledger status=ok kind={kind} touched={touched}");
        self.publish(ChangeCause::Undo(kind));
        Some(kind)
    }

    /// Re-applies the most recently undone command and returns its kind.
    pub fn redo(&mut self) -> Option<CommandKind> {
        let Some(entry) = self.history.redo() else {
            debug!("event=ledger_redo module=ledger status=noop reason=empty");
            return None;
        };
        entry.action.replay(&mut self.entities);
        let kind = entry.action.kind;
        let touched = entry.action.touched();
        info!("event=ledger_redo module=ledger status=ok kind={kind} touched={touched}");
        self.publish(ChangeCause::Redo(kind));
        Some(kind)
    }

    /// Swaps the whole collection (e.g. after an import) and clears history.
    pub fn reset(&mut self, entities: Vec<Expense>) {
        self.entities = into_collection(entities);
        self.history.clear();
        info!(
            "event=ledger_reset module=ledger status=ok count={}",
            self.entities.len()
        );
        self.publish(ChangeCause::Reset);
    }

    // ------------------------------------------------------------------
    // Update paths
    // ------------------------------------------------------------------

    fn edit_instance(&mut self, before: Expense, patch: &ExpensePatch) -> LedgerResult<bool> {
        let instance_patch = ExpensePatch {
            recurrence: None,
            ..patch.clone()
        };
        let mut after = before.clone();
        instance_patch.apply_all(&mut after);
        after.is_modified = after.diverges_from_initial();
        after.validate()?;
        if after == before {
            return Ok(false);
        }

        let now = self.clock.now();
        after.updated_at = now;
        self.commit(Command {
            kind: CommandKind::Update,
            target_id: before.id,
            before: Some(before),
            after: Some(after),
            affected: Vec::new(),
            timestamp: now,
        });
        Ok(true)
    }

    fn edit_standalone(&mut self, before: Expense, patch: &ExpensePatch) -> LedgerResult<bool> {
        let mut after = before.clone();
        patch.apply_all(&mut after);
        after.validate()?;
        if after == before {
            return Ok(false);
        }

        let now = self.clock.now();
        after.updated_at = now;
        // A rule on a standalone entry promotes it to a series parent.
        let occurrences = match after.role() {
            ExpenseRole::Parent => self.expand(&after)?,
            ExpenseRole::Standalone | ExpenseRole::Occurrence { .. } => Vec::new(),
        };

        self.commit(Command {
            kind: CommandKind::Update,
            target_id: before.id,
            before: Some(before),
            after: Some(after),
            affected: occurrences.into_iter().map(EntityChange::created).collect(),
            timestamp: now,
        });
        Ok(true)
    }

    fn edit_series(&mut self, before: Expense, patch: &ExpensePatch) -> LedgerResult<bool> {
        let mut after = before.clone();
        patch.apply_all(&mut after);
        after.validate()?;
        if after == before {
            return Ok(false);
        }

        let now = self.clock.now();
        after.updated_at = now;
        let children: Vec<Expense> = self
            .occurrences_of(before.id)
            .into_iter()
            .cloned()
            .collect();

        let affected = if patch.changes_shape_of(&before) {
            let generated = self.expand(&after)?;
            let merged = self.merge_preserved(&children, generated, patch);
            EntityChange::diff(children, merged)
        } else {
            cascade(children, patch, now)
        };

        self.commit(Command {
            kind: CommandKind::Update,
            target_id: before.id,
            before: Some(before),
            after: Some(after),
            affected,
            timestamp: now,
        });
        Ok(true)
    }

    /// Splices preserved user data onto a regenerated occurrence set.
    ///
    /// Occurrences that are modified or paid are keyed by due date. A
    /// generated slot with the same date receives their financial state; the
    /// rest are appended unchanged apart from descriptive fields.
    fn merge_preserved(
        &self,
        previous: &[Expense],
        generated: Vec<Expense>,
        patch: &ExpensePatch,
    ) -> Vec<Expense> {
        let mut preserved: BTreeMap<NaiveDate, Expense> = BTreeMap::new();
        let mut orphans: Vec<Expense> = Vec::new();
        for occurrence in previous.iter().filter(|item| item.is_frozen()) {
            match occurrence.due_date {
                Some(due_date) if !preserved.contains_key(&due_date) => {
                    preserved.insert(due_date, occurrence.clone());
                }
                _ => orphans.push(occurrence.clone()),
            }
        }

        let generated_count = generated.len();
        let mut merged = Vec::with_capacity(generated_count + preserved.len());
        let mut spliced = 0_usize;
        for mut slot in generated {
            if let Some(kept) = slot.due_date.and_then(|due_date| preserved.remove(&due_date)) {
                slot.amount = kept.amount;
                slot.payment_method = kept.payment_method;
                slot.is_paid = kept.is_paid;
                slot.payment_date = kept.payment_date;
                slot.is_modified = kept.is_modified;
                slot.initial_state = kept.initial_state;
                spliced += 1;
            }
            merged.push(slot);
        }

        orphans.extend(preserved.into_values());
        let orphan_count = orphans.len();
        let orphan_ids: BTreeSet<ExpenseId> = orphans.iter().map(|orphan| orphan.id).collect();
        for slot in &mut merged {
            if orphan_ids.contains(&slot.id) {
                slot.id = self.ids.next_id();
            }
        }
        for mut orphan in orphans {
            patch.apply_descriptive(&mut orphan);
            merged.push(orphan);
        }

        info!(
            "event=ledger_regenerate module=ledger status=ok generated={} spliced={} orphaned={}",
            generated_count, spliced, orphan_count
        );
        merged
    }

    fn set_archived(&mut self, id: ExpenseId, archived: bool) -> bool {
        let kind = if archived {
            CommandKind::Archive
        } else {
            CommandKind::Unarchive
        };
        let Some(target) = self.entities.get(&id).cloned() else {
            debug!("event=ledger_{kind} module=ledger status=noop reason=not_found id={id}");
            return false;
        };

        let children = self.series_children(&target);
        let unchanged = target.is_archived == archived
            && children.iter().all(|child| child.is_archived == archived);
        if unchanged {
            debug!("event=ledger_{kind} module=ledger status=noop reason=unchanged id={id}");
            return false;
        }

        let now = self.clock.now();
        let flip = |entity: &Expense| {
            let mut next = entity.clone();
            if next.is_archived != archived {
                next.is_archived = archived;
                next.updated_at = now;
            }
            next
        };
        let after = flip(&target);
        let affected = children
            .into_iter()
            .map(|child| {
                let next = flip(&child);
                EntityChange::modified(child, next)
            })
            .collect();

        self.commit(Command {
            kind,
            target_id: id,
            before: Some(target),
            after: Some(after),
            affected,
            timestamp: now,
        });
        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn expand(&self, parent: &Expense) -> Result<Vec<Expense>, ValidationError> {
        let rule = parent
            .recurrence
            .as_ref()
            .ok_or(ValidationError::MissingRecurrence)?;
        let anchor = parent.due_date.ok_or(ValidationError::MissingAnchorDate)?;
        generate(parent, rule, anchor, GenerationLimits::from(&self.config))
    }

    /// Occurrences cascaded by parent-level operations; empty for non-parents.
    fn series_children(&self, target: &Expense) -> Vec<Expense> {
        match target.role() {
            ExpenseRole::Parent => self
                .occurrences_of(target.id)
                .into_iter()
                .cloned()
                .collect(),
            ExpenseRole::Standalone | ExpenseRole::Occurrence { .. } => Vec::new(),
        }
    }

    fn commit(&mut self, command: Command) {
        command.replay(&mut self.entities);

        let kind = command.kind;
        let target_id = command.target_id;
        let touched = command.touched();
        let timestamp = command.timestamp;
        if let Some(evicted) = self.history.push(command, timestamp) {
            debug!(
                "event=history_evict module=ledger status=ok kind={} recorded_at={}",
                evicted.action.kind, evicted.recorded_at
            );
        }

        info!(
            "event=ledger_mutation module=ledger status=ok kind={kind} target={target_id} touched={touched}"
        );
        self.publish(ChangeCause::Command(kind));
    }

    fn publish(&mut self, cause: ChangeCause) {
        self.revision += 1;
        let change = LedgerChange {
            revision: self.revision,
            cause,
        };
        for (_, listener) in &self.listeners {
            listener(&change);
        }
        self.persister.persist(self.revision, self.snapshot());
    }
}

/// Cascades a non-shape series edit onto existing occurrences.
///
/// Unfrozen occurrences take financial fields and are re-based so they stay
/// unmodified; frozen ones take descriptive fields only.
fn cascade(
    children: Vec<Expense>,
    patch: &ExpensePatch,
    now: DateTime<Utc>,
) -> Vec<EntityChange> {
    children
        .into_iter()
        .map(|child| {
            let mut next = child.clone();
            patch.apply_descriptive(&mut next);
            if !child.is_frozen() {
                patch.apply_financial(&mut next);
                next.initial_state = Some(next.financial_snapshot());
            }
            if next != child {
                next.updated_at = now;
            }
            EntityChange::modified(child, next)
        })
        .collect()
}

fn set_paid(entity: &mut Expense, paid: bool, today: NaiveDate) {
    match (paid, entity.is_paid) {
        (true, false) => entity.mark_paid(today),
        (false, true) => entity.mark_unpaid(),
        (true, true) | (false, false) => {}
    }
}

fn into_collection(entities: Vec<Expense>) -> BTreeMap<ExpenseId, Expense> {
    entities
        .into_iter()
        .map(|entity| (entity.id, entity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ChangeCause, EditScope, LedgerService};
    use crate::clock::{FixedClock, SequentialIds};
    use crate::config::{ConfigError, LedgerConfig};
    use crate::history::CommandKind;
    use crate::model::expense::{ExpenseDraft, ExpensePatch, Frequency, RecurrenceRule};
    use crate::service::persist::NoopPersister;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn service() -> LedgerService {
        LedgerService::new(
            LedgerConfig::default(),
            Box::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())),
            Box::new(SequentialIds::new()),
            NoopPersister,
        )
        .unwrap()
    }

    #[test]
    fn zero_history_limit_is_rejected_at_construction() {
        let config = LedgerConfig {
            history_limit: 0,
            ..LedgerConfig::default()
        };
        let err = LedgerService::in_memory(config).err().unwrap();
        assert_eq!(err, ConfigError::NonPositive("history_limit"));
    }

    #[test]
    fn zero_generation_bounds_are_rejected_at_construction() {
        let no_cap = LedgerConfig {
            default_occurrence_cap: 0,
            ..LedgerConfig::default()
        };
        assert_eq!(
            LedgerService::in_memory(no_cap).err(),
            Some(ConfigError::NonPositive("default_occurrence_cap"))
        );

        let no_horizon = LedgerConfig {
            default_horizon_months: 0,
            ..LedgerConfig::default()
        };
        assert_eq!(
            LedgerService::in_memory(no_horizon).err(),
            Some(ConfigError::NonPositive("default_horizon_months"))
        );
    }

    #[test]
    fn listeners_see_every_revision() {
        let mut ledger = service();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let listener = ledger.subscribe(move |change| sink.borrow_mut().push(change.cause));

        let id = ledger
            .create(ExpenseDraft::new("Lunch", dec!(12), "food"))
            .unwrap();
        ledger.undo();
        ledger.redo();
        assert!(ledger.unsubscribe(listener));
        ledger.delete(id);

        assert_eq!(
            *seen.borrow(),
            vec![
                ChangeCause::Command(CommandKind::Create),
                ChangeCause::Undo(CommandKind::Create),
                ChangeCause::Redo(CommandKind::Create),
            ]
        );
        assert_eq!(ledger.revision(), 4);
    }

    #[test]
    fn empty_patch_and_unknown_ids_push_nothing() {
        let mut ledger = service();
        let id = ledger
            .create(ExpenseDraft::new("Lunch", dec!(12), "food"))
            .unwrap();

        assert!(!ledger
            .update(id, &ExpensePatch::default(), EditScope::Instance)
            .unwrap());
        assert!(!ledger.delete(uuid::Uuid::nil()));
        assert!(ledger.duplicate(uuid::Uuid::nil()).is_none());
        assert_eq!(ledger.history().past_len(), 1);
    }

    #[test]
    fn promoting_standalone_to_series_generates_occurrences() {
        let mut ledger = service();
        let id = ledger
            .create(
                ExpenseDraft::new("Phone", dec!(30), "utilities")
                    .due(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            )
            .unwrap();

        let patch = ExpensePatch {
            recurrence: Some(RecurrenceRule::new(Frequency::Monthly).times(2)),
            ..ExpensePatch::default()
        };
        assert!(ledger.update(id, &patch, EditScope::Series).unwrap());
        assert_eq!(ledger.occurrences_of(id).len(), 2);

        ledger.undo();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.occurrences_of(id).is_empty());
    }
}
