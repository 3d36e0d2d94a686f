//! Expense domain model.
//!
//! # Responsibility
//! - Define the canonical ledger entry shared by standalone, recurring-parent
//!   and occurrence rows.
//! - Define recurrence rules, edit patches and the create draft.
//!
//! # Invariants
//! - A parent (`is_recurring`, no `parent_id`) is metadata only and never
//!   appears in date-filtered views.
//! - An occurrence (`parent_id` set) carries an `initial_state` snapshot taken
//!   when it was generated.
//! - `is_modified || is_paid` freezes an occurrence against financial edits
//!   cascaded from its parent.

use crate::model::month::YearMonth;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every ledger entry.
pub type ExpenseId = Uuid;

/// Descriptive classification of a ledger entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseType {
    Bill,
    Subscription,
    #[default]
    Purchase,
    Loan,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Essential,
    #[default]
    Important,
    Optional,
}

/// Base step of a recurrence rule. `RecurrenceRule::interval` multiplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    CustomDays,
    CustomMonths,
}

/// Recurrence rule attached to a parent entry.
///
/// At most one of `occurrences` / `end_date` needs to be set; when both are
/// set generation stops at whichever bound is reached first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub occurrences: Option<u32>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RecurrenceRule {
    /// Creates an open-ended rule with `interval = 1`.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            occurrences: None,
            end_date: None,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn times(mut self, occurrences: u32) -> Self {
        self.occurrences = Some(occurrences);
        self
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Validates the rule against the generation anchor.
    ///
    /// # Errors
    /// - `ZeroInterval` when `interval == 0`.
    /// - `ZeroOccurrences` when an explicit count of zero is given.
    /// - `EndBeforeAnchor` when `end_date` precedes `anchor`.
    pub fn validate(&self, anchor: NaiveDate) -> Result<(), ValidationError> {
        if self.interval == 0 {
            return Err(ValidationError::ZeroInterval);
        }
        if self.occurrences == Some(0) {
            return Err(ValidationError::ZeroOccurrences);
        }
        if let Some(end_date) = self.end_date {
            if end_date < anchor {
                return Err(ValidationError::EndBeforeAnchor { anchor, end_date });
            }
        }
        Ok(())
    }

    /// Returns whether `other` would generate a differently shaped series.
    pub fn shape_differs(&self, other: &Self) -> bool {
        self.frequency != other.frequency
            || self.interval != other.interval
            || self.occurrences != other.occurrences
            || self.end_date != other.end_date
    }
}

/// Financial fields captured when an occurrence is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialState {
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
}

/// Per-month adjustment stored on a parent and inherited by its occurrences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthOverride {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Role of an entry in a recurring series, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseRole {
    /// One-off entry with no series.
    Standalone,
    /// Recurring template; never shown in date-filtered views.
    Parent,
    /// Dated instance of the parent `parent_id`.
    Occurrence { parent_id: ExpenseId },
}

/// Canonical ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub name: String,
    pub amount: Decimal,
    pub category: String,
    pub expense_type: ExpenseType,
    pub importance: Importance,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub is_recurring: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub is_archived: bool,
    pub is_paid: bool,
    pub payment_date: Option<NaiveDate>,
    /// Back-reference to the series parent. Does not imply ownership.
    pub parent_id: Option<ExpenseId>,
    pub is_modified: bool,
    pub initial_state: Option<InitialState>,
    #[serde(default)]
    pub monthly_overrides: BTreeMap<YearMonth, MonthOverride>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn role(&self) -> ExpenseRole {
        match self.parent_id {
            Some(parent_id) => ExpenseRole::Occurrence { parent_id },
            None if self.is_recurring => ExpenseRole::Parent,
            None => ExpenseRole::Standalone,
        }
    }

    pub fn is_parent(&self) -> bool {
        self.role() == ExpenseRole::Parent
    }

    pub fn is_occurrence_of(&self, parent_id: ExpenseId) -> bool {
        self.parent_id == Some(parent_id)
    }

    /// Frozen occurrences keep their financial fields on blanket parent edits.
    pub fn is_frozen(&self) -> bool {
        self.is_modified || self.is_paid
    }

    /// Current amount/due-date/payment-method triple.
    pub fn financial_snapshot(&self) -> InitialState {
        InitialState {
            amount: self.amount,
            due_date: self.due_date,
            payment_method: self.payment_method.clone(),
        }
    }

    /// Returns whether financial fields drifted from `initial_state`.
    ///
    /// Entries without a snapshot never count as modified.
    pub fn diverges_from_initial(&self) -> bool {
        self.initial_state
            .as_ref()
            .is_some_and(|initial| *initial != self.financial_snapshot())
    }

    pub fn mark_paid(&mut self, payment_date: NaiveDate) {
        self.is_paid = true;
        self.payment_date = Some(payment_date);
    }

    pub fn mark_unpaid(&mut self) {
        self.is_paid = false;
        self.payment_date = None;
    }

    /// Effective amount for one month, honoring `monthly_overrides`.
    pub fn amount_for(&self, month: YearMonth) -> Decimal {
        self.monthly_overrides
            .get(&month)
            .and_then(|entry| entry.amount)
            .unwrap_or(self.amount)
    }

    /// Checks structural invariants of one entry.
    ///
    /// # Errors
    /// - `BlankName` when `name` is empty after trim.
    /// - `MissingRecurrence` when a recurring parent carries no rule.
    /// - `MissingAnchorDate` when a recurring parent has no due date.
    /// - Any rule error from `RecurrenceRule::validate`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        if self.role() == ExpenseRole::Parent {
            let rule = self
                .recurrence
                .as_ref()
                .ok_or(ValidationError::MissingRecurrence)?;
            let anchor = self.due_date.ok_or(ValidationError::MissingAnchorDate)?;
            rule.validate(anchor)?;
        }
        Ok(())
    }
}

/// Input for `LedgerService::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub name: String,
    pub amount: Decimal,
    pub category: String,
    pub expense_type: ExpenseType,
    pub importance: Importance,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub is_recurring: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub monthly_overrides: BTreeMap<YearMonth, MonthOverride>,
}

impl ExpenseDraft {
    pub fn new(name: impl Into<String>, amount: Decimal, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount,
            category: category.into(),
            expense_type: ExpenseType::default(),
            importance: Importance::default(),
            payment_method: None,
            notes: None,
            due_date: None,
            is_recurring: false,
            recurrence: None,
            monthly_overrides: BTreeMap::new(),
        }
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Marks the draft recurring under `rule`.
    pub fn recurring(mut self, rule: RecurrenceRule) -> Self {
        self.is_recurring = true;
        self.recurrence = Some(rule);
        self
    }

    /// Builds the entry this draft describes.
    ///
    /// The result is unvalidated; callers run `Expense::validate`.
    pub fn into_expense(self, id: ExpenseId, now: DateTime<Utc>) -> Expense {
        Expense {
            id,
            name: self.name,
            amount: self.amount,
            category: self.category,
            expense_type: self.expense_type,
            importance: self.importance,
            payment_method: self.payment_method,
            notes: self.notes,
            due_date: self.due_date,
            is_recurring: self.is_recurring,
            recurrence: self.recurrence,
            is_archived: false,
            is_paid: false,
            payment_date: None,
            parent_id: None,
            is_modified: false,
            initial_state: None,
            monthly_overrides: self.monthly_overrides,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by `LedgerService::update`.
///
/// `None` leaves a field untouched. Nullable fields use `Option<Option<_>>`
/// so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpensePatch {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub expense_type: Option<ExpenseType>,
    pub importance: Option<Importance>,
    pub payment_method: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub due_date: Option<NaiveDate>,
    pub recurrence: Option<RecurrenceRule>,
    pub monthly_overrides: Option<BTreeMap<YearMonth, MonthOverride>>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies name/category/type/importance/notes/recurrence metadata.
    pub fn apply_descriptive(&self, target: &mut Expense) {
        if let Some(name) = &self.name {
            target.name = name.clone();
        }
        if let Some(category) = &self.category {
            target.category = category.clone();
        }
        if let Some(expense_type) = self.expense_type {
            target.expense_type = expense_type;
        }
        if let Some(importance) = self.importance {
            target.importance = importance;
        }
        if let Some(notes) = &self.notes {
            target.notes = notes.clone();
        }
        if let Some(recurrence) = &self.recurrence {
            target.is_recurring = true;
            target.recurrence = Some(recurrence.clone());
        }
        if let Some(overrides) = &self.monthly_overrides {
            target.monthly_overrides = overrides.clone();
        }
    }

    /// Applies amount and payment method.
    pub fn apply_financial(&self, target: &mut Expense) {
        if let Some(amount) = self.amount {
            target.amount = amount;
        }
        if let Some(payment_method) = &self.payment_method {
            target.payment_method = payment_method.clone();
        }
    }

    /// Applies every field, including the due date.
    pub fn apply_all(&self, target: &mut Expense) {
        self.apply_descriptive(target);
        self.apply_financial(target);
        if let Some(due_date) = self.due_date {
            target.due_date = Some(due_date);
        }
    }

    /// Returns whether applying this patch to `parent` changes the generated
    /// series: anchor date, count, end date, frequency or interval.
    pub fn changes_shape_of(&self, parent: &Expense) -> bool {
        let anchor_changed = self
            .due_date
            .is_some_and(|due_date| parent.due_date != Some(due_date));
        let rule_changed = match (&self.recurrence, &parent.recurrence) {
            (Some(next), Some(current)) => next.shape_differs(current),
            (Some(_), None) => true,
            (None, _) => false,
        };
        anchor_changed || rule_changed
    }
}

/// Rejected input, raised before any mutation happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankName,
    ZeroInterval,
    ZeroOccurrences,
    EndBeforeAnchor {
        anchor: NaiveDate,
        end_date: NaiveDate,
    },
    MissingAnchorDate,
    MissingRecurrence,
    TooManyOccurrences {
        limit: u32,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::ZeroInterval => write!(f, "recurrence interval must be positive"),
            Self::ZeroOccurrences => write!(f, "recurrence occurrence count must be positive"),
            Self::EndBeforeAnchor { anchor, end_date } => write!(
                f,
                "recurrence end date {end_date} is before anchor date {anchor}"
            ),
            Self::MissingAnchorDate => write!(f, "recurring entry requires a due date"),
            Self::MissingRecurrence => write!(f, "recurring entry requires a recurrence rule"),
            Self::TooManyOccurrences { limit } => {
                write!(f, "recurrence would generate more than {limit} occurrences")
            }
        }
    }
}

impl Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::{
        Expense, ExpenseDraft, ExpensePatch, ExpenseRole, Frequency, RecurrenceRule,
        ValidationError,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn standalone() -> Expense {
        ExpenseDraft::new("Rent", dec!(900), "housing")
            .due(date(2024, 1, 1))
            .into_expense(Uuid::new_v4(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn role_is_derived_from_fields() {
        let mut expense = standalone();
        assert_eq!(expense.role(), ExpenseRole::Standalone);

        expense.is_recurring = true;
        assert_eq!(expense.role(), ExpenseRole::Parent);

        let parent_id = Uuid::new_v4();
        expense.parent_id = Some(parent_id);
        assert_eq!(expense.role(), ExpenseRole::Occurrence { parent_id });
    }

    #[test]
    fn rule_validation_rejects_zero_interval_and_reversed_end() {
        let anchor = date(2024, 3, 1);
        assert_eq!(
            RecurrenceRule::new(Frequency::Daily).every(0).validate(anchor),
            Err(ValidationError::ZeroInterval)
        );
        assert_eq!(
            RecurrenceRule::new(Frequency::Monthly).times(0).validate(anchor),
            Err(ValidationError::ZeroOccurrences)
        );
        assert!(matches!(
            RecurrenceRule::new(Frequency::Monthly)
                .until(date(2024, 2, 1))
                .validate(anchor),
            Err(ValidationError::EndBeforeAnchor { .. })
        ));
    }

    #[test]
    fn parent_without_due_date_is_invalid() {
        let mut expense = standalone();
        expense.is_recurring = true;
        expense.recurrence = Some(RecurrenceRule::new(Frequency::Weekly));
        expense.due_date = None;
        assert_eq!(expense.validate(), Err(ValidationError::MissingAnchorDate));
    }

    #[test]
    fn divergence_tracks_financial_triple_only() {
        let mut expense = standalone();
        expense.initial_state = Some(expense.financial_snapshot());
        expense.name = "Renamed".to_string();
        assert!(!expense.diverges_from_initial());

        expense.amount = dec!(950);
        assert!(expense.diverges_from_initial());
    }

    #[test]
    fn patch_detects_shape_changes() {
        let mut parent = standalone();
        parent.is_recurring = true;
        parent.recurrence = Some(RecurrenceRule::new(Frequency::Monthly).times(3));

        let rename = ExpensePatch {
            name: Some("Lease".to_string()),
            ..ExpensePatch::default()
        };
        assert!(!rename.changes_shape_of(&parent));

        let longer = ExpensePatch {
            recurrence: Some(RecurrenceRule::new(Frequency::Monthly).times(4)),
            ..ExpensePatch::default()
        };
        assert!(longer.changes_shape_of(&parent));

        let same_anchor = ExpensePatch {
            due_date: Some(date(2024, 1, 1)),
            ..ExpensePatch::default()
        };
        assert!(!same_anchor.changes_shape_of(&parent));
    }

    #[test]
    fn serialization_uses_snake_case_wire_fields() {
        let mut expense = standalone();
        expense.expense_type = super::ExpenseType::Subscription;
        let json = serde_json::to_value(&expense).unwrap();
        assert_eq!(json["expense_type"], "subscription");
        assert_eq!(json["due_date"], "2024-01-01");
        assert_eq!(json["is_paid"], false);

        let decoded: Expense = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, expense);
    }
}
