//! Occurrence generator.

use crate::config::LedgerConfig;
use crate::model::expense::{Expense, ExpenseId, Frequency, RecurrenceRule, ValidationError};
use chrono::{Days, Months, NaiveDate};
use uuid::Uuid;

/// Bounds applied while expanding a rule.
///
/// `occurrence_cap` and `horizon_months` only bound rules with neither
/// `occurrences` nor `end_date`. `max_occurrences` bounds every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLimits {
    pub occurrence_cap: u32,
    pub horizon_months: u32,
    pub max_occurrences: u32,
}

impl From<&LedgerConfig> for GenerationLimits {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            occurrence_cap: config.default_occurrence_cap,
            horizon_months: config.default_horizon_months,
            max_occurrences: config.max_generated_occurrences,
        }
    }
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

/// Derives the stable id of the occurrence of `parent_id` due on `due_date`.
pub fn occurrence_id(parent_id: ExpenseId, due_date: NaiveDate) -> ExpenseId {
    Uuid::new_v5(&parent_id, format!("occurrence:{due_date}").as_bytes())
}

/// Returns the `index`-th due date of `rule` counted from `anchor`.
///
/// Dates are offsets from the anchor rather than from the previous date, so
/// month-end anchors clamp per month and recover (Jan 31, Feb 29, Mar 31).
/// Returns `None` on calendar overflow.
pub fn nth_due_date(rule: &RecurrenceRule, anchor: NaiveDate, index: u32) -> Option<NaiveDate> {
    let steps = u64::from(rule.interval).checked_mul(u64::from(index))?;
    match rule.frequency {
        Frequency::Daily | Frequency::CustomDays => anchor.checked_add_days(Days::new(steps)),
        Frequency::Weekly => anchor.checked_add_days(Days::new(steps.checked_mul(7)?)),
        Frequency::Biweekly => anchor.checked_add_days(Days::new(steps.checked_mul(14)?)),
        Frequency::Monthly | Frequency::CustomMonths => {
            let months = u32::try_from(steps).ok()?;
            anchor.checked_add_months(Months::new(months))
        }
    }
}

/// Expands `rule` from `anchor` into occurrences of `parent`.
///
/// Each occurrence copies the parent except for `id` (derived via
/// `occurrence_id`), `due_date`, `parent_id`, `is_modified` (false) and
/// `initial_state` (its own amount/due-date/payment-method).
///
/// # Errors
/// - Any `RecurrenceRule::validate` error; nothing is generated.
/// - `TooManyOccurrences` when the rule would exceed
///   `limits.max_occurrences`, checked before anything is allocated for an
///   explicit count.
pub fn generate(
    parent: &Expense,
    rule: &RecurrenceRule,
    anchor: NaiveDate,
    limits: GenerationLimits,
) -> Result<Vec<Expense>, ValidationError> {
    rule.validate(anchor)?;
    let ceiling = limits.max_occurrences;
    if rule.occurrences.is_some_and(|count| count > ceiling) {
        return Err(ValidationError::TooManyOccurrences { limit: ceiling });
    }

    let unbounded = rule.occurrences.is_none() && rule.end_date.is_none();
    let cap = limits.occurrence_cap.min(ceiling);
    let horizon = anchor.checked_add_months(Months::new(limits.horizon_months));
    let mut occurrences = Vec::new();
    let mut index: u32 = 0;

    loop {
        if rule.occurrences.is_some_and(|count| index >= count) {
            break;
        }
        if unbounded && index >= cap {
            break;
        }
        let Some(due_date) = nth_due_date(rule, anchor, index) else {
            break;
        };
        if rule.end_date.is_some_and(|end_date| due_date > end_date) {
            break;
        }
        if unbounded && horizon.is_some_and(|horizon| due_date > horizon) {
            break;
        }
        if index >= ceiling {
            return Err(ValidationError::TooManyOccurrences { limit: ceiling });
        }

        occurrences.push(instantiate(parent, due_date));
        index += 1;
    }

    Ok(occurrences)
}

fn instantiate(parent: &Expense, due_date: NaiveDate) -> Expense {
    let mut occurrence = parent.clone();
    occurrence.id = occurrence_id(parent.id, due_date);
    occurrence.due_date = Some(due_date);
    occurrence.parent_id = Some(parent.id);
    occurrence.is_modified = false;
    occurrence.initial_state = Some(occurrence.financial_snapshot());
    occurrence
}
