//! Read-only ledger selectors.
//!
//! # Invariants
//! - A month filter never returns recurring parents or undated entries.
//! - Results are sorted by `(due_date, name, id)`; undated entries last.

use crate::model::expense::{Expense, ExpenseRole};
use crate::model::month::YearMonth;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Filter options for listing ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseQuery {
    /// Restricts to dated, non-parent entries due in this month.
    pub month: Option<YearMonth>,
    /// Case-insensitive category match.
    pub category: Option<String>,
    pub paid: Option<bool>,
    pub include_archived: bool,
}

impl ExpenseQuery {
    pub fn for_month(month: YearMonth) -> Self {
        Self {
            month: Some(month),
            ..Self::default()
        }
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        if !self.include_archived && expense.is_archived {
            return false;
        }
        if let Some(month) = self.month {
            if expense.role() == ExpenseRole::Parent {
                return false;
            }
            if !expense.due_date.is_some_and(|due_date| month.contains(due_date)) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !expense.category.trim().eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }
        if let Some(paid) = self.paid {
            if expense.is_paid != paid {
                return false;
            }
        }
        true
    }
}

/// Applies `query` and returns matches in display order.
pub fn select<'a>(
    entities: impl IntoIterator<Item = &'a Expense>,
    query: &ExpenseQuery,
) -> Vec<&'a Expense> {
    let mut matches: Vec<&Expense> = entities
        .into_iter()
        .filter(|expense| query.matches(expense))
        .collect();
    matches.sort_by(|left, right| display_order(left, right));
    matches
}

/// Sum of effective amounts due in `month`, archived entries excluded.
pub fn month_total<'a>(
    entities: impl IntoIterator<Item = &'a Expense>,
    month: YearMonth,
) -> Decimal {
    let query = ExpenseQuery::for_month(month);
    entities
        .into_iter()
        .filter(|expense| query.matches(expense))
        .map(|expense| expense.amount_for(month))
        .sum()
}

fn display_order(left: &Expense, right: &Expense) -> Ordering {
    let by_date = match (left.due_date, right.due_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then_with(|| left.name.cmp(&right.name))
        .then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
mod tests {
    use super::{month_total, select, ExpenseQuery};
    use crate::model::expense::{Expense, ExpenseDraft, Frequency, MonthOverride, RecurrenceRule};
    use crate::model::month::YearMonth;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn entry(name: &str, amount: Decimal, category: &str, due: Option<(i32, u32, u32)>) -> Expense {
        let mut draft = ExpenseDraft::new(name, amount, category);
        if let Some((y, m, d)) = due {
            draft = draft.due(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        }
        draft.into_expense(Uuid::new_v4(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn month_filter_excludes_parents_and_undated_entries() {
        let mut parent = entry("Rent", dec!(900), "housing", Some((2024, 1, 1)));
        parent.is_recurring = true;
        parent.recurrence = Some(RecurrenceRule::new(Frequency::Monthly));
        let mut occurrence = parent.clone();
        occurrence.id = Uuid::new_v4();
        occurrence.parent_id = Some(parent.id);
        let undated = entry("Gift", dec!(20), "misc", None);

        let all = [parent.clone(), occurrence.clone(), undated];
        let january = YearMonth::new(2024, 1).unwrap();
        let result = select(all.iter(), &ExpenseQuery::for_month(january));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, occurrence.id);
    }

    #[test]
    fn category_and_paid_filters_combine() {
        let mut paid = entry("Bread", dec!(3), "Food", Some((2024, 2, 2)));
        paid.mark_paid(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap());
        let unpaid = entry("Milk", dec!(2), "food", Some((2024, 2, 1)));
        let other = entry("Bus", dec!(2), "transport", Some((2024, 2, 1)));
        let all = [paid, unpaid.clone(), other];

        let query = ExpenseQuery {
            category: Some("FOOD".to_string()),
            paid: Some(false),
            ..ExpenseQuery::default()
        };
        let result = select(all.iter(), &query);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, unpaid.id);
    }

    #[test]
    fn month_total_applies_overrides_and_skips_archived() {
        let february = YearMonth::new(2024, 2).unwrap();
        let mut power = entry("Power", dec!(80), "utilities", Some((2024, 2, 10)));
        power.monthly_overrides.insert(
            february,
            MonthOverride {
                amount: Some(dec!(95)),
                note: None,
            },
        );
        let mut archived = entry("Old", dec!(500), "utilities", Some((2024, 2, 11)));
        archived.is_archived = true;
        let water = entry("Water", dec!(20), "utilities", Some((2024, 2, 12)));

        let all = [power, archived, water];
        assert_eq!(month_total(all.iter(), february), dec!(115));
    }
}
