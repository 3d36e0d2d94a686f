use chrono::{NaiveDate, TimeZone, Utc};
use lazyledger_core::recurrence::occurrence_id;
use lazyledger_core::{
    EditScope, ExpenseDraft, ExpensePatch, ExpenseQuery, FixedClock, Frequency, LedgerConfig,
    LedgerService, NoopPersister, RecurrenceRule, SequentialIds, YearMonth,
};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ledger(config: LedgerConfig) -> LedgerService {
    LedgerService::new(
        config,
        Box::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap(),
        )),
        Box::new(SequentialIds::new()),
        NoopPersister,
    )
    .unwrap()
}

fn monthly_rent(count: u32) -> ExpenseDraft {
    ExpenseDraft::new("Rent", dec!(100), "housing")
        .due(date(2024, 1, 1))
        .recurring(RecurrenceRule::new(Frequency::Monthly).times(count))
}

#[test]
fn scenario_a_create_recurring_parent() {
    let mut ledger = ledger(LedgerConfig::default());
    let parent_id = ledger.create(monthly_rent(3)).unwrap();

    let occurrences = ledger.occurrences_of(parent_id);
    let dates: Vec<_> = occurrences.iter().map(|o| o.due_date.unwrap()).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]
    );
    assert!(occurrences.iter().all(|o| o.amount == dec!(100)));
    assert_eq!(ledger.history().past_len(), 1);

    for month in 1..=3 {
        let listed = ledger.query(&ExpenseQuery::for_month(YearMonth::new(2024, month).unwrap()));
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].id, parent_id);
    }
}

#[test]
fn scenario_b_regeneration_keeps_paid_occurrence() {
    let mut ledger = ledger(LedgerConfig::default());
    let parent_id = ledger.create(monthly_rent(3)).unwrap();
    let february = occurrence_id(parent_id, date(2024, 2, 1));
    assert!(ledger.toggle_paid(february));

    let patch = ExpensePatch {
        recurrence: Some(RecurrenceRule::new(Frequency::Monthly).times(4)),
        ..ExpensePatch::default()
    };
    assert!(ledger.update(parent_id, &patch, EditScope::Series).unwrap());

    let occurrences = ledger.occurrences_of(parent_id);
    let dates: Vec<_> = occurrences.iter().map(|o| o.due_date.unwrap()).collect();
    assert_eq!(
        dates,
        vec![
            date(2024, 1, 1),
            date(2024, 2, 1),
            date(2024, 3, 1),
            date(2024, 4, 1)
        ]
    );
    let paid = ledger.get(february).unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.payment_date, Some(date(2024, 1, 10)));
    assert_eq!(occurrences.iter().filter(|o| o.is_paid).count(), 1);
}

#[test]
fn scenario_c_delete_parent_and_undo() {
    let mut ledger = ledger(LedgerConfig::default());
    let parent_id = ledger.create(monthly_rent(3)).unwrap();
    let before = ledger.snapshot();

    assert!(ledger.delete(parent_id));
    assert!(ledger.is_empty());
    assert_eq!(ledger.history().past_len(), 2);

    ledger.undo();
    assert_eq!(ledger.snapshot(), before);
}

#[test]
fn scenario_d_fifty_operations_fully_undoable() {
    let mut ledger = ledger(LedgerConfig::default());
    for index in 0..50 {
        ledger
            .create(ExpenseDraft::new(format!("Item {index}"), dec!(1), "misc"))
            .unwrap();
    }

    for _ in 0..50 {
        assert!(ledger.undo().is_some());
    }
    assert!(!ledger.can_undo());
    assert!(ledger.can_redo());
    assert!(ledger.is_empty());
}

#[test]
fn history_bound_drops_oldest_commands() {
    let config = LedgerConfig {
        history_limit: 3,
        ..LedgerConfig::default()
    };
    let mut ledger = ledger(config);
    for index in 0..5 {
        ledger
            .create(ExpenseDraft::new(format!("Item {index}"), dec!(1), "misc"))
            .unwrap();
    }

    let mut undone = 0;
    while ledger.undo().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 3);
    // The first two creations are past the bound and stay applied.
    assert_eq!(ledger.len(), 2);
}
