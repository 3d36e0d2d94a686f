//! Ledger persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the opaque `save(entities)` / `load()` collaborator.
//! - Keep SQL and column encodings inside the persistence boundary.
//!
//! # Invariants
//! - `save` replaces the whole table in a single transaction.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - Dates are ISO-8601 text, booleans 0/1, nested values JSON text.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::expense::{
    Expense, ExpenseId, ExpenseType, Importance, InitialState, MonthOverride, RecurrenceRule,
    ValidationError,
};
use crate::model::month::YearMonth;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

const EXPENSE_SELECT_SQL: &str = "SELECT
    id,
    name,
    amount,
    category,
    expense_type,
    importance,
    payment_method,
    notes,
    due_date,
    is_recurring,
    recurrence,
    is_archived,
    is_paid,
    payment_date,
    parent_id,
    is_modified,
    initial_state,
    monthly_overrides,
    created_at,
    updated_at
FROM expenses";

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failure surfaced by `ExpenseStore` implementations.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    Db(DbError),
    InvalidData(String),
    Encode(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted expense data: {message}"),
            Self::Encode(message) => write!(f, "failed to encode expense: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::Encode(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Metadata written alongside every successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub saved_at: DateTime<Utc>,
    pub entity_count: usize,
}

/// Opaque persistence collaborator for the ledger collection.
pub trait ExpenseStore {
    /// Replaces the persisted collection with `entities`.
    fn save(&mut self, entities: &[Expense]) -> StoreResult<()>;
    /// Loads the persisted collection.
    fn load(&self) -> StoreResult<Vec<Expense>>;
}

/// SQLite-backed ledger store owning its connection.
pub struct SqliteExpenseStore {
    conn: Connection,
}

impl SqliteExpenseStore {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns metadata of the most recent successful save.
    pub fn last_save(&self) -> StoreResult<Option<SaveRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT saved_at, entity_count FROM save_log WHERE id = 1;",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((saved_at, entity_count)) => Ok(Some(SaveRecord {
                saved_at: parse_timestamp(&saved_at, "save_log.saved_at")?,
                entity_count: usize::try_from(entity_count).map_err(|_| {
                    StoreError::InvalidData(format!(
                        "invalid entity_count `{entity_count}` in save_log.entity_count"
                    ))
                })?,
            })),
            None => Ok(None),
        }
    }
}

impl ExpenseStore for SqliteExpenseStore {
    fn save(&mut self, entities: &[Expense]) -> StoreResult<()> {
        for entity in entities {
            entity.validate()?;
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM expenses;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO expenses (
                    id, name, amount, category, expense_type, importance,
                    payment_method, notes, due_date, is_recurring, recurrence,
                    is_archived, is_paid, payment_date, parent_id, is_modified,
                    initial_state, monthly_overrides, created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
                );",
            )?;
            for entity in entities {
                insert.execute(params![
                    entity.id.to_string(),
                    entity.name.as_str(),
                    entity.amount.to_string(),
                    entity.category.as_str(),
                    expense_type_to_db(entity.expense_type),
                    importance_to_db(entity.importance),
                    entity.payment_method.as_deref(),
                    entity.notes.as_deref(),
                    entity.due_date.map(|date| date.to_string()),
                    bool_to_int(entity.is_recurring),
                    encode_json(entity.recurrence.as_ref())?,
                    bool_to_int(entity.is_archived),
                    bool_to_int(entity.is_paid),
                    entity.payment_date.map(|date| date.to_string()),
                    entity.parent_id.map(|id| id.to_string()),
                    bool_to_int(entity.is_modified),
                    encode_json(entity.initial_state.as_ref())?,
                    encode_json(Some(&entity.monthly_overrides))?,
                    format_timestamp(entity.created_at),
                    format_timestamp(entity.updated_at),
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO save_log (id, saved_at, entity_count)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                saved_at = excluded.saved_at,
                entity_count = excluded.entity_count;",
            params![format_timestamp(Utc::now()), entities.len() as i64],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn load(&self) -> StoreResult<Vec<Expense>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EXPENSE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            entities.push(parse_expense_row(row)?);
        }

        Ok(entities)
    }
}

fn parse_expense_row(row: &Row<'_>) -> StoreResult<Expense> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "expenses.id")?;

    let amount_text: String = row.get("amount")?;
    let amount = Decimal::from_str(&amount_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid amount `{amount_text}` in expenses.amount"))
    })?;

    let type_text: String = row.get("expense_type")?;
    let expense_type = parse_expense_type(&type_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid expense type `{type_text}` in expenses.expense_type"
        ))
    })?;

    let importance_text: String = row.get("importance")?;
    let importance = parse_importance(&importance_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid importance `{importance_text}` in expenses.importance"
        ))
    })?;

    let parent_id = match row.get::<_, Option<String>>("parent_id")? {
        Some(value) => Some(parse_uuid(&value, "expenses.parent_id")?),
        None => None,
    };

    let expense = Expense {
        id,
        name: row.get("name")?,
        amount,
        category: row.get("category")?,
        expense_type,
        importance,
        payment_method: row.get("payment_method")?,
        notes: row.get("notes")?,
        due_date: parse_optional_date(row.get("due_date")?, "expenses.due_date")?,
        is_recurring: parse_bool(row.get("is_recurring")?, "expenses.is_recurring")?,
        recurrence: decode_json::<RecurrenceRule>(row.get("recurrence")?, "expenses.recurrence")?,
        is_archived: parse_bool(row.get("is_archived")?, "expenses.is_archived")?,
        is_paid: parse_bool(row.get("is_paid")?, "expenses.is_paid")?,
        payment_date: parse_optional_date(row.get("payment_date")?, "expenses.payment_date")?,
        parent_id,
        is_modified: parse_bool(row.get("is_modified")?, "expenses.is_modified")?,
        initial_state: decode_json::<InitialState>(
            row.get("initial_state")?,
            "expenses.initial_state",
        )?,
        monthly_overrides: decode_json::<BTreeMap<YearMonth, MonthOverride>>(
            row.get("monthly_overrides")?,
            "expenses.monthly_overrides",
        )?
        .unwrap_or_default(),
        created_at: parse_timestamp(&row.get::<_, String>("created_at")?, "expenses.created_at")?,
        updated_at: parse_timestamp(&row.get::<_, String>("updated_at")?, "expenses.updated_at")?,
    };
    expense.validate()?;
    Ok(expense)
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<ExpenseId> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_optional_date(value: Option<String>, column: &str) -> StoreResult<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::from_str(&text)
                .map_err(|_| StoreError::InvalidData(format!("invalid date `{text}` in {column}")))
        })
        .transpose()
}

fn parse_timestamp(value: &str, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_bool(value: i64, column: &str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn encode_json<T: serde::Serialize>(value: Option<&T>) -> StoreResult<Option<String>> {
    value
        .map(|inner| {
            serde_json::to_string(inner).map_err(|err| StoreError::Encode(err.to_string()))
        })
        .transpose()
}

fn decode_json<T: serde::de::DeserializeOwned>(
    value: Option<String>,
    column: &str,
) -> StoreResult<Option<T>> {
    value
        .map(|text| {
            serde_json::from_str(&text)
                .map_err(|err| StoreError::InvalidData(format!("invalid json in {column}: {err}")))
        })
        .transpose()
}

fn expense_type_to_db(kind: ExpenseType) -> &'static str {
    match kind {
        ExpenseType::Bill => "bill",
        ExpenseType::Subscription => "subscription",
        ExpenseType::Purchase => "purchase",
        ExpenseType::Loan => "loan",
        ExpenseType::Other => "other",
    }
}

fn parse_expense_type(value: &str) -> Option<ExpenseType> {
    match value {
        "bill" => Some(ExpenseType::Bill),
        "subscription" => Some(ExpenseType::Subscription),
        "purchase" => Some(ExpenseType::Purchase),
        "loan" => Some(ExpenseType::Loan),
        "other" => Some(ExpenseType::Other),
        _ => None,
    }
}

fn importance_to_db(importance: Importance) -> &'static str {
    match importance {
        Importance::Essential => "essential",
        Importance::Important => "important",
        Importance::Optional => "optional",
    }
}

fn parse_importance(value: &str) -> Option<Importance> {
    match value {
        "essential" => Some(Importance::Essential),
        "important" => Some(Importance::Important),
        "optional" => Some(Importance::Optional),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
