//! Line-oriented command interpreter over a `LedgerService`.
//!
//! # Responsibility
//! - Parse one input line into a ledger operation and run it.
//! - Render results as plain text on the provided writer.
//!
//! # Invariants
//! - Parse errors never reach the ledger; nothing is mutated.
//! - Ids may be abbreviated to any unique prefix.

use chrono::NaiveDate;
use lazyledger_core::{
    EditScope, Expense, ExpenseDraft, ExpenseId, ExpensePatch, ExpenseQuery, Frequency,
    LedgerError, LedgerService, Persister, RecurrenceRule, YearMonth,
};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::str::FromStr;

const HELP: &str = "commands:
  add <name> <amount> <category> [YYYY-MM-DD]
  add-recurring <name> <amount> <category> <YYYY-MM-DD> <frequency> [count]
      frequency: daily | weekly | biweekly | monthly | days:N | months:N
  edit <id> [--series] field=value...
      fields: name, amount, category, due, method, notes
  pay | archive | unarchive | delete | dup <id>
  undo | redo
  list [YYYY-MM]
  help | quit";

/// Whether the read loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

#[derive(Debug)]
pub enum ShellError {
    Usage(&'static str),
    Parse(String),
    UnknownId(String),
    AmbiguousId(String),
    Ledger(LedgerError),
    Io(std::io::Error),
}

impl Display for ShellError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "usage: {usage}"),
            Self::Parse(message) => f.write_str(message),
            Self::UnknownId(prefix) => write!(f, "no entry matches `{prefix}`"),
            Self::AmbiguousId(prefix) => write!(f, "`{prefix}` matches more than one entry"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "output failed: {err}"),
        }
    }
}

impl Error for ShellError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LedgerError> for ShellError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<std::io::Error> for ShellError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Runs one input line against `ledger`.
///
/// # Errors
/// - `Usage` / `Parse` for malformed input.
/// - `UnknownId` / `AmbiguousId` when an id prefix does not resolve.
/// - `Ledger` when the engine rejects the request.
pub fn execute<P: Persister>(
    ledger: &mut LedgerService<P>,
    line: &str,
    out: &mut impl Write,
) -> Result<Outcome, ShellError> {
    let tokens = tokenize(line)?;
    let Some((command, args)) = tokens.split_first() else {
        return Ok(Outcome::Continue);
    };

    match command.as_str() {
        "add" => add(ledger, args, out)?,
        "add-recurring" => add_recurring(ledger, args, out)?,
        "edit" => edit(ledger, args, out)?,
        "pay" => {
            let id = single_id(ledger, args, "pay <id>")?;
            report(out, ledger.toggle_paid(id), "toggled paid state")?;
        }
        "archive" => {
            let id = single_id(ledger, args, "archive <id>")?;
            report(out, ledger.archive(id), "archived")?;
        }
        "unarchive" => {
            let id = single_id(ledger, args, "unarchive <id>")?;
            report(out, ledger.unarchive(id), "unarchived")?;
        }
        "delete" => {
            let id = single_id(ledger, args, "delete <id>")?;
            report(out, ledger.delete(id), "deleted")?;
        }
        "dup" => {
            let id = single_id(ledger, args, "dup <id>")?;
            match ledger.duplicate(id) {
                Some(copy) => writeln!(out, "duplicated as {}", short(copy))?,
                None => writeln!(out, "nothing to duplicate")?,
            }
        }
        "undo" => match ledger.undo() {
            Some(kind) => writeln!(out, "undid {kind}")?,
            None => writeln!(out, "nothing to undo")?,
        },
        "redo" => match ledger.redo() {
            Some(kind) => writeln!(out, "redid {kind}")?,
            None => writeln!(out, "nothing to redo")?,
        },
        "list" => list(ledger, args, out)?,
        "help" => writeln!(out, "{HELP}")?,
        "quit" | "exit" => return Ok(Outcome::Quit),
        other => {
            return Err(ShellError::Parse(format!(
                "unknown command `{other}`; try `help`"
            )))
        }
    }
    Ok(Outcome::Continue)
}

fn add<P: Persister>(
    ledger: &mut LedgerService<P>,
    args: &[String],
    out: &mut impl Write,
) -> Result<(), ShellError> {
    const USAGE: &str = "add <name> <amount> <category> [YYYY-MM-DD]";
    let (name, amount, category, rest) = match args {
        [name, amount, category, rest @ ..] if rest.len() <= 1 => (name, amount, category, rest),
        _ => return Err(ShellError::Usage(USAGE)),
    };

    let mut draft = ExpenseDraft::new(name.as_str(), parse_amount(amount)?, category.as_str());
    if let Some(due) = rest.first() {
        draft = draft.due(parse_date(due)?);
    }
    let id = ledger.create(draft)?;
    writeln!(out, "created {}", short(id))?;
    Ok(())
}

fn add_recurring<P: Persister>(
    ledger: &mut LedgerService<P>,
    args: &[String],
    out: &mut impl Write,
) -> Result<(), ShellError> {
    const USAGE: &str =
        "add-recurring <name> <amount> <category> <YYYY-MM-DD> <frequency> [count]";
    let (name, amount, category, due, frequency, rest) = match args {
        [name, amount, category, due, frequency, rest @ ..] if rest.len() <= 1 => {
            (name, amount, category, due, frequency, rest)
        }
        _ => return Err(ShellError::Usage(USAGE)),
    };

    let mut rule = parse_frequency(frequency)?;
    if let Some(count) = rest.first() {
        let count = count
            .parse::<u32>()
            .map_err(|_| ShellError::Parse(format!("invalid count `{count}`")))?;
        rule = rule.times(count);
    }
    let draft = ExpenseDraft::new(name.as_str(), parse_amount(amount)?, category.as_str())
        .due(parse_date(due)?)
        .recurring(rule);
    let id = ledger.create(draft)?;
    let generated = ledger.occurrences_of(id).len();
    writeln!(out, "created {} with {generated} occurrences", short(id))?;
    Ok(())
}

fn edit<P: Persister>(
    ledger: &mut LedgerService<P>,
    args: &[String],
    out: &mut impl Write,
) -> Result<(), ShellError> {
    const USAGE: &str = "edit <id> [--series] field=value...";
    let Some((prefix, fields)) = args.split_first() else {
        return Err(ShellError::Usage(USAGE));
    };
    let id = resolve_id(ledger, prefix)?;

    let mut scope = EditScope::Instance;
    let mut patch = ExpensePatch::default();
    for field in fields {
        if field == "--series" {
            scope = EditScope::Series;
            continue;
        }
        let (key, value) = field.split_once('=').ok_or(ShellError::Usage(USAGE))?;
        match key {
            "name" => patch.name = Some(value.to_string()),
            "amount" => patch.amount = Some(parse_amount(value)?),
            "category" => patch.category = Some(value.to_string()),
            "due" => patch.due_date = Some(parse_date(value)?),
            "method" => patch.payment_method = Some(optional_text(value)),
            "notes" => patch.notes = Some(optional_text(value)),
            other => return Err(ShellError::Parse(format!("unknown field `{other}`"))),
        }
    }
    if patch.is_empty() {
        return Err(ShellError::Usage(USAGE));
    }

    let changed = ledger.update(id, &patch, scope)?;
    report(out, changed, "updated")?;
    Ok(())
}

fn list<P: Persister>(
    ledger: &LedgerService<P>,
    args: &[String],
    out: &mut impl Write,
) -> Result<(), ShellError> {
    let query = match args {
        [] => ExpenseQuery::default(),
        [month] => {
            let month = YearMonth::from_str(month)
                .map_err(|_| ShellError::Parse(format!("invalid month `{month}`")))?;
            ExpenseQuery::for_month(month)
        }
        _ => return Err(ShellError::Usage("list [YYYY-MM]")),
    };

    let rows = ledger.query(&query);
    for expense in &rows {
        writeln!(out, "{}", render_row(expense))?;
    }
    if let Some(month) = query.month {
        writeln!(
            out,
            "{} entries, total {}",
            rows.len(),
            ledger.month_total(month)
        )?;
    } else {
        writeln!(out, "{} entries", rows.len())?;
    }
    Ok(())
}

fn render_row(expense: &Expense) -> String {
    let due = expense
        .due_date
        .map_or_else(|| "----------".to_string(), |date| date.to_string());
    let mut flags = Vec::new();
    if expense.is_parent() {
        flags.push("series");
    }
    if expense.is_paid {
        flags.push("paid");
    }
    if expense.is_modified {
        flags.push("modified");
    }
    if expense.is_archived {
        flags.push("archived");
    }
    format!(
        "{}  {}  {:<20} {:>10}  {}  {}",
        short(expense.id),
        due,
        expense.name,
        expense.amount,
        expense.category,
        flags.join(",")
    )
}

fn report(out: &mut impl Write, changed: bool, done: &str) -> std::io::Result<()> {
    if changed {
        writeln!(out, "{done}")
    } else {
        writeln!(out, "no change")
    }
}

fn single_id<P: Persister>(
    ledger: &LedgerService<P>,
    args: &[String],
    usage: &'static str,
) -> Result<ExpenseId, ShellError> {
    match args {
        [prefix] => resolve_id(ledger, prefix),
        _ => Err(ShellError::Usage(usage)),
    }
}

fn resolve_id<P: Persister>(
    ledger: &LedgerService<P>,
    prefix: &str,
) -> Result<ExpenseId, ShellError> {
    let needle = prefix.to_ascii_lowercase();
    let mut matches = ledger
        .entities()
        .map(|expense| expense.id)
        .filter(|id| id.to_string().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (None, _) => Err(ShellError::UnknownId(prefix.to_string())),
        (Some(_), Some(_)) => Err(ShellError::AmbiguousId(prefix.to_string())),
    }
}

fn short(id: ExpenseId) -> String {
    id.simple().to_string().chars().take(8).collect()
}

fn parse_amount(value: &str) -> Result<Decimal, ShellError> {
    Decimal::from_str(value).map_err(|_| ShellError::Parse(format!("invalid amount `{value}`")))
}

fn parse_date(value: &str) -> Result<NaiveDate, ShellError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ShellError::Parse(format!("invalid date `{value}`; expected YYYY-MM-DD")))
}

fn parse_frequency(value: &str) -> Result<RecurrenceRule, ShellError> {
    let invalid = || ShellError::Parse(format!("invalid frequency `{value}`"));
    let rule = match value {
        "daily" => RecurrenceRule::new(Frequency::Daily),
        "weekly" => RecurrenceRule::new(Frequency::Weekly),
        "biweekly" => RecurrenceRule::new(Frequency::Biweekly),
        "monthly" => RecurrenceRule::new(Frequency::Monthly),
        other => {
            let (unit, count) = other.split_once(':').ok_or_else(invalid)?;
            let interval = count.parse::<u32>().map_err(|_| invalid())?;
            let frequency = match unit {
                "days" => Frequency::CustomDays,
                "months" => Frequency::CustomMonths,
                _ => return Err(invalid()),
            };
            RecurrenceRule::new(frequency).every(interval)
        }
    };
    Ok(rule)
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Splits on whitespace; double quotes group words.
fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            ch if ch.is_whitespace() && !quoted => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            ch => {
                current.push(ch);
                pending = true;
            }
        }
    }
    if quoted {
        return Err(ShellError::Parse("unterminated quote".to_string()));
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::{execute, tokenize, Outcome, ShellError};
    use lazyledger_core::{LedgerConfig, LedgerService};

    fn run(ledger: &mut LedgerService, line: &str) -> String {
        let mut out = Vec::new();
        execute(ledger, line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn tokenize_groups_quoted_words() {
        assert_eq!(
            tokenize(r#"add "Gym pass" 30 health"#).unwrap(),
            vec!["add", "Gym pass", "30", "health"]
        );
        assert!(tokenize(r#"add "open"#).is_err());
    }

    #[test]
    fn recurring_add_list_and_undo() {
        let mut ledger = LedgerService::in_memory(LedgerConfig::default()).unwrap();
        let created = run(
            &mut ledger,
            "add-recurring Rent 900 housing 2024-01-01 monthly 3",
        );
        assert!(created.contains("with 3 occurrences"));

        let listed = run(&mut ledger, "list 2024-02");
        assert!(listed.contains("2024-02-01"));
        assert!(listed.contains("1 entries, total 900"));

        assert_eq!(run(&mut ledger, "undo"), "undid create\n");
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn malformed_input_is_rejected_without_mutation() {
        let mut ledger = LedgerService::in_memory(LedgerConfig::default()).unwrap();
        let mut out = Vec::new();

        assert!(matches!(
            execute(&mut ledger, "add Tea abc food", &mut out),
            Err(ShellError::Parse(_))
        ));
        assert!(matches!(
            execute(&mut ledger, "pay 1234", &mut out),
            Err(ShellError::UnknownId(_))
        ));
        assert!(matches!(
            execute(&mut ledger, "add-recurring Rent 1 housing 2024-01-01 days:0", &mut out),
            Err(ShellError::Ledger(_))
        ));
        assert!(ledger.is_empty());
        assert_eq!(execute(&mut ledger, "quit", &mut out).unwrap(), Outcome::Quit);
    }

    #[test]
    fn oversized_count_is_refused() {
        let mut ledger = LedgerService::in_memory(LedgerConfig::default()).unwrap();
        let mut out = Vec::new();

        let result = execute(
            &mut ledger,
            "add-recurring Coffee 3 food 2024-01-01 daily 4000000000",
            &mut out,
        );
        match result {
            Err(ShellError::Ledger(err)) => assert!(err.to_string().contains("5000")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(ledger.is_empty());
        assert!(!ledger.can_undo());
    }
}
