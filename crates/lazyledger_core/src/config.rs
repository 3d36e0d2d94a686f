//! Ledger engine configuration.
//!
//! # Responsibility
//! - Hold tunables for history depth and open-ended recurrence generation.
//! - Parse configuration documents supplied by the host application.
//!
//! # Invariants
//! - Every limit is strictly positive after `validate()`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of undoable commands retained per session.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Occurrence cap for rules with neither a count nor an end date.
pub const DEFAULT_OCCURRENCE_CAP: u32 = 60;
/// Horizon (months from the anchor) for rules with neither bound.
pub const DEFAULT_HORIZON_MONTHS: u32 = 60;
/// Hard ceiling on occurrences generated for any single rule.
pub const DEFAULT_MAX_GENERATED_OCCURRENCES: u32 = 5_000;

/// Tunables for `LedgerService`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Bound of the undo stack; older commands are dropped.
    pub history_limit: usize,
    /// Maximum occurrences generated for an unbounded rule.
    pub default_occurrence_cap: u32,
    /// Maximum months covered by an unbounded rule.
    pub default_horizon_months: u32,
    /// Rules that would generate more occurrences than this are rejected.
    pub max_generated_occurrences: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_occurrence_cap: DEFAULT_OCCURRENCE_CAP,
            default_horizon_months: DEFAULT_HORIZON_MONTHS,
            max_generated_occurrences: DEFAULT_MAX_GENERATED_OCCURRENCES,
        }
    }
}

impl LedgerConfig {
    /// Parses a JSON document; absent keys keep their defaults.
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed JSON or unknown keys.
    /// - `ConfigError::NonPositive` for zero limits.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::NonPositive("history_limit"));
        }
        if self.default_occurrence_cap == 0 {
            return Err(ConfigError::NonPositive("default_occurrence_cap"));
        }
        if self.default_horizon_months == 0 {
            return Err(ConfigError::NonPositive("default_horizon_months"));
        }
        if self.max_generated_occurrences == 0 {
            return Err(ConfigError::NonPositive("max_generated_occurrences"));
        }
        if self.default_occurrence_cap > self.max_generated_occurrences {
            return Err(ConfigError::CapAboveCeiling {
                cap: self.default_occurrence_cap,
                ceiling: self.max_generated_occurrences,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    NonPositive(&'static str),
    CapAboveCeiling { cap: u32, ceiling: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid ledger config: {message}"),
            Self::NonPositive(key) => write!(f, "ledger config `{key}` must be positive"),
            Self::CapAboveCeiling { cap, ceiling } => write!(
                f,
                "default_occurrence_cap {cap} exceeds max_generated_occurrences {ceiling}"
            ),
        }
    }
}

impl Error for ConfigError {}
