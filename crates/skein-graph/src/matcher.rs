//! Id matching.
//!
//! Several options (`external`, `pure_external_modules`) accept the same
//! loosely-typed shapes: a blanket boolean, a list of literal names and
//! patterns, or a predicate. [`IdMatcher`] compiles any of them into a
//! uniform `(id, importer, is_resolved) -> bool` check.

use regex::Regex;
use rustc_hash::FxHashSet;
use skein::path::is_synthetic;
use std::fmt;
use std::sync::Arc;

use crate::warning::{Warning, WarningCode, Warnings};

/// User-supplied matching predicate. Returning `None` means "no opinion"
/// and counts as a non-match.
pub type IdPredicate = Arc<dyn Fn(&str, Option<&str>, bool) -> Option<bool> + Send + Sync>;

/// A single entry of a pattern list.
#[derive(Debug, Clone)]
pub enum IdPattern {
    /// Exact id match.
    Exact(String),
    /// Regex match over the whole id.
    Pattern(Regex),
}

impl IdPattern {
    pub fn exact(id: impl Into<String>) -> Self {
        Self::Exact(id.into())
    }

    pub fn pattern(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

/// Configuration value an [`IdMatcher`] is compiled from.
#[derive(Clone, Default)]
pub enum IdMatchValue {
    /// Match nothing (the falsy shapes).
    #[default]
    None,
    /// Match every id.
    All,
    /// Match literal names and regex patterns.
    Patterns(Vec<IdPattern>),
    /// Defer to a user predicate.
    Predicate(IdPredicate),
}

impl fmt::Debug for IdMatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::All => f.write_str("All"),
            Self::Patterns(patterns) => f.debug_tuple("Patterns").field(patterns).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl IdMatchValue {
    /// Decode the loosely-typed JSON shapes accepted in config files.
    ///
    /// `true` matches everything, `false`/`null` match nothing, an array
    /// mixes literal strings with `{"regex": "..."}` objects. Anything else
    /// is reported as `INVALID_OPTION` and ignored.
    pub fn from_json(option: &str, value: &serde_json::Value, warnings: &Warnings) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(true) => Self::All,
            Value::Bool(false) | Value::Null => Self::None,
            Value::Array(items) => {
                let mut patterns = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(literal) => patterns.push(IdPattern::exact(literal)),
                        Value::Object(map) => match map.get("regex").and_then(Value::as_str) {
                            Some(source) => match Regex::new(source) {
                                Ok(regex) => patterns.push(IdPattern::pattern(regex)),
                                Err(error) => warnings.push(invalid_option(
                                    option,
                                    format!("invalid regex \"{}\": {}", source, error),
                                )),
                            },
                            None => warnings.push(invalid_option(
                                option,
                                "pattern objects need a \"regex\" key".to_string(),
                            )),
                        },
                        other => warnings.push(invalid_option(
                            option,
                            format!("unexpected list entry: {}", other),
                        )),
                    }
                }
                Self::Patterns(patterns)
            }
            other => {
                warnings.push(invalid_option(
                    option,
                    format!("expected a boolean, list or function, got: {}", other),
                ));
                Self::None
            }
        }
    }
}

fn invalid_option(option: &str, detail: String) -> Warning {
    Warning::new(
        WarningCode::InvalidOption,
        format!("invalid value for option \"{}\": {}", option, detail),
    )
    .with_source(option)
}

/// Compiled id matcher. Pure and safe to share across tasks.
#[derive(Clone, Default)]
pub struct IdMatcher {
    all: bool,
    literals: FxHashSet<String>,
    patterns: Vec<Regex>,
    predicate: Option<IdPredicate>,
}

impl fmt::Debug for IdMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdMatcher")
            .field("all", &self.all)
            .field("literals", &self.literals)
            .field("patterns", &self.patterns)
            .field("predicate", &self.predicate.as_ref().map(|_| ".."))
            .finish()
    }
}

impl IdMatcher {
    /// Compile a configuration value into a matcher.
    pub fn new(value: IdMatchValue) -> Self {
        match value {
            IdMatchValue::None => Self::default(),
            IdMatchValue::All => Self {
                all: true,
                ..Self::default()
            },
            IdMatchValue::Predicate(predicate) => Self {
                predicate: Some(predicate),
                ..Self::default()
            },
            IdMatchValue::Patterns(entries) => {
                let mut literals = FxHashSet::default();
                let mut patterns = Vec::new();
                for entry in entries {
                    match entry {
                        IdPattern::Exact(literal) => {
                            literals.insert(literal);
                        }
                        IdPattern::Pattern(regex) => patterns.push(regex),
                    }
                }
                Self {
                    literals,
                    patterns,
                    ..Self::default()
                }
            }
        }
    }

    /// Evaluate the matcher.
    ///
    /// Synthetic (NUL-prefixed) ids short-circuit to `false` before a user
    /// predicate could observe them.
    pub fn matches(&self, id: &str, importer: Option<&str>, is_resolved: bool) -> bool {
        if self.all {
            return true;
        }
        if let Some(predicate) = &self.predicate {
            if is_synthetic(id) {
                return false;
            }
            return predicate(id, importer, is_resolved) == Some(true);
        }
        self.literals.contains(id) || self.patterns.iter().any(|regex| regex.is_match(id))
    }
}
