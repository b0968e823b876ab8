//! Non-fatal diagnostics.
//!
//! Warnings never halt loading. They are pushed onto a shared collector the
//! host drains after the build, and mirrored as `tracing` events so they
//! show up live when a subscriber is installed.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable warning codes consumed by hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    UnresolvedImportTreatedAsExternal,
    ExternalSyntheticExports,
    NamespaceConflict,
    InvalidOption,
}

impl WarningCode {
    /// The stable string form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedImportTreatedAsExternal => "UNRESOLVED_IMPORT_TREATED_AS_EXTERNAL",
            Self::ExternalSyntheticExports => "EXTERNAL_SYNTHETIC_EXPORTS",
            Self::NamespaceConflict => "NAMESPACE_CONFLICT",
            Self::InvalidOption => "INVALID_OPTION",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single non-fatal diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
    /// Module the warning is about, when one exists.
    pub id: Option<String>,
    /// Specifier or export name involved, when one exists.
    pub source: Option<String>,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            id: None,
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Shared warning collector, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    inner: Arc<Mutex<Vec<Warning>>>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it as a tracing event.
    pub fn push(&self, warning: Warning) {
        tracing::warn!(code = warning.code.as_str(), "{}", warning.message);
        self.inner.lock().push(warning);
    }

    /// Copy of everything collected so far.
    pub fn snapshot(&self) -> Vec<Warning> {
        self.inner.lock().clone()
    }

    /// Remove and return everything collected so far.
    pub fn drain(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// True if any collected warning carries `code`.
    pub fn contains(&self, code: WarningCode) -> bool {
        self.inner.lock().iter().any(|w| w.code == code)
    }
}
