//! Canonical resolution record.

use serde::{Deserialize, Serialize};

/// Canonical form of a resolved reference.
///
/// Produced by the resolver from whatever shape a plugin (or the built-in
/// path resolution) returned; every edge of the graph points at one of
/// these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedId {
    /// Absolute identifier: a filesystem path, a synthetic id, or a bare
    /// external name.
    pub id: String,
    /// The module stays outside the graph.
    pub external: bool,
    /// Whether the module must be assumed to have side effects.
    pub module_side_effects: bool,
    /// Named exports are synthesized by a plugin rather than parsed.
    pub synthetic_named_exports: bool,
}

impl ResolvedId {
    /// Internal resolution with the given side-effect flag.
    pub fn internal(id: impl Into<String>, module_side_effects: bool) -> Self {
        Self {
            id: id.into(),
            external: false,
            module_side_effects,
            synthetic_named_exports: false,
        }
    }

    /// External resolution with the given side-effect flag.
    pub fn external(id: impl Into<String>, module_side_effects: bool) -> Self {
        Self {
            id: id.into(),
            external: true,
            module_side_effects,
            synthetic_named_exports: false,
        }
    }
}
