//! Side-effect policy.
//!
//! Tree-shaking downstream needs a `(id, external) -> bool` oracle saying
//! whether a module may be assumed side-effect free. The policy is derived
//! from the `module_side_effects` option, with the `pure_external_modules`
//! matcher as the fallback for the default shape.

use rustc_hash::FxHashSet;
use skein::path::is_synthetic;
use std::fmt;
use std::sync::Arc;

use crate::matcher::IdMatcher;
use crate::warning::{Warning, WarningCode, Warnings};

/// User-supplied side-effect predicate. Returning `None` means "no opinion",
/// which counts as side-effectful.
pub type SideEffectsPredicate = Arc<dyn Fn(&str, bool) -> Option<bool> + Send + Sync>;

/// Configuration value the policy is derived from.
#[derive(Clone, Default)]
pub enum SideEffectsValue {
    /// Pure-externals fallback: externals matched by `pure_external_modules`
    /// are side-effect free, everything else has side effects.
    #[default]
    Default,
    /// Constant answer for every module.
    Bool(bool),
    /// Internal modules have side effects, externals do not
    /// (the `"no-external"` shape).
    NoExternal,
    /// Defer to a user predicate.
    Predicate(SideEffectsPredicate),
    /// Only the listed ids have side effects.
    Ids(Vec<String>),
}

impl fmt::Debug for SideEffectsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::NoExternal => f.write_str("NoExternal"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
        }
    }
}

impl SideEffectsValue {
    /// Decode the loosely-typed JSON shapes accepted in config files.
    ///
    /// Invalid shapes warn `INVALID_OPTION` and fall through to the default
    /// pure-externals branch.
    pub fn from_json(value: &serde_json::Value, warnings: &Warnings) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(flag) => Self::Bool(*flag),
            Value::String(text) if text == "no-external" => Self::NoExternal,
            Value::Array(items) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(id) => ids.push(id.to_string()),
                        None => warnings.push(invalid(format!(
                            "list entries must be strings, got: {}",
                            item
                        ))),
                    }
                }
                Self::Ids(ids)
            }
            other => {
                warnings.push(invalid(format!(
                    "expected a boolean, \"no-external\", list or function, got: {}",
                    other
                )));
                Self::Default
            }
        }
    }
}

fn invalid(detail: String) -> Warning {
    Warning::new(
        WarningCode::InvalidOption,
        format!("invalid value for option \"module_side_effects\": {}", detail),
    )
    .with_source("module_side_effects")
}

/// Compiled `(id, external) -> bool` oracle.
#[derive(Clone)]
pub struct SideEffectsPolicy {
    value: SideEffectsValue,
    ids: FxHashSet<String>,
    pure_externals: IdMatcher,
}

impl fmt::Debug for SideEffectsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffectsPolicy")
            .field("value", &self.value)
            .finish()
    }
}

impl SideEffectsPolicy {
    pub fn new(value: SideEffectsValue, pure_externals: IdMatcher) -> Self {
        let ids = match &value {
            SideEffectsValue::Ids(list) => list.iter().cloned().collect(),
            _ => FxHashSet::default(),
        };
        Self {
            value,
            ids,
            pure_externals,
        }
    }

    /// Whether the module at `id` must be assumed to have side effects.
    ///
    /// Synthetic (NUL-prefixed) ids never reach the user predicate and are
    /// pessimistically side-effectful.
    pub fn side_effects(&self, id: &str, external: bool) -> bool {
        match &self.value {
            SideEffectsValue::Bool(value) => *value,
            SideEffectsValue::NoExternal => !external,
            SideEffectsValue::Predicate(predicate) => {
                if is_synthetic(id) {
                    return true;
                }
                predicate(id, external) != Some(false)
            }
            SideEffectsValue::Ids(_) => self.ids.contains(id),
            SideEffectsValue::Default => {
                !(external && self.pure_externals.matches(id, None, true))
            }
        }
    }
}
