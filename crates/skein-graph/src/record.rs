//! The registry's module sum type.

use crate::external_module::SharedExternalModule;
use crate::module::{ModuleInfo, SharedModule};

/// A registry slot: either an internal module or an external one.
///
/// The two kinds share an id and a side-effect flag; everything else is
/// kind-specific, so the registry stores a tagged sum rather than a common
/// base.
#[derive(Debug, Clone)]
pub enum ModuleRecord {
    Internal(SharedModule),
    External(SharedExternalModule),
}

impl ModuleRecord {
    /// The module's id.
    pub fn id(&self) -> String {
        match self {
            Self::Internal(module) => module.read().id.clone(),
            Self::External(module) => module.read().id.clone(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    pub fn as_internal(&self) -> Option<&SharedModule> {
        match self {
            Self::Internal(module) => Some(module),
            Self::External(_) => None,
        }
    }

    pub fn as_external(&self) -> Option<&SharedExternalModule> {
        match self {
            Self::External(module) => Some(module),
            Self::Internal(_) => None,
        }
    }

    /// Serializable snapshot of either kind.
    pub fn info(&self) -> ModuleInfo {
        match self {
            Self::Internal(module) => module.read().info(),
            Self::External(module) => module.read().info(),
        }
    }
}
