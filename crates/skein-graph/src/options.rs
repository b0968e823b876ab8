//! Loader configuration.

use crate::matcher::IdMatchValue;
use crate::side_effects::SideEffectsValue;
use crate::warning::Warnings;

/// Configuration surface of the module loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Which specifiers/ids are external to the graph.
    pub external: IdMatchValue,
    /// Side-effect oracle configuration.
    pub module_side_effects: SideEffectsValue,
    /// Externals that may be dropped when unused (consulted by the default
    /// side-effect branch).
    pub pure_external_modules: IdMatchValue,
    /// Keep symlinked ids as written instead of resolving to their targets.
    pub preserve_symlinks: bool,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external(mut self, value: IdMatchValue) -> Self {
        self.external = value;
        self
    }

    pub fn module_side_effects(mut self, value: SideEffectsValue) -> Self {
        self.module_side_effects = value;
        self
    }

    pub fn pure_external_modules(mut self, value: IdMatchValue) -> Self {
        self.pure_external_modules = value;
        self
    }

    pub fn preserve_symlinks(mut self, value: bool) -> Self {
        self.preserve_symlinks = value;
        self
    }

    /// Decode options from a JSON object (config-file shape).
    ///
    /// Unknown or malformed values warn `INVALID_OPTION` and keep their
    /// defaults; predicates cannot be expressed in JSON and must be set
    /// programmatically.
    pub fn from_json(value: &serde_json::Value, warnings: &Warnings) -> Self {
        let mut options = Self::default();
        if let Some(external) = value.get("external") {
            options.external = IdMatchValue::from_json("external", external, warnings);
        }
        if let Some(side_effects) = value.get("moduleSideEffects") {
            options.module_side_effects = SideEffectsValue::from_json(side_effects, warnings);
        }
        if let Some(pure) = value.get("pureExternalModules") {
            options.pure_external_modules =
                IdMatchValue::from_json("pureExternalModules", pure, warnings);
        }
        if let Some(preserve) = value.get("preserveSymlinks") {
            options.preserve_symlinks = preserve.as_bool().unwrap_or(false);
        }
        options
    }
}
