//! Prior-build module cache.
//!
//! A host can extract a [`ModuleCache`] from a finished loader and feed it
//! to the next build. When a module's source is unchanged (and no plugin
//! used a custom transform cache for it), the fetcher skips the transformer
//! and replays the cached parsed state and emitted assets instead.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use skein_plugin::EmittedAsset;

use crate::transform::ParsedModule;

/// Cached state of one module from a previous build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedModule {
    /// Source text before transformation; replay requires an exact match.
    pub original_code: String,
    /// Parsed body from the previous build.
    pub parsed: ParsedModule,
    /// Set when a plugin maintained its own transform cache for this
    /// module; replay is disabled then.
    pub custom_transform_cache: bool,
    /// Assets emitted while this module was transformed, re-emitted on
    /// replay.
    pub emitted_assets: Vec<EmittedAsset>,
}

/// Modules from a previous build, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleCache {
    modules: FxHashMap<String, CachedModule>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, module: CachedModule) {
        self.modules.insert(id.into(), module);
    }

    pub fn get(&self, id: &str) -> Option<&CachedModule> {
        self.modules.get(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
