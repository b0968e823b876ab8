//! Internal module nodes.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use skein_plugin::DynamicArgument;
use std::sync::Arc;

use crate::record::ModuleRecord;
use crate::resolved_id::ResolvedId;
use crate::transform::ParsedModule;

/// Shared handle to an internal module.
///
/// Modules live behind shared handles so back-edges are data, not
/// ownership; the graph is cyclic. The lock is only ever held for
/// synchronous bookkeeping, never across a suspension point.
pub type SharedModule = Arc<RwLock<Module>>;

/// A dynamic `import()` site and what it resolved to.
#[derive(Debug, Clone)]
pub struct DynamicImport {
    pub argument: DynamicArgument,
    pub resolution: Option<DynamicResolution>,
}

/// Resolution state of a dynamic import.
#[derive(Debug, Clone)]
pub enum DynamicResolution {
    /// A plugin substituted a replacement specifier; the import is left
    /// unlinked and no module is forced into the registry.
    Specifier(String),
    /// The import is linked to a module in the registry.
    Record(ModuleRecord),
}

/// A module inside the graph.
#[derive(Debug)]
pub struct Module {
    pub id: String,
    pub is_entry_point: bool,
    pub is_user_defined_entry_point: bool,
    pub manual_chunk_alias: Option<String>,
    pub chunk_name: Option<String>,
    pub chunk_file_names: FxHashSet<String>,
    pub user_chunk_names: FxHashSet<String>,
    pub module_side_effects: bool,
    pub synthetic_named_exports: bool,
    /// Source text before transformation, kept for cache comparison.
    pub original_code: Option<String>,
    /// Transformed source text.
    pub code: Option<String>,
    /// Static import specifiers parsed from the body.
    pub sources: FxHashSet<String>,
    /// Dynamic import sites in source order.
    pub dynamic_imports: Vec<DynamicImport>,
    /// Specifiers appearing in `export * from` declarations.
    pub export_all_sources: FxHashSet<String>,
    /// Names declared by the module itself.
    pub exports: FxHashSet<String>,
    /// Aggregate export namespace: name to defining module id.
    pub exports_all: FxHashMap<String, String>,
    /// Memoized resolutions, keyed by specifier. Written at most once per
    /// specifier.
    pub resolved_ids: FxHashMap<String, ResolvedId>,
    /// Ids of modules statically importing this one, sorted, no duplicates.
    pub importers: Vec<String>,
    /// Ids of modules dynamically importing this one, sorted, no duplicates.
    pub dynamic_importers: Vec<String>,
}

impl Module {
    pub(crate) fn new(
        id: &str,
        module_side_effects: bool,
        synthetic_named_exports: bool,
        is_entry: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            is_entry_point: is_entry,
            is_user_defined_entry_point: false,
            manual_chunk_alias: None,
            chunk_name: None,
            chunk_file_names: FxHashSet::default(),
            user_chunk_names: FxHashSet::default(),
            module_side_effects,
            synthetic_named_exports,
            original_code: None,
            code: None,
            sources: FxHashSet::default(),
            dynamic_imports: Vec::new(),
            export_all_sources: FxHashSet::default(),
            exports: FxHashSet::default(),
            exports_all: FxHashMap::default(),
            resolved_ids: FxHashMap::default(),
            importers: Vec::new(),
            dynamic_importers: Vec::new(),
        }
    }

    /// Copy a parsed body into the module.
    pub(crate) fn set_source(&mut self, parsed: ParsedModule) {
        self.sources = parsed.sources.into_iter().collect();
        self.dynamic_imports = parsed
            .dynamic_imports
            .into_iter()
            .map(|argument| DynamicImport {
                argument,
                resolution: None,
            })
            .collect();
        self.export_all_sources = parsed.export_all_sources.into_iter().collect();
        self.exports = parsed.exports.into_iter().collect();
        self.code = Some(parsed.code);
    }

    /// Reconstruct the parsed body, e.g. when feeding a build cache.
    pub(crate) fn parsed_summary(&self) -> ParsedModule {
        let mut sources: Vec<String> = self.sources.iter().cloned().collect();
        sources.sort();
        let mut export_all_sources: Vec<String> =
            self.export_all_sources.iter().cloned().collect();
        export_all_sources.sort();
        let mut exports: Vec<String> = self.exports.iter().cloned().collect();
        exports.sort();
        ParsedModule {
            code: self.code.clone().unwrap_or_default(),
            sources,
            dynamic_imports: self
                .dynamic_imports
                .iter()
                .map(|dynamic| dynamic.argument.clone())
                .collect(),
            export_all_sources,
            exports,
        }
    }

    /// Serializable snapshot of the module's place in the graph.
    pub fn info(&self) -> ModuleInfo {
        let mut imported_ids: Vec<String> = self
            .sources
            .iter()
            .filter_map(|source| self.resolved_ids.get(source))
            .map(|resolved| resolved.id.clone())
            .collect();
        imported_ids.sort();
        imported_ids.dedup();

        let dynamically_imported_ids = self
            .dynamic_imports
            .iter()
            .filter_map(|dynamic| match &dynamic.resolution {
                Some(DynamicResolution::Record(record)) => Some(record.id()),
                _ => None,
            })
            .collect();

        ModuleInfo {
            id: self.id.clone(),
            is_entry: self.is_entry_point,
            is_external: false,
            importers: self.importers.clone(),
            dynamic_importers: self.dynamic_importers.clone(),
            imported_ids,
            dynamically_imported_ids,
            has_module_side_effects: self.module_side_effects,
        }
    }
}

/// Serializable module snapshot exposed to hosts (and the manual-chunk
/// callback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub id: String,
    pub is_entry: bool,
    pub is_external: bool,
    pub importers: Vec<String>,
    pub dynamic_importers: Vec<String>,
    pub imported_ids: Vec<String>,
    pub dynamically_imported_ids: Vec<String>,
    pub has_module_side_effects: bool,
}

/// Insert `id` into a sorted list unless already present.
///
/// Back-edge lists stay sorted and duplicate-free this way, so their order
/// never depends on load completion interleaving.
pub(crate) fn sorted_insert(list: &mut Vec<String>, id: &str) {
    if let Err(position) = list.binary_search_by(|probe| probe.as_str().cmp(id)) {
        list.insert(position, id.to_string());
    }
}
