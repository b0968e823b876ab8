//! External module nodes.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::module::ModuleInfo;

/// Shared handle to an external module.
pub type SharedExternalModule = Arc<RwLock<ExternalModule>>;

/// A module left as an import in the output rather than loaded into the
/// graph.
#[derive(Debug)]
pub struct ExternalModule {
    pub id: String,
    pub module_side_effects: bool,
    /// Ids of modules statically importing this one, sorted, no duplicates.
    pub importers: Vec<String>,
    /// Kept for snapshot-shape parity with internal modules; dynamic
    /// back-edges are only recorded on internal targets, so this stays
    /// empty.
    pub dynamic_importers: Vec<String>,
}

impl ExternalModule {
    pub(crate) fn new(id: &str, module_side_effects: bool) -> Self {
        Self {
            id: id.to_string(),
            module_side_effects,
            importers: Vec::new(),
            dynamic_importers: Vec::new(),
        }
    }

    /// Serializable snapshot of the module's place in the graph.
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: self.id.clone(),
            is_entry: false,
            is_external: true,
            importers: self.importers.clone(),
            dynamic_importers: self.dynamic_importers.clone(),
            imported_ids: Vec::new(),
            dynamically_imported_ids: Vec::new(),
            has_module_side_effects: self.module_side_effects,
        }
    }
}
