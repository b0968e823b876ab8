//! Export linking.
//!
//! After a module's dependencies are resolved, its aggregate `exports_all`
//! namespace is built: the module's own exports first, then everything its
//! `export * from` sources expose. Name collisions keep the first binding
//! and warn.

use rustc_hash::FxHashMap;

use crate::loader::ModuleLoader;
use crate::module::SharedModule;
use crate::record::ModuleRecord;
use crate::warning::{Warning, WarningCode};

impl ModuleLoader {
    /// Populate `exports_all` for a module whose dependency fetch finished.
    ///
    /// Star re-exports read a snapshot of the dependency's `exports_all`;
    /// the walker links post-order, so dependencies are fully linked first
    /// except across cycles, where the still-loading side contributes what
    /// it has.
    pub(crate) fn link_exports(&self, module: &SharedModule) {
        let (module_id, own_exports, export_all_sources, resolved_ids) = {
            let module = module.read();
            let mut own_exports: Vec<String> = module.exports.iter().cloned().collect();
            own_exports.sort();
            let mut export_all_sources: Vec<String> =
                module.export_all_sources.iter().cloned().collect();
            export_all_sources.sort();
            (
                module.id.clone(),
                own_exports,
                export_all_sources,
                module.resolved_ids.clone(),
            )
        };

        let mut exports_all: FxHashMap<String, String> = FxHashMap::default();
        for name in &own_exports {
            if name != "default" {
                exports_all.insert(name.clone(), module_id.clone());
            }
        }

        for source in &export_all_sources {
            let Some(resolved) = resolved_ids.get(source) else {
                continue;
            };
            if resolved.external {
                continue;
            }
            let dependency = match self.get_module(&resolved.id) {
                Some(ModuleRecord::Internal(dependency)) => dependency,
                _ => continue,
            };

            let mut reexported: Vec<(String, String)> = dependency
                .read()
                .exports_all
                .iter()
                .map(|(name, origin)| (name.clone(), origin.clone()))
                .collect();
            reexported.sort();

            for (name, origin) in reexported {
                if let Some(existing) = exports_all.get(&name) {
                    let message = format!(
                        "conflicting namespaces: \"{}\" re-exports \"{}\" from both \"{}\" and \"{}\", the binding from \"{}\" will be ignored",
                        self.resolver.display_id(&module_id),
                        name,
                        self.resolver.display_id(existing),
                        self.resolver.display_id(&origin),
                        self.resolver.display_id(&origin),
                    );
                    self.warnings.push(
                        Warning::new(WarningCode::NamespaceConflict, message)
                            .with_id(&module_id)
                            .with_source(&name),
                    );
                } else {
                    exports_all.insert(name, origin);
                }
            }
        }

        module.write().exports_all = exports_all;
    }
}
