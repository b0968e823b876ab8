//! Source fetching.
//!
//! The plugin `load` hook is consulted first, then the filesystem. Errors
//! from either are wrapped with importer context; a previous build's cache
//! can short-circuit the transformer entirely.

use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::loader::ModuleLoader;
use crate::module::SharedModule;
use crate::transform::SourceDescription;

impl ModuleLoader {
    /// Load, (maybe) replay from cache, and transform one module's source.
    pub(crate) async fn add_module_source(
        &self,
        id: &str,
        importer: Option<&str>,
        module: &SharedModule,
    ) -> LoadResult<()> {
        let loaded = self
            .plugins
            .load(id)
            .await
            .map_err(|error| self.could_not_load(id, importer, error.to_string()))?;

        let description = match loaded {
            Some(output) => SourceDescription {
                code: output.code,
                map: output.map,
                module_side_effects: output.module_side_effects,
                synthetic_named_exports: output.synthetic_named_exports,
            },
            None => {
                let bytes = self
                    .runtime
                    .read_file(Path::new(id))
                    .await
                    .map_err(|error| self.could_not_load(id, importer, error.to_string()))?;
                match String::from_utf8(bytes) {
                    Ok(code) => SourceDescription::new(code),
                    Err(_) => {
                        return Err(LoadError::BadLoader {
                            id: id.to_string(),
                        })
                    }
                }
            }
        };

        // Replay the previous build when the source is unchanged and no
        // plugin kept its own transform cache for this module.
        if let Some(cached) = self.cache.get(id) {
            if cached.original_code == description.code && !cached.custom_transform_cache {
                tracing::debug!(id, "replaying cached module");
                for asset in &cached.emitted_assets {
                    self.plugins.emit_file(asset.clone());
                }
                let mut module = module.write();
                module.original_code = Some(cached.original_code.clone());
                module.set_source(cached.parsed.clone());
                return Ok(());
            }
        }

        // User-declared flags travel with the source and are merged into
        // the module before the transformer sees it.
        {
            let mut module = module.write();
            if let Some(value) = description.module_side_effects {
                module.module_side_effects = value;
            }
            if let Some(value) = description.synthetic_named_exports {
                module.synthetic_named_exports = value;
            }
            module.original_code = Some(description.code.clone());
        }

        let parsed = self
            .transformer
            .transform(description, id)
            .await
            .map_err(LoadError::from)?;
        module.write().set_source(parsed);
        Ok(())
    }

    fn could_not_load(&self, id: &str, importer: Option<&str>, message: String) -> LoadError {
        LoadError::CouldNotLoad {
            id: id.to_string(),
            importer: importer.map(|importer| self.resolver.display_id(importer)),
            message,
        }
    }
}
