//! Import resolution.
//!
//! Combines the user `external` predicate, the plugin `resolve_id`
//! pipeline, and built-in path resolution, then normalizes whatever came
//! back into a [`ResolvedId`].

use skein::path::{
    dirname, is_relative, relative_id, resolve_external_specifier, resolve_from,
};
use skein::Runtime;
use skein_plugin::{PluginDriver, ResolveIdAction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};
use crate::matcher::IdMatcher;
use crate::resolved_id::ResolvedId;
use crate::side_effects::SideEffectsPolicy;
use crate::warning::{Warning, WarningCode, Warnings};

/// Resolution engine shared by the loader's walker and entry coordinator.
#[derive(Debug)]
pub(crate) struct Resolver {
    runtime: Arc<dyn Runtime>,
    plugins: Arc<PluginDriver>,
    external: IdMatcher,
    side_effects: SideEffectsPolicy,
    preserve_symlinks: bool,
    cwd: PathBuf,
    warnings: Warnings,
}

impl Resolver {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        plugins: Arc<PluginDriver>,
        external: IdMatcher,
        side_effects: SideEffectsPolicy,
        preserve_symlinks: bool,
        cwd: PathBuf,
        warnings: Warnings,
    ) -> Self {
        Self {
            runtime,
            plugins,
            external,
            side_effects,
            preserve_symlinks,
            cwd,
            warnings,
        }
    }

    pub fn display_id(&self, id: &str) -> String {
        relative_id(id, &self.cwd)
    }

    /// Resolve a specifier to a canonical [`ResolvedId`], or `None` when
    /// nothing claimed it.
    ///
    /// `skip` is threaded opaquely into the plugin pipeline so a chaining
    /// plugin does not see its own earlier answer.
    pub async fn resolve(
        &self,
        specifier: &str,
        importer: Option<&str>,
        skip: Option<usize>,
    ) -> LoadResult<Option<ResolvedId>> {
        if self.external.matches(specifier, importer, false) {
            let id = resolve_external_specifier(specifier, importer, &self.cwd);
            return Ok(Some(self.external_resolution(id)));
        }

        let raw = match self.plugins.resolve_id(specifier, importer, skip).await? {
            Some(action) => Some(action),
            None => self
                .default_resolve(specifier, importer)
                .map(ResolveIdAction::Id),
        };
        Ok(self.normalize_hook_result(raw, specifier, importer))
    }

    /// Normalize a raw `resolve_id` result into a [`ResolvedId`].
    pub fn normalize_hook_result(
        &self,
        raw: Option<ResolveIdAction>,
        specifier: &str,
        importer: Option<&str>,
    ) -> Option<ResolvedId> {
        match raw {
            Some(ResolveIdAction::Partial(partial)) => {
                let external = partial.external.unwrap_or(false);
                let module_side_effects = partial
                    .module_side_effects
                    .unwrap_or_else(|| self.side_effects.side_effects(&partial.id, external));
                Some(ResolvedId {
                    id: partial.id,
                    external,
                    module_side_effects,
                    synthetic_named_exports: partial.synthetic_named_exports.unwrap_or(false),
                })
            }
            Some(ResolveIdAction::Id(id)) => {
                // An external hint may itself be a relative path, so the id
                // is re-anchored at the importer in that case.
                if self.external.matches(&id, importer, true) {
                    let id = resolve_external_specifier(&id, importer, &self.cwd);
                    Some(self.external_resolution(id))
                } else {
                    let module_side_effects = self.side_effects.side_effects(&id, false);
                    Some(ResolvedId::internal(id, module_side_effects))
                }
            }
            Some(ResolveIdAction::External) => {
                let id = resolve_external_specifier(specifier, importer, &self.cwd);
                Some(self.external_resolution(id))
            }
            None => {
                let id = resolve_external_specifier(specifier, importer, &self.cwd);
                if self.external.matches(&id, importer, true) {
                    Some(self.external_resolution(id))
                } else {
                    None
                }
            }
        }
    }

    /// Apply the unresolved-import policy on top of [`Resolver::resolve`].
    ///
    /// Unresolved relative specifiers are fatal; unresolved bare specifiers
    /// degrade to externals with a warning.
    pub fn handle_resolve_id(
        &self,
        resolved: Option<ResolvedId>,
        specifier: &str,
        importer: Option<&str>,
    ) -> LoadResult<ResolvedId> {
        let Some(resolved) = resolved else {
            if is_relative(specifier) {
                return Err(LoadError::UnresolvedImport {
                    specifier: specifier.to_string(),
                    importer: importer
                        .map(|importer| self.display_id(importer))
                        .unwrap_or_else(|| "the entry point".to_string()),
                });
            }
            self.warnings.push(
                Warning::new(
                    WarningCode::UnresolvedImportTreatedAsExternal,
                    format!(
                        "\"{}\" is imported by {}, but could not be resolved, treating it as an external dependency",
                        specifier,
                        importer
                            .map(|importer| self.display_id(importer))
                            .unwrap_or_else(|| "the entry point".to_string()),
                    ),
                )
                .with_source(specifier),
            );
            return Ok(ResolvedId::external(
                specifier,
                self.side_effects.side_effects(specifier, true),
            ));
        };

        if resolved.external && resolved.synthetic_named_exports {
            self.warnings.push(
                Warning::new(
                    WarningCode::ExternalSyntheticExports,
                    format!(
                        "external module \"{}\" cannot have synthetic named exports enabled",
                        resolved.id
                    ),
                )
                .with_id(&resolved.id)
                .with_source(specifier),
            );
        }
        Ok(resolved)
    }

    fn external_resolution(&self, id: String) -> ResolvedId {
        let module_side_effects = self.side_effects.side_effects(&id, true);
        ResolvedId::external(id, module_side_effects)
    }

    /// Built-in path resolution.
    ///
    /// Bare specifiers imported from a module are left unresolved here; the
    /// unresolved-import policy decides what happens to them. Entries
    /// resolve against the working directory.
    fn default_resolve(&self, specifier: &str, importer: Option<&str>) -> Option<String> {
        if importer.is_some() && !is_relative(specifier) {
            return None;
        }
        let base = match importer {
            Some(importer) => dirname(importer),
            None => self.cwd.clone(),
        };
        self.find_file(&resolve_from(&base, specifier))
    }

    /// Probe a candidate path, with the extension fallbacks sources are
    /// allowed to omit.
    fn find_file(&self, candidate: &Path) -> Option<String> {
        self.probe(candidate)
            .or_else(|| self.probe(&with_appended_extension(candidate, "mjs")))
            .or_else(|| self.probe(&with_appended_extension(candidate, "js")))
    }

    fn probe(&self, candidate: &Path) -> Option<String> {
        if !self.runtime.exists(candidate) {
            return None;
        }
        let resolved = if self.preserve_symlinks {
            candidate.to_path_buf()
        } else {
            self.runtime.canonicalize(candidate).ok()?
        };
        Some(resolved.to_string_lossy().into_owned())
    }
}

fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), extension))
}
