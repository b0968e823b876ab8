//! First-hook-wins dispatch over an ordered plugin list.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
    DynamicArgument, EmittedAsset, HookResult, LoadOutput, Plugin, ResolveIdAction, ResolveIdArgs,
};

/// Dispatches hooks across plugins in registration order.
///
/// `resolve_id`, `load` and `resolve_dynamic_import` stop at the first
/// plugin returning a value. Emitted assets are accumulated for the host.
#[derive(Debug, Default)]
pub struct PluginDriver {
    plugins: Vec<Arc<dyn Plugin>>,
    emitted: Mutex<Vec<EmittedAsset>>,
}

impl PluginDriver {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            plugins,
            emitted: Mutex::new(Vec::new()),
        }
    }

    /// First-hook-wins `resolve_id` dispatch.
    ///
    /// `skip` names a plugin (by registration index) whose hook is not
    /// consulted; plugins re-entering resolution pass their own index so
    /// they do not see their earlier answer. The value is opaque to
    /// callers that merely thread it through.
    pub async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        skip: Option<usize>,
    ) -> HookResult<Option<ResolveIdAction>> {
        let args = ResolveIdArgs {
            specifier,
            importer,
        };
        for (index, plugin) in self.plugins.iter().enumerate() {
            if skip == Some(index) {
                continue;
            }
            if let Some(action) = plugin.resolve_id(&args).await? {
                tracing::trace!(plugin = %plugin.name(), specifier, "resolve_id hook answered");
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    /// First-hook-wins `load` dispatch.
    pub async fn load(&self, id: &str) -> HookResult<Option<LoadOutput>> {
        for plugin in &self.plugins {
            if let Some(output) = plugin.load(id).await? {
                tracing::trace!(plugin = %plugin.name(), id, "load hook answered");
                return Ok(Some(output));
            }
        }
        Ok(None)
    }

    /// First-hook-wins `resolve_dynamic_import` dispatch.
    pub async fn resolve_dynamic_import(
        &self,
        argument: &DynamicArgument,
        importer: &str,
    ) -> HookResult<Option<ResolveIdAction>> {
        for plugin in &self.plugins {
            if let Some(action) = plugin.resolve_dynamic_import(argument, importer).await? {
                tracing::trace!(plugin = %plugin.name(), importer, "resolve_dynamic_import hook answered");
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    /// Record an emitted asset.
    pub fn emit_file(&self, asset: EmittedAsset) {
        self.emitted.lock().push(asset);
    }

    /// Snapshot of all assets emitted so far.
    pub fn emitted_assets(&self) -> Vec<EmittedAsset> {
        self.emitted.lock().clone()
    }
}
