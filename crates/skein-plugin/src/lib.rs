//! # skein-plugin
//!
//! Plugin surface for the skein module loader.
//!
//! Plugins intercept the resolution and loading steps of graph discovery.
//! Every hook is async and optional; returning `Ok(None)` passes control to
//! the next plugin in registration order. The [`PluginDriver`] dispatches
//! hooks first-hook-wins: the first plugin producing a value short-circuits
//! the rest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

mod driver;

pub use driver::PluginDriver;

/// Result type for plugin hooks. Hook failures are host-opaque; the loader
/// wraps them with module context before surfacing them.
pub type HookResult<T> = anyhow::Result<T>;

/// Arguments passed to the `resolve_id` hook.
#[derive(Debug, Clone, Copy)]
pub struct ResolveIdArgs<'a> {
    /// The specifier exactly as written at the import site.
    pub specifier: &'a str,
    /// Id of the importing module; `None` when resolving an entry point.
    pub importer: Option<&'a str>,
}

/// Partial resolution object returned by a plugin.
///
/// Unset fields are filled in by the loader: `external` defaults to
/// internal, the side-effect flag falls back to the configured policy, and
/// synthetic named exports default to off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResolvedId {
    pub id: String,
    pub external: Option<bool>,
    pub module_side_effects: Option<bool>,
    pub synthetic_named_exports: Option<bool>,
}

impl PartialResolvedId {
    /// Resolution carrying only an id; all flags left to the loader.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn external(mut self, external: bool) -> Self {
        self.external = Some(external);
        self
    }

    pub fn module_side_effects(mut self, value: bool) -> Self {
        self.module_side_effects = Some(value);
        self
    }

    pub fn synthetic_named_exports(mut self, value: bool) -> Self {
        self.synthetic_named_exports = Some(value);
        self
    }
}

/// What a `resolve_id` (or `resolve_dynamic_import`) hook produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveIdAction {
    /// A plain id string; the loader decides internal vs external.
    Id(String),
    /// A full resolution object.
    Partial(PartialResolvedId),
    /// Leave the specifier external without resolving it further.
    External,
}

/// Successful output of the `load` hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutput {
    pub code: String,
    /// Source map payload, passed through opaquely.
    pub map: Option<String>,
    pub module_side_effects: Option<bool>,
    pub synthetic_named_exports: Option<bool>,
}

impl LoadOutput {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// The argument of a dynamic `import()` expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicArgument {
    /// A string-literal specifier.
    Literal(String),
    /// Source text of a non-literal argument expression.
    Expression(String),
}

impl DynamicArgument {
    /// The literal specifier, if the argument is one.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(specifier) => Some(specifier),
            Self::Expression(_) => None,
        }
    }
}

/// A file emitted by a plugin during loading, collected by the driver for
/// the host to write out after the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedAsset {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub source: String,
}

/// A loader plugin.
///
/// All hooks default to `Ok(None)` so implementations only override the
/// steps they participate in.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Unique plugin name, used in diagnostics.
    fn name(&self) -> Cow<'static, str>;

    /// Map an import specifier to a module id.
    async fn resolve_id(&self, _args: &ResolveIdArgs<'_>) -> HookResult<Option<ResolveIdAction>> {
        Ok(None)
    }

    /// Provide source text for an id instead of the filesystem.
    async fn load(&self, _id: &str) -> HookResult<Option<LoadOutput>> {
        Ok(None)
    }

    /// Resolve the argument of a dynamic `import()`.
    async fn resolve_dynamic_import(
        &self,
        _argument: &DynamicArgument,
        _importer: &str,
    ) -> HookResult<Option<ResolveIdAction>> {
        Ok(None)
    }
}
