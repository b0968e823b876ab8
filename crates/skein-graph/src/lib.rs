//! # skein-graph
//!
//! Module loading and resolution core for an ES-module bundler.
//!
//! Given a set of entry points, [`ModuleLoader`] discovers the full
//! transitive module graph: it resolves import specifiers (through a
//! plugin pipeline and built-in path resolution), loads and transforms
//! source text, links cross-module re-exports, and produces a registry of
//! modules with their resolved edges for downstream chunking and code
//! generation.
//!
//! Loads fan out concurrently, but the same id is never fetched twice, the
//! visible entry ordering follows submission order, and back-edge lists are
//! deterministic regardless of how loads interleave.
//!
//! ## Quick start
//!
//! ```no_run
//! use skein::NativeRuntime;
//! use skein_graph::{LoaderOptions, ModuleLoader};
//! use skein_plugin::PluginDriver;
//! use std::sync::Arc;
//!
//! # #[derive(Debug)] struct MyTransformer;
//! # #[async_trait::async_trait]
//! # impl skein_graph::Transformer for MyTransformer {
//! #     async fn transform(
//! #         &self,
//! #         _description: skein_graph::SourceDescription,
//! #         _module_id: &str,
//! #     ) -> anyhow::Result<skein_graph::ParsedModule> { unimplemented!() }
//! # }
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ModuleLoader::new(
//!     Arc::new(NativeRuntime::new()),
//!     Arc::new(PluginDriver::new(vec![])),
//!     Arc::new(MyTransformer),
//!     LoaderOptions::new(),
//! )?;
//!
//! let batch = loader
//!     .add_entry_modules(vec!["src/index.js".into()], true)
//!     .await?;
//! for module in &batch.entry_modules {
//!     println!("entry: {}", module.read().id);
//! }
//! # Ok(()) }
//! ```

pub mod cache;
pub mod error;
pub mod external_module;
pub mod matcher;
pub mod module;
pub mod options;
pub mod record;
pub mod resolved_id;
pub mod side_effects;
pub mod transform;
pub mod warning;

mod fetcher;
mod linker;
mod loader;
mod resolver;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

pub use cache::{CachedModule, ModuleCache};
pub use error::{LoadError, LoadResult};
pub use external_module::{ExternalModule, SharedExternalModule};
pub use loader::{EntryBatch, ManualChunksApi, ModuleLoader, UnresolvedEntry};
pub use matcher::{IdMatchValue, IdMatcher, IdPattern, IdPredicate};
pub use module::{DynamicImport, DynamicResolution, Module, ModuleInfo, SharedModule};
pub use options::LoaderOptions;
pub use record::ModuleRecord;
pub use resolved_id::ResolvedId;
pub use side_effects::{SideEffectsPolicy, SideEffectsPredicate, SideEffectsValue};
pub use transform::{ParsedModule, SourceDescription, Transformer};
pub use warning::{Warning, WarningCode, Warnings};

// Re-export the plugin surface so hosts depend on one crate.
pub use skein_plugin::{
    DynamicArgument, EmittedAsset, HookResult, LoadOutput, PartialResolvedId, Plugin,
    PluginDriver, ResolveIdAction, ResolveIdArgs,
};
