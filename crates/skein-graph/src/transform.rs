//! Transformer seam.
//!
//! Parsing and plugin transform pipelines are external collaborators. The
//! loader hands them a [`SourceDescription`] and gets back a
//! [`ParsedModule`]: the body summary graph discovery runs on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skein_plugin::DynamicArgument;

/// Source text plus the flags that travel with it into the transformer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDescription {
    pub code: String,
    /// Source map payload, passed through opaquely.
    pub map: Option<String>,
    pub module_side_effects: Option<bool>,
    pub synthetic_named_exports: Option<bool>,
}

impl SourceDescription {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// Parsed module body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedModule {
    /// Transformed source text.
    pub code: String,
    /// Static import specifiers, in source order.
    pub sources: Vec<String>,
    /// Dynamic import arguments, in source order.
    pub dynamic_imports: Vec<DynamicArgument>,
    /// `export * from` specifiers.
    pub export_all_sources: Vec<String>,
    /// Names declared by the module itself (`"default"` included).
    pub exports: Vec<String>,
}

/// The parser/transform collaborator.
#[async_trait]
pub trait Transformer: Send + Sync + std::fmt::Debug {
    /// Transform and parse one module's source.
    async fn transform(
        &self,
        description: SourceDescription,
        module_id: &str,
    ) -> anyhow::Result<ParsedModule>;
}
