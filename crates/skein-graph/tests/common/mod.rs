//! Shared test infrastructure for the loader integration tests.
//!
//! The real parser is an external collaborator, so fixtures run through
//! [`StubTransformer`]: a line-oriented scanner that understands just
//! enough ES-module syntax for test sources.

#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use rustc_hash::FxHashMap;
use skein::test_utils::MemoryRuntime;
use skein_graph::{
    DynamicArgument, HookResult, LoadOutput, LoaderOptions, ModuleLoader, ParsedModule, Plugin,
    PluginDriver, ResolveIdAction, ResolveIdArgs, SourceDescription, Transformer,
};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transformer that scans fixture sources and records which modules it saw.
#[derive(Debug, Default)]
pub struct StubTransformer {
    transformed: Mutex<Vec<String>>,
}

impl StubTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transformed_ids(&self) -> Vec<String> {
        self.transformed.lock().unwrap().clone()
    }

    pub fn transform_count(&self, id: &str) -> usize {
        self.transformed
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| seen.as_str() == id)
            .count()
    }
}

#[async_trait]
impl Transformer for StubTransformer {
    async fn transform(
        &self,
        description: SourceDescription,
        module_id: &str,
    ) -> anyhow::Result<ParsedModule> {
        self.transformed.lock().unwrap().push(module_id.to_string());
        Ok(parse_source(&description.code))
    }
}

/// Extract imports and exports from a fixture source.
pub fn parse_source(code: &str) -> ParsedModule {
    let static_import = Regex::new(r#"(?m)^\s*import\s+(?:[^'"]+\s+from\s+)?['"]([^'"]+)['"]"#).unwrap();
    let export_from = Regex::new(r#"(?m)^\s*export\s+(?:\*|\{[^}]*\})\s*from\s+['"]([^'"]+)['"]"#).unwrap();
    let export_star = Regex::new(r#"(?m)^\s*export\s*\*\s*from\s+['"]([^'"]+)['"]"#).unwrap();
    let dynamic_literal = Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap();
    let dynamic_expression = Regex::new(r#"import\(\s*([^'")][^)]*)\)"#).unwrap();
    let named_declaration =
        Regex::new(r#"(?m)^\s*export\s+(?:const|let|var|function|class)\s+([A-Za-z_$][A-Za-z0-9_$]*)"#)
            .unwrap();
    let export_list = Regex::new(r#"(?m)^\s*export\s*\{([^}]*)\}\s*(?:;|$)"#).unwrap();
    let default_export = Regex::new(r#"(?m)^\s*export\s+default\b"#).unwrap();

    let mut sources = Vec::new();
    for capture in static_import.captures_iter(code) {
        sources.push(capture[1].to_string());
    }
    // Re-export sources are dependencies too.
    for capture in export_from.captures_iter(code) {
        let source = capture[1].to_string();
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    let mut dynamic_imports = Vec::new();
    for capture in dynamic_literal.captures_iter(code) {
        dynamic_imports.push(DynamicArgument::Literal(capture[1].to_string()));
    }
    for capture in dynamic_expression.captures_iter(code) {
        dynamic_imports.push(DynamicArgument::Expression(capture[1].trim().to_string()));
    }

    let export_all_sources = export_star
        .captures_iter(code)
        .map(|capture| capture[1].to_string())
        .collect();

    let mut exports = Vec::new();
    for capture in named_declaration.captures_iter(code) {
        exports.push(capture[1].to_string());
    }
    for capture in export_list.captures_iter(code) {
        for binding in capture[1].split(',') {
            let binding = binding.trim();
            if binding.is_empty() {
                continue;
            }
            let exported = binding
                .split_once(" as ")
                .map(|(_, exported)| exported.trim())
                .unwrap_or(binding);
            exports.push(exported.to_string());
        }
    }
    if default_export.is_match(code) {
        exports.push("default".to_string());
    }

    ParsedModule {
        code: code.to_string(),
        sources,
        dynamic_imports,
        export_all_sources,
        exports,
    }
}

/// A loader wired to an in-memory module tree rooted at `/app`.
pub struct TestBuild {
    pub loader: ModuleLoader,
    pub transformer: Arc<StubTransformer>,
    pub plugins: Arc<PluginDriver>,
}

pub fn build(
    files: &[(&str, &str)],
    options: LoaderOptions,
    plugins: Vec<Arc<dyn Plugin>>,
) -> TestBuild {
    let runtime = MemoryRuntime::new("/app");
    for (path, code) in files {
        runtime.add_file(*path, *code);
    }
    let transformer = Arc::new(StubTransformer::new());
    let plugins = Arc::new(PluginDriver::new(plugins));
    let loader = ModuleLoader::new(
        Arc::new(runtime),
        Arc::clone(&plugins),
        Arc::clone(&transformer) as Arc<dyn Transformer>,
        options,
    )
    .unwrap();
    TestBuild {
        loader,
        transformer,
        plugins,
    }
}

/// Resolves specifiers from a fixed specifier-to-action map.
#[derive(Debug, Default)]
pub struct MapResolver {
    map: FxHashMap<String, ResolveIdAction>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, specifier: impl Into<String>, action: ResolveIdAction) -> Self {
        self.map.insert(specifier.into(), action);
        self
    }
}

#[async_trait]
impl Plugin for MapResolver {
    fn name(&self) -> Cow<'static, str> {
        "map-resolver".into()
    }

    async fn resolve_id(&self, args: &ResolveIdArgs<'_>) -> HookResult<Option<ResolveIdAction>> {
        Ok(self.map.get(args.specifier).cloned())
    }
}

/// Serves source text for virtual ids from memory.
#[derive(Debug, Default)]
pub struct VirtualLoader {
    files: FxHashMap<String, String>,
}

impl VirtualLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, code: impl Into<String>) -> Self {
        self.files.insert(id.into(), code.into());
        self
    }
}

#[async_trait]
impl Plugin for VirtualLoader {
    fn name(&self) -> Cow<'static, str> {
        "virtual-loader".into()
    }

    async fn load(&self, id: &str) -> HookResult<Option<LoadOutput>> {
        Ok(self.files.get(id).map(LoadOutput::new))
    }
}

/// Delays loading of matching ids without answering, to force a particular
/// completion interleaving.
#[derive(Debug)]
pub struct SlowLoader {
    pub matching: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl Plugin for SlowLoader {
    fn name(&self) -> Cow<'static, str> {
        "slow-loader".into()
    }

    async fn load(&self, id: &str) -> HookResult<Option<LoadOutput>> {
        if id.contains(self.matching) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(None)
    }
}

/// Answers every `resolve_dynamic_import` with a fixed action.
#[derive(Debug)]
pub struct DynamicResolver {
    pub action: ResolveIdAction,
}

#[async_trait]
impl Plugin for DynamicResolver {
    fn name(&self) -> Cow<'static, str> {
        "dynamic-resolver".into()
    }

    async fn resolve_dynamic_import(
        &self,
        _argument: &DynamicArgument,
        _importer: &str,
    ) -> HookResult<Option<ResolveIdAction>> {
        Ok(Some(self.action.clone()))
    }
}

/// Fails to load matching ids.
#[derive(Debug)]
pub struct FailingLoader {
    pub matching: &'static str,
    pub message: &'static str,
}

#[async_trait]
impl Plugin for FailingLoader {
    fn name(&self) -> Cow<'static, str> {
        "failing-loader".into()
    }

    async fn load(&self, id: &str) -> HookResult<Option<LoadOutput>> {
        if id.contains(self.matching) {
            anyhow::bail!("{}", self.message);
        }
        Ok(None)
    }
}
