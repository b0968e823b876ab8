//! The module loader: registry, graph walker, and entry coordination.
//!
//! Discovery fans out concurrently: every entry batch resolves its entries
//! in parallel, every module fetches all of its dependencies in parallel,
//! and dependency edges recurse back into [`ModuleLoader::fetch_module`].
//! The registry guarantees at-most-one module instance per id by inserting
//! a placeholder before any suspension point; a cycle-closing import finds
//! the placeholder and records its edge without waiting.

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use skein::Runtime;
use skein_plugin::{DynamicArgument, PluginDriver, ResolveIdAction};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::cache::{CachedModule, ModuleCache};
use crate::error::{LoadError, LoadResult};
use crate::external_module::ExternalModule;
use crate::matcher::IdMatcher;
use crate::module::{sorted_insert, DynamicResolution, Module, ModuleInfo, SharedModule};
use crate::record::ModuleRecord;
use crate::resolved_id::ResolvedId;
use crate::resolver::Resolver;
use crate::side_effects::SideEffectsPolicy;
use crate::transform::Transformer;
use crate::options::LoaderOptions;
use crate::warning::Warnings;

type SharedLoadFuture = Shared<BoxFuture<'static, ()>>;

/// An entry point the host wants loaded.
#[derive(Debug, Clone, Default)]
pub struct UnresolvedEntry {
    /// Entry specifier, resolved like an import with no importer.
    pub id: String,
    /// Optional importer context for resolution.
    pub importer: Option<String>,
    /// Desired chunk name.
    pub name: Option<String>,
    /// Exact output file name; wins over `name`.
    pub file_name: Option<String>,
}

impl UnresolvedEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn importer(mut self, importer: impl Into<String>) -> Self {
        self.importer = Some(importer.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

impl From<&str> for UnresolvedEntry {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UnresolvedEntry {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Result of one entry batch.
#[derive(Debug)]
pub struct EntryBatch {
    /// All entry modules known so far, in entry-index order.
    pub entry_modules: Vec<SharedModule>,
    /// Manual chunk assignments accumulated so far.
    pub manual_chunk_modules_by_alias: FxHashMap<String, Vec<SharedModule>>,
    /// Modules loaded for this batch, in submission order.
    pub new_entry_modules: Vec<SharedModule>,
}

/// Query surface handed to the `assign_manual_chunks` callback.
pub struct ManualChunksApi<'a> {
    loader: &'a ModuleLoader,
}

impl ManualChunksApi<'_> {
    pub fn get_module_ids(&self) -> Vec<String> {
        self.loader.module_ids()
    }

    pub fn get_module_info(&self, id: &str) -> Option<ModuleInfo> {
        self.loader.get_module_info(id)
    }
}

struct EntrySlot {
    index: usize,
    module: SharedModule,
}

struct LoaderState {
    modules_by_id: RwLock<FxHashMap<String, ModuleRecord>>,
    indexed_entries: Mutex<Vec<EntrySlot>>,
    next_entry_index: AtomicUsize,
    manual_chunk_modules: Mutex<FxHashMap<String, Vec<SharedModule>>>,
    watch_files: Mutex<FxHashSet<String>>,
    latest_load: Mutex<SharedLoadFuture>,
}

impl LoaderState {
    fn new() -> Self {
        Self {
            modules_by_id: RwLock::new(FxHashMap::default()),
            indexed_entries: Mutex::new(Vec::new()),
            next_entry_index: AtomicUsize::new(0),
            manual_chunk_modules: Mutex::new(FxHashMap::default()),
            watch_files: Mutex::new(FxHashSet::default()),
            latest_load: Mutex::new(future::ready(()).boxed().shared()),
        }
    }
}

/// Concurrent, deduplicating module graph discovery.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct ModuleLoader {
    pub(crate) runtime: Arc<dyn Runtime>,
    pub(crate) plugins: Arc<PluginDriver>,
    pub(crate) transformer: Arc<dyn Transformer>,
    pub(crate) resolver: Arc<Resolver>,
    pub(crate) warnings: Warnings,
    pub(crate) cache: Arc<ModuleCache>,
    state: Arc<LoaderState>,
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("modules", &self.state.modules_by_id.read().len())
            .field("entries", &self.state.indexed_entries.lock().len())
            .finish()
    }
}

impl ModuleLoader {
    /// Build a loader over a runtime, plugin pipeline and transformer.
    pub fn new(
        runtime: Arc<dyn Runtime>,
        plugins: Arc<PluginDriver>,
        transformer: Arc<dyn Transformer>,
        options: LoaderOptions,
    ) -> LoadResult<Self> {
        let cwd = runtime
            .get_cwd()
            .map_err(|error| LoadError::Io(error.to_string()))?;
        let warnings = Warnings::new();
        let external = IdMatcher::new(options.external);
        let pure_externals = IdMatcher::new(options.pure_external_modules);
        let side_effects = SideEffectsPolicy::new(options.module_side_effects, pure_externals);
        let resolver = Arc::new(Resolver::new(
            Arc::clone(&runtime),
            Arc::clone(&plugins),
            external,
            side_effects,
            options.preserve_symlinks,
            cwd,
            warnings.clone(),
        ));
        Ok(Self {
            runtime,
            plugins,
            transformer,
            resolver,
            warnings,
            cache: Arc::new(ModuleCache::default()),
            state: Arc::new(LoaderState::new()),
        })
    }

    /// Use a previous build's cache for source replay.
    pub fn with_cache(mut self, cache: ModuleCache) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    /// The shared warning collector.
    pub fn warnings(&self) -> Warnings {
        self.warnings.clone()
    }

    /// Resolve a specifier the way imports are resolved. `skip` is threaded
    /// opaquely into the plugin pipeline.
    pub async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        skip: Option<usize>,
    ) -> LoadResult<Option<ResolvedId>> {
        self.resolver.resolve(specifier, importer, skip).await
    }

    // --- entry coordination ---------------------------------------------

    /// Add a batch of entry points and load their transitive graphs.
    ///
    /// Index reservation is atomic with respect to other batches, so entry
    /// order always reflects submission order no matter how loads
    /// interleave. The returned future also awaits every other batch in
    /// flight (batch quiescence).
    pub async fn add_entry_modules(
        &self,
        entries: Vec<UnresolvedEntry>,
        is_user_defined: bool,
    ) -> LoadResult<EntryBatch> {
        let first_index = self
            .state
            .next_entry_index
            .fetch_add(entries.len(), Ordering::SeqCst);

        let (done_tx, done_rx) = oneshot::channel();
        self.extend_load_chain(done_rx);
        let result = self
            .load_entry_batch(entries, is_user_defined, first_index)
            .await;
        let _ = done_tx.send(());

        let batch = result?;
        self.await_load_finished().await;
        Ok(batch)
    }

    async fn load_entry_batch(
        &self,
        entries: Vec<UnresolvedEntry>,
        is_user_defined: bool,
        first_index: usize,
    ) -> LoadResult<EntryBatch> {
        let loaded = future::try_join_all(
            entries
                .iter()
                .map(|entry| self.load_entry_module(&entry.id, true, entry.importer.as_deref())),
        )
        .await?;

        {
            let mut indexed = self.state.indexed_entries.lock();
            for (offset, (entry, module)) in entries.iter().zip(&loaded).enumerate() {
                let index = first_index + offset;
                {
                    let mut module = module.write();
                    if is_user_defined {
                        module.is_user_defined_entry_point = true;
                    }
                    if let Some(file_name) = &entry.file_name {
                        module.chunk_file_names.insert(file_name.clone());
                    } else if let Some(name) = &entry.name {
                        if module.chunk_name.is_none() {
                            module.chunk_name = Some(name.clone());
                        }
                        if is_user_defined {
                            module.user_chunk_names.insert(name.clone());
                        }
                    }
                }
                // Re-adding an entry keeps the lowest index it was ever
                // submitted at.
                match indexed
                    .iter_mut()
                    .find(|slot| Arc::ptr_eq(&slot.module, module))
                {
                    Some(slot) => slot.index = slot.index.min(index),
                    None => indexed.push(EntrySlot {
                        index,
                        module: Arc::clone(module),
                    }),
                }
            }
            indexed.sort_by_key(|slot| slot.index);
        }

        tracing::debug!(count = loaded.len(), "entry batch loaded");
        Ok(EntryBatch {
            entry_modules: self.entry_modules(),
            manual_chunk_modules_by_alias: self.state.manual_chunk_modules.lock().clone(),
            new_entry_modules: loaded,
        })
    }

    async fn load_entry_module(
        &self,
        specifier: &str,
        is_entry: bool,
        importer: Option<&str>,
    ) -> LoadResult<SharedModule> {
        let resolved = self.resolver.resolve(specifier, importer, None).await?;
        match resolved {
            None => Err(LoadError::UnresolvedEntry {
                specifier: specifier.to_string(),
            }),
            Some(resolved) if resolved.external => Err(LoadError::EntryCannotBeExternal {
                specifier: specifier.to_string(),
            }),
            Some(resolved) => self.fetch_module(&resolved, importer, is_entry).await,
        }
    }

    /// Load the listed ids and group them into manual chunks.
    pub async fn add_manual_chunks(
        &self,
        chunks: Vec<(String, Vec<String>)>,
    ) -> LoadResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.extend_load_chain(done_rx);
        let result = self.load_manual_chunks(&chunks).await;
        let _ = done_tx.send(());

        result?;
        self.await_load_finished().await;
        Ok(())
    }

    async fn load_manual_chunks(&self, chunks: &[(String, Vec<String>)]) -> LoadResult<()> {
        let mut loads = Vec::new();
        for (alias, ids) in chunks {
            for id in ids {
                loads.push(async move {
                    let module = self.load_entry_module(id, false, None).await?;
                    Ok::<_, LoadError>((alias.as_str(), module))
                });
            }
        }
        for (alias, module) in future::try_join_all(loads).await? {
            self.add_module_to_manual_chunk(alias, &module)?;
        }
        Ok(())
    }

    /// Let a callback assign already-loaded modules to manual chunks.
    pub fn assign_manual_chunks<F>(&self, get_manual_chunk: F) -> LoadResult<()>
    where
        F: Fn(&str, &ManualChunksApi<'_>) -> Option<String>,
    {
        let api = ManualChunksApi { loader: self };
        let mut internals: Vec<SharedModule> = self
            .state
            .modules_by_id
            .read()
            .values()
            .filter_map(|record| record.as_internal().map(Arc::clone))
            .collect();
        internals.sort_by_key(|module| module.read().id.clone());

        for module in internals {
            let id = module.read().id.clone();
            if let Some(alias) = get_manual_chunk(&id, &api) {
                self.add_module_to_manual_chunk(&alias, &module)?;
            }
        }
        Ok(())
    }

    fn add_module_to_manual_chunk(&self, alias: &str, module: &SharedModule) -> LoadResult<()> {
        {
            let mut module = module.write();
            match &module.manual_chunk_alias {
                Some(previous) if previous != alias => {
                    return Err(LoadError::CannotAssignModuleToChunk {
                        id: module.id.clone(),
                        alias: alias.to_string(),
                        previous: previous.clone(),
                    });
                }
                // Re-assigning the same alias is a no-op.
                Some(_) => return Ok(()),
                None => module.manual_chunk_alias = Some(alias.to_string()),
            }
        }
        self.state
            .manual_chunk_modules
            .lock()
            .entry(alias.to_string())
            .or_default()
            .push(Arc::clone(module));
        Ok(())
    }

    // --- batch quiescence -----------------------------------------------

    fn extend_load_chain(&self, done: oneshot::Receiver<()>) {
        let mut latest = self.state.latest_load.lock();
        let previous = latest.clone();
        *latest = async move {
            let _ = done.await;
            previous.await;
        }
        .boxed()
        .shared();
    }

    /// Await all currently scheduled batches: snapshot the chain head,
    /// await it, and repeat until no new batch replaced it meanwhile.
    async fn await_load_finished(&self) {
        loop {
            let snapshot = self.state.latest_load.lock().clone();
            snapshot.clone().await;
            if self.state.latest_load.lock().ptr_eq(&snapshot) {
                break;
            }
        }
    }

    // --- registry and graph walker --------------------------------------

    /// Fetch (or reuse) the internal module for a resolved id, loading its
    /// source and dependencies on first fetch.
    pub(crate) fn fetch_module<'a>(
        &'a self,
        resolved: &'a ResolvedId,
        importer: Option<&'a str>,
        is_entry: bool,
    ) -> BoxFuture<'a, LoadResult<SharedModule>> {
        async move {
            let module = {
                let mut modules = self.state.modules_by_id.write();
                if let Some(ModuleRecord::Internal(existing)) = modules.get(&resolved.id) {
                    let existing = Arc::clone(existing);
                    drop(modules);
                    if is_entry {
                        existing.write().is_entry_point = true;
                    }
                    return Ok(existing);
                }
                let module: SharedModule = Arc::new(RwLock::new(Module::new(
                    &resolved.id,
                    resolved.module_side_effects,
                    resolved.synthetic_named_exports,
                    is_entry,
                )));
                modules.insert(resolved.id.clone(), ModuleRecord::Internal(Arc::clone(&module)));
                module
            };
            self.state.watch_files.lock().insert(resolved.id.clone());

            tracing::debug!(id = %resolved.id, "loading module");
            self.add_module_source(&resolved.id, importer, &module).await?;
            self.fetch_all_dependencies(&module).await?;
            self.link_exports(&module);
            Ok(module)
        }
        .boxed()
    }

    async fn fetch_all_dependencies(&self, module: &SharedModule) -> LoadResult<()> {
        let (module_id, sources, dynamic_arguments) = {
            let module = module.read();
            (
                module.id.clone(),
                module.sources.iter().cloned().collect::<Vec<_>>(),
                module
                    .dynamic_imports
                    .iter()
                    .map(|dynamic| dynamic.argument.clone())
                    .collect::<Vec<_>>(),
            )
        };

        let mut loads: Vec<BoxFuture<'_, LoadResult<()>>> = Vec::new();
        for source in sources {
            loads.push(
                self.fetch_static_dependency(module, &module_id, source)
                    .boxed(),
            );
        }
        for (index, argument) in dynamic_arguments.into_iter().enumerate() {
            loads.push(
                self.fetch_dynamic_dependency(module, &module_id, index, argument)
                    .boxed(),
            );
        }
        future::try_join_all(loads).await?;
        Ok(())
    }

    async fn fetch_static_dependency(
        &self,
        module: &SharedModule,
        module_id: &str,
        source: String,
    ) -> LoadResult<()> {
        let resolved = self
            .resolve_dependency_source(module, module_id, &source)
            .await?;
        let record = self
            .fetch_resolved_dependency(&source, module_id, &resolved)
            .await?;
        match &record {
            ModuleRecord::Internal(dependency) => {
                sorted_insert(&mut dependency.write().importers, module_id);
            }
            ModuleRecord::External(dependency) => {
                sorted_insert(&mut dependency.write().importers, module_id);
            }
        }
        Ok(())
    }

    /// Memoized resolution for a module's dependency specifier. The first
    /// write wins; later concurrent resolutions observe the stored result.
    async fn resolve_dependency_source(
        &self,
        module: &SharedModule,
        module_id: &str,
        source: &str,
    ) -> LoadResult<ResolvedId> {
        if let Some(existing) = module.read().resolved_ids.get(source) {
            return Ok(existing.clone());
        }
        let resolved = self.resolver.resolve(source, Some(module_id), None).await?;
        let resolved = self
            .resolver
            .handle_resolve_id(resolved, source, Some(module_id))?;
        let mut module = module.write();
        Ok(module
            .resolved_ids
            .entry(source.to_string())
            .or_insert(resolved)
            .clone())
    }

    async fn fetch_dynamic_dependency(
        &self,
        module: &SharedModule,
        module_id: &str,
        index: usize,
        argument: DynamicArgument,
    ) -> LoadResult<()> {
        let hook_result = self
            .plugins
            .resolve_dynamic_import(&argument, module_id)
            .await
            .map_err(LoadError::from)?;

        let resolved = match (&argument, hook_result) {
            // A plugin substituted a replacement specifier for a non-literal
            // argument; record it and leave the import unlinked.
            (DynamicArgument::Expression(_), Some(ResolveIdAction::Id(specifier))) => {
                module.write().dynamic_imports[index].resolution =
                    Some(DynamicResolution::Specifier(specifier));
                return Ok(());
            }
            (DynamicArgument::Expression(_), Some(ResolveIdAction::Partial(partial))) => {
                Some(ResolvedId {
                    id: partial.id,
                    external: partial.external.unwrap_or(false),
                    module_side_effects: partial.module_side_effects.unwrap_or(true),
                    synthetic_named_exports: partial.synthetic_named_exports.unwrap_or(false),
                })
            }
            (DynamicArgument::Expression(_), _) => None,
            (DynamicArgument::Literal(specifier), Some(action)) => {
                let normalized =
                    self.resolver
                        .normalize_hook_result(Some(action), specifier, Some(module_id));
                Some(
                    self.resolver
                        .handle_resolve_id(normalized, specifier, Some(module_id))?,
                )
            }
            (DynamicArgument::Literal(specifier), None) => Some(
                self.resolve_dependency_source(module, module_id, specifier)
                    .await?,
            ),
        };

        let Some(resolved) = resolved else {
            return Ok(());
        };
        let display = self.resolver.display_id(&resolved.id);
        let record = self
            .fetch_resolved_dependency(&display, module_id, &resolved)
            .await?;
        // Only internal targets get the dynamic back-edge.
        if let ModuleRecord::Internal(dependency) = &record {
            sorted_insert(&mut dependency.write().dynamic_importers, module_id);
        }
        module.write().dynamic_imports[index].resolution = Some(DynamicResolution::Record(record));
        Ok(())
    }

    /// Materialize a dependency as an internal or external registry record.
    async fn fetch_resolved_dependency(
        &self,
        source: &str,
        importer: &str,
        resolved: &ResolvedId,
    ) -> LoadResult<ModuleRecord> {
        if resolved.external {
            let mut modules = self.state.modules_by_id.write();
            return match modules.get(&resolved.id) {
                Some(ModuleRecord::External(existing)) => {
                    Ok(ModuleRecord::External(Arc::clone(existing)))
                }
                Some(ModuleRecord::Internal(_)) => Err(LoadError::InternalIdCannotBeExternal {
                    specifier: source.to_string(),
                    importer: self.resolver.display_id(importer),
                }),
                None => {
                    tracing::debug!(id = %resolved.id, "registering external module");
                    let external = Arc::new(RwLock::new(ExternalModule::new(
                        &resolved.id,
                        resolved.module_side_effects,
                    )));
                    modules.insert(
                        resolved.id.clone(),
                        ModuleRecord::External(Arc::clone(&external)),
                    );
                    Ok(ModuleRecord::External(external))
                }
            };
        }
        Ok(ModuleRecord::Internal(
            self.fetch_module(resolved, Some(importer), false).await?,
        ))
    }

    // --- queries ---------------------------------------------------------

    /// All entry modules, in entry-index order.
    pub fn entry_modules(&self) -> Vec<SharedModule> {
        self.state
            .indexed_entries
            .lock()
            .iter()
            .map(|slot| Arc::clone(&slot.module))
            .collect()
    }

    /// Registry record for an id.
    pub fn get_module(&self, id: &str) -> Option<ModuleRecord> {
        self.state.modules_by_id.read().get(id).cloned()
    }

    /// Serializable snapshot for an id.
    pub fn get_module_info(&self, id: &str) -> Option<ModuleInfo> {
        self.get_module(id).map(|record| record.info())
    }

    /// All known module ids, sorted.
    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.modules_by_id.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids marked for the host's file watcher, sorted.
    pub fn watch_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.state.watch_files.lock().iter().cloned().collect();
        files.sort();
        files
    }

    /// Manual chunk assignments accumulated so far.
    pub fn manual_chunk_modules(&self) -> FxHashMap<String, Vec<SharedModule>> {
        self.state.manual_chunk_modules.lock().clone()
    }

    /// Extract a cache usable by the next build.
    pub fn to_cache(&self) -> ModuleCache {
        let mut cache = ModuleCache::new();
        for (id, record) in self.state.modules_by_id.read().iter() {
            if let ModuleRecord::Internal(module) = record {
                let module = module.read();
                if let Some(original_code) = &module.original_code {
                    cache.insert(
                        id.clone(),
                        CachedModule {
                            original_code: original_code.clone(),
                            parsed: module.parsed_summary(),
                            custom_transform_cache: false,
                            emitted_assets: Vec::new(),
                        },
                    );
                }
            }
        }
        cache
    }
}
