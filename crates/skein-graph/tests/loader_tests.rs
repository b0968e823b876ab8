//! Integration tests for graph discovery: resolution, loading, linking.

mod common;

use common::*;
use miette::Diagnostic;
use skein_graph::{
    DynamicResolution, IdMatchValue, IdPattern, LoadError, LoaderOptions, ModuleRecord,
    PartialResolvedId, ResolveIdAction, SideEffectsValue, WarningCode,
};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn relative_import_resolves_to_internal_module() {
    let build = build(
        &[
            ("/app/index.js", "import './c';\n"),
            ("/app/c.js", "export const c = 1;\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("/app/c.js").unwrap();
    let module = record.as_internal().unwrap().read();
    assert_eq!(module.importers, vec!["/app/index.js"]);
    assert!(module.dynamic_importers.is_empty());
}

#[tokio::test]
async fn bare_import_becomes_external_with_warning() {
    let build = build(
        &[("/app/index.js", "import lodash from 'lodash';\n")],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert!(build
        .loader
        .warnings()
        .contains(WarningCode::UnresolvedImportTreatedAsExternal));

    let record = build.loader.get_module("lodash").unwrap();
    assert!(record.is_external());
    let info = record.info();
    assert!(info.has_module_side_effects);
    assert_eq!(info.importers, vec!["/app/index.js"]);
}

#[tokio::test]
async fn unresolved_relative_import_is_fatal() {
    let build = build(
        &[("/app/index.js", "import './missing';\n")],
        LoaderOptions::new(),
        vec![],
    );

    let err = build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::UnresolvedImport { .. }));
    assert_eq!(err.code().unwrap().to_string(), "UNRESOLVED_IMPORT");
}

#[tokio::test]
async fn export_star_conflict_keeps_own_binding_and_warns() {
    let build = build(
        &[
            ("/app/x.js", "export const foo = 1;\nexport const bar = 2;\n"),
            ("/app/y.js", "export const foo = 3;\nexport * from './x';\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["y.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("/app/y.js").unwrap();
    let module = record.as_internal().unwrap().read();
    assert_eq!(module.exports_all.get("foo").unwrap(), "/app/y.js");
    assert_eq!(module.exports_all.get("bar").unwrap(), "/app/x.js");
    assert!(build.loader.warnings().contains(WarningCode::NamespaceConflict));
}

#[tokio::test]
async fn default_export_is_not_part_of_the_star_namespace() {
    let build = build(
        &[
            ("/app/dep.js", "export default 1;\nexport const named = 2;\n"),
            ("/app/index.js", "export * from './dep';\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("/app/index.js").unwrap();
    let module = record.as_internal().unwrap().read();
    assert!(!module.exports_all.contains_key("default"));
    assert_eq!(module.exports_all.get("named").unwrap(), "/app/dep.js");
}

#[tokio::test]
async fn dynamic_expression_resolved_to_specifier_stays_unlinked() {
    let build = build(
        &[("/app/index.js", "import(dest);\n")],
        LoaderOptions::new(),
        vec![Arc::new(DynamicResolver {
            action: ResolveIdAction::Id("/a/x".to_string()),
        })],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("/app/index.js").unwrap();
    let module = record.as_internal().unwrap().read();
    match &module.dynamic_imports[0].resolution {
        Some(DynamicResolution::Specifier(specifier)) => assert_eq!(specifier, "/a/x"),
        other => panic!("expected a specifier resolution, got {:?}", other),
    }
    assert!(build.loader.get_module("/a/x").is_none());
}

#[tokio::test]
async fn dynamic_literal_links_the_target_module() {
    let build = build(
        &[
            ("/app/index.js", "import './lazy';\nconst p = import('./lazy');\n"),
            ("/app/lazy.js", "export const lazy = true;\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("/app/lazy.js").unwrap();
    {
        let module = record.as_internal().unwrap().read();
        assert_eq!(module.importers, vec!["/app/index.js"]);
        assert_eq!(module.dynamic_importers, vec!["/app/index.js"]);
    }

    let index = build.loader.get_module("/app/index.js").unwrap();
    let index = index.as_internal().unwrap().read();
    // The specifier is resolved once and memoized for both edges.
    assert_eq!(index.resolved_ids.len(), 1);
    match &index.dynamic_imports[0].resolution {
        Some(DynamicResolution::Record(ModuleRecord::Internal(_))) => {}
        other => panic!("expected a linked internal module, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_dependency_is_transformed_once() {
    let build = build(
        &[
            ("/app/index.js", "import './a';\nimport './b';\n"),
            ("/app/a.js", "import './d';\n"),
            ("/app/b.js", "import './d';\n"),
            ("/app/d.js", "export const d = 4;\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert_eq!(build.transformer.transform_count("/app/d.js"), 1);

    let record = build.loader.get_module("/app/d.js").unwrap();
    let module = record.as_internal().unwrap().read();
    assert_eq!(module.importers, vec!["/app/a.js", "/app/b.js"]);
}

#[tokio::test]
async fn synthetic_ids_never_reach_user_predicates() {
    let external_seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let side_effects_seen = Arc::new(Mutex::new(Vec::<String>::new()));

    let external_record = Arc::clone(&external_seen);
    let side_effects_record = Arc::clone(&side_effects_seen);

    let options = LoaderOptions::new()
        .external(IdMatchValue::Predicate(Arc::new(move |id, _, _| {
            external_record.lock().unwrap().push(id.to_string());
            Some(false)
        })))
        .module_side_effects(SideEffectsValue::Predicate(Arc::new(move |id, _| {
            side_effects_record.lock().unwrap().push(id.to_string());
            Some(false)
        })));

    let build = build(
        &[("/app/index.js", "import v from 'virtual';\n")],
        options,
        vec![
            Arc::new(MapResolver::new().with(
                "virtual",
                ResolveIdAction::Id("\0virtual:x".to_string()),
            )),
            Arc::new(VirtualLoader::new().with("\0virtual:x", "export const v = 1;\n")),
        ],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert!(external_seen.lock().unwrap().iter().all(|id| !id.starts_with('\0')));
    assert!(side_effects_seen.lock().unwrap().iter().all(|id| !id.starts_with('\0')));

    // Synthetic modules are pessimistically side-effectful.
    let record = build.loader.get_module("\0virtual:x").unwrap();
    let module = record.as_internal().unwrap().read();
    assert!(module.module_side_effects);
}

#[tokio::test]
async fn external_string_hint_is_renormalized_against_importer() {
    let options = LoaderOptions::new().external(IdMatchValue::Patterns(vec![IdPattern::exact(
        "./lib/helper.js",
    )]));

    let build = build(
        &[("/app/index.js", "import 'helper';\n")],
        options,
        vec![Arc::new(MapResolver::new().with(
            "helper",
            ResolveIdAction::Id("./lib/helper.js".to_string()),
        ))],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("/app/lib/helper.js").unwrap();
    assert!(record.is_external());
}

#[tokio::test]
async fn synthetic_exports_on_an_external_warn_but_resolve() {
    let build = build(
        &[("/app/index.js", "import 'ext-pkg';\n")],
        LoaderOptions::new(),
        vec![Arc::new(MapResolver::new().with(
            "ext-pkg",
            ResolveIdAction::Partial(
                PartialResolvedId::new("ext-pkg")
                    .external(true)
                    .synthetic_named_exports(true),
            ),
        ))],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert!(build
        .loader
        .warnings()
        .contains(WarningCode::ExternalSyntheticExports));

    // The resolution itself is kept.
    let record = build.loader.get_module("ext-pkg").unwrap();
    assert!(record.is_external());
    assert_eq!(record.info().importers, vec!["/app/index.js"]);
}

#[tokio::test]
async fn dynamic_import_of_an_external_records_no_back_edge() {
    let build = build(
        &[("/app/index.js", "const p = import('pkg');\n")],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let record = build.loader.get_module("pkg").unwrap();
    assert!(record.is_external());
    // Dynamic back-edges are only recorded on internal targets.
    let info = record.info();
    assert!(info.dynamic_importers.is_empty());
    assert!(info.importers.is_empty());

    let index = build.loader.get_module("/app/index.js").unwrap();
    let index = index.as_internal().unwrap().read();
    match &index.dynamic_imports[0].resolution {
        Some(DynamicResolution::Record(ModuleRecord::External(_))) => {}
        other => panic!("expected a linked external module, got {:?}", other),
    }
}

#[tokio::test]
async fn internal_id_resolved_as_external_is_fatal() {
    let build = build(
        &[
            ("/app/index.js", "import './shared';\n"),
            ("/app/shared.js", "export const s = 1;\n"),
            ("/app/second.js", "import 'shared-ext';\n"),
        ],
        LoaderOptions::new(),
        vec![Arc::new(MapResolver::new().with(
            "shared-ext",
            ResolveIdAction::Partial(PartialResolvedId::new("/app/shared.js").external(true)),
        ))],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let err = build
        .loader
        .add_entry_modules(vec!["second.js".into()], true)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::InternalIdCannotBeExternal { .. }));
    assert_eq!(
        err.code().unwrap().to_string(),
        "INTERNAL_ID_CANNOT_BE_EXTERNAL"
    );
}

#[tokio::test]
async fn non_utf8_source_is_a_bad_loader() {
    // A file the loader cannot coerce to a string.
    let runtime = skein::test_utils::MemoryRuntime::new("/app")
        .with_file("/app/index.js", "import './bin.js';\n")
        .with_file("/app/bin.js", vec![0xff, 0xfe, 0xfd]);

    let transformer = Arc::new(StubTransformer::new());
    let loader = skein_graph::ModuleLoader::new(
        Arc::new(runtime),
        Arc::new(skein_graph::PluginDriver::new(vec![])),
        Arc::clone(&transformer) as Arc<dyn skein_graph::Transformer>,
        LoaderOptions::new(),
    )
    .unwrap();

    let err = loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::BadLoader { .. }));
    assert_eq!(err.code().unwrap().to_string(), "BAD_LOADER");
}

#[tokio::test]
async fn load_failures_carry_importer_context() {
    let build = build(
        &[
            ("/app/index.js", "import './dep';\n"),
            ("/app/dep.js", "export const d = 1;\n"),
        ],
        LoaderOptions::new(),
        vec![Arc::new(FailingLoader {
            matching: "dep",
            message: "disk on fire",
        })],
    );

    let err = build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap_err();

    match err {
        LoadError::CouldNotLoad { id, importer, message } => {
            assert_eq!(id, "/app/dep.js");
            assert_eq!(importer.as_deref(), Some("index.js"));
            assert!(message.contains("disk on fire"));
        }
        other => panic!("expected a load failure, got {:?}", other),
    }
}

#[tokio::test]
async fn symlinked_ids_follow_the_preserve_symlinks_option() {
    for (preserve, expected) in [(false, "/app/real.js"), (true, "/app/alias.js")] {
        let runtime = skein::test_utils::MemoryRuntime::new("/app")
            .with_file("/app/index.js", "import './alias.js';\n")
            .with_file("/app/real.js", "export const r = 1;\n")
            .with_link("/app/alias.js", "/app/real.js");

        let transformer = Arc::new(StubTransformer::new());
        let loader = skein_graph::ModuleLoader::new(
            Arc::new(runtime),
            Arc::new(skein_graph::PluginDriver::new(vec![])),
            Arc::clone(&transformer) as Arc<dyn skein_graph::Transformer>,
            LoaderOptions::new().preserve_symlinks(preserve),
        )
        .unwrap();

        loader
            .add_entry_modules(vec!["index.js".into()], true)
            .await
            .unwrap();

        assert!(
            loader.get_module(expected).is_some(),
            "preserve_symlinks={} should register {}",
            preserve,
            expected
        );
    }
}

#[tokio::test]
async fn cache_replay_skips_the_transformer_and_reemits_assets() {
    let files = [
        ("/app/index.js", "import './dep';\n"),
        ("/app/dep.js", "export const d = 1;\n"),
    ];

    let first = build(&files, LoaderOptions::new(), vec![]);
    first
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();
    let mut cache = first.loader.to_cache();
    assert_eq!(cache.len(), 2);

    // Attach an asset to the cached entry module; replay must re-emit it.
    let mut cached_entry = cache.get("/app/index.js").unwrap().clone();
    cached_entry.emitted_assets.push(skein_graph::EmittedAsset {
        name: Some("manifest".to_string()),
        file_name: None,
        source: "{}".to_string(),
    });
    cache.insert("/app/index.js", cached_entry);

    let second = build(&files, LoaderOptions::new(), vec![]);
    let loader = second.loader.clone().with_cache(cache);
    loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert!(second.transformer.transformed_ids().is_empty());
    assert_eq!(second.plugins.emitted_assets().len(), 1);

    // The replayed graph is complete.
    let record = loader.get_module("/app/dep.js").unwrap();
    assert_eq!(
        record.as_internal().unwrap().read().importers,
        vec!["/app/index.js"]
    );
}

#[tokio::test]
async fn changed_source_invalidates_the_cache_entry() {
    let first = build(
        &[("/app/index.js", "export const one = 1;\n")],
        LoaderOptions::new(),
        vec![],
    );
    first
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();
    let cache = first.loader.to_cache();

    let second = build(
        &[("/app/index.js", "export const two = 2;\n")],
        LoaderOptions::new(),
        vec![],
    );
    let loader = second.loader.clone().with_cache(cache);
    loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert_eq!(second.transformer.transform_count("/app/index.js"), 1);
    let record = loader.get_module("/app/index.js").unwrap();
    assert!(record.as_internal().unwrap().read().exports.contains("two"));
}

#[tokio::test]
async fn watch_files_track_loaded_modules() {
    let build = build(
        &[
            ("/app/index.js", "import './dep';\n"),
            ("/app/dep.js", "export const d = 1;\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    assert_eq!(
        build.loader.watch_files(),
        vec!["/app/dep.js".to_string(), "/app/index.js".to_string()]
    );
}

#[tokio::test]
async fn pure_external_modules_drive_the_default_policy() {
    let options = LoaderOptions::new()
        .pure_external_modules(IdMatchValue::Patterns(vec![IdPattern::exact("pure-pkg")]));

    let build = build(
        &[("/app/index.js", "import 'pure-pkg';\nimport 'dirty-pkg';\n")],
        options,
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["index.js".into()], true)
        .await
        .unwrap();

    let pure = build.loader.get_module_info("pure-pkg").unwrap();
    let dirty = build.loader.get_module_info("dirty-pkg").unwrap();
    assert!(!pure.has_module_side_effects);
    assert!(dirty.has_module_side_effects);
}

#[tokio::test]
async fn native_runtime_loads_from_disk() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("index.js"), "import './dep';\n").unwrap();
    std::fs::write(temp.path().join("dep.js"), "export const d = 1;\n").unwrap();

    let transformer = Arc::new(StubTransformer::new());
    let loader = skein_graph::ModuleLoader::new(
        Arc::new(skein::NativeRuntime::new()),
        Arc::new(skein_graph::PluginDriver::new(vec![])),
        Arc::clone(&transformer) as Arc<dyn skein_graph::Transformer>,
        LoaderOptions::new(),
    )
    .unwrap();

    // The process cwd is elsewhere, so the entry is an absolute path.
    let entry = temp.path().join("index.js").to_string_lossy().into_owned();
    loader
        .add_entry_modules(vec![entry.into()], true)
        .await
        .unwrap();

    // Canonicalization may rewrite the temp prefix; match by suffix.
    assert!(loader.module_ids().iter().any(|id| id.ends_with("dep.js")));
    assert_eq!(transformer.transformed_ids().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cyclic_imports_converge_on_the_placeholder() {
    let build = build(
        &[
            ("/app/a.js", "import './b';\nexport const a = 1;\n"),
            ("/app/b.js", "import './a';\nexport const b = 2;\n"),
        ],
        LoaderOptions::new(),
        vec![],
    );

    build
        .loader
        .add_entry_modules(vec!["a.js".into()], true)
        .await
        .unwrap();

    assert_eq!(build.transformer.transform_count("/app/a.js"), 1);
    assert_eq!(build.transformer.transform_count("/app/b.js"), 1);

    let a = build.loader.get_module("/app/a.js").unwrap();
    assert_eq!(a.as_internal().unwrap().read().importers, vec!["/app/b.js"]);
}
