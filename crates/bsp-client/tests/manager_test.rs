//! End-to-end tests of the manager against a scripted build server.

mod common;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bsp_client::bsp_server::Message;
use bsp_client::bsp_types::notifications::{
    DidChangeBuildTargetParams, Notification, OnBuildTargetDidChange,
};
use bsp_client::bsp_types::requests::TextDocumentSourceKitOptionsResult;
use bsp_client::bsp_types::{
    BuildTarget, BuildTargetIdentifier, LanguageId, SourceItem, SourceItemData, SourceItemKind,
    SourceKitSourceItemData, SourceKitSourceItemKind, SourcesItem, Uri,
};
use bsp_client::main_files::MainFilesProvider;
use bsp_client::manager::BuildSystemSpec;
use bsp_client::toolchain::NoToolchains;
use bsp_client::{BuildSystemManager, InjectedConnection};

use common::{
    spawn_fake_server, swift_language, test_config, wait_until, FakeServerConfig,
    RecordingDelegate, StaticMainFiles,
};

fn target(uri: &str, dependencies: &[&str]) -> BuildTarget {
    BuildTarget {
        id: BuildTargetIdentifier::new(uri),
        dependencies: dependencies
            .iter()
            .map(|d| BuildTargetIdentifier::new(*d))
            .collect(),
        ..BuildTarget::default()
    }
}

fn file_source(target: &str, uri: &Uri, kind: SourceKitSourceItemKind) -> SourcesItem {
    SourcesItem {
        target: BuildTargetIdentifier::new(target),
        sources: vec![SourceItem {
            uri: uri.clone(),
            kind: SourceItemKind::File,
            generated: false,
            data: Some(SourceItemData::SourceKit(SourceKitSourceItemData {
                language: None,
                kind: Some(kind),
                output_path: None,
            })),
        }],
        roots: None,
    }
}

fn uri(path: &str) -> Uri {
    Uri::new(format!("file://{path}"))
}

struct TestHarness {
    manager: BuildSystemManager,
    server: common::FakeServerHandle,
    delegate: Arc<RecordingDelegate>,
}

fn harness(config: FakeServerConfig) -> TestHarness {
    harness_with_main_files(config, StaticMainFiles::default())
}

fn harness_with_main_files(
    config: FakeServerConfig,
    main_files: StaticMainFiles,
) -> TestHarness {
    let (client_side, server_side) = InjectedConnection::memory();
    let server = spawn_fake_server(server_side, config);
    let manager = BuildSystemManager::new(
        Some(BuildSystemSpec::Injected(client_side)),
        PathBuf::from("/workspace"),
        test_config(),
        Arc::new(NoToolchains),
        Arc::new(main_files) as Arc<dyn MainFilesProvider>,
    )
    .unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    manager.set_delegate(Arc::downgrade(&delegate) as _);
    TestHarness {
        manager,
        server,
        delegate,
    }
}

#[test]
#[ntest::timeout(30000)]
fn initialize_reports_server_capabilities() {
    let harness = harness(FakeServerConfig::default());

    let result = harness.manager.initialize_result().unwrap();
    assert_eq!(result.display_name, "fake build server");
    let data = result.source_kit_data().unwrap();
    assert_eq!(data.prepare_provider, Some(true));
    assert_eq!(data.source_kit_options_provider, Some(true));
}

#[test]
#[ntest::timeout(30000)]
fn targets_and_canonical_target_are_deterministic() {
    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("z://b", &[]), target("z://a", &[])],
        sources: vec![
            file_source("z://b", &file, SourceKitSourceItemKind::Source),
            file_source("z://a", &file, SourceKitSourceItemKind::Source),
        ],
        ..FakeServerConfig::default()
    });

    let targets = harness.manager.targets_for_uri(&file);
    assert_eq!(
        targets,
        vec![
            BuildTargetIdentifier::new("z://a"),
            BuildTargetIdentifier::new("z://b"),
        ]
    );
    assert_eq!(
        harness.manager.canonical_target(&file),
        Some(BuildTargetIdentifier::new("z://a"))
    );
}

#[test]
#[ntest::timeout(30000)]
fn build_settings_are_adjusted_for_semantic_functionality() {
    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        options: HashMap::from([(
            file.clone(),
            TextDocumentSourceKitOptionsResult {
                compiler_arguments: vec![
                    "-c".to_string(),
                    "-o".to_string(),
                    "out.o".to_string(),
                    "-whole-module-optimization".to_string(),
                    "/workspace/a.swift".to_string(),
                ],
                working_directory: Some("/workspace".to_string()),
                data: None,
            },
        )]),
        ..FakeServerConfig::default()
    });

    let settings = harness
        .manager
        .build_settings(
            &file,
            Some(&BuildTargetIdentifier::new("t://a")),
            &swift_language(),
            false,
        )
        .unwrap();

    assert!(!settings.is_fallback);
    for removed in ["-c", "-o", "out.o", "-whole-module-optimization"] {
        assert!(!settings.compiler_arguments.contains(&removed.to_string()));
    }
    assert!(settings
        .compiler_arguments
        .windows(2)
        .any(|pair| pair[0] == "-index-unit-output-path" && pair[1] == "out.o"));
    assert_eq!(settings.working_directory.as_deref(), Some("/workspace"));
}

#[test]
#[ntest::timeout(30000)]
fn headers_follow_their_includers() {
    let header = uri("/workspace/a.h");
    let main_file = uri("/workspace/a.c");
    let harness = harness_with_main_files(
        FakeServerConfig {
            targets: vec![target("t://a", &[])],
            sources: vec![
                file_source("t://a", &main_file, SourceKitSourceItemKind::Source),
                file_source("t://a", &header, SourceKitSourceItemKind::Header),
            ],
            options: HashMap::from([(
                main_file.clone(),
                TextDocumentSourceKitOptionsResult {
                    compiler_arguments: vec![
                        "-DDEBUG".to_string(),
                        "/workspace/a.c".to_string(),
                    ],
                    working_directory: None,
                    data: None,
                },
            )]),
            ..FakeServerConfig::default()
        },
        StaticMainFiles {
            main_files: HashMap::from([(
                header.clone(),
                BTreeSet::from([main_file.clone()]),
            )]),
        },
    );

    let settings = harness
        .manager
        .build_settings_inferred_from_main_file(&header, None, Some(&LanguageId::C), false)
        .unwrap();

    assert!(!settings.is_fallback);
    assert_eq!(settings.compiler_arguments[0], "-xc");
    assert!(settings
        .compiler_arguments
        .contains(&"/workspace/a.h".to_string()));
    assert!(!settings
        .compiler_arguments
        .contains(&"/workspace/a.c".to_string()));
}

#[test]
#[ntest::timeout(30000)]
fn wholesale_change_invalidates_every_cache() {
    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        options: HashMap::from([(
            file.clone(),
            TextDocumentSourceKitOptionsResult {
                compiler_arguments: vec!["/workspace/a.swift".to_string()],
                working_directory: None,
                data: None,
            },
        )]),
        ..FakeServerConfig::default()
    });
    let target_id = BuildTargetIdentifier::new("t://a");

    harness
        .manager
        .build_settings(&file, Some(&target_id), &swift_language(), false)
        .unwrap();
    harness
        .manager
        .build_settings(&file, Some(&target_id), &swift_language(), false)
        .unwrap();
    // Request coalescing: the second query is a cache hit.
    assert_eq!(harness.server.options_requests.load(Ordering::SeqCst), 1);

    harness.manager.register_for_change_notifications(&file, swift_language());
    harness
        .server
        .to_client
        .send(Message::Notification(
            bsp_client::bsp_server::Notification::new(
                OnBuildTargetDidChange::METHOD.to_string(),
                DidChangeBuildTargetParams { changes: None },
            ),
        ))
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        harness.delegate.targets_changed.load(Ordering::SeqCst) == 1
    }));

    // The next query performs a fresh RPC.
    harness
        .manager
        .build_settings(&file, Some(&target_id), &swift_language(), false)
        .unwrap();
    assert_eq!(harness.server.options_requests.load(Ordering::SeqCst), 2);

    // Watched files got a debounced settings-changed event.
    assert!(wait_until(Duration::from_secs(5), || {
        harness
            .delegate
            .settings_changed
            .lock()
            .unwrap()
            .iter()
            .any(|set| set.contains(&file))
    }));
}

#[test]
#[ntest::timeout(30000)]
fn fallback_settings_arrive_within_the_timeout() {
    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        options: HashMap::from([(
            file.clone(),
            TextDocumentSourceKitOptionsResult {
                compiler_arguments: vec!["/workspace/a.swift".to_string()],
                working_directory: None,
                data: None,
            },
        )]),
        // Far beyond the 200 ms fallback timeout.
        options_response_delay: Some(Duration::from_millis(600)),
        ..FakeServerConfig::default()
    });

    let settings = harness
        .manager
        .build_settings(
            &file,
            Some(&BuildTargetIdentifier::new("t://a")),
            &swift_language(),
            true,
        )
        .unwrap();
    assert!(settings.is_fallback);

    // Once the real settings arrive, the editor is told to re-query.
    assert!(wait_until(Duration::from_secs(5), || {
        harness
            .delegate
            .settings_changed
            .lock()
            .unwrap()
            .iter()
            .any(|set| set.contains(&file))
    }));
    let settings = harness
        .manager
        .build_settings(
            &file,
            Some(&BuildTargetIdentifier::new("t://a")),
            &swift_language(),
            true,
        )
        .unwrap();
    assert!(!settings.is_fallback);
}

#[test]
#[ntest::timeout(30000)]
fn immediate_prepares_coalesce_into_one_event() {
    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        ..FakeServerConfig::default()
    });
    let targets = vec![BuildTargetIdentifier::new("t://a")];

    harness.manager.prepare(targets.clone()).unwrap();
    harness.manager.prepare(targets).unwrap();
    assert_eq!(harness.server.prepare_requests.load(Ordering::SeqCst), 2);

    assert!(wait_until(Duration::from_secs(5), || {
        !harness
            .delegate
            .dependencies_updated
            .lock()
            .unwrap()
            .is_empty()
    }));
    // Both prepares fall into one debounce window.
    std::thread::sleep(Duration::from_millis(300));
    let events = harness.delegate.dependencies_updated.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].contains(&file));
}

#[test]
#[ntest::timeout(30000)]
fn topological_sort_and_dependents() {
    let harness = harness(FakeServerConfig {
        targets: vec![
            target("t://a", &["t://b"]),
            target("t://b", &["t://c"]),
            target("t://c", &[]),
        ],
        ..FakeServerConfig::default()
    });

    let sorted = harness.manager.topological_sort(&[
        BuildTargetIdentifier::new("t://a"),
        BuildTargetIdentifier::new("t://b"),
        BuildTargetIdentifier::new("t://c"),
    ]);
    assert_eq!(
        sorted,
        vec![
            BuildTargetIdentifier::new("t://c"),
            BuildTargetIdentifier::new("t://b"),
            BuildTargetIdentifier::new("t://a"),
        ]
    );

    let dependents = harness
        .manager
        .targets_depending_on(&BTreeSet::from([BuildTargetIdentifier::new("t://c")]));
    assert_eq!(
        dependents,
        vec![
            BuildTargetIdentifier::new("t://a"),
            BuildTargetIdentifier::new("t://b"),
        ]
    );
}

#[test]
#[ntest::timeout(30000)]
fn superset_cache_serves_subset_queries() {
    let file_a = uri("/workspace/a.swift");
    let file_b = uri("/workspace/b.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[]), target("t://b", &[])],
        sources: vec![
            file_source("t://a", &file_a, SourceKitSourceItemKind::Source),
            file_source("t://b", &file_b, SourceKitSourceItemKind::Source),
        ],
        ..FakeServerConfig::default()
    });

    let all: BTreeSet<_> = [
        BuildTargetIdentifier::new("t://a"),
        BuildTargetIdentifier::new("t://b"),
    ]
    .into_iter()
    .collect();
    harness.manager.target_sources(all).unwrap();
    let requests_after_full = harness.server.sources_requests.load(Ordering::SeqCst);

    let subset: BTreeSet<_> = [BuildTargetIdentifier::new("t://a")].into_iter().collect();
    let projected = harness.manager.target_sources(subset).unwrap();

    // Served by filtering the cached superset, not by a new RPC.
    assert_eq!(
        harness.server.sources_requests.load(Ordering::SeqCst),
        requests_after_full
    );
    assert_eq!(projected.len(), 1);
    assert_eq!(projected[0].target, BuildTargetIdentifier::new("t://a"));
}

#[test]
#[ntest::timeout(30000)]
fn legacy_push_servers_are_bridged() {
    let file = uri("/workspace/a.c");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        options: HashMap::from([(
            file.clone(),
            TextDocumentSourceKitOptionsResult {
                compiler_arguments: vec!["-DDEBUG".to_string(), "/workspace/a.c".to_string()],
                working_directory: None,
                data: None,
            },
        )]),
        no_pull_options: true,
        ..FakeServerConfig::default()
    });
    let target_id = BuildTargetIdentifier::new("t://a");

    // The first query registers with the push server; the pushed settings arrive moments
    // later, so the manager eventually serves them.
    assert!(wait_until(Duration::from_secs(5), || {
        harness
            .manager
            .build_settings(&file, Some(&target_id), &LanguageId::C, false)
            .map(|settings| !settings.is_fallback)
            .unwrap_or(false)
    }));

    let settings = harness
        .manager
        .build_settings(&file, Some(&target_id), &LanguageId::C, false)
        .unwrap();
    assert!(settings.compiler_arguments.contains(&"-DDEBUG".to_string()));
    // The clang profile appended its indexing extras.
    assert!(settings
        .compiler_arguments
        .contains(&"-fsyntax-only".to_string()));
}

#[test]
#[ntest::timeout(30000)]
fn wait_for_up_to_date_build_graph_flushes_debouncers() {
    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        ..FakeServerConfig::default()
    });

    harness
        .manager
        .prepare(vec![BuildTargetIdentifier::new("t://a")])
        .unwrap();
    harness.manager.wait_for_up_to_date_build_graph();

    // No debounce wait: the event must already be delivered.
    assert!(!harness
        .delegate
        .dependencies_updated
        .lock()
        .unwrap()
        .is_empty());
}

#[test]
#[ntest::timeout(30000)]
fn module_changes_invalidate_all_dependencies_without_background_indexing() {
    use bsp_client::bsp_types::notifications::{
        DidChangeWatchedFilesParams, FileChangeType, FileEvent,
    };

    let file = uri("/workspace/a.swift");
    let harness = harness(FakeServerConfig {
        targets: vec![target("t://a", &[])],
        sources: vec![file_source("t://a", &file, SourceKitSourceItemKind::Source)],
        ..FakeServerConfig::default()
    });

    harness.manager.files_did_change(DidChangeWatchedFilesParams {
        changes: vec![FileEvent {
            uri: uri("/workspace/.build/My.swiftmodule"),
            change_type: FileChangeType::Changed,
        }],
    });

    // Every buildable source file counts as affected.
    assert!(wait_until(Duration::from_secs(5), || {
        harness
            .delegate
            .dependencies_updated
            .lock()
            .unwrap()
            .iter()
            .any(|set| set.contains(&file))
    }));
}

#[test]
#[ntest::timeout(30000)]
fn without_a_build_system_fallback_is_unmarked() {
    let manager = BuildSystemManager::new(
        None,
        PathBuf::from("/workspace"),
        test_config(),
        Arc::new(NoToolchains),
        Arc::new(StaticMainFiles::default()) as Arc<dyn MainFilesProvider>,
    )
    .unwrap();

    let settings = manager
        .build_settings(&uri("/workspace/a.swift"), None, &swift_language(), false)
        .unwrap();
    assert!(!settings.is_fallback);
    assert_eq!(settings.compiler_arguments, vec!["/workspace/a.swift"]);
}
