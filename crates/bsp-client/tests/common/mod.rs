//! A scripted in-process build server and recording delegate for manager tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bsp_client::bsp_server::{ErrorCode, Message, Response};
use bsp_client::bsp_types::notifications::{
    BuildTargetEvent, Notification, OnSourceKitOptionsChanged, SourceKitOptions,
    SourceKitOptionsChangedParams, TaskId,
};
use bsp_client::bsp_types::requests::{
    BuildServerCapabilities, InitializeBuildResult, InitializeBuildResultData,
    SourceKitInitializeBuildResponseData, SourcesParams, SourcesResult,
    TextDocumentSourceKitOptionsParams, TextDocumentSourceKitOptionsResult,
    WorkspaceBuildTargetsResult,
};
use bsp_client::bsp_types::{BuildTarget, LanguageId, SourcesItem, StatusCode, Uri};
use bsp_client::delegate::BuildSystemManagerDelegate;
use bsp_client::main_files::MainFilesProvider;
use bsp_client::{BuildSystemManagerConfig, InjectedConnection};

#[derive(Default)]
pub struct FakeServerConfig {
    pub targets: Vec<BuildTarget>,
    pub sources: Vec<SourcesItem>,
    pub options: HashMap<Uri, TextDocumentSourceKitOptionsResult>,
    /// When false, the server only publishes settings through the legacy push notification.
    pub no_pull_options: bool,
    /// Sleep before answering an options request, to test fallback timeouts.
    pub options_response_delay: Option<Duration>,
}

pub struct FakeServerHandle {
    pub options_requests: Arc<AtomicUsize>,
    pub prepare_requests: Arc<AtomicUsize>,
    pub sources_requests: Arc<AtomicUsize>,
    /// Push notifications toward the manager through this sender.
    pub to_client: crossbeam_channel::Sender<Message>,
}

pub fn spawn_fake_server(
    connection: InjectedConnection,
    config: FakeServerConfig,
) -> FakeServerHandle {
    let options_requests = Arc::new(AtomicUsize::new(0));
    let prepare_requests = Arc::new(AtomicUsize::new(0));
    let sources_requests = Arc::new(AtomicUsize::new(0));

    let handle = FakeServerHandle {
        options_requests: Arc::clone(&options_requests),
        prepare_requests: Arc::clone(&prepare_requests),
        sources_requests: Arc::clone(&sources_requests),
        to_client: connection.sender.clone(),
    };

    std::thread::spawn(move || {
        let sender = connection.sender;
        for message in connection.receiver {
            let request = match message {
                Message::Request(request) => request,
                Message::Notification(notification) => {
                    if notification.method == "build/exit" {
                        break;
                    }
                    continue;
                }
                Message::Response(_) => continue,
            };

            let response = match request.method.as_str() {
                "build/initialize" => Response::new_ok(
                    request.id,
                    InitializeBuildResult {
                        display_name: "fake build server".to_string(),
                        version: "1.0.0".to_string(),
                        bsp_version: "2.1.0".to_string(),
                        capabilities: BuildServerCapabilities {
                            build_target_changed_provider: Some(true),
                        },
                        data: Some(InitializeBuildResultData::SourceKit(
                            SourceKitInitializeBuildResponseData {
                                index_store_path: None,
                                index_database_path: None,
                                watchers: None,
                                prepare_provider: Some(true),
                                source_kit_options_provider: Some(!config.no_pull_options),
                                output_paths_provider: Some(true),
                            },
                        )),
                    },
                ),
                "build/shutdown" | "workspace/waitForBuildSystemUpdates" => {
                    Response::new_ok(request.id, ())
                }
                "workspace/buildTargets" => Response::new_ok(
                    request.id,
                    WorkspaceBuildTargetsResult {
                        targets: config.targets.clone(),
                    },
                ),
                "buildTarget/sources" => {
                    sources_requests.fetch_add(1, Ordering::SeqCst);
                    let params: SourcesParams =
                        serde_json::from_value(request.params.clone()).unwrap();
                    let items = config
                        .sources
                        .iter()
                        .filter(|item| params.targets.contains(&item.target))
                        .cloned()
                        .collect();
                    Response::new_ok(request.id, SourcesResult { items })
                }
                "textDocument/sourceKitOptions" => {
                    options_requests.fetch_add(1, Ordering::SeqCst);
                    if let Some(delay) = config.options_response_delay {
                        std::thread::sleep(delay);
                    }
                    let params: TextDocumentSourceKitOptionsParams =
                        serde_json::from_value(request.params.clone()).unwrap();
                    Response::new_ok(
                        request.id,
                        config.options.get(&params.text_document.uri).cloned(),
                    )
                }
                "buildTarget/prepare" => {
                    prepare_requests.fetch_add(1, Ordering::SeqCst);
                    Response::new_ok(request.id, ())
                }
                "textDocument/registerForChanges" => {
                    let uri: Uri = serde_json::from_value(
                        request.params.get("uri").cloned().unwrap_or_default(),
                    )
                    .unwrap();
                    let response = Response::new_ok(request.id, ());
                    let _ = sender.send(Message::Response(response));
                    // Publish the registered document's options, as push servers do.
                    if let Some(options) = config.options.get(&uri) {
                        let _ = sender.send(Message::Notification(
                            bsp_client::bsp_server::Notification::new(
                                OnSourceKitOptionsChanged::METHOD.to_string(),
                                SourceKitOptionsChangedParams {
                                    uri,
                                    updated_options: SourceKitOptions {
                                        options: options.compiler_arguments.clone(),
                                        working_directory: options.working_directory.clone(),
                                    },
                                },
                            ),
                        ));
                    }
                    continue;
                }
                _ => Response::new_err(
                    request.id,
                    ErrorCode::MethodNotFound as i32,
                    format!("unknown method {}", request.method),
                ),
            };
            if sender.send(Message::Response(response)).is_err() {
                break;
            }
        }
    });

    handle
}

#[derive(Default)]
pub struct RecordingDelegate {
    pub settings_changed: Mutex<Vec<BTreeSet<Uri>>>,
    pub dependencies_updated: Mutex<Vec<BTreeSet<Uri>>>,
    pub targets_changed: AtomicUsize,
}

impl BuildSystemManagerDelegate for RecordingDelegate {
    fn file_build_settings_changed(&self, changed_files: &BTreeSet<Uri>) {
        self.settings_changed
            .lock()
            .unwrap()
            .push(changed_files.clone());
    }

    fn files_dependencies_updated(&self, changed_files: &BTreeSet<Uri>) {
        self.dependencies_updated
            .lock()
            .unwrap()
            .push(changed_files.clone());
    }

    fn build_targets_changed(&self, _changes: Option<Vec<BuildTargetEvent>>) {
        self.targets_changed.fetch_add(1, Ordering::SeqCst);
    }

    fn work_done_progress_began(&self, _task_id: &TaskId, _message: Option<&str>) {}
    fn work_done_progress_ended(&self, _task_id: &TaskId, _status: StatusCode) {}
}

#[derive(Default)]
pub struct StaticMainFiles {
    pub main_files: HashMap<Uri, BTreeSet<Uri>>,
}

impl MainFilesProvider for StaticMainFiles {
    fn main_files_containing_file(&self, uri: &Uri) -> BTreeSet<Uri> {
        self.main_files.get(uri).cloned().unwrap_or_default()
    }
}

/// Short windows so the debounce behavior is observable without slowing the suite down.
pub fn test_config() -> BuildSystemManagerConfig {
    BuildSystemManagerConfig {
        dependencies_updated_debounce: Duration::from_millis(100),
        settings_changed_debounce: Duration::from_millis(20),
        fallback_timeout: Duration::from_millis(200),
        ..BuildSystemManagerConfig::default()
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub fn swift_language() -> LanguageId {
    LanguageId::SWIFT
}
