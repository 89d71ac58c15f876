//! The [`BuildSystemManager`]: the façade between the editor-facing LSP server and the build
//! server(s).
//!
//! The manager owns one [`BuildSystemAdapter`], answers every build-related query the editor
//! needs (targets of a file, build settings, graph orders), caches those answers with request
//! coalescing, invalidates the caches when the server reports changes, and debounces the event
//! storms build servers produce into a handful of delegate notifications.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, Weak};

use anyhow::Result;
use log::{error, info, warn};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;

use bsp_types::notifications::{
    DidChangeBuildTargetParams, DidChangeWatchedFilesParams, InitializedBuildParams,
    LogMessageParams, Notification, OnBuildInitialized, OnBuildLogMessage, OnBuildTaskFinish,
    OnBuildTaskProgress, OnBuildTaskStart, OnBuildTargetDidChange, OnSourceKitOptionsChanged,
    OnWatchedFilesDidChange, SourceKitOptionsChangedParams, TaskFinishParams, TaskId,
    TaskProgressParams, TaskStartParams,
};
use bsp_types::requests::{
    BuildClientCapabilities, BuildInitialize, BuildTargetPrepare, BuildTargetSources,
    FileSystemWatcher, InitializeBuildParams, InitializeBuildResult, PrepareParams, Request,
    SourceKitInitializeBuildResponseData, SourcesParams, TextDocumentSourceKitOptionsParams,
    WorkspaceBuildTargets, WorkspaceWaitForBuildSystemUpdates,
};
use bsp_types::{BuildTargetIdentifier, LanguageId, SourceItemKind, SourcesItem, Uri};

use crate::adapters::bsp_config::{self, ConfigSearchPaths, ServerConfigLocation};
use crate::adapters::{
    BuildSystemAdapter, BuiltInBuildServerAdapter, ExternalBuildSystemAdapter,
    InboundMessageHandler, InjectedBuildServerAdapter, InjectedConnection,
};
use crate::build_systems::{
    CompilationDatabaseBuildSystem, CompileFlagsBuildSystem,
};
use crate::config::BuildSystemManagerConfig;
use crate::debounce::Debouncer;
use crate::delegate::BuildSystemManagerDelegate;
use crate::legacy::LegacyOptionsBridge;
use crate::main_files::MainFilesProvider;
use crate::manager::build_graph::BuildTargetInfoMap;
use crate::manager::source_files::SourceFilesAndDirectories;
use crate::message_queue::{classify, MessageClass, MessageGate};
use crate::request_cache::RequestCache;
use crate::settings::FileBuildSettings;
use crate::toolchain::ToolchainRegistry;

pub mod build_graph;
mod queries;
pub mod source_files;

/// Which backend to create the manager's adapter from.
pub enum BuildSystemSpec {
    /// An external server described by a `.bsp/*.json` / `buildServer.json` configuration.
    BuildServer(ServerConfigLocation),
    /// The built-in JSON compilation database (`compile_commands.json`).
    CompilationDatabase(PathBuf),
    /// The built-in fixed compile-flags store (`compile_flags.txt`).
    CompileFlags(PathBuf),
    /// A channel pair acting as the server, for tests and embedders.
    Injected(InjectedConnection),
}

impl BuildSystemSpec {
    /// Probe the workspace for a build system, in decreasing order of expressiveness.
    pub fn discover(workspace_root: &Path) -> Option<BuildSystemSpec> {
        if let Some(location) =
            bsp_config::discover(workspace_root, &ConfigSearchPaths::from_env())
        {
            return Some(BuildSystemSpec::BuildServer(location));
        }
        if let Some(database) = CompilationDatabaseBuildSystem::find_in(workspace_root) {
            return Some(BuildSystemSpec::CompilationDatabase(database));
        }
        if let Some(flags) = CompileFlagsBuildSystem::find_in(workspace_root) {
            return Some(BuildSystemSpec::CompileFlags(flags));
        }
        None
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WatchedFile {
    pub(crate) main_file: Uri,
    pub(crate) language: LanguageId,
}

/// Assigned exactly once by the initialize handshake; every read awaits the assignment.
#[derive(Default)]
struct InitSlot {
    state: Mutex<Option<Option<InitializeBuildResult>>>,
    ready: Condvar,
}

impl InitSlot {
    fn set(&self, value: Option<InitializeBuildResult>) {
        let mut state = self.state.lock().unwrap();
        if state.is_some() {
            error!("initialize result assigned twice");
            return;
        }
        *state = Some(value);
        self.ready.notify_all();
    }

    fn wait(&self) -> Option<InitializeBuildResult> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(value) = &*state {
                return value.clone();
            }
            state = self.ready.wait(state).unwrap();
        }
    }
}

pub struct BuildSystemManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    pub(crate) weak_self: Weak<ManagerInner>,
    pub(crate) workspace_root: PathBuf,
    pub(crate) config: BuildSystemManagerConfig,
    adapter: Mutex<Option<Arc<BuildSystemAdapter>>>,
    init_result: Arc<InitSlot>,
    pub(crate) gate: Arc<MessageGate>,
    delegate: Mutex<Weak<dyn BuildSystemManagerDelegate>>,
    pub(crate) toolchain_registry: Arc<dyn ToolchainRegistry>,
    pub(crate) main_files_provider: Arc<dyn MainFilesProvider>,
    pub(crate) watched_files: Mutex<FxHashMap<Uri, WatchedFile>>,
    pub(crate) legacy_bridge: Arc<LegacyOptionsBridge>,
    work_done_progress: Mutex<FxHashMap<TaskId, String>>,

    pub(crate) cached_adjusted_options:
        RequestCache<TextDocumentSourceKitOptionsParams, Option<FileBuildSettings>>,
    pub(crate) cached_build_targets: RequestCache<(), Arc<BuildTargetInfoMap>>,
    pub(crate) cached_target_sources:
        RequestCache<BTreeSet<BuildTargetIdentifier>, Arc<Vec<SourcesItem>>>,
    pub(crate) cached_source_files: RequestCache<(), Arc<SourceFilesAndDirectories>>,

    pub(crate) dependencies_updated_debouncer: Debouncer<BTreeSet<Uri>>,
    pub(crate) settings_changed_debouncer: Debouncer<BTreeSet<Uri>>,

    /// Inbound notifications are handled off the adapter's reader thread, on two serial lanes
    /// matching the scheduling classes: task progress must not queue behind state changes, and
    /// the reader must stay free to deliver the responses that in-flight state reads await.
    state_lane: crossbeam_channel::Sender<bsp_server::Notification>,
    progress_lane: crossbeam_channel::Sender<bsp_server::Notification>,
}

impl BuildSystemManager {
    pub fn new(
        spec: Option<BuildSystemSpec>,
        workspace_root: PathBuf,
        config: BuildSystemManagerConfig,
        toolchain_registry: Arc<dyn ToolchainRegistry>,
        main_files_provider: Arc<dyn MainFilesProvider>,
    ) -> Result<BuildSystemManager> {
        let inner = Arc::new_cyclic(|weak: &Weak<ManagerInner>| {
            let dependencies_updated_debouncer = {
                let weak = weak.clone();
                Debouncer::new(
                    config.dependencies_updated_debounce,
                    merge_uri_sets,
                    move |files: BTreeSet<Uri>| {
                        if let Some(inner) = weak.upgrade() {
                            inner.with_delegate(|delegate| {
                                delegate.files_dependencies_updated(&files)
                            });
                        }
                    },
                )
            };
            let settings_changed_debouncer = {
                let weak = weak.clone();
                Debouncer::new(
                    config.settings_changed_debounce,
                    merge_uri_sets,
                    move |files: BTreeSet<Uri>| {
                        if let Some(inner) = weak.upgrade() {
                            inner.with_delegate(|delegate| {
                                delegate.file_build_settings_changed(&files)
                            });
                        }
                    },
                )
            };

            let state_lane = spawn_notification_lane(weak.clone(), "bsp-state-lane");
            let progress_lane = spawn_notification_lane(weak.clone(), "bsp-progress-lane");

            ManagerInner {
                weak_self: weak.clone(),
                workspace_root,
                config,
                adapter: Mutex::new(None),
                init_result: Arc::new(InitSlot::default()),
                gate: Arc::new(MessageGate::new()),
                delegate: Mutex::new(Weak::<NoDelegate>::new()),
                toolchain_registry,
                main_files_provider,
                watched_files: Mutex::new(FxHashMap::default()),
                legacy_bridge: Arc::new(LegacyOptionsBridge::new()),
                work_done_progress: Mutex::new(FxHashMap::default()),
                cached_adjusted_options: RequestCache::new(),
                cached_build_targets: RequestCache::new(),
                cached_target_sources: RequestCache::new(),
                cached_source_files: RequestCache::new(),
                dependencies_updated_debouncer,
                settings_changed_debouncer,
                state_lane,
                progress_lane,
            }
        });

        let handler = Arc::downgrade(&inner) as Weak<dyn InboundMessageHandler>;
        let adapter = match spec {
            None => None,
            Some(BuildSystemSpec::BuildServer(location)) => {
                Some(BuildSystemAdapter::External(ExternalBuildSystemAdapter::new(
                    location,
                    inner.workspace_root.clone(),
                    inner.config.clone(),
                    handler,
                )?))
            }
            Some(BuildSystemSpec::CompilationDatabase(path)) => {
                Some(BuildSystemAdapter::BuiltIn(BuiltInBuildServerAdapter::new(
                    Arc::new(CompilationDatabaseBuildSystem::load(path)?),
                    handler,
                )))
            }
            Some(BuildSystemSpec::CompileFlags(path)) => {
                Some(BuildSystemAdapter::BuiltIn(BuiltInBuildServerAdapter::new(
                    Arc::new(CompileFlagsBuildSystem::load(path)?),
                    handler,
                )))
            }
            Some(BuildSystemSpec::Injected(connection)) => Some(BuildSystemAdapter::Injected(
                InjectedBuildServerAdapter::new(connection, handler),
            )),
        };

        match adapter {
            Some(adapter) => {
                *inner.adapter.lock().unwrap() = Some(Arc::new(adapter));
                let init_inner = Arc::clone(&inner);
                std::thread::spawn(move || init_inner.run_initialize_handshake());
            }
            None => {
                info!("no build system for {}", inner.workspace_root.display());
                inner.init_result.set(None);
            }
        }

        Ok(BuildSystemManager { inner })
    }

    /// Connect the editor-facing layer. Held weakly; events after the delegate is gone are
    /// dropped.
    pub fn set_delegate(&self, delegate: Weak<dyn BuildSystemManagerDelegate>) {
        *self.inner.delegate.lock().unwrap() = delegate;
    }

    /// The initialize response of the underlying server; `None` without a build system.
    /// Blocks until the handshake completed.
    pub fn initialize_result(&self) -> Option<InitializeBuildResult> {
        self.inner.init_result.wait()
    }

    /// Glob patterns the editor should watch on behalf of the build server.
    pub fn file_watchers(&self) -> Vec<FileSystemWatcher> {
        self.initialize_result()
            .as_ref()
            .and_then(|result| result.source_kit_data()?.watchers.clone())
            .unwrap_or_default()
    }

    /// Start tracking a file: its main file is resolved once and cached until
    /// [`BuildSystemManager::main_files_changed`] re-sweeps.
    pub fn register_for_change_notifications(&self, uri: &Uri, language: LanguageId) {
        let main_file = if language.is_c_family() {
            self.inner.compute_main_file(uri)
        } else {
            uri.clone()
        };
        self.inner.watched_files.lock().unwrap().insert(
            uri.clone(),
            WatchedFile {
                main_file,
                language,
            },
        );
    }

    pub fn unregister_for_change_notifications(&self, uri: &Uri) {
        self.inner.watched_files.lock().unwrap().remove(uri);
    }

    /// Re-resolve the main file of every watched file, bypassing the cache; registrations
    /// whose association changed are renewed and their settings reported as changed.
    pub fn main_files_changed(&self) {
        let watched: Vec<(Uri, WatchedFile)> = self
            .inner
            .watched_files
            .lock()
            .unwrap()
            .iter()
            .map(|(uri, watched)| (uri.clone(), watched.clone()))
            .collect();

        let mut changed = BTreeSet::new();
        for (uri, watched) in watched {
            if !watched.language.is_c_family() {
                continue;
            }
            let main_file = self.inner.compute_main_file(&uri);
            if main_file != watched.main_file {
                self.unregister_for_change_notifications(&uri);
                self.register_for_change_notifications(&uri, watched.language);
                changed.insert(uri);
            }
        }
        if !changed.is_empty() {
            self.inner.settings_changed_debouncer.schedule(changed);
        }
    }

    /// Forward filesystem events reported by the editor and work out whose dependencies are
    /// now stale.
    pub fn files_did_change(&self, params: DidChangeWatchedFilesParams) {
        if let Some(adapter) = self.inner.adapter() {
            let _permit = self
                .inner
                .gate
                .enter(classify(OnWatchedFilesDidChange::METHOD));
            if let Err(err) = adapter.notify::<OnWatchedFilesDidChange>(params.clone()) {
                warn!("failed to forward watched-files change: {err:#}");
            }
        }

        let changed: BTreeSet<Uri> = params
            .changes
            .iter()
            .map(|event| event.uri.clone())
            .collect();
        let mut affected: BTreeSet<Uri> = BTreeSet::new();

        let module_changed = changed.iter().any(|uri| uri.ends_with(".swiftmodule"));
        if module_changed && !self.inner.config.background_indexing {
            // Without background indexing there is no dependency tracking between modules;
            // over-approximate by treating every buildable file as affected.
            if let Ok(bundle) = self.inner.source_files_and_directories() {
                affected.extend(bundle.buildable_source_files.iter().cloned());
            }
        } else {
            let mut touched_targets: BTreeSet<BuildTargetIdentifier> = BTreeSet::new();
            for uri in &changed {
                if uri.ends_with(".swift") {
                    touched_targets.extend(self.inner.targets_for_uri(uri));
                }
            }
            if !touched_targets.is_empty() {
                if let Ok(map) = self.inner.build_target_info_map() {
                    let mut all = touched_targets.clone();
                    all.extend(build_graph::transitive_dependents(&map, &touched_targets));
                    if let Ok(sources) = self.inner.target_sources(all) {
                        affected.extend(source_file_uris(&sources));
                    }
                }
            }
        }

        for uri in &changed {
            affected.extend(self.inner.main_files_provider.main_files_containing_file(uri));
        }
        for uri in &changed {
            affected.remove(uri);
        }

        if !affected.is_empty() {
            self.inner.dependencies_updated_debouncer.schedule(affected);
        }
    }

    /// Build the transitive module dependencies of the targets so semantic functionality
    /// becomes available, then report the targets' sources as updated (debounced).
    pub fn prepare(&self, targets: Vec<BuildTargetIdentifier>) -> Result<()> {
        let data = self.inner.server_capabilities();
        if data.and_then(|data| data.prepare_provider) != Some(true) {
            return Ok(());
        }
        let Some(adapter) = self.inner.adapter() else {
            return Ok(());
        };

        {
            let _permit = self.inner.gate.enter(classify(BuildTargetPrepare::METHOD));
            adapter.request::<BuildTargetPrepare>(PrepareParams {
                targets: targets.clone(),
            })?;
        }

        let sources = self.inner.target_sources(targets.into_iter().collect())?;
        let files = source_file_uris(&sources);
        if !files.is_empty() {
            self.inner.dependencies_updated_debouncer.schedule(files);
        }
        Ok(())
    }

    /// Wait until the server has settled, drain the queued state changes, and deliver any
    /// pending debounced events.
    pub fn wait_for_up_to_date_build_graph(&self) {
        if let Some(adapter) = self.inner.adapter() {
            let _permit = self
                .inner
                .gate
                .enter(classify(WorkspaceWaitForBuildSystemUpdates::METHOD));
            if let Err(err) = adapter.request::<WorkspaceWaitForBuildSystemUpdates>(()) {
                info!("workspace/waitForBuildSystemUpdates not available: {err:#}");
            }
        }
        // A state-change permit only admits once every queued change has drained.
        drop(self.inner.gate.enter(MessageClass::StateChange));

        self.inner.dependencies_updated_debouncer.flush();
        self.inner.settings_changed_debouncer.flush();
    }

    /// Orderly teardown of the adapter. The manager keeps answering queries with fallback
    /// settings afterwards.
    pub fn shutdown(&self) {
        let adapter = self.inner.adapter.lock().unwrap().take();
        if let Some(adapter) = adapter {
            adapter.shutdown();
        }
    }
}

struct NoDelegate;
impl BuildSystemManagerDelegate for NoDelegate {
    fn file_build_settings_changed(&self, _changed_files: &BTreeSet<Uri>) {}
    fn files_dependencies_updated(&self, _changed_files: &BTreeSet<Uri>) {}
    fn build_targets_changed(&self, _changes: Option<Vec<bsp_types::notifications::BuildTargetEvent>>) {
    }
}

impl ManagerInner {
    pub(crate) fn adapter(&self) -> Option<Arc<BuildSystemAdapter>> {
        self.adapter.lock().unwrap().clone()
    }

    pub(crate) fn has_build_system(&self) -> bool {
        self.adapter.lock().unwrap().is_some()
    }

    pub(crate) fn initialize_result(&self) -> Option<InitializeBuildResult> {
        self.init_result.wait()
    }

    pub(crate) fn server_capabilities(&self) -> Option<SourceKitInitializeBuildResponseData> {
        self.initialize_result()?.source_kit_data().cloned()
    }

    pub(crate) fn with_delegate(&self, f: impl FnOnce(&dyn BuildSystemManagerDelegate)) {
        let delegate = self.delegate.lock().unwrap().clone();
        if let Some(delegate) = delegate.upgrade() {
            f(delegate.as_ref());
        }
    }

    fn run_initialize_handshake(self: Arc<Self>) {
        let Some(adapter) = self.adapter() else {
            self.init_result.set(None);
            return;
        };
        let params = InitializeBuildParams {
            display_name: "bsp-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bsp_version: bsp_types::PROTOCOL_VERSION.to_string(),
            root_uri: crate::utils::file_uri(&self.workspace_root),
            capabilities: BuildClientCapabilities {
                language_ids: vec![
                    LanguageId::SWIFT,
                    LanguageId::C,
                    LanguageId::CPP,
                    LanguageId::OBJECTIVE_C,
                    LanguageId::OBJECTIVE_CPP,
                ],
            },
            data: None,
        };

        let result = {
            let _permit = self.gate.enter(classify(BuildInitialize::METHOD));
            adapter.request::<BuildInitialize>(params)
        };
        match result {
            Ok(result) => {
                if let Err(err) =
                    adapter.notify::<OnBuildInitialized>(InitializedBuildParams::default())
                {
                    warn!("failed to send build/initialized: {err:#}");
                }
                info!(
                    "initialized build server {} {}",
                    result.display_name, result.version
                );
                self.init_result.set(Some(result));
            }
            Err(err) => {
                error!("build server initialization failed: {err:#}");
                self.init_result.set(None);
            }
        }
    }

    /// The whole target graph, fetched once and shared.
    pub(crate) fn build_target_info_map(&self) -> Result<Arc<BuildTargetInfoMap>> {
        let adapter = self.require_adapter()?;
        let gate = Arc::clone(&self.gate);
        let init = Arc::clone(&self.init_result);
        self.cached_build_targets.get_or_compute((), move || {
            // No non-initialize message may go out before the handshake resolved.
            init.wait();
            let _permit = gate.enter(classify(WorkspaceBuildTargets::METHOD));
            let result = adapter.request::<WorkspaceBuildTargets>(())?;
            Ok(Arc::new(build_graph::build_target_info_map(result.targets)))
        })
    }

    /// Sources of a target set. A cached answer for a superset serves subset queries by
    /// filtering at call time; the projection is never stored as its own entry.
    pub(crate) fn target_sources(
        &self,
        targets: BTreeSet<BuildTargetIdentifier>,
    ) -> Result<Arc<Vec<SourcesItem>>> {
        let keys = self.cached_target_sources.keys();
        if !keys.contains(&targets) {
            let superset = keys
                .iter()
                .filter(|key| targets.is_subset(key))
                .min_by_key(|key| (key.len(), (*key).clone()));
            if let Some(superset) = superset {
                if let Some(Ok(items)) = self.cached_target_sources.get_existing(superset) {
                    let projected: Vec<SourcesItem> = items
                        .iter()
                        .filter(|item| targets.contains(&item.target))
                        .cloned()
                        .collect();
                    return Ok(Arc::new(projected));
                }
            }
        }

        let adapter = self.require_adapter()?;
        let gate = Arc::clone(&self.gate);
        let init = Arc::clone(&self.init_result);
        let requested = targets.clone();
        self.cached_target_sources.get_or_compute(targets, move || {
            init.wait();
            let _permit = gate.enter(classify(BuildTargetSources::METHOD));
            let result = adapter.request::<BuildTargetSources>(SourcesParams {
                targets: requested.into_iter().collect(),
            })?;
            Ok(Arc::new(result.items))
        })
    }

    pub(crate) fn source_files_and_directories(&self) -> Result<Arc<SourceFilesAndDirectories>> {
        let map = self.build_target_info_map()?;
        let all_targets: BTreeSet<BuildTargetIdentifier> = map.keys().cloned().collect();
        let sources = self.target_sources(all_targets)?;
        let output_paths_supported = self
            .server_capabilities()
            .and_then(|data| data.output_paths_provider)
            .unwrap_or(false);

        let workspace_root = self.workspace_root.clone();
        self.cached_source_files.get_or_compute((), move || {
            Ok(Arc::new(source_files::collect_source_files(
                &sources,
                &map,
                &workspace_root,
                output_paths_supported,
            )))
        })
    }

    pub(crate) fn buildable_source_files(&self) -> HashSet<Uri> {
        self.source_files_and_directories()
            .map(|bundle| bundle.buildable_source_files.clone())
            .unwrap_or_default()
    }

    pub(crate) fn targets_for_uri(&self, uri: &Uri) -> Vec<BuildTargetIdentifier> {
        self.source_files_and_directories()
            .map(|bundle| bundle.targets_for_uri(uri))
            .unwrap_or_default()
    }

    pub(crate) fn compute_main_file(&self, uri: &Uri) -> Uri {
        let candidates = self.main_files_provider.main_files_containing_file(uri);
        let buildable = self.buildable_source_files();
        crate::main_files::resolve_main_file(
            uri,
            &candidates,
            &buildable,
            cfg!(any(target_os = "macos", target_os = "ios")),
        )
    }

    fn require_adapter(&self) -> Result<Arc<BuildSystemAdapter>> {
        self.adapter()
            .ok_or_else(|| crate::error::AdapterError::ConfigurationMissing(self.workspace_root.clone()).into())
    }

    fn handle_build_target_did_change(&self, params: DidChangeBuildTargetParams) {
        {
            let _permit = self.gate.enter(MessageClass::StateChange);
            match &params.changes {
                None => {
                    self.cached_adjusted_options.clear();
                    self.cached_build_targets.clear();
                    self.cached_target_sources.clear();
                    self.cached_source_files.clear();
                }
                Some(events) => {
                    let affected: HashSet<BuildTargetIdentifier> =
                        events.iter().map(|event| event.target.clone()).collect();
                    self.cached_adjusted_options
                        .invalidate_where(|key| affected.contains(&key.target));
                    self.cached_target_sources
                        .invalidate_where(|key| key.iter().any(|t| affected.contains(t)));
                    self.cached_build_targets.clear();
                    self.cached_source_files.clear();
                }
            }
        }

        self.with_delegate(|delegate| delegate.build_targets_changed(params.changes.clone()));

        let watched: BTreeSet<Uri> = self
            .watched_files
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        if !watched.is_empty() {
            self.settings_changed_debouncer.schedule(watched);
        }
    }

    fn handle_task_start(&self, params: TaskStartParams) {
        let title = params
            .message
            .clone()
            .unwrap_or_else(|| format!("build task {}", params.task_id.id));
        self.work_done_progress
            .lock()
            .unwrap()
            .insert(params.task_id.clone(), title);
        self.with_delegate(|delegate| {
            delegate.work_done_progress_began(&params.task_id, params.message.as_deref())
        });
    }

    fn handle_task_progress(&self, params: TaskProgressParams) {
        if !self
            .work_done_progress
            .lock()
            .unwrap()
            .contains_key(&params.task_id)
        {
            warn!("progress for unknown task {}", params.task_id.id);
            return;
        }
        self.with_delegate(|delegate| {
            delegate.work_done_progress_report(&params.task_id, params.message.as_deref())
        });
    }

    fn handle_task_finish(&self, params: TaskFinishParams) {
        if self
            .work_done_progress
            .lock()
            .unwrap()
            .remove(&params.task_id)
            .is_none()
        {
            warn!("finish for unknown task {}", params.task_id.id);
            return;
        }
        self.with_delegate(|delegate| {
            delegate.work_done_progress_ended(&params.task_id, params.status.clone())
        });
    }

    fn handle_options_changed(&self, params: SourceKitOptionsChangedParams) {
        if self.legacy_bridge.options_changed(params) {
            // Pushed settings invalidate like a wholesale target change.
            self.handle_build_target_did_change(DidChangeBuildTargetParams { changes: None });
        }
    }
}

fn spawn_notification_lane(
    weak: Weak<ManagerInner>,
    name: &str,
) -> crossbeam_channel::Sender<bsp_server::Notification> {
    let (sender, receiver) = crossbeam_channel::unbounded::<bsp_server::Notification>();
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            for notification in receiver {
                match weak.upgrade() {
                    Some(inner) => inner.process_notification(notification),
                    None => break,
                }
            }
        })
        .expect("failed to spawn notification lane");
    sender
}

impl InboundMessageHandler for ManagerInner {
    /// Called on the adapter's reader thread; only routes, never blocks, so responses keep
    /// flowing while a state change waits for in-flight reads.
    fn handle_notification(&self, notification: bsp_server::Notification) {
        let lane = match classify(&notification.method) {
            MessageClass::TaskProgress => &self.progress_lane,
            MessageClass::StateChange | MessageClass::StateRead => &self.state_lane,
        };
        if lane.send(notification).is_err() {
            warn!("notification lane is gone");
        }
    }
}

impl ManagerInner {
    fn process_notification(&self, notification: bsp_server::Notification) {
        let method = notification.method.as_str();
        if method == OnBuildTargetDidChange::METHOD {
            if let Some(params) = parse_params::<DidChangeBuildTargetParams>(&notification) {
                self.handle_build_target_did_change(params);
            }
        } else if method == OnSourceKitOptionsChanged::METHOD {
            if let Some(params) = parse_params::<SourceKitOptionsChangedParams>(&notification) {
                // Acquires the state-change slot inside the wholesale invalidation.
                self.handle_options_changed(params);
            }
        } else if method == OnBuildLogMessage::METHOD {
            if let Some(params) = parse_params::<LogMessageParams>(&notification) {
                let _permit = self.gate.enter(MessageClass::TaskProgress);
                self.with_delegate(|delegate| delegate.log_message(params.clone()));
            }
        } else if method == OnBuildTaskStart::METHOD {
            if let Some(params) = parse_params::<TaskStartParams>(&notification) {
                let _permit = self.gate.enter(MessageClass::TaskProgress);
                self.handle_task_start(params);
            }
        } else if method == OnBuildTaskProgress::METHOD {
            if let Some(params) = parse_params::<TaskProgressParams>(&notification) {
                let _permit = self.gate.enter(MessageClass::TaskProgress);
                self.handle_task_progress(params);
            }
        } else if method == OnBuildTaskFinish::METHOD {
            if let Some(params) = parse_params::<TaskFinishParams>(&notification) {
                let _permit = self.gate.enter(MessageClass::TaskProgress);
                self.handle_task_finish(params);
            }
        } else {
            let _permit = self.gate.enter(classify(method));
            warn!("dropping unknown notification from build server: {method}");
        }
    }
}

fn parse_params<T: DeserializeOwned>(notification: &bsp_server::Notification) -> Option<T> {
    match serde_json::from_value(notification.params.clone()) {
        Ok(params) => Some(params),
        Err(err) => {
            error!(
                "malformed {} notification from build server: {err}",
                notification.method
            );
            None
        }
    }
}

fn merge_uri_sets(accumulated: &mut BTreeSet<Uri>, new: BTreeSet<Uri>) {
    accumulated.extend(new);
}

fn source_file_uris(items: &[SourcesItem]) -> BTreeSet<Uri> {
    items
        .iter()
        .flat_map(|item| &item.sources)
        .filter(|source| source.kind == SourceItemKind::File)
        .map(|source| source.uri.clone())
        .collect()
}
