//! The per-file and per-target queries the LSP server asks of the manager.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use log::warn;

use bsp_types::requests::TextDocumentSourceKitOptionsParams;
use bsp_types::requests::{Request, TextDocumentSourceKitOptions};
use bsp_types::{BuildTargetIdentifier, LanguageId, SourcesItem, TextDocumentIdentifier, Uri};

use crate::arguments::adjust_compiler_arguments;
use crate::fallback::fallback_build_settings;
use crate::main_files::is_own_main_file;
use crate::manager::source_files::SourceFilesAndDirectories;
use crate::manager::{build_graph, BuildSystemManager, ManagerInner};
use crate::message_queue::classify;
use crate::settings::{language_for_extension, FileBuildSettings};
use crate::toolchain::Toolchain;
use crate::utils::{file_uri, uri_to_file_path};

impl BuildSystemManager {
    /// The toolchain to use for the file: the one the target's payload states, or the
    /// language-default one.
    pub fn toolchain(
        &self,
        _uri: &Uri,
        target: Option<&BuildTargetIdentifier>,
        language: &LanguageId,
    ) -> Option<Arc<Toolchain>> {
        if let Some(target) = target {
            let stated = self
                .inner
                .build_target_info_map()
                .ok()
                .and_then(|map| {
                    map.get(target)?
                        .target
                        .source_kit_data()?
                        .toolchain
                        .clone()
                });
            if let Some(toolchain_uri) = stated {
                if let Some(toolchain) =
                    self.inner.toolchain_registry.toolchain_for_uri(&toolchain_uri)
                {
                    return Some(toolchain);
                }
                warn!("toolchain {toolchain_uri} stated by build server is not registered");
            }
        }
        self.inner.toolchain_registry.default_toolchain(language)
    }

    /// The language of the file in the given target: what the build server stated, or what the
    /// extension suggests.
    pub fn default_language(
        &self,
        uri: &Uri,
        target: &BuildTargetIdentifier,
    ) -> Option<LanguageId> {
        let stated = self
            .inner
            .source_files_and_directories()
            .ok()
            .and_then(|bundle| bundle.files.get(uri)?.languages.get(target).cloned());
        stated.or_else(|| extension_language(uri))
    }

    /// Every target that lists the file, directly or by a containing directory entry.
    pub fn targets_for_uri(&self, uri: &Uri) -> Vec<BuildTargetIdentifier> {
        self.inner.targets_for_uri(uri)
    }

    /// The deterministic choice among the file's targets: the lexicographically smallest URI.
    pub fn canonical_target(&self, uri: &Uri) -> Option<BuildTargetIdentifier> {
        self.inner.targets_for_uri(uri).into_iter().next()
    }

    /// The name of the module the file belongs to, parsed from its compiler arguments.
    pub fn module_name(&self, uri: &Uri, target: &BuildTargetIdentifier) -> Option<String> {
        let language = self.default_language(uri, target)?;
        let settings = self.build_settings(uri, Some(target), &language, false)?;
        settings.module_name(&language)
    }

    /// Build settings for the file itself. With `fallback_after_timeout`, a server that does
    /// not answer within the configured timeout yields fallback settings immediately and the
    /// real settings are announced through a debounced settings-changed event once they
    /// arrive.
    pub fn build_settings(
        &self,
        uri: &Uri,
        target: Option<&BuildTargetIdentifier>,
        language: &LanguageId,
        fallback_after_timeout: bool,
    ) -> Option<FileBuildSettings> {
        if let Some(target) = target {
            if self.inner.has_build_system() {
                match self
                    .inner
                    .adjusted_options(uri, target, language, fallback_after_timeout)
                {
                    Ok(Some(settings)) => return Some(settings),
                    Ok(None) => {}
                    Err(err) => warn!("failed to get build settings for {uri}: {err:#}"),
                }
            }
        }
        fallback_build_settings(uri, language, self.inner.has_build_system())
    }

    /// Build settings for the file, inferred from its main file when the file itself (e.g. a
    /// header) has none: the main file's settings with the main file's path patched to the
    /// queried path and a `-x<lang>` marker prepended for C-family dialects.
    pub fn build_settings_inferred_from_main_file(
        &self,
        uri: &Uri,
        target: Option<&BuildTargetIdentifier>,
        language: Option<&LanguageId>,
        fallback_after_timeout: bool,
    ) -> Option<FileBuildSettings> {
        let language_hint = language.cloned().or_else(|| extension_language(uri));
        let mut main_file = self.inner.main_file_for(uri, language_hint.as_ref());
        let main_target = target
            .cloned()
            .or_else(|| self.canonical_target(&main_file));
        let main_language = if main_file == *uri {
            language_hint.clone()
        } else {
            main_target
                .as_ref()
                .and_then(|target| self.default_language(&main_file, target))
                .or_else(|| extension_language(&main_file))
        }
        .or_else(|| language_hint.clone())
        .unwrap_or(LanguageId::C);

        let mut settings = self.build_settings(
            &main_file,
            main_target.as_ref(),
            &main_language,
            fallback_after_timeout,
        )?;

        // A fallback answer for a symlink may just mean the build system only knows the
        // symlink's destination.
        if settings.is_fallback {
            if let Some(destination) = symlink_destination(uri) {
                let destination_main =
                    self.inner.main_file_for(&destination, language_hint.as_ref());
                let destination_target = target
                    .cloned()
                    .or_else(|| self.canonical_target(&destination_main));
                if let Some(destination_settings) = self.build_settings(
                    &destination_main,
                    destination_target.as_ref(),
                    &main_language,
                    fallback_after_timeout,
                ) {
                    if !destination_settings.is_fallback {
                        settings = destination_settings;
                        main_file = destination_main;
                    }
                }
            }
        }

        if main_file != *uri {
            let uri_path = uri_to_file_path(uri)?;
            let main_path = uri_to_file_path(&main_file)?;
            settings = settings.patching(&uri_path, &main_path, Some(&main_language));
        }
        Some(settings)
    }

    /// Reverse topological order over the build graph: lower-level targets first.
    pub fn topological_sort(
        &self,
        targets: &[BuildTargetIdentifier],
    ) -> Vec<BuildTargetIdentifier> {
        match self.inner.build_target_info_map() {
            Ok(map) => build_graph::topological_sort(&map, targets),
            Err(_) => build_graph::topological_sort(&Default::default(), targets),
        }
    }

    /// The transitive dependents of the given targets, sorted lexicographically.
    pub fn targets_depending_on(
        &self,
        targets: &BTreeSet<BuildTargetIdentifier>,
    ) -> Vec<BuildTargetIdentifier> {
        match self.inner.build_target_info_map() {
            Ok(map) => build_graph::transitive_dependents(&map, targets),
            Err(_) => Vec::new(),
        }
    }

    /// The folded files-and-directories view of all targets' sources.
    pub fn source_files_and_directories(&self) -> Result<Arc<SourceFilesAndDirectories>> {
        self.inner.source_files_and_directories()
    }

    /// Source items of the given targets, served from cache (or a cached superset) when
    /// possible.
    pub fn target_sources(
        &self,
        targets: BTreeSet<BuildTargetIdentifier>,
    ) -> Result<Arc<Vec<SourcesItem>>> {
        self.inner.target_sources(targets)
    }
}

impl ManagerInner {
    /// The main file to compute settings from: the file itself for everything but C-family
    /// headers, the memoized association for watched files, a fresh resolution otherwise.
    pub(crate) fn main_file_for(&self, uri: &Uri, language: Option<&LanguageId>) -> Uri {
        if is_own_main_file(language) {
            return uri.clone();
        }
        if let Some(watched) = self.watched_files.lock().unwrap().get(uri) {
            return watched.main_file.clone();
        }
        self.compute_main_file(uri)
    }

    /// Settings for `(uri, target, language)`: ask the server (through the coalescing cache),
    /// then strip build-only flags and inject the indexing extras.
    pub(crate) fn adjusted_options(
        &self,
        uri: &Uri,
        target: &BuildTargetIdentifier,
        language: &LanguageId,
        fallback_after_timeout: bool,
    ) -> Result<Option<FileBuildSettings>> {
        let adapter = match self.adapter() {
            Some(adapter) => adapter,
            None => return Ok(None),
        };
        let key = TextDocumentSourceKitOptionsParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            target: target.clone(),
            language: language.clone(),
        };

        let gate = Arc::clone(&self.gate);
        let init = Arc::clone(&self.init_result);
        let bridge = Arc::clone(&self.legacy_bridge);
        let request = key.clone();
        let request_language = language.clone();
        let compute = move || {
            let init_result = init.wait();
            let supports_pull = init_result
                .as_ref()
                .and_then(|result| result.source_kit_data()?.source_kit_options_provider)
                .unwrap_or(false);

            let _permit = gate.enter(classify(TextDocumentSourceKitOptions::METHOD));
            let response = if supports_pull {
                adapter.request::<TextDocumentSourceKitOptions>(request.clone())?
            } else {
                bridge.source_kit_options(&adapter, &request.text_document.uri)?
            };
            Ok(response.map(|response| {
                let mut settings =
                    FileBuildSettings::from_response(response, request_language.clone());
                settings.compiler_arguments =
                    adjust_compiler_arguments(&settings.compiler_arguments, &request_language);
                settings
            }))
        };

        if fallback_after_timeout {
            let weak = self.weak_self.clone();
            let late_uri = uri.clone();
            let timed_out = self.cached_adjusted_options.get_or_compute_with_timeout(
                key,
                self.config.fallback_timeout,
                compute,
                move |late_result| {
                    // The real settings arrived after we already served fallback; let the
                    // editor know they superseded it.
                    if let Ok(Some(_)) = late_result {
                        if let Some(inner) = weak.upgrade() {
                            inner
                                .settings_changed_debouncer
                                .schedule(BTreeSet::from([late_uri]));
                        }
                    }
                },
            );
            match timed_out {
                Some(result) => result,
                None => Ok(None),
            }
        } else {
            self.cached_adjusted_options.get_or_compute(key, compute)
        }
    }
}

fn extension_language(uri: &Uri) -> Option<LanguageId> {
    let path = uri_to_file_path(uri)?;
    let extension = path.extension()?.to_str()?;
    language_for_extension(extension)
}

fn symlink_destination(uri: &Uri) -> Option<Uri> {
    let path = uri_to_file_path(uri)?;
    let destination = std::fs::read_link(&path).ok()?;
    let destination = if destination.is_absolute() {
        destination
    } else {
        path.parent()?.join(destination)
    };
    Some(file_uri(destination))
}
