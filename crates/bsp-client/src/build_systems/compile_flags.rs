//! The fixed compile-flags store (`compile_flags.txt`) as an in-process build system.
//!
//! Every non-empty line of the file is one compiler argument, applied to every file in the
//! workspace. The synthesized invocation uses `swiftc` for Swift documents and `clang` for
//! everything else.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{error, info};

use bsp_types::notifications::DidChangeWatchedFilesParams;
use bsp_types::requests::{
    FileSystemWatcher, SourceKitInitializeBuildResponseData, SourcesParams, SourcesResult,
    TextDocumentSourceKitOptionsParams, TextDocumentSourceKitOptionsResult,
    WorkspaceBuildTargetsResult,
};
use bsp_types::{
    BuildTarget, BuildTargetCapabilities, BuildTargetIdentifier, LanguageId, SourceItem,
    SourceItemKind, SourcesItem,
};

use crate::build_systems::{BuildSystemEventSink, BuiltInBuildSystem};
use crate::utils::{file_uri, uri_to_file_path};

pub const COMPILE_FLAGS_FILE: &str = "compile_flags.txt";

pub struct CompileFlagsBuildSystem {
    config_path: PathBuf,
    flags: Mutex<Vec<String>>,
    sink: Mutex<Option<Arc<dyn BuildSystemEventSink>>>,
}

impl CompileFlagsBuildSystem {
    pub fn load(config_path: PathBuf) -> Result<CompileFlagsBuildSystem> {
        let flags = read_flags(&config_path)?;
        info!(
            "loaded {} fixed compile flags from {}",
            flags.len(),
            config_path.display()
        );
        Ok(CompileFlagsBuildSystem {
            config_path,
            flags: Mutex::new(flags),
            sink: Mutex::new(None),
        })
    }

    pub fn find_in(workspace_root: &Path) -> Option<PathBuf> {
        let candidate = workspace_root.join(COMPILE_FLAGS_FILE);
        candidate.is_file().then_some(candidate)
    }

    fn target(&self) -> BuildTargetIdentifier {
        BuildTargetIdentifier::new(format!(
            "compile-flags://{}",
            self.config_path.display()
        ))
    }

    fn reload(&self) {
        match read_flags(&self.config_path) {
            Ok(flags) => {
                *self.flags.lock().unwrap() = flags;
                if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                    sink.build_targets_changed(None);
                }
            }
            Err(err) => error!("reloading compile flags failed: {err:#}"),
        }
    }
}

fn read_flags(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

impl BuiltInBuildSystem for CompileFlagsBuildSystem {
    fn initialize_data(&self) -> SourceKitInitializeBuildResponseData {
        SourceKitInitializeBuildResponseData {
            index_store_path: None,
            index_database_path: None,
            watchers: Some(vec![FileSystemWatcher {
                glob_pattern: self.config_path.display().to_string(),
                kind: None,
            }]),
            prepare_provider: Some(false),
            source_kit_options_provider: Some(true),
            output_paths_provider: Some(false),
        }
    }

    fn connect(&self, sink: Arc<dyn BuildSystemEventSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn build_targets(&self) -> Result<WorkspaceBuildTargetsResult> {
        Ok(WorkspaceBuildTargetsResult {
            targets: vec![BuildTarget {
                id: self.target(),
                display_name: Some(COMPILE_FLAGS_FILE.to_string()),
                base_directory: self
                    .config_path
                    .parent()
                    .map(file_uri),
                tags: vec![],
                capabilities: BuildTargetCapabilities::default(),
                language_ids: vec![],
                dependencies: vec![],
                data: None,
            }],
        })
    }

    fn target_sources(&self, params: SourcesParams) -> Result<SourcesResult> {
        // Every file in the workspace is compiled with the same flags; report the workspace
        // directory so lookups by containing directory succeed.
        let items = params
            .targets
            .iter()
            .filter(|target| **target == self.target())
            .map(|target| SourcesItem {
                target: target.clone(),
                sources: self
                    .config_path
                    .parent()
                    .map(|directory| SourceItem {
                        uri: file_uri(directory),
                        kind: SourceItemKind::Directory,
                        generated: false,
                        data: None,
                    })
                    .into_iter()
                    .collect(),
                roots: None,
            })
            .collect();
        Ok(SourcesResult { items })
    }

    fn source_kit_options(
        &self,
        params: TextDocumentSourceKitOptionsParams,
    ) -> Result<Option<TextDocumentSourceKitOptionsResult>> {
        let Some(path) = uri_to_file_path(&params.text_document.uri) else {
            return Ok(None);
        };
        let compiler = if params.language == LanguageId::SWIFT {
            "swiftc"
        } else {
            "clang"
        };
        let mut compiler_arguments = vec![compiler.to_string()];
        compiler_arguments.extend(self.flags.lock().unwrap().iter().cloned());
        compiler_arguments.push(path.to_string_lossy().into_owned());

        Ok(Some(TextDocumentSourceKitOptionsResult {
            compiler_arguments,
            working_directory: self
                .config_path
                .parent()
                .map(|directory| directory.to_string_lossy().into_owned()),
            data: None,
        }))
    }

    fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let affects_flags = params.changes.iter().any(|change| {
            uri_to_file_path(&change.uri).as_deref() == Some(self.config_path.as_path())
        });
        if affects_flags {
            info!("compile flags changed on disk, reloading");
            self.reload();
        }
    }
}
