//! The JSON compilation database (`compile_commands.json`) as an in-process build system.
//!
//! Every distinct compiler executable in the database surfaces as its own pseudo build target,
//! so a project mixing `clang` and `clang++` invocations presents as multiple targets. Files
//! are indexed both under the path stated in the database and under the symlink-resolved path,
//! because build directories are commonly symlinks to out-of-tree locations.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{error, info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use bsp_types::notifications::DidChangeWatchedFilesParams;
use bsp_types::requests::{
    FileSystemWatcher, SourceKitInitializeBuildResponseData, SourcesParams, SourcesResult,
    TextDocumentSourceKitOptionsParams, TextDocumentSourceKitOptionsResult,
    WorkspaceBuildTargetsResult,
};
use bsp_types::{
    BuildTarget, BuildTargetCapabilities, BuildTargetIdentifier, SourceItem, SourceItemData,
    SourceItemKind, SourceKitSourceItemData, SourceKitSourceItemKind, SourcesItem,
};

use crate::arguments::split_shell_command;
use crate::build_systems::{BuildSystemEventSink, BuiltInBuildSystem};
use crate::settings::language_for_extension;
use crate::utils::{file_uri, uri_to_file_path};

pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

const TARGET_URI_SCHEME: &str = "compilation-database://";

/// One record of `compile_commands.json`: `directory` and `file` are required, and exactly one
/// of `command` (a shell-quoted string) or `arguments` must be present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompilationDatabaseEntry {
    pub directory: String,
    pub file: String,
    #[serde(flatten)]
    pub command_line: CommandLine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Arguments { arguments: Vec<String> },
    Command { command: String },
}

impl CompilationDatabaseEntry {
    /// The invocation as an argument vector, tokenizing `command` when necessary.
    pub fn arguments(&self) -> Vec<String> {
        match &self.command_line {
            CommandLine::Arguments { arguments } => arguments.clone(),
            CommandLine::Command { command } => split_shell_command(command),
        }
    }

    /// The compiler executable, i.e. the first argument.
    pub fn compiler(&self) -> Option<String> {
        self.arguments().into_iter().next()
    }

    /// The absolute path of the compiled file.
    pub fn file_path(&self) -> PathBuf {
        let file = Path::new(&self.file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&self.directory).join(file)
        }
    }

    /// The same entry with `command` tokenized into `arguments`.
    pub fn normalized(self) -> CompilationDatabaseEntry {
        let arguments = self.arguments();
        CompilationDatabaseEntry {
            command_line: CommandLine::Arguments { arguments },
            ..self
        }
    }
}

#[derive(Debug, Default)]
pub struct JsonCompilationDatabase {
    entries: Vec<CompilationDatabaseEntry>,
    /// File path (as stated and symlink-resolved) to entry indices.
    index: FxHashMap<PathBuf, Vec<usize>>,
}

impl JsonCompilationDatabase {
    pub fn load(path: &Path) -> Result<JsonCompilationDatabase> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<CompilationDatabaseEntry> = serde_json::from_str(&content)
            .with_context(|| format!("malformed compilation database at {}", path.display()))?;
        Ok(JsonCompilationDatabase::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<CompilationDatabaseEntry>) -> JsonCompilationDatabase {
        let mut index: FxHashMap<PathBuf, Vec<usize>> = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            let path = entry.file_path();
            if let Ok(resolved) = path.canonicalize() {
                if resolved != path {
                    index.entry(resolved).or_default().push(i);
                }
            }
            index.entry(path).or_default().push(i);
        }
        JsonCompilationDatabase { entries, index }
    }

    pub fn entries(&self) -> &[CompilationDatabaseEntry] {
        &self.entries
    }

    pub fn entries_for_path(&self, path: &Path) -> Vec<&CompilationDatabaseEntry> {
        let direct = self.index.get(path);
        let resolved_path = path.canonicalize().ok();
        let resolved = resolved_path
            .as_ref()
            .filter(|resolved| *resolved != path)
            .and_then(|resolved| self.index.get(resolved));
        direct
            .into_iter()
            .chain(resolved)
            .flatten()
            .map(|&i| &self.entries[i])
            .collect()
    }

    /// The distinct compiler executables, in deterministic order. Each becomes a pseudo target.
    pub fn compilers(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry.compiler())
            .unique()
            .sorted()
            .collect()
    }

    /// Serialize back to the on-disk format. `command` strings come back as `arguments`.
    pub fn to_json(&self) -> serde_json::Value {
        let normalized: Vec<CompilationDatabaseEntry> = self
            .entries
            .iter()
            .cloned()
            .map(CompilationDatabaseEntry::normalized)
            .collect();
        serde_json::to_value(normalized).expect("compilation database entries serialize")
    }
}

pub struct CompilationDatabaseBuildSystem {
    database_path: PathBuf,
    database: Mutex<JsonCompilationDatabase>,
    sink: Mutex<Option<Arc<dyn BuildSystemEventSink>>>,
}

impl CompilationDatabaseBuildSystem {
    pub fn load(database_path: PathBuf) -> Result<CompilationDatabaseBuildSystem> {
        let database = JsonCompilationDatabase::load(&database_path)?;
        info!(
            "loaded compilation database with {} entries from {}",
            database.entries().len(),
            database_path.display()
        );
        Ok(CompilationDatabaseBuildSystem {
            database_path,
            database: Mutex::new(database),
            sink: Mutex::new(None),
        })
    }

    /// Look for a `compile_commands.json` under the workspace root or its `build` directory.
    pub fn find_in(workspace_root: &Path) -> Option<PathBuf> {
        [
            workspace_root.join(COMPILE_COMMANDS_FILE),
            workspace_root.join("build").join(COMPILE_COMMANDS_FILE),
        ]
        .into_iter()
        .find(|candidate| candidate.is_file())
    }

    fn target_for_compiler(compiler: &str) -> BuildTargetIdentifier {
        BuildTargetIdentifier::new(format!("{TARGET_URI_SCHEME}{compiler}"))
    }

    fn reload(&self) {
        match JsonCompilationDatabase::load(&self.database_path) {
            Ok(database) => {
                *self.database.lock().unwrap() = database;
                if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                    sink.build_targets_changed(None);
                }
            }
            Err(err) => {
                error!("reloading compilation database failed: {err:#}");
            }
        }
    }
}

impl BuiltInBuildSystem for CompilationDatabaseBuildSystem {
    fn initialize_data(&self) -> SourceKitInitializeBuildResponseData {
        SourceKitInitializeBuildResponseData {
            index_store_path: None,
            index_database_path: None,
            // Any compilation database in the workspace may be the symlink target of ours, so
            // watch them all.
            watchers: Some(vec![FileSystemWatcher {
                glob_pattern: format!("**/{COMPILE_COMMANDS_FILE}"),
                kind: None,
            }]),
            prepare_provider: Some(false),
            source_kit_options_provider: Some(true),
            output_paths_provider: Some(true),
        }
    }

    fn connect(&self, sink: Arc<dyn BuildSystemEventSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn build_targets(&self) -> Result<WorkspaceBuildTargetsResult> {
        let database = self.database.lock().unwrap();
        let targets = database
            .compilers()
            .into_iter()
            .map(|compiler| {
                let language_ids = database
                    .entries()
                    .iter()
                    .filter(|entry| entry.compiler().as_deref() == Some(compiler.as_str()))
                    .filter_map(|entry| {
                        let path = entry.file_path();
                        let extension = path.extension()?.to_str()?.to_string();
                        language_for_extension(&extension)
                    })
                    .unique()
                    .sorted()
                    .collect();
                BuildTarget {
                    id: Self::target_for_compiler(&compiler),
                    display_name: Path::new(&compiler)
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned()),
                    base_directory: None,
                    tags: vec![],
                    capabilities: BuildTargetCapabilities::default(),
                    language_ids,
                    dependencies: vec![],
                    data: None,
                }
            })
            .collect();
        Ok(WorkspaceBuildTargetsResult { targets })
    }

    fn target_sources(&self, params: SourcesParams) -> Result<SourcesResult> {
        let database = self.database.lock().unwrap();
        let items = params
            .targets
            .iter()
            .map(|target| {
                let sources = database
                    .entries()
                    .iter()
                    .filter(|entry| {
                        entry
                            .compiler()
                            .map(|compiler| Self::target_for_compiler(&compiler) == *target)
                            .unwrap_or(false)
                    })
                    .map(|entry| {
                        let path = entry.file_path();
                        let language = path
                            .extension()
                            .and_then(|extension| extension.to_str())
                            .and_then(language_for_extension);
                        SourceItem {
                            uri: file_uri(&path),
                            kind: SourceItemKind::File,
                            generated: false,
                            data: Some(SourceItemData::SourceKit(SourceKitSourceItemData {
                                language,
                                kind: Some(SourceKitSourceItemKind::Source),
                                output_path: entry.output.clone(),
                            })),
                        }
                    })
                    .collect();
                SourcesItem {
                    target: target.clone(),
                    sources,
                    roots: None,
                }
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
        let database = self.database.lock().unwrap();
        let entries = database.entries_for_path(&path);
        let entry = entries
            .iter()
            .find(|entry| {
                entry
                    .compiler()
                    .map(|compiler| Self::target_for_compiler(&compiler) == params.target)
                    .unwrap_or(false)
            })
            .or_else(|| entries.first());
        Ok(entry.map(|entry| {
            let arguments = entry.arguments();
            TextDocumentSourceKitOptionsResult {
                // Drop the compiler executable.
                compiler_arguments: arguments.into_iter().skip(1).collect(),
                working_directory: Some(entry.directory.clone()),
                data: None,
            }
        }))
    }

    fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let affects_database = params.changes.iter().any(|change| {
            uri_to_file_path(&change.uri)
                .map(|path| path.file_name().map(|name| name == COMPILE_COMMANDS_FILE) == Some(true))
                .unwrap_or(false)
        });
        if affects_database {
            info!("compilation database changed on disk, reloading");
            self.reload();
        } else if params.changes.is_empty() {
            warn!("received empty watched-files change");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bsp_types::notifications::{BuildTargetEvent, FileChangeType, FileEvent};
    use bsp_types::{LanguageId, TextDocumentIdentifier};
    use tempfile::tempdir;

    use super::*;

    fn entry_with_command(directory: &str, file: &str, command: &str) -> CompilationDatabaseEntry {
        CompilationDatabaseEntry {
            directory: directory.to_string(),
            file: file.to_string(),
            command_line: CommandLine::Command {
                command: command.to_string(),
            },
            output: None,
        }
    }

    #[test]
    fn parses_command_and_arguments_variants() {
        let json = r#"[
            {"directory": "/build", "file": "a.c", "command": "clang -DX=\"a b\" -c a.c"},
            {"directory": "/build", "file": "b.c", "arguments": ["clang", "-c", "b.c"], "output": "b.o"}
        ]"#;
        let entries: Vec<CompilationDatabaseEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(
            entries[0].arguments(),
            vec!["clang", "-DX=a b", "-c", "a.c"]
        );
        assert_eq!(entries[1].arguments(), vec!["clang", "-c", "b.c"]);
        assert_eq!(entries[1].output.as_deref(), Some("b.o"));
    }

    #[test]
    fn round_trips_modulo_command_normalization() {
        let json = r#"[
            {"directory": "/build", "file": "a.c", "command": "clang -c a.c"},
            {"directory": "/build", "file": "b.c", "arguments": ["clang++", "-c", "b.c"], "output": "b.o"}
        ]"#;
        let entries: Vec<CompilationDatabaseEntry> = serde_json::from_str(json).unwrap();
        let database = JsonCompilationDatabase::from_entries(entries);

        let encoded = database.to_json();
        let reparsed: Vec<CompilationDatabaseEntry> =
            serde_json::from_value(encoded.clone()).unwrap();

        assert_eq!(
            reparsed,
            database
                .entries()
                .iter()
                .cloned()
                .map(CompilationDatabaseEntry::normalized)
                .collect::<Vec<_>>()
        );
        // Encoding the normalized database again is a fixpoint.
        assert_eq!(
            JsonCompilationDatabase::from_entries(reparsed).to_json(),
            encoded
        );
    }

    #[test]
    fn database_serialization_normalizes_to_arguments() {
        let database = JsonCompilationDatabase::from_entries(vec![entry_with_command(
            "/build",
            "a.c",
            "clang -c a.c",
        )]);

        insta::assert_json_snapshot!(database.to_json(),
            @r#"
        [
          {
            "directory": "/build",
            "file": "a.c",
            "arguments": [
              "clang",
              "-c",
              "a.c"
            ]
          }
        ]
        "#
        );
    }

    #[test]
    fn one_pseudo_target_per_compiler() {
        let database = JsonCompilationDatabase::from_entries(vec![
            entry_with_command("/build", "a.c", "clang -c a.c"),
            entry_with_command("/build", "b.cpp", "clang++ -c b.cpp"),
            entry_with_command("/build", "c.c", "clang -c c.c"),
        ]);
        assert_eq!(database.compilers(), vec!["clang", "clang++"]);

        let system = CompilationDatabaseBuildSystem {
            database_path: PathBuf::from("/build/compile_commands.json"),
            database: Mutex::new(database),
            sink: Mutex::new(None),
        };
        let targets = system.build_targets().unwrap().targets;
        assert_eq!(targets.len(), 2);
        let names: BTreeSet<_> = targets
            .iter()
            .filter_map(|target| target.display_name.clone())
            .collect();
        assert_eq!(names, BTreeSet::from(["clang".to_string(), "clang++".to_string()]));
    }

    #[test]
    fn options_drop_the_compiler_and_carry_the_directory() {
        let system = CompilationDatabaseBuildSystem {
            database_path: PathBuf::from("/build/compile_commands.json"),
            database: Mutex::new(JsonCompilationDatabase::from_entries(vec![
                entry_with_command("/build", "/proj/a.c", "clang -DDEBUG -c /proj/a.c"),
            ])),
            sink: Mutex::new(None),
        };

        let options = system
            .source_kit_options(TextDocumentSourceKitOptionsParams {
                text_document: TextDocumentIdentifier {
                    uri: file_uri("/proj/a.c"),
                },
                target: CompilationDatabaseBuildSystem::target_for_compiler("clang"),
                language: LanguageId::C,
            })
            .unwrap()
            .unwrap();

        assert_eq!(options.compiler_arguments, vec!["-DDEBUG", "-c", "/proj/a.c"]);
        assert_eq!(options.working_directory.as_deref(), Some("/build"));
    }

    #[test]
    fn reload_on_database_change_emits_targets_changed() {
        struct CountingSink {
            calls: AtomicUsize,
            saw_wholesale: AtomicUsize,
        }
        impl BuildSystemEventSink for CountingSink {
            fn build_targets_changed(&self, changes: Option<Vec<BuildTargetEvent>>) {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if changes.is_none() {
                    self.saw_wholesale.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let dir = tempdir().unwrap();
        let database_path = dir.path().join(COMPILE_COMMANDS_FILE);
        fs::write(
            &database_path,
            r#"[{"directory": "/build", "file": "a.c", "command": "clang -c a.c"}]"#,
        )
        .unwrap();

        let system = CompilationDatabaseBuildSystem::load(database_path.clone()).unwrap();
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            saw_wholesale: AtomicUsize::new(0),
        });
        system.connect(Arc::clone(&sink) as Arc<dyn BuildSystemEventSink>);

        fs::write(
            &database_path,
            r#"[{"directory": "/build", "file": "a.c", "command": "clang -DNEW -c a.c"}]"#,
        )
        .unwrap();
        system.did_change_watched_files(DidChangeWatchedFilesParams {
            changes: vec![FileEvent {
                uri: file_uri(&database_path),
                change_type: FileChangeType::Changed,
            }],
        });

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.saw_wholesale.load(Ordering::SeqCst), 1);
        let options = system
            .source_kit_options(TextDocumentSourceKitOptionsParams {
                text_document: TextDocumentIdentifier {
                    uri: file_uri("/build/a.c"),
                },
                target: CompilationDatabaseBuildSystem::target_for_compiler("clang"),
                language: LanguageId::C,
            })
            .unwrap()
            .unwrap();
        assert!(options.compiler_arguments.contains(&"-DNEW".to_string()));
    }
}
