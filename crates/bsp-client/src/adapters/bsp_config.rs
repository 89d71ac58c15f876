//! Discovery of external build-server configurations.
//!
//! A workspace advertises its build server through `.bsp/*.json` (preferred) or the legacy
//! `buildServer.json`; user- and system-scope directories allow a server to be installed once
//! for every workspace. The search order is workspace, user scope, system scope, legacy.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::warn;

use bsp_types::BspConnectionDetails;

use crate::error::AdapterError;

/// A discovered server description together with the directory of its configuration file,
/// against which a relative `argv[0]` is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfigLocation {
    pub details: BspConnectionDetails,
    pub config_directory: PathBuf,
}

/// Where to look for configurations outside the workspace. Split out of [`discover`] so the
/// environment-dependent parts stay testable.
#[derive(Debug, Clone, Default)]
pub struct ConfigSearchPaths {
    pub user_scope: Vec<PathBuf>,
    pub system_scope: Vec<PathBuf>,
}

impl ConfigSearchPaths {
    #[cfg(windows)]
    pub fn from_env() -> ConfigSearchPaths {
        ConfigSearchPaths {
            user_scope: std::env::var_os("LOCALAPPDATA")
                .map(|dir| PathBuf::from(dir).join("bsp"))
                .into_iter()
                .collect(),
            system_scope: std::env::var_os("PROGRAMDATA")
                .map(|dir| PathBuf::from(dir).join("bsp"))
                .into_iter()
                .collect(),
        }
    }

    #[cfg(all(unix, target_os = "macos"))]
    pub fn from_env() -> ConfigSearchPaths {
        let mut user_scope: Vec<PathBuf> = std::env::var_os("XDG_DATA_HOME")
            .map(|dir| PathBuf::from(dir).join("bsp"))
            .into_iter()
            .collect();
        if let Some(home) = std::env::var_os("HOME") {
            user_scope.push(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("bsp"),
            );
        }
        ConfigSearchPaths {
            user_scope,
            system_scope: vec![PathBuf::from("/Library/Application Support/bsp")],
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    pub fn from_env() -> ConfigSearchPaths {
        let user_scope = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share"))
            })
            .map(|dir| dir.join("bsp"))
            .into_iter()
            .collect();

        let data_dirs = std::env::var_os("XDG_DATA_DIRS")
            .unwrap_or_else(|| OsString::from("/usr/local/share:/usr/share"));
        let system_scope = std::env::split_paths(&data_dirs)
            .map(|dir| dir.join("bsp"))
            .collect();

        ConfigSearchPaths {
            user_scope,
            system_scope,
        }
    }
}

/// Find the configuration to use for `workspace_root`, if any.
pub fn discover(
    workspace_root: &Path,
    search_paths: &ConfigSearchPaths,
) -> Option<ServerConfigLocation> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    candidates.extend(json_files_in(&workspace_root.join(".bsp")));
    for scope in search_paths
        .user_scope
        .iter()
        .chain(&search_paths.system_scope)
    {
        candidates.extend(json_files_in(scope));
    }
    let legacy = workspace_root.join("buildServer.json");
    if legacy.is_file() {
        candidates.push(legacy);
    }

    candidates.into_iter().find_map(|path| {
        match load_config(&path) {
            Ok(details) => Some(ServerConfigLocation {
                details,
                config_directory: path.parent()?.to_path_buf(),
            }),
            Err(err) => {
                warn!("ignoring malformed build server config {}: {err:#}", path.display());
                None
            }
        }
    })
}

fn json_files_in(directory: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(directory) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "json") == Some(true) && path.is_file())
        .collect();
    // Lexicographic, so the choice among several configurations is deterministic.
    files.sort();
    files
}

fn load_config(path: &Path) -> Result<BspConnectionDetails> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Resolve the server's argv into a spawnable program and arguments.
///
/// `argv[0]` may be relative to the configuration directory. Python scripts are run through a
/// `python3`/`python` interpreter discovered on `PATH`; on Windows a missing `.exe` extension
/// is appended.
pub fn resolve_command(
    location: &ServerConfigLocation,
    path_env: Option<&OsString>,
) -> Result<(PathBuf, Vec<String>)> {
    let mut argv = location.details.argv.iter();
    let Some(program) = argv.next() else {
        return Err(AdapterError::Protocol("build server config has an empty argv".to_string()).into());
    };
    let arguments: Vec<String> = argv.cloned().collect();

    let mut program_path = PathBuf::from(program);
    if program_path.is_relative() {
        program_path = location.config_directory.join(program_path);
    }

    if program_path.extension().map(|ext| ext == "py") == Some(true) {
        let interpreter = find_python(path_env).ok_or_else(|| {
            AdapterError::ExecutableNotFound("python3".to_string())
        })?;
        let mut script_arguments = vec![program_path.to_string_lossy().into_owned()];
        script_arguments.extend(arguments);
        return Ok((interpreter, script_arguments));
    }

    if cfg!(windows) && program_path.extension().is_none() {
        program_path.set_extension("exe");
    }
    Ok((program_path, arguments))
}

fn find_python(path_env: Option<&OsString>) -> Option<PathBuf> {
    let path_env = path_env.cloned().or_else(|| {
        std::env::var_os("PATH").or_else(|| std::env::var_os("Path"))
    })?;
    let names: &[&str] = if cfg!(windows) {
        &["python3.exe", "python.exe"]
    } else {
        &["python3", "python"]
    };
    for name in names {
        for directory in std::env::split_paths(&path_env) {
            let candidate = directory.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
