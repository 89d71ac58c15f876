//! The files-and-directories view over the build targets' source items.
//!
//! `buildTarget/sources` answers per target; the manager folds all answers into two maps (one
//! for files, one for directory entries) so per-file queries need no further RPCs. A file
//! listed by several targets merges into a single [`SourceFileInfo`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::warn;

use bsp_types::{
    BuildTargetIdentifier, BuildTargetTag, LanguageId, SourceItemKind, SourceKitSourceItemKind,
    SourcesItem, Uri,
};

use crate::manager::build_graph::BuildTargetInfoMap;
use crate::utils::{is_descendant_path, uri_to_file_path};

/// The output path a build server associates with a source file in one target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputPath {
    Path(String),
    /// The build system as a whole does not report output paths.
    NotSupported,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFileInfo {
    /// The targets containing this file. The outer `Option` distinguishes "the server answered
    /// that this file has no output in this target" from the build-system-wide
    /// [`OutputPath::NotSupported`] sentinel.
    pub targets_to_output_path: HashMap<BuildTargetIdentifier, Option<OutputPath>>,

    /// Languages the server explicitly stated per target, used before extension inference.
    pub languages: HashMap<BuildTargetIdentifier, LanguageId>,

    /// Whether any containing target belongs to the root project rather than a dependency.
    pub is_part_of_root_project: bool,

    /// Whether the file may contain tests the editor should surface.
    pub may_contain_tests: bool,

    /// Whether the file is built by at least one target (headers and documentation catalogs
    /// are not).
    pub is_buildable: bool,
}

impl SourceFileInfo {
    /// Union with the view of another target. Mismatching output paths resolve to the
    /// lexicographic minimum so repeated merges stay deterministic.
    pub fn merge(&mut self, other: SourceFileInfo, uri: &Uri) {
        for (target, output_path) in other.targets_to_output_path {
            match self.targets_to_output_path.entry(target) {
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(output_path);
                }
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if *existing != output_path {
                        warn!("conflicting output paths for {uri}, picking the smaller one");
                        *existing = std::cmp::min(existing.clone(), output_path);
                    }
                }
            }
        }
        for (target, language) in other.languages {
            self.languages.entry(target).or_insert(language);
        }
        self.is_part_of_root_project |= other.is_part_of_root_project;
        self.may_contain_tests |= other.may_contain_tests;
        self.is_buildable |= other.is_buildable;
    }

    pub fn targets(&self) -> impl Iterator<Item = &BuildTargetIdentifier> {
        self.targets_to_output_path.keys()
    }
}

#[derive(Debug, Default)]
pub struct SourceFilesAndDirectories {
    pub files: HashMap<Uri, SourceFileInfo>,
    /// Keyed by directory URI; a file belongs to every directory entry it descends from.
    pub directories: HashMap<Uri, SourceFileInfo>,
    pub buildable_source_files: HashSet<Uri>,
}

impl SourceFilesAndDirectories {
    /// All targets claiming `uri`, directly or through a containing directory. The descendant
    /// test works on path components, not on textual prefixes.
    pub fn targets_for_uri(&self, uri: &Uri) -> Vec<BuildTargetIdentifier> {
        let mut targets: Vec<BuildTargetIdentifier> = self
            .files
            .get(uri)
            .map(|info| info.targets().cloned().collect())
            .unwrap_or_default();

        if let Some(path) = uri_to_file_path(uri) {
            for (directory, info) in &self.directories {
                let Some(directory_path) = uri_to_file_path(directory) else {
                    continue;
                };
                if is_descendant_path(&path, &directory_path) {
                    targets.extend(info.targets().cloned());
                }
            }
        }

        targets.sort();
        targets.dedup();
        targets
    }
}

/// Fold per-target source answers into the files-and-directories view.
pub fn collect_source_files(
    items: &[SourcesItem],
    targets: &BuildTargetInfoMap,
    workspace_root: &PathBuf,
    output_paths_supported: bool,
) -> SourceFilesAndDirectories {
    let mut result = SourceFilesAndDirectories::default();

    for item in items {
        let Some(info) = targets.get(&item.target) else {
            warn!("sources for unknown target {}", item.target.uri);
            continue;
        };
        let tags = &info.target.tags;
        let is_part_of_root_project = info
            .target
            .base_directory
            .as_ref()
            .and_then(uri_to_file_path)
            .map(|base| is_descendant_path(&base, workspace_root))
            .unwrap_or(false);
        let may_contain_tests = !tags.contains(&BuildTargetTag::Dependency);

        for source in &item.sources {
            let data = source.source_kit_data();
            let source_kind = data.and_then(|data| data.kind.clone());
            let is_buildable = !tags.contains(&BuildTargetTag::NotBuildable)
                && matches!(source_kind, None | Some(SourceKitSourceItemKind::Source));
            let output_path = if output_paths_supported {
                data.and_then(|data| data.output_path.clone())
                    .map(OutputPath::Path)
            } else {
                Some(OutputPath::NotSupported)
            };

            let file_info = SourceFileInfo {
                targets_to_output_path: HashMap::from([(item.target.clone(), output_path)]),
                languages: data
                    .and_then(|data| data.language.clone())
                    .map(|language| HashMap::from([(item.target.clone(), language)]))
                    .unwrap_or_default(),
                is_part_of_root_project,
                may_contain_tests,
                is_buildable,
            };

            let map = match source.kind {
                SourceItemKind::File => &mut result.files,
                SourceItemKind::Directory => &mut result.directories,
            };
            match map.get_mut(&source.uri) {
                Some(existing) => existing.merge(file_info, &source.uri),
                None => {
                    map.insert(source.uri.clone(), file_info);
                }
            }
        }
    }

    result.buildable_source_files = result
        .files
        .iter()
        .filter(|(_, info)| info.is_buildable)
        .map(|(uri, _)| uri.clone())
        .collect();

    result
}
