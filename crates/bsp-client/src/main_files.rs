//! Resolution of header files to the "main" translation units that include them.
//!
//! Swift files are their own main file. For C-family files the main-file index is consulted
//! through [`MainFilesProvider`]; the selection among multiple candidates is deterministic so
//! repeated queries return the same translation unit.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use bsp_types::{LanguageId, Uri};

use crate::utils::{file_uri, uri_to_file_path};

/// Narrow interface to the index that knows which translation units include a header.
pub trait MainFilesProvider: Send + Sync {
    fn main_files_containing_file(&self, uri: &Uri) -> BTreeSet<Uri>;
}

/// A provider for build systems without an index; every file is its own main file.
pub struct NoMainFiles;

impl MainFilesProvider for NoMainFiles {
    fn main_files_containing_file(&self, _uri: &Uri) -> BTreeSet<Uri> {
        BTreeSet::new()
    }
}

/// Pick the main file for `uri` out of the candidates reported by the provider.
///
/// If `uri` is itself a candidate it wins; otherwise the lexicographically smallest candidate
/// is chosen. An empty candidate set resolves to `uri` itself. When
/// `standardize_private_paths` is set (Darwin-like hosts), a candidate that the index reported
/// through a `/private` realpath but whose standardized form is in the buildable source set is
/// replaced by the standardized form; the query URI itself is never rewritten this way.
pub fn resolve_main_file(
    uri: &Uri,
    candidates: &BTreeSet<Uri>,
    buildable_source_files: &HashSet<Uri>,
    standardize_private_paths: bool,
) -> Uri {
    if candidates.contains(uri) {
        return uri.clone();
    }

    let standardized: BTreeSet<Uri> = candidates
        .iter()
        .map(|candidate| {
            if !standardize_private_paths || candidate == uri {
                return candidate.clone();
            }
            if buildable_source_files.contains(candidate) {
                return candidate.clone();
            }
            match standardized_uri(candidate) {
                Some(replacement) if buildable_source_files.contains(&replacement) => replacement,
                _ => candidate.clone(),
            }
        })
        .collect();

    standardized
        .into_iter()
        .next()
        .unwrap_or_else(|| uri.clone())
}

/// Whether files of this language are always their own main file.
pub fn is_own_main_file(language: Option<&LanguageId>) -> bool {
    !matches!(language, Some(language) if language.is_c_family())
}

/// `/private/tmp/x.c` → `/tmp/x.c` and the like.
fn standardized_uri(uri: &Uri) -> Option<Uri> {
    let path = uri_to_file_path(uri)?;
    let stripped = path.strip_prefix("/private").ok()?;
    for standardizable in ["tmp", "var", "etc"] {
        if stripped.starts_with(standardizable) {
            return Some(file_uri(Path::new("/").join(stripped)));
        }
    }
    None
}
