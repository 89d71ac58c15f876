//! Fallback build settings, used whenever no build server can answer for a file.

use bsp_types::{LanguageId, Uri};

use crate::settings::FileBuildSettings;
use crate::utils::uri_to_file_path;

/// Synthesize settings that at least let the file itself be parsed.
///
/// `has_build_system` distinguishes "the build server hasn't answered (yet)" from "there is no
/// build system at all": only the former is marked as fallback, because in the latter case no
/// non-fallback settings can ever replace these.
pub fn fallback_build_settings(
    uri: &Uri,
    language: &LanguageId,
    has_build_system: bool,
) -> Option<FileBuildSettings> {
    let path = uri_to_file_path(uri)?;
    let mut compiler_arguments = Vec::new();
    compiler_arguments.push(path.to_string_lossy().into_owned());

    Some(FileBuildSettings {
        compiler_arguments,
        working_directory: path
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned()),
        language: Some(language.clone()),
        data: None,
        is_fallback: has_build_system,
    })
}
