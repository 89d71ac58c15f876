//! Build settings for a single file, as handed to the editor-facing layer.

use std::path::Path;

use bsp_types::requests::TextDocumentSourceKitOptionsResult;
use bsp_types::LanguageId;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileBuildSettings {
    /// The compiler arguments to use for the file.
    pub compiler_arguments: Vec<String>,

    /// The working directory to resolve any relative paths in `compiler_arguments`.
    pub working_directory: Option<String>,

    /// The language the arguments were computed for.
    pub language: Option<LanguageId>,

    /// Additional data from the build server, passed through verbatim.
    pub data: Option<serde_json::Value>,

    /// Whether the settings were synthesized because no build server could answer (yet).
    pub is_fallback: bool,
}

impl FileBuildSettings {
    pub fn from_response(
        response: TextDocumentSourceKitOptionsResult,
        language: LanguageId,
    ) -> FileBuildSettings {
        FileBuildSettings {
            compiler_arguments: response.compiler_arguments,
            working_directory: response.working_directory,
            language: Some(language),
            data: response.data,
            is_fallback: false,
        }
    }

    /// Settings for a header file, derived from the settings of a main file that includes it:
    /// the last argument naming the main file is replaced by the header's path, and for
    /// C-family languages a `-x<lang>` marker is prepended so any remaining mode flags don't
    /// misinterpret the header.
    pub fn patching(
        &self,
        new_file: &Path,
        original_file: &Path,
        language: Option<&LanguageId>,
    ) -> FileBuildSettings {
        let mut arguments = self.compiler_arguments.clone();
        let original_basename = original_file.file_name();

        let patch_index = arguments.iter().rposition(|argument| {
            let argument_path = Path::new(argument);
            argument_path.file_name() == original_basename
                && original_file.ends_with(argument_path)
        });
        if let Some(index) = patch_index {
            arguments[index] = new_file.to_string_lossy().into_owned();
        }
        if let Some(marker) = language.and_then(x_language_marker) {
            arguments.insert(0, marker.to_string());
        }

        FileBuildSettings {
            compiler_arguments: arguments,
            working_directory: self.working_directory.clone(),
            language: language.cloned().or_else(|| self.language.clone()),
            data: self.data.clone(),
            is_fallback: self.is_fallback,
        }
    }

    /// The module the file belongs to, parsed out of the compiler arguments.
    pub fn module_name(&self, language: &LanguageId) -> Option<String> {
        if *language == LanguageId::SWIFT {
            // The last -module-name wins if the argument is repeated.
            self.compiler_arguments
                .windows(2)
                .rev()
                .find(|pair| pair[0] == "-module-name")
                .map(|pair| pair[1].clone())
        } else if language.is_c_family() {
            self.compiler_arguments
                .iter()
                .rev()
                .find_map(|argument| argument.strip_prefix("-fmodule-name="))
                .map(str::to_string)
        } else {
            None
        }
    }
}

fn x_language_marker(language: &LanguageId) -> Option<&'static str> {
    match language.as_str() {
        "c" => Some("-xc"),
        "cpp" => Some("-xc++"),
        "objective-c" => Some("-xobjective-c"),
        "objective-cpp" => Some("-xobjective-c++"),
        _ => None,
    }
}

/// Infer a language from a file extension when the build server did not state one.
pub fn language_for_extension(extension: &str) -> Option<LanguageId> {
    match extension {
        "swift" => Some(LanguageId::SWIFT),
        "c" => Some(LanguageId::C),
        "cc" | "cp" | "cpp" | "cxx" | "c++" => Some(LanguageId::CPP),
        "m" => Some(LanguageId::OBJECTIVE_C),
        "mm" => Some(LanguageId::OBJECTIVE_CPP),
        _ => None,
    }
}
