use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// A resource identifier that is a valid URI according to rfc3986:
/// https://tools.ietf.org/html/rfc3986
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(pub String);

impl Uri {
    pub fn new(input: String) -> Self {
        Self(input)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Uri {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Uri {
    fn from(input: &str) -> Self {
        Self(input.to_string())
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A language id as defined by the LSP, e.g. `swift` or `objective-c`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(pub std::borrow::Cow<'static, str>);

impl LanguageId {
    pub const SWIFT: LanguageId = LanguageId::new("swift");
    pub const C: LanguageId = LanguageId::new("c");
    pub const CPP: LanguageId = LanguageId::new("cpp");
    pub const OBJECTIVE_C: LanguageId = LanguageId::new("objective-c");
    pub const OBJECTIVE_CPP: LanguageId = LanguageId::new("objective-cpp");

    pub const fn new(tag: &'static str) -> Self {
        LanguageId(std::borrow::Cow::Borrowed(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether sources of this language are compiled with a C-family frontend.
    pub fn is_c_family(&self) -> bool {
        matches!(
            self.as_str(),
            "c" | "cpp" | "objective-c" | "objective-cpp"
        )
    }
}

impl From<&str> for LanguageId {
    fn from(input: &str) -> Self {
        LanguageId(std::borrow::Cow::Owned(input.to_string()))
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Default, Clone, Hash, Ord, PartialOrd)]
pub struct TextDocumentIdentifier {
    pub uri: Uri,
}

/// A unique identifier for a target, can use any URI-compatible encoding as long as it is unique
/// within the workspace. Clients should not infer metadata out of the URI structure such as the
/// path or query parameters, use BuildTarget instead.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Default, Clone, Hash, Ord, PartialOrd)]
pub struct BuildTargetIdentifier {
    /// The target's Uri
    pub uri: Uri,
}

impl BuildTargetIdentifier {
    pub fn new(uri: impl Into<String>) -> Self {
        BuildTargetIdentifier {
            uri: Uri(uri.into()),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    /// The target's unique identifier
    pub id: BuildTargetIdentifier,

    /// A human readable name for this target.
    /// May be presented in the user interface.
    /// Should be unique if possible.
    /// The id.uri is used if None.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// The directory where this target belongs to. Multiple build targets are allowed to map
    /// to the same base directory, and a build target is not required to have a base directory.
    /// A base directory does not determine the sources of a target, see buildTarget/sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<Uri>,

    /// Free-form string tags to categorize or label this build target.
    /// Pre-defined tags are listed in `BuildTargetTag` but clients and servers
    /// are free to define new tags for custom purposes.
    pub tags: Vec<BuildTargetTag>,

    /// The capabilities of this build target.
    pub capabilities: BuildTargetCapabilities,

    /// The set of languages that this target contains.
    /// The ID string for each language is defined in the LSP.
    pub language_ids: Vec<LanguageId>,

    /// The direct upstream build target dependencies of this build target
    pub dependencies: Vec<BuildTargetIdentifier>,

    /// Build-system-specific metadata about this target.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub data: Option<BuildTargetData>,
}

impl BuildTarget {
    pub fn source_kit_data(&self) -> Option<&SourceKitBuildTarget> {
        match &self.data {
            Some(BuildTargetData::SourceKit(data)) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "dataKind", content = "data")]
pub enum BuildTargetData {
    #[serde(rename = "sourceKit")]
    SourceKit(SourceKitBuildTarget),
}

/// Metadata the build server may attach to a target for SourceKit clients.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitBuildTarget {
    /// The toolchain that should be used to build this target. The URI should point to the
    /// directory that contains the `usr` directory of the toolchain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<Uri>,

    /// Whether the target is a pseudo-target vending header files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_header: Option<bool>,
}

#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTargetTag {
    /// Target contains re-usable functionality for downstream targets.
    #[default]
    Library,

    /// Target contains source code for producing any kind of application.
    Application,

    /// Target contains source code for testing purposes.
    Test,

    /// Target is a dependency of the project but not part of it.
    Dependency,

    /// This target only exists to provide information (e.g. about header files) and cannot be
    /// built or prepared.
    NotBuildable,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BuildTargetCapabilities {
    /// This target can be compiled by the BSP server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_compile: Option<bool>,
    /// This target can be tested by the BSP server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_test: Option<bool>,
    /// This target can be run by the BSP server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_run: Option<bool>,
    /// This target can be debugged by the BSP server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_debug: Option<bool>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    /// Either a text document or a directory. A directory entry must end with a forward slash
    /// "/" and a directory entry implies that every nested text document within the directory
    /// belongs to this source item.
    pub uri: Uri,

    /// Type of file of the source item, such as whether it is file or directory.
    pub kind: SourceItemKind,

    /// Indicates if this source is automatically generated by the build and is not
    /// intended to be manually edited by the user.
    pub generated: bool,

    /// Build-system-specific metadata about this source item.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub data: Option<SourceItemData>,
}

impl SourceItem {
    pub fn source_kit_data(&self) -> Option<&SourceKitSourceItemData> {
        match &self.data {
            Some(SourceItemData::SourceKit(data)) => Some(data),
            None => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "dataKind", content = "data")]
pub enum SourceItemData {
    #[serde(rename = "sourceKit")]
    SourceKit(SourceKitSourceItemData),
}

#[derive(Debug, PartialEq, Serialize_repr, Deserialize_repr, Default, Clone)]
#[repr(u8)]
pub enum SourceItemKind {
    /// The source item references a normal file.
    #[default]
    File = 1,
    /// The source item references a directory.
    Directory = 2,
}

/// Metadata the build server may attach to a source item for SourceKit clients.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitSourceItemData {
    /// The language of the source file. If not set, the language is inferred from the file
    /// extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageId>,

    /// The kind of source file that this source item represents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKitSourceItemKind>,

    /// The output path that is used during indexing for this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKitSourceItemKind {
    /// A source file that belongs to the target.
    Source,
    /// A header file that belongs to the target.
    Header,
    /// A documentation catalog.
    DoccCatalog,
}

/// Included in notifications of tasks or requests to signal the completion state.
#[derive(Debug, PartialEq, Serialize_repr, Deserialize_repr, Default, Clone)]
#[repr(u8)]
pub enum StatusCode {
    /// Execution was successful.
    Ok = 1,
    /// Execution failed.
    #[default]
    Error = 2,
    /// Execution was cancelled.
    Cancelled = 3,
}

/// A `dataKind`/`data` envelope whose kind is not statically known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherData {
    pub data_kind: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn uri_ordering_is_lexicographic() {
        let mut uris = vec![Uri::from("z://b"), Uri::from("z://a")];
        uris.sort();
        assert_eq!(uris[0], Uri::from("z://a"));
    }

    #[test]
    fn language_id_c_family() {
        assert!(LanguageId::C.is_c_family());
        assert!(LanguageId::OBJECTIVE_CPP.is_c_family());
        assert!(!LanguageId::SWIFT.is_c_family());
    }

    #[test]
    fn build_target() {
        let test_data = BuildTarget {
            id: BuildTargetIdentifier::default(),
            display_name: Some("test_displayName".to_string()),
            base_directory: Some(Uri::from("test_baseDirectory")),
            tags: vec![BuildTargetTag::Test],
            capabilities: BuildTargetCapabilities::default(),
            language_ids: vec![LanguageId::SWIFT],
            dependencies: vec![BuildTargetIdentifier::default()],
            data: Some(BuildTargetData::SourceKit(SourceKitBuildTarget {
                toolchain: Some(Uri::from("file:///usr/toolchain")),
                is_header: None,
            })),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "id": {
            "uri": ""
          },
          "displayName": "test_displayName",
          "baseDirectory": "test_baseDirectory",
          "tags": [
            "test"
          ],
          "capabilities": {},
          "languageIds": [
            "swift"
          ],
          "dependencies": [
            {
              "uri": ""
            }
          ],
          "dataKind": "sourceKit",
          "data": {
            "toolchain": "file:///usr/toolchain"
          }
        }
        "#
        );
        assert_json_snapshot!(BuildTarget::default(),
            @r#"
        {
          "id": {
            "uri": ""
          },
          "tags": [],
          "capabilities": {},
          "languageIds": [],
          "dependencies": []
        }
        "#
        );
    }

    #[test]
    fn build_target_tag() {
        assert_json_snapshot!(BuildTargetTag::Library, @r#""library""#);
        assert_json_snapshot!(BuildTargetTag::Application, @r#""application""#);
        assert_json_snapshot!(BuildTargetTag::Test, @r#""test""#);
        assert_json_snapshot!(BuildTargetTag::Dependency, @r#""dependency""#);
        assert_json_snapshot!(BuildTargetTag::NotBuildable, @r#""not-buildable""#);
    }

    #[test]
    fn source_item() {
        let test_data = SourceItem {
            uri: Uri::from("file:///a.swift"),
            kind: SourceItemKind::File,
            generated: false,
            data: Some(SourceItemData::SourceKit(SourceKitSourceItemData {
                language: Some(LanguageId::SWIFT),
                kind: Some(SourceKitSourceItemKind::Source),
                output_path: Some("/build/a.o".to_string()),
            })),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "uri": "file:///a.swift",
          "kind": 1,
          "generated": false,
          "dataKind": "sourceKit",
          "data": {
            "language": "swift",
            "kind": "source",
            "outputPath": "/build/a.o"
          }
        }
        "#
        );
        assert_json_snapshot!(SourceItem::default(),
            @r#"
        {
          "uri": "",
          "kind": 1,
          "generated": false
        }
        "#
        );
    }

    #[test]
    fn source_item_kind() {
        assert_json_snapshot!(SourceItemKind::File, @"1");
        assert_json_snapshot!(SourceItemKind::Directory, @"2");
    }

    #[test]
    fn status_code() {
        assert_json_snapshot!(StatusCode::Ok, @"1");
        assert_json_snapshot!(StatusCode::Error, @"2");
        assert_json_snapshot!(StatusCode::Cancelled, @"3");
    }
}
