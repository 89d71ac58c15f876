use serde::{Deserialize, Serialize};

use crate::requests::Request;
use crate::{LanguageId, Uri};

/// Like the language server protocol, the initialize request is sent as the first request from
/// the client to the server. Until the server has responded with an `InitializeBuildResult`, the
/// client must not send any additional requests or notifications to the server.
#[derive(Debug)]
pub enum BuildInitialize {}

impl Request for BuildInitialize {
    type Params = InitializeBuildParams;
    type Result = InitializeBuildResult;
    const METHOD: &'static str = "build/initialize";
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBuildParams {
    /// Name of the client
    pub display_name: String,
    /// The version of the client
    pub version: String,
    /// The BSP version that the client speaks
    pub bsp_version: String,
    /// The rootUri of the workspace
    pub root_uri: Uri,
    /// The capabilities of the client
    pub capabilities: BuildClientCapabilities,
    /// Additional metadata about the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildClientCapabilities {
    /// The languages that this client supports.
    /// The ID strings for each language is defined in the LSP.
    /// The server must never respond with build targets for other
    /// languages than those that appear in this list.
    pub language_ids: Vec<LanguageId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBuildResult {
    /// Name of the server
    pub display_name: String,
    /// The version of the server
    pub version: String,
    /// The BSP version that the server speaks
    pub bsp_version: String,
    /// The capabilities of the build server
    pub capabilities: BuildServerCapabilities,
    /// Additional metadata about the server
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub data: Option<InitializeBuildResultData>,
}

impl InitializeBuildResult {
    pub fn source_kit_data(&self) -> Option<&SourceKitInitializeBuildResponseData> {
        match &self.data {
            Some(InitializeBuildResultData::SourceKit(data)) => Some(data),
            None => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "dataKind", content = "data")]
pub enum InitializeBuildResultData {
    #[serde(rename = "sourceKit")]
    SourceKit(SourceKitInitializeBuildResponseData),
}

/// The capabilities of the build server relevant to the integration layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildServerCapabilities {
    /// The server sends notifications to the client on build
    /// target change events via buildTarget/didChange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_target_changed_provider: Option<bool>,
}

/// Capability and path information a SourceKit-aware build server declares in the
/// `data` field of its initialize response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitInitializeBuildResponseData {
    /// The path to the raw index store, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_store_path: Option<String>,

    /// The path to put the index database, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_database_path: Option<String>,

    /// Glob patterns for files the client should watch on behalf of the server, in addition to
    /// the source files of the build targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchers: Option<Vec<FileSystemWatcher>>,

    /// Whether the server supports the `buildTarget/prepare` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepare_provider: Option<bool>,

    /// Whether the server answers `textDocument/sourceKitOptions` requests. When absent, the
    /// client falls back to the legacy push-based settings notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_kit_options_provider: Option<bool>,

    /// Whether the server associates an output path with every source file. When absent, output
    /// paths are reported as unsupported for the entire build system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_paths_provider: Option<bool>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemWatcher {
    /// The glob pattern to watch.
    pub glob_pattern: String,

    /// The kind of events of interest. If omitted it defaults to
    /// create | change | delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use crate::tests::test_deserialization;

    use super::*;

    #[test]
    fn initialize_build_method() {
        assert_eq!(BuildInitialize::METHOD, "build/initialize");
    }

    #[test]
    fn initialize_build_params() {
        let test_data = InitializeBuildParams {
            display_name: "test_name".to_string(),
            version: "1.0.0".to_string(),
            bsp_version: "2.0.0".to_string(),
            root_uri: Uri::from("file:///test"),
            capabilities: BuildClientCapabilities {
                language_ids: vec![LanguageId::SWIFT, LanguageId::C],
            },
            data: None,
        };

        test_deserialization(
            r#"{"displayName":"test_name","version":"1.0.0","bspVersion":"2.0.0","rootUri":"file:///test","capabilities":{"languageIds":["swift","c"]}}"#,
            &test_data,
        );

        test_deserialization(
            r#"{"displayName":"","version":"","bspVersion":"","rootUri":"","capabilities":{"languageIds":[]}}"#,
            &InitializeBuildParams::default(),
        );
    }

    #[test]
    fn initialize_build_result() {
        let test_data = InitializeBuildResult {
            display_name: "test_name".to_string(),
            version: "1.0.0".to_string(),
            bsp_version: "2.0.0".to_string(),
            capabilities: BuildServerCapabilities {
                build_target_changed_provider: Some(true),
            },
            data: Some(InitializeBuildResultData::SourceKit(
                SourceKitInitializeBuildResponseData {
                    index_store_path: Some("/index/store".to_string()),
                    index_database_path: Some("/index/db".to_string()),
                    watchers: Some(vec![FileSystemWatcher {
                        glob_pattern: "**/compile_commands.json".to_string(),
                        kind: None,
                    }]),
                    prepare_provider: Some(true),
                    source_kit_options_provider: Some(true),
                    output_paths_provider: None,
                },
            )),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "displayName": "test_name",
          "version": "1.0.0",
          "bspVersion": "2.0.0",
          "capabilities": {
            "buildTargetChangedProvider": true
          },
          "dataKind": "sourceKit",
          "data": {
            "indexStorePath": "/index/store",
            "indexDatabasePath": "/index/db",
            "watchers": [
              {
                "globPattern": "**/compile_commands.json"
              }
            ],
            "prepareProvider": true,
            "sourceKitOptionsProvider": true
          }
        }
        "#
        );
        assert_json_snapshot!(InitializeBuildResult::default(),
            @r#"
        {
          "displayName": "",
          "version": "",
          "bspVersion": "",
          "capabilities": {}
        }
        "#
        );
    }
}
