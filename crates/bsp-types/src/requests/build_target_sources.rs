use serde::{Deserialize, Serialize};

use crate::requests::Request;
use crate::{BuildTargetIdentifier, SourceItem, Uri};

/// The build target sources request is sent from the client to the server to query for the list
/// of text documents and directories that are belong to a build target.
#[derive(Debug)]
pub enum BuildTargetSources {}

impl Request for BuildTargetSources {
    type Params = SourcesParams;
    type Result = SourcesResult;
    const METHOD: &'static str = "buildTarget/sources";
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesParams {
    pub targets: Vec<BuildTargetIdentifier>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResult {
    pub items: Vec<SourcesItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesItem {
    pub target: BuildTargetIdentifier,

    /// The text documents or and directories that belong to this build target.
    pub sources: Vec<SourceItem>,

    /// The root directories from where source files should be relativized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<Uri>>,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn build_target_sources_method() {
        assert_eq!(BuildTargetSources::METHOD, "buildTarget/sources");
    }

    #[test]
    fn sources_item() {
        let test_data = SourcesItem {
            target: BuildTargetIdentifier::new("target://a"),
            sources: vec![SourceItem::default()],
            roots: Some(vec![Uri::from("file:///root")]),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "target": {
            "uri": "target://a"
          },
          "sources": [
            {
              "uri": "",
              "kind": 1,
              "generated": false
            }
          ],
          "roots": [
            "file:///root"
          ]
        }
        "#
        );
    }
}
