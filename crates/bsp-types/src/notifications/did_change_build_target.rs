use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::notifications::Notification;
use crate::BuildTargetIdentifier;

/// The build target changed notification is sent from the server to the client to signal a
/// change in a build target. `changes: null` means that an unknown set of targets changed and
/// the client must discard every cached piece of build-system state.
#[derive(Debug)]
pub enum OnBuildTargetDidChange {}

impl Notification for OnBuildTargetDidChange {
    type Params = DidChangeBuildTargetParams;
    const METHOD: &'static str = "buildTarget/didChange";
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
pub struct DidChangeBuildTargetParams {
    pub changes: Option<Vec<BuildTargetEvent>>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
pub struct BuildTargetEvent {
    /// The identifier for the changed build target
    pub target: BuildTargetIdentifier,

    /// The kind of change for this build target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<BuildTargetEventKind>,

    /// Any additional metadata about what information changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, PartialEq, Serialize_repr, Deserialize_repr, Default, Clone)]
#[repr(u8)]
pub enum BuildTargetEventKind {
    /// The build target is new.
    #[default]
    Created = 1,
    /// The build target has changed.
    Changed = 2,
    /// The build target has been deleted.
    Deleted = 3,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use crate::tests::test_deserialization;

    use super::*;

    #[test]
    fn did_change_build_target_method() {
        assert_eq!(OnBuildTargetDidChange::METHOD, "buildTarget/didChange");
    }

    #[test]
    fn did_change_build_target_params() {
        let test_data = DidChangeBuildTargetParams {
            changes: Some(vec![BuildTargetEvent::default()]),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "changes": [
            {
              "target": {
                "uri": ""
              }
            }
          ]
        }
        "#
        );
        assert_json_snapshot!(DidChangeBuildTargetParams::default(),
            @r#"
        {
          "changes": null
        }
        "#
        );
        test_deserialization(r#"{"changes":null}"#, &DidChangeBuildTargetParams::default());
    }

    #[test]
    fn build_target_event_kind() {
        assert_json_snapshot!(BuildTargetEventKind::Created, @"1");
        assert_json_snapshot!(BuildTargetEventKind::Changed, @"2");
        assert_json_snapshot!(BuildTargetEventKind::Deleted, @"3");
    }
}
