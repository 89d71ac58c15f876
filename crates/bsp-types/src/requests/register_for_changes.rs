use serde::{Deserialize, Serialize};

use crate::requests::Request;
use crate::Uri;

/// Legacy request for push-based build servers that do not implement
/// `textDocument/sourceKitOptions`: the client registers interest in a document and the server
/// publishes its settings through `build/sourceKitOptionsChanged` notifications.
#[derive(Debug)]
pub enum TextDocumentRegisterForChanges {}

impl Request for TextDocumentRegisterForChanges {
    type Params = RegisterForChangesParams;
    type Result = ();
    const METHOD: &'static str = "textDocument/registerForChanges";
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForChangesParams {
    /// The document to get options for.
    pub uri: Uri,

    /// Whether to register or unregister for the document's options.
    pub action: RegisterAction,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterAction {
    #[default]
    Register,
    Unregister,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn register_for_changes_method() {
        assert_eq!(
            TextDocumentRegisterForChanges::METHOD,
            "textDocument/registerForChanges"
        );
    }

    #[test]
    fn register_for_changes_params() {
        assert_json_snapshot!(RegisterForChangesParams {
            uri: Uri::from("file:///a.swift"),
            action: RegisterAction::Register,
        },
            @r#"
        {
          "uri": "file:///a.swift",
          "action": "register"
        }
        "#
        );
        assert_json_snapshot!(RegisterAction::Unregister, @r#""unregister""#);
    }
}
