use serde::{Deserialize, Serialize};

use crate::notifications::Notification;
use crate::Uri;

/// Legacy push-based settings notification: servers that do not answer
/// `textDocument/sourceKitOptions` requests publish the options of every registered document
/// through this notification instead.
#[derive(Debug)]
pub enum OnSourceKitOptionsChanged {}

impl Notification for OnSourceKitOptionsChanged {
    type Params = SourceKitOptionsChangedParams;
    const METHOD: &'static str = "build/sourceKitOptionsChanged";
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitOptionsChangedParams {
    /// The document whose options changed.
    pub uri: Uri,

    /// The updated options.
    pub updated_options: SourceKitOptions,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitOptions {
    /// The compiler options required for the requested file.
    pub options: Vec<String>,

    /// The working directory for the compile command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn options_changed_method() {
        assert_eq!(
            OnSourceKitOptionsChanged::METHOD,
            "build/sourceKitOptionsChanged"
        );
    }

    #[test]
    fn options_changed_params() {
        let test_data = SourceKitOptionsChangedParams {
            uri: Uri::from("file:///a.c"),
            updated_options: SourceKitOptions {
                options: vec!["-DDEBUG".to_string()],
                working_directory: Some("/build".to_string()),
            },
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "uri": "file:///a.c",
          "updatedOptions": {
            "options": [
              "-DDEBUG"
            ],
            "workingDirectory": "/build"
          }
        }
        "#
        );
    }
}
