use serde::{Deserialize, Serialize};

/// Structure describing how to start a BSP server and the capabilities it supports.
/// This is the content of `.bsp/*.json` and of the legacy `buildServer.json`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BspConnectionDetails {
    /// The name of the BSP server.
    pub name: String,
    /// Arguments to pass to the BSP server. `argv[0]` may be relative to the directory
    /// containing the configuration file.
    pub argv: Vec<String>,
    /// The version of the BSP server.
    pub version: String,
    /// Supported BSP version.
    pub bsp_version: String,
    /// The languages supported by the BSP server.
    pub languages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use crate::tests::test_deserialization;

    use super::*;

    #[test]
    fn bsp_connection_details() {
        let test_data = BspConnectionDetails {
            name: "test_server".to_string(),
            argv: vec!["server.py".to_string(), "--stdio".to_string()],
            version: "1.0.0".to_string(),
            bsp_version: "2.1.0".to_string(),
            languages: vec!["swift".to_string()],
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "name": "test_server",
          "argv": [
            "server.py",
            "--stdio"
          ],
          "version": "1.0.0",
          "bspVersion": "2.1.0",
          "languages": [
            "swift"
          ]
        }
        "#
        );

        test_deserialization(
            r#"{"name":"test_server","argv":["server.py","--stdio"],"version":"1.0.0","bspVersion":"2.1.0","languages":["swift"]}"#,
            &test_data,
        );
    }
}
