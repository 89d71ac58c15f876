use serde::{Deserialize, Serialize};

use crate::notifications::Notification;

/// Notification sent to cancel an in-flight request. A request that was cancelled should return
/// an error response; it must not be left unanswered.
#[derive(Debug)]
pub enum CancelRequest {}

impl Notification for CancelRequest {
    type Params = CancelRequestParams;
    const METHOD: &'static str = "$/cancelRequest";
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct CancelRequestParams {
    /// The request id to cancel.
    pub id: RequestIdParam,
}

/// JSON-RPC allows both numeric and string request ids.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum RequestIdParam {
    Number(i32),
    String(String),
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn cancel_request_method() {
        assert_eq!(CancelRequest::METHOD, "$/cancelRequest");
    }

    #[test]
    fn cancel_request_params() {
        assert_json_snapshot!(CancelRequestParams {
            id: RequestIdParam::Number(7),
        },
            @r#"
        {
          "id": 7
        }
        "#
        );
        assert_json_snapshot!(CancelRequestParams {
            id: RequestIdParam::String("7".to_string()),
        },
            @r#"
        {
          "id": "7"
        }
        "#
        );
    }
}
