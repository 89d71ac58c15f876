use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::notifications::{Notification, TaskId};

/// The log message notification is sent from the server to the client to ask the client to log
/// a particular message in its console.
#[derive(Debug)]
pub enum OnBuildLogMessage {}

impl Notification for OnBuildLogMessage {
    type Params = LogMessageParams;
    const METHOD: &'static str = "build/logMessage";
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LogMessageParams {
    /// The message type.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// The task id if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskId>,

    /// The actual message.
    pub message: String,
}

#[derive(Debug, PartialEq, Serialize_repr, Deserialize_repr, Default, Clone)]
#[repr(u8)]
pub enum MessageType {
    /// An error message.
    Error = 1,
    /// A warning message.
    Warning = 2,
    /// An information message.
    Info = 3,
    /// A log message.
    #[default]
    Log = 4,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn log_message_method() {
        assert_eq!(OnBuildLogMessage::METHOD, "build/logMessage");
    }

    #[test]
    fn log_message_params() {
        let test_data = LogMessageParams {
            message_type: MessageType::Error,
            task: Some(TaskId::default()),
            message: "test_message".to_string(),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "type": 1,
          "task": {
            "id": ""
          },
          "message": "test_message"
        }
        "#
        );
    }

    #[test]
    fn message_type() {
        assert_json_snapshot!(MessageType::Error, @"1");
        assert_json_snapshot!(MessageType::Warning, @"2");
        assert_json_snapshot!(MessageType::Info, @"3");
        assert_json_snapshot!(MessageType::Log, @"4");
    }
}
