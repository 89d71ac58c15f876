use serde::{Deserialize, Serialize};

use crate::notifications::{Notification, TaskId};
use crate::StatusCode;

#[derive(Debug)]
pub enum OnBuildTaskStart {}

impl Notification for OnBuildTaskStart {
    type Params = TaskStartParams;
    const METHOD: &'static str = "build/taskStart";
}

#[derive(Debug)]
pub enum OnBuildTaskProgress {}

impl Notification for OnBuildTaskProgress {
    type Params = TaskProgressParams;
    const METHOD: &'static str = "build/taskProgress";
}

#[derive(Debug)]
pub enum OnBuildTaskFinish {}

impl Notification for OnBuildTaskFinish {
    type Params = TaskFinishParams;
    const METHOD: &'static str = "build/taskFinish";
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskStartParams {
    /// Unique id of the task with optional reference to parent task id
    pub task_id: TaskId,

    /// Timestamp of when the event started in milliseconds since Epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,

    /// Message describing the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressParams {
    /// Unique id of the task with optional reference to parent task id
    pub task_id: TaskId,

    /// Timestamp of when the progress event was generated in milliseconds since Epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,

    /// Message describing the task progress.
    /// Information about the state of the task at the time the event is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// If known, total amount of work units in this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    /// If known, completed amount of work units in this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,

    /// Name of a work unit. For example, "files" or "tests". May be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskFinishParams {
    /// Unique id of the task with optional reference to parent task id
    pub task_id: TaskId,

    /// Timestamp of the event in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,

    /// Message describing the finish event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Task completion status.
    pub status: StatusCode,
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn task_methods() {
        assert_eq!(OnBuildTaskStart::METHOD, "build/taskStart");
        assert_eq!(OnBuildTaskProgress::METHOD, "build/taskProgress");
        assert_eq!(OnBuildTaskFinish::METHOD, "build/taskFinish");
    }

    #[test]
    fn task_start_params() {
        let test_data = TaskStartParams {
            task_id: TaskId {
                id: "test_id".to_string(),
                parents: vec![],
            },
            event_time: Some(1),
            message: Some("test_message".to_string()),
        };

        assert_json_snapshot!(test_data,
            @r#"
        {
          "taskId": {
            "id": "test_id"
          },
          "eventTime": 1,
          "message": "test_message"
        }
        "#
        );
    }

    #[test]
    fn task_finish_params() {
        assert_json_snapshot!(TaskFinishParams::default(),
            @r#"
        {
          "taskId": {
            "id": ""
          },
          "status": 2
        }
        "#
        );
    }
}
