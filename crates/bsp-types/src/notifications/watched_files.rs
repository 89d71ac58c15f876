use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::notifications::Notification;
use crate::Uri;

/// The watched files change notification is sent from the client to the server when the client
/// detects changes to files that the server registered interest in, either through source items
/// or through the watchers declared in the initialize response.
#[derive(Debug)]
pub enum OnWatchedFilesDidChange {}

impl Notification for OnWatchedFilesDidChange {
    type Params = DidChangeWatchedFilesParams;
    const METHOD: &'static str = "workspace/didChangeWatchedFiles";
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeWatchedFilesParams {
    /// The actual file events.
    pub changes: Vec<FileEvent>,
}

#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileEvent {
    /// The file's URI.
    pub uri: Uri,

    /// The change type.
    #[serde(rename = "type")]
    pub change_type: FileChangeType,
}

#[derive(Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr, Default, Clone)]
#[repr(u8)]
pub enum FileChangeType {
    /// The file got created.
    #[default]
    Created = 1,
    /// The file got changed.
    Changed = 2,
    /// The file got deleted.
    Deleted = 3,
}
