//! The narrow surface through which the manager notifies the editor-facing layer.

use std::collections::BTreeSet;

use bsp_types::notifications::{BuildTargetEvent, LogMessageParams, TaskId};
use bsp_types::{StatusCode, Uri};

/// Implemented by the LSP server (its `ClientConnection`). The manager holds the delegate
/// weakly; events fired during shutdown are dropped.
pub trait BuildSystemManagerDelegate: Send + Sync {
    /// The build settings of the given files may have changed and should be re-queried.
    fn file_build_settings_changed(&self, changed_files: &BTreeSet<Uri>);

    /// Dependencies of the given files changed; indexed information may be stale.
    fn files_dependencies_updated(&self, changed_files: &BTreeSet<Uri>);

    /// The set of build targets (or their contents) changed.
    fn build_targets_changed(&self, changes: Option<Vec<BuildTargetEvent>>);

    /// A log message from the build server, to surface in the editor's output pane.
    fn log_message(&self, params: LogMessageParams) {
        log::info!("build server: {}", params.message);
    }

    /// A long-running build-server task started.
    fn work_done_progress_began(&self, _task_id: &TaskId, _message: Option<&str>) {}

    /// Progress on a previously started task.
    fn work_done_progress_report(&self, _task_id: &TaskId, _message: Option<&str>) {}

    /// A previously started task finished.
    fn work_done_progress_ended(&self, _task_id: &TaskId, _status: StatusCode) {}
}
