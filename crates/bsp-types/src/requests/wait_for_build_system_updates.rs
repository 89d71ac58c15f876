use crate::requests::Request;

/// The request is sent from the client to the server to wait until the build server has processed
/// all outstanding changes to the build system (e.g. package manifest edits) so that requests
/// like `workspace/buildTargets` return up-to-date results.
#[derive(Debug)]
pub enum WorkspaceWaitForBuildSystemUpdates {}

impl Request for WorkspaceWaitForBuildSystemUpdates {
    type Params = ();
    type Result = ();
    const METHOD: &'static str = "workspace/waitForBuildSystemUpdates";
}
