use serde::{Deserialize, Serialize};

use crate::requests::Request;
use crate::BuildTargetIdentifier;

/// The prepare request is sent from the client to the server to ask the server to build the
/// transitive module dependencies of the given targets to the point where semantic functionality
/// is available, without performing a full build.
#[derive(Debug)]
pub enum BuildTargetPrepare {}

impl Request for BuildTargetPrepare {
    type Params = PrepareParams;
    type Result = ();
    const METHOD: &'static str = "buildTarget/prepare";
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareParams {
    /// The targets to prepare.
    pub targets: Vec<BuildTargetIdentifier>,
}
