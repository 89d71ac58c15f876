use serde::{Deserialize, Serialize};

use crate::notifications::Notification;

/// Like the language server protocol, the exit notification asks the server to exit its process.
/// The server should exit with success code 0 if the shutdown request has been received before;
/// otherwise with error code 1.
#[derive(Debug)]
pub enum OnBuildExit {}

impl Notification for OnBuildExit {
    type Params = ExitBuildParams;
    const METHOD: &'static str = "build/exit";
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExitBuildParams {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_build_method() {
        assert_eq!(OnBuildExit::METHOD, "build/exit");
    }
}
