use serde::{Deserialize, Serialize};

use crate::notifications::Notification;

/// Like the language server protocol, the initialized notification is sent from the client to
/// the server after the client received the result of the initialize request but before the
/// client is sending any other request or notification to the server.
#[derive(Debug)]
pub enum OnBuildInitialized {}

impl Notification for OnBuildInitialized {
    type Params = InitializedBuildParams;
    const METHOD: &'static str = "build/initialized";
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct InitializedBuildParams {}
