//! Bridges BSP RPCs onto an in-process [`BuiltInBuildSystem`].
//!
//! The manager talks to built-in build systems through the same typed `request`/`notify`
//! surface as to external servers; this adapter performs the translation and synthesizes the
//! initialize response from the system's declared capabilities.

use std::sync::{Arc, Weak};

use anyhow::Result;
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use bsp_types::notifications::{
    BuildTargetEvent, DidChangeBuildTargetParams, Notification, OnBuildExit, OnBuildInitialized,
    OnBuildTargetDidChange, OnWatchedFilesDidChange,
};
use bsp_types::requests::{
    BuildInitialize, BuildShutdown, BuildTargetPrepare, BuildTargetSources,
    InitializeBuildResult, InitializeBuildResultData, Request, TextDocumentSourceKitOptions,
    WorkspaceBuildTargets, WorkspaceWaitForBuildSystemUpdates,
};
use bsp_types::requests::BuildServerCapabilities;

use crate::adapters::InboundMessageHandler;
use crate::build_systems::{BuildSystemEventSink, BuiltInBuildSystem};
use crate::error::AdapterError;

pub struct BuiltInBuildServerAdapter {
    system: Arc<dyn BuiltInBuildSystem>,
}

/// Forwards spontaneous change events from the build system to the manager as
/// `buildTarget/didChange` notifications.
struct BuiltInEventSink {
    handler: Weak<dyn InboundMessageHandler>,
}

impl BuildSystemEventSink for BuiltInEventSink {
    fn build_targets_changed(&self, changes: Option<Vec<BuildTargetEvent>>) {
        let Some(handler) = self.handler.upgrade() else {
            return;
        };
        let notification = bsp_server::Notification::new(
            OnBuildTargetDidChange::METHOD.to_string(),
            DidChangeBuildTargetParams { changes },
        );
        handler.handle_notification(notification);
    }
}

impl BuiltInBuildServerAdapter {
    pub fn new(
        system: Arc<dyn BuiltInBuildSystem>,
        handler: Weak<dyn InboundMessageHandler>,
    ) -> BuiltInBuildServerAdapter {
        system.connect(Arc::new(BuiltInEventSink { handler }));
        BuiltInBuildServerAdapter { system }
    }

    pub fn request<R: Request>(&self, params: R::Params) -> Result<R::Result> {
        let result = self.dispatch(R::METHOD, serde_json::to_value(params)?)?;
        Ok(serde_json::from_value(result).map_err(|err| {
            AdapterError::Protocol(format!("malformed built-in {} response: {err}", R::METHOD))
        })?)
    }

    pub fn notify<N: Notification>(&self, params: N::Params) -> Result<()> {
        if N::METHOD == OnWatchedFilesDidChange::METHOD {
            let params = serde_json::from_value(serde_json::to_value(params)?)?;
            self.system.did_change_watched_files(params);
        } else if N::METHOD != OnBuildInitialized::METHOD && N::METHOD != OnBuildExit::METHOD {
            warn!(
                "dropping unknown notification to built-in build system: {}",
                N::METHOD
            );
        }
        Ok(())
    }

    fn dispatch(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        if method == BuildInitialize::METHOD {
            // The params only matter to out-of-process servers.
            to_value(self.initialize_result())
        } else if method == BuildShutdown::METHOD
            || method == WorkspaceWaitForBuildSystemUpdates::METHOD
        {
            to_value(())
        } else if method == WorkspaceBuildTargets::METHOD {
            to_value(self.system.build_targets()?)
        } else if method == BuildTargetSources::METHOD {
            to_value(self.system.target_sources(from_value(method, params)?)?)
        } else if method == TextDocumentSourceKitOptions::METHOD {
            to_value(self.system.source_kit_options(from_value(method, params)?)?)
        } else if method == BuildTargetPrepare::METHOD {
            self.system.prepare(from_value(method, params)?)?;
            to_value(())
        } else {
            error!("method not implemented by built-in build system: {method}");
            Err(AdapterError::MethodNotFound(method.to_string()).into())
        }
    }

    fn initialize_result(&self) -> InitializeBuildResult {
        InitializeBuildResult {
            display_name: "built-in build system".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bsp_version: bsp_types::PROTOCOL_VERSION.to_string(),
            capabilities: BuildServerCapabilities {
                build_target_changed_provider: Some(true),
            },
            data: Some(InitializeBuildResultData::SourceKit(
                self.system.initialize_data(),
            )),
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

fn from_value<T: DeserializeOwned>(method: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| AdapterError::Protocol(format!("malformed {method} params: {err}")).into())
}
