//! Pull adapter for push-based build servers.
//!
//! Servers that predate `textDocument/sourceKitOptions` publish settings through
//! `build/sourceKitOptionsChanged` notifications after the client registers interest in a
//! document. This bridge exposes the pull API over that protocol: the first options query for a
//! document registers it, later queries are served from the cache that the push notifications
//! maintain.

use std::sync::Mutex;

use anyhow::Result;
use log::warn;
use rustc_hash::FxHashMap;

use bsp_types::notifications::{SourceKitOptions, SourceKitOptionsChangedParams};
use bsp_types::requests::{
    RegisterAction, RegisterForChangesParams, TextDocumentRegisterForChanges,
    TextDocumentSourceKitOptionsResult,
};
use bsp_types::Uri;

use crate::adapters::BuildSystemAdapter;

#[derive(Default)]
pub struct LegacyOptionsBridge {
    /// `None` records a failed registration so it is not retried on every query.
    cache: Mutex<FxHashMap<Uri, Option<SourceKitOptions>>>,
}

impl LegacyOptionsBridge {
    pub fn new() -> LegacyOptionsBridge {
        LegacyOptionsBridge::default()
    }

    /// Pull the options for `uri`, registering for pushes on first use.
    pub fn source_kit_options(
        &self,
        adapter: &BuildSystemAdapter,
        uri: &Uri,
    ) -> Result<Option<TextDocumentSourceKitOptionsResult>> {
        if let Some(cached) = self.cache.lock().unwrap().get(uri) {
            return Ok(cached.clone().map(into_result));
        }

        let registration = adapter.request::<TextDocumentRegisterForChanges>(
            RegisterForChangesParams {
                uri: uri.clone(),
                action: RegisterAction::Register,
            },
        );
        if let Err(err) = registration {
            warn!("legacy registration for {uri} failed: {err:#}");
            self.cache.lock().unwrap().insert(uri.clone(), None);
            return Ok(None);
        }

        // The server answers with a push notification; whatever has arrived by now is the
        // best answer, the manager falls back otherwise and refreshes on the next push.
        Ok(self
            .cache
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .flatten()
            .map(into_result))
    }

    /// Record a pushed update. Returns `true` when the cached value changed, in which case the
    /// caller must invalidate as if the server sent a wholesale target change.
    pub fn options_changed(&self, params: SourceKitOptionsChangedParams) -> bool {
        let mut cache = self.cache.lock().unwrap();
        let updated = Some(params.updated_options);
        let previous = cache.insert(params.uri, updated.clone());
        previous.flatten() != updated
    }
}

fn into_result(options: SourceKitOptions) -> TextDocumentSourceKitOptionsResult {
    TextDocumentSourceKitOptionsResult {
        compiler_arguments: options.options,
        working_directory: options.working_directory,
        data: None,
    }
}
