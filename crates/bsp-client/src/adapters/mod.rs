//! Uniform dispatch over the possible build-server backends.
//!
//! [`BuildSystemAdapter`] is a tagged union rather than a trait object so that the typed
//! request/response relation (`R::Params → R::Result`) survives dispatch. The three variants
//! are an in-process built-in build system, an external subprocess speaking BSP over stdio,
//! and an injected channel pair used by tests and embedders.

use anyhow::Result;

use bsp_types::notifications::Notification;
use bsp_types::requests::Request;

pub use built_in::BuiltInBuildServerAdapter;
pub use external::ExternalBuildSystemAdapter;
pub use injected::{InjectedBuildServerAdapter, InjectedConnection};
pub use rpc::PendingResponse;

pub mod bsp_config;
pub mod built_in;
pub mod external;
pub mod injected;
pub mod rpc;

/// Receives messages the build server pushes toward the client. Implemented by the manager and
/// held weakly by every adapter, so dropping the manager tears the cycle.
pub trait InboundMessageHandler: Send + Sync {
    fn handle_notification(&self, notification: bsp_server::Notification);
}

pub enum BuildSystemAdapter {
    BuiltIn(BuiltInBuildServerAdapter),
    External(ExternalBuildSystemAdapter),
    Injected(InjectedBuildServerAdapter),
}

impl BuildSystemAdapter {
    /// Issue a request and return a handle for awaiting the response.
    pub fn send_request<R: Request>(&self, params: R::Params) -> Result<PendingRequest<R>> {
        match self {
            BuildSystemAdapter::BuiltIn(adapter) => {
                Ok(PendingRequest::Ready(Some(adapter.request::<R>(params))))
            }
            BuildSystemAdapter::External(adapter) => {
                Ok(PendingRequest::Rpc(adapter.send_request::<R>(params)?))
            }
            BuildSystemAdapter::Injected(adapter) => {
                Ok(PendingRequest::Rpc(adapter.send_request::<R>(params)?))
            }
        }
    }

    /// Issue a request and block until the response arrives.
    pub fn request<R: Request>(&self, params: R::Params) -> Result<R::Result> {
        self.send_request::<R>(params)?.wait()
    }

    pub fn notify<N: Notification>(&self, params: N::Params) -> Result<()> {
        match self {
            BuildSystemAdapter::BuiltIn(adapter) => adapter.notify::<N>(params),
            BuildSystemAdapter::External(adapter) => adapter.notify::<N>(params),
            BuildSystemAdapter::Injected(adapter) => adapter.notify::<N>(params),
        }
    }

    /// Tear down the backend. Blocks for at most the configured shutdown budget.
    pub fn shutdown(&self) {
        use bsp_types::notifications::OnBuildExit;
        use bsp_types::requests::BuildShutdown;

        match self {
            BuildSystemAdapter::BuiltIn(_) => {}
            BuildSystemAdapter::External(adapter) => adapter.shutdown(),
            BuildSystemAdapter::Injected(adapter) => {
                // Fire-and-forget: the far side owns its own lifetime.
                let _ = adapter.send_request::<BuildShutdown>(());
                let _ = adapter.notify::<OnBuildExit>(Default::default());
            }
        }
    }
}

/// A request in flight through any of the adapter variants.
pub enum PendingRequest<R: Request> {
    /// Built-in systems answer synchronously.
    Ready(Option<Result<R::Result>>),
    Rpc(PendingResponse<R>),
}

impl<R: Request> PendingRequest<R> {
    pub fn wait(self) -> Result<R::Result> {
        match self {
            PendingRequest::Ready(result) => {
                result.expect("built-in request result already taken")
            }
            PendingRequest::Rpc(pending) => pending.wait(),
        }
    }

    /// Ask the backend to abandon the request; a no-op for synchronous backends.
    pub fn cancel(&self) {
        if let PendingRequest::Rpc(pending) = self {
            pending.cancel();
        }
    }
}
