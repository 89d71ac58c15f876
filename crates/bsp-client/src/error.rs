//! Error taxonomy of the integration layer.
//!
//! Retryable failures (a crashed subprocess, a transient RPC error) are handled inside the
//! adapter; permanent failures (missing configuration, missing interpreter) bubble up and cause
//! the adapter to be absent, at which point the manager serves fallback settings.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// No `.bsp/*.json`, `buildServer.json` or compilation database was found.
    #[error("no build server configuration found under {0}")]
    ConfigurationMissing(PathBuf),

    /// The server's argv requires an interpreter that is not installed.
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    /// The build server subprocess exited; in-flight requests fail with this error.
    #[error("internal error: build server has crashed")]
    ServerCrashed,

    /// The server (or a built-in build system) does not implement the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The peer answered with a JSON-RPC error or a payload that does not deserialize.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The adapter was asked to send a non-initialize message before `build/initialize`.
    #[error("build server has not been initialized")]
    NotInitialized,
}
