//! Narrow interface to the toolchain discovery registry.
//!
//! The registry itself lives outside the integration layer; the manager only needs to resolve
//! a toolchain URI stated by the build server, or a per-language default.

use std::path::PathBuf;
use std::sync::Arc;

use bsp_types::{LanguageId, Uri};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// A stable identifier, e.g. the toolchain bundle identifier.
    pub identifier: String,
    /// The path containing the toolchain's `usr` directory.
    pub path: Option<PathBuf>,
}

pub trait ToolchainRegistry: Send + Sync {
    /// The registered toolchain rooted at the given URI, if any.
    fn toolchain_for_uri(&self, uri: &Uri) -> Option<Arc<Toolchain>>;

    /// The preferred toolchain to use when the build server did not state one.
    fn default_toolchain(&self, language: &LanguageId) -> Option<Arc<Toolchain>>;
}

/// A registry that knows no toolchains.
pub struct NoToolchains;

impl ToolchainRegistry for NoToolchains {
    fn toolchain_for_uri(&self, _uri: &Uri) -> Option<Arc<Toolchain>> {
        None
    }

    fn default_toolchain(&self, _language: &LanguageId) -> Option<Arc<Toolchain>> {
        None
    }
}
