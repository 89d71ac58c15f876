//! In-process build systems.
//!
//! A [`BuiltInBuildSystem`] answers the same questions as an external build server but lives in
//! the language-server process. The
//! [`BuiltInBuildServerAdapter`](crate::adapters::built_in::BuiltInBuildServerAdapter)
//! translates BSP RPCs into calls on this trait so the manager never distinguishes the two.

use anyhow::Result;

use bsp_types::notifications::{BuildTargetEvent, DidChangeWatchedFilesParams};
use bsp_types::requests::{
    PrepareParams, SourceKitInitializeBuildResponseData, SourcesParams, SourcesResult,
    TextDocumentSourceKitOptionsParams, TextDocumentSourceKitOptionsResult,
    WorkspaceBuildTargetsResult,
};

pub use compilation_database::{
    CompilationDatabaseBuildSystem, CompilationDatabaseEntry, JsonCompilationDatabase,
    COMPILE_COMMANDS_FILE,
};
pub use compile_flags::{CompileFlagsBuildSystem, COMPILE_FLAGS_FILE};

pub mod compilation_database;
pub mod compile_flags;

/// Back-channel through which a built-in build system reports spontaneous changes (e.g. its
/// configuration file was rewritten). Connected by the adapter once the manager is listening.
pub trait BuildSystemEventSink: Send + Sync {
    fn build_targets_changed(&self, changes: Option<Vec<BuildTargetEvent>>);
}

pub trait BuiltInBuildSystem: Send + Sync {
    /// Capability flags, index paths and watcher globs reported in the synthesized initialize
    /// response.
    fn initialize_data(&self) -> SourceKitInitializeBuildResponseData;

    /// Attach the back-channel for spontaneous change events.
    fn connect(&self, sink: std::sync::Arc<dyn BuildSystemEventSink>) {
        let _ = sink;
    }

    fn build_targets(&self) -> Result<WorkspaceBuildTargetsResult>;

    fn target_sources(&self, params: SourcesParams) -> Result<SourcesResult>;

    fn source_kit_options(
        &self,
        params: TextDocumentSourceKitOptionsParams,
    ) -> Result<Option<TextDocumentSourceKitOptionsResult>>;

    /// Built-in systems have nothing to build; preparation is a no-op unless the system says
    /// otherwise in its initialize data.
    fn prepare(&self, params: PrepareParams) -> Result<()> {
        let _ = params;
        Ok(())
    }

    fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams);
}
