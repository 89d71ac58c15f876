//! Tunables of the integration layer.
//!
//! The debounce windows and the crash damping parameters were picked empirically; they are
//! configuration rather than constants so that embedders can adjust them.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BuildSystemManagerConfig {
    /// How long to accumulate "dependencies of these files changed" events before notifying
    /// the delegate.
    pub dependencies_updated_debounce: Duration,

    /// How long to accumulate "build settings of these files changed" events before notifying
    /// the delegate.
    pub settings_changed_debounce: Duration,

    /// How long a `build_settings` call with `fallback_after_timeout` waits for the build
    /// server before synthesizing fallback settings.
    pub fallback_timeout: Duration,

    /// If the build server crashes twice within this window, the restart is delayed by
    /// `crash_extra_delay` on top of the immediate respawn.
    pub crash_damping_window: Duration,

    /// Extra delay applied to a restart that follows a recent crash.
    pub crash_extra_delay: Duration,

    /// Overall budget for the `build/shutdown` + `build/exit` sequence before the subprocess
    /// is terminated.
    pub shutdown_timeout: Duration,

    /// Whether the editor runs background indexing. Without it, a changed `.swiftmodule` is
    /// treated as if every file's dependencies changed, a documented over-approximation that
    /// keeps semantic functionality fresh.
    pub background_indexing: bool,
}

impl Default for BuildSystemManagerConfig {
    fn default() -> Self {
        BuildSystemManagerConfig {
            dependencies_updated_debounce: Duration::from_millis(500),
            settings_changed_debounce: Duration::from_millis(20),
            fallback_timeout: Duration::from_secs(3),
            crash_damping_window: Duration::from_secs(30),
            crash_extra_delay: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(2),
            background_indexing: false,
        }
    }
}
