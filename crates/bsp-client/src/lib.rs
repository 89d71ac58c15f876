//! Build-system integration layer of the language server.
//!
//! The [`BuildSystemManager`](manager::BuildSystemManager) mediates between the editor-facing
//! LSP server and one or more build servers speaking BSP. Build servers either run
//! out-of-process (spawned from a `.bsp/*.json` description) or in-process as
//! [`BuiltInBuildSystem`](build_systems::BuiltInBuildSystem) implementations; both are reached
//! through the same [`BuildSystemAdapter`](adapters::BuildSystemAdapter) dispatch.

pub use bsp_server;
pub use bsp_types;

pub mod adapters;
pub mod arguments;
pub mod build_systems;
pub mod config;
pub mod debounce;
pub mod delegate;
pub mod error;
pub mod fallback;
pub mod legacy;
pub mod main_files;
pub mod manager;
pub mod message_queue;
pub mod request_cache;
pub mod settings;
pub mod toolchain;
pub mod utils;

pub use adapters::{BuildSystemAdapter, InjectedConnection};
pub use config::BuildSystemManagerConfig;
pub use delegate::BuildSystemManagerDelegate;
pub use error::AdapterError;
pub use manager::BuildSystemManager;
pub use settings::FileBuildSettings;
