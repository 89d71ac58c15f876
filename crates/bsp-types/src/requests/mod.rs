use serde::de::DeserializeOwned;
use serde::Serialize;

pub use build_target_sources::*;
pub use initialize::*;
pub use prepare::*;
pub use register_for_changes::*;
pub use shutdown_build::*;
pub use source_kit_options::*;
pub use wait_for_build_system_updates::*;
pub use workspace_build_targets::*;

mod build_target_sources;
mod initialize;
mod prepare;
mod register_for_changes;
mod shutdown_build;
mod source_kit_options;
mod wait_for_build_system_updates;
mod workspace_build_targets;

pub trait Request {
    type Params: DeserializeOwned + Serialize + Send;
    type Result: DeserializeOwned + Serialize + Send;
    const METHOD: &'static str;
}
