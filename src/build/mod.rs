//! Build request pipeline
//!
//! One [`BuildPipeline`] serves every request. Each request gets its own
//! [`BuildWorkspace`], so concurrent builds never share a source tree.

mod pipeline;
mod request;
mod workspace;

pub use pipeline::{BuildOutcome, BuildPipeline};
pub use request::{BuildRequest, OptionValue, BOARD_FIELD, VERSION_FIELD};
pub use workspace::{sanitize_caller, BuildWorkspace, SettingsRecord};
