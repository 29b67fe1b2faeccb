//! Known firmware versions, their build options, and the source mirror
//!
//! The [`OptionsCache`] is written only by the refresher and read by the
//! HTTP handlers and build pipeline. The [`SourceMirror`] is the local
//! clone both of them work from.

mod cache;
pub mod manifest;
mod mirror;

pub use cache::OptionsCache;
pub use manifest::{parse_descriptors, parse_version_tag, OptionDescriptor, OptionsManifest};
pub use mirror::{MirrorReadGuard, MirrorWriteGuard, SourceMirror};
