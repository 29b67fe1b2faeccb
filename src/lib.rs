//! BrewBot - BrewTroller firmware build server
//!
//! Mirrors the firmware repository, publishes the build options of every
//! release tag, and compiles custom firmware images on request.

pub mod build;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod process;
pub mod refresher;
pub mod server;

pub use error::{BuildBotError, BuildBotResult};
