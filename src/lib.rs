//! keel - a dependency-aware package orchestrator for embedded firmware
//!
//! This crate provides the core library functionality for keel: recipe
//! loading, artifact acquisition, dependency resolution, packaging and
//! build-environment composition.

pub mod builder;
pub mod core;
pub mod error;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for keel unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a counting mock fetcher, tarball builders and recipe fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{BuildInfo, Recipe, Workspace};
pub use error::{Error, Result};
pub use resolver::BuildPlan;
pub use sources::ArtifactAcquirer;
pub use util::context::GlobalContext;
