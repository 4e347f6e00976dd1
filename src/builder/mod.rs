//! Packaging and build-environment composition.
//!
//! This module turns a resolved plan into package directories and a merged
//! build environment for the firmware build.

pub mod compose;
pub mod context;
pub mod emit;
pub mod executor;
pub mod fingerprint;
pub mod package;

pub use compose::{compose, ComposedEnvironment, WORKSPACE_CONSUMER};
pub use context::BuildContext;
pub use emit::EmitFormat;
pub use executor::{BuildExecutor, PackagedRecipe};
pub use fingerprint::{FingerprintStore, PackageFingerprint};
pub use package::{collect, package, OutputTree, Packager};
