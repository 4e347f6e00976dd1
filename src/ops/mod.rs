//! High-level operations.
//!
//! This module contains the implementation of keel commands.

pub mod keel_build;
pub mod keel_cache;
pub mod keel_env;
pub mod keel_fetch;
pub mod keel_tree;
pub mod resolve;

pub use keel_build::{build, open_acquirer, BuildOptions, BuildResult};
pub use keel_cache::{cache_report, clean_cache, format_size, CacheReport};
pub use keel_env::environment;
pub use keel_fetch::{fetch, FetchedArtifact};
pub use keel_tree::render_tree;
pub use resolve::resolve_workspace;
