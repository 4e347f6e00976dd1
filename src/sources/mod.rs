//! Package sources.
//!
//! Sources produce the trees the packaging engine copies from: a recipe's
//! own directory, or a remote artifact fetched, verified and extracted into
//! the content-addressed cache.

pub mod archive;
pub mod artifact;
pub mod cache;
pub mod fetch;
pub mod tree;

pub use archive::extract_archive;
pub use artifact::ArtifactAcquirer;
pub use cache::{ArtifactCache, CacheEntry, CacheKey};
pub use fetch::{Fetcher, HttpFetcher};
pub use tree::{FsTree, SourceTree, VirtualTree};
