//! Test utilities and mocks for keel unit tests.
//!
//! Compiled only under `cfg(test)`. Provides a counting [`MockFetcher`] in
//! place of the network, tarball builders, and helpers that lay out recipe
//! workspaces on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use keel::test_support::{MockFetcher, fixtures::tar_gz};
//!
//! let archive = tar_gz(&[("gcc/bin/arm-none-eabi-gcc", b"gcc")]);
//! let fetcher = MockFetcher::new().serve("https://example.com/gcc.tar.gz", archive);
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use url::Url;

use crate::core::build_info::ExportedInfo;
use crate::core::recipe::{PackageType, Recipe};
use crate::core::workspace::WORKSPACE_FILE;
use crate::error::{Error, Result};
use crate::sources::fetch::Fetcher;

/// In-memory stand-in for [`crate::sources::HttpFetcher`].
///
/// Serves registered bodies by exact URL and counts every request, so
/// tests can assert how often the network would have been touched.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    failures: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        MockFetcher::default()
    }

    /// Serve `body` for `url`.
    pub fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), body.into());
        self
    }

    /// Sleep before answering, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the first `n` requests with a connection error.
    pub fn fail_first(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    /// Number of fetches performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every requested URL, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }

        let body = self.responses.get(url.as_str()).ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            message: "HTTP 404 Not Found".to_string(),
        })?;
        dest.write_all(body)
            .map_err(|e| Error::io(format!("failed to write body of {}", url), e))?;
        Ok(body.len() as u64)
    }
}

/// Create a temporary workspace containing only a `Keel.toml`.
///
/// Returns the TempDir handle; dropping it removes the directory.
pub fn create_test_workspace(manifest: &str) -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().expect("failed to create temp dir");
    std::fs::write(tmp.path().join(WORKSPACE_FILE), manifest).expect("failed to write manifest");
    tmp
}

/// Write `files` (relative path, content) below `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, content).expect("failed to write file");
    }
}

/// A header-only recipe exporting `include/<name>` with the given requirements.
pub fn header_recipe(name: &str, requires: &[&str]) -> Recipe {
    let mut builder = Recipe::builder(name, "1.0.0")
        .package_type(PackageType::HeaderOnly)
        .include_dir(format!("include/{}", name));
    for req in requires {
        builder = builder.requires(*req);
    }
    builder.build().expect("valid test recipe")
}

/// A header-only recipe with explicit exports.
pub fn recipe_with_exports(name: &str, requires: &[&str], exports: ExportedInfo) -> Recipe {
    let mut builder = Recipe::builder(name, "1.0.0").exports(exports);
    for req in requires {
        builder = builder.requires(*req);
    }
    builder.build().expect("valid test recipe")
}

/// Assertion helpers for testing.
pub mod assertions {
    use crate::error::Error;

    /// Assert that a result is Err and return the root error.
    pub fn assert_root_err<T: std::fmt::Debug>(result: Result<T, Error>) -> Error {
        match result {
            Ok(v) => panic!("expected Err, got Ok: {:?}", v),
            Err(e) => match e {
                Error::Build { source, .. } => *source,
                other => other,
            },
        }
    }

    /// Assert that an error message contains a substring.
    pub fn assert_error_contains<T: std::fmt::Debug>(result: Result<T, Error>, substring: &str) {
        match result {
            Ok(v) => panic!("expected Err containing '{}', got Ok: {:?}", substring, v),
            Err(e) => {
                let msg = e.to_string();
                assert!(
                    msg.contains(substring),
                    "error '{}' does not contain '{}'",
                    msg,
                    substring
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fetcher_counts_requests() {
        let fetcher = MockFetcher::new().serve("https://example.com/a.tar.gz", b"abc".to_vec());
        let url = Url::parse("https://example.com/a.tar.gz").unwrap();

        let mut out = Vec::new();
        assert_eq!(fetcher.fetch(&url, &mut out).unwrap(), 3);
        assert_eq!(out, b"abc");

        let missing = Url::parse("https://example.com/b.tar.gz").unwrap();
        assert!(fetcher.fetch(&missing, &mut Vec::new()).is_err());

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.requests()[1], "https://example.com/b.tar.gz");
    }

    #[test]
    fn test_header_recipe() {
        let recipe = header_recipe("hal", &["cmsis"]);
        assert_eq!(recipe.requirements()[0].name, "cmsis");
        assert_eq!(recipe.exports().include_dirs, vec!["include/hal"]);
    }
}
