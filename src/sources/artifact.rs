//! Checksum-verified acquisition of remote artifacts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::error::{Error, Result};
use crate::sources::archive::extract_archive;
use crate::sources::cache::{ArtifactCache, CacheKey, EntryMarker};
use crate::sources::fetch::Fetcher;
use crate::util::hash::{Checksum, HashingWriter};

/// Downloads, verifies and extracts artifacts into an [`ArtifactCache`].
#[derive(Clone)]
pub struct ArtifactAcquirer {
    cache: Arc<ArtifactCache>,
    fetcher: Arc<dyn Fetcher>,
    offline: bool,
}

impl ArtifactAcquirer {
    pub fn new(cache: Arc<ArtifactCache>, fetcher: Arc<dyn Fetcher>) -> Self {
        ArtifactAcquirer {
            cache,
            fetcher,
            offline: false,
        }
    }

    /// Never touch the network; a cache miss is an error.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Return the extracted tree for `(url, checksum)`, downloading it on a
    /// cache miss.
    ///
    /// Concurrent requests for the same key wait for the first one and
    /// receive its outcome, success or failure. A failure is not remembered
    /// once every waiter has seen it, so a later request tries again.
    pub fn acquire(&self, url: &Url, checksum: &Checksum, strip: usize) -> Result<PathBuf> {
        let key = CacheKey::new(checksum, strip);
        let slot = self.cache.slot(&key);
        let mut outcome = slot.enter();

        let previous = outcome.as_ref().map(|previous| match previous {
            Ok(path) => Ok(path.clone()),
            Err(e) => Err(e.replay(url.as_str())),
        });
        let result = match previous {
            Some(result) => result,
            None => {
                let result = self.acquire_uncached(url, checksum, &key);
                *outcome = Some(match &result {
                    Ok(path) => Ok(path.clone()),
                    Err(e) => Err(e.replay(url.as_str())),
                });
                result
            }
        };

        slot.leave(&mut *outcome);
        result
    }

    fn acquire_uncached(&self, url: &Url, checksum: &Checksum, key: &CacheKey) -> Result<PathBuf> {
        if let Some(tree) = self.cache.lookup(key) {
            tracing::debug!("cache hit for {} ({})", url, checksum);
            return Ok(tree);
        }

        if self.offline {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: "offline mode and the artifact is not cached".to_string(),
            });
        }

        tracing::info!("Downloading {}", url);
        let staging = self.cache.staging()?;
        let download = staging.path().join("download");

        let file = File::create(&download)
            .map_err(|e| Error::io(format!("failed to create {}", download.display()), e))?;
        let mut writer = HashingWriter::new(BufWriter::new(file), checksum.algorithm());
        self.fetcher.fetch(url, &mut writer)?;
        let (mut inner, digest, size) = writer.finish();
        inner
            .flush()
            .map_err(|e| Error::io(format!("failed to write {}", download.display()), e))?;
        drop(inner);

        if !checksum.matches(&digest) {
            return Err(Error::ChecksumMismatch {
                url: url.to_string(),
                expected: checksum.to_string(),
                actual: format!("{}:{}", checksum.algorithm(), digest),
            });
        }
        tracing::debug!("verified {} ({} bytes)", checksum, size);

        let tree = ArtifactCache::staging_tree(&staging);
        let files = extract_archive(&download, &tree, key.strip)?;
        std::fs::remove_file(&download)
            .map_err(|e| Error::io(format!("failed to remove {}", download.display()), e))?;

        let marker = EntryMarker {
            url: url.to_string(),
            algorithm: checksum.algorithm(),
            digest: checksum.digest().to_string(),
            strip_root: key.strip,
            download_size: size,
            files,
        };
        let path = self.cache.promote(staging, key, &marker)?;
        tracing::info!("Acquired {} ({} files)", url, files);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::tar_gz;
    use crate::test_support::MockFetcher;
    use crate::util::hash::HashAlgorithm;
    use std::sync::Barrier;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://downloads.example.com/arm-gnu-toolchain.tar.gz";

    fn toolchain_archive() -> Vec<u8> {
        tar_gz(&[
            ("arm-gnu-toolchain/bin/arm-none-eabi-gcc", b"gcc"),
            ("arm-gnu-toolchain/bin/arm-none-eabi-g++", b"g++"),
        ])
    }

    fn setup(fetcher: MockFetcher) -> (TempDir, Arc<MockFetcher>, ArtifactAcquirer) {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(fetcher);
        let cache = Arc::new(ArtifactCache::open(tmp.path().join("cache")));
        let acquirer = ArtifactAcquirer::new(cache, fetcher.clone());
        (tmp, fetcher, acquirer)
    }

    #[test]
    fn test_acquire_downloads_once() {
        let archive = toolchain_archive();
        let checksum = Checksum::of_bytes(HashAlgorithm::Sha256, &archive);
        let (_tmp, fetcher, acquirer) = setup(MockFetcher::new().serve(URL, archive));
        let url = Url::parse(URL).unwrap();

        let first = acquirer.acquire(&url, &checksum, 1).unwrap();
        let second = acquirer.acquire(&url, &checksum, 1).unwrap();

        assert_eq!(first, second);
        assert!(first.join("bin/arm-none-eabi-gcc").is_file());
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_cache_survives_a_new_session() {
        let archive = toolchain_archive();
        let checksum = Checksum::of_bytes(HashAlgorithm::Sha256, &archive);
        let (tmp, fetcher, acquirer) = setup(MockFetcher::new().serve(URL, archive));
        let url = Url::parse(URL).unwrap();
        acquirer.acquire(&url, &checksum, 1).unwrap();

        let fresh = ArtifactAcquirer::new(
            Arc::new(ArtifactCache::open(tmp.path().join("cache"))),
            fetcher.clone(),
        )
        .offline(true);
        fresh.acquire(&url, &checksum, 1).unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_checksum_mismatch_leaves_no_entry() {
        let archive = toolchain_archive();
        let wrong = Checksum::of_bytes(HashAlgorithm::Sha256, b"something else");
        let (_tmp, _fetcher, acquirer) = setup(MockFetcher::new().serve(URL, archive));
        let url = Url::parse(URL).unwrap();

        let err = acquirer.acquire(&url, &wrong, 1).unwrap_err();
        match err {
            Error::ChecksumMismatch { expected, actual, .. } => {
                assert_eq!(expected, wrong.to_string());
                assert_ne!(expected, actual);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!acquirer.cache().contains(&CacheKey::new(&wrong, 1)));
        assert!(acquirer.cache().list().unwrap().is_empty());
    }

    #[test]
    fn test_offline_miss_fails() {
        let archive = toolchain_archive();
        let checksum = Checksum::of_bytes(HashAlgorithm::Sha256, &archive);
        let (_tmp, fetcher, acquirer) = setup(MockFetcher::new().serve(URL, archive));
        let acquirer = acquirer.offline(true);

        let err = acquirer
            .acquire(&Url::parse(URL).unwrap(), &checksum, 1)
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_concurrent_requests_share_one_download() {
        let archive = toolchain_archive();
        let checksum = Checksum::of_bytes(HashAlgorithm::Sha256, &archive);
        let fetcher = MockFetcher::new()
            .serve(URL, archive)
            .with_delay(Duration::from_millis(50));
        let (_tmp, fetcher, acquirer) = setup(fetcher);
        let url = Url::parse(URL).unwrap();

        let paths: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| acquirer.acquire(&url, &checksum, 1).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_waiter_receives_first_failure() {
        let archive = toolchain_archive();
        let wrong = Checksum::of_bytes(HashAlgorithm::Sha512, b"nope");
        let fetcher = MockFetcher::new()
            .serve(URL, archive)
            .with_delay(Duration::from_millis(200));
        let (_tmp, fetcher, acquirer) = setup(fetcher);
        let url = Url::parse(URL).unwrap();
        let barrier = Barrier::new(4);

        let results: Vec<Result<PathBuf>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        acquirer.acquire(&url, &wrong, 0)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results
            .iter()
            .all(|r| matches!(r, Err(Error::ChecksumMismatch { .. }))));
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_failed_acquisition_can_be_retried() {
        let archive = toolchain_archive();
        let checksum = Checksum::of_bytes(HashAlgorithm::Sha256, &archive);
        let (_tmp, fetcher, acquirer) = setup(MockFetcher::new().serve(URL, archive).fail_first(1));
        let url = Url::parse(URL).unwrap();

        let first = acquirer.acquire(&url, &checksum, 1).unwrap_err();
        assert!(matches!(first, Error::Fetch { .. }));

        let path = acquirer.acquire(&url, &checksum, 1).unwrap();
        assert!(path.join("bin/arm-none-eabi-gcc").is_file());
        assert_eq!(fetcher.calls(), 2);
        assert!(acquirer.cache().contains(&CacheKey::new(&checksum, 1)));
    }
}
