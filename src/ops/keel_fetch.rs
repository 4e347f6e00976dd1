//! Implementation of `keel fetch`.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::builder::WORKSPACE_CONSUMER;
use crate::core::recipe::Recipe;
use crate::core::Workspace;
use crate::error::{Error, Result};
use crate::sources::ArtifactAcquirer;

/// A remote artifact now present in the cache.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub recipe: String,
    pub url: String,
    pub path: PathBuf,
}

/// Acquire the remote artifacts of `names`, or of every recipe that has one.
///
/// Recipes without a remote artifact are skipped silently unless named.
pub fn fetch(ws: &Workspace, acquirer: &ArtifactAcquirer, names: &[String]) -> Result<Vec<FetchedArtifact>> {
    let recipes = ws.load_recipes()?;
    let selected = select(&recipes, names)?;

    selected
        .par_iter()
        .map(|recipe| {
            let Some(remote) = recipe.remote() else {
                return Ok(None);
            };
            let path = acquirer
                .acquire(&remote.url, &remote.checksum, remote.strip_root)
                .map_err(|e| Error::Build {
                    recipe: recipe.name().to_string(),
                    source: Box::new(e),
                })?;
            Ok(Some(FetchedArtifact {
                recipe: recipe.name().to_string(),
                url: remote.url.to_string(),
                path,
            }))
        })
        .collect::<Result<Vec<_>>>()
        .map(|fetched| fetched.into_iter().flatten().collect())
}

fn select<'a>(recipes: &'a [Recipe], names: &[String]) -> Result<Vec<&'a Recipe>> {
    if names.is_empty() {
        return Ok(recipes.iter().filter(|r| r.remote().is_some()).collect());
    }

    names
        .iter()
        .map(|name| {
            let recipe = recipes
                .iter()
                .find(|r| r.name() == name)
                .ok_or_else(|| Error::UnresolvedDependency {
                    recipe: WORKSPACE_CONSUMER.to_string(),
                    dependency: name.clone(),
                    constraint: "*".to_string(),
                    reason: "no recipe with that name was loaded".to_string(),
                })?;
            if recipe.remote().is_none() {
                tracing::warn!("`{}` has no remote artifact, nothing to fetch", name);
            }
            Ok(recipe)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WORKSPACE_FILE;
    use crate::sources::ArtifactCache;
    use crate::test_support::create_test_workspace;
    use crate::test_support::fixtures::{manifests, tar_gz, RecipeFixture};
    use crate::test_support::assertions::{assert_error_contains, assert_root_err};
    use crate::test_support::MockFetcher;
    use crate::util::hash::{Checksum, HashAlgorithm};
    use std::sync::Arc;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/gcc.tar.gz";

    fn setup() -> (TempDir, Arc<MockFetcher>) {
        let entries: &[(&str, &[u8])] = &[("gcc/bin/arm-none-eabi-gcc", b"elf")];
        let archive = tar_gz(entries);
        let checksum = Checksum::of_bytes(HashAlgorithm::Sha256, &archive).to_string();

        let tmp = create_test_workspace(&manifests::workspace(&["cmsis", "gcc"]));
        RecipeFixture::headers("cmsis", &[]).write_to(tmp.path()).unwrap();
        RecipeFixture::new("gcc", manifests::toolchain("gcc", URL, &checksum))
            .write_to(tmp.path())
            .unwrap();
        (tmp, Arc::new(MockFetcher::new().serve(URL, archive)))
    }

    #[test]
    fn test_fetch_all_remote_artifacts() {
        let (tmp, fetcher) = setup();
        let cache = TempDir::new().unwrap();
        let acquirer = ArtifactAcquirer::new(Arc::new(ArtifactCache::open(cache.path())), fetcher.clone());
        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();

        let fetched = fetch(&ws, &acquirer, &[]).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].recipe, "gcc");
        assert!(fetched[0].path.join("bin/arm-none-eabi-gcc").is_file());

        fetch(&ws, &acquirer, &["gcc".to_string()]).unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_fetch_unknown_name() {
        let (tmp, fetcher) = setup();
        let cache = TempDir::new().unwrap();
        let acquirer = ArtifactAcquirer::new(Arc::new(ArtifactCache::open(cache.path())), fetcher.clone());
        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();

        let err = fetch(&ws, &acquirer, &["clang".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency { dependency, .. } if dependency == "clang"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_fetch_wraps_checksum_mismatch() {
        let (tmp, _) = setup();
        let cache = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new().serve(URL, b"not the archive".to_vec()));
        let acquirer = ArtifactAcquirer::new(Arc::new(ArtifactCache::open(cache.path())), fetcher);
        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();

        let result = fetch(&ws, &acquirer, &["gcc".to_string()]);
        assert_error_contains(fetch(&ws, &acquirer, &["gcc".to_string()]), "failed to build `gcc`");
        assert!(matches!(assert_root_err(result), Error::ChecksumMismatch { .. }));
    }
}
