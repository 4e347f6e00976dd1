//! Build context - output layout and scheduling options.

use std::path::{Path, PathBuf};

use crate::core::recipe::Recipe;
use crate::core::Workspace;

const FINGERPRINT_DIR: &str = ".fingerprints";

/// Where packages go and how the build is scheduled.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Output root; every package lands in `<output_dir>/<name>/<version>`.
    output_dir: PathBuf,

    /// Worker threads, or rayon's default when unset.
    jobs: Option<usize>,

    /// Never touch the network.
    offline: bool,

    /// Suppress the progress bar in favour of per-node log lines.
    verbose: bool,
}

impl BuildContext {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        BuildContext {
            output_dir: output_dir.into(),
            jobs: None,
            offline: false,
            verbose: false,
        }
    }

    /// Create a build context for a workspace.
    pub fn for_workspace(ws: &Workspace) -> Self {
        Self::new(ws.output_dir())
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs.filter(|&j| j > 0);
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn jobs(&self) -> Option<usize> {
        self.jobs
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The package directory every exported relative path is rooted at.
    pub fn package_dir(&self, recipe: &Recipe) -> PathBuf {
        self.output_dir.join(recipe.name()).join(recipe.version())
    }

    /// Where packaging fingerprints are kept, outside any package directory.
    pub fn fingerprint_dir(&self) -> PathBuf {
        self.output_dir.join(FINGERPRINT_DIR)
    }
}
