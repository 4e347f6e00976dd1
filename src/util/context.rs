//! Global context for keel operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::core::workspace::WORKSPACE_FILE;
use crate::util::config::{self, Config};

/// Project directories for keel
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("dev", "keel", "keel"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global keel data
    home: PathBuf,

    /// Explicit artifact cache root (flag or environment)
    cache_override: Option<PathBuf>,

    /// Merged global and project configuration
    config: Config,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let home = match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.cache_dir().to_path_buf(),
            None => config::global_config_dir().unwrap_or_else(|| PathBuf::from(".keel")),
        };

        GlobalContext {
            cwd,
            home,
            cache_override: None,
            config: Config::default(),
            verbose: false,
        }
    }

    /// Load global and project configuration for a workspace rooted at `root`.
    pub fn load_config(&mut self, root: &Path) {
        let project = config::project_config_path(root);
        self.config = match config::global_config_path() {
            Some(global) => config::load_config(&global, &project),
            None => Config::load_or_default(&project),
        };
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Override the artifact cache root.
    pub fn set_cache_dir(&mut self, dir: Option<PathBuf>) {
        self.cache_override = dir;
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the keel home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Root of the content-addressed artifact cache.
    ///
    /// Precedence: explicit override, then `[cache] dir`, then the
    /// platform cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_override {
            return self.cwd.join(dir);
        }
        if let Some(dir) = &self.config.cache.dir {
            return self.cwd.join(dir);
        }
        self.home.join("artifacts")
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Find the workspace file starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Option<PathBuf> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(WORKSPACE_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }
}
