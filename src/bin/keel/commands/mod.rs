//! Command implementations

pub mod build;
pub mod cache;
pub mod completions;
pub mod env;
pub mod fetch;
pub mod plan;
pub mod tree;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::Cli;
use keel::core::Workspace;
use keel::ops::open_acquirer;
use keel::sources::ArtifactAcquirer;
use keel::util::GlobalContext;

/// State shared by every command: the global context plus global flags.
pub struct Global {
    pub ctx: GlobalContext,
    manifest_path: Option<PathBuf>,
}

impl Global {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut ctx = GlobalContext::new()?;
        ctx.set_verbose(cli.verbose);
        ctx.set_cache_dir(cli.cache_dir.clone());
        Ok(Global {
            ctx,
            manifest_path: cli.manifest_path.clone(),
        })
    }

    /// Locate and load the workspace, then apply its configuration.
    pub fn workspace(&mut self) -> Result<Workspace> {
        let manifest_path = match &self.manifest_path {
            Some(path) => self.ctx.cwd().join(path),
            None => self.ctx.find_manifest().ok_or_else(|| {
                anyhow::anyhow!(
                    "could not find {} in {} or any parent directory",
                    keel::core::WORKSPACE_FILE,
                    self.ctx.cwd().display()
                )
            })?,
        };

        let ws = Workspace::load(&manifest_path)?;
        self.ctx.load_config(ws.root());
        tracing::debug!("using workspace {}", manifest_path.display());

        Ok(match &self.ctx.config().build.output_dir {
            Some(dir) => ws.with_output_dir(dir),
            None => ws,
        })
    }

    /// Open the artifact cache. Offline when the flag or config says so.
    pub fn acquirer(&self, offline: bool) -> Result<ArtifactAcquirer> {
        let config = self.ctx.config();
        let cache_dir = self.ctx.cache_dir();
        open_acquirer(
            &cache_dir,
            Duration::from_secs(config.timeout_secs()),
            offline || config.net.offline,
        )
        .with_context(|| format!("failed to open artifact cache at {}", cache_dir.display()))
    }
}
