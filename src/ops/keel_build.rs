//! Implementation of `keel build`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::builder::{compose, BuildContext, BuildExecutor, ComposedEnvironment, PackagedRecipe};
use crate::core::build_info::BuildInfo;
use crate::core::Workspace;
use crate::error::{Error, Result};
use crate::ops::resolve::resolve_workspace;
use crate::resolver::BuildPlan;
use crate::sources::{ArtifactAcquirer, ArtifactCache, HttpFetcher};
use crate::util::fs::write_string;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Number of parallel jobs (None = rayon's default)
    pub jobs: Option<usize>,

    /// Never touch the network
    pub offline: bool,

    /// Verbose output (disables the progress bar)
    pub verbose: bool,
}

/// Everything a build produced.
#[derive(Debug)]
pub struct BuildResult {
    pub plan: BuildPlan,
    pub packaged: Vec<PackagedRecipe>,
    pub environment: ComposedEnvironment,
    pub plan_path: PathBuf,
    pub build_info_path: PathBuf,
}

impl BuildResult {
    /// Number of recipes that were actually repackaged.
    pub fn rebuilt(&self) -> usize {
        self.packaged.iter().filter(|p| !p.fresh).count()
    }
}

/// The final build-info as written to `keel-buildinfo.json`.
#[derive(Debug, Serialize)]
struct BuildInfoReport<'a> {
    consumer: &'a str,
    #[serde(flatten)]
    info: &'a BuildInfo,
}

/// Open an acquirer over the cache at `cache_dir`, downloading over HTTP.
pub fn open_acquirer(cache_dir: &Path, timeout: Duration, offline: bool) -> Result<ArtifactAcquirer> {
    let cache = Arc::new(ArtifactCache::open(cache_dir));
    let fetcher = Arc::new(HttpFetcher::new(timeout)?);
    Ok(ArtifactAcquirer::new(cache, fetcher).offline(offline))
}

/// Resolve, package and compose the workspace, then write the reports.
pub fn build(ws: &Workspace, acquirer: &ArtifactAcquirer, opts: &BuildOptions) -> Result<BuildResult> {
    let plan = resolve_workspace(ws)?;
    let ctx = BuildContext::for_workspace(ws)
        .with_jobs(opts.jobs)
        .with_offline(opts.offline)
        .with_verbose(opts.verbose);

    tracing::info!(
        "building {} recipe(s) into {}",
        plan.len(),
        ctx.output_dir().display()
    );

    let packaged = BuildExecutor::new(&ctx).execute(&plan, acquirer)?;
    let environment = compose(&plan, &ctx, ws.consumer())?;

    let plan_path = ws.plan_path();
    write_json(&plan_path, &plan.report(&ctx))?;

    let build_info_path = ws.build_info_path();
    let report = BuildInfoReport {
        consumer: environment.root_name(),
        info: environment.root(),
    };
    write_json(&build_info_path, &report)?;

    Ok(BuildResult {
        plan,
        packaged,
        environment,
        plan_path,
        build_info_path,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| {
        Error::io(
            format!("failed to serialize {}", path.display()),
            std::io::Error::other(e),
        )
    })?;
    write_string(path, &content)
}
