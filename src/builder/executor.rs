//! Build executor with progress reporting.
//!
//! Nodes run on a dedicated rayon pool. Each node holds a count of
//! unfinished dependencies; the worker that finishes a node releases every
//! dependent whose count drops to zero. The first failure raises an abort
//! flag so nothing new starts, while nodes already running may finish.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::context::BuildContext;
use crate::builder::fingerprint::{FingerprintStore, PackageFingerprint};
use crate::builder::package::{collect, Packager};
use crate::core::recipe::Recipe;
use crate::error::{Error, Result};
use crate::resolver::{BuildPlan, PlanStep};
use crate::sources::artifact::ArtifactAcquirer;
use crate::sources::tree::FsTree;

/// Outcome of packaging one recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedRecipe {
    pub name: String,
    pub package_dir: PathBuf,
    pub files: usize,
    /// The package directory was already up to date.
    pub fresh: bool,
}

/// Build executor with progress tracking.
pub struct BuildExecutor<'a> {
    ctx: &'a BuildContext,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        BuildExecutor { ctx }
    }

    /// Acquire and package every recipe of the plan. Results are in plan order.
    pub fn execute(
        &self,
        plan: &BuildPlan,
        acquirer: &ArtifactAcquirer,
    ) -> Result<Vec<PackagedRecipe>> {
        let start = Instant::now();
        let store = FingerprintStore::new(self.ctx.fingerprint_dir());

        let packaged = self.run(plan, |step| self.package(&step.recipe, acquirer, &store))?;

        let fresh = packaged.iter().filter(|p| p.fresh).count();
        tracing::info!(
            "Finished {} package(s) ({} up to date) in {:.2}s",
            packaged.len(),
            fresh,
            start.elapsed().as_secs_f64()
        );
        Ok(packaged)
    }

    fn package(
        &self,
        recipe: &Recipe,
        acquirer: &ArtifactAcquirer,
        store: &FingerprintStore,
    ) -> Result<PackagedRecipe> {
        let tree = match recipe.remote() {
            Some(remote) => {
                let root = acquirer.acquire(&remote.url, &remote.checksum, remote.strip_root)?;
                FsTree::acquired(root, &remote.checksum, remote.strip_root)
            }
            None => FsTree::new(recipe.source_dir()),
        };

        let output = collect(recipe, &tree)?;
        let package_dir = self.ctx.package_dir(recipe);
        let fingerprint = PackageFingerprint::compute(recipe, &tree, &output)?;

        if store.is_fresh(recipe.name(), &fingerprint, &package_dir) {
            tracing::debug!("{} is up to date", recipe);
            return Ok(PackagedRecipe {
                name: recipe.name().to_string(),
                package_dir,
                files: output.len(),
                fresh: true,
            });
        }

        store.invalidate(recipe.name())?;
        Packager.materialize(&tree, &output, &package_dir)?;
        store.save(recipe.name(), &fingerprint)?;
        tracing::info!("Packaged {} ({} files)", recipe, output.len());

        Ok(PackagedRecipe {
            name: recipe.name().to_string(),
            package_dir,
            files: output.len(),
            fresh: false,
        })
    }

    /// Run `job` once per plan step, never before the step's dependencies
    /// succeeded. Returns the results in plan order, or the first failure
    /// wrapped in [`Error::Build`].
    pub fn run<T, F>(&self, plan: &BuildPlan, job: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&PlanStep) -> Result<T> + Sync,
    {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.jobs().unwrap_or(0))
            .thread_name(|i| format!("keel-worker-{}", i))
            .build()
            .map_err(|e| Error::io("failed to start worker pool", std::io::Error::other(e)))?;

        let run = Run {
            plan,
            job: &job,
            pending: plan
                .steps()
                .iter()
                .map(|s| AtomicUsize::new(s.dependencies.len()))
                .collect(),
            results: plan.steps().iter().map(|_| Mutex::new(None)).collect(),
            abort: AtomicBool::new(false),
            failure: Mutex::new(None),
            progress: self.progress_bar(plan.len()),
        };

        pool.scope(|scope| {
            for (index, step) in plan.steps().iter().enumerate() {
                if step.dependencies.is_empty() {
                    run.spawn(scope, index);
                }
            }
        });

        run.finish()
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if self.ctx.is_verbose() || total < 2 {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        Some(pb)
    }
}

/// Shared state of one plan execution.
struct Run<'a, T, F> {
    plan: &'a BuildPlan,
    job: &'a F,
    pending: Vec<AtomicUsize>,
    results: Vec<Mutex<Option<T>>>,
    abort: AtomicBool,
    failure: Mutex<Option<Error>>,
    progress: Option<ProgressBar>,
}

impl<'a, T, F> Run<'a, T, F>
where
    T: Send,
    F: Fn(&PlanStep) -> Result<T> + Sync,
{
    fn spawn<'s>(&'s self, scope: &rayon::Scope<'s>, index: usize)
    where
        'a: 's,
    {
        scope.spawn(move |scope| self.node(scope, index));
    }

    fn node<'s>(&'s self, scope: &rayon::Scope<'s>, index: usize)
    where
        'a: 's,
    {
        let step = &self.plan.steps()[index];
        if self.abort.load(Ordering::SeqCst) {
            tracing::debug!("skipping {} after an earlier failure", step.name());
            return;
        }
        if let Some(&missing) = step.dependencies.iter().find(|&&d| !self.is_done(d)) {
            self.fail(
                step,
                Error::io(
                    format!(
                        "dependency `{}` has not completed",
                        self.plan.steps()[missing].name()
                    ),
                    std::io::Error::from(std::io::ErrorKind::Other),
                ),
            );
            return;
        }

        if let Some(pb) = &self.progress {
            pb.set_message(step.name().to_string());
        }

        match (self.job)(step) {
            Ok(value) => {
                *lock(&self.results[index]) = Some(value);
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
                for &dependent in &step.dependents {
                    if self.pending[dependent].fetch_sub(1, Ordering::SeqCst) == 1 {
                        self.spawn(scope, dependent);
                    }
                }
            }
            Err(e) => self.fail(step, e),
        }
    }

    fn is_done(&self, index: usize) -> bool {
        lock(&self.results[index]).is_some()
    }

    fn fail(&self, step: &PlanStep, error: Error) {
        tracing::error!("{} failed: {}", step.name(), error);
        let first = !self.abort.swap(true, Ordering::SeqCst);
        if first {
            *lock(&self.failure) = Some(Error::Build {
                recipe: step.name().to_string(),
                source: Box::new(error),
            });
        }
    }

    fn finish(self) -> Result<Vec<T>> {
        let failure = self.failure.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = &self.progress {
            if failure.is_some() {
                pb.abandon();
            } else {
                pb.finish_with_message("done");
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let mut out = Vec::with_capacity(self.results.len());
        for (index, slot) in self.results.into_iter().enumerate() {
            let value = slot.into_inner().unwrap_or_else(PoisonError::into_inner);
            match value {
                Some(value) => out.push(value),
                None => {
                    return Err(Error::Build {
                        recipe: self.plan.steps()[index].name().to_string(),
                        source: Box::new(Error::io(
                            "step never ran",
                            std::io::Error::from(std::io::ErrorKind::Other),
                        )),
                    })
                }
            }
        }
        Ok(out)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
