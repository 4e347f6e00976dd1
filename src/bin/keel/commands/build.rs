//! `keel build` command

use anyhow::Result;

use super::Global;
use crate::cli::BuildArgs;
use keel::ops::{build, BuildOptions};

pub fn execute(args: BuildArgs, mut global: Global) -> Result<()> {
    let ws = global.workspace()?;
    let config = global.ctx.config();

    let opts = BuildOptions {
        // Jobs: CLI > config > None (auto-detect)
        jobs: args.jobs.or(config.build.jobs),
        offline: args.offline || config.net.offline,
        verbose: global.ctx.is_verbose(),
    };
    let acquirer = global.acquirer(opts.offline)?;

    let result = build(&ws, &acquirer, &opts)?;

    for packaged in &result.packaged {
        let status = if packaged.fresh { "Fresh" } else { "Packaged" };
        eprintln!(
            "{:>12} {} -> {}",
            status,
            packaged.name,
            packaged.package_dir.display()
        );
    }
    eprintln!(
        "{:>12} {} recipe(s), {} repackaged; build info for `{}` in {}",
        "Finished",
        result.packaged.len(),
        result.rebuilt(),
        result.environment.root_name(),
        result.build_info_path.display()
    );

    Ok(())
}
