//! `keel fetch` command

use anyhow::Result;

use super::Global;
use crate::cli::FetchArgs;
use keel::ops::fetch;

pub fn execute(args: FetchArgs, mut global: Global) -> Result<()> {
    let ws = global.workspace()?;
    let acquirer = global.acquirer(args.offline)?;

    let fetched = fetch(&ws, &acquirer, &args.names)?;
    if fetched.is_empty() {
        eprintln!("{:>12} no remote artifacts", "Fetched");
    }
    for artifact in &fetched {
        eprintln!("{:>12} {} ({})", "Fetched", artifact.recipe, artifact.url);
        println!("{}", artifact.path.display());
    }
    Ok(())
}
