//! `keel tree` command

use anyhow::Result;

use super::Global;
use crate::cli::TreeArgs;
use keel::ops::{render_tree, resolve_workspace};

pub fn execute(args: TreeArgs, mut global: Global) -> Result<()> {
    let ws = global.workspace()?;
    let plan = resolve_workspace(&ws)?;

    let root = args.recipe.as_deref().or(ws.consumer());
    print!("{}", render_tree(&plan, root, args.depth)?);
    Ok(())
}
