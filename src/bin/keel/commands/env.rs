//! `keel env` command

use std::collections::BTreeMap;

use anyhow::Result;

use super::Global;
use crate::cli::EnvArgs;
use keel::builder::emit::{render, EmitFormat};
use keel::ops::environment;

pub fn execute(args: EnvArgs, mut global: Global) -> Result<()> {
    let format: EmitFormat = args.format.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let ws = global.workspace()?;

    let (name, info) = environment(&ws, args.recipe.as_deref())?;
    tracing::debug!("environment of `{}`", name);

    let base: BTreeMap<String, String> = std::env::vars().collect();
    print!("{}", render(&info, format, &base)?);
    if format == EmitFormat::Json {
        println!();
    }
    Ok(())
}
