//! `keel plan` command

use anyhow::Result;

use super::Global;
use crate::cli::PlanArgs;
use keel::builder::BuildContext;
use keel::ops::resolve_workspace;

pub fn execute(args: PlanArgs, mut global: Global) -> Result<()> {
    let ws = global.workspace()?;
    let plan = resolve_workspace(&ws)?;
    let ctx = BuildContext::for_workspace(&ws);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan.report(&ctx))?);
        return Ok(());
    }

    for (i, step) in plan.steps().iter().enumerate() {
        let recipe = &step.recipe;
        let deps: Vec<&str> = step
            .dependencies
            .iter()
            .map(|&d| plan.steps()[d].name())
            .collect();
        println!(
            "{:>3}. {} v{} [{}]{}",
            i + 1,
            recipe.name(),
            recipe.version(),
            recipe.package_type(),
            if deps.is_empty() {
                String::new()
            } else {
                format!(" <- {}", deps.join(", "))
            }
        );
    }
    Ok(())
}
