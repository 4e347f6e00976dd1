//! Implementation of `keel tree`.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::builder::WORKSPACE_CONSUMER;
use crate::error::{Error, Result};
use crate::resolver::BuildPlan;

/// Render the dependency tree below `root`, or below every sink of the plan.
///
/// Subtrees already printed are marked `(*)` and not expanded again.
pub fn render_tree(plan: &BuildPlan, root: Option<&str>, max_depth: Option<usize>) -> Result<String> {
    let roots = match root {
        Some(name) => vec![plan.index_of(name).ok_or_else(|| Error::UnresolvedDependency {
            recipe: WORKSPACE_CONSUMER.to_string(),
            dependency: name.to_string(),
            constraint: "*".to_string(),
            reason: "no recipe with that name was loaded".to_string(),
        })?],
        None => plan.sinks(),
    };

    let mut out = String::new();
    let mut seen = HashSet::new();
    for index in roots {
        print_node(plan, index, 0, max_depth.unwrap_or(usize::MAX), &mut seen, &mut out);
    }
    Ok(out)
}

fn print_node(
    plan: &BuildPlan,
    index: usize,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<usize>,
    out: &mut String,
) {
    if depth > max_depth {
        return;
    }

    let is_duplicate = !seen.insert(index);
    let prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}├── ", "│   ".repeat(depth - 1))
    };

    let step = &plan.steps()[index];
    let recipe = &step.recipe;
    let _ = writeln!(
        out,
        "{}{} v{} [{}]{}",
        prefix,
        recipe.name(),
        recipe.version(),
        recipe.package_type(),
        if is_duplicate { " (*)" } else { "" }
    );

    if is_duplicate {
        return;
    }
    for &dep in &step.dependencies {
        print_node(plan, dep, depth + 1, max_depth, seen, out);
    }
}
