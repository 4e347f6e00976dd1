//! Dependency resolution.
//!
//! Resolution is pure and deterministic: all recipes are loaded before it
//! runs, and graph-level errors are reported before anything is packaged.

pub mod graph;
pub mod plan;

pub use graph::RecipeGraph;
pub use plan::{BuildPlan, PlanReport, PlanStep};

use crate::core::recipe::Recipe;
use crate::error::Result;

/// Resolve a set of recipes into a build plan, dependencies first.
pub fn resolve(recipes: impl IntoIterator<Item = Recipe>) -> Result<BuildPlan> {
    let graph = RecipeGraph::build(recipes)?;

    if let Some(path) = graph.find_cycle() {
        return Err(crate::error::Error::DependencyCycle { path });
    }

    let order = graph.topological_order()?;
    let mut position = vec![0usize; graph.len()];
    for (i, node) in order.iter().enumerate() {
        position[node.index()] = i;
    }

    let steps = order
        .iter()
        .map(|&node| {
            let mut dependents: Vec<usize> = graph
                .dependents(node)
                .into_iter()
                .map(|n| position[n.index()])
                .collect();
            dependents.sort_unstable();
            PlanStep {
                recipe: graph.recipe(node).clone(),
                dependencies: graph
                    .dependencies(node)
                    .into_iter()
                    .map(|n| position[n.index()])
                    .collect(),
                dependents,
            }
        })
        .collect();

    let plan = BuildPlan::new(steps);
    tracing::debug!("resolved build order: {}", plan.order().join(", "));
    Ok(plan)
}
