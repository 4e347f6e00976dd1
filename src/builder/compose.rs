//! Build-environment composition.
//!
//! Walks the plan in order. Each node starts from the merge of its direct
//! dependencies' records, in declared order, and then overlays its own
//! exports rooted at its package directory.

use crate::builder::context::BuildContext;
use crate::core::build_info::BuildInfo;
use crate::error::{Error, Result};
use crate::resolver::BuildPlan;

/// Name used for the consumer when several sinks are merged.
pub const WORKSPACE_CONSUMER: &str = "<workspace>";

/// Per-node build info plus the consumer's final record.
#[derive(Debug, Clone)]
pub struct ComposedEnvironment {
    names: Vec<String>,
    per_node: Vec<BuildInfo>,
    root_name: String,
    root: BuildInfo,
}

impl ComposedEnvironment {
    /// The record of one recipe.
    pub fn node(&self, name: &str) -> Option<&BuildInfo> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.per_node[i])
    }

    /// Records in plan order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BuildInfo)> {
        self.names.iter().map(String::as_str).zip(self.per_node.iter())
    }

    /// The consumer's record: the system output.
    pub fn root(&self) -> &BuildInfo {
        &self.root
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn into_root(self) -> BuildInfo {
        self.root
    }
}

/// Compose the nodes of `plan`, then select the consumer.
///
/// The consumer is `consumer` when given, otherwise the plan's single sink;
/// several sinks are merged in plan order under the same conflict rules.
/// A named consumer only composes its own dependency closure.
pub fn compose(
    plan: &BuildPlan,
    ctx: &BuildContext,
    consumer: Option<&str>,
) -> Result<ComposedEnvironment> {
    let consumer = consumer
        .map(|name| {
            plan.index_of(name)
                .map(|index| (name, index))
                .ok_or_else(|| Error::UnresolvedDependency {
                    recipe: WORKSPACE_CONSUMER.to_string(),
                    dependency: name.to_string(),
                    constraint: "*".to_string(),
                    reason: "no recipe with that name was loaded".to_string(),
                })
        })
        .transpose()?;

    let needed = match consumer {
        Some((_, index)) => closure(plan, index),
        None => vec![true; plan.len()],
    };

    let mut per_node: Vec<Option<BuildInfo>> = vec![None; plan.len()];
    for (index, step) in plan.steps().iter().enumerate() {
        if !needed[index] {
            continue;
        }
        let recipe = &step.recipe;
        let mut info = BuildInfo::default();
        for dep in step.dependencies.iter().filter_map(|&d| per_node[d].as_ref()) {
            info.merge(dep, recipe.name())?;
        }

        let exports = recipe.exports();
        let own = exports.resolve(recipe.name(), &ctx.package_dir(recipe))?;
        info.overlay(&own, recipe.name(), &exports.overrides)?;

        tracing::debug!(
            "composed {}: {} include dir(s), {} executable(s)",
            recipe.name(),
            info.include_dirs.len(),
            info.compiler_executables.len()
        );
        per_node[index] = Some(info);
    }

    let (root_name, root) = match consumer {
        Some((name, index)) => (name.to_string(), per_node[index].clone().unwrap_or_default()),
        None => match plan.sinks().as_slice() {
            [] => (WORKSPACE_CONSUMER.to_string(), BuildInfo::default()),
            [only] => (
                plan.steps()[*only].name().to_string(),
                per_node[*only].clone().unwrap_or_default(),
            ),
            sinks => {
                let mut merged = BuildInfo::default();
                for info in sinks.iter().filter_map(|&sink| per_node[sink].as_ref()) {
                    merged.merge(info, WORKSPACE_CONSUMER)?;
                }
                (WORKSPACE_CONSUMER.to_string(), merged)
            }
        },
    };

    let (names, per_node): (Vec<String>, Vec<BuildInfo>) = plan
        .steps()
        .iter()
        .zip(per_node)
        .filter_map(|(step, info)| info.map(|info| (step.name().to_string(), info)))
        .unzip();

    Ok(ComposedEnvironment {
        names,
        per_node,
        root_name,
        root,
    })
}

/// Plan indices `root` depends on, directly or transitively, including itself.
fn closure(plan: &BuildPlan, root: usize) -> Vec<bool> {
    let mut needed = vec![false; plan.len()];
    let mut stack = vec![root];
    while let Some(index) = stack.pop() {
        if !needed[index] {
            needed[index] = true;
            stack.extend(plan.steps()[index].dependencies.iter().copied());
        }
    }
    needed
}
