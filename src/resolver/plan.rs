//! The build plan: recipes in dependency order.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::builder::context::BuildContext;
use crate::core::recipe::{PackageType, Recipe};

/// One node of the plan.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub recipe: Arc<Recipe>,
    /// Indices of direct dependencies, in declared order.
    pub dependencies: Vec<usize>,
    /// Indices of direct dependents, in plan order.
    pub dependents: Vec<usize>,
}

impl PlanStep {
    pub fn name(&self) -> &str {
        self.recipe.name()
    }
}

/// Recipes ordered so every dependency precedes its dependents.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    steps: Vec<PlanStep>,
    index: HashMap<String, usize>,
}

impl BuildPlan {
    pub(crate) fn new(steps: Vec<PlanStep>) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name().to_string(), i))
            .collect();
        BuildPlan { steps, index }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Recipe names in build order.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(PlanStep::name).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.index_of(name).map(|i| &self.steps[i])
    }

    /// Steps nothing else depends on, in plan order.
    pub fn sinks(&self) -> Vec<usize> {
        (0..self.steps.len())
            .filter(|&i| self.steps[i].dependents.is_empty())
            .collect()
    }

    /// Serializable summary of the plan.
    pub fn report(&self, ctx: &BuildContext) -> PlanReport {
        PlanReport {
            output_dir: ctx.output_dir().to_path_buf(),
            steps: self
                .steps
                .iter()
                .map(|step| {
                    let recipe = &step.recipe;
                    StepReport {
                        name: recipe.name().to_string(),
                        version: recipe.version().to_string(),
                        package_type: recipe.package_type(),
                        dependencies: step
                            .dependencies
                            .iter()
                            .map(|&d| self.steps[d].name().to_string())
                            .collect(),
                        package_dir: ctx.package_dir(recipe),
                        remote: recipe.remote().map(|r| r.url.to_string()),
                        description: recipe.metadata().description.clone(),
                        license: recipe.metadata().license.clone(),
                    }
                })
                .collect(),
        }
    }
}

/// The build plan as written to `keel-plan.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub output_dir: PathBuf,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub dependencies: Vec<String>,
    pub package_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}
