//! Workspace resolution operations.

use crate::core::Workspace;
use crate::error::Result;
use crate::resolver::{resolve, BuildPlan};

/// Load every member recipe and resolve them into a build plan.
///
/// Graph-level errors (unresolved requirements, cycles, duplicate names)
/// surface here, before anything is fetched or packaged.
pub fn resolve_workspace(ws: &Workspace) -> Result<BuildPlan> {
    let recipes = ws.load_recipes()?;
    let plan = resolve(recipes)?;
    tracing::debug!("build order: {}", plan.order().join(", "));
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WORKSPACE_FILE;
    use crate::error::Error;
    use crate::test_support::create_test_workspace;
    use crate::test_support::fixtures::{manifests, RecipeFixture};

    #[test]
    fn test_resolve_workspace_orders_members() {
        let tmp = create_test_workspace(&manifests::workspace(&["recipes/*"]));
        let recipes = tmp.path().join("recipes");
        RecipeFixture::headers("hal", &["cmsis"]).write_to(&recipes).unwrap();
        RecipeFixture::headers("cmsis", &[]).write_to(&recipes).unwrap();

        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();
        let plan = resolve_workspace(&ws).unwrap();
        assert_eq!(plan.order(), vec!["cmsis", "hal"]);
    }

    #[test]
    fn test_missing_requirement_is_reported() {
        let tmp = create_test_workspace(&manifests::workspace(&["hal"]));
        RecipeFixture::headers("hal", &["cmsis/5.9.0"]).write_to(tmp.path()).unwrap();

        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();
        match resolve_workspace(&ws).unwrap_err() {
            Error::UnresolvedDependency {
                recipe,
                dependency,
                constraint,
                ..
            } => {
                assert_eq!(recipe, "hal");
                assert_eq!(dependency, "cmsis");
                assert_eq!(constraint, "5.9.0");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
