//! Implementation of `keel env`.

use crate::builder::{compose, BuildContext};
use crate::core::build_info::BuildInfo;
use crate::core::Workspace;
use crate::error::Result;
use crate::ops::resolve::resolve_workspace;

/// Compose the build info of `recipe`, or of the workspace consumer.
///
/// Nothing is fetched or packaged; paths point at where `keel build`
/// lays packages out. Returns the consumer's name with its record.
pub fn environment(ws: &Workspace, recipe: Option<&str>) -> Result<(String, BuildInfo)> {
    let plan = resolve_workspace(ws)?;
    let ctx = BuildContext::for_workspace(ws);
    let env = compose(&plan, &ctx, recipe.or(ws.consumer()))?;
    let name = env.root_name().to_string();
    Ok((name, env.into_root()))
}
