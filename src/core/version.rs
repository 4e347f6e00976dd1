//! Version constraints on requirements.
//!
//! Constraints are pin-or-latest: a requirement either names an exact
//! version string or accepts whatever version the workspace provides. A
//! semver range is also accepted, but every comparison goes through
//! [`satisfies`] so the policy can change in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// A constraint on the version of a required recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionReq {
    /// Any version.
    #[default]
    Any,
    /// Exactly this version string (after trimming).
    Exact(String),
    /// A semver range such as `^1.0` or `>=2, <3`.
    Range(semver::VersionReq),
}

impl VersionReq {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(VersionReq::Any);
        }

        let is_range = s.starts_with(['^', '~', '>', '<', '='])
            || s.contains(',')
            || s.ends_with(".*")
            || s.ends_with(".x");
        if is_range {
            return semver::VersionReq::parse(s)
                .map(VersionReq::Range)
                .map_err(|e| format!("invalid version constraint `{}`: {}", s, e));
        }

        if s.chars().any(char::is_whitespace) {
            return Err(format!("invalid version constraint `{}`", s));
        }
        Ok(VersionReq::Exact(s.to_string()))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionReq::Any)
    }

    pub fn satisfies(&self, version: &str) -> bool {
        satisfies(self, version)
    }
}

/// The one version predicate used by resolution.
pub fn satisfies(req: &VersionReq, version: &str) -> bool {
    let version = version.trim();
    match req {
        VersionReq::Any => true,
        VersionReq::Exact(pin) => pin == version,
        VersionReq::Range(range) => semver::Version::parse(version)
            .map(|v| range.matches(&v))
            .unwrap_or(false),
    }
}

impl FromStr for VersionReq {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionReq::parse(s)
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionReq::Any => write!(f, "*"),
            VersionReq::Exact(v) => write!(f, "{}", v),
            VersionReq::Range(r) => write!(f, "{}", r),
        }
    }
}

impl Serialize for VersionReq {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
