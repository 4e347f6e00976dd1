//! Error taxonomy for keel.
//!
//! Every library operation returns either its value or one of these kinds.
//! Node-level failures raised while executing a build plan are wrapped in
//! [`Error::Build`] so the report names the recipe that failed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Result alias used across the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The version descriptor is missing, unreadable, or empty after trimming.
    #[error("invalid version for recipe `{recipe}`: {reason}")]
    InvalidVersion { recipe: String, reason: String },

    #[error("recipe `{recipe}` declares unknown package type `{found}`")]
    UnknownPackageType { recipe: String, found: String },

    /// A fetched artifact's digest disagrees with the declared one.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("`{recipe}` requires `{dependency}` ({constraint}), but {reason}")]
    UnresolvedDependency {
        recipe: String,
        dependency: String,
        constraint: String,
        reason: String,
    },

    #[error("dependency cycle detected: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error(
        "copy conflict in recipe `{recipe}`: `{destination}` would receive different content \
         from `{first}` and `{second}`"
    )]
    CopyConflict {
        recipe: String,
        destination: String,
        first: String,
        second: String,
    },

    #[error(
        "conflicting definition of {key} while composing `{consumer}`: \
         `{existing}` (from `{existing_origin}`) vs `{value}` (from `{origin}`)"
    )]
    ConflictingDefinition {
        consumer: String,
        key: String,
        existing: String,
        existing_origin: String,
        value: String,
        origin: String,
    },

    /// A recipe or workspace file is malformed.
    #[error("invalid recipe {}: {message}", path.display())]
    InvalidRecipe { path: PathBuf, message: String },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to extract {archive}: {message}")]
    Extract { archive: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A node of the build plan failed.
    #[error("failed to build `{recipe}`: {source}")]
    Build {
        recipe: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn invalid_recipe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::InvalidRecipe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The underlying error kind, looking through [`Error::Build`] wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Build { source, .. } => source.root(),
            other => other,
        }
    }

    /// The recipe whose build failed, if this error came out of plan execution.
    pub fn failed_recipe(&self) -> Option<&str> {
        match self {
            Error::Build { recipe, .. } => Some(recipe),
            _ => None,
        }
    }

    /// Reproduce an error for a second observer of the same failure.
    ///
    /// Used by the artifact cache to hand the first requester's outcome to
    /// waiters on the same key. Kinds that hold non-clonable sources are
    /// flattened into a `Fetch` error carrying the original message.
    pub(crate) fn replay(&self, url: &str) -> Error {
        match self {
            Error::ChecksumMismatch {
                url,
                expected,
                actual,
            } => Error::ChecksumMismatch {
                url: url.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Error::Fetch { url, message } => Error::Fetch {
                url: url.clone(),
                message: message.clone(),
            },
            Error::Extract { archive, message } => Error::Extract {
                archive: archive.clone(),
                message: message.clone(),
            },
            other => Error::Fetch {
                url: url.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Error::Build { recipe, source } => {
                let mut diag = source.to_diagnostic();
                diag.message = format!("failed to build `{}`: {}", recipe, diag.message);
                diag
            }

            Error::InvalidVersion { recipe, reason } => {
                Diagnostic::error(format!("invalid version for recipe `{}`", recipe))
                    .with_context(reason.clone())
                    .with_suggestion("Make sure the version descriptor exists and is not empty")
            }

            Error::UnknownPackageType { recipe, found } => Diagnostic::error(format!(
                "recipe `{}` declares unknown package type `{}`",
                recipe, found
            ))
            .with_suggestion("Use one of: header-only, source-header, prebuilt-binary"),

            Error::ChecksumMismatch {
                url,
                expected,
                actual,
            } => Diagnostic::error(format!("checksum mismatch for {}", url))
                .with_context(format!("expected {}", expected))
                .with_context(format!("actual   {}", actual))
                .with_suggestion("Verify the download URL points at the intended release")
                .with_suggestion("Update the checksum in the recipe if the artifact changed"),

            Error::UnresolvedDependency {
                recipe,
                dependency,
                constraint,
                reason,
            } => Diagnostic::error(format!(
                "`{}` requires `{}` ({})",
                recipe, dependency, constraint
            ))
            .with_context(reason.clone())
            .with_suggestion(format!(
                "Add a recipe for `{}` to the workspace members",
                dependency
            ))
            .with_suggestion("Relax the version pin in `requires`"),

            Error::DependencyCycle { path } => {
                Diagnostic::error("dependency cycle detected")
                    .with_context(format!("cycle: {}", path.join(" -> ")))
                    .with_suggestion("Break the cycle by removing or restructuring requirements")
            }

            Error::CopyConflict {
                recipe,
                destination,
                first,
                second,
            } => Diagnostic::error(format!("copy conflict in recipe `{}`", recipe))
                .with_context(format!("destination: {}", destination))
                .with_context(format!("first source:  {}", first))
                .with_context(format!("second source: {}", second))
                .with_suggestion("Narrow the glob patterns or map the rules to distinct `to` subtrees"),

            Error::ConflictingDefinition {
                consumer,
                key,
                existing,
                existing_origin,
                value,
                origin,
            } => Diagnostic::error(format!(
                "conflicting definition of {} while composing `{}`",
                key, consumer
            ))
            .with_context(format!("`{}` defines `{}`", existing_origin, existing))
            .with_context(format!("`{}` defines `{}`", origin, value))
            .with_suggestion("Make both recipes export the same value")
            .with_suggestion(
                "List the key in `exports.overrides` of the downstream recipe to replace it intentionally",
            ),

            Error::InvalidRecipe { path, message } => Diagnostic::error(message.clone())
                .with_location(path.clone()),

            Error::Fetch { url, message } => {
                Diagnostic::error(format!("failed to fetch {}", url))
                    .with_context(message.clone())
                    .with_suggestion(crate::util::diagnostic::suggestions::FETCH_FAILED)
            }

            other => Diagnostic::error(other.to_string()),
        }
    }
}
