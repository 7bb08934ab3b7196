//! Error handling.

use std::path::PathBuf;

/// Errors that can occur while loading or querying a catalog of
/// repositories.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`feat_types::Error`].
    #[error(transparent)]
    FeatTypes(#[from] feat_types::Error),

    /// An I/O error occurred at a path.
    #[error("I/O error at {path} while {context}: {source}")]
    IoPath {
        /// The path at which the error occurred.
        path: PathBuf,
        /// The context in which the error occurred.
        context: String,
        /// The source error.
        source: std::io::Error,
    },

    /// A repository document failed to parse as JSON.
    #[error("failed to parse repository document at {path}: {source}")]
    InvalidDocument {
        /// The path of the invalid document.
        path: PathBuf,
        /// The source error.
        source: serde_json::Error,
    },

    /// A repository URI could not be resolved by the configured loader.
    #[error("repository {0} could not be loaded")]
    RepositoryNotFound(String),

    /// `FeatureMatcher` was asked to match a name with no known versions.
    #[error("no feature named {0} is known to the catalog")]
    UnknownFeatureName(String),

    /// `FeatureMatcher` found no version satisfying the requested spec.
    #[error("no version of {name} satisfies {spec}")]
    NoMatchingVersion {
        /// The feature name.
        name: String,
        /// The requested version or range spec.
        spec: String,
    },
}
