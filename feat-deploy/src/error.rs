//! Error handling.

use std::path::PathBuf;

use feat_types::{FeatureId, ModuleId};

/// Errors that can occur while planning, executing, or persisting a
/// deployment.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`feat_types::Error`].
    #[error(transparent)]
    FeatTypes(#[from] feat_types::Error),

    /// A [`feat_catalog::Error`].
    #[error(transparent)]
    Catalog(#[from] feat_catalog::Error),

    /// A [`feat_solve::Error`].
    #[error(transparent)]
    Solve(#[from] feat_solve::Error),

    /// A requested feature name/version is not known to the catalog.
    #[error("feature {0} is not present in the catalog")]
    NotFound(String),

    /// An uninstall request matched more than one installed version.
    #[error("multiple versions of {0} are installed; specify a version to uninstall")]
    AmbiguousUninstall(String),

    /// A module operation reported by [`crate::ModuleHost`] failed.
    #[error("module {module} failed during {operation}: {source}")]
    ModuleOperation {
        /// The affected module.
        module: ModuleId,
        /// The operation being performed (`"install"`, `"update"`, ...).
        operation: &'static str,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One or more modules failed to start; the batch still completed.
    #[error("{0} module(s) failed to start: {1:?}")]
    StartFailures(usize, Vec<ModuleId>),

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

    /// The persisted state file could not be parsed.
    #[error("failed to parse engine state at {path}: {source}")]
    InvalidState {
        /// The path of the invalid state file.
        path: PathBuf,
        /// The source error.
        source: serde_json::Error,
    },

    /// The persisted state lock is already held.
    #[error("engine state at {0} is locked by another process")]
    StateLocked(PathBuf),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration at {path}: {source}")]
    InvalidConfig {
        /// The path of the invalid configuration file.
        path: PathBuf,
        /// The source error.
        source: toml::de::Error,
    },

    /// A feature id referenced a feature that was required but never
    /// resolved.
    #[error("feature {0} was required but was not part of the resolved set")]
    UnresolvedRequiredFeature(FeatureId),

    /// Reading a resource's content stream to compute its checksum failed.
    #[error("I/O error computing checksum for {uri}: {source}")]
    ChecksumIo {
        /// The resource's URI.
        uri: String,
        /// The source error.
        source: std::io::Error,
    },

    /// A resource destined for `toUpdate`/`toInstall` had no stream
    /// provider registered for its URI.
    #[error("no stream provider registered for {0}")]
    MissingStreamProvider(String),
}
