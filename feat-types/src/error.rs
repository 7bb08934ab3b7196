//! Error handling for `feat-types`.

/// The error that can occur when working with feature types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A version string could not be parsed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// A version range string could not be parsed.
    #[error("invalid version range: {0}")]
    InvalidVersionRange(String),

    /// A version range macro string could not be parsed.
    #[error("invalid version range macro: {0}")]
    InvalidRangeMacro(String),

    /// A feature identifier string could not be parsed.
    #[error("invalid feature identifier: {0}")]
    InvalidFeatureId(String),

    /// A feature name was empty.
    #[error("feature name must not be empty")]
    EmptyName,
}
