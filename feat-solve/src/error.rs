//! Error handling.

/// Errors that can occur while resolving a feature set into resources.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`feat_types::Error`].
    #[error(transparent)]
    FeatTypes(#[from] feat_types::Error),

    /// A [`feat_catalog::Error`].
    #[error(transparent)]
    Catalog(#[from] feat_catalog::Error),

    /// The requested feature set could not be satisfied.
    #[error("failed to resolve dependencies:\n{0}")]
    Unresolvable(String),
}
