//! Catalog change notifications.

/// An observable change to a [`crate::Catalog`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A repository was added as a root.
    RepositoryAdded {
        /// The repository's URI.
        uri: String,
        /// `true` if this is a replay delivered to a newly-registered
        /// listener catching up on prior state, rather than a live change.
        replayed: bool,
    },
    /// A repository root was removed.
    RepositoryRemoved {
        /// The repository's URI.
        uri: String,
        /// `true` if this is a replay delivered to a newly-registered
        /// listener catching up on prior state, rather than a live change.
        replayed: bool,
    },
}
