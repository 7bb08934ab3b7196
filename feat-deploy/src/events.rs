//! Engine-level change notifications.

use feat_types::FeatureId;

/// An observable change to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A repository was added to the catalog (see
    /// [`feat_catalog::Event::RepositoryAdded`]).
    RepositoryAdded {
        /// The repository's URI.
        uri: String,
        /// `true` if replayed to a newly-registered listener.
        replayed: bool,
    },
    /// A repository was removed from the catalog.
    RepositoryRemoved {
        /// The repository's URI.
        uri: String,
        /// `true` if replayed to a newly-registered listener.
        replayed: bool,
    },
    /// A feature was newly added to `installedFeatures`.
    FeatureInstalled {
        /// The installed feature's id.
        id: FeatureId,
        /// `true` if replayed to a newly-registered listener.
        replayed: bool,
    },
    /// A feature was removed from `installedFeatures`.
    FeatureUninstalled {
        /// The uninstalled feature's id.
        id: FeatureId,
        /// `true` if replayed to a newly-registered listener.
        replayed: bool,
    },
}

impl From<feat_catalog::Event> for Event {
    fn from(event: feat_catalog::Event) -> Self {
        match event {
            feat_catalog::Event::RepositoryAdded { uri, replayed } => Self::RepositoryAdded { uri, replayed },
            feat_catalog::Event::RepositoryRemoved { uri, replayed } => Self::RepositoryRemoved { uri, replayed },
        }
    }
}

/// A callback registered to observe engine [`Event`]s.
pub type Listener = Box<dyn Fn(&Event) + Send>;
