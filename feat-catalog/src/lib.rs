//! Repository loading and feature lookup: the catalog aggregates a set of
//! root repositories and everything they transitively reference into a
//! single feature index, queryable by name and version spec.

mod error;
pub use error::Error;

mod events;
pub use events::Event;

mod loader;
pub use loader::{FsRepositoryLoader, RepositoryLoader};

mod matcher;
pub use matcher::{FeatureIndex, FeatureMatcher};

mod catalog;
pub use catalog::Catalog;
