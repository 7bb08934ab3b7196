//! Core data types for the feature resolution and deployment engine:
//! versions and version ranges, feature identifiers, the feature/bundle
//! data model, repositories, and the resolver's resource representation.

mod error;
pub use error::Error;

mod version;
pub use version::{RangeMacro, Version, VersionRange};

mod id;
pub use id::{FeatureId, FeatureRef, ModuleId, ModuleLocation};

mod feature;
pub use feature::{BundleRef, Conditional, ConfigRef, Feature, Repository};

mod resource;
pub use resource::Resource;

mod stream;
pub use stream::{StaticStreamProvider, StreamProvider};
