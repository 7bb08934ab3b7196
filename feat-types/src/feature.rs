//! The feature data model: features, bundle references, conditionals, and
//! the repositories that contain them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FeatureId, FeatureRef, Version};

/// A reference to an installable module within a feature.
///
/// `location` is the primary identity across merges from multiple
/// features: two [`BundleRef`]s with the same location are the same
/// module reference, even if other fields differ.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleRef {
    /// The URI of the module's content.
    pub location: String,
    /// The start level to apply when this module is installed or updated,
    /// if the feature requests a non-default one.
    pub start_level: Option<u32>,
    /// Whether this bundle is a dependency bundle (contributes to
    /// resolution but is not a primary member of the feature).
    pub dependency: bool,
}

impl BundleRef {
    /// Creates a new [`BundleRef`].
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            start_level: None,
            dependency: false,
        }
    }
}

impl PartialEq for BundleRef {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for BundleRef {}

impl std::hash::Hash for BundleRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.location.hash(state);
    }
}

/// An opaque configuration reference contributed by a feature.
///
/// The configuration installer that consumes these (see `OUT OF SCOPE` in
/// the module documentation) is an external collaborator; the engine only
/// carries this value through to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRef {
    /// The persistent identity (PID) of the configuration.
    pub pid: String,
    /// The configuration's key/value properties.
    pub properties: BTreeMap<String, String>,
}

/// A conditional feature fragment.
///
/// Contributes its `bundles` and `configurations` only once every trigger
/// in `triggers` is satisfied by some feature present in the currently
/// resolved set (see `ConditionalExpander` in `feat-solve`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conditional {
    /// The features that must all be present for this conditional to
    /// contribute.
    pub triggers: Vec<FeatureRef>,
    /// The bundles contributed when triggered.
    pub bundles: Vec<BundleRef>,
    /// The configurations contributed when triggered.
    pub configurations: Vec<ConfigRef>,
}

impl Conditional {
    /// Returns the synthetic feature id this conditional contributes as,
    /// when triggered: `"<parent-name>-condition-<index>/<parent-version>"`.
    pub fn synthetic_id(parent: &FeatureId, index: usize) -> FeatureId {
        FeatureId::new(
            format!("{}-condition-{index}", parent.name()),
            parent.version().clone(),
        )
    }
}

/// A named, versioned bundle of installable modules with dependencies,
/// configurations, and conditional extensions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feature {
    /// The feature name.
    pub name: String,
    /// The feature version.
    pub version: Version,
    /// The modules this feature installs directly.
    pub bundles: Vec<BundleRef>,
    /// The other features this feature depends on.
    pub dependencies: Vec<FeatureRef>,
    /// Conditional fragments contributed when their triggers are met.
    pub conditionals: Vec<Conditional>,
    /// The configurations this feature installs directly.
    pub configurations: Vec<ConfigRef>,
}

impl Feature {
    /// This feature's identity.
    pub fn id(&self) -> FeatureId {
        FeatureId::new(self.name.clone(), self.version.clone())
    }
}

/// A repository: a named collection of features, plus references to other
/// repositories that are transitively loaded alongside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repository {
    /// The URI identifying this repository.
    pub uri: String,
    /// An optional human-readable name.
    pub name: Option<String>,
    /// URIs of other repositories referenced by this one.
    pub referenced_repositories: Vec<String>,
    /// The features defined directly in this repository.
    pub features: Vec<Feature>,
}
