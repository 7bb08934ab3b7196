//! The resolver's output representation: a [`Resource`].

use serde::{Deserialize, Serialize};

use crate::Version;

/// A resolver-produced candidate module or feature.
///
/// Opaque to the rest of the engine except for the attributes exposed
/// here: symbolic name, version, an optional start level, and either a
/// download `uri` (for modules) or a `feature_name`/`feature_version`
/// pair (for feature-namespaced resources, used to rebuild
/// `installedFeatures` after a deployment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// The resource's symbolic name.
    pub symbolic_name: String,
    /// The resource's version.
    pub version: Version,
    /// The URI content can be streamed from, for module resources.
    pub uri: Option<String>,
    /// The feature name this resource is namespaced under, for
    /// feature-namespaced resources.
    pub feature_name: Option<String>,
    /// The feature version this resource is namespaced under.
    pub feature_version: Option<Version>,
    /// The start level to apply when this module is installed or updated,
    /// carried through from the contributing feature's [`crate::BundleRef`].
    pub start_level: Option<u32>,
}

impl Resource {
    /// Creates a module resource backed by a downloadable `uri`.
    pub fn module(symbolic_name: impl Into<String>, version: Version, uri: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version,
            uri: Some(uri.into()),
            feature_name: None,
            feature_version: None,
            start_level: None,
        }
    }

    /// Creates a feature-namespaced resource, used to mark a feature as
    /// part of the resolved set without it being an installable module.
    pub fn feature_namespace(name: impl Into<String>, version: Version) -> Self {
        let name = name.into();
        Self {
            symbolic_name: name.clone(),
            version: version.clone(),
            uri: None,
            feature_name: Some(name),
            feature_version: Some(version),
            start_level: None,
        }
    }

    /// Returns `true` if this resource is namespaced under a feature
    /// rather than representing an installable module.
    pub fn is_feature_namespaced(&self) -> bool {
        self.feature_name.is_some()
    }

    /// The updateable predicate from the deployment planner: a resource is
    /// updateable (its content may change across deploys at the same
    /// identity) if its version qualifier marks it a snapshot, its URI
    /// contains `"SNAPSHOT"`, or its URI is not pinned to a repository
    /// (`"mvn:"`) scheme.
    pub fn is_updateable(&self) -> bool {
        if self.version.is_snapshot() {
            return true;
        }
        match &self.uri {
            Some(uri) => uri.contains("SNAPSHOT") || !uri.contains("mvn:"),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_qualifier_is_updateable() {
        let resource = Resource::module(
            "b",
            Version::new("1.0.0.SNAPSHOT").unwrap(),
            "mvn:x/b/1.0.0-SNAPSHOT",
        );
        assert!(resource.is_updateable());
    }

    #[test]
    fn pinned_mvn_release_is_not_updateable() {
        let resource = Resource::module("b", Version::new("1.0.0").unwrap(), "mvn:x/b/1.0.0");
        assert!(!resource.is_updateable());
    }

    #[test]
    fn non_mvn_uri_is_updateable() {
        let resource = Resource::module("b", Version::new("1.0.0").unwrap(), "file:///tmp/b.jar");
        assert!(resource.is_updateable());
    }

    #[test]
    fn module_resource_has_no_start_level_by_default() {
        let resource = Resource::module("b", Version::new("1.0.0").unwrap(), "mvn:x/b/1.0.0");
        assert_eq!(resource.start_level, None);
    }

    #[test]
    fn feature_namespaced_resource_has_no_uri() {
        let resource = Resource::feature_namespace("f", Version::new("1.0").unwrap());
        assert!(resource.is_feature_namespaced());
        assert!(!resource.is_updateable());
    }
}
