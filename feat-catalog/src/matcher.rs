//! Feature lookup by name and version spec.

use std::collections::BTreeMap;

use feat_types::{Feature, Version, VersionRange};

use crate::Error;

/// The feature index produced by [`crate::Catalog::features`]: every known
/// feature, keyed by name then version.
pub type FeatureIndex = BTreeMap<String, BTreeMap<Version, Feature>>;

/// Looks features up in a [`FeatureIndex`] by name and a version spec.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureMatcher;

impl FeatureMatcher {
    /// Finds the feature named `name` matching `version_spec`.
    ///
    /// An empty spec or the `"0.0.0"` wildcard matches any version and
    /// returns the highest one known. A spec equal to an existing version
    /// key returns that feature exactly. Otherwise the spec is parsed as a
    /// version range and the highest version within it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is unknown, `version_spec` is malformed,
    /// or no known version satisfies it.
    pub fn find<'a>(
        index: &'a FeatureIndex,
        name: &str,
        version_spec: &str,
    ) -> Result<&'a Feature, Error> {
        let versions = index
            .get(name)
            .ok_or_else(|| Error::UnknownFeatureName(name.to_string()))?;

        if version_spec.is_empty() || version_spec == "0.0.0" {
            return versions
                .iter()
                .next_back()
                .map(|(_, feature)| feature)
                .ok_or_else(|| Error::UnknownFeatureName(name.to_string()));
        }

        if let Ok(exact) = Version::new(version_spec) {
            if let Some(feature) = versions.get(&exact) {
                return Ok(feature);
            }
        }

        let range = VersionRange::parse(version_spec)?;
        versions
            .iter()
            .rev()
            .find(|(version, _)| range.contains(version))
            .map(|(_, feature)| feature)
            .ok_or_else(|| Error::NoMatchingVersion {
                name: name.to_string(),
                spec: version_spec.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use feat_types::{Feature, Version};

    use super::*;
    use rstest::rstest;

    fn feature(name: &str, version: &str) -> Feature {
        Feature {
            name: name.to_string(),
            version: Version::new(version).unwrap(),
            bundles: vec![],
            dependencies: vec![],
            conditionals: vec![],
            configurations: vec![],
        }
    }

    fn index() -> FeatureIndex {
        let mut versions = BTreeMap::new();
        versions.insert(Version::new("1.0.0").unwrap(), feature("webconsole", "1.0.0"));
        versions.insert(Version::new("1.2.0").unwrap(), feature("webconsole", "1.2.0"));
        versions.insert(Version::new("2.0.0").unwrap(), feature("webconsole", "2.0.0"));
        let mut index = BTreeMap::new();
        index.insert("webconsole".to_string(), versions);
        index
    }

    #[rstest]
    fn empty_spec_matches_highest_version() {
        let index = index();
        let found = FeatureMatcher::find(&index, "webconsole", "").unwrap();
        assert_eq!(found.version, Version::new("2.0.0").unwrap());
    }

    #[rstest]
    fn literal_version_matches_exactly() {
        let index = index();
        let found = FeatureMatcher::find(&index, "webconsole", "1.2.0").unwrap();
        assert_eq!(found.version, Version::new("1.2.0").unwrap());
    }

    #[rstest]
    fn range_spec_matches_highest_in_range() {
        let index = index();
        let found = FeatureMatcher::find(&index, "webconsole", "[1,2)").unwrap();
        assert_eq!(found.version, Version::new("1.2.0").unwrap());
    }

    #[rstest]
    fn unknown_name_is_an_error() {
        let index = index();
        assert!(FeatureMatcher::find(&index, "missing", "").is_err());
    }

    #[rstest]
    fn out_of_range_spec_is_an_error() {
        let index = index();
        assert!(FeatureMatcher::find(&index, "webconsole", "[5,6)").is_err());
    }
}
