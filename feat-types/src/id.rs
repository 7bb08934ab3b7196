//! Feature identifiers and references.
//!
//! Grammar: `<name> ("/" <version>)?`; a missing version normalizes to the
//! `"0.0.0"` wildcard sentinel.

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Version, VersionRange};

/// The identity of a resolved feature: a `(name, version)` pair.
///
/// Canonical form always carries an explicit version; [`FeatureId::parse`]
/// fills in [`Version::wildcard`] when none is given.
///
/// ## Examples
///
/// ```
/// use feat_types::FeatureId;
///
/// let id = FeatureId::parse("webconsole/1.0").unwrap();
/// assert_eq!(id.to_string(), "webconsole/1.0.0");
///
/// let any = FeatureId::parse("webconsole").unwrap();
/// assert_eq!(any.to_string(), "webconsole/0.0.0");
/// assert!(any.version().is_wildcard());
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId {
    name: String,
    version: Version,
}

impl FeatureId {
    /// Creates a new [`FeatureId`] from an already-parsed name and version.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parses a `name[/version]` identifier, normalizing a missing version
    /// to the wildcard sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty or `version` is malformed.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let (name, version) = match input.split_once('/') {
            Some((name, version)) => (name, version),
            None => (input, ""),
        };
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(Self {
            name: name.to_string(),
            version: Version::new(version)?,
        })
    }

    /// The feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The feature version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns `true` if this identifier's version is the wildcard
    /// sentinel, i.e. it was requested without an explicit version.
    pub fn is_wildcard_version(&self) -> bool {
        self.version.is_wildcard()
    }
}

impl FromStr for FeatureId {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// A reference to a feature by name and an acceptable version range.
///
/// Used for feature dependencies and conditional triggers, both of which
/// accept a range rather than a single exact version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureRef {
    name: String,
    range: VersionRange,
}

impl FeatureRef {
    /// Creates a new [`FeatureRef`].
    pub fn new(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    /// The referenced feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The acceptable version range.
    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    /// Returns `true` if `id` satisfies this reference: same name and a
    /// version within range.
    pub fn is_satisfied_by(&self, id: &FeatureId) -> bool {
        self.name == id.name() && self.range.contains(id.version())
    }

    /// Parses a `name[/version-or-range]` reference. A bare version is
    /// treated as an exact match; an OSGi-style interval is parsed as a
    /// range; a missing version matches any.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty or the version/range is
    /// malformed.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let (name, spec) = match input.split_once('/') {
            Some((name, spec)) => (name, spec),
            None => (input, ""),
        };
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        let range = if spec.is_empty() {
            VersionRange::any()
        } else if spec.starts_with('[') || spec.starts_with('(') {
            VersionRange::parse(spec)?
        } else {
            VersionRange::exact(Version::new(spec)?)
        };
        Ok(Self {
            name: name.to_string(),
            range,
        })
    }
}

impl FromStr for FeatureRef {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Display for FeatureRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.range)
    }
}

// `VersionRange` has no natural field-for-field serde mapping (its bounds
// are parsed from an OSGi interval), so repository documents carry a
// `FeatureRef` as the same `name/range` string `parse` accepts.
impl Serialize for FeatureRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FeatureRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

/// The identity of a live module on the runtime.
///
/// Distinct from [`crate::Resource`]: a module is a runtime-assigned
/// numeric id, while a resource is a resolver candidate. The only bridge
/// between the two is the deployment planner's `resource_to_module` map.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub u64);

impl Display for ModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The location (URI) of a module's installable content.
///
/// This is the primary identity of a [`crate::BundleRef`] across merges
/// from multiple features, and the key under which content checksums are
/// tracked.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleLocation(pub String);

impl Display for ModuleLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleLocation {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
