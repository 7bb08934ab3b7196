//! Feature and bundle versions, and the ranges used to match them.
//!
//! Versions follow the four-segment scheme common to modular runtimes:
//! `major.minor.micro.qualifier`, where the first three segments are
//! numeric and the qualifier is an arbitrary string used to mark e.g.
//! snapshot builds.

use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A `major.minor.micro.qualifier` version.
///
/// The all-zero version (`0.0.0`) is the wildcard sentinel used throughout
/// the engine to mean "any version" (see [`Version::is_wildcard`]).
///
/// ## Examples
///
/// ```
/// use feat_types::Version;
///
/// let v = Version::new("1.2.3.SNAPSHOT").unwrap();
/// assert_eq!(v.to_string(), "1.2.3.SNAPSHOT");
/// assert!(Version::new("0.0.0").unwrap().is_wildcard());
/// ```
#[derive(Clone, Debug, Default, Eq, Serialize, Deserialize)]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

impl Version {
    /// The wildcard sentinel version (`0.0.0`), meaning "any version".
    pub fn wildcard() -> Self {
        Self::default()
    }

    /// Creates a new [`Version`] from its four segments.
    pub fn from_parts(major: u32, minor: u32, micro: u32, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: qualifier.into(),
        }
    }

    /// Parses a [`Version`] from a string.
    ///
    /// Missing trailing numeric segments default to `0`. A fourth,
    /// dot-delimited segment (and anything after it) is taken verbatim as
    /// the qualifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the major, minor, or micro segment is not a
    /// valid `u32`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use feat_types::Version;
    ///
    /// assert_eq!(Version::new("1").unwrap().to_string(), "1.0.0");
    /// assert_eq!(Version::new("1.2").unwrap().to_string(), "1.2.0");
    /// assert_eq!(Version::new("1.2.3").unwrap().to_string(), "1.2.3");
    /// ```
    pub fn new(input: &str) -> Result<Self, Error> {
        if input.is_empty() {
            return Ok(Self::wildcard());
        }

        let mut segments = input.splitn(4, '.');
        let parse_segment = |segment: Option<&str>| -> Result<u32, Error> {
            match segment {
                Some(value) => value
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidVersion(input.to_string())),
                None => Ok(0),
            }
        };

        let major = parse_segment(segments.next())?;
        let minor = parse_segment(segments.next())?;
        let micro = parse_segment(segments.next())?;
        let qualifier = segments.next().unwrap_or_default().to_string();

        Ok(Self {
            major,
            minor,
            micro,
            qualifier,
        })
    }

    /// Returns `true` if this is the `0.0.0` wildcard sentinel.
    pub fn is_wildcard(&self) -> bool {
        *self == Self::wildcard()
    }

    /// Returns `true` if the qualifier marks this as a snapshot build.
    pub fn is_snapshot(&self) -> bool {
        self.qualifier.ends_with("SNAPSHOT")
    }

    /// The major segment.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// The minor segment.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The micro segment.
    pub fn micro(&self) -> u32 {
        self.micro
    }

    /// The qualifier segment, empty if none was specified.
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::new(input)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then(self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.micro.hash(state);
        self.qualifier.hash(state);
    }
}

/// A range of [`Version`]s, with independently inclusive/exclusive bounds.
///
/// An absent upper bound means unbounded above (`+∞`).
///
/// ## Examples
///
/// ```
/// use feat_types::{Version, VersionRange};
///
/// let range = VersionRange::parse("[1.0.0,2.0.0)").unwrap();
/// assert!(range.contains(&Version::new("1.5.0").unwrap()));
/// assert!(!range.contains(&Version::new("2.0.0").unwrap()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRange {
    low: Version,
    low_inclusive: bool,
    high: Option<Version>,
    high_inclusive: bool,
}

impl VersionRange {
    /// A range matching exactly one version.
    pub fn exact(version: Version) -> Self {
        Self {
            high: Some(version.clone()),
            low: version,
            low_inclusive: true,
            high_inclusive: true,
        }
    }

    /// A range matching `version` and anything newer, unbounded above.
    pub fn at_least(version: Version) -> Self {
        Self {
            low: version,
            low_inclusive: true,
            high: None,
            high_inclusive: false,
        }
    }

    /// A range matching anything strictly newer than `version`, unbounded
    /// above: `(version, +∞]`.
    ///
    /// This is the semantics used for conditional-feature triggers (see
    /// `ConditionalExpander`).
    pub fn since_exclusive(version: Version) -> Self {
        Self {
            low: version,
            low_inclusive: false,
            high: None,
            high_inclusive: true,
        }
    }

    /// A range matching every version.
    pub fn any() -> Self {
        Self::at_least(Version::wildcard())
    }

    /// Returns `true` if `version` falls within this range.
    pub fn contains(&self, version: &Version) -> bool {
        let low_ok = match self.low_inclusive {
            true => *version >= self.low,
            false => *version > self.low,
        };
        if !low_ok {
            return false;
        }
        match &self.high {
            None => true,
            Some(high) => match self.high_inclusive {
                true => *version <= *high,
                false => *version < *high,
            },
        }
    }

    /// Parses an OSGi-style interval (`[1.0,2.0)`, `(1.0,2.0]`, …) or a bare
    /// version, which is treated as [`VersionRange::at_least`].
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid interval or version.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "0.0.0" {
            return Ok(Self::any());
        }

        let first = trimmed.chars().next();
        if first != Some('[') && first != Some('(') {
            return Ok(Self::at_least(Version::new(trimmed)?));
        }

        let low_inclusive = first == Some('[');
        let last = trimmed.chars().next_back();
        let high_inclusive = last == Some(']');
        if last != Some(']') && last != Some(')') {
            return Err(Error::InvalidVersionRange(input.to_string()));
        }

        let inner = &trimmed[1..trimmed.len() - 1];
        let (low_str, high_str) = inner
            .split_once(',')
            .ok_or_else(|| Error::InvalidVersionRange(input.to_string()))?;
        let low = Version::new(low_str.trim())?;
        let high_str = high_str.trim();
        let high = if high_str.is_empty() {
            None
        } else {
            Some(Version::new(high_str)?)
        };

        Ok(Self {
            low,
            low_inclusive,
            high,
            high_inclusive,
        })
    }

    /// The lower bound of the range.
    pub fn low(&self) -> &Version {
        &self.low
    }

    /// The upper bound of the range, if any.
    pub fn high(&self) -> Option<&Version> {
        self.high.as_ref()
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.low_inclusive { '[' } else { '(' })?;
        write!(f, "{}", self.low)?;
        write!(f, ",")?;
        if let Some(high) = &self.high {
            write!(f, "{high}")?;
        }
        write!(f, "{}", if self.high_inclusive { ']' } else { ')' })
    }
}

/// A single segment transform in a [`RangeMacro`] mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SegmentOp {
    /// Keep the segment unchanged.
    Keep,
    /// Increment the segment by one.
    Increment,
    /// Zero the segment out.
    Zero,
}

impl SegmentOp {
    fn from_char(c: char) -> Result<Self, Error> {
        match c {
            '=' => Ok(Self::Keep),
            '+' => Ok(Self::Increment),
            '0' => Ok(Self::Zero),
            _ => Err(Error::InvalidRangeMacro(c.to_string())),
        }
    }
}

/// A version-range "macro": a compact mask describing how to derive a
/// [`VersionRange`] from a concrete [`Version`].
///
/// Masks use the OSGi convention also used by Karaf-style feature
/// deployers: each half of the macro (before/after the comma) is up to
/// four characters wide, one per version segment (major, minor, micro,
/// qualifier); `=` keeps the segment, `+` increments it (only meaningful
/// for the three numeric segments), and `0` zeroes it. Segments beyond the
/// mask's length are treated as `0`.
///
/// ## Examples
///
/// ```
/// use feat_types::{RangeMacro, Version};
///
/// // "same major+minor, any patch" — the default bundle-update range.
/// let range_macro = RangeMacro::parse("[==,=+)").unwrap();
/// let range = range_macro.apply(&Version::new("1.2.3").unwrap());
/// assert!(range.contains(&Version::new("1.2.9").unwrap()));
/// assert!(!range.contains(&Version::new("1.3.0").unwrap()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeMacro {
    low_inclusive: bool,
    low_ops: [SegmentOp; 4],
    high_ops: [SegmentOp; 4],
    high_inclusive: bool,
}

impl RangeMacro {
    /// Parses a range macro string, e.g. `"[==,=+)"` or `"[====,====]"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the macro is malformed.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        let mut chars = trimmed.chars();
        let low_inclusive = match chars.next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(Error::InvalidRangeMacro(input.to_string())),
        };
        let high_inclusive = match trimmed.chars().next_back() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(Error::InvalidRangeMacro(input.to_string())),
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        let (low_mask, high_mask) = inner
            .split_once(',')
            .ok_or_else(|| Error::InvalidRangeMacro(input.to_string()))?;

        Ok(Self {
            low_inclusive,
            low_ops: parse_mask(low_mask)?,
            high_ops: parse_mask(high_mask)?,
            high_inclusive,
        })
    }

    /// Applies this macro to `version`, producing a concrete [`VersionRange`].
    pub fn apply(&self, version: &Version) -> VersionRange {
        VersionRange {
            low: apply_mask(&self.low_ops, version),
            low_inclusive: self.low_inclusive,
            high: Some(apply_mask(&self.high_ops, version)),
            high_inclusive: self.high_inclusive,
        }
    }
}

fn parse_mask(mask: &str) -> Result<[SegmentOp; 4], Error> {
    let mut ops = [SegmentOp::Zero; 4];
    for (i, c) in mask.trim().chars().enumerate() {
        if i >= 4 {
            return Err(Error::InvalidRangeMacro(mask.to_string()));
        }
        ops[i] = SegmentOp::from_char(c)?;
    }
    Ok(ops)
}

fn apply_mask(ops: &[SegmentOp; 4], version: &Version) -> Version {
    let numeric = [version.major, version.minor, version.micro];
    let mut out = [0u32; 3];
    for (i, value) in numeric.into_iter().enumerate() {
        out[i] = match ops[i] {
            SegmentOp::Keep => value,
            SegmentOp::Increment => value + 1,
            SegmentOp::Zero => 0,
        };
    }
    let qualifier = match ops[3] {
        SegmentOp::Keep => version.qualifier.clone(),
        SegmentOp::Increment | SegmentOp::Zero => String::new(),
    };
    Version::from_parts(out[0], out[1], out[2], qualifier)
}
