//! Engine tunables.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The engine's configurable tunables.
///
/// All fields default to the values the module design calls
/// compile-time constants; [`EngineConfig::load`] lets tests and the CLI
/// override them from a TOML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recompute and apply checksums for updateable (snapshot or
    /// non-`mvn:`) resources during planning.
    pub update_snapshots: bool,
    /// Skip refresh-expansion for unmanaged modules (reserved for a future
    /// refresh-expansion phase; the reference executor does not implement
    /// refresh widening yet).
    pub no_refresh_unmanaged: bool,
    /// Skip refresh-expansion for managed modules.
    pub no_refresh_managed: bool,
    /// Skip the refresh phase entirely.
    pub no_refresh: bool,
    /// The range macro applied to an explicit target feature version to
    /// determine its acceptable match range.
    pub feature_resolution_range: String,
    /// The range macro applied to an unmatched resource's version to
    /// determine which live modules it may be rehomed against.
    pub bundle_update_range: String,
    /// Mirror log lines to stdout via the CLI's `TermLogger`.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_snapshots: true,
            no_refresh_unmanaged: true,
            no_refresh_managed: true,
            no_refresh: false,
            feature_resolution_range: "[====,====]".to_string(),
            bundle_update_range: "[==,=+)".to_string(),
            verbose: false,
        }
    }
}

impl EngineConfig {
    /// Loads a config from a TOML file at `path`, defaulting any field the
    /// file omits.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read or does not parse as
    /// valid TOML matching this shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::IoPath {
            path: path.to_path_buf(),
            context: "reading configuration file".to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| Error::InvalidConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}
