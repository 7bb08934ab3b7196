//! Durable, crash-safe persistence of [`EngineState`].

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use feat_types::{FeatureId, ModuleId, ModuleLocation};
use serde::{Deserialize, Serialize};

use crate::Error;

const LOCK_FILE_NAME: &str = "engine.lck";
const STATE_FILE_NAME: &str = "engine-state.json";

/// The engine's persisted state: the five fields enumerated in the module
/// documentation, round-tripped losslessly across restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// The features the user asked to have installed.
    pub required_features: BTreeSet<FeatureId>,
    /// The features that were actually resolved and deployed.
    pub installed_features: BTreeSet<FeatureId>,
    /// Modules whose lifecycle the engine owns.
    pub managed_modules: BTreeSet<ModuleId>,
    /// Content fingerprints for updateable modules.
    pub module_checksums: BTreeMap<ModuleLocation, u64>,
    /// Whether the initial boot feature set has been deployed.
    pub boot_done: bool,
}

/// A file-based lock preventing two [`StateStore`]s from writing the same
/// state directory concurrently.
///
/// Mirrors the lock-file-plus-`Drop` discipline used for on-disk database
/// access elsewhere in this workspace's lineage: acquire with
/// `create_new`, release by deleting the file when the lock is dropped.
#[derive(Debug)]
struct StateLock {
    path: PathBuf,
}

impl StateLock {
    fn acquire(directory: &Path) -> Result<Self, Error> {
        let path = directory.join(LOCK_FILE_NAME);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::StateLocked(path.clone())
                } else {
                    Error::IoPath {
                        path: path.clone(),
                        context: "acquiring engine state lock".to_string(),
                        source,
                    }
                }
            })?;
        Ok(Self { path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Loads and atomically persists [`EngineState`] in a directory.
#[derive(Debug)]
pub struct StateStore {
    directory: PathBuf,
    state_path: PathBuf,
    _lock: StateLock,
}

impl StateStore {
    /// Opens (creating if necessary) the state directory at `directory`,
    /// acquiring its lock for the lifetime of the returned store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock is
    /// already held by another process.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, Error> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| Error::IoPath {
            path: directory.clone(),
            context: "creating engine state directory".to_string(),
            source,
        })?;
        let lock = StateLock::acquire(&directory)?;
        let state_path = directory.join(STATE_FILE_NAME);
        Ok(Self {
            directory,
            state_path,
            _lock: lock,
        })
    }

    /// Loads the persisted state, or [`EngineState::default`] if none
    /// exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<EngineState, Error> {
        if !self.state_path.exists() {
            return Ok(EngineState::default());
        }
        let contents = fs::read_to_string(&self.state_path).map_err(|source| Error::IoPath {
            path: self.state_path.clone(),
            context: "reading engine state".to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| Error::InvalidState {
            path: self.state_path.clone(),
            source,
        })
    }

    /// Atomically persists `state`: writes to a temporary file in the same
    /// directory, then renames it over the state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or the
    /// rename fails.
    pub fn save(&self, state: &EngineState) -> Result<(), Error> {
        let serialized = serde_json::to_string_pretty(state).expect("EngineState always serializes");
        let temp_path = self.directory.join(format!("{STATE_FILE_NAME}.tmp"));
        fs::write(&temp_path, serialized).map_err(|source| Error::IoPath {
            path: temp_path.clone(),
            context: "writing engine state".to_string(),
            source,
        })?;
        fs::rename(&temp_path, &self.state_path).map_err(|source| Error::IoPath {
            path: self.state_path.clone(),
            context: "renaming engine state into place".to_string(),
            source,
        })
    }
}
