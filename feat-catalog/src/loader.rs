//! Repository loading.
//!
//! Parsing a repository's wire format (XML in production deployments) is an
//! external collaborator's job; this crate only consumes already-parsed
//! [`feat_types::Repository`] values behind the [`RepositoryLoader`] trait.

use std::{fs, path::PathBuf};

use feat_types::Repository;

use crate::Error;

/// Resolves a repository URI to its parsed contents.
///
/// Implementations are free to cache, fetch over the network, or read from
/// disk; the catalog calls this once per URI and caches the result itself.
pub trait RepositoryLoader {
    /// Loads the repository identified by `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if `uri` cannot be resolved or its contents cannot
    /// be parsed.
    fn load(&self, uri: &str) -> Result<Repository, Error>;
}

/// A [`RepositoryLoader`] that reads pre-parsed repository documents from a
/// directory of `*.json` files, keyed by file stem.
///
/// Intended for tests and the CLI, standing in for the XML parser a
/// production deployment of this engine would use.
#[derive(Clone, Debug)]
pub struct FsRepositoryLoader {
    root: PathBuf,
}

impl FsRepositoryLoader {
    /// Creates a loader rooted at `root`, a directory containing one
    /// `<uri>.json` file per repository.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, uri: &str) -> PathBuf {
        self.root.join(format!("{uri}.json"))
    }
}

impl RepositoryLoader for FsRepositoryLoader {
    fn load(&self, uri: &str) -> Result<Repository, Error> {
        let path = self.path_for(uri);
        let contents = fs::read_to_string(&path).map_err(|source| Error::IoPath {
            path: path.clone(),
            context: "reading repository document".to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| Error::InvalidDocument { path, source })
    }
}

#[cfg(test)]
mod tests {
    use feat_types::{Feature, Version};
    use tempfile::tempdir;
    use testresult::TestResult;

    use super::*;
    use rstest::rstest;

    #[rstest]
    fn loads_repository_document_by_uri() -> TestResult {
        let dir = tempdir()?;
        let repo = Repository {
            uri: "base".to_string(),
            name: Some("Base Repository".to_string()),
            referenced_repositories: vec![],
            features: vec![Feature {
                name: "webconsole".to_string(),
                version: Version::new("1.0.0")?,
                bundles: vec![],
                dependencies: vec![],
                conditionals: vec![],
                configurations: vec![],
            }],
        };
        fs::write(dir.path().join("base.json"), serde_json::to_string(&repo)?)?;

        let loader = FsRepositoryLoader::new(dir.path());
        let loaded = loader.load("base")?;
        assert_eq!(loaded.features.len(), 1);
        Ok(())
    }

    #[rstest]
    fn missing_document_is_an_io_error() {
        let dir = tempdir().unwrap();
        let loader = FsRepositoryLoader::new(dir.path());
        assert!(loader.load("missing").is_err());
    }
}
