//! The catalog: a cached view over a set of root repositories and the
//! features they transitively reference.

use std::collections::{BTreeMap, BTreeSet};

use feat_types::Feature;

use crate::{Error, Event, FeatureIndex, FeatureMatcher, RepositoryLoader};

/// A cached, queryable view over a set of root repository URIs and every
/// repository they transitively reference.
///
/// `L` is the [`RepositoryLoader`] that resolves a URI to its parsed
/// contents; production deployments supply one backed by a repository XML
/// parser, tests and the CLI use [`crate::FsRepositoryLoader`].
pub struct Catalog<L> {
    loader: L,
    roots: Vec<String>,
    repositories: BTreeMap<String, feat_types::Repository>,
    index: Option<FeatureIndex>,
    listeners: Vec<Box<dyn Fn(&Event) + Send>>,
}

impl<L: std::fmt::Debug> std::fmt::Debug for Catalog<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("loader", &self.loader)
            .field("roots", &self.roots)
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .field("index_cached", &self.index.is_some())
            .finish()
    }
}

impl<L: RepositoryLoader> Catalog<L> {
    /// Creates an empty catalog backed by `loader`.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            roots: Vec::new(),
            repositories: BTreeMap::new(),
            index: None,
            listeners: Vec::new(),
        }
    }

    /// The currently registered root repository URIs, in registration
    /// order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Registers `uri` as a root repository.
    ///
    /// A no-op if `uri` is already a root. Invalidates the cached feature
    /// index and emits [`Event::RepositoryAdded`] to every listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the loader fails to resolve `uri`.
    pub fn add_repository(&mut self, uri: &str) -> Result<(), Error> {
        if self.roots.iter().any(|root| root == uri) {
            return Ok(());
        }
        if !self.repositories.contains_key(uri) {
            let repository = self.loader.load(uri)?;
            self.repositories.insert(uri.to_string(), repository);
        }
        self.roots.push(uri.to_string());
        self.index = None;
        self.notify(Event::RepositoryAdded {
            uri: uri.to_string(),
            replayed: false,
        });
        Ok(())
    }

    /// Removes `uri` as a root repository, and evicts from the cache every
    /// repository that was only reachable through it.
    ///
    /// A no-op if `uri` is not currently a root.
    pub fn remove_repository(&mut self, uri: &str) {
        let Some(position) = self.roots.iter().position(|root| root == uri) else {
            return;
        };
        self.roots.remove(position);

        let reachable = reachable_from(&self.roots, &self.repositories);
        self.repositories
            .retain(|cached_uri, _| reachable.contains(cached_uri));

        self.index = None;
        self.notify(Event::RepositoryRemoved {
            uri: uri.to_string(),
            replayed: false,
        });
    }

    /// Returns the feature index: every known feature, keyed by name then
    /// version, lazily (re)built by a worklist traversal of
    /// `referencedRepositories` starting from the current roots.
    ///
    /// Cached until the next [`Self::add_repository`] or
    /// [`Self::remove_repository`] call.
    ///
    /// # Errors
    ///
    /// Returns an error if the loader fails to resolve a referenced
    /// repository.
    pub fn features(&mut self) -> Result<&FeatureIndex, Error> {
        if self.index.is_none() {
            let index = self.build_index()?;
            self.index = Some(index);
        }
        Ok(self.index.as_ref().expect("index populated above"))
    }

    /// Looks up a single feature by name and version spec (see
    /// [`FeatureMatcher::find`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be built, the name is unknown,
    /// or no version satisfies `version_spec`.
    pub fn find_feature(&mut self, name: &str, version_spec: &str) -> Result<Feature, Error> {
        let index = self.features()?;
        FeatureMatcher::find(index, name, version_spec).cloned()
    }

    /// Registers a listener for catalog events.
    ///
    /// Immediately replays a [`Event::RepositoryAdded`] (with
    /// `replayed: true`) for every currently-registered root, so a new
    /// listener can catch up on prior state.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        for uri in &self.roots {
            listener(&Event::RepositoryAdded {
                uri: uri.clone(),
                replayed: true,
            });
        }
        self.listeners.push(Box::new(listener));
    }

    fn notify(&self, event: Event) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    fn build_index(&mut self) -> Result<FeatureIndex, Error> {
        let mut visited = BTreeSet::new();
        let mut worklist: Vec<String> = self.roots.clone();
        let mut load_order = Vec::new();

        while let Some(uri) = worklist.pop() {
            if !visited.insert(uri.clone()) {
                continue;
            }
            if !self.repositories.contains_key(&uri) {
                let repository = self.loader.load(&uri)?;
                self.repositories.insert(uri.clone(), repository);
            }
            load_order.push(uri.clone());
            let referenced = self.repositories[&uri].referenced_repositories.clone();
            for next in referenced {
                if !visited.contains(&next) {
                    worklist.push(next);
                }
            }
        }

        let mut index: FeatureIndex = BTreeMap::new();
        for uri in load_order {
            for feature in &self.repositories[&uri].features {
                index
                    .entry(feature.name.clone())
                    .or_default()
                    .insert(feature.version.clone(), feature.clone());
            }
        }
        Ok(index)
    }
}

/// The set of URIs reachable from `roots` by following `referencedRepositories`
/// edges among the entries present in `repositories`.
fn reachable_from(
    roots: &[String],
    repositories: &BTreeMap<String, feat_types::Repository>,
) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut worklist: Vec<String> = roots.to_vec();
    while let Some(uri) = worklist.pop() {
        if !seen.insert(uri.clone()) {
            continue;
        }
        if let Some(repository) = repositories.get(&uri) {
            for next in &repository.referenced_repositories {
                if !seen.contains(next) {
                    worklist.push(next.clone());
                }
            }
        }
    }
    seen
}
