//! The resolver contract and a greedy reference implementation.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use feat_catalog::{FeatureIndex, FeatureMatcher};
use feat_types::{Feature, FeatureId, RangeMacro, Resource, StreamProvider, Version};

use crate::Error;

/// The resolver's input.
#[derive(Clone, Debug)]
pub struct ResolveRequest {
    /// The features the caller wants installed, by identifier (a wildcard
    /// version means "any version the catalog can satisfy").
    pub target_feature_ids: BTreeSet<FeatureId>,
    /// Bundle locations that should replace any walked bundle sharing the
    /// same derived symbolic name.
    pub overrides: BTreeSet<String>,
    /// Resources already available on the runtime; passed through to the
    /// output without being walked for further dependencies.
    pub system_capabilities: Vec<Resource>,
    /// The range macro (see [`feat_types::RangeMacro`]) applied to an
    /// explicit target version to determine the acceptable match range.
    pub feature_resolution_range: String,
}

/// The resolver's output.
#[derive(Clone, Debug)]
pub struct ResolveOutput {
    /// Every resource in the resolved set: feature-namespaced entries for
    /// each installed feature, plus a module entry for every bundle they
    /// contribute.
    pub resources: Vec<Resource>,
    /// A stream provider for every resource that carries a `uri`, keyed by
    /// that `uri`.
    pub stream_providers: BTreeMap<String, Arc<dyn StreamProvider>>,
    /// The concrete features that were walked to produce `resources`,
    /// keyed by id. Used by [`crate::ConditionalExpander`] for the second
    /// pass.
    pub installed_features: Vec<(FeatureId, Feature)>,
}

/// Resolves a target feature set into installable resources.
///
/// This is the engine's declared external collaborator: production
/// deployments are expected to substitute an implementation backed by a
/// real OSGi/Maven resolver. [`GreedyResolver`] is the reference
/// implementation used by the CLI and this workspace's tests.
pub trait Resolver {
    /// Resolves `request` into a [`ResolveOutput`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unresolvable`] if a target or transitive dependency
    /// cannot be satisfied from the catalog.
    fn resolve(&self, request: &ResolveRequest) -> Result<ResolveOutput, Error>;
}

/// Derives a `(symbolic_name, version)` identity from a bundle location.
///
/// Bundle content resolution (reading a manifest to learn its real
/// symbolic name and version) is itself an external concern; this
/// convention — strip a leading URI scheme, then read the last two
/// `/`-separated segments as `name` and `version` — is what
/// [`GreedyResolver`] uses so that its output is internally consistent
/// without depending on a bundle format parser.
pub fn bundle_identity(location: &str) -> (String, Version) {
    let path = location.rsplit(':').next().unwrap_or(location);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some((last, rest)) = segments.split_last() {
        if let Ok(version) = Version::new(last) {
            if let Some(name) = rest.last() {
                return ((*name).to_string(), version);
            }
        }
    }
    (location.to_string(), Version::wildcard())
}

/// A transitive dependency walk over a [`FeatureIndex`], picking the
/// highest version satisfying each constraint.
///
/// `content` supplies a [`StreamProvider`] for a bundle's `uri`; production
/// callers back it with a real content transport, tests back it with
/// [`feat_types::StaticStreamProvider`].
pub struct GreedyResolver<'c, F> {
    index: &'c FeatureIndex,
    content: F,
}

impl<'c, F> std::fmt::Debug for GreedyResolver<'c, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreedyResolver").finish_non_exhaustive()
    }
}

impl<'c, F> GreedyResolver<'c, F>
where
    F: Fn(&str) -> Arc<dyn StreamProvider>,
{
    /// Creates a resolver walking `index`, opening bundle content through
    /// `content`.
    pub fn new(index: &'c FeatureIndex, content: F) -> Self {
        Self { index, content }
    }

    fn resolve_target(&self, name: &str, version: &Version, macro_str: &str) -> Result<Feature, Error> {
        let spec = if version.is_wildcard() {
            String::new()
        } else {
            RangeMacro::parse(macro_str)?.apply(version).to_string()
        };
        FeatureMatcher::find(self.index, name, &spec)
            .map(Clone::clone)
            .map_err(|source| Error::Unresolvable(source.to_string()))
    }

    fn resolve_dependency(&self, name: &str, range_spec: &str) -> Result<Feature, Error> {
        FeatureMatcher::find(self.index, name, range_spec)
            .map(Clone::clone)
            .map_err(|source| Error::Unresolvable(source.to_string()))
    }
}

impl<'c, F> Resolver for GreedyResolver<'c, F>
where
    F: Fn(&str) -> Arc<dyn StreamProvider>,
{
    fn resolve(&self, request: &ResolveRequest) -> Result<ResolveOutput, Error> {
        let mut installed_features: Vec<(FeatureId, Feature)> = Vec::new();
        let mut visited = BTreeSet::new();
        let mut worklist: Vec<Feature> = Vec::new();

        for target in &request.target_feature_ids {
            let feature = self.resolve_target(target.name(), target.version(), &request.feature_resolution_range)?;
            worklist.push(feature);
        }

        while let Some(feature) = worklist.pop() {
            let id = feature.id();
            if !visited.insert(id.clone()) {
                continue;
            }
            for dependency in feature.dependencies.clone() {
                let resolved = self.resolve_dependency(dependency.name(), &dependency.range().to_string())?;
                if !visited.contains(&resolved.id()) {
                    worklist.push(resolved);
                }
            }
            installed_features.push((id, feature));
        }

        // Keyed by `location`, the primary identity across merges from
        // multiple features (two bundles at the same location are the
        // same reference, last one walked wins; two bundles that merely
        // share a derived symbolic name are distinct and both survive).
        let mut bundle_locations: BTreeMap<String, (bool, Option<u32>)> = BTreeMap::new();
        for (_, feature) in &installed_features {
            for bundle in &feature.bundles {
                bundle_locations.insert(bundle.location.clone(), (bundle.dependency, bundle.start_level));
            }
        }
        for override_location in &request.overrides {
            let (override_name, _) = bundle_identity(override_location);
            bundle_locations.retain(|location, _| bundle_identity(location).0 != override_name);
            bundle_locations.insert(override_location.clone(), (false, None));
        }

        let mut resources: Vec<Resource> = request.system_capabilities.clone();
        let mut stream_providers = BTreeMap::new();

        for (id, _) in &installed_features {
            resources.push(Resource::feature_namespace(id.name(), id.version().clone()));
        }
        for (location, (_dependency, start_level)) in &bundle_locations {
            let (symbolic_name, version) = bundle_identity(location);
            let mut resource = Resource::module(symbolic_name, version, location.clone());
            resource.start_level = *start_level;
            resources.push(resource);
            stream_providers.insert(location.clone(), (self.content)(location));
        }

        Ok(ResolveOutput {
            resources,
            stream_providers,
            installed_features,
        })
    }
}
