//! The public facade: catalog mutation, install/uninstall, and the
//! deployment pipeline that ties the resolver, planner, and executor
//! together under a single process-wide lock.

use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
};

use feat_catalog::{Catalog, RepositoryLoader};
use feat_solve::{bundle_identity, ConditionalExpander, GreedyResolver, ResolveOutput, ResolveRequest, Resolver};
use feat_types::{Conditional, FeatureId, ModuleId, Resource, StaticStreamProvider, StreamProvider};
use log::{info, warn};

use crate::{
    DeploymentExecutor, DeploymentPlan, DeploymentPlanner, EngineConfig, EngineState, Error, Event, ExecutionReport,
    Listener, ModuleHost, StateStore,
};

/// Supplies a [`feat_types::StreamProvider`] for a bundle location.
///
/// This is the engine's bridge to whatever actually fetches module content
/// (a Maven repository, a local file, ...), which is out of scope the same
/// way [`crate::ModuleHost`] is: the engine only ever calls it.
pub type ContentResolver = Arc<dyn Fn(&str) -> Arc<dyn StreamProvider> + Send + Sync>;

/// A [`ContentResolver`] for tests and the CLI: synthesizes deterministic
/// content from the location string itself, so repeated resolves of an
/// unchanged catalog produce a stable checksum.
pub fn synthetic_content_resolver() -> ContentResolver {
    Arc::new(|location: &str| -> Arc<dyn StreamProvider> { Arc::new(StaticStreamProvider::new(location.as_bytes().to_vec())) })
}

struct EngineInner<L: RepositoryLoader> {
    catalog: Catalog<L>,
    state: EngineState,
}

/// The feature resolution and deployment engine.
///
/// `L` is the catalog's [`RepositoryLoader`]; `H` is the runtime's
/// [`ModuleHost`]. Both are the engine's declared external collaborators
/// and are expected to be supplied by the embedding application.
pub struct Engine<L: RepositoryLoader, H: ModuleHost> {
    inner: Mutex<EngineInner<L>>,
    host: Arc<H>,
    store: StateStore,
    config: EngineConfig,
    content: ContentResolver,
    engine_module: Option<ModuleId>,
    listeners: Mutex<Vec<Listener>>,
}

impl<L: RepositoryLoader, H: ModuleHost> std::fmt::Debug for Engine<L, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish_non_exhaustive()
    }
}

/// The outcome of one worker-thread deployment cycle, computed entirely
/// off the engine lock.
struct DeploymentOutcome {
    required: BTreeSet<FeatureId>,
    resources: Vec<Resource>,
    plan: DeploymentPlan,
    report: ExecutionReport,
}

impl<L, H> Engine<L, H>
where
    L: RepositoryLoader,
    H: ModuleHost + Send + Sync + 'static,
{
    /// Opens an engine backed by `loader` and `host`, loading any persisted
    /// state from `state_directory`.
    ///
    /// `engine_module`, if given, identifies the engine's own module so the
    /// start phase always starts it last.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be opened or its
    /// lock is already held.
    pub fn new(
        loader: L,
        host: Arc<H>,
        content: ContentResolver,
        state_directory: impl Into<PathBuf>,
        config: EngineConfig,
        engine_module: Option<ModuleId>,
    ) -> Result<Self, Error> {
        let store = StateStore::open(state_directory)?;
        let state = store.load()?;
        Ok(Self {
            inner: Mutex::new(EngineInner {
                catalog: Catalog::new(loader),
                state,
            }),
            host,
            store,
            config,
            content,
            engine_module,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// The engine's underlying module host, for callers (tests, the CLI)
    /// that need to inspect runtime state directly.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Registers `uri` as a root repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog's loader fails to resolve `uri`.
    pub fn add_repository(&self, uri: &str) -> Result<(), Error> {
        let is_new = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let was_root = inner.catalog.roots().iter().any(|root| root == uri);
            inner.catalog.add_repository(uri)?;
            !was_root
        };
        if is_new {
            self.notify(&Event::RepositoryAdded {
                uri: uri.to_string(),
                replayed: false,
            });
        }
        Ok(())
    }

    /// Removes `uri` as a root repository.
    pub fn remove_repository(&self, uri: &str) {
        let was_root = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let was_root = inner.catalog.roots().iter().any(|root| root == uri);
            inner.catalog.remove_repository(uri);
            was_root
        };
        if was_root {
            self.notify(&Event::RepositoryRemoved {
                uri: uri.to_string(),
                replayed: false,
            });
        }
    }

    /// Returns every currently installed feature id.
    pub fn list(&self) -> Vec<FeatureId> {
        let inner = self.inner.lock().expect("engine lock poisoned");
        inner.state.installed_features.iter().cloned().collect()
    }

    /// Registers a listener, immediately replaying a `replayed: true`
    /// event for every currently registered root repository and installed
    /// feature.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        let boxed: Listener = Box::new(listener);
        {
            let inner = self.inner.lock().expect("engine lock poisoned");
            for uri in inner.catalog.roots() {
                boxed(&Event::RepositoryAdded {
                    uri: uri.clone(),
                    replayed: true,
                });
            }
            for id in &inner.state.installed_features {
                boxed(&Event::FeatureInstalled {
                    id: id.clone(),
                    replayed: true,
                });
            }
        }
        self.listeners.lock().expect("listener lock poisoned").push(boxed);
    }

    /// Adds `spec` (`name[/version]`) to the required feature set and
    /// deploys.
    ///
    /// A wildcard version resolves to the catalog's highest-versioned
    /// feature named `spec`. Deploying an already-required feature is a
    /// no-op at the module level: the resolver and planner still run, but
    /// produce an empty plan.
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` cannot be found or the deployment fails.
    pub fn install(&self, spec: &str) -> Result<(), Error> {
        let target_id = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let id = FeatureId::parse(spec)?;
            let version_spec = if id.is_wildcard_version() {
                String::new()
            } else {
                id.version().to_string()
            };
            let feature = inner.catalog.find_feature(id.name(), &version_spec)?;
            feature.id()
        };
        info!("installing {target_id}");
        self.deploy(|required| {
            required.insert(target_id);
        })
    }

    /// Removes `spec` from the required feature set and deploys.
    ///
    /// A wildcard version matches any installed version of the name; if
    /// more than one is installed, returns [`Error::AmbiguousUninstall`].
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` is not currently required, is ambiguous,
    /// or the deployment fails.
    pub fn uninstall(&self, spec: &str) -> Result<(), Error> {
        let id = FeatureId::parse(spec)?;
        let target_id = {
            let inner = self.inner.lock().expect("engine lock poisoned");
            if id.is_wildcard_version() {
                let matches: Vec<FeatureId> = inner
                    .state
                    .required_features
                    .iter()
                    .filter(|candidate| candidate.name() == id.name())
                    .cloned()
                    .collect();
                match matches.len() {
                    0 => return Err(Error::NotFound(id.name().to_string())),
                    1 => matches.into_iter().next().expect("length checked above"),
                    _ => return Err(Error::AmbiguousUninstall(id.name().to_string())),
                }
            } else if inner.state.required_features.contains(&id) {
                id
            } else {
                return Err(Error::NotFound(spec.to_string()));
            }
        };
        info!("uninstalling {target_id}");
        self.deploy(move |required| {
            required.remove(&target_id);
        })
    }

    fn notify(&self, event: &Event) {
        for listener in self.listeners.lock().expect("listener lock poisoned").iter() {
            listener(event);
        }
    }

    /// Runs the full resolve → conditional-expand → plan → execute
    /// pipeline for the required set produced by applying `mutate` to a
    /// snapshot of the current required set, then commits state.
    ///
    /// Phases 1-4 and 7-9 run on a dedicated `feat-deploy-worker` thread,
    /// which this call blocks on; phase 5 (state commit) runs back on the
    /// engine lock once the worker returns. This workspace commits state
    /// after the full executor run rather than between phases 4 and 7 — a
    /// documented simplification of the reference executor (see
    /// `DESIGN.md`).
    fn deploy(&self, mutate: impl FnOnce(&mut BTreeSet<FeatureId>)) -> Result<(), Error> {
        let (mut required, feature_index, managed_modules, module_checksums) = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let index = inner.catalog.features()?.clone();
            (
                inner.state.required_features.clone(),
                index,
                inner.state.managed_modules.clone(),
                inner.state.module_checksums.clone(),
            )
        };
        mutate(&mut required);

        let host = Arc::clone(&self.host);
        let content = Arc::clone(&self.content);
        let config = self.config.clone();
        let engine_module = self.engine_module;
        let required_for_worker = required.clone();

        let handle = thread::Builder::new()
            .name("feat-deploy-worker".to_string())
            .spawn(move || -> Result<DeploymentOutcome, Error> {
                let request = ResolveRequest {
                    target_feature_ids: required_for_worker.clone(),
                    overrides: BTreeSet::new(),
                    system_capabilities: Vec::new(),
                    feature_resolution_range: config.feature_resolution_range.clone(),
                };
                let resolver = GreedyResolver::new(&feature_index, |location: &str| (content)(location));
                let mut output = resolver.resolve(&request)?;
                expand_conditionals(&mut output, &content);

                let live_modules = host.modules();
                let plan = DeploymentPlanner::plan(
                    &output.resources,
                    &live_modules,
                    &managed_modules,
                    &module_checksums,
                    config.update_snapshots,
                    &config.bundle_update_range,
                    &output.stream_providers,
                )?;
                let report = DeploymentExecutor::execute(host.as_ref(), &plan, &output.stream_providers, engine_module, config.no_refresh)?;

                Ok(DeploymentOutcome {
                    required: required_for_worker,
                    resources: output.resources,
                    plan,
                    report,
                })
            })
            .map_err(|source| Error::IoPath {
                path: PathBuf::from("feat-deploy-worker"),
                context: "spawning deployment worker thread".to_string(),
                source,
            })?;

        let outcome = handle.join().expect("feat-deploy-worker panicked")?;
        self.commit(outcome)
    }

    fn commit(&self, outcome: DeploymentOutcome) -> Result<(), Error> {
        let DeploymentOutcome {
            required,
            resources,
            plan,
            report,
        } = outcome;

        let installed_features: BTreeSet<FeatureId> = resources
            .iter()
            .filter(|resource| resource.is_feature_namespaced())
            .map(|resource| {
                FeatureId::new(
                    resource.feature_name.clone().expect("feature-namespaced resource"),
                    resource.feature_version.clone().expect("feature-namespaced resource"),
                )
            })
            .collect();

        let mut managed_modules = {
            let inner = self.inner.lock().expect("engine lock poisoned");
            inner.state.managed_modules.clone()
        };
        for deleted in &plan.to_delete {
            managed_modules.remove(deleted);
        }
        managed_modules.extend(report.resource_to_module.values().copied());

        let previous_installed = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let previous = inner.state.installed_features.clone();

            let mut module_checksums = inner.state.module_checksums.clone();
            module_checksums.extend(report.new_checksums.clone());

            inner.state = EngineState {
                required_features: required,
                installed_features: installed_features.clone(),
                managed_modules,
                module_checksums,
                boot_done: true,
            };
            if let Err(source) = self.store.save(&inner.state) {
                warn!("failed to persist engine state: {source}");
            }
            previous
        };

        for id in installed_features.difference(&previous_installed) {
            self.notify(&Event::FeatureInstalled {
                id: id.clone(),
                replayed: false,
            });
        }
        for id in previous_installed.difference(&installed_features) {
            self.notify(&Event::FeatureUninstalled {
                id: id.clone(),
                replayed: false,
            });
        }

        if !report.start_failures.is_empty() {
            let failed: Vec<ModuleId> = report.start_failures.iter().map(|(id, _)| *id).collect();
            return Err(Error::StartFailures(failed.len(), failed));
        }
        Ok(())
    }
}

/// Implements the second resolver pass described for conditional
/// expansion (§4.3) without re-invoking the resolver on synthetic ids —
/// those never exist in the catalog. Instead, each triggered conditional's
/// bundles and feature-namespace marker are appended directly to the
/// already-resolved output.
fn expand_conditionals(output: &mut ResolveOutput, content: &ContentResolver) {
    let initial: BTreeSet<FeatureId> = output.installed_features.iter().map(|(id, _)| id.clone()).collect();
    let expanded = ConditionalExpander::expand(&initial, &output.installed_features);
    if expanded.len() == initial.len() {
        return;
    }

    let installed_snapshot = output.installed_features.clone();
    for (parent_id, feature) in &installed_snapshot {
        for (index, conditional) in feature.conditionals.iter().enumerate() {
            let synthetic = Conditional::synthetic_id(parent_id, index);
            if !expanded.contains(&synthetic) {
                continue;
            }
            output.resources.push(Resource::feature_namespace(synthetic.name(), synthetic.version().clone()));
            for bundle in &conditional.bundles {
                let (symbolic_name, version) = bundle_identity(&bundle.location);
                let mut resource = Resource::module(symbolic_name, version, bundle.location.clone());
                resource.start_level = bundle.start_level;
                output.resources.push(resource);
                output
                    .stream_providers
                    .entry(bundle.location.clone())
                    .or_insert_with(|| content(&bundle.location));
            }
        }
    }
}
