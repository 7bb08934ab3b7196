//! Enacting a [`DeploymentPlan`] against a [`ModuleHost`], in the mandatory
//! phase order.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use feat_types::{ModuleId, ModuleLocation, StreamProvider};
use log::{debug, error, warn};

use crate::{DeploymentPlan, Error, ModuleHost, ModuleState};

/// The result of executing a [`DeploymentPlan`].
#[derive(Clone, Debug, Default)]
pub struct ExecutionReport {
    /// Modules that were refreshed.
    pub refreshed: Vec<ModuleId>,
    /// Modules that were started successfully.
    pub started: Vec<ModuleId>,
    /// Modules that failed to start, with their errors rendered to a
    /// string (the underlying host errors are not required to be `Clone`).
    pub start_failures: Vec<(ModuleId, String)>,
    /// Checksums computed for updated and newly installed resources.
    pub new_checksums: BTreeMap<ModuleLocation, u64>,
    /// The resource-to-module mapping from the plan, extended with newly
    /// installed modules.
    pub resource_to_module: BTreeMap<(String, feat_types::Version), ModuleId>,
}

/// Runs a [`DeploymentPlan`] against a [`ModuleHost`] in the order phases
/// 1-4 and 7-9 require: stop, uninstall, update, install, refresh-expand,
/// refresh, start.
///
/// State commit (phase 5) and configuration installation (phase 6) are the
/// caller's responsibility (see [`crate::Engine`]): the executor holds no
/// lock on engine state and operates purely against the host and a
/// snapshot plan.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeploymentExecutor;

impl DeploymentExecutor {
    /// Executes `plan` against `host`.
    ///
    /// `stream_providers` supplies content for update and install phases.
    /// `no_refresh` skips phase 8 entirely (`EngineConfig::no_refresh`):
    /// updated and installed modules still reach `to_start`, but no
    /// `ModuleHost::refresh` call is made and the modules a refresh would
    /// otherwise have stopped and restarted are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-start module operation fails. Start
    /// failures are collected into the returned [`ExecutionReport`] instead
    /// of aborting the batch.
    pub fn execute(
        host: &dyn ModuleHost,
        plan: &DeploymentPlan,
        stream_providers: &BTreeMap<String, Arc<dyn StreamProvider>>,
        engine_module: Option<ModuleId>,
        no_refresh: bool,
    ) -> Result<ExecutionReport, Error> {
        let mut report = ExecutionReport {
            new_checksums: plan.new_checksums.clone(),
            resource_to_module: plan.resource_to_module.clone(),
            ..Default::default()
        };
        let mut to_start: BTreeSet<ModuleId> = BTreeSet::new();
        let mut to_refresh: BTreeSet<ModuleId> = BTreeSet::new();

        // Phase 1: stop.
        let to_update_ids: BTreeSet<ModuleId> = plan.to_update.iter().map(|(id, _)| *id).collect();
        let mut to_stop: Vec<ModuleId> = to_update_ids.iter().chain(plan.to_delete.iter()).copied().collect();
        to_stop.retain(|id| {
            let info = host.modules().into_iter().find(|module| module.id == *id);
            match info {
                Some(info) => !info.state.is_terminal_or_stopping() && !info.is_fragment,
                None => false,
            }
        });
        stop_in_service_usage_order(host, &to_stop)?;

        // Phase 2: uninstall.
        for module_id in &plan.to_delete {
            debug!("uninstalling module {module_id}");
            host.uninstall(*module_id).map_err(|source| Error::ModuleOperation {
                module: *module_id,
                operation: "uninstall",
                source,
            })?;
            to_refresh.insert(*module_id);
        }

        // Phase 3: update.
        for (module_id, resource) in &plan.to_update {
            let uri = resource.uri.as_ref().expect("update resources carry a uri");
            let mut stream = open_stream(stream_providers, uri)?;
            debug!("updating module {module_id} from {uri}");
            host.update(*module_id, stream.as_mut()).map_err(|source| Error::ModuleOperation {
                module: *module_id,
                operation: "update",
                source,
            })?;
            if let Some(level) = resource.start_level {
                host.set_start_level(*module_id, level).map_err(|source| Error::ModuleOperation {
                    module: *module_id,
                    operation: "set_start_level",
                    source,
                })?;
            }
            to_refresh.insert(*module_id);
            to_start.insert(*module_id);
        }

        // Phase 4: install.
        for resource in &plan.to_install {
            let uri = resource.uri.clone().expect("install resources carry a uri");
            let mut stream = open_stream(stream_providers, &uri)?;
            debug!("installing {uri}");
            let module_id = host
                .install(&uri, stream.as_mut())
                .map_err(|source| Error::ModuleOperation {
                    module: ModuleId(0),
                    operation: "install",
                    source,
                })?;
            if let Some(level) = resource.start_level {
                host.set_start_level(module_id, level).map_err(|source| Error::ModuleOperation {
                    module: module_id,
                    operation: "set_start_level",
                    source,
                })?;
            }
            report
                .resource_to_module
                .insert((resource.symbolic_name.clone(), resource.version.clone()), module_id);
            to_start.insert(module_id);
            if resource.is_updateable() {
                // Checksums for freshly-installed resources are recorded
                // so the next deployment's pass 1 has a baseline to diff
                // against.
                if let Some(checksum) = plan.new_checksums.get(&ModuleLocation(uri.clone())) {
                    report.new_checksums.insert(ModuleLocation(uri), *checksum);
                }
            }
        }

        // Phases 7 is folded into the caller-visible refresh set here;
        // this reference executor does not widen toRefresh for optional
        // imports or fragment hosts (see module docs for why).
        let refresh_list: Vec<ModuleId> = to_refresh.into_iter().collect();

        // Phase 8: refresh.
        if !refresh_list.is_empty() && !no_refresh {
            let refresh_to_stop: Vec<ModuleId> = refresh_list
                .iter()
                .copied()
                .filter(|id| {
                    host.modules()
                        .into_iter()
                        .find(|module| module.id == *id)
                        .is_some_and(|module| !module.state.is_terminal_or_stopping() && !module.is_fragment)
                })
                .collect();
            stop_in_service_usage_order(host, &refresh_to_stop)?;
            to_start.extend(refresh_to_stop);

            debug!("refreshing {} module(s)", refresh_list.len());
            host.refresh(&refresh_list).map_err(|source| Error::ModuleOperation {
                module: refresh_list[0],
                operation: "refresh",
                source,
            })?;
            report.refreshed = refresh_list;
        }

        // Phase 9: start.
        let mut start_candidates: Vec<ModuleId> = to_start
            .into_iter()
            .filter(|id| {
                host.modules()
                    .into_iter()
                    .find(|module| module.id == *id)
                    .is_some_and(|module| !module.state.is_uninstalled_active_or_starting() && !module.is_fragment)
            })
            .collect();
        start_candidates.sort_by_key(|id| (!host.is_root_module(*id), id.0));
        if let Some(engine_id) = engine_module {
            start_candidates.retain(|id| *id != engine_id);
            start_candidates.push(engine_id);
        }

        for module_id in start_candidates {
            match host.start(module_id) {
                Ok(()) => {
                    debug!("started module {module_id}");
                    report.started.push(module_id);
                }
                Err(source) => {
                    warn!("module {module_id} failed to start: {source}");
                    report.start_failures.push((module_id, source.to_string()));
                }
            }
        }
        if !report.start_failures.is_empty() {
            error!("{} module(s) failed to start", report.start_failures.len());
        }

        Ok(report)
    }
}

fn open_stream<'a>(
    stream_providers: &'a BTreeMap<String, Arc<dyn StreamProvider>>,
    uri: &str,
) -> Result<Box<dyn std::io::Read + Send>, Error> {
    let provider = stream_providers
        .get(uri)
        .ok_or_else(|| Error::MissingStreamProvider(uri.to_string()))?;
    provider.open().map_err(|source| Error::ChecksumIo {
        uri: uri.to_string(),
        source,
    })
}

/// Stops `to_stop` in service-usage order: repeatedly stops the subset
/// whose services no other remaining member consumes, tie-breaking a full
/// deadlock by the lowest-ranked registered service.
fn stop_in_service_usage_order(host: &dyn ModuleHost, to_stop: &[ModuleId]) -> Result<(), Error> {
    let mut remaining: Vec<ModuleId> = to_stop.to_vec();

    while !remaining.is_empty() {
        let consumed_providers: BTreeSet<ModuleId> = remaining
            .iter()
            .flat_map(|module| host.consumed_providers(*module, &remaining))
            .collect();
        let mut stoppable: Vec<ModuleId> = remaining
            .iter()
            .copied()
            .filter(|module| !consumed_providers.contains(module))
            .collect();

        if stoppable.is_empty() {
            let tie_break = *remaining
                .iter()
                .min_by_key(|module| host.lowest_service_ranking(**module))
                .expect("remaining is non-empty");
            stoppable = vec![tie_break];
        }

        for module_id in &stoppable {
            debug!("stopping module {module_id}");
            host.stop(*module_id).map_err(|source| Error::ModuleOperation {
                module: *module_id,
                operation: "stop",
                source,
            })?;
        }
        remaining.retain(|module| !stoppable.contains(module));
    }
    Ok(())
}
