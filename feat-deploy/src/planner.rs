//! Diffing the resolved resource set against the live module set.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Read,
    sync::Arc,
};

use feat_types::{ModuleId, ModuleLocation, RangeMacro, Resource, StreamProvider, Version};

use crate::{Error, ModuleInfo};

/// The outcome of diffing a resolved resource set against the live modules.
#[derive(Clone, Debug, Default)]
pub struct DeploymentPlan {
    /// Resources with no matching or reclassifiable live module: install
    /// fresh.
    pub to_install: Vec<Resource>,
    /// `(module, resource)` pairs to update in place.
    pub to_update: Vec<(ModuleId, Resource)>,
    /// Managed modules with no matching resource: remove.
    pub to_delete: Vec<ModuleId>,
    /// Every resource matched (by identity or by range rehoming) to a live
    /// module, keyed by `(symbolicName, version)`.
    pub resource_to_module: BTreeMap<(String, Version), ModuleId>,
    /// Checksums computed for updateable resources, to merge into
    /// persisted state.
    pub new_checksums: BTreeMap<ModuleLocation, u64>,
}

/// Diffs resolved resources against live modules into a [`DeploymentPlan`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DeploymentPlanner;

impl DeploymentPlanner {
    /// Computes the plan.
    ///
    /// `bundle_update_range` is the macro (see [`feat_types::RangeMacro`])
    /// applied to an unmatched resource's version to compute the range of
    /// live module versions it may be rehomed against in pass 2.
    ///
    /// # Errors
    ///
    /// Returns an error if a checksum computation's stream cannot be
    /// opened or read, or if `bundle_update_range` is malformed.
    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        resolved_resources: &[Resource],
        live_modules: &[ModuleInfo],
        managed_ids: &BTreeSet<ModuleId>,
        old_checksums: &BTreeMap<ModuleLocation, u64>,
        update_snapshots: bool,
        bundle_update_range: &str,
        stream_providers: &BTreeMap<String, Arc<dyn StreamProvider>>,
    ) -> Result<DeploymentPlan, Error> {
        let mut to_deploy: Vec<Resource> = resolved_resources
            .iter()
            .filter(|resource| resource.uri.is_some())
            .cloned()
            .collect();
        let mut to_delete = Vec::new();
        let mut to_update = Vec::new();
        let mut resource_to_module = BTreeMap::new();
        let mut new_checksums = BTreeMap::new();

        for module in live_modules {
            if module.id.0 == 0 {
                continue;
            }
            let Some(symbolic_name) = &module.symbolic_name else {
                continue;
            };
            let matched = to_deploy
                .iter()
                .position(|resource| &resource.symbolic_name == symbolic_name && resource.version == module.version);

            match matched {
                Some(position) => {
                    let resource = to_deploy.remove(position);
                    let managed = managed_ids.contains(&module.id);
                    let mut content_changed = false;
                    if resource.is_updateable() && update_snapshots && managed {
                        let uri = resource.uri.clone().expect("module resource carries a uri");
                        let checksum = compute_checksum(stream_providers, &uri)?;
                        let location = ModuleLocation(uri);
                        let previous = old_checksums.get(&location).copied().unwrap_or(0);
                        if checksum != previous {
                            new_checksums.insert(location, checksum);
                            content_changed = true;
                        }
                    }
                    resource_to_module.insert((resource.symbolic_name.clone(), resource.version.clone()), module.id);
                    if content_changed {
                        // Same identity, changed content: a snapshot module
                        // republished under the same symbolic name and
                        // version. Route it through update/refresh/restart
                        // rather than leaving it untouched.
                        to_update.push((module.id, resource));
                    }
                }
                None => {
                    if managed_ids.contains(&module.id) {
                        to_delete.push(module.id);
                    }
                }
            }
        }

        let mut to_install = Vec::new();
        let update_range_macro = RangeMacro::parse(bundle_update_range)?;

        for resource in to_deploy {
            let range = update_range_macro.apply(&resource.version);
            let reclassified = to_delete
                .iter()
                .copied()
                .filter(|module_id| {
                    live_modules
                        .iter()
                        .find(|module| module.id == *module_id)
                        .is_some_and(|module| {
                            module.symbolic_name.as_deref() == Some(resource.symbolic_name.as_str())
                                && range.contains(&module.version)
                        })
                })
                .max_by_key(|module_id| {
                    live_modules
                        .iter()
                        .find(|module| module.id == *module_id)
                        .expect("filtered above")
                        .version
                        .clone()
                });

            match reclassified {
                Some(module_id) => {
                    to_delete.retain(|id| *id != module_id);
                    if resource.is_updateable() {
                        let uri = resource.uri.clone().expect("module resource carries a uri");
                        let checksum = compute_checksum(stream_providers, &uri)?;
                        let location = ModuleLocation(uri);
                        let previous = old_checksums.get(&location).copied().unwrap_or(0);
                        if checksum != previous {
                            new_checksums.insert(location, checksum);
                        }
                    }
                    resource_to_module.insert((resource.symbolic_name.clone(), resource.version.clone()), module_id);
                    to_update.push((module_id, resource));
                }
                None => to_install.push(resource),
            }
        }

        Ok(DeploymentPlan {
            to_install,
            to_update,
            to_delete,
            resource_to_module,
            new_checksums,
        })
    }
}

fn compute_checksum(stream_providers: &BTreeMap<String, Arc<dyn StreamProvider>>, uri: &str) -> Result<u64, Error> {
    let provider = stream_providers
        .get(uri)
        .ok_or_else(|| Error::MissingStreamProvider(uri.to_string()))?;
    let mut buffer = Vec::new();
    provider
        .open()
        .and_then(|mut stream| stream.read_to_end(&mut buffer))
        .map_err(|source| Error::ChecksumIo {
            uri: uri.to_string(),
            source,
        })?;
    let hash = blake3::hash(&buffer);
    let low_bytes: [u8; 8] = hash.as_bytes()[..8].try_into().expect("blake3 digest is 32 bytes");
    Ok(u64::from_le_bytes(low_bytes))
}

#[cfg(test)]
mod tests {
    use feat_types::StaticStreamProvider;
    use testresult::TestResult;

    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use crate::ModuleState;

    fn resource(name: &str, version: &str, uri: &str) -> Resource {
        Resource::module(name, Version::new(version).unwrap(), uri)
    }

    fn module(id: u64, name: &str, version: &str, state: ModuleState) -> ModuleInfo {
        ModuleInfo {
            id: ModuleId(id),
            location: Some(ModuleLocation(format!("mvn:x/{name}/{version}"))),
            symbolic_name: Some(name.to_string()),
            version: Version::new(version).unwrap(),
            state,
            is_fragment: false,
        }
    }

    fn providers(entries: &[&str]) -> BTreeMap<String, Arc<dyn StreamProvider>> {
        entries
            .iter()
            .map(|uri| ((*uri).to_string(), Arc::new(StaticStreamProvider::new(b"content".to_vec())) as Arc<dyn StreamProvider>))
            .collect()
    }

    #[rstest]
    fn fresh_install_with_no_live_modules() -> TestResult {
        let resources = vec![resource("b", "1.0.0", "mvn:x/b/1.0.0")];
        let plan = DeploymentPlanner::plan(
            &resources,
            &[],
            &BTreeSet::new(),
            &BTreeMap::new(),
            true,
            "[==,=+)",
            &providers(&["mvn:x/b/1.0.0"]),
        )?;
        assert_eq!(plan.to_install.len(), 1);
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
        Ok(())
    }

    #[rstest]
    fn identical_identity_is_neither_installed_nor_deleted() -> TestResult {
        let resources = vec![resource("b", "1.0.0", "mvn:x/b/1.0.0")];
        let live = vec![module(5, "b", "1.0.0", ModuleState::Active)];
        let managed: BTreeSet<_> = [ModuleId(5)].into_iter().collect();
        let plan = DeploymentPlanner::plan(
            &resources,
            &live,
            &managed,
            &BTreeMap::new(),
            true,
            "[==,=+)",
            &providers(&["mvn:x/b/1.0.0"]),
        )?;
        assert!(plan.to_install.is_empty());
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.resource_to_module[&("b".to_string(), Version::new("1.0.0")?)], ModuleId(5));
        Ok(())
    }

    #[rstest]
    fn unmatched_managed_module_is_deleted() -> TestResult {
        let live = vec![module(5, "old", "1.0.0", ModuleState::Active)];
        let managed: BTreeSet<_> = [ModuleId(5)].into_iter().collect();
        let plan = DeploymentPlanner::plan(&[], &live, &managed, &BTreeMap::new(), true, "[==,=+)", &BTreeMap::new())?;
        assert_eq!(plan.to_delete, vec![ModuleId(5)]);
        Ok(())
    }

    #[rstest]
    fn unmatched_unmanaged_module_is_ignored() -> TestResult {
        let live = vec![module(5, "old", "1.0.0", ModuleState::Active)];
        let plan = DeploymentPlanner::plan(&[], &live, &BTreeSet::new(), &BTreeMap::new(), true, "[==,=+)", &BTreeMap::new())?;
        assert!(plan.to_delete.is_empty());
        Ok(())
    }

    #[rstest]
    fn snapshot_with_changed_content_is_updated() -> TestResult {
        let resources = vec![Resource::module("b", Version::new("1.0.0.SNAPSHOT")?, "mvn:x/b/1.0.0-SNAPSHOT")];
        let live = vec![module(5, "b", "1.0.0.SNAPSHOT", ModuleState::Active)];
        let managed: BTreeSet<_> = [ModuleId(5)].into_iter().collect();
        let mut old_checksums = BTreeMap::new();
        old_checksums.insert(ModuleLocation("mvn:x/b/1.0.0-SNAPSHOT".to_string()), 0xDEAD);

        let plan = DeploymentPlanner::plan(
            &resources,
            &live,
            &managed,
            &old_checksums,
            true,
            "[==,=+)",
            &providers(&["mvn:x/b/1.0.0-SNAPSHOT"]),
        )?;
        assert_eq!(plan.to_update.len(), 1);
        assert_ne!(plan.new_checksums[&ModuleLocation("mvn:x/b/1.0.0-SNAPSHOT".to_string())], 0xDEAD);
        Ok(())
    }

    #[rstest]
    fn snapshot_with_unchanged_content_is_neither_updated_nor_deleted() -> TestResult {
        let resources = vec![Resource::module("b", Version::new("1.0.0.SNAPSHOT")?, "mvn:x/b/1.0.0-SNAPSHOT")];
        let live = vec![module(5, "b", "1.0.0.SNAPSHOT", ModuleState::Active)];
        let managed: BTreeSet<_> = [ModuleId(5)].into_iter().collect();
        let providers = providers(&["mvn:x/b/1.0.0-SNAPSHOT"]);
        let existing_checksum = {
            let provider = &providers["mvn:x/b/1.0.0-SNAPSHOT"];
            let mut buffer = Vec::new();
            provider.open()?.read_to_end(&mut buffer)?;
            let hash = blake3::hash(&buffer);
            u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("32-byte digest"))
        };
        let mut old_checksums = BTreeMap::new();
        old_checksums.insert(ModuleLocation("mvn:x/b/1.0.0-SNAPSHOT".to_string()), existing_checksum);

        let plan = DeploymentPlanner::plan(&resources, &live, &managed, &old_checksums, true, "[==,=+)", &providers)?;
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
        assert!(plan.new_checksums.is_empty());
        Ok(())
    }

    #[rstest]
    fn version_range_rehoming_reclassifies_highest_matching_delete() -> TestResult {
        let resources = vec![resource("b", "1.2.5", "mvn:x/b/1.2.5")];
        let live = vec![
            module(5, "b", "1.2.0", ModuleState::Active),
            module(6, "b", "1.2.3", ModuleState::Active),
        ];
        let managed: BTreeSet<_> = [ModuleId(5), ModuleId(6)].into_iter().collect();
        let plan = DeploymentPlanner::plan(
            &resources,
            &live,
            &managed,
            &BTreeMap::new(),
            true,
            "[==,=+)",
            &providers(&["mvn:x/b/1.2.5"]),
        )?;
        assert_eq!(plan.to_update, vec![(ModuleId(6), resource("b", "1.2.5", "mvn:x/b/1.2.5"))]);
        assert_eq!(plan.to_delete, vec![ModuleId(5)]);
        Ok(())
    }

    #[rstest]
    fn out_of_range_resource_is_installed_not_rehomed() -> TestResult {
        let resources = vec![resource("b", "2.0.0", "mvn:x/b/2.0.0")];
        let live = vec![module(5, "b", "1.2.0", ModuleState::Active)];
        let managed: BTreeSet<_> = [ModuleId(5)].into_iter().collect();
        let plan = DeploymentPlanner::plan(
            &resources,
            &live,
            &managed,
            &BTreeMap::new(),
            true,
            "[==,=+)",
            &providers(&["mvn:x/b/2.0.0"]),
        )?;
        assert_eq!(plan.to_install.len(), 1);
        assert_eq!(plan.to_delete, vec![ModuleId(5)]);
        Ok(())
    }
}
