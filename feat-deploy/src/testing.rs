//! An in-memory [`ModuleHost`] double for tests and the CLI.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Read,
    sync::Mutex,
};

use feat_types::{ModuleId, ModuleLocation, Version};

use crate::{HostError, ModuleHost, ModuleInfo, ModuleState};

#[derive(Clone, Debug)]
struct FakeModule {
    location: Option<ModuleLocation>,
    symbolic_name: Option<String>,
    version: Version,
    state: ModuleState,
    is_fragment: bool,
    is_root: bool,
    content: Vec<u8>,
    start_level: Option<u32>,
}

#[derive(Debug, Default)]
struct FakeHostState {
    next_id: u64,
    modules: BTreeMap<ModuleId, FakeModule>,
    consumes: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    service_ranking: BTreeMap<ModuleId, i64>,
    fail_start: BTreeSet<ModuleId>,
}

/// An in-memory [`ModuleHost`] that records every operation and lets tests
/// script module state, fragment/root flags, and simulated start failures.
#[derive(Debug, Default)]
pub struct FakeModuleHost {
    state: Mutex<FakeHostState>,
}

impl FakeModuleHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates a live module (e.g. "as if installed by a previous
    /// deployment"), returning its assigned id.
    pub fn seed_module(&self, symbolic_name: &str, version: &str, location: &str, state: ModuleState) -> ModuleId {
        let mut inner = self.state.lock().expect("lock poisoned");
        inner.next_id += 1;
        let id = ModuleId(inner.next_id);
        inner.modules.insert(
            id,
            FakeModule {
                location: Some(ModuleLocation(location.to_string())),
                symbolic_name: Some(symbolic_name.to_string()),
                version: Version::new(version).expect("valid version"),
                state,
                is_fragment: false,
                is_root: true,
                content: Vec::new(),
                start_level: None,
            },
        );
        id
    }

    /// Marks `module` as a fragment.
    pub fn mark_fragment(&self, module: ModuleId) {
        if let Some(info) = self.state.lock().expect("lock poisoned").modules.get_mut(&module) {
            info.is_fragment = true;
        }
    }

    /// Marks `module` as a dependency bundle (not a root module).
    pub fn mark_dependency(&self, module: ModuleId) {
        if let Some(info) = self.state.lock().expect("lock poisoned").modules.get_mut(&module) {
            info.is_root = false;
        }
    }

    /// Records that `module` consumes services from each of `providers`.
    pub fn set_consumes(&self, module: ModuleId, providers: &[ModuleId]) {
        self.state
            .lock()
            .expect("lock poisoned")
            .consumes
            .insert(module, providers.iter().copied().collect());
    }

    /// Schedules `module` to fail the next time it is started.
    pub fn fail_next_start(&self, module: ModuleId) {
        self.state.lock().expect("lock poisoned").fail_start.insert(module);
    }

    /// Returns the content most recently installed or updated for
    /// `module`.
    pub fn content_of(&self, module: ModuleId) -> Vec<u8> {
        self.state
            .lock()
            .expect("lock poisoned")
            .modules
            .get(&module)
            .map(|info| info.content.clone())
            .unwrap_or_default()
    }

    /// Returns the start level most recently set for `module`, if any.
    pub fn start_level_of(&self, module: ModuleId) -> Option<u32> {
        self.state
            .lock()
            .expect("lock poisoned")
            .modules
            .get(&module)
            .and_then(|info| info.start_level)
    }
}

impl ModuleHost for FakeModuleHost {
    fn modules(&self) -> Vec<ModuleInfo> {
        self.state
            .lock()
            .expect("lock poisoned")
            .modules
            .iter()
            .map(|(id, module)| ModuleInfo {
                id: *id,
                location: module.location.clone(),
                symbolic_name: module.symbolic_name.clone(),
                version: module.version.clone(),
                state: module.state,
                is_fragment: module.is_fragment,
            })
            .collect()
    }

    fn state(&self, module: ModuleId) -> ModuleState {
        self.state
            .lock()
            .expect("lock poisoned")
            .modules
            .get(&module)
            .map(|info| info.state)
            .unwrap_or(ModuleState::Uninstalled)
    }

    fn consumed_providers(&self, module: ModuleId, candidates: &[ModuleId]) -> Vec<ModuleId> {
        let inner = self.state.lock().expect("lock poisoned");
        let Some(providers) = inner.consumes.get(&module) else {
            return Vec::new();
        };
        candidates.iter().copied().filter(|candidate| providers.contains(candidate)).collect()
    }

    fn lowest_service_ranking(&self, module: ModuleId) -> i64 {
        self.state
            .lock()
            .expect("lock poisoned")
            .service_ranking
            .get(&module)
            .copied()
            .unwrap_or(i64::MAX)
    }

    fn is_root_module(&self, module: ModuleId) -> bool {
        self.state
            .lock()
            .expect("lock poisoned")
            .modules
            .get(&module)
            .map(|info| info.is_root)
            .unwrap_or(true)
    }

    fn install(&self, location: &str, content: &mut dyn Read) -> Result<ModuleId, HostError> {
        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer)?;
        let (symbolic_name, version) = feat_solve::bundle_identity(location);

        let mut inner = self.state.lock().expect("lock poisoned");
        inner.next_id += 1;
        let id = ModuleId(inner.next_id);
        inner.modules.insert(
            id,
            FakeModule {
                location: Some(ModuleLocation(location.to_string())),
                symbolic_name: Some(symbolic_name),
                version,
                state: ModuleState::Installed,
                is_fragment: false,
                is_root: true,
                content: buffer,
                start_level: None,
            },
        );
        Ok(id)
    }

    fn update(&self, module: ModuleId, content: &mut dyn Read) -> Result<(), HostError> {
        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer)?;
        let mut inner = self.state.lock().expect("lock poisoned");
        let info = inner
            .modules
            .get_mut(&module)
            .ok_or_else(|| format!("no such module: {module}"))?;
        info.content = buffer;
        Ok(())
    }

    fn uninstall(&self, module: ModuleId) -> Result<(), HostError> {
        let mut inner = self.state.lock().expect("lock poisoned");
        let info = inner
            .modules
            .get_mut(&module)
            .ok_or_else(|| format!("no such module: {module}"))?;
        info.state = ModuleState::Uninstalled;
        Ok(())
    }

    fn stop(&self, module: ModuleId) -> Result<(), HostError> {
        let mut inner = self.state.lock().expect("lock poisoned");
        let info = inner
            .modules
            .get_mut(&module)
            .ok_or_else(|| format!("no such module: {module}"))?;
        info.state = ModuleState::Resolved;
        Ok(())
    }

    fn start(&self, module: ModuleId) -> Result<(), HostError> {
        let mut inner = self.state.lock().expect("lock poisoned");
        if inner.fail_start.remove(&module) {
            return Err(format!("simulated start failure for module {module}").into());
        }
        let info = inner
            .modules
            .get_mut(&module)
            .ok_or_else(|| format!("no such module: {module}"))?;
        info.state = ModuleState::Active;
        Ok(())
    }

    fn refresh(&self, modules: &[ModuleId]) -> Result<(), HostError> {
        let mut inner = self.state.lock().expect("lock poisoned");
        for module in modules {
            if let Some(info) = inner.modules.get_mut(module) {
                info.state = ModuleState::Resolved;
            }
        }
        Ok(())
    }

    fn set_start_level(&self, module: ModuleId, level: u32) -> Result<(), HostError> {
        let mut inner = self.state.lock().expect("lock poisoned");
        let info = inner
            .modules
            .get_mut(&module)
            .ok_or_else(|| format!("no such module: {module}"))?;
        info.start_level = Some(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn install_then_start_reaches_active() {
        let host = FakeModuleHost::new();
        let id = host.install("mvn:x/b/1.0.0", &mut std::io::Cursor::new(b"content")).unwrap();
        assert_eq!(host.state(id), ModuleState::Installed);
        host.start(id).unwrap();
        assert_eq!(host.state(id), ModuleState::Active);
    }

    #[rstest]
    fn scripted_start_failure_is_reported() {
        let host = FakeModuleHost::new();
        let id = host.install("mvn:x/b/1.0.0", &mut std::io::Cursor::new(b"content")).unwrap();
        host.fail_next_start(id);
        assert!(host.start(id).is_err());
    }
}
