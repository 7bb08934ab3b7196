//! The runtime module lifecycle contract.
//!
//! `ModuleHost` is this engine's declared external collaborator: the
//! runtime that actually hosts installed modules (an OSGi framework, in the
//! system this engine is modeled on). The engine only ever calls these
//! primitives; it never inspects module content itself.

use std::io::Read;

use feat_types::{ModuleId, ModuleLocation, Version};

/// The error type every [`ModuleHost`] operation reports.
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/// The lifecycle state of a live module.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, strum::Display)]
pub enum ModuleState {
    /// Uninstalled; no longer tracked by the host.
    Uninstalled,
    /// Installed but not yet resolved.
    Installed,
    /// Resolved, ready to start.
    Resolved,
    /// Transitioning to active.
    Starting,
    /// Running.
    Active,
    /// Transitioning to resolved.
    Stopping,
}

impl ModuleState {
    /// `true` for states the stop phase may skip: the module is already
    /// uninstalled, merely resolved, or already on its way down.
    pub fn is_terminal_or_stopping(self) -> bool {
        matches!(self, Self::Uninstalled | Self::Resolved | Self::Stopping)
    }

    /// `true` for states the start phase may skip: already uninstalled,
    /// already active, or already on its way up.
    pub fn is_uninstalled_active_or_starting(self) -> bool {
        matches!(self, Self::Uninstalled | Self::Active | Self::Starting)
    }
}

/// A snapshot of a single live module, as reported by a [`ModuleHost`].
#[derive(Clone, Debug)]
pub struct ModuleInfo {
    /// The module's runtime-assigned id.
    pub id: ModuleId,
    /// The module's content location, if known (the system module has
    /// none).
    pub location: Option<ModuleLocation>,
    /// The module's symbolic name, if known.
    pub symbolic_name: Option<String>,
    /// The module's version.
    pub version: Version,
    /// The module's current lifecycle state.
    pub state: ModuleState,
    /// `true` if this module is a fragment (declares a fragment-host
    /// header); fragments follow their host through stop/start and are
    /// never directly started or stopped.
    pub is_fragment: bool,
}

/// The runtime primitives the deployment executor drives.
///
/// Every method reports failure as a boxed error; [`crate::Error::ModuleOperation`]
/// wraps it with the failing module id and the operation name.
pub trait ModuleHost {
    /// Returns a snapshot of every module currently known to the host.
    fn modules(&self) -> Vec<ModuleInfo>;

    /// Returns the current state of `module`.
    fn state(&self, module: ModuleId) -> ModuleState;

    /// Returns the other modules, among those in `candidates`, whose
    /// services `module` is currently consuming.
    ///
    /// Used by the stop phase's service-usage ordering: a module cannot be
    /// stopped before every module consuming its services has stopped.
    fn consumed_providers(&self, module: ModuleId, candidates: &[ModuleId]) -> Vec<ModuleId>;

    /// The ranking of the lowest-ranked service `module` currently
    /// registers, used as the stop-phase deadlock tie-breaker. Modules
    /// registering no services should return `i64::MAX` so they are never
    /// preferred by the tie-breaker.
    fn lowest_service_ranking(&self, module: ModuleId) -> i64;

    /// `true` if `module` is not listed as a dependency bundle by any
    /// resolved feature — i.e. it is a "root" module that should start
    /// before the rest.
    fn is_root_module(&self, module: ModuleId) -> bool;

    /// Installs new content at `location`, returning the new module's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the content.
    fn install(&self, location: &str, content: &mut dyn Read) -> Result<ModuleId, HostError>;

    /// Replaces `module`'s content.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the content.
    fn update(&self, module: ModuleId, content: &mut dyn Read) -> Result<(), HostError>;

    /// Uninstalls `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot uninstall the module.
    fn uninstall(&self, module: ModuleId) -> Result<(), HostError>;

    /// Transiently stops `module`, preserving its persisted start state.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot stop the module.
    fn stop(&self, module: ModuleId) -> Result<(), HostError>;

    /// Starts `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot start the module.
    fn start(&self, module: ModuleId) -> Result<(), HostError>;

    /// Refreshes `modules` and synchronously waits for completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh does not complete successfully.
    fn refresh(&self, modules: &[ModuleId]) -> Result<(), HostError>;

    /// Sets `module`'s start level.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the start level.
    fn set_start_level(&self, module: ModuleId, level: u32) -> Result<(), HostError>;
}
