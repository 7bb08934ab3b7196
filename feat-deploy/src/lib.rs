//! The feature resolution and deployment engine: repositories and features
//! resolve (via `feat-catalog`/`feat-solve`) into a set of resources, which
//! are diffed against the live module set and deployed in the mandatory
//! phase order.
//!
//! `Engine` is the public facade; `ModuleHost` is the runtime primitive
//! contract production deployments implement against a real module
//! runtime. [`testing::FakeModuleHost`] is the in-memory double this
//! workspace's own tests and CLI use instead.

mod error;
pub use error::Error;

mod module;
pub use module::{HostError, ModuleHost, ModuleInfo, ModuleState};

mod planner;
pub use planner::{DeploymentPlan, DeploymentPlanner};

mod executor;
pub use executor::{DeploymentExecutor, ExecutionReport};

mod state;
pub use state::{EngineState, StateStore};

mod config;
pub use config::EngineConfig;

mod events;
pub use events::{Event, Listener};

mod engine;
pub use engine::{synthetic_content_resolver, ContentResolver, Engine};

pub mod cli;

pub mod testing;
