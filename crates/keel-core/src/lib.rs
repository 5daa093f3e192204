//! # Keel Core
//!
//! Session-scoped composition and bootstrap engine. Plugins export components
//! into a [`ComponentRegistry`]; a [`BootstrapSession`] validates their
//! dependency graph and drives grouped, cancellable startup and shutdown.
pub mod component;
pub mod config;
pub mod graph;
pub mod kernel;
pub mod lifecycle;
pub mod plugin_system;
pub mod registry;

// Re-export key public types/traits for the binary and plugins
pub use component::{
    AsyncStartupAction, BoxError, ComponentHandle, ComponentMetadata, OrderKey, ShutdownAction,
    StartupAction,
};
pub use config::{ConfigFormat, SessionConfig, StartupFailurePolicy};
pub use graph::{DependencyError, ServiceGraph, ServiceNode};
pub use kernel::error::{Error as KernelError, LifecyclePhase, Result as KernelResult};
pub use kernel::{BootstrapSession, ExclusivityGuard, LockFileGuard, SessionState};
pub use lifecycle::{
    BackgroundStarts, ComponentFailure, ExecutionPlan, PhaseError, PhaseFailure, PhaseReport,
    ShutdownOrchestrator, StartupOrchestrator,
};
pub use plugin_system::{Plugin, PluginCatalog, VersionRange};
pub use registry::{ComponentRegistry, Export, Imports, RegistryError};

// Cancellation is part of every lifecycle signature
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;
