//! # Keel Lifecycle
//!
//! Grouped, dependency-aware execution of startup and shutdown routines.
//!
//! - **[`plan`]**: [`ExecutionPlan`] partitions components by ordering key and
//!   splits each group into dependency waves.
//! - **[`startup`]**: [`StartupOrchestrator`].
//! - **[`shutdown`]**: [`ShutdownOrchestrator`].
//! - **[`background`]**: [`BackgroundStarts`], the tracker for starts that are
//!   launched but not awaited.
//! - **[`report`]** / **[`failure`]**: what a run did, and why components failed.
pub mod background;
pub mod failure;
pub mod plan;
pub mod report;
pub mod shutdown;
pub mod startup;

pub use background::BackgroundStarts;
pub use failure::{ComponentFailure, PhaseError, PhaseFailure};
pub use plan::{ExecutionPlan, PlannedGroup};
pub use report::{GroupSummary, PhaseReport};
pub use shutdown::ShutdownOrchestrator;
pub use startup::StartupOrchestrator;

use std::sync::Arc;

use crate::component::handle::{ComponentHandle, ComponentInstance};
use crate::kernel::error::LifecyclePhase;
use crate::registry::ComponentRegistry;

/// Get a component's instance without blocking an async worker.
///
/// Factories are synchronous and may resolve their own imports, so first-time
/// construction runs on the blocking pool.
pub(crate) async fn resolve_instance(
    registry: &Arc<ComponentRegistry>,
    handle: &ComponentHandle,
    phase: LifecyclePhase,
) -> Result<Arc<ComponentInstance>, ComponentFailure> {
    let name = handle.name().to_string();
    if handle.is_instantiated() {
        return registry
            .resolve(handle)
            .map_err(|source| ComponentFailure::Instantiation { component: name, source });
    }

    let registry = registry.clone();
    let handle = handle.clone();
    match tokio::task::spawn_blocking(move || registry.resolve(&handle)).await {
        Ok(result) => result.map_err(|source| ComponentFailure::Instantiation { component: name, source }),
        Err(join) => Err(ComponentFailure::from_join_error(&name, phase, join)),
    }
}
