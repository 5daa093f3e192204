//! # Keel Dependency Graph Errors
//!
//! Configuration errors found while validating the component graph. All of
//! them are reported before any lifecycle routine runs.
use thiserror::Error;

use crate::component::metadata::OrderKey;
use crate::kernel::error::LifecyclePhase;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("Component '{component}' depends on '{dependency}', which is not exported")]
    MissingComponent {
        component: String,
        dependency: String,
    },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error(
        "Component '{component}' depends on '{dependency}', but its {phase} order ({component_order}) conflicts with the dependency's ({dependency_order})"
    )]
    OrderConflict {
        phase: LifecyclePhase,
        component: String,
        dependency: String,
        component_order: OrderKey,
        dependency_order: OrderKey,
    },
}
