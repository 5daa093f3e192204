use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::component::error::InstantiationError;
use crate::component::traits::BoxError;
use crate::graph::DependencyError;
use crate::kernel::error::LifecyclePhase;

/// Why one component did not make it through a phase.
#[derive(Debug, Error)]
pub enum ComponentFailure {
    #[error("component '{component}' failed during instantiation: {source}")]
    Instantiation {
        component: String,
        #[source]
        source: InstantiationError,
    },

    #[error("component '{component}' failed during start: {source}")]
    StartExecution {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("component '{component}' failed during shutdown: {source}")]
    ShutdownExecution {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("component '{component}' panicked during {phase}: {message}")]
    Panicked {
        component: String,
        phase: LifecyclePhase,
        message: String,
    },

    #[error("component '{component}' was not started because dependency '{dependency}' did not start")]
    DependencyFailed {
        component: String,
        dependency: String,
    },
}

impl ComponentFailure {
    pub fn component(&self) -> &str {
        match self {
            ComponentFailure::Instantiation { component, .. }
            | ComponentFailure::StartExecution { component, .. }
            | ComponentFailure::ShutdownExecution { component, .. }
            | ComponentFailure::Panicked { component, .. }
            | ComponentFailure::DependencyFailed { component, .. } => component,
        }
    }

    pub fn is_instantiation(&self) -> bool {
        matches!(self, ComponentFailure::Instantiation { .. })
    }

    pub(crate) fn panicked(component: &str, phase: LifecyclePhase, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ComponentFailure::Panicked {
            component: component.to_string(),
            phase,
            message,
        }
    }

    pub(crate) fn from_join_error(component: &str, phase: LifecyclePhase, err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::panicked(component, phase, err.into_panic())
        } else {
            ComponentFailure::Panicked {
                component: component.to_string(),
                phase,
                message: format!("task did not complete: {}", err),
            }
        }
    }
}

/// Every component failure collected during one startup or shutdown.
#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: LifecyclePhase,
    pub failures: Vec<ComponentFailure>,
}

impl PhaseFailure {
    /// Names of the failed components, in the order the failures were recorded.
    pub fn components(&self) -> Vec<&str> {
        self.failures.iter().map(ComponentFailure::component).collect()
    }
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for {} component(s): {}",
            self.phase,
            self.failures.len(),
            self.components().join(", ")
        )
    }
}

impl std::error::Error for PhaseFailure {}

/// Outcome of an orchestrator run that did not succeed.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Failed(#[from] PhaseFailure),

    #[error("{phase} cancelled after launching {launched} component(s)")]
    Cancelled {
        phase: LifecyclePhase,
        launched: usize,
        failures: Vec<ComponentFailure>,
    },

    #[error("Dependency configuration error: {0}")]
    Configuration(#[from] DependencyError),
}
