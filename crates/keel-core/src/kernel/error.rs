//! # Keel Kernel Errors
//!
//! [`Error`] is the top-level error returned by the bootstrap session. It wraps
//! the typed errors of each subsystem (registry, dependency graph, plugin
//! system, configuration, exclusivity guard) and carries the aggregated
//! [`PhaseFailure`] of a failed startup or shutdown.
use std::fmt;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::ConfigError;
use crate::graph::DependencyError;
use crate::kernel::bootstrap::SessionState;
use crate::kernel::exclusivity::ExclusivityError;
use crate::lifecycle::failure::{ComponentFailure, PhaseError, PhaseFailure};
use crate::plugin_system::error::PluginSystemError;
use crate::registry::RegistryError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// An operation needing a live container was called in the wrong state.
    #[error("Operation '{operation}' is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Session setup failed; the session stays uninitialized.
    #[error("Session initialization failed: {message}")]
    Initialization {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Exclusivity guard error: {0}")]
    Exclusivity(#[from] ExclusivityError),

    #[error("Component registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Dependency configuration error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// One or more awaited components failed to start.
    #[error("Startup failed: {0}")]
    Startup(PhaseFailure),

    /// Shutdown finished, but some components failed to stop cleanly.
    #[error("Shutdown completed with failures: {0}")]
    Shutdown(PhaseFailure),

    #[error("{phase} was cancelled")]
    Cancelled {
        phase: LifecyclePhase,
        failures: Vec<ComponentFailure>,
    },
}

/// Represents a specific phase in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Initialize,
    Startup,
    Shutdown,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Initialize => write!(f, "initialize"),
            LifecyclePhase::Startup => write!(f, "startup"),
            LifecyclePhase::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl From<PhaseError> for Error {
    fn from(err: PhaseError) -> Self {
        match err {
            PhaseError::Failed(failure) => match failure.phase {
                LifecyclePhase::Shutdown => Error::Shutdown(failure),
                _ => Error::Startup(failure),
            },
            PhaseError::Cancelled { phase, failures, .. } => Error::Cancelled { phase, failures },
            PhaseError::Configuration(dep) => Error::Dependency(dep),
        }
    }
}

impl Error {
    pub(crate) fn initialization(message: impl Into<String>, source: Error) -> Self {
        Error::Initialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Component failures carried by this error, if it is a phase failure.
    pub fn component_failures(&self) -> &[ComponentFailure] {
        match self {
            Error::Startup(f) | Error::Shutdown(f) => &f.failures,
            Error::Cancelled { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;
