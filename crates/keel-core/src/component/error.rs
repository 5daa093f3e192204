//! # Keel Component Errors
//!
//! [`InstantiationError`] covers everything that can go wrong while a deferred
//! handle constructs its component.
use thiserror::Error;

use crate::component::traits::BoxError;

#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error("factory for component '{component}' failed: {source}")]
    Factory {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("circular import while constructing components: {}", .chain.join(" -> "))]
    CircularImport { chain: Vec<String> },
}

impl InstantiationError {
    /// Name of the component whose construction failed.
    pub fn component(&self) -> &str {
        match self {
            InstantiationError::Factory { component, .. } => component,
            InstantiationError::CircularImport { chain } => {
                chain.last().map(String::as_str).unwrap_or("<unknown>")
            }
        }
    }
}
