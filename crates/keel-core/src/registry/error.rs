//! # Keel Registry Errors
//!
//! [`RegistryError`] covers export registration and lookup failures.
use thiserror::Error;

use crate::component::error::InstantiationError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A component named '{name}' is already exported")]
    DuplicateExport { name: String },

    #[error("No export found for {what}")]
    NotFound { what: String },

    #[error("Export lookup for type '{type_name}' is ambiguous; candidates: {}", .candidates.join(", "))]
    Ambiguous {
        type_name: &'static str,
        candidates: Vec<String>,
    },

    #[error("Component '{name}' is a '{actual}', not a '{expected}'")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Instantiation failed: {0}")]
    Instantiation(#[from] InstantiationError),
}
