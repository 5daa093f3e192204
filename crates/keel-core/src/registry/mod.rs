//! # Keel Component Registry
//!
//! The session-scoped container components are exported into.
//!
//! - **[`export`]**: the [`Export`] builder that declares a component, its
//!   metadata and its capabilities.
//! - **[`container`]**: [`ComponentRegistry`], which stores deferred handles,
//!   enumerates startup/shutdown capable components and answers lookups
//!   (`get_export`, `get_export_named`, `get_exports`, `fill_imports`).
//! - **[`error`]**: [`RegistryError`].
pub mod container;
pub mod error;
pub mod export;

pub use container::{ComponentRegistry, Imports};
pub use error::RegistryError;
pub use export::Export;
