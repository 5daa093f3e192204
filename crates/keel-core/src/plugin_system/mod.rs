//! # Keel Plugin System
//!
//! Plugins are how components get into a session. Each [`Plugin`] declares the
//! API versions it supports and exports its components into the session's
//! registry when the session initializes.
//!
//! - **[`traits`]**: the [`Plugin`] trait.
//! - **[`catalog`]**: [`PluginCatalog`], which holds plugins in insertion
//!   order, applies enable/disable decisions and checks API compatibility.
//! - **[`version`]**: [`VersionRange`], a semver requirement.
//! - **[`error`]**: [`PluginSystemError`].
pub mod catalog;
pub mod error;
pub mod traits;
pub mod version;

pub use catalog::PluginCatalog;
pub use error::PluginSystemError;
pub use traits::Plugin;
pub use version::{VersionError, VersionRange};
