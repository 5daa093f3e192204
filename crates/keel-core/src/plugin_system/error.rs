//! # Keel Plugin System Errors
//!
//! [`PluginSystemError`] covers catalog management and plugin registration.
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("A plugin named '{name}' is already in the catalog")]
    DuplicatePlugin { name: String },

    #[error("No plugin named '{name}' in the catalog")]
    UnknownPlugin { name: String },

    #[error("Core plugin '{name}' cannot be disabled")]
    CoreDisableRefused { name: String },

    #[error("Plugin '{plugin}' is not compatible with API version {api_version} (supports: {})", .supported.join(", "))]
    IncompatibleApi {
        plugin: String,
        api_version: String,
        supported: Vec<String>,
    },

    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    #[error("Plugin '{plugin}' failed to register its components: {source}")]
    RegistrationFailed {
        plugin: String,
        #[source]
        source: Box<crate::kernel::error::Error>,
    },
}
