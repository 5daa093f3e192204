use std::collections::HashSet;
use std::fmt;

use semver::Version;

use crate::config::SessionConfig;
use crate::kernel::constants;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::parse_version;
use crate::registry::ComponentRegistry;

/// Statically linked plugins known to a session, in the order they were added.
pub struct PluginCatalog {
    plugins: Vec<Box<dyn Plugin>>,
    disabled: HashSet<String>,
    api_version: Version,
}

impl PluginCatalog {
    /// Create a catalog checking plugins against this crate's `API_VERSION`.
    pub fn new() -> Result<Self, PluginSystemError> {
        Self::with_api_version(constants::API_VERSION)
    }

    pub fn with_api_version(api_version: &str) -> Result<Self, PluginSystemError> {
        Ok(Self {
            plugins: Vec::new(),
            disabled: HashSet::new(),
            api_version: parse_version(api_version)?,
        })
    }

    pub fn add(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginSystemError> {
        let name = plugin.name();
        if self.contains(name) {
            return Err(PluginSystemError::DuplicatePlugin { name: name.to_string() });
        }
        log::debug!("Added plugin {} v{}", name, plugin.version());
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn disable(&mut self, name: &str) -> Result<(), PluginSystemError> {
        let plugin = self
            .plugins
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| PluginSystemError::UnknownPlugin { name: name.to_string() })?;
        if plugin.is_core() {
            return Err(PluginSystemError::CoreDisableRefused { name: name.to_string() });
        }
        self.disabled.insert(name.to_string());
        Ok(())
    }

    /// Returns `true` if the plugin was disabled before.
    pub fn enable(&mut self, name: &str) -> bool {
        self.disabled.remove(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.contains(name) && !self.disabled.contains(name)
    }

    /// Fails unless one of the plugin's ranges includes the catalog's API version.
    pub fn check_compatibility(&self, plugin: &dyn Plugin) -> Result<(), PluginSystemError> {
        let ranges = plugin.compatible_api_versions();
        if ranges.iter().any(|r| r.includes(&self.api_version)) {
            return Ok(());
        }
        Err(PluginSystemError::IncompatibleApi {
            plugin: plugin.name().to_string(),
            api_version: self.api_version.to_string(),
            supported: ranges.iter().map(|r| r.to_string()).collect(),
        })
    }

    /// Let every enabled plugin export its components, in insertion order.
    ///
    /// Plugins disabled here or in `config` are skipped, except core plugins,
    /// which configuration cannot turn off. Returns the names that registered.
    pub fn register_all(
        &self,
        registry: &ComponentRegistry,
        config: &SessionConfig,
    ) -> Result<Vec<&'static str>, PluginSystemError> {
        let mut registered = Vec::new();
        for plugin in &self.plugins {
            let name = plugin.name();
            if self.disabled.contains(name) {
                log::info!("Plugin '{}' is disabled, skipping", name);
                continue;
            }
            if config.is_plugin_disabled(name) {
                if plugin.is_core() {
                    log::warn!("Ignoring configuration request to disable core plugin '{}'", name);
                } else {
                    log::info!("Plugin '{}' disabled by configuration, skipping", name);
                    continue;
                }
            }

            self.check_compatibility(plugin.as_ref())?;
            plugin
                .register(registry)
                .map_err(|e| PluginSystemError::RegistrationFailed {
                    plugin: name.to_string(),
                    source: Box::new(e),
                })?;
            log::info!("Registered plugin {} v{}", name, plugin.version());
            registered.push(name);
        }
        Ok(registered)
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.names())
            .field("disabled", &self.disabled)
            .field("api_version", &self.api_version.to_string())
            .finish()
    }
}
