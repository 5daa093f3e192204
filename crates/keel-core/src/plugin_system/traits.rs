use crate::kernel::error::Result;
use crate::plugin_system::version::VersionRange;
use crate::registry::ComponentRegistry;

/// A unit of functionality that contributes components to a session.
///
/// Plugins are statically linked; the session calls [`Plugin::register`] once,
/// during initialization, with the session's registry.
pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &'static str;

    fn version(&self) -> &str;

    /// Core plugins cannot be disabled through configuration.
    fn is_core(&self) -> bool {
        false
    }

    /// API versions this plugin works with
    fn compatible_api_versions(&self) -> Vec<VersionRange>;

    /// Export this plugin's components into the registry.
    fn register(&self, registry: &ComponentRegistry) -> Result<()>;
}
