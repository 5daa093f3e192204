use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::error::InstantiationError;
use crate::component::handle::{ComponentHandle, ComponentInstance};
use crate::config::MetadataOverride;
use crate::registry::error::RegistryError;
use crate::registry::export::Export;

/// Something that wants references filled in from the registry.
pub trait Imports {
    fn satisfy_imports(&mut self, registry: &ComponentRegistry) -> Result<(), RegistryError>;
}

#[derive(Default)]
struct Exports {
    // Discovery order
    handles: Vec<ComponentHandle>,
    by_name: HashMap<String, usize>,
}

/// Session-scoped component registry.
///
/// Append-and-read: exports can be added while lookups run, and every
/// enumeration returns a snapshot in export order.
#[derive(Default)]
pub struct ComponentRegistry {
    exports: RwLock<Exports>,
    overrides: HashMap<String, MetadataOverride>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that applies metadata overrides to matching exports.
    pub fn with_overrides(overrides: HashMap<String, MetadataOverride>) -> Self {
        Self {
            exports: RwLock::new(Exports::default()),
            overrides,
        }
    }

    /// Register an export. Names must be unique.
    pub fn export<T>(&self, export: Export<T>) -> Result<ComponentHandle, RegistryError>
    where
        T: Send + Sync + 'static,
    {
        let name = export.metadata().name().to_string();
        let mut exports = self.exports.write();
        if exports.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateExport { name });
        }

        let entry = export.into_entry(self.overrides.get(&name));
        let handle = ComponentHandle::new(Arc::new(entry));
        log::debug!("Exported component {}", handle.metadata());

        let index = exports.handles.len();
        exports.handles.push(handle.clone());
        exports.by_name.insert(name, index);
        Ok(handle)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exports.read().by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.exports.read().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every export, in export order.
    pub fn handles(&self) -> Vec<ComponentHandle> {
        self.exports.read().handles.clone()
    }

    pub fn handle(&self, name: &str) -> Option<ComponentHandle> {
        let exports = self.exports.read();
        exports.by_name.get(name).map(|&i| exports.handles[i].clone())
    }

    /// Snapshot of components that declared a startup capability.
    pub fn startup_capable(&self) -> Vec<ComponentHandle> {
        self.handles()
            .into_iter()
            .filter(|h| h.capabilities().is_startable())
            .collect()
    }

    /// Snapshot of components that declared the shutdown capability.
    pub fn shutdown_capable(&self) -> Vec<ComponentHandle> {
        self.handles()
            .into_iter()
            .filter(|h| h.capabilities().is_shutdownable())
            .collect()
    }

    /// Construct (once) and return the instance behind a handle.
    pub fn resolve(
        &self,
        handle: &ComponentHandle,
    ) -> Result<Arc<ComponentInstance>, InstantiationError> {
        handle.resolve_with(self)
    }

    /// The single export whose concrete type is `T`.
    pub fn get_export<T: Any + Send + Sync>(&self) -> Result<Arc<T>, RegistryError> {
        let candidates: Vec<ComponentHandle> = self
            .handles()
            .into_iter()
            .filter(|h| h.entry().type_id == TypeId::of::<T>())
            .collect();

        match candidates.as_slice() {
            [] => Err(RegistryError::NotFound {
                what: format!("type '{}'", type_name::<T>()),
            }),
            [handle] => self.downcast_handle::<T>(handle),
            _ => Err(RegistryError::Ambiguous {
                type_name: type_name::<T>(),
                candidates: candidates.iter().map(|h| h.name().to_string()).collect(),
            }),
        }
    }

    /// The export called `name`, which must be a `T`.
    pub fn get_export_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let handle = self.handle(name).ok_or_else(|| RegistryError::NotFound {
            what: format!("name '{}'", name),
        })?;
        self.downcast_handle::<T>(&handle)
    }

    /// Every export whose concrete type is `T`, in export order.
    pub fn get_exports<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, RegistryError> {
        self.handles()
            .iter()
            .filter(|h| h.entry().type_id == TypeId::of::<T>())
            .map(|h| self.downcast_handle::<T>(h))
            .collect()
    }

    /// Let `target` pull the references it needs from this registry.
    pub fn fill_imports<I: Imports + ?Sized>(&self, target: &mut I) -> Result<(), RegistryError> {
        target.satisfy_imports(self)
    }

    fn downcast_handle<T: Any + Send + Sync>(
        &self,
        handle: &ComponentHandle,
    ) -> Result<Arc<T>, RegistryError> {
        if handle.entry().type_id != TypeId::of::<T>() {
            return Err(RegistryError::TypeMismatch {
                name: handle.name().to_string(),
                expected: type_name::<T>(),
                actual: handle.type_name(),
            });
        }
        let instance = self.resolve(handle)?;
        instance.downcast::<T>().ok_or_else(|| RegistryError::TypeMismatch {
            name: handle.name().to_string(),
            expected: type_name::<T>(),
            actual: handle.type_name(),
        })
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.handles().iter().map(|h| h.name().to_string()).collect();
        f.debug_struct("ComponentRegistry").field("exports", &names).finish()
    }
}
