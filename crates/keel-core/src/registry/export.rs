use std::any::{type_name, TypeId};
use std::sync::Arc;

use crate::component::handle::{ComponentInstance, ExportEntry, StartupRoutine};
use crate::component::metadata::{ComponentMetadata, OrderKey};
use crate::component::traits::{
    AsyncStartupAction, BoxError, Capabilities, ShutdownAction, StartupAction, StartupKind,
};
use crate::config::MetadataOverride;
use crate::registry::ComponentRegistry;

type TypedFactory<T> = Box<dyn Fn(&ComponentRegistry) -> Result<Arc<T>, BoxError> + Send + Sync>;

/// Declaration of one exported component.
///
/// The factory is not called at export time; the registry stores it behind a
/// deferred handle. Capabilities are declared here so the registry can
/// enumerate startup and shutdown components without constructing them.
///
/// ```ignore
/// registry.export(
///     Export::new("cache", |_| Ok(Cache::default()))
///         .order(10)
///         .with_startup()
///         .with_shutdown(),
/// )?;
/// ```
pub struct Export<T> {
    metadata: ComponentMetadata,
    factory: TypedFactory<T>,
    startup: Option<(StartupKind, fn(Arc<T>) -> StartupRoutine)>,
    shutdown: Option<fn(Arc<T>) -> Arc<dyn ShutdownAction>>,
}

impl<T> Export<T>
where
    T: Send + Sync + 'static,
{
    /// Export built lazily by `factory`. The factory receives the registry so it
    /// can resolve the components it imports.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ComponentRegistry) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            metadata: ComponentMetadata::new(name),
            factory: Box::new(move |registry| factory(registry).map(Arc::new)),
            startup: None,
            shutdown: None,
        }
    }

    /// Export an already constructed value.
    pub fn from_instance(name: impl Into<String>, value: Arc<T>) -> Self {
        Self {
            metadata: ComponentMetadata::new(name),
            factory: Box::new(move |_| Ok(value.clone())),
            startup: None,
            shutdown: None,
        }
    }

    pub fn order(mut self, order: impl Into<OrderKey>) -> Self {
        self.metadata = self.metadata.with_order(order);
        self
    }

    pub fn await_start(mut self, await_start: bool) -> Self {
        self.metadata = self.metadata.with_await_start(await_start);
        self
    }

    pub fn shutdown_order(mut self, order: impl Into<OrderKey>) -> Self {
        self.metadata = self.metadata.with_shutdown_order(order);
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.metadata = self.metadata.with_dependency(name);
        self
    }

    /// Declare the asynchronous startup capability. Replaces a blocking one.
    pub fn with_startup(mut self) -> Self
    where
        T: AsyncStartupAction,
    {
        let cast: fn(Arc<T>) -> StartupRoutine = |value| StartupRoutine::Async(value);
        self.startup = Some((StartupKind::Async, cast));
        self
    }

    /// Declare the blocking startup capability. Replaces an async one.
    pub fn with_blocking_startup(mut self) -> Self
    where
        T: StartupAction,
    {
        let cast: fn(Arc<T>) -> StartupRoutine = |value| StartupRoutine::Blocking(value);
        self.startup = Some((StartupKind::Blocking, cast));
        self
    }

    pub fn with_shutdown(mut self) -> Self
    where
        T: ShutdownAction,
    {
        let cast: fn(Arc<T>) -> Arc<dyn ShutdownAction> = |value| value;
        self.shutdown = Some(cast);
        self
    }

    pub fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    pub(crate) fn into_entry(self, overrides: Option<&MetadataOverride>) -> ExportEntry {
        let metadata = match overrides {
            Some(o) => self.metadata.apply_override(o),
            None => self.metadata,
        };
        let capabilities = Capabilities {
            startup: self.startup.map(|(kind, _)| kind),
            shutdown: self.shutdown.is_some(),
        };
        let startup_cast = self.startup.map(|(_, cast)| cast);
        let shutdown_cast = self.shutdown;
        let factory = self.factory;

        ExportEntry::new(
            metadata,
            capabilities,
            TypeId::of::<T>(),
            type_name::<T>(),
            Box::new(move |registry| {
                let value = factory(registry)?;
                Ok(ComponentInstance::new(
                    value.clone(),
                    startup_cast.map(|cast| cast(value.clone())),
                    shutdown_cast.map(|cast| cast(value.clone())),
                ))
            }),
        )
    }
}
