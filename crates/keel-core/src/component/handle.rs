use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::component::error::InstantiationError;
use crate::component::metadata::ComponentMetadata;
use crate::component::traits::{
    AsyncStartupAction, BoxError, Capabilities, ShutdownAction, StartupAction,
};
use crate::registry::ComponentRegistry;

/// The startup routine a constructed component exposes.
#[derive(Clone)]
pub enum StartupRoutine {
    Blocking(Arc<dyn StartupAction>),
    Async(Arc<dyn AsyncStartupAction>),
}

/// A constructed component together with its capability views.
pub struct ComponentInstance {
    value: Arc<dyn Any + Send + Sync>,
    startup: Option<StartupRoutine>,
    shutdown: Option<Arc<dyn ShutdownAction>>,
}

impl ComponentInstance {
    pub(crate) fn new(
        value: Arc<dyn Any + Send + Sync>,
        startup: Option<StartupRoutine>,
        shutdown: Option<Arc<dyn ShutdownAction>>,
    ) -> Self {
        Self { value, startup, shutdown }
    }

    /// Downcast the shared value to its concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::downcast::<T>(self.value.clone()).ok()
    }

    pub fn startup(&self) -> Option<&StartupRoutine> {
        self.startup.as_ref()
    }

    pub fn shutdown(&self) -> Option<&Arc<dyn ShutdownAction>> {
        self.shutdown.as_ref()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("startup", &self.startup.as_ref().map(|_| "<routine>"))
            .field("shutdown", &self.shutdown.is_some())
            .finish()
    }
}

pub(crate) type Factory =
    Box<dyn Fn(&ComponentRegistry) -> Result<ComponentInstance, BoxError> + Send + Sync>;

/// Registry-owned state for one export.
pub(crate) struct ExportEntry {
    pub(crate) metadata: Arc<ComponentMetadata>,
    pub(crate) capabilities: Capabilities,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) factory: Factory,
    instance: OnceCell<Arc<ComponentInstance>>,
    shutdown_started: Mutex<bool>,
}

impl ExportEntry {
    pub(crate) fn new(
        metadata: ComponentMetadata,
        capabilities: Capabilities,
        type_id: TypeId,
        type_name: &'static str,
        factory: Factory,
    ) -> Self {
        Self {
            metadata: Arc::new(metadata),
            capabilities,
            type_id,
            type_name,
            factory,
            instance: OnceCell::new(),
            shutdown_started: Mutex::new(false),
        }
    }
}

thread_local! {
    // Names of components being constructed on this thread, innermost last.
    static RESOLVING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

struct ResolvingGuard;

impl ResolvingGuard {
    fn enter(name: &str) -> Result<Self, InstantiationError> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|n| n == name) {
                let mut chain = stack.clone();
                chain.push(name.to_string());
                return Err(InstantiationError::CircularImport { chain });
            }
            stack.push(name.to_string());
            Ok(ResolvingGuard)
        })
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Deferred handle to an exported component.
///
/// Cloning is cheap; all clones share the same memoized instance and the same
/// shutdown guard.
#[derive(Clone)]
pub struct ComponentHandle {
    entry: Arc<ExportEntry>,
}

impl ComponentHandle {
    pub(crate) fn new(entry: Arc<ExportEntry>) -> Self {
        Self { entry }
    }

    pub(crate) fn entry(&self) -> &Arc<ExportEntry> {
        &self.entry
    }

    pub fn name(&self) -> &str {
        self.entry.metadata.name()
    }

    pub fn metadata(&self) -> &Arc<ComponentMetadata> {
        &self.entry.metadata
    }

    pub fn capabilities(&self) -> Capabilities {
        self.entry.capabilities
    }

    pub fn type_name(&self) -> &'static str {
        self.entry.type_name
    }

    /// Whether the component has been constructed yet.
    pub fn is_instantiated(&self) -> bool {
        self.entry.instance.get().is_some()
    }

    /// Returns the memoized instance, constructing it on first use.
    ///
    /// Concurrent first access constructs at most once; the losers block until
    /// the winner's factory returns. Re-entrant construction of a component that
    /// is still being built on this thread fails with `CircularImport`.
    pub(crate) fn resolve_with(
        &self,
        registry: &ComponentRegistry,
    ) -> Result<Arc<ComponentInstance>, InstantiationError> {
        if let Some(instance) = self.entry.instance.get() {
            return Ok(instance.clone());
        }

        let name = self.name().to_string();
        let _guard = ResolvingGuard::enter(&name)?;
        self.entry
            .instance
            .get_or_try_init(|| {
                log::debug!("Instantiating component '{}' ({})", name, self.entry.type_name);
                (self.entry.factory)(registry)
                    .map(Arc::new)
                    .map_err(|source| InstantiationError::Factory {
                        component: name.clone(),
                        source,
                    })
            })
            .cloned()
    }

    /// Test-and-set of the shutdown flag. Exactly one caller ever wins.
    pub(crate) fn try_begin_shutdown(&self) -> bool {
        let mut started = self.entry.shutdown_started.lock();
        if *started {
            false
        } else {
            *started = true;
            true
        }
    }

    /// Whether shutdown has been started for this component.
    pub fn shutdown_started(&self) -> bool {
        *self.entry.shutdown_started.lock()
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("name", &self.name())
            .field("type", &self.entry.type_name)
            .field("capabilities", &self.entry.capabilities)
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}
