use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;

use crate::component::handle::ComponentHandle;
use crate::config::{SessionConfig, StartupFailurePolicy};
use crate::graph::ServiceGraph;
use crate::kernel::constants;
use crate::kernel::error::{Error, LifecyclePhase, Result};
use crate::kernel::exclusivity::{ExclusivityGuard, LockFileGuard, NoopGuard};
use crate::lifecycle::{
    BackgroundStarts, ExecutionPlan, PhaseFailure, PhaseReport, ShutdownOrchestrator,
    StartupOrchestrator,
};
use crate::plugin_system::{Plugin, PluginCatalog};
use crate::registry::{ComponentRegistry, Export, Imports};

/// Lifecycle state of a [`BootstrapSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initialized => write!(f, "initialized"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Owns one session's registry, plugins and exclusivity guard, and drives
/// the startup and shutdown orchestrators over them.
///
/// ```text
/// Uninitialized --initialize--> Initialized --run--> Running
///        |                          |   ^              |
///        +----------run-------------+   +--failed run  |
///                                   +------stop--------+--> Stopped
/// ```
///
/// Dropping a session that is still initialized or running stops it
/// synchronously, except on a current-thread runtime where shutdown is
/// skipped and logged; prefer [`BootstrapSession::dispose`] from async code.
pub struct BootstrapSession {
    config: SessionConfig,
    catalog: PluginCatalog,
    guard: Box<dyn ExclusivityGuard>,
    state: SessionState,
    registry: Option<Arc<ComponentRegistry>>,
    background: BackgroundStarts,
    run_token: Option<CancellationToken>,
    last_startup: Option<PhaseReport>,
}

impl BootstrapSession {
    /// Create a session. A configured `identity` selects a lock file guard.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let guard: Box<dyn ExclusivityGuard> = match &config.identity {
            Some(identity) => {
                let dir = config.lock_dir.clone().unwrap_or_else(std::env::temp_dir);
                Box::new(LockFileGuard::new(dir, identity))
            }
            None => Box::new(NoopGuard::default()),
        };
        Self::with_guard(config, guard)
    }

    pub fn with_guard(config: SessionConfig, guard: Box<dyn ExclusivityGuard>) -> Result<Self> {
        log::info!("Creating {} v{} session", constants::APP_NAME, constants::APP_VERSION);
        Ok(Self {
            config,
            catalog: PluginCatalog::new()?,
            guard,
            state: SessionState::Uninitialized,
            registry: None,
            background: BackgroundStarts::new(),
            run_token: None,
            last_startup: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Add a plugin. Plugins register their components during `initialize`.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(self.invalid_state("add_plugin"));
        }
        self.catalog.add(plugin)?;
        Ok(())
    }

    /// Acquire exclusivity, create the registry and let plugins register.
    ///
    /// Calling this on an initialized or running session succeeds without
    /// doing anything. On failure the session stays uninitialized and the
    /// guard is released.
    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => {}
            SessionState::Initialized | SessionState::Running => {
                log::debug!("Session already {}, initialize is a no-op", self.state);
                return Ok(());
            }
            SessionState::Stopped => return Err(self.invalid_state("initialize")),
        }

        log::info!("Initializing session...");
        self.guard
            .acquire()
            .map_err(|e| Error::initialization("could not acquire exclusivity guard", e.into()))?;

        let registry = Arc::new(ComponentRegistry::with_overrides(self.config.components.clone()));
        match self.catalog.register_all(&registry, &self.config) {
            Ok(registered) => {
                log::info!(
                    "Session initialized: {} plugin(s), {} component(s)",
                    registered.len(),
                    registry.len()
                );
            }
            Err(e) => {
                if let Err(release) = self.guard.release() {
                    log::warn!("Failed to release exclusivity guard: {}", release);
                }
                return Err(Error::initialization("plugin registration failed", e.into()));
            }
        }

        self.registry = Some(registry);
        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Validate the dependency graph and start every startup-capable component.
    ///
    /// Under [`StartupFailurePolicy::Aggregate`] any failed awaited start fails
    /// the call and the session stays `Initialized`; background starts keep
    /// running either way.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => self.initialize()?,
            SessionState::Initialized => {}
            SessionState::Running | SessionState::Stopped => return Err(self.invalid_state("run")),
        }
        let registry = self.live_registry("run")?;

        ServiceGraph::validate_registry(&registry)?;
        let startup = registry.startup_capable();
        ServiceGraph::build(startup.clone()).check_ordering(LifecyclePhase::Startup)?;
        ServiceGraph::build(registry.shutdown_capable()).check_ordering(LifecyclePhase::Shutdown)?;

        let run_token = cancel.child_token();
        self.run_token = Some(run_token.clone());

        let orchestrator = StartupOrchestrator::with_background(registry, self.background.clone());
        let mut report = orchestrator.execute(startup, &run_token).await?;

        if report.cancelled {
            log::warn!("Startup was cancelled; session stays {}", self.state);
            let failures = std::mem::take(&mut report.failures);
            self.last_startup = Some(report);
            return Err(Error::Cancelled { phase: LifecyclePhase::Startup, failures });
        }

        if !report.failures.is_empty() {
            match self.config.startup_failure_policy {
                StartupFailurePolicy::Aggregate => {
                    let failure = PhaseFailure {
                        phase: LifecyclePhase::Startup,
                        failures: std::mem::take(&mut report.failures),
                    };
                    log::error!("{}; session stays {}", failure, self.state);
                    self.last_startup = Some(report);
                    return Err(Error::Startup(failure));
                }
                StartupFailurePolicy::LogAndContinue => {
                    for failure in &report.failures {
                        log::warn!("Continuing despite: {}", failure);
                    }
                }
            }
        }

        self.last_startup = Some(report);
        self.state = SessionState::Running;
        log::info!("Session running");
        Ok(())
    }

    /// Shut down every shutdown-capable component, release the guard and the
    /// registry. A no-op on an uninitialized or stopped session.
    ///
    /// The session ends up `Stopped` even when shutdown routines fail; the
    /// failures are returned as [`Error::Shutdown`].
    pub async fn stop(&mut self, cancel: &CancellationToken) -> Result<()> {
        match self.state {
            SessionState::Uninitialized | SessionState::Stopped => {
                log::debug!("Session {}, stop is a no-op", self.state);
                return Ok(());
            }
            SessionState::Initialized | SessionState::Running => {}
        }
        let registry = self.live_registry("stop")?;
        log::info!("Stopping session...");

        if let Some(token) = self.run_token.take() {
            token.cancel();
        }
        let pending = self.background.pending();
        if pending > 0 {
            log::info!("Waiting for {} background start(s)", pending);
            if !self.background.drain(cancel).await {
                log::warn!("Stopped waiting for background starts: stop was cancelled");
            }
        }

        let orchestrator = ShutdownOrchestrator::new(registry.clone());
        let outcome = orchestrator.execute(registry.shutdown_capable(), cancel).await;
        self.finish_stop();

        let report = outcome?;
        report.into_result()?;
        Ok(())
    }

    /// Stop the session and consume it.
    pub async fn dispose(mut self) -> Result<()> {
        self.stop(&CancellationToken::new()).await
    }

    fn finish_stop(&mut self) {
        if let Err(e) = self.guard.release() {
            log::warn!("Failed to release exclusivity guard: {}", e);
        }
        self.registry = None;
        self.state = SessionState::Stopped;
        log::info!("Session stopped");
    }

    /// The session's registry. Stays usable for concurrent exports and lookups
    /// while the session runs.
    pub fn registry(&self) -> Result<Arc<ComponentRegistry>> {
        self.live_registry("registry")
    }

    pub fn export<T: Send + Sync + 'static>(&self, export: Export<T>) -> Result<ComponentHandle> {
        Ok(self.live_registry("export")?.export(export)?)
    }

    pub fn get_export<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        Ok(self.live_registry("get_export")?.get_export::<T>()?)
    }

    pub fn get_export_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        Ok(self.live_registry("get_export_named")?.get_export_named::<T>(name)?)
    }

    pub fn get_exports<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
        Ok(self.live_registry("get_exports")?.get_exports::<T>()?)
    }

    pub fn fill_imports<I: Imports + ?Sized>(&self, target: &mut I) -> Result<()> {
        Ok(self.live_registry("fill_imports")?.fill_imports(target)?)
    }

    /// Startup plan for the components registered right now.
    pub fn startup_plan(&self) -> Result<ExecutionPlan> {
        Ok(ExecutionPlan::startup(self.live_registry("startup_plan")?.startup_capable())?)
    }

    /// Shutdown plan for the components registered right now.
    pub fn shutdown_plan(&self) -> Result<ExecutionPlan> {
        Ok(ExecutionPlan::shutdown(self.live_registry("shutdown_plan")?.shutdown_capable())?)
    }

    /// Report of the most recent `run`, successful or not.
    pub fn last_startup_report(&self) -> Option<&PhaseReport> {
        self.last_startup.as_ref()
    }

    /// Tracker for starts launched without being awaited.
    pub fn background(&self) -> &BackgroundStarts {
        &self.background
    }

    /// Components whose background start has failed so far.
    pub fn background_failures(&self) -> Vec<String> {
        self.background.failed_components()
    }

    pub fn is_guard_held(&self) -> bool {
        self.guard.is_held()
    }

    fn live_registry(&self, operation: &'static str) -> Result<Arc<ComponentRegistry>> {
        match (&self.state, &self.registry) {
            (SessionState::Initialized | SessionState::Running, Some(registry)) => Ok(registry.clone()),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidState { operation, state: self.state }
    }
}

impl fmt::Debug for BootstrapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapSession")
            .field("state", &self.state)
            .field("plugins", &self.catalog.names())
            .field("guard_held", &self.guard.is_held())
            .finish()
    }
}

impl Drop for BootstrapSession {
    fn drop(&mut self) {
        if !matches!(self.state, SessionState::Initialized | SessionState::Running) {
            return;
        }
        log::warn!("Session dropped while {}; stopping it synchronously", self.state);
        if let Some(token) = self.run_token.take() {
            token.cancel();
        }
        if let Some(registry) = self.registry.take() {
            shutdown_on_drop(registry);
        }
        self.finish_stop();
    }
}

/// Run shutdown from a synchronous context.
///
/// Inside a multi-thread runtime the caller's runtime drives shutdown, so
/// routines can still await tasks spawned on it. A current-thread runtime
/// cannot be blocked without stalling those tasks; shutdown is skipped there.
fn shutdown_on_drop(registry: Arc<ComponentRegistry>) {
    let orchestrator = ShutdownOrchestrator::new(registry.clone());
    let cancel = CancellationToken::new();

    let outcome = match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
            let skipped: Vec<String> = registry
                .shutdown_capable()
                .into_iter()
                .filter(|h| !h.shutdown_started())
                .map(|h| h.name().to_string())
                .collect();
            if !skipped.is_empty() {
                log::error!(
                    "Session dropped on a current-thread runtime; shutdown skipped for: {} (use dispose().await)",
                    skipped.join(", ")
                );
            }
            return;
        }
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(orchestrator.run_all(&cancel))),
        Err(_) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(orchestrator.run_all(&cancel)),
            Err(e) => {
                log::error!("Could not build runtime for shutdown: {}", e);
                return;
            }
        },
    };
    if let Err(e) = outcome {
        log::error!("Shutdown on drop: {}", e);
    }
}
