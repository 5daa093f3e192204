use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Error type returned by component lifecycle routines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Blocking startup routine. Runs on the blocking pool, never on an async worker.
pub trait StartupAction: Send + Sync {
    fn start(&self) -> Result<(), BoxError>;
}

/// Asynchronous startup routine.
///
/// Implementations that wait on long-running work should observe `cancel`
/// so a cancelled session stops them promptly.
#[async_trait]
pub trait AsyncStartupAction: Send + Sync {
    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError>;
}

/// Asynchronous shutdown routine. Invoked at most once per component per session.
#[async_trait]
pub trait ShutdownAction: Send + Sync {
    async fn shutdown(&self, cancel: CancellationToken) -> Result<(), BoxError>;
}

/// Which startup style a component declared at export time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupKind {
    Blocking,
    Async,
}

/// Capabilities declared for an export, known without instantiating it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub startup: Option<StartupKind>,
    pub shutdown: bool,
}

impl Capabilities {
    pub fn is_startable(&self) -> bool {
        self.startup.is_some()
    }

    pub fn is_shutdownable(&self) -> bool {
        self.shutdown
    }
}
