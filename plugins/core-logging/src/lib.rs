//! # Core Logging Plugin
//!
//! Installs a `tracing-subscriber` fmt subscriber and forwards `log` records
//! from `keel-core` into it through `tracing-log`.
//!
//! The binary calls [`install`] as early as it can. The plugin also exports a
//! blocking startup component ordered before everything else, so sessions
//! built without the binary still get logging.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_core::kernel::error::Result as KernelResult;
use keel_core::{BoxError, ComponentRegistry, Export, Plugin, StartupAction, VersionRange};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Name of the exported subscriber component.
pub const COMPONENT_NAME: &str = "core-logging.subscriber";

const DEFAULT_FILTER: &str = "info";

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Could not bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("A global tracing subscriber is already set: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Output format of the subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber.
///
/// `filter` takes `EnvFilter` directives; without one, `RUST_LOG` is used and
/// then `info`. Returns `Ok(false)` if logging was already installed.
pub fn install(filter: Option<&str>, format: LogFormat) -> Result<bool, LoggingError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }
    try_install(filter, format).inspect_err(|_| INSTALLED.store(false, Ordering::SeqCst))?;
    Ok(true)
}

fn try_install(filter: Option<&str>, format: LogFormat) -> Result<(), LoggingError> {
    let env_filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_log::LogTracer::init()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    tracing::debug!("Logging installed");
    Ok(())
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

/// Startup component that installs logging if nobody has yet.
#[derive(Debug, Default)]
pub struct LoggingComponent {
    filter: Option<String>,
}

impl StartupAction for LoggingComponent {
    fn start(&self) -> Result<(), BoxError> {
        if install(self.filter.as_deref(), LogFormat::Text)? {
            log::info!("Logging installed by {}", COMPONENT_NAME);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingPlugin {
    filter: Option<String>,
}

impl LoggingPlugin {
    pub fn new(filter: Option<String>) -> Self {
        Self { filter }
    }
}

impl Plugin for LoggingPlugin {
    fn name(&self) -> &'static str {
        "core-logging"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn is_core(&self) -> bool {
        true
    }

    fn compatible_api_versions(&self) -> Vec<VersionRange> {
        const COMPATIBLE_API_REQ: &str = "^0.1";
        match VersionRange::from_constraint(COMPATIBLE_API_REQ) {
            Ok(vr) => vec![vr],
            Err(e) => {
                log::error!(
                    "Failed to parse API version requirement ('{}') for {}: {}",
                    COMPATIBLE_API_REQ,
                    self.name(),
                    e
                );
                vec![]
            }
        }
    }

    fn register(&self, registry: &ComponentRegistry) -> KernelResult<()> {
        let component = LoggingComponent { filter: self.filter.clone() };
        registry.export(
            Export::from_instance(COMPONENT_NAME, Arc::new(component))
                .order(i32::MIN)
                .shutdown_order(i32::MAX)
                .with_blocking_startup(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::OrderKey;

    #[test]
    fn test_plugin_exports_first_blocking_component() {
        let registry = ComponentRegistry::new();
        LoggingPlugin::new(Some("debug".into())).register(&registry).expect("register");

        let handle = registry.handle(COMPONENT_NAME).expect("component");
        assert_eq!(handle.metadata().order(), OrderKey::Explicit(i32::MIN));
        assert!(handle.capabilities().is_startable());
        assert!(!handle.capabilities().is_shutdownable());
        assert!(LoggingPlugin::default().is_core());
    }

    #[test]
    fn test_install_is_idempotent() {
        assert!(matches!(install(Some("keel=loudest"), LogFormat::Text), Err(LoggingError::InvalidFilter(_))));
        assert!(!is_installed(), "a failed install must not count");

        assert!(install(Some("warn"), LogFormat::Text).expect("first install"));
        assert!(!install(Some("warn"), LogFormat::Text).expect("second install"));
        assert!(is_installed());
        LoggingComponent::default().start().expect("component start is a no-op now");
    }
}
