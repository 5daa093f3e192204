#![cfg(test)]

use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::kernel::bootstrap::{BootstrapSession, SessionState};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::{Plugin, PluginSystemError, VersionRange};
use crate::registry::ComponentRegistry;
use crate::tests::common::{probe_export, Probe, Recorder};

struct ServicePlugin {
    name: &'static str,
    api: &'static str,
    recorder: Recorder,
}

impl Plugin for ServicePlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &str {
        "0.3.1"
    }

    fn compatible_api_versions(&self) -> Vec<VersionRange> {
        vec![VersionRange::from_constraint(self.api).expect("valid range")]
    }

    fn register(&self, registry: &ComponentRegistry) -> Result<()> {
        registry.export(probe_export(Probe::new(&format!("{}.service", self.name), &self.recorder)))?;
        Ok(())
    }
}

fn plugin(name: &'static str, api: &'static str, recorder: &Recorder) -> Box<dyn Plugin> {
    Box::new(ServicePlugin { name, api, recorder: recorder.clone() })
}

#[tokio::test]
async fn test_plugins_contribute_components_to_the_session() {
    let rec = Recorder::new();
    let config = SessionConfig {
        disabled_plugins: vec!["muted".to_string()],
        ..SessionConfig::default()
    };
    let mut session = BootstrapSession::new(config).expect("session");
    session.add_plugin(plugin("storage", "^0.1", &rec)).expect("add");
    session.add_plugin(plugin("muted", "^0.1", &rec)).expect("add");

    session.run(&CancellationToken::new()).await.expect("run");

    let registry = session.registry().expect("registry");
    assert!(registry.contains("storage.service"));
    assert!(!registry.contains("muted.service"));
    assert!(rec.contains("started:storage.service"));
    session.dispose().await.expect("dispose");
}

#[test]
fn test_incompatible_plugin_fails_initialization() {
    let rec = Recorder::new();
    let mut session = BootstrapSession::new(SessionConfig::default()).expect("session");
    session.add_plugin(plugin("legacy", ">=1.0", &rec)).expect("add");

    match session.initialize() {
        Err(Error::Initialization { source: Some(source), .. }) => {
            assert!(matches!(*source, Error::PluginSystem(PluginSystemError::IncompatibleApi { .. })));
        }
        other => panic!("expected initialization failure, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[test]
fn test_duplicate_plugin_names_are_rejected_by_the_session() {
    let rec = Recorder::new();
    let mut session = BootstrapSession::new(SessionConfig::default()).expect("session");
    session.add_plugin(plugin("twin", "^0.1", &rec)).expect("add");
    assert!(matches!(
        session.add_plugin(plugin("twin", "^0.1", &rec)),
        Err(Error::PluginSystem(PluginSystemError::DuplicatePlugin { .. }))
    ));
}
