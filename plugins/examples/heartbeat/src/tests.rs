use std::time::Duration;

use keel_core::{BootstrapSession, CancellationToken, SessionConfig, SessionState};

use super::*;

#[tokio::test]
async fn test_heartbeat_ticks_until_shutdown() {
    let mut session = BootstrapSession::new(SessionConfig::default()).expect("session");
    session
        .add_plugin(Box::new(HeartbeatPlugin::new(Duration::from_millis(10))))
        .expect("add plugin");

    session.run(&CancellationToken::new()).await.expect("run");
    assert_eq!(session.state(), SessionState::Running);

    let heartbeat = session.get_export::<Heartbeat>().expect("heartbeat");
    assert!(heartbeat.is_ticking());
    session.background().drain(&CancellationToken::new()).await;
    assert!(heartbeat.beats() >= 1);
    assert!(session.background_failures().is_empty());

    session.dispose().await.expect("dispose");
    assert!(!heartbeat.is_ticking());
    let after = heartbeat.beats();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(heartbeat.beats(), after, "ticker must stop on shutdown");
}

#[test]
fn test_plugin_registers_reporter_after_heartbeat() {
    let registry = ComponentRegistry::new();
    HeartbeatPlugin::default().register(&registry).expect("register");

    let reporter = registry.handle(REPORTER).expect("reporter");
    assert_eq!(reporter.metadata().depends_on(), &[HEARTBEAT.to_string()]);
    assert!(!reporter.metadata().await_start());
    assert!(!reporter.capabilities().is_shutdownable());
    assert!(!registry.handle(HEARTBEAT).expect("heartbeat").is_instantiated());
}
