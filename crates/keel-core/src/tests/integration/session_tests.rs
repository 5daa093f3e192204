#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::{SessionConfig, StartupFailurePolicy};
use crate::graph::DependencyError;
use crate::kernel::bootstrap::{BootstrapSession, SessionState};
use crate::kernel::error::{Error, LifecyclePhase};
use crate::kernel::exclusivity::ExclusivityError;
use crate::lifecycle::ComponentFailure;
use crate::tests::common::{probe_export, Probe, Recorder};

fn initialized(config: SessionConfig) -> BootstrapSession {
    let mut session = BootstrapSession::new(config).expect("session");
    session.initialize().expect("initialize");
    session
}

#[tokio::test]
async fn test_dispose_running_session_shuts_down_each_component_once() {
    let rec = Recorder::new();
    let session = {
        let mut session = initialized(SessionConfig::default());
        session.export(probe_export(Probe::new("db", &rec)).order(1).shutdown_order(3)).expect("export");
        session.export(probe_export(Probe::new("cache", &rec)).order(1).shutdown_order(2)).expect("export");
        session
            .export(probe_export(Probe::new("api", &rec)).order(2).shutdown_order(1).depends_on("db"))
            .expect("export");
        session.run(&CancellationToken::new()).await.expect("run");
        session
    };
    assert_eq!(session.state(), SessionState::Running);

    session.dispose().await.expect("dispose");

    for name in ["db", "cache", "api"] {
        assert_eq!(rec.count(&format!("shutdown:{}", name)), 1, "{:?}", rec.events());
    }
    rec.assert_before("shutdown:api", "shutdown:cache");
    rec.assert_before("shutdown:cache", "shutdown:db");
}

#[tokio::test]
async fn test_stop_on_never_initialized_session_is_a_noop() {
    let mut session = BootstrapSession::new(SessionConfig::default()).expect("session");
    session.stop(&CancellationToken::new()).await.expect("stop");
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_failed_run_stays_initialized_and_names_the_failure() {
    let rec = Recorder::new();
    let mut session = initialized(SessionConfig::default());
    session.export(probe_export(Probe::new("good", &rec)).order(1)).expect("export");
    session.export(probe_export(Probe::new("bad", &rec).failing_start()).order(1)).expect("export");
    session.export(probe_export(Probe::new("later", &rec)).order(2)).expect("export");

    match session.run(&CancellationToken::new()).await {
        Err(Error::Startup(failure)) => {
            assert_eq!(failure.phase, LifecyclePhase::Startup);
            assert_eq!(failure.components(), vec!["bad"]);
        }
        other => panic!("expected startup failure, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Initialized);
    assert!(rec.contains("started:later"));

    // Cleanup still reaches everything
    session.stop(&CancellationToken::new()).await.expect("stop");
    assert_eq!(rec.count("shutdown:good"), 1);
    assert_eq!(rec.count("shutdown:bad"), 1);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_log_and_continue_policy_reaches_running() {
    let rec = Recorder::new();
    let config = SessionConfig {
        startup_failure_policy: StartupFailurePolicy::LogAndContinue,
        ..SessionConfig::default()
    };
    let mut session = initialized(config);
    session.export(probe_export(Probe::new("bad", &rec).failing_start()).order(1)).expect("export");
    session.export(probe_export(Probe::new("needs_bad", &rec)).order(2).depends_on("bad")).expect("export");
    session.export(probe_export(Probe::new("fine", &rec)).order(2)).expect("export");

    session.run(&CancellationToken::new()).await.expect("run continues");

    assert_eq!(session.state(), SessionState::Running);
    let report = session.last_startup_report().expect("report");
    assert_eq!(report.failed_components(), vec!["bad", "needs_bad"]);
    assert!(matches!(report.failures[1], ComponentFailure::DependencyFailed { .. }));
    assert!(rec.contains("started:fine"));
    session.dispose().await.expect("dispose");
}

#[tokio::test]
async fn test_cycle_is_rejected_before_anything_starts() {
    let rec = Recorder::new();
    let mut session = initialized(SessionConfig::default());
    session.export(probe_export(Probe::new("a", &rec)).depends_on("b")).expect("export");
    session.export(probe_export(Probe::new("b", &rec)).depends_on("a")).expect("export");
    session.export(probe_export(Probe::new("free", &rec))).expect("export");

    match session.run(&CancellationToken::new()).await {
        Err(Error::Dependency(DependencyError::CyclicDependency(cycle))) => {
            assert!(cycle.contains(&"a".to_string()) && cycle.contains(&"b".to_string()));
        }
        other => panic!("expected cycle, got {:?}", other),
    }
    assert!(rec.events().is_empty(), "nothing may start: {:?}", rec.events());
    assert_eq!(session.state(), SessionState::Initialized);
}

#[tokio::test]
async fn test_missing_dependency_is_rejected() {
    let rec = Recorder::new();
    let mut session = initialized(SessionConfig::default());
    session.export(probe_export(Probe::new("api", &rec)).depends_on("db")).expect("export");

    assert!(matches!(
        session.run(&CancellationToken::new()).await,
        Err(Error::Dependency(DependencyError::MissingComponent { .. }))
    ));
    assert!(rec.events().is_empty());
}

#[tokio::test]
async fn test_unawaited_failure_is_recorded_but_not_fatal() {
    let rec = Recorder::new();
    let mut session = initialized(SessionConfig::default());
    session.export(probe_export(Probe::new("a", &rec)).order(10)).expect("export");
    session
        .export(
            probe_export(Probe::new("b", &rec).delayed(Duration::from_millis(50)).failing_start())
                .order(10)
                .await_start(false),
        )
        .expect("export");
    session.export(probe_export(Probe::new("c", &rec)).order(20)).expect("export");

    session.run(&CancellationToken::new()).await.expect("run succeeds");
    assert_eq!(session.state(), SessionState::Running);
    rec.assert_before("started:a", "start:c");

    session.background().drain(&CancellationToken::new()).await;
    assert!(rec.contains("failed:b"));
    assert_eq!(session.background_failures(), vec!["b"]);
    session.dispose().await.expect("dispose");
}

#[tokio::test]
async fn test_stop_cancels_background_starts() {
    let rec = Recorder::new();
    let gate = Arc::new(Notify::new());
    let mut session = initialized(SessionConfig::default());
    session
        .export(probe_export(Probe::new("worker", &rec).gated(gate).cancellable()).await_start(false))
        .expect("export");

    session.run(&CancellationToken::new()).await.expect("run");
    session.stop(&CancellationToken::new()).await.expect("stop");

    assert!(rec.contains("cancelled:worker"));
    assert_eq!(rec.count("shutdown:worker"), 1);
    rec.assert_before("cancelled:worker", "shutdown:worker");
}

#[tokio::test]
async fn test_caller_cancellation_aborts_run() {
    let rec = Recorder::new();
    let mut session = initialized(SessionConfig::default());
    session.export(probe_export(Probe::new("a", &rec))).expect("export");
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        session.run(&cancel).await,
        Err(Error::Cancelled { phase: LifecyclePhase::Startup, .. })
    ));
    assert_eq!(session.state(), SessionState::Initialized);
    assert!(!rec.contains("start:a"));
}

#[tokio::test]
async fn test_second_session_with_same_identity_cannot_initialize() {
    let dir = tempdir().expect("Failed to create temporary directory");
    let config = SessionConfig {
        identity: Some("singleton".to_string()),
        lock_dir: Some(dir.path().to_path_buf()),
        ..SessionConfig::default()
    };

    let mut first = BootstrapSession::new(config.clone()).expect("session");
    first.initialize().expect("first initialize");
    assert!(dir.path().join("singleton.lock").exists());

    let mut second = BootstrapSession::new(config.clone()).expect("session");
    match second.initialize() {
        Err(Error::Initialization { source: Some(source), .. }) => {
            assert!(matches!(*source, Error::Exclusivity(ExclusivityError::AlreadyHeld { .. })));
        }
        other => panic!("expected exclusivity failure, got {:?}", other),
    }
    assert_eq!(second.state(), SessionState::Uninitialized);

    first.dispose().await.expect("dispose");
    assert!(!dir.path().join("singleton.lock").exists());
    second.initialize().expect("initialize after the first session is gone");
    second.dispose().await.expect("dispose");
}

#[tokio::test]
async fn test_shutdown_failures_are_reported_after_stopping() {
    let rec = Recorder::new();
    let mut session = initialized(SessionConfig::default());
    session.export(probe_export(Probe::new("stubborn", &rec).failing_shutdown())).expect("export");
    session.export(probe_export(Probe::new("polite", &rec))).expect("export");
    session.run(&CancellationToken::new()).await.expect("run");

    match session.stop(&CancellationToken::new()).await {
        Err(Error::Shutdown(failure)) => assert_eq!(failure.components(), vec!["stubborn"]),
        other => panic!("expected shutdown failure, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(rec.contains("shutdown:polite"));
}

#[tokio::test]
async fn test_config_overrides_reorder_components() {
    let rec = Recorder::new();
    let config = SessionConfig::parse(
        r#"{ "components": { "late": { "order": 1 }, "early": { "order": 2 } } }"#,
        crate::config::ConfigFormat::Json,
    )
    .expect("config");
    let mut session = initialized(config);
    session.export(probe_export(Probe::new("early", &rec)).order(1)).expect("export");
    session.export(probe_export(Probe::new("late", &rec)).order(2)).expect("export");

    session.run(&CancellationToken::new()).await.expect("run");
    rec.assert_before("started:late", "start:early");
    session.dispose().await.expect("dispose");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_session_reclaims_lock_of_crashed_process() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("svc.lock"), "4194305\n").expect("write stale lock");
    let config = SessionConfig {
        identity: Some("svc".to_string()),
        lock_dir: Some(dir.path().to_path_buf()),
        ..SessionConfig::default()
    };

    let mut session = BootstrapSession::new(config).expect("session");
    session.initialize().expect("stale lock does not block initialization");
    assert!(session.is_guard_held());
    session.dispose().await.expect("dispose");
    assert!(!dir.path().join("svc.lock").exists());
}
