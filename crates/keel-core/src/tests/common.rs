#![cfg(test)]

//! Shared fixtures for unit and integration tests: probe components that
//! record what happened to them, in order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::component::traits::{AsyncStartupAction, BoxError, ShutdownAction, StartupAction};
use crate::registry::{ComponentRegistry, Export};

/// Ordered log of lifecycle events shared between probes.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }

    /// Panics unless `first` was recorded before `second`.
    pub fn assert_before(&self, first: &str, second: &str) {
        let a = self.position(first).unwrap_or_else(|| panic!("'{}' not recorded: {:?}", first, self.events()));
        let b = self.position(second).unwrap_or_else(|| panic!("'{}' not recorded: {:?}", second, self.events()));
        assert!(a < b, "expected '{}' before '{}', got {:?}", first, second, self.events());
    }
}

/// Async probe component: records `start:<name>`/`started:<name>` and
/// `shutdown:<name>`, optionally waits on a gate or fails.
pub struct Probe {
    name: String,
    recorder: Recorder,
    fail_start: bool,
    fail_shutdown: bool,
    panic_start: bool,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    observe_cancel: bool,
}

impl Probe {
    pub fn new(name: &str, recorder: &Recorder) -> Self {
        Self {
            name: name.to_string(),
            recorder: recorder.clone(),
            fail_start: false,
            fail_shutdown: false,
            panic_start: false,
            delay: None,
            gate: None,
            observe_cancel: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn panicking_start(mut self) -> Self {
        self.panic_start = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Start does not finish until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// While gated, give up as soon as the cancellation token fires.
    pub fn cancellable(mut self) -> Self {
        self.observe_cancel = true;
        self
    }
}

#[async_trait]
impl AsyncStartupAction for Probe {
    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        self.recorder.record(format!("start:{}", self.name));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            if self.observe_cancel {
                tokio::select! {
                    _ = gate.notified() => {}
                    _ = cancel.cancelled() => {
                        self.recorder.record(format!("cancelled:{}", self.name));
                        return Err("start cancelled".into());
                    }
                }
            } else {
                gate.notified().await;
            }
        }
        if self.panic_start {
            panic!("probe {} panicked", self.name);
        }
        if self.fail_start {
            self.recorder.record(format!("failed:{}", self.name));
            return Err(format!("{} refused to start", self.name).into());
        }
        self.recorder.record(format!("started:{}", self.name));
        Ok(())
    }
}

#[async_trait]
impl ShutdownAction for Probe {
    async fn shutdown(&self, _cancel: CancellationToken) -> Result<(), BoxError> {
        self.recorder.record(format!("shutdown:{}", self.name));
        if self.fail_shutdown {
            return Err(format!("{} refused to stop", self.name).into());
        }
        Ok(())
    }
}

/// Blocking probe component.
pub struct BlockingProbe {
    name: String,
    recorder: Recorder,
    fail: bool,
    sleep: Option<Duration>,
}

impl BlockingProbe {
    pub fn new(name: &str, recorder: &Recorder) -> Self {
        Self { name: name.to_string(), recorder: recorder.clone(), fail: false, sleep: None }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn sleeping(mut self, sleep: Duration) -> Self {
        self.sleep = Some(sleep);
        self
    }
}

impl StartupAction for BlockingProbe {
    fn start(&self) -> Result<(), BoxError> {
        self.recorder.record(format!("start:{}", self.name));
        if let Some(sleep) = self.sleep {
            std::thread::sleep(sleep);
        }
        if self.fail {
            self.recorder.record(format!("failed:{}", self.name));
            return Err(format!("{} refused to start", self.name).into());
        }
        self.recorder.record(format!("started:{}", self.name));
        Ok(())
    }
}

/// Export a probe with both startup and shutdown capabilities.
pub fn probe_export(probe: Probe) -> Export<Probe> {
    let name = probe.name.clone();
    let probe = Arc::new(probe);
    Export::from_instance(name, probe).with_startup().with_shutdown()
}

/// Export a blocking probe.
pub fn blocking_export(probe: BlockingProbe) -> Export<BlockingProbe> {
    let name = probe.name.clone();
    Export::from_instance(name, Arc::new(probe)).with_blocking_startup()
}

/// Register a batch of probe exports, panicking on duplicates.
pub fn registry_with(exports: Vec<Export<Probe>>) -> Arc<ComponentRegistry> {
    let registry = Arc::new(ComponentRegistry::new());
    for export in exports {
        registry.export(export).expect("export probe");
    }
    registry
}
