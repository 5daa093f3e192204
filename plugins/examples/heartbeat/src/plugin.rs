//! Example plugin exporting two components:
//!
//! - `heartbeat`: awaited async startup that spawns a ticker, and a shutdown
//!   routine that stops it.
//! - `heartbeat.reporter`: imports the heartbeat through the registry and
//!   starts in the background, waiting for the first beat.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keel_core::kernel::error::Result as KernelResult;
use keel_core::{
    AsyncStartupAction, BoxError, CancellationToken, ComponentRegistry, Export, Plugin,
    ShutdownAction, VersionRange,
};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub const HEARTBEAT: &str = "heartbeat";
pub const REPORTER: &str = "heartbeat.reporter";

/// Counts beats on a fixed interval until stopped or cancelled.
pub struct Heartbeat {
    interval: Duration,
    beats: Arc<AtomicU64>,
    first_beat: Arc<Notify>,
    ticker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            beats: Arc::new(AtomicU64::new(0)),
            first_beat: Arc::new(Notify::new()),
            ticker: Mutex::new(None),
        }
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.lock().is_some()
    }

    /// Resolves after the first beat.
    pub async fn wait_first_beat(&self) {
        let notified = self.first_beat.notified();
        if self.beats() > 0 {
            return;
        }
        notified.await;
    }
}

#[async_trait]
impl AsyncStartupAction for Heartbeat {
    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        let stop = cancel.child_token();
        let token = stop.clone();
        let interval = self.interval;
        let beats = self.beats.clone();
        let first_beat = self.first_beat.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let n = beats.fetch_add(1, Ordering::SeqCst) + 1;
                        log::debug!("heartbeat #{}", n);
                        if n == 1 {
                            first_beat.notify_waiters();
                        }
                    }
                }
            }
        });

        if let Some((old, _)) = self.ticker.lock().replace((stop, task)) {
            old.cancel();
        }
        log::info!("Heartbeat started ({:?} interval)", interval);
        Ok(())
    }
}

#[async_trait]
impl ShutdownAction for Heartbeat {
    async fn shutdown(&self, _cancel: CancellationToken) -> Result<(), BoxError> {
        let ticker = self.ticker.lock().take();
        if let Some((stop, task)) = ticker {
            stop.cancel();
            task.await?;
        }
        log::info!("Heartbeat stopped after {} beat(s)", self.beats());
        Ok(())
    }
}

/// Waits for the heartbeat's first beat, then logs it.
pub struct Reporter {
    heartbeat: Arc<Heartbeat>,
}

#[async_trait]
impl AsyncStartupAction for Reporter {
    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        tokio::select! {
            _ = self.heartbeat.wait_first_beat() => {
                log::info!("Heartbeat is alive ({} beat(s))", self.heartbeat.beats());
                Ok(())
            }
            _ = cancel.cancelled() => Err("cancelled before the first heartbeat".into()),
        }
    }
}

pub struct HeartbeatPlugin {
    interval: Duration,
}

impl HeartbeatPlugin {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for HeartbeatPlugin {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl Plugin for HeartbeatPlugin {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn compatible_api_versions(&self) -> Vec<VersionRange> {
        match VersionRange::from_constraint("^0.1") {
            Ok(vr) => vec![vr],
            Err(e) => {
                log::error!("Invalid API requirement for {}: {}", self.name(), e);
                vec![]
            }
        }
    }

    fn register(&self, registry: &ComponentRegistry) -> KernelResult<()> {
        let interval = self.interval;
        registry.export(
            Export::new(HEARTBEAT, move |_| Ok(Heartbeat::new(interval)))
                .order(10)
                .shutdown_order(10)
                .with_startup()
                .with_shutdown(),
        )?;
        registry.export(
            Export::new(REPORTER, |r: &ComponentRegistry| {
                let heartbeat = r.get_export_named::<Heartbeat>(HEARTBEAT)?;
                Ok(Reporter { heartbeat })
            })
            .order(20)
            .await_start(false)
            .depends_on(HEARTBEAT)
            .with_startup(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
