use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::failure::ComponentFailure;

#[derive(Default)]
struct Inner {
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
    completed: Mutex<Vec<String>>,
    failures: Mutex<Vec<ComponentFailure>>,
}

/// Startups that were launched but not awaited.
///
/// Each task records its own outcome when it finishes, whether or not anyone
/// is waiting on it. Clones share state.
#[derive(Clone, Default)]
pub struct BackgroundStarts {
    inner: Arc<Inner>,
}

impl BackgroundStarts {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track(&self, name: String, task: JoinHandle<()>) {
        self.inner.tasks.lock().push((name, task));
    }

    pub(crate) fn record_completed(&self, name: String) {
        self.inner.completed.lock().push(name);
    }

    pub(crate) fn record_failure(&self, failure: ComponentFailure) {
        log::error!("Background start failed: {}", failure);
        self.inner.failures.lock().push(failure);
    }

    /// Number of background starts that have not finished yet.
    pub fn pending(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .count()
    }

    pub fn completed(&self) -> Vec<String> {
        self.inner.completed.lock().clone()
    }

    /// Names of components whose background start failed so far.
    pub fn failed_components(&self) -> Vec<String> {
        self.inner
            .failures
            .lock()
            .iter()
            .map(|f| f.component().to_string())
            .collect()
    }

    /// Remove and return the failures recorded so far.
    pub fn take_failures(&self) -> Vec<ComponentFailure> {
        std::mem::take(&mut *self.inner.failures.lock())
    }

    /// Wait for every tracked start to finish.
    ///
    /// Returns `false` if `cancel` fired first; unfinished tasks stay tracked
    /// and keep running.
    pub async fn drain(&self, cancel: &CancellationToken) -> bool {
        loop {
            let next = self.inner.tasks.lock().pop();
            let Some((name, mut task)) = next else {
                return true;
            };
            tokio::select! {
                biased;
                _ = &mut task => {
                    log::trace!("Background start of '{}' settled", name);
                }
                _ = cancel.cancelled() => {
                    self.inner.tasks.lock().push((name, task));
                    return false;
                }
            }
        }
    }
}
