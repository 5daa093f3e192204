use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::component::handle::{ComponentHandle, StartupRoutine};
use crate::graph::{DependencyError, ServiceNode};
use crate::kernel::error::LifecyclePhase;
use crate::lifecycle::background::BackgroundStarts;
use crate::lifecycle::failure::{ComponentFailure, PhaseError};
use crate::lifecycle::plan::ExecutionPlan;
use crate::lifecycle::report::PhaseReport;
use crate::lifecycle::resolve_instance;
use crate::registry::ComponentRegistry;

/// Runs startup routines group by group.
///
/// Groups run strictly in ascending `order`. Inside a group, each dependency
/// wave is launched concurrently and its awaited members are joined before the
/// next wave or group begins. Members with `await_start == false` are launched
/// and handed to [`BackgroundStarts`]; later groups do not wait for them.
pub struct StartupOrchestrator {
    registry: Arc<ComponentRegistry>,
    background: BackgroundStarts,
}

impl StartupOrchestrator {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::with_background(registry, BackgroundStarts::new())
    }

    /// Share a background tracker owned by someone else, e.g. the session.
    pub fn with_background(registry: Arc<ComponentRegistry>, background: BackgroundStarts) -> Self {
        Self { registry, background }
    }

    pub fn background(&self) -> &BackgroundStarts {
        &self.background
    }

    /// Start every startup-capable component in the registry.
    pub async fn run_all(&self, cancel: &CancellationToken) -> Result<PhaseReport, PhaseError> {
        self.run(self.registry.startup_capable(), cancel).await
    }

    /// Start `components` and fail if any awaited start failed or the run was cancelled.
    pub async fn run(
        &self,
        components: Vec<ComponentHandle>,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, PhaseError> {
        self.execute(components, cancel).await?.into_result()
    }

    /// Start `components` and report what happened.
    ///
    /// Only configuration problems (cycles, order conflicts) are errors here;
    /// component failures and cancellation are recorded in the report.
    pub async fn execute(
        &self,
        components: Vec<ComponentHandle>,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, DependencyError> {
        let plan = ExecutionPlan::startup(components)?;
        let mut report = PhaseReport::new(&plan);
        // Components that failed or were skipped; their dependents are skipped too
        let mut unavailable: HashSet<String> = HashSet::new();

        log::info!("Starting {} component(s) in {} group(s)", plan.len(), plan.groups().len());

        'groups: for group in plan.groups() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            log::debug!("Starting group {} ({} component(s))", group.key(), group.len());

            for wave in group.waves() {
                let mut awaited: Vec<(String, JoinHandle<Result<(), ComponentFailure>>)> = Vec::new();
                let mut stop = false;

                for node in wave {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                        stop = true;
                        break;
                    }
                    let name = node.name().to_string();

                    if let Some(dependency) = node.depends_on().iter().find(|d| unavailable.contains(*d)) {
                        log::warn!("Skipping '{}': dependency '{}' did not start", name, dependency);
                        report.failures.push(ComponentFailure::DependencyFailed {
                            component: name.clone(),
                            dependency: dependency.clone(),
                        });
                        unavailable.insert(name);
                        continue;
                    }

                    let start = start_component(node.clone(), self.registry.clone(), cancel.clone());
                    report.launched.push(name.clone());

                    if node.metadata().await_start() {
                        awaited.push((name, tokio::spawn(start)));
                    } else {
                        log::debug!("Launching '{}' in the background", name);
                        let tracker = self.background.clone();
                        let task_name = name.clone();
                        let task = tokio::spawn(async move {
                            match start.await {
                                Ok(()) => tracker.record_completed(task_name),
                                Err(failure) => tracker.record_failure(failure),
                            }
                        });
                        self.background.track(name.clone(), task);
                        report.background.push(name);
                    }
                }

                // Barrier: every awaited member of this wave settles before moving on
                let results = join_all(
                    awaited
                        .into_iter()
                        .map(|(name, task)| async move { (name, task.await) }),
                )
                .await;

                for (name, result) in results {
                    let outcome = match result {
                        Ok(outcome) => outcome,
                        Err(join) => Err(ComponentFailure::from_join_error(&name, LifecyclePhase::Startup, join)),
                    };
                    match outcome {
                        Ok(()) => {
                            log::debug!("Component '{}' started", name);
                            report.completed.push(name);
                        }
                        Err(failure) => {
                            log::error!("{}", failure);
                            report.failures.push(failure);
                            unavailable.insert(name);
                        }
                    }
                }

                if stop {
                    break 'groups;
                }
            }
        }

        if report.cancelled {
            log::warn!("Startup cancelled after launching {} component(s)", report.launched.len());
        } else {
            log::info!("{}", report);
        }
        Ok(report)
    }
}

/// Resolve and start one component. Panics become [`ComponentFailure::Panicked`].
async fn start_component(
    node: Arc<ServiceNode>,
    registry: Arc<ComponentRegistry>,
    cancel: CancellationToken,
) -> Result<(), ComponentFailure> {
    let name = node.name().to_string();
    let instance = resolve_instance(&registry, node.handle(), LifecyclePhase::Startup).await?;

    match instance.startup().cloned() {
        Some(StartupRoutine::Async(action)) => {
            log::trace!("Running async start of '{}'", name);
            match AssertUnwindSafe(action.start(cancel)).catch_unwind().await {
                Ok(result) => result.map_err(|source| ComponentFailure::StartExecution {
                    component: name,
                    source,
                }),
                Err(payload) => Err(ComponentFailure::panicked(&name, LifecyclePhase::Startup, payload)),
            }
        }
        Some(StartupRoutine::Blocking(action)) => {
            log::trace!("Running blocking start of '{}'", name);
            match tokio::task::spawn_blocking(move || action.start()).await {
                Ok(result) => result.map_err(|source| ComponentFailure::StartExecution {
                    component: name,
                    source,
                }),
                Err(join) => Err(ComponentFailure::from_join_error(&name, LifecyclePhase::Startup, join)),
            }
        }
        None => {
            log::debug!("Component '{}' has no startup routine", name);
            Ok(())
        }
    }
}
