use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::component::handle::ComponentHandle;
use crate::graph::{DependencyError, ServiceNode};
use crate::kernel::error::LifecyclePhase;
use crate::lifecycle::failure::{ComponentFailure, PhaseError};
use crate::lifecycle::plan::ExecutionPlan;
use crate::lifecycle::report::PhaseReport;
use crate::lifecycle::resolve_instance;
use crate::registry::ComponentRegistry;

/// Runs shutdown routines group by group, in ascending `shutdown_order`.
///
/// Every routine is awaited. A component is only shut down by the run that
/// wins its shutdown guard, so overlapping or repeated runs never invoke a
/// routine twice. A failing shutdown does not stop the others.
pub struct ShutdownOrchestrator {
    registry: Arc<ComponentRegistry>,
}

impl ShutdownOrchestrator {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Shut down every shutdown-capable component in the registry.
    pub async fn run_all(&self, cancel: &CancellationToken) -> Result<PhaseReport, PhaseError> {
        self.run(self.registry.shutdown_capable(), cancel).await
    }

    pub async fn run(
        &self,
        components: Vec<ComponentHandle>,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, PhaseError> {
        self.execute(components, cancel).await?.into_result()
    }

    pub async fn execute(
        &self,
        components: Vec<ComponentHandle>,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, DependencyError> {
        let plan = ExecutionPlan::shutdown(components)?;
        let mut report = PhaseReport::new(&plan);

        log::info!("Shutting down {} component(s) in {} group(s)", plan.len(), plan.groups().len());

        'groups: for group in plan.groups() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            log::debug!("Shutting down group {} ({} component(s))", group.key(), group.len());

            for wave in group.waves() {
                let mut running: Vec<(String, JoinHandle<Result<(), ComponentFailure>>)> = Vec::new();
                let mut stop = false;

                for node in wave {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                        stop = true;
                        break;
                    }
                    let name = node.name().to_string();
                    if !node.start_shutdown() {
                        log::debug!("Shutdown of '{}' already started elsewhere", name);
                        report.skipped.push(name);
                        continue;
                    }
                    report.launched.push(name.clone());
                    running.push((
                        name,
                        tokio::spawn(stop_component(node.clone(), self.registry.clone(), cancel.clone())),
                    ));
                }

                let results = join_all(
                    running
                        .into_iter()
                        .map(|(name, task)| async move { (name, task.await) }),
                )
                .await;

                for (name, result) in results {
                    let outcome = match result {
                        Ok(outcome) => outcome,
                        Err(join) => Err(ComponentFailure::from_join_error(&name, LifecyclePhase::Shutdown, join)),
                    };
                    match outcome {
                        Ok(()) => report.completed.push(name),
                        Err(failure) => {
                            log::error!("{}", failure);
                            report.failures.push(failure);
                        }
                    }
                }

                if stop {
                    break 'groups;
                }
            }
        }

        log::info!("{}", report);
        Ok(report)
    }
}

async fn stop_component(
    node: Arc<ServiceNode>,
    registry: Arc<ComponentRegistry>,
    cancel: CancellationToken,
) -> Result<(), ComponentFailure> {
    let name = node.name().to_string();
    if !node.handle().is_instantiated() {
        log::debug!("Constructing '{}' so it can be shut down", name);
    }
    let instance = resolve_instance(&registry, node.handle(), LifecyclePhase::Shutdown).await?;

    let Some(action) = instance.shutdown().cloned() else {
        log::debug!("Component '{}' has no shutdown routine", name);
        return Ok(());
    };

    match AssertUnwindSafe(action.shutdown(cancel)).catch_unwind().await {
        Ok(result) => result.map_err(|source| ComponentFailure::ShutdownExecution {
            component: name,
            source,
        }),
        Err(payload) => Err(ComponentFailure::panicked(&name, LifecyclePhase::Shutdown, payload)),
    }
}
