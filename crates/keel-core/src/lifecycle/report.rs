use std::fmt;

use crate::component::metadata::OrderKey;
use crate::kernel::error::LifecyclePhase;
use crate::lifecycle::failure::{ComponentFailure, PhaseError, PhaseFailure};
use crate::lifecycle::plan::ExecutionPlan;

/// Shape of one executed group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub key: OrderKey,
    pub waves: Vec<Vec<String>>,
}

/// What happened during one orchestrator run.
#[derive(Debug)]
pub struct PhaseReport {
    pub phase: LifecyclePhase,
    pub groups: Vec<GroupSummary>,
    /// Components whose routine was launched, in launch order.
    pub launched: Vec<String>,
    /// Awaited components whose routine finished successfully.
    pub completed: Vec<String>,
    /// Components launched without being awaited.
    pub background: Vec<String>,
    /// Shutdown only: components another run had already claimed.
    pub skipped: Vec<String>,
    pub failures: Vec<ComponentFailure>,
    pub cancelled: bool,
}

impl PhaseReport {
    pub(crate) fn new(plan: &ExecutionPlan) -> Self {
        Self {
            phase: plan.phase(),
            groups: plan
                .groups()
                .iter()
                .map(|g| GroupSummary { key: g.key(), waves: g.wave_names() })
                .collect(),
            launched: Vec::new(),
            completed: Vec::new(),
            background: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }

    pub fn failed_components(&self) -> Vec<&str> {
        self.failures.iter().map(ComponentFailure::component).collect()
    }

    /// Turn a failed or cancelled run into the matching [`PhaseError`].
    pub fn into_result(self) -> Result<PhaseReport, PhaseError> {
        if self.cancelled {
            Err(PhaseError::Cancelled {
                phase: self.phase,
                launched: self.launched.len(),
                failures: self.failures,
            })
        } else if !self.failures.is_empty() {
            Err(PhaseError::Failed(PhaseFailure {
                phase: self.phase,
                failures: self.failures,
            }))
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} group(s), {} launched, {} completed, {} in background, {} failed",
            self.phase,
            self.groups.len(),
            self.launched.len(),
            self.completed.len(),
            self.background.len(),
            self.failures.len()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
