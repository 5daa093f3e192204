use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::component::handle::ComponentHandle;
use crate::component::metadata::ComponentMetadata;

/// A component plus its edges inside one [`ServiceGraph`](super::ServiceGraph).
///
/// Edges are held by name; the nodes themselves are shared through `Arc` by the
/// graph and by the plan built from it.
pub struct ServiceNode {
    handle: ComponentHandle,
    depends_on: BTreeSet<String>,
    dependents: BTreeSet<String>,
}

impl ServiceNode {
    pub(crate) fn new(
        handle: ComponentHandle,
        depends_on: BTreeSet<String>,
        dependents: BTreeSet<String>,
    ) -> Self {
        Self { handle, depends_on, dependents }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &ComponentHandle {
        &self.handle
    }

    pub fn metadata(&self) -> &Arc<ComponentMetadata> {
        self.handle.metadata()
    }

    /// Predecessors that must be started before this node.
    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    /// Successors that depend on this node.
    pub fn dependents(&self) -> &BTreeSet<String> {
        &self.dependents
    }

    /// Atomically claim the right to shut this component down.
    ///
    /// Returns `true` for exactly one caller over the whole session, no matter
    /// how many graphs or orchestrator runs share the component. The lock is
    /// the component's own, so unrelated nodes never contend.
    pub fn start_shutdown(&self) -> bool {
        self.handle.try_begin_shutdown()
    }

    pub fn shutdown_started(&self) -> bool {
        self.handle.shutdown_started()
    }
}

impl fmt::Debug for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceNode")
            .field("name", &self.name())
            .field("depends_on", &self.depends_on)
            .field("dependents", &self.dependents)
            .finish()
    }
}
