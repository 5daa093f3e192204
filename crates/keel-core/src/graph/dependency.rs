use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::component::handle::ComponentHandle;
use crate::component::metadata::{ComponentMetadata, OrderKey};
use crate::graph::error::DependencyError;
use crate::graph::node::ServiceNode;
use crate::kernel::error::LifecyclePhase;
use crate::registry::ComponentRegistry;

/// Dependency graph over one snapshot of components.
///
/// Only dependencies between members of the snapshot become edges; a
/// dependency on a component outside the set (for example a startup-only
/// component when building the shutdown graph) does not constrain ordering.
pub struct ServiceGraph {
    /// Nodes in discovery order
    nodes: Vec<Arc<ServiceNode>>,
    index: HashMap<String, usize>,
}

impl ServiceGraph {
    /// Build the graph for a set of handles, keeping their order.
    ///
    /// A name that appears more than once keeps only its first occurrence.
    pub fn build(handles: Vec<ComponentHandle>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(handles.len());
        let mut unique: Vec<ComponentHandle> = Vec::with_capacity(handles.len());
        for handle in handles {
            if index.contains_key(handle.name()) {
                log::warn!("Ignoring duplicate entry for component '{}'", handle.name());
                continue;
            }
            index.insert(handle.name().to_string(), unique.len());
            unique.push(handle);
        }
        let handles = unique;

        let mut depends_on: Vec<BTreeSet<String>> = vec![BTreeSet::new(); handles.len()];
        let mut dependents: Vec<BTreeSet<String>> = vec![BTreeSet::new(); handles.len()];

        for (i, handle) in handles.iter().enumerate() {
            for dep in handle.metadata().depends_on() {
                // Only consider dependencies that are also in the target set
                if let Some(&j) = index.get(dep) {
                    depends_on[i].insert(dep.clone());
                    dependents[j].insert(handle.name().to_string());
                }
            }
        }

        let nodes = handles
            .into_iter()
            .zip(depends_on.into_iter().zip(dependents))
            .map(|(handle, (deps, rdeps))| Arc::new(ServiceNode::new(handle, deps, rdeps)))
            .collect();

        Self { nodes, index }
    }

    /// Check a whole registry: every declared dependency must be exported and
    /// the full dependency relation must be acyclic.
    pub fn validate_registry(registry: &ComponentRegistry) -> Result<(), DependencyError> {
        let handles = registry.handles();
        for handle in &handles {
            for dep in handle.metadata().depends_on() {
                if !registry.contains(dep) {
                    return Err(DependencyError::MissingComponent {
                        component: handle.name().to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        ServiceGraph::build(handles).topological_order().map(|_| ())
    }

    pub fn nodes(&self) -> &[Arc<ServiceNode>] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Arc<ServiceNode>> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dependencies-first order (Kahn's algorithm). Among nodes that are ready
    /// at the same time, discovery order wins, so the result is deterministic.
    pub fn topological_order(&self) -> Result<Vec<Arc<ServiceNode>>, DependencyError> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.depends_on().len()).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut sorted = Vec::with_capacity(self.nodes.len());

        while let Some(i) = ready.pop_first() {
            sorted.push(self.nodes[i].clone());
            for dependent in self.nodes[i].dependents() {
                let j = self.index[dependent];
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if sorted.len() == self.nodes.len() {
            Ok(sorted)
        } else {
            let unsorted: BTreeSet<usize> = (0..self.nodes.len())
                .filter(|&i| in_degree[i] > 0)
                .collect();
            Err(DependencyError::CyclicDependency(self.find_cycle(unsorted)))
        }
    }

    /// Extract one concrete cycle from the nodes Kahn's algorithm could not sort.
    fn find_cycle(&self, mut remaining: BTreeSet<usize>) -> Vec<String> {
        // Trim nodes nothing in `remaining` depends on; what is left lies on cycles
        loop {
            let removable: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| {
                    !self.nodes[i]
                        .dependents()
                        .iter()
                        .any(|d| remaining.contains(&self.index[d]))
                })
                .collect();
            if removable.is_empty() {
                break;
            }
            for i in removable {
                remaining.remove(&i);
            }
        }

        let Some(&start) = remaining.first() else {
            return Vec::new();
        };

        // Every remaining node has a remaining dependency, so this walk must revisit a node
        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|&p| p == current) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.nodes[i].name().to_string())
                    .collect();
                cycle.push(self.nodes[current].name().to_string());
                return cycle;
            }
            path.push(current);
            let next = self.nodes[current]
                .depends_on()
                .iter()
                .map(|d| self.index[d])
                .find(|j| remaining.contains(j));
            match next {
                Some(j) => current = j,
                None => {
                    return path.iter().map(|&i| self.nodes[i].name().to_string()).collect();
                }
            }
        }
    }

    /// Verify that ordering keys never contradict dependency edges.
    ///
    /// Startup: a dependency may not be ordered after its dependent.
    /// Shutdown: a dependent may not be ordered after its dependency.
    pub fn check_ordering(&self, phase: LifecyclePhase) -> Result<(), DependencyError> {
        let key: fn(&ComponentMetadata) -> OrderKey = match phase {
            LifecyclePhase::Shutdown => |m| m.shutdown_order(),
            _ => |m| m.order(),
        };

        for node in &self.nodes {
            let component_order = key(node.metadata());
            for dep in node.depends_on() {
                let dependency_order = key(self.nodes[self.index[dep]].metadata());
                let conflict = match phase {
                    LifecyclePhase::Shutdown => component_order > dependency_order,
                    _ => dependency_order > component_order,
                };
                if conflict {
                    return Err(DependencyError::OrderConflict {
                        phase,
                        component: node.name().to_string(),
                        dependency: dep.clone(),
                        component_order,
                        dependency_order,
                    });
                }
            }
        }
        Ok(())
    }
}
