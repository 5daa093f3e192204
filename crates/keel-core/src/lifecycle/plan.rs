use std::collections::HashMap;
use std::sync::Arc;

use crate::component::handle::ComponentHandle;
use crate::component::metadata::{ComponentMetadata, OrderKey};
use crate::graph::{DependencyError, ServiceGraph, ServiceNode};
use crate::kernel::error::LifecyclePhase;

/// Components that share one ordering key.
///
/// Members are split into waves: a member only depends on (startup) or is
/// depended on by (shutdown) members of earlier waves. Within a wave members
/// keep discovery order.
#[derive(Debug)]
pub struct PlannedGroup {
    key: OrderKey,
    waves: Vec<Vec<Arc<ServiceNode>>>,
}

impl PlannedGroup {
    pub fn key(&self) -> OrderKey {
        self.key
    }

    pub fn waves(&self) -> &[Vec<Arc<ServiceNode>>] {
        &self.waves
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<ServiceNode>> {
        self.waves.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member names, wave by wave.
    pub fn wave_names(&self) -> Vec<Vec<String>> {
        self.waves
            .iter()
            .map(|wave| wave.iter().map(|n| n.name().to_string()).collect())
            .collect()
    }
}

/// Ordered groups for one phase, built from a validated graph.
#[derive(Debug)]
pub struct ExecutionPlan {
    phase: LifecyclePhase,
    groups: Vec<PlannedGroup>,
}

impl ExecutionPlan {
    /// Group by `order`, ascending; within a group dependencies go first.
    pub fn startup(handles: Vec<ComponentHandle>) -> Result<Self, DependencyError> {
        Self::build(handles, LifecyclePhase::Startup)
    }

    /// Group by `shutdown_order`, ascending; within a group dependents go first.
    pub fn shutdown(handles: Vec<ComponentHandle>) -> Result<Self, DependencyError> {
        Self::build(handles, LifecyclePhase::Shutdown)
    }

    fn build(handles: Vec<ComponentHandle>, phase: LifecyclePhase) -> Result<Self, DependencyError> {
        let graph = ServiceGraph::build(handles);
        let sorted = graph.topological_order()?;
        graph.check_ordering(phase)?;

        let key: fn(&ComponentMetadata) -> OrderKey = match phase {
            LifecyclePhase::Shutdown => |m| m.shutdown_order(),
            _ => |m| m.order(),
        };

        // Stable sort, so equal keys keep discovery order
        let mut nodes: Vec<Arc<ServiceNode>> = graph.nodes().to_vec();
        nodes.sort_by_key(|n| key(n.metadata()));

        let mut partitions: Vec<(OrderKey, Vec<Arc<ServiceNode>>)> = Vec::new();
        for node in nodes {
            let k = key(node.metadata());
            match partitions.last_mut() {
                Some((last, members)) if *last == k => members.push(node),
                _ => partitions.push((k, vec![node])),
            }
        }

        // Dependencies-first for startup, dependents-first for shutdown
        let mut walk: Vec<&Arc<ServiceNode>> = sorted.iter().collect();
        if phase == LifecyclePhase::Shutdown {
            walk.reverse();
        }

        let groups = partitions
            .into_iter()
            .map(|(key, members)| PlannedGroup {
                key,
                waves: Self::waves(&members, &walk, phase),
            })
            .collect();

        Ok(Self { phase, groups })
    }

    /// Longest-path depth of each member, counting only edges inside the group.
    fn waves(
        members: &[Arc<ServiceNode>],
        walk: &[&Arc<ServiceNode>],
        phase: LifecyclePhase,
    ) -> Vec<Vec<Arc<ServiceNode>>> {
        let mut depth: HashMap<&str, usize> =
            members.iter().map(|m| (m.name(), 0usize)).collect();

        for node in walk {
            if !depth.contains_key(node.name()) {
                continue;
            }
            let before = match phase {
                LifecyclePhase::Shutdown => node.dependents(),
                _ => node.depends_on(),
            };
            let d = before
                .iter()
                .filter_map(|name| depth.get(name.as_str()).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(node.name(), d);
        }

        let wave_count = depth.values().copied().max().map_or(0, |d| d + 1);
        let mut waves: Vec<Vec<Arc<ServiceNode>>> = vec![Vec::new(); wave_count];
        for member in members {
            waves[depth[member.name()]].push(member.clone());
        }
        waves
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn groups(&self) -> &[PlannedGroup] {
        &self.groups
    }

    /// Total number of components in the plan.
    pub fn len(&self) -> usize {
        self.groups.iter().map(PlannedGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
