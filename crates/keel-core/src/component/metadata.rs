use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MetadataOverride;

/// Sort key used to group components into phases.
///
/// Lower explicit keys run earlier. `Unspecified` sorts after every explicit
/// key, so components without an order form the final group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum OrderKey {
    Explicit(i32),
    #[default]
    Unspecified,
}

impl OrderKey {
    /// Returns the explicit value, if any.
    pub fn value(&self) -> Option<i32> {
        match self {
            OrderKey::Explicit(val) => Some(*val),
            OrderKey::Unspecified => None,
        }
    }
}

impl From<i32> for OrderKey {
    fn from(order: i32) -> Self {
        OrderKey::Explicit(order)
    }
}

impl From<Option<i32>> for OrderKey {
    fn from(order: Option<i32>) -> Self {
        order.map(OrderKey::Explicit).unwrap_or(OrderKey::Unspecified)
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKey::Explicit(val) => write!(f, "{}", val),
            OrderKey::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Descriptor attached to an exported component.
///
/// Built once at export time and frozen behind an `Arc` by the registry;
/// nothing hands out mutable access afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMetadata {
    name: String,
    order: OrderKey,
    await_start: bool,
    shutdown_order: OrderKey,
    depends_on: Vec<String>,
}

impl ComponentMetadata {
    /// Metadata with default ordering: unspecified keys, awaited start, no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: OrderKey::Unspecified,
            await_start: true,
            shutdown_order: OrderKey::Unspecified,
            depends_on: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: impl Into<OrderKey>) -> Self {
        self.order = order.into();
        self
    }

    pub fn with_await_start(mut self, await_start: bool) -> Self {
        self.await_start = await_start;
        self
    }

    pub fn with_shutdown_order(mut self, order: impl Into<OrderKey>) -> Self {
        self.shutdown_order = order.into();
        self
    }

    /// Adds a dependency by component name. Duplicates are ignored.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> OrderKey {
        self.order
    }

    pub fn await_start(&self) -> bool {
        self.await_start
    }

    pub fn shutdown_order(&self) -> OrderKey {
        self.shutdown_order
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Applies a configuration override. Only fields present in the override change.
    pub(crate) fn apply_override(mut self, overrides: &MetadataOverride) -> Self {
        if let Some(order) = overrides.order {
            self.order = OrderKey::Explicit(order);
        }
        if let Some(await_start) = overrides.await_start {
            self.await_start = await_start;
        }
        if let Some(order) = overrides.shutdown_order {
            self.shutdown_order = OrderKey::Explicit(order);
        }
        for dep in &overrides.depends_on {
            if !self.depends_on.contains(dep) {
                self.depends_on.push(dep.clone());
            }
        }
        self
    }
}

impl fmt::Display for ComponentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (order: {}, await: {}, shutdown order: {}",
            self.name, self.order, self.await_start, self.shutdown_order
        )?;
        if !self.depends_on.is_empty() {
            write!(f, ", depends on: {}", self.depends_on.join(", "))?;
        }
        write!(f, ")")
    }
}
