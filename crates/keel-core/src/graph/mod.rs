//! # Keel Service Graph
//!
//! Dependency graph over exported components. [`ServiceGraph`] wraps each
//! component handle in a [`ServiceNode`] carrying its predecessor and
//! successor edges, sorts the graph with Kahn's algorithm and reports
//! cycles, missing dependencies and order conflicts as [`DependencyError`]s
//! before anything is started.
pub mod dependency;
pub mod error;
pub mod node;

pub use dependency::ServiceGraph;
pub use error::DependencyError;
pub use node::ServiceNode;

#[cfg(test)]
mod tests;
