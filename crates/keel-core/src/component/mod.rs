//! # Keel Components
//!
//! What a component *is* to the bootstrap engine:
//!
//! - **[`metadata`]**: [`ComponentMetadata`] and the [`OrderKey`] used for grouping.
//! - **[`traits`]**: the capability traits ([`StartupAction`], [`AsyncStartupAction`],
//!   [`ShutdownAction`]) a component may implement, in any combination.
//! - **[`handle`]**: the deferred [`ComponentHandle`] that constructs an instance on
//!   first use and carries the per-component shutdown guard.
//! - **[`error`]**: [`InstantiationError`].
pub mod error;
pub mod handle;
pub mod metadata;
pub mod traits;

pub use error::InstantiationError;
pub use handle::{ComponentHandle, ComponentInstance, StartupRoutine};
pub use metadata::{ComponentMetadata, OrderKey};
pub use traits::{
    AsyncStartupAction, BoxError, Capabilities, ShutdownAction, StartupAction, StartupKind,
};
