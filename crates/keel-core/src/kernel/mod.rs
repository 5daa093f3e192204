//! # Keel Kernel
//!
//! The session layer of `keel-core`.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Session lifecycle**: [`BootstrapSession`](bootstrap::BootstrapSession) moves
//!   through [`SessionState`](bootstrap::SessionState)s, owns the component registry
//!   and wires the startup and shutdown orchestrators to it.
//! - **Exclusivity**: the [`ExclusivityGuard`](exclusivity::ExclusivityGuard) trait,
//!   with a lock file implementation for single-instance sessions.
//! - **Core constants**: the `constants` submodule.
//! - **Error handling**: the top-level [`Error`](error::Error), the
//!   [`LifecyclePhase`](error::LifecyclePhase) it refers to, and a `Result` alias.
pub mod bootstrap;
pub mod constants;
pub mod error;
pub mod exclusivity;

pub use bootstrap::{BootstrapSession, SessionState};
pub use error::{Error, LifecyclePhase, Result};
pub use exclusivity::{ExclusivityError, ExclusivityGuard, LockFileGuard, NoopGuard};
