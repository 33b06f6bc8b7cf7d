//! Shared reconciler plumbing: context, error, metrics, telemetry.
//!
//! Domain handlers (namespace/pod/service) live in `kaniop-reconciler`; this
//! crate only carries the ambient state and instrumentation every handler
//! needs.

pub mod context;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use error::{Error, Result};
