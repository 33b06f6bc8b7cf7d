//! Event handlers bridging Kubernetes Namespace/Pod/Service lifecycle events
//! to the SDN gateway and per-node CNI agents, plus the watcher loop that
//! drives them.

pub mod error;
pub mod namespace;
pub mod pod;
pub mod run;
pub mod service;

pub use error::{Error, Result};
pub use run::run;
