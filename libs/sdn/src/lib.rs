//! Typed client for the external SDN management plane.
//!
//! Bridges Kubernetes-side concepts (namespace, pod, service) to SDN
//! entities (Zone, Subnet, Container, NetworkMacro/Group) through a single
//! cached, lock-serialized [`gateway::SdnGateway`]. [`bootstrap::bootstrap`]
//! performs the startup sequence that constructs one.

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;

pub use error::{Error, Result};
