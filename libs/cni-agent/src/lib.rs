//! HTTP client to per-node CNI agents: PUT/GET/DELETE/poll a container
//! descriptor keyed by name.

pub mod client;
pub mod error;

pub use client::CniAgentClient;
pub use error::{Error, Result};
