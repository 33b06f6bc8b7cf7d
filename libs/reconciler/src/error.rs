//! Errors returned by the namespace/pod/service handlers.
//!
//! Collects the per-crate errors below `kaniop_reconciler` into one enum, the
//! way `kaniop_operator::error::Error` used to absorb `kube::Error` in the
//! teacher. The event-loop driver in [`crate::run`] logs these and keeps
//! watching — it never propagates them out of the watch loop (spec §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Sdn(#[from] kaniop_sdn::Error),

    #[error(transparent)]
    CniAgent(#[from] kaniop_cni_agent::Error),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("namespace {0} not ready after waiting for its zone to be registered")]
    NamespaceNotReady(String),

    #[error("pod {0} has no namespace")]
    PodMissingNamespace(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
