use thiserror::Error;

/// Ambient errors from the telemetry/metrics plumbing shared by every
/// reconciler crate. Domain errors (SDN, CNI-agent, namespace-not-ready)
/// live in `kaniop_reconciler::error::Error` instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}: {1}")]
    FormattingError(String, #[source] std::fmt::Error),

    #[error("invalid trace ID")]
    InvalidTraceId,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
