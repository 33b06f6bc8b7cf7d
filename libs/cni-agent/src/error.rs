use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("request to CNI agent failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to load TLS material: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build TLS identity: {0}")]
    Identity(#[source] reqwest::Error),

    #[error("CNI agent returned {status}: {body}")]
    Response { status: u16, body: String },

    #[error("container {0} not found on agent")]
    NotFound(String),

    #[error("polling container {name} timed out after {elapsed_ms}ms, last error: {last_error}")]
    PollTimeout {
        name: String,
        elapsed_ms: u64,
        last_error: String,
    },

    #[error("malformed container descriptor: {0}")]
    Decode(#[source] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
