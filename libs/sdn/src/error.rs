use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid SDN configuration: {0}")]
    Config(String),

    #[error("failed to build TLS identity from client cert/key: {0}")]
    Identity(#[source] reqwest::Error),

    #[error("SDN request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("SDN returned {status}: {body}")]
    Response { status: u16, body: String },

    /// Recognized once, at this boundary, by [`classify_create_error`] —
    /// never re-derived by substring matching elsewhere (spec §9).
    #[error("{entity} {name} already exists")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("no free address available for namespace {0}")]
    NoFreeAddress(String),

    #[error("container {name} has {interface_count} interfaces, expected exactly 1")]
    MalformedContainer { name: String, interface_count: usize },

    #[error(transparent)]
    Ipam(#[from] kaniop_ipam::Error),

    #[error("invalid network address: {0}")]
    InvalidNetwork(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Recognize the SDN's "already exists" conflict from a create response
/// body, case-insensitively. Every entity-create call routes through this
/// one function so the substring check lives in a single place.
pub fn classify_create_error(entity: &'static str, name: &str, status: u16, body: &str) -> Error {
    if body.to_lowercase().contains("already exists") {
        Error::AlreadyExists {
            entity,
            name: name.to_string(),
        }
    } else {
        Error::Response {
            status,
            body: body.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognizes_already_exists_case_insensitively() {
        let err = classify_create_error("Zone", "K8S namespace alpha", 409, "Entity ALREADY EXISTS with that name");
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn other_bodies_classify_as_plain_response_errors() {
        let err = classify_create_error("Zone", "K8S namespace alpha", 500, "internal error");
        assert!(matches!(err, Error::Response { status: 500, .. }));
    }
}
