//! HTTP client to per-node CNI agents: PUT/GET/DELETE a container
//! descriptor at `/nuage/containers/<name>`, plus a doubling-backoff poll
//! loop for callers waiting on a descriptor to appear.

use kaniop_sdn::model::Container;

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Cap on in-flight requests to any one agent.
pub const MAX_CONNS: usize = 256;

/// Idle-connection keepalive, and the ceiling the poll backoff doubles up
/// to.
pub const MAX_IDLE: Duration = Duration::from_secs(7);

const POLL_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct CniAgentClient {
    http: reqwest::Client,
    agent_port: u16,
}

impl CniAgentClient {
    pub fn new(agent_port: u16, cert_file: &Path, key_file: &Path, ca_file: Option<&Path>) -> Result<Self> {
        let mut cert_pem = std::fs::read(cert_file)?;
        let key_pem = std::fs::read(key_file)?;
        cert_pem.extend_from_slice(b"\n");
        cert_pem.extend_from_slice(&key_pem);
        let identity = reqwest::Identity::from_pem(&cert_pem).map_err(Error::Identity)?;

        let mut builder = reqwest::Client::builder()
            .identity(identity)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(MAX_CONNS)
            .pool_idle_timeout(MAX_IDLE);
        if let Some(ca) = ca_file {
            let ca_pem = std::fs::read(ca)?;
            let cert = reqwest::Certificate::from_pem(&ca_pem).map_err(Error::Identity)?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build().map_err(Error::Transport)?;

        Ok(Self { http, agent_port })
    }

    fn url(&self, node: &str, name: &str) -> String {
        format!("https://{node}:{}/nuage/containers/{name}", self.agent_port)
    }

    /// `PUT <container json>`. Accepts 200 or 201 as success (spec §4.7).
    pub async fn put_container(&self, node: &str, container: &Container) -> Result<()> {
        let resp = self.http.put(self.url(node, &container.name)).json(container).send().await.map_err(Error::Transport)?;
        match resp.status().as_u16() {
            200 | 201 => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Response { status, body })
            }
        }
    }

    /// `GET`. 200 decodes the body; any other status is an error.
    pub async fn get_container(&self, node: &str, name: &str) -> Result<Container> {
        let resp = self.http.get(self.url(node, name)).send().await.map_err(Error::Transport)?;
        match resp.status().as_u16() {
            200 => resp.json().await.map_err(Error::Decode),
            404 => Err(Error::NotFound(name.to_string())),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Response { status, body })
            }
        }
    }

    /// `DELETE`. 200 is success; any other status is an error.
    pub async fn delete_container(&self, node: &str, name: &str) -> Result<()> {
        let resp = self.http.delete(self.url(node, name)).send().await.map_err(Error::Transport)?;
        match resp.status().as_u16() {
            200 => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Response { status, body })
            }
        }
    }

    /// Repeated GET with exponential backoff from 100ms up to [`MAX_IDLE`],
    /// bounded by `timeout`. A 404 is recorded but does not stop polling; any
    /// other non-200 status aborts immediately (spec §4.7).
    pub async fn poll_container(&self, node: &str, name: &str, timeout: Duration) -> Result<Container> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut backoff = POLL_INITIAL_BACKOFF;
        let mut last_error = String::new();

        loop {
            match self.get_container(node, name).await {
                Ok(container) => return Ok(container),
                Err(Error::NotFound(_)) => {
                    last_error = "404 not found".to_string();
                }
                Err(other) => return Err(other),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::PollTimeout {
                    name: name.to_string(),
                    elapsed_ms: timeout.as_millis() as u64,
                    last_error,
                });
            }

            tokio::time::sleep(backoff.min(deadline.saturating_duration_since(tokio::time::Instant::now()))).await;
            backoff = (backoff * 2).min(MAX_IDLE);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn poll_backoff_doubles_up_to_max_idle() {
        let mut backoff = POLL_INITIAL_BACKOFF;
        for _ in 0..10 {
            backoff = (backoff * 2).min(MAX_IDLE);
        }
        assert_eq!(backoff, MAX_IDLE);
    }
}
