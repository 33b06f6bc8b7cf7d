//! Low-level REST transport to the SDN.
//!
//! One thin wrapper per HTTP verb the gateway needs (filtered list, create,
//! child-list, assign-children — spec §6), all routed through a single
//! `reqwest::Client` built once with the configured client certificate.
//! Grounded on `kaniop_k8s_util::client::new_client_with_metrics`'s pattern
//! of building one TLS-configured HTTP client up front and handing out
//! `&self` methods from it.

use crate::error::{Error, Result, classify_create_error};

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct SdnClient {
    http: reqwest::Client,
    base_url: String,
    apiversion: String,
}

impl SdnClient {
    pub fn new(base_url: &str, apiversion: &str, cert_file: &Path, key_file: &Path, ca_file: Option<&Path>) -> Result<Self> {
        let mut cert_pem = std::fs::read(cert_file)
            .map_err(|e| Error::Config(format!("reading cert file {}: {e}", cert_file.display())))?;
        let key_pem = std::fs::read(key_file)
            .map_err(|e| Error::Config(format!("reading key file {}: {e}", key_file.display())))?;
        cert_pem.extend_from_slice(b"\n");
        cert_pem.extend_from_slice(&key_pem);
        let identity = reqwest::Identity::from_pem(&cert_pem).map_err(Error::Identity)?;

        let mut builder = reqwest::Client::builder().identity(identity).use_rustls_tls();
        if let Some(ca) = ca_file {
            let ca_pem =
                std::fs::read(ca).map_err(|e| Error::Config(format!("reading CA file {}: {e}", ca.display())))?;
            let cert = reqwest::Certificate::from_pem(&ca_pem).map_err(Error::Identity)?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build().map_err(Error::Transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            apiversion: apiversion.to_string(),
        })
    }

    /// Builds a client with no TLS identity, for tests that exercise gateway
    /// bookkeeping without performing real HTTP requests.
    #[cfg(test)]
    pub fn new_unchecked() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://sdn.invalid".to_string(),
            apiversion: "v6".to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/nuage/api/{}/{}", self.base_url, self.apiversion, path.trim_start_matches('/'))
    }

    /// `GET <entity>?q=name == '<name>'`, the filtered-query shape every
    /// `Exists*` check in the gateway issues (spec §4.1).
    pub async fn filtered_list<T: DeserializeOwned>(&self, entity_path: &str, name: &str) -> Result<Vec<T>> {
        let resp = self
            .http
            .get(self.url(entity_path))
            .query(&[("q", format!("name == '{name}'"))])
            .send()
            .await
            .map_err(Error::Transport)?;
        self.decode_list(resp).await
    }

    /// `GET <parent>/<entity>`, enumerating all children of a parent object.
    pub async fn child_list<T: DeserializeOwned>(&self, parent_entity_path: &str, parent_id: &str, child_entity: &str) -> Result<Vec<T>> {
        let resp = self
            .http
            .get(self.url(&format!("{parent_entity_path}/{parent_id}/{child_entity}")))
            .send()
            .await
            .map_err(Error::Transport)?;
        self.decode_list(resp).await
    }

    /// `POST <entity>`, creating a top-level object with no parent (used
    /// only for Enterprise, the root of the entity tree).
    pub async fn create_root<B: Serialize, T: DeserializeOwned>(&self, entity: &'static str, name: &str, entity_path: &str, body: &B) -> Result<T> {
        let resp = self.http.post(self.url(entity_path)).json(body).send().await.map_err(Error::Transport)?;
        let status = resp.status();
        if status.is_success() {
            let mut created: Vec<T> = resp.json().await.map_err(Error::Transport)?;
            created.pop().ok_or(Error::Response {
                status: status.as_u16(),
                body: "empty create response".into(),
            })
        } else {
            let body_text = resp.text().await.unwrap_or_default();
            Err(classify_create_error(entity, name, status.as_u16(), &body_text))
        }
    }

    /// `POST <parent>/<entity>`, creating a child object under `parent_id`.
    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        entity: &'static str,
        name: &str,
        parent_entity_path: &str,
        parent_id: &str,
        child_entity: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.url(&format!("{parent_entity_path}/{parent_id}/{child_entity}")))
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        let status = resp.status();
        if status.is_success() {
            let mut created: Vec<T> = resp.json().await.map_err(Error::Transport)?;
            created.pop().ok_or(Error::Response {
                status: status.as_u16(),
                body: "empty create response".into(),
            })
        } else {
            let body_text = resp.text().await.unwrap_or_default();
            Err(classify_create_error(entity, name, status.as_u16(), &body_text))
        }
    }

    /// `PUT <parent>/<entity>/<id>`, assigning existing child objects to a
    /// parent (used for NM → NMG assignment, spec §4.5).
    pub async fn assign_children(&self, parent_entity_path: &str, parent_id: &str, child_entity: &str, child_ids: &[String]) -> Result<()> {
        let resp = self
            .http
            .put(self.url(&format!("{parent_entity_path}/{parent_id}/{child_entity}")))
            .json(child_ids)
            .send()
            .await
            .map_err(Error::Transport)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body_text = resp.text().await.unwrap_or_default();
            Err(Error::Response {
                status: status.as_u16(),
                body: body_text,
            })
        }
    }

    async fn decode_list<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<Vec<T>> {
        let status = resp.status();
        if status.is_success() {
            resp.json().await.map_err(Error::Transport)
        } else {
            let body_text = resp.text().await.unwrap_or_default();
            Err(Error::Response {
                status: status.as_u16(),
                body: body_text,
            })
        }
    }
}
