//! Configuration shapes consumed by [`crate::bootstrap::bootstrap`] (spec
//! §6): the cluster master config (`networkConfig` + `etcdClientInfo`) and
//! the `nuage-config` block naming the SDN endpoint and credentials.

use serde::Deserialize;

use std::path::PathBuf;

/// `networkConfig.{clusterNetworkCIDR, hostSubnetLength, serviceNetworkCIDR}`
/// plus `etcdClientInfo`, as read from the cluster's master config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterConfig {
    pub network_config: NetworkConfig,
    #[serde(default)]
    pub etcd_client_info: Option<EtcdClientInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(rename = "clusterNetworkCIDR")]
    pub cluster_network_cidr: String,
    pub host_subnet_length: u8,
    #[serde(rename = "serviceNetworkCIDR")]
    pub service_network_cidr: String,
}

/// Carried for forward compatibility with a durable IPAM persistence story
/// (spec §9: "a future durable persistence story (etcd) is hinted at in
/// config but not implemented"); not read by this implementation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdClientInfo {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

/// `nuage-config.{vsd-url, apiversion, enterprise, domain, certFile, keyFile}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuageConfig {
    pub vsd_url: String,
    pub apiversion: String,
    pub enterprise: String,
    pub domain: String,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl MasterConfig {
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::Error::Config(format!("reading master config {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| crate::error::Error::Config(format!("parsing master config {}: {e}", path.display())))
    }
}

impl NuageConfig {
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::Error::Config(format!("reading nuage config {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| crate::error::Error::Config(format!("parsing nuage config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_master_config_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "networkConfig:\n  clusterNetworkCIDR: 10.0.0.0/16\n  hostSubnetLength: 8\n  serviceNetworkCIDR: 172.30.0.0/16\n"
        )
        .unwrap();
        let cfg = MasterConfig::load(file.path()).unwrap();
        assert_eq!(cfg.network_config.cluster_network_cidr, "10.0.0.0/16");
        assert_eq!(cfg.network_config.host_subnet_length, 8);
        assert!(cfg.etcd_client_info.is_none());
    }

    #[test]
    fn parses_nuage_config_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "vsdUrl: https://vsd.example.com:8443\napiversion: v6\nenterprise: kaniop\ndomain: k8s\ncertFile: /etc/nuage/client.pem\nkeyFile: /etc/nuage/client.key\n"
        )
        .unwrap();
        let cfg = NuageConfig::load(file.path()).unwrap();
        assert_eq!(cfg.enterprise, "kaniop");
        assert_eq!(cfg.domain, "k8s");
    }
}
