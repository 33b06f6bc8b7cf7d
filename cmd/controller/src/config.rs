//! Binary-level config file, unifying `kaniop_sdn::config`'s two structs
//! with the CLI flags in [`crate::Args`].
//!
//! File wins over flags when `--config` is given (spec §6): the whole
//! nested config comes from the file, not merged field by field with the
//! flags in [`crate::Args`].

use std::path::{Path, PathBuf};

use kaniop_sdn::config::{MasterConfig, NuageConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    pub k8s_master_config: PathBuf,
    pub nuage_config: NuageConfig,
}

impl Config {
    pub fn load(path: &Path) -> kaniop_sdn::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| kaniop_sdn::Error::Config(format!("reading config {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw).map_err(|e| kaniop_sdn::Error::Config(format!("parsing config {}: {e}", path.display())))
    }

    pub fn master_config(&self) -> kaniop_sdn::Result<MasterConfig> {
        MasterConfig::load(&self.k8s_master_config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_full_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "kubeconfig: /etc/kubernetes/admin.conf\n\
             k8sMasterConfig: /etc/origin/master/master-config.yaml\n\
             nuageConfig:\n\
             \x20\x20vsdUrl: https://vsd.example.com:8443\n\
             \x20\x20apiversion: v6\n\
             \x20\x20enterprise: kaniop\n\
             \x20\x20domain: k8s\n\
             \x20\x20certFile: /etc/nuage/client.pem\n\
             \x20\x20keyFile: /etc/nuage/client.key\n"
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.kubeconfig, Some(PathBuf::from("/etc/kubernetes/admin.conf")));
        assert_eq!(cfg.nuage_config.enterprise, "kaniop");
    }
}
