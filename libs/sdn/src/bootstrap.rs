//! Startup sequence (spec §4.8): establish the SDN session, ensure
//! Enterprise/Domain exist, hydrate caches, and compute the FreeCIDR pool.

use crate::client::SdnClient;
use crate::config::NuageConfig;
use crate::error::{Error, Result};
use crate::gateway::SdnGateway;
use crate::model::{Domain, DomainTemplate, Enterprise};

use std::str::FromStr;

use ipnetwork::Ipv4Network;
use kaniop_ipam::pool::FreeCidrPool;

pub struct Bootstrapped {
    pub gateway: SdnGateway,
}

/// Runs spec §4.8 steps 2-5. Step 1 (config load) and step 6 (starting
/// watchers/health endpoint) happen in the binary.
pub async fn bootstrap(nuage: &NuageConfig, cluster_network_cidr: &str, host_subnet_length: u8) -> Result<Bootstrapped> {
    let cluster_cidr =
        Ipv4Network::from_str(cluster_network_cidr).map_err(|e| Error::Config(format!("invalid clusterNetworkCIDR: {e}")))?;
    if cluster_cidr.prefix().checked_add(host_subnet_length).is_none_or(|m| m >= 32) {
        return Err(Error::Config(format!(
            "clusterMask ({}) + hostSubnetLength ({host_subnet_length}) >= 32",
            cluster_cidr.prefix()
        )));
    }

    let client = SdnClient::new(
        &nuage.vsd_url,
        &nuage.apiversion,
        &nuage.cert_file,
        &nuage.key_file,
        nuage.ca_file.as_deref(),
    )?;

    let enterprise = ensure_enterprise(&client, &nuage.enterprise).await?;
    let domain = ensure_domain(&client, &enterprise, &nuage.domain).await?;

    let free_cidr = FreeCidrPool::new(cluster_cidr, host_subnet_length)?;
    let gateway = SdnGateway::new(client, enterprise.id.clone(), domain.id.clone(), free_cidr);

    gateway.list_enterprise_network_macro_groups(&enterprise.id).await?;
    gateway.list_enterprise_network_macros(&enterprise.id).await?;
    hydrate_namespaces(&gateway, &domain).await?;

    Ok(Bootstrapped { gateway })
}

async fn ensure_enterprise(client: &SdnClient, name: &str) -> Result<Enterprise> {
    let matches: Vec<Enterprise> = client.filtered_list("enterprises", name).await?;
    if let Some(enterprise) = matches.into_iter().next() {
        return Ok(enterprise);
    }
    let body = serde_json::json!({ "name": name });
    client.create_root("Enterprise", name, "enterprises", &body).await
}

async fn ensure_domain(client: &SdnClient, enterprise: &Enterprise, name: &str) -> Result<Domain> {
    let matches: Vec<Domain> = client.filtered_list("domains", name).await?;
    if let Some(domain) = matches.into_iter().next() {
        return Ok(domain);
    }
    let templates: Vec<DomainTemplate> = client.filtered_list("domaintemplates", name).await?;
    let template = templates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Config(format!("no domain template named {name} found for enterprise {}", enterprise.name)))?;

    let body = serde_json::json!({ "name": name, "templateID": template.id });
    client.create("Domain", name, "enterprises", &enterprise.id, "domains", &body).await
}

/// Spec §4.8 step 4: hydrate the Zone/Subnet/Container caches by listing
/// children of Domain, registering a [`crate::gateway::NamespaceRecord`] per
/// discovered zone. The sibling NMG/NM hydration off Enterprise runs just
/// before this in [`bootstrap`].
async fn hydrate_namespaces(gateway: &SdnGateway, domain: &Domain) -> Result<()> {
    let zones = gateway.list_domain_zones(&domain.id).await?;
    for zone in zones {
        let subnets = gateway.zone_subnets(&zone).await?;
        let namespace = namespace_from_zone_name(&zone.name).to_string();
        gateway.register_namespace(&namespace, zone, subnets).await;
    }
    Ok(())
}

/// Inverse of the naming invariant `"K8S namespace " + name` (spec §3).
fn namespace_from_zone_name(zone_name: &str) -> &str {
    zone_name.strip_prefix("K8S namespace ").unwrap_or(zone_name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recovers_namespace_name_from_zone_name() {
        assert_eq!(namespace_from_zone_name("K8S namespace alpha"), "alpha");
        assert_eq!(namespace_from_zone_name("unrelated"), "unrelated");
    }
}
