//! The SDN gateway: cached, lock-serialized CRUD over the SDN entities plus
//! the in-memory namespace/subnet/FreeCIDR state IPAM allocation needs. One
//! coarse `Mutex` guards every cache so a namespace's zone, subnets, and
//! FreeCIDR bookkeeping stay consistent across concurrent reconcile calls.

use crate::client::SdnClient;
use crate::error::{Error, Result};
use crate::model::{Container, NetworkMacro, NetworkMacroGroup, Subnet, Zone};

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use kaniop_ipam::pool::FreeCidrPool;
use kaniop_ipam::range::SubnetRange;
use tokio::sync::Mutex;

/// A subnet materialized in the SDN plus the allocator tracking which of its
/// addresses are in use. `customed` subnets are never chosen by
/// [`SdnGateway::allocate_pod_address`] (spec §3, invariant 3).
#[derive(Debug)]
pub struct SubnetRecord {
    pub subnet: Subnet,
    pub range: SubnetRange,
    pub customed: bool,
}

/// One per Kubernetes namespace with a materialized [`Zone`] (spec §3).
#[derive(Debug)]
pub struct NamespaceRecord {
    pub zone: Zone,
    pub subnets: Vec<SubnetRecord>,
}

struct Caches {
    zones: HashMap<String, Zone>,
    network_macros: HashMap<String, NetworkMacro>,
    network_macro_groups: HashMap<String, NetworkMacroGroup>,
    containers: HashMap<String, Container>,
    namespaces: HashMap<String, NamespaceRecord>,
    free_cidr: FreeCidrPool,
}

pub struct SdnGateway {
    client: SdnClient,
    enterprise_id: String,
    domain_id: String,
    caches: Mutex<Caches>,
}

impl SdnGateway {
    pub fn new(client: SdnClient, enterprise_id: String, domain_id: String, free_cidr: FreeCidrPool) -> Self {
        Self {
            client,
            enterprise_id,
            domain_id,
            caches: Mutex::new(Caches {
                zones: HashMap::new(),
                network_macros: HashMap::new(),
                network_macro_groups: HashMap::new(),
                containers: HashMap::new(),
                namespaces: HashMap::new(),
                free_cidr,
            }),
        }
    }

    /// Generic cache-then-filtered-query lookup shared by every `Exists*`
    /// operation (spec §4.1; SUPPLEMENTED FEATURES: one helper instead of
    /// five near-duplicate Go functions).
    async fn exists_by_name<T>(&self, cache_hit: Option<T>, entity_path: &str, name: &str) -> Result<Option<T>>
    where
        T: Clone + serde::de::DeserializeOwned,
    {
        if let Some(hit) = cache_hit {
            return Ok(Some(hit));
        }
        let matches: Vec<T> = self.client.filtered_list(entity_path, name).await?;
        Ok(matches.into_iter().next())
    }

    pub async fn exists_zone(&self, name: &str) -> Result<Option<Zone>> {
        let hit = self.caches.lock().await.zones.get(name).cloned();
        let result = self.exists_by_name(hit, "zones", name).await?;
        if let Some(zone) = &result {
            self.caches.lock().await.zones.insert(name.to_string(), zone.clone());
        }
        Ok(result)
    }

    pub async fn create_zone(&self, name: &str) -> Result<Zone> {
        let body = serde_json::json!({ "name": name });
        let zone = match self.client.create::<_, Zone>("Zone", name, "domains", &self.domain_id, "zones", &body).await {
            Ok(zone) => zone,
            Err(Error::AlreadyExists { .. }) => self
                .exists_zone(name)
                .await?
                .ok_or_else(|| Error::InvalidNetwork(format!("zone {name} reported already-exists but a refresh found none")))?,
            Err(e) => return Err(e),
        };
        self.caches.lock().await.zones.insert(name.to_string(), zone.clone());
        Ok(zone)
    }

    pub async fn exists_network_macro(&self, name: &str) -> Result<Option<NetworkMacro>> {
        let hit = self.caches.lock().await.network_macros.get(name).cloned();
        let result = self.exists_by_name(hit, "enterprisenetworks", name).await?;
        if let Some(nm) = &result {
            self.caches.lock().await.network_macros.insert(name.to_string(), nm.clone());
        }
        Ok(result)
    }

    pub async fn exists_network_macro_group(&self, name: &str) -> Result<Option<NetworkMacroGroup>> {
        let hit = self.caches.lock().await.network_macro_groups.get(name).cloned();
        let result = self.exists_by_name(hit, "networkmacrogroups", name).await?;
        if let Some(nmg) = &result {
            self.caches.lock().await.network_macro_groups.insert(name.to_string(), nmg.clone());
        }
        Ok(result)
    }

    pub async fn create_network_macro_group(&self, name: &str) -> Result<NetworkMacroGroup> {
        let body = serde_json::json!({ "name": name });
        let nmg = match self
            .client
            .create::<_, NetworkMacroGroup>("NetworkMacroGroup", name, "enterprises", &self.enterprise_id, "networkmacrogroups", &body)
            .await
        {
            Ok(nmg) => nmg,
            Err(Error::AlreadyExists { .. }) => self
                .exists_network_macro_group(name)
                .await?
                .ok_or_else(|| Error::InvalidNetwork(format!("NMG {name} reported already-exists but a refresh found none")))?,
            Err(e) => return Err(e),
        };
        self.caches.lock().await.network_macro_groups.insert(name.to_string(), nmg.clone());
        Ok(nmg)
    }

    pub async fn create_network_macro(&self, name: &str, address: &str, netmask: &str) -> Result<NetworkMacro> {
        let body = serde_json::json!({ "name": name, "address": address, "netmask": netmask });
        let nm = match self
            .client
            .create::<_, NetworkMacro>("NetworkMacro", name, "enterprises", &self.enterprise_id, "enterprisenetworks", &body)
            .await
        {
            Ok(nm) => nm,
            Err(Error::AlreadyExists { .. }) => self
                .exists_network_macro(name)
                .await?
                .ok_or_else(|| Error::InvalidNetwork(format!("NM {name} reported already-exists but a refresh found none")))?,
            Err(e) => return Err(e),
        };
        self.caches.lock().await.network_macros.insert(name.to_string(), nm.clone());
        Ok(nm)
    }

    pub async fn assign_network_macro_to_group(&self, nmg: &NetworkMacroGroup, nm: &NetworkMacro) -> Result<()> {
        self.client
            .assign_children("networkmacrogroups", &nmg.id, "enterprisenetworks", &[nm.id.clone()])
            .await
    }

    pub async fn exists_container(&self, name: &str) -> Result<Option<Container>> {
        let hit = self.caches.lock().await.containers.get(name).cloned();
        let result = self.exists_by_name(hit, "containers", name).await?;
        if let Some(container) = &result {
            self.caches.lock().await.containers.insert(name.to_string(), container.clone());
        }
        Ok(result)
    }

    /// `SDN.CreateContainer` (spec §4.4 step 4): the subnet is the parent,
    /// addressed by its SDN id.
    pub async fn create_container(&self, subnet_id: &str, container: &Container) -> Result<Container> {
        let created: Container = self
            .client
            .create("Container", &container.name, "subnets", subnet_id, "containers", container)
            .await?;
        self.caches.lock().await.containers.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    pub fn container_ip_and_mask(container: &Container) -> Result<(String, String)> {
        container.ip_and_mask().map(|(ip, mask)| (ip.to_string(), mask.to_string()))
    }

    /// Has a [`NamespaceRecord`] been registered for `namespace` yet? Used
    /// by the pod handler's namespace barrier (spec §4.4 step 1).
    pub async fn namespace_ready(&self, namespace: &str) -> bool {
        self.caches.lock().await.namespaces.contains_key(namespace)
    }

    /// Lists every zone under `domain_id`, populating the zone cache.
    /// Called once during bootstrap hydration (spec §4.8 step 4).
    pub async fn list_domain_zones(&self, domain_id: &str) -> Result<Vec<Zone>> {
        let zones: Vec<Zone> = self.client.child_list("domains", domain_id, "zones").await?;
        let mut caches = self.caches.lock().await;
        for zone in &zones {
            caches.zones.insert(zone.name.clone(), zone.clone());
        }
        Ok(zones)
    }

    /// Lists every [`NetworkMacroGroup`] under `enterprise_id`, populating
    /// the NMG cache. Called once during bootstrap hydration (spec §4.8
    /// step 4).
    pub async fn list_enterprise_network_macro_groups(&self, enterprise_id: &str) -> Result<Vec<NetworkMacroGroup>> {
        let nmgs: Vec<NetworkMacroGroup> = self.client.child_list("enterprises", enterprise_id, "networkmacrogroups").await?;
        let mut caches = self.caches.lock().await;
        for nmg in &nmgs {
            caches.network_macro_groups.insert(nmg.name.clone(), nmg.clone());
        }
        Ok(nmgs)
    }

    /// Lists every [`NetworkMacro`] under `enterprise_id`, populating the NM
    /// cache. Called once during bootstrap hydration (spec §4.8 step 4).
    pub async fn list_enterprise_network_macros(&self, enterprise_id: &str) -> Result<Vec<NetworkMacro>> {
        let nms: Vec<NetworkMacro> = self.client.child_list("enterprises", enterprise_id, "enterprisenetworks").await?;
        let mut caches = self.caches.lock().await;
        for nm in &nms {
            caches.network_macros.insert(nm.name.clone(), nm.clone());
        }
        Ok(nms)
    }

    /// `ZoneSubnets(zone)` (spec §4.1): enumerate subnets under `zone`,
    /// build a fresh allocator per subnet, pre-reserve existing interfaces,
    /// and reconcile each subnet's address against the FreeCIDR pool.
    pub async fn zone_subnets(&self, zone: &Zone) -> Result<Vec<SubnetRecord>> {
        let subnets: Vec<Subnet> = self.client.child_list("zones", &zone.id, "subnets").await?;
        let mut records = Vec::with_capacity(subnets.len());
        let mut caches = self.caches.lock().await;
        for subnet in subnets {
            let cidr = subnet_cidr(&subnet)?;
            let mut range = SubnetRange::new(cidr);
            let containers: Vec<Container> = self.client.child_list("subnets", &subnet.id, "containers").await?;
            for container in &containers {
                if let Ok((ip, _mask)) = container.ip_and_mask() {
                    if let Ok(addr) = Ipv4Addr::from_str(ip) {
                        let _ = range.allocate(addr);
                    }
                }
                caches.containers.insert(container.name.clone(), container.clone());
            }
            let customed = !remove_matching_prefix(&mut caches.free_cidr, cidr);
            records.push(SubnetRecord { subnet, range, customed });
        }
        Ok(records)
    }

    /// `ZoneAddSubnet(zone, subnetRecord)` (spec §4.1): create the SDN
    /// subnet under `zone`.
    pub async fn zone_add_subnet(&self, zone: &Zone, name: &str, address: &str, netmask: &str) -> Result<Subnet> {
        let body = serde_json::json!({ "name": name, "address": address, "netmask": netmask });
        self.client.create("Subnet", name, "zones", &zone.id, "subnets", &body).await
    }

    /// `NamespaceCreated` (spec §4.3): insert `{zone, subnets}` keyed by
    /// namespace name. Overwrites any stale entry from a prior crash.
    pub async fn register_namespace(&self, namespace: &str, zone: Zone, subnets: Vec<SubnetRecord>) {
        let mut caches = self.caches.lock().await;
        caches.namespaces.insert(namespace.to_string(), NamespaceRecord { zone, subnets });
    }

    /// The full allocation protocol of spec §4.2: try every non-customed
    /// existing subnet in order, then fall back to materializing a new
    /// FreeCIDR-backed subnet.
    pub async fn allocate_pod_address(&self, namespace: &str) -> Result<(String, String, String)> {
        let mut caches = self.caches.lock().await;

        let record = caches
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::InvalidNetwork(format!("namespace {namespace} has no registered zone")))?;

        for subnet_record in record.subnets.iter_mut().filter(|s| !s.customed) {
            if let Ok(ip) = subnet_record.range.allocate_next() {
                return Ok((ip.to_string(), subnet_record.range.cidr().mask().to_string(), subnet_record.subnet.id.clone()));
            }
        }

        let zone = record.zone.clone_ref();
        let subnet_index = record.subnets.len();

        loop {
            let prefix = match caches.free_cidr.take() {
                Ok(prefix) => prefix,
                Err(_) => return Err(Error::NoFreeAddress(namespace.to_string())),
            };

            let mut range = SubnetRange::new(prefix);
            let ip = match range.allocate_next() {
                Ok(ip) => ip,
                Err(_) => continue,
            };

            let name = format!("{namespace}-{subnet_index}");
            let address = prefix.network().to_string();
            let netmask = prefix.mask().to_string();
            match self.zone_add_subnet(&zone, &name, &address, &netmask).await {
                Ok(subnet) => {
                    let mask = netmask.clone();
                    let record = caches
                        .namespaces
                        .get_mut(namespace)
                        .expect("namespace present, locked throughout");
                    record.subnets.push(SubnetRecord {
                        subnet: subnet.clone(),
                        range,
                        customed: false,
                    });
                    return Ok((ip.to_string(), mask, subnet.id));
                }
                Err(e) => {
                    let _ = range.release(ip);
                    tracing::warn!(namespace, prefix = %prefix, error = %e, "failed to materialize subnet, trying next FreeCIDR entry");
                    continue;
                }
            }
        }
    }

    /// Unmaterialized prefixes left in the cluster-wide FreeCIDR pool.
    pub async fn free_cidrs_remaining(&self) -> usize {
        self.caches.lock().await.free_cidr.len()
    }

    /// Addresses currently allocated to `namespace` across all its subnets.
    pub async fn addresses_allocated(&self, namespace: &str) -> usize {
        self.caches
            .lock()
            .await
            .namespaces
            .get(namespace)
            .map(|record| record.subnets.iter().map(|s| s.range.allocated_count()).sum())
            .unwrap_or(0)
    }

    /// The deallocation protocol of spec §4.2.
    pub async fn release_pod_address(&self, namespace: &str, ip: &str, netmask: &str) -> Result<()> {
        let ip: Ipv4Addr = ip.parse().map_err(|_| Error::InvalidNetwork(ip.to_string()))?;
        let mask: Ipv4Addr = netmask.parse().map_err(|_| Error::InvalidNetwork(netmask.to_string()))?;
        let prefix = Ipv4Addr::from(u32::from(ip) & u32::from(mask));

        let mut caches = self.caches.lock().await;
        let record = caches
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::InvalidNetwork(format!("namespace {namespace} has no registered zone")))?;

        match record.subnets.iter_mut().find(|s| s.range.cidr().network() == prefix) {
            Some(subnet_record) => {
                if let Err(e) = subnet_record.range.release(ip) {
                    tracing::warn!(namespace, %ip, error = %e, "release mismatch, continuing without retry");
                }
                Ok(())
            }
            None => {
                tracing::warn!(namespace, %ip, %prefix, "no matching subnet record for address, continuing without retry");
                Ok(())
            }
        }
    }
}

fn subnet_cidr(subnet: &Subnet) -> Result<Ipv4Network> {
    let addr: Ipv4Addr = subnet.address.parse().map_err(|_| Error::InvalidNetwork(subnet.address.clone()))?;
    let mask: Ipv4Addr = subnet.netmask.parse().map_err(|_| Error::InvalidNetwork(subnet.netmask.clone()))?;
    let prefix_len = u32::from(mask).count_ones() as u8;
    Ipv4Network::new(addr, prefix_len).map_err(|e| Error::InvalidNetwork(e.to_string()))
}

/// Remove `cidr` from the pool if present. Returns whether it was found
/// there (i.e. the subnet is FreeCIDR-backed, not administrator-provisioned).
fn remove_matching_prefix(pool: &mut FreeCidrPool, cidr: Ipv4Network) -> bool {
    let before = pool.len();
    pool.remove(cidr);
    pool.len() != before
}

impl Zone {
    /// Cheap clone used to release the namespace-map borrow before awaiting
    /// the SDN create call inside [`SdnGateway::allocate_pod_address`].
    fn clone_ref(&self) -> Zone {
        self.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn zone(name: &str) -> Zone {
        Zone {
            id: format!("{name}-id"),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn allocate_prefers_existing_non_customed_subnets_in_order() {
        let gateway = test_gateway();
        gateway
            .register_namespace(
                "alpha",
                zone("K8S namespace alpha"),
                vec![SubnetRecord {
                    subnet: Subnet {
                        id: "subnet-1".into(),
                        name: "alpha-0".into(),
                        address: "10.0.0.0".into(),
                        netmask: "255.255.255.0".into(),
                    },
                    range: SubnetRange::new(Ipv4Network::from_str("10.0.0.0/24").unwrap()),
                    customed: false,
                }],
            )
            .await;

        let (ip, mask, subnet_id) = gateway.allocate_pod_address("alpha").await.unwrap();
        assert_eq!(ip, "10.0.0.1");
        assert_eq!(mask, "255.255.255.0");
        assert_eq!(subnet_id, "subnet-1");
    }

    #[tokio::test]
    async fn allocate_skips_customed_subnets() {
        let gateway = test_gateway();
        gateway
            .register_namespace(
                "beta",
                zone("K8S namespace beta"),
                vec![SubnetRecord {
                    subnet: Subnet {
                        id: "custom-1".into(),
                        name: "custom".into(),
                        address: "192.168.5.0".into(),
                        netmask: "255.255.255.0".into(),
                    },
                    range: SubnetRange::new(Ipv4Network::from_str("192.168.5.0/24").unwrap()),
                    customed: true,
                }],
            )
            .await;
        // Drain the FreeCIDR pool so the fallback path fails immediately
        // without attempting any SDN call, isolating the assertion to
        // "the customed subnet was never touched".
        gateway.caches.lock().await.free_cidr.take().unwrap();

        let result = gateway.allocate_pod_address("beta").await;
        assert!(matches!(result, Err(Error::NoFreeAddress(_))));
        let caches = gateway.caches.lock().await;
        let record = &caches.namespaces["beta"];
        assert_eq!(record.subnets[0].range.allocated_count(), 2);
    }

    fn test_gateway() -> SdnGateway {
        // A gateway with no working transport; fine for tests that only
        // exercise the in-memory namespace/subnet bookkeeping and never
        // reach `zone_add_subnet`.
        let client = SdnClient::new_unchecked();
        SdnGateway::new(
            client,
            "enterprise-1".into(),
            "domain-1".into(),
            FreeCidrPool::new(Ipv4Network::from_str("10.0.0.0/24").unwrap(), 0).unwrap(),
        )
    }
}
