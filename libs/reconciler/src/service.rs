//! `ServiceCreated`/`ServiceUpdated`/`ServiceDeleted` (spec §4.5).

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use kaniop_operator::context::Context;
use kaniop_operator::metrics::ReconcilerKind;
use kube::ResourceExt;
use tracing::info;

use crate::error::Result;

const SINGLE_HOST_NETMASK: &str = "255.255.255.255";

pub fn network_macro_name(service: &str) -> String {
    format!("K8S service {service}")
}

pub fn network_macro_group_name(namespace: &str) -> String {
    format!("K8S services in namespace {namespace}")
}

/// Ensure a NetworkMacro exists for `svc.clusterIP`, creating its owning
/// NetworkMacroGroup first if needed (spec §4.5).
pub async fn service_created(svc: &Service, ctx: Arc<Context>) -> Result<()> {
    let _measurer = ctx.metrics.reconcile_count_and_measure(ReconcilerKind::Service);
    let name = svc.name_any();
    let namespace = svc.namespace().unwrap_or_default();

    let nm_name = network_macro_name(&name);
    if ctx.gateway.exists_network_macro(&nm_name).await?.is_some() {
        return Ok(());
    }

    let cluster_ip = svc.spec.as_ref().and_then(|s| s.cluster_ip.clone()).unwrap_or_default();

    let nmg_name = network_macro_group_name(&namespace);
    let nmg = match ctx.gateway.exists_network_macro_group(&nmg_name).await? {
        Some(nmg) => nmg,
        None => ctx.gateway.create_network_macro_group(&nmg_name).await?,
    };

    let nm = ctx.gateway.create_network_macro(&nm_name, &cluster_ip, SINGLE_HOST_NETMASK).await?;
    ctx.gateway.assign_network_macro_to_group(&nmg, &nm).await?;
    info!(service = %name, namespace, cluster_ip, "NetworkMacro created and assigned");
    Ok(())
}

pub async fn service_deleted(_svc: &Service, _ctx: Arc<Context>) -> Result<()> {
    Ok(())
}

pub async fn service_updated(_old: &Service, _new: &Service, _ctx: Arc<Context>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn network_macro_names_carry_k8s_prefix() {
        assert_eq!(network_macro_name("web"), "K8S service web");
        assert_eq!(network_macro_group_name("alpha"), "K8S services in namespace alpha");
    }
}
