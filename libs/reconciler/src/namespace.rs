//! `NamespaceCreated`/`NamespaceUpdated`/`NamespaceDeleted` (spec §4.3).

use std::sync::Arc;

use k8s_openapi::api::core::v1::Namespace;
use kaniop_operator::context::Context;
use kaniop_operator::metrics::ReconcilerKind;
use kube::ResourceExt;
use tracing::info;

use crate::error::Result;

pub fn zone_name(namespace: &str) -> String {
    format!("K8S namespace {namespace}")
}

/// Look up or create the namespace's Zone, hydrate its SubnetRecords if it
/// already existed, and register `{zone, subnets}` under the namespace name.
pub async fn namespace_created(ns: &Namespace, ctx: Arc<Context>) -> Result<()> {
    let name = ns.name_any();
    let _measurer = ctx.metrics.reconcile_count_and_measure(ReconcilerKind::Namespace);
    let zone_name = zone_name(&name);

    let (zone, subnets) = match ctx.gateway.exists_zone(&zone_name).await? {
        Some(zone) => {
            let subnets = ctx.gateway.zone_subnets(&zone).await?;
            (zone, subnets)
        }
        None => (ctx.gateway.create_zone(&zone_name).await?, Vec::new()),
    };

    info!(namespace = %name, zone = %zone.id, subnets = subnets.len(), "namespace zone ready");
    ctx.gateway.register_namespace(&name, zone, subnets).await;
    Ok(())
}

/// Declared non-goal: namespace deletion never tears down its Zone.
pub async fn namespace_deleted(_ns: &Namespace, _ctx: Arc<Context>) -> Result<()> {
    Ok(())
}

pub async fn namespace_updated(_old: &Namespace, _new: &Namespace, _ctx: Arc<Context>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zone_name_matches_naming_invariant() {
        assert_eq!(zone_name("alpha"), "K8S namespace alpha");
    }
}
