//! `PodCreated`/`PodUpdated`/`PodDeleted` (spec §4.4) — the reconciler's
//! core: namespace barrier, adopt-existing check, address allocation, and
//! CNI-agent dispatch.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::ObjectReference;
use kaniop_ipam::mac::{format_mac, generate_locally_administered};
use kaniop_k8s_util::events::{Event, EventType};
use kaniop_operator::context::Context;
use kaniop_operator::metrics::ReconcilerKind;
use kaniop_operator::telemetry::get_trace_id;
use kaniop_sdn::model::{Container, ContainerInterface};
use kube::{Resource, ResourceExt};
use rand::RngCore;
use tokio::time::{interval, timeout};
use tracing::{error, info, warn};

use crate::error::{Error, Result};

const NAMESPACE_BARRIER_POLL: Duration = Duration::from_millis(100);
const NAMESPACE_BARRIER_TIMEOUT: Duration = Duration::from_secs(10);

/// `name = "<podName>_<podNamespace>"` (spec §3).
pub fn container_name(pod_name: &str, pod_namespace: &str) -> String {
    format!("{pod_name}_{pod_namespace}")
}

/// The pod's cluster UID with hyphens stripped, concatenated with itself
/// (256 bits total).
pub fn container_uuid(pod_uid: &str) -> String {
    let stripped = pod_uid.replace('-', "");
    format!("{stripped}{stripped}")
}

async fn wait_for_namespace(ctx: &Context, namespace: &str) -> Result<()> {
    if ctx.gateway.namespace_ready(namespace).await {
        return Ok(());
    }
    let wait = async {
        let mut ticker = interval(NAMESPACE_BARRIER_POLL);
        loop {
            ticker.tick().await;
            if ctx.gateway.namespace_ready(namespace).await {
                return;
            }
        }
    };
    timeout(NAMESPACE_BARRIER_TIMEOUT, wait)
        .await
        .map_err(|_| Error::NamespaceNotReady(namespace.to_string()))
}

pub async fn pod_created(pod: &Pod, ctx: Arc<Context>) -> Result<()> {
    let _measurer = ctx.metrics.reconcile_count_and_measure(ReconcilerKind::Pod);
    let pod_name = pod.name_any();
    let namespace = pod.namespace().ok_or_else(|| Error::PodMissingNamespace(pod_name.clone()))?;
    let reference = pod_object_ref(pod);

    if let Err(e) = wait_for_namespace(&ctx, &namespace).await {
        ctx.recorder
            .publish(
                Event {
                    type_: EventType::Warning,
                    reason: "NamespaceNotReady".into(),
                    note: Some(annotate_with_trace_id(e.to_string())),
                    action: "AllocateAddress".into(),
                    secondary: None,
                },
                &reference,
            )
            .await
            .ok();
        return Err(e);
    }

    let c_name = container_name(&pod_name, &namespace);
    let node_name = pod.spec.as_ref().and_then(|s| s.node_name.clone()).unwrap_or_default();

    if let Some(existing) = ctx.gateway.exists_container(&c_name).await? {
        let (ip, mask) = kaniop_sdn::gateway::SdnGateway::container_ip_and_mask(&existing)?;
        info!(pod = %pod_name, namespace, %ip, %mask, "adopted existing container");
        if !node_name.is_empty() {
            if let Err(e) = ctx.cni_agent.put_container(&node_name, &existing).await {
                warn!(pod = %pod_name, node = %node_name, error = %e, "best-effort CNI dispatch for adopted container failed");
            }
        }
        return Ok(());
    }

    let c_uuid = container_uuid(&pod.uid().unwrap_or_default());
    let mac = format_mac(generate_locally_administered(random_bytes()));

    let (ip, netmask, subnet_id) = match ctx.gateway.allocate_pod_address(&namespace).await {
        Ok(allocation) => allocation,
        Err(e) => {
            ctx.metrics.reconcile_failure_inc(ReconcilerKind::Pod);
            return Err(e.into());
        }
    };
    ctx.metrics.free_cidrs_remaining_set(ctx.gateway.free_cidrs_remaining().await as i64);
    ctx.metrics.addresses_allocated_set(&namespace, ctx.gateway.addresses_allocated(&namespace).await as i64);

    let container = Container {
        id: String::new(),
        name: c_name.clone(),
        uuid: c_uuid,
        orchestration_id: "Kubernetes".into(),
        interfaces: vec![ContainerInterface {
            mac,
            ip: ip.clone(),
            netmask: netmask.clone(),
            attached_network_id: subnet_id.clone(),
        }],
    };

    let created = match ctx.gateway.create_container(&subnet_id, &container).await {
        Ok(created) => created,
        Err(e) => {
            warn!(pod = %pod_name, namespace, %ip, error = %e, "container create failed, releasing address");
            let _ = ctx.gateway.release_pod_address(&namespace, &ip, &netmask).await;
            ctx.metrics.reconcile_failure_inc(ReconcilerKind::Pod);
            return Err(e.into());
        }
    };

    dispatch_or_pend(&ctx, &node_name, &created, &reference).await
}

async fn dispatch_or_pend(ctx: &Context, node_name: &str, container: &Container, reference: &ObjectReference) -> Result<()> {
    if node_name.is_empty() {
        ctx.pending_pods.lock().await.insert(container.name.clone(), container.clone());
        info!(container = %container.name, "pod not yet scheduled, queued in pending registry");
        return Ok(());
    }

    if let Err(e) = ctx.cni_agent.put_container(node_name, container).await {
        error!(container = %container.name, node = node_name, error = %e, "CNI agent dispatch failed");
        ctx.recorder
            .publish(
                Event {
                    type_: EventType::Warning,
                    reason: "CniDispatchFailed".into(),
                    note: Some(annotate_with_trace_id(e.to_string())),
                    action: "DispatchContainer".into(),
                    secondary: None,
                },
                reference,
            )
            .await
            .ok();
        return Err(e.into());
    }
    Ok(())
}

/// `old.nodeName == "" ∧ new.nodeName ≠ ""`: drain the pending registry
/// entry onto the node's CNI agent.
pub async fn pod_updated(old: &Pod, new: &Pod, ctx: Arc<Context>) -> Result<()> {
    let old_node = old.spec.as_ref().and_then(|s| s.node_name.as_deref()).unwrap_or_default();
    let new_node = new.spec.as_ref().and_then(|s| s.node_name.as_deref()).unwrap_or_default();
    if !(old_node.is_empty() && !new_node.is_empty()) {
        return Ok(());
    }

    let pod_name = new.name_any();
    let namespace = new.namespace().ok_or_else(|| Error::PodMissingNamespace(pod_name.clone()))?;
    let c_name = container_name(&pod_name, &namespace);

    let container = {
        let pending = ctx.pending_pods.lock().await;
        pending.get(&c_name).cloned()
    };
    let Some(container) = container else {
        return Ok(());
    };

    ctx.cni_agent.put_container(new_node, &container).await?;
    ctx.pending_pods.lock().await.remove(&c_name);
    info!(container = %c_name, node = new_node, "dispatched pending pod to scheduled node");
    Ok(())
}

pub async fn pod_deleted(pod: &Pod, ctx: Arc<Context>) -> Result<()> {
    let pod_name = pod.name_any();
    let namespace = pod.namespace().ok_or_else(|| Error::PodMissingNamespace(pod_name.clone()))?;
    let c_name = container_name(&pod_name, &namespace);
    let node_name = match pod.spec.as_ref().and_then(|s| s.node_name.clone()) {
        Some(n) if !n.is_empty() => n,
        _ => {
            ctx.pending_pods.lock().await.remove(&c_name);
            return Ok(());
        }
    };

    let container = match ctx.cni_agent.get_container(&node_name, &c_name).await {
        Ok(container) => container,
        Err(e) => {
            warn!(pod = %pod_name, node = %node_name, error = %e, "could not fetch container from CNI agent on delete");
            return Ok(());
        }
    };

    if let Ok((ip, mask)) = kaniop_sdn::gateway::SdnGateway::container_ip_and_mask(&container) {
        if let Err(e) = ctx.gateway.release_pod_address(&namespace, &ip, &mask).await {
            warn!(pod = %pod_name, %ip, error = %e, "address release failed");
        }
        ctx.metrics.addresses_allocated_set(&namespace, ctx.gateway.addresses_allocated(&namespace).await as i64);
    }

    if let Err(e) = ctx.cni_agent.delete_container(&node_name, &c_name).await {
        warn!(pod = %pod_name, node = %node_name, error = %e, "CNI agent delete failed, ignoring");
    }
    Ok(())
}

/// Appends the current span's trace ID to an Event note, when one is set,
/// so an operator can jump from `kubectl describe pod` straight to the
/// matching trace in the configured collector.
fn annotate_with_trace_id(note: String) -> String {
    match get_trace_id() {
        Ok(trace_id) => format!("{note} (trace_id={trace_id})"),
        Err(_) => note,
    }
}

fn random_bytes() -> [u8; 6] {
    let mut buf = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

fn pod_object_ref(pod: &Pod) -> ObjectReference {
    pod.object_ref(&())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn container_name_matches_naming_invariant() {
        assert_eq!(container_name("web-0", "alpha"), "web-0_alpha");
    }

    #[test]
    fn container_uuid_doubles_the_stripped_pod_uid() {
        let uuid = container_uuid("aaaa-bbbb-cccc-dddd");
        assert_eq!(uuid, "aaaabbbbccccddddaaaabbbbccccdddd");
        assert_eq!(uuid.len(), 32);
    }
}
