//! Shared state handed to every reconcile handler: one `Context` struct
//! threading a `Client`, metrics, and cross-cutting caches into each
//! handler — here the SDN gateway and CNI-agent client this reconciler
//! drives.

use std::collections::HashMap;
use std::sync::Arc;

use kaniop_cni_agent::CniAgentClient;
use kaniop_k8s_util::events::{Recorder, Reporter};
use kaniop_sdn::gateway::SdnGateway;
use kaniop_sdn::model::Container;
use kube::Client;
use tokio::sync::Mutex;

use crate::metrics::Metrics;

/// Containers allocated in the SDN but not yet acknowledged by the owning
/// node's CNI agent (spec §4.4: dispatch failures are retried, not rolled
/// back). Keyed by container name.
pub type PendingPods = Mutex<HashMap<String, Container>>;

/// Cross-cutting state available to the namespace, pod, and service
/// handlers. Cloning is cheap — every field is an `Arc` or already
/// internally reference-counted.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub gateway: Arc<SdnGateway>,
    pub cni_agent: Arc<CniAgentClient>,
    pub pending_pods: Arc<PendingPods>,
    pub recorder: Recorder,
    pub metrics: Arc<Metrics>,
}

impl Context {
    pub fn new(client: Client, gateway: Arc<SdnGateway>, cni_agent: Arc<CniAgentClient>, metrics: Arc<Metrics>) -> Self {
        let recorder = Recorder::new(client.clone(), Reporter::from("kaniop-netctl"));
        Self {
            client,
            gateway,
            cni_agent,
            pending_pods: Arc::new(Mutex::new(HashMap::new())),
            recorder,
            metrics,
        }
    }
}
