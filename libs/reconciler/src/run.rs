//! Watcher orchestration: one raw `kube::runtime::watcher` stream per
//! resource kind, classifying each `Apply` event as Created or Updated by
//! comparing against a locally tracked last-seen state (spec §4.3-4.5) since
//! `watcher::Event` itself only distinguishes Apply from Delete.
//!
//! One `tokio::select!` arm per watched resource kind, no `Controller`/owns
//! -based reconcile loop — these handlers are event-shaped, not
//! desired-state-shaped (spec §5).

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kaniop_operator::context::Context;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{namespace, pod, service};

fn object_key<K: ResourceExt>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{ns}/{}", obj.name_any()),
        None => obj.name_any(),
    }
}

async fn watch_namespaces(client: Client, ctx: Arc<Context>) {
    let last_seen: Mutex<HashMap<String, Namespace>> = Mutex::new(HashMap::new());
    let api = Api::<Namespace>::all(client);
    watcher(api, watcher::Config::default().any_semantic())
        .default_backoff()
        .for_each(|event| {
            let ctx = ctx.clone();
            let last_seen = &last_seen;
            async move {
                match event {
                    Ok(watcher::Event::Apply(ns)) => {
                        let key = object_key(&ns);
                        let previous = last_seen.lock().await.insert(key, ns.clone());
                        let result = match previous {
                            Some(old) => namespace::namespace_updated(&old, &ns, ctx).await,
                            None => namespace::namespace_created(&ns, ctx).await,
                        };
                        if let Err(e) = result {
                            error!(error = %e, "namespace handler failed, continuing to watch");
                        }
                    }
                    Ok(watcher::Event::Delete(ns)) => {
                        last_seen.lock().await.remove(&object_key(&ns));
                        if let Err(e) = namespace::namespace_deleted(&ns, ctx).await {
                            error!(error = %e, "namespace delete handler failed, continuing to watch");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "namespace watch stream error"),
                }
            }
        })
        .await;
}

async fn watch_pods(client: Client, ctx: Arc<Context>) {
    let last_seen: Mutex<HashMap<String, Pod>> = Mutex::new(HashMap::new());
    let api = Api::<Pod>::all(client);
    watcher(api, watcher::Config::default().any_semantic())
        .default_backoff()
        .for_each(|event| {
            let ctx = ctx.clone();
            let last_seen = &last_seen;
            async move {
                match event {
                    Ok(watcher::Event::Apply(p)) => {
                        let key = object_key(&p);
                        let previous = last_seen.lock().await.insert(key, p.clone());
                        let result = match previous {
                            Some(old) => pod::pod_updated(&old, &p, ctx).await,
                            None => pod::pod_created(&p, ctx).await,
                        };
                        if let Err(e) = result {
                            error!(error = %e, "pod handler failed, continuing to watch");
                        }
                    }
                    Ok(watcher::Event::Delete(p)) => {
                        last_seen.lock().await.remove(&object_key(&p));
                        if let Err(e) = pod::pod_deleted(&p, ctx).await {
                            error!(error = %e, "pod delete handler failed, continuing to watch");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "pod watch stream error"),
                }
            }
        })
        .await;
}

async fn watch_services(client: Client, ctx: Arc<Context>) {
    let last_seen: Mutex<HashMap<String, Service>> = Mutex::new(HashMap::new());
    let api = Api::<Service>::all(client);
    watcher(api, watcher::Config::default().any_semantic())
        .default_backoff()
        .for_each(|event| {
            let ctx = ctx.clone();
            let last_seen = &last_seen;
            async move {
                match event {
                    Ok(watcher::Event::Apply(svc)) => {
                        let key = object_key(&svc);
                        let previous = last_seen.lock().await.insert(key, svc.clone());
                        let result = match previous {
                            Some(old) => service::service_updated(&old, &svc, ctx).await,
                            None => service::service_created(&svc, ctx).await,
                        };
                        if let Err(e) = result {
                            error!(error = %e, "service handler failed, continuing to watch");
                        }
                    }
                    Ok(watcher::Event::Delete(svc)) => {
                        last_seen.lock().await.remove(&object_key(&svc));
                        if let Err(e) = service::service_deleted(&svc, ctx).await {
                            error!(error = %e, "service delete handler failed, continuing to watch");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "service watch stream error"),
                }
            }
        })
        .await;
}

/// Watches namespaces, pods, and services until `shutdown` is cancelled.
pub async fn run(client: Client, ctx: Arc<Context>, shutdown: CancellationToken) {
    tokio::select! {
        _ = watch_namespaces(client.clone(), ctx.clone()) => {},
        _ = watch_pods(client.clone(), ctx.clone()) => {},
        _ = watch_services(client, ctx) => {},
        _ = shutdown.cancelled() => {},
    }
}
