use crate::metrics::MetricsLayer;

use hyper_util::rt::TokioExecutor;
use kube::Result as KubeResult;
use kube::{Client, Config, client::ConfigExt};
use prometheus_client::registry::Registry;
use tower::{BoxError, ServiceBuilder};

/// Builds a `kube::Client` instrumented with request-count/duration metrics,
/// the same shape the SDN and CNI-agent clients build their own
/// `reqwest::Client`s with a TLS identity up front and hand out `&self`
/// methods from.
pub async fn new_client_with_metrics(config: Config, registry: &mut Registry) -> KubeResult<Client> {
    let metrics_layer = MetricsLayer::new(registry);
    let https = config.rustls_https_connector()?;
    let service = ServiceBuilder::new()
        .layer(metrics_layer)
        .layer(config.base_uri_layer())
        .option_layer(config.auth_layer()?)
        .map_err(BoxError::from)
        .service(hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(https));

    Ok(Client::new(service, config.default_namespace))
}
