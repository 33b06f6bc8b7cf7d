use std::{
    task::{Context, Poll},
    time::Instant,
};

use http::{Request, Response};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tower::{Layer, Service};
use tracing::debug;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RequestLabels {
    status: String,
    endpoint: String,
}

/// Metrics layer for monitoring `kube::Client` requests.
#[derive(Clone)]
pub struct MetricsLayer {
    request_count: Family<RequestLabels, Counter>,
    request_duration: Family<RequestLabels, Histogram>,
}

impl MetricsLayer {
    pub fn new(registry: &mut Registry) -> Self {
        debug!("initializing Kubernetes client metrics");
        let request_count = Family::<RequestLabels, Counter>::default();
        let request_duration =
            Family::<RequestLabels, Histogram>::new_with_constructor(|| Histogram::new(exponential_buckets(0.05, 2.0, 8)));

        registry.register("kubernetes_client_http_requests", "Total number of HTTP requests", request_count.clone());
        registry.register(
            "kubernetes_client_http_request_duration_seconds",
            "HTTP request duration in seconds",
            request_duration.clone(),
        );

        Self {
            request_count,
            request_duration,
        }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, service: S) -> Self::Service {
        MetricsService {
            inner: service,
            request_count: self.request_count.clone(),
            request_duration: self.request_duration.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    request_count: Family<RequestLabels, Counter>,
    request_duration: Family<RequestLabels, Histogram>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let endpoint = endpoint_label(req.uri().path());
        let start = Instant::now();

        let future = self.inner.call(req);

        MetricsFuture {
            future,
            endpoint,
            start,
            request_count: self.request_count.clone(),
            request_duration: self.request_duration.clone(),
        }
    }
}

/// Collapse a request path to its first two segments (resource kind plus
/// namespace-or-name) so per-object paths don't blow up cardinality.
fn endpoint_label(path: &str) -> String {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next().unwrap_or_default();
    let second = segments.next().unwrap_or_default();
    if second.is_empty() {
        format!("/{first}")
    } else {
        format!("/{first}/{second}")
    }
}

#[pin_project::pin_project]
pub struct MetricsFuture<F> {
    #[pin]
    future: F,
    endpoint: String,
    start: Instant,
    request_count: Family<RequestLabels, Counter>,
    request_duration: Family<RequestLabels, Histogram>,
}

impl<F, ResBody, E> std::future::Future for MetricsFuture<F>
where
    F: std::future::Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let poll_result = this.future.poll(cx);

        if let Poll::Ready(Ok(response)) = &poll_result {
            let duration = this.start.elapsed().as_secs_f64();
            let labels = RequestLabels {
                status: response.status().as_str().to_string(),
                endpoint: this.endpoint.clone(),
            };
            this.request_count.get_or_create(&labels).inc();
            this.request_duration.get_or_create(&labels).observe(duration);
        }

        poll_result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoint_label_collapses_to_kind_and_name() {
        assert_eq!(endpoint_label("/api/v1/namespaces/default/pods/p1"), "/api/v1");
        assert_eq!(endpoint_label("/apis/apps/v1"), "/apis/apps");
        assert_eq!(endpoint_label("/healthz"), "/healthz");
    }
}
