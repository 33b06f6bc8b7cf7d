//! Reconciler and IPAM metrics, exposed at `/metrics` (spec §6).

use std::sync::atomic::AtomicI64;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ReconcilerKind {
    Namespace,
    Pod,
    Service,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReconcileLabels {
    kind: ReconcilerKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespaceLabels {
    namespace: String,
}

/// Registered once at startup and shared by every reconciler handler through
/// `kaniop_operator::context::Context`.
#[derive(Clone)]
pub struct Metrics {
    operations: Family<ReconcileLabels, Counter>,
    failures: Family<ReconcileLabels, Counter>,
    duration: Family<ReconcileLabels, Histogram>,
    free_cidrs_remaining: Gauge<i64, AtomicI64>,
    addresses_allocated: Family<NamespaceLabels, Gauge<i64, AtomicI64>>,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let operations = Family::<ReconcileLabels, Counter>::default();
        let failures = Family::<ReconcileLabels, Counter>::default();
        let duration = Family::<ReconcileLabels, Histogram>::new_with_constructor(|| Histogram::new(exponential_buckets(0.01, 2.0, 10)));
        let free_cidrs_remaining = Gauge::default();
        let addresses_allocated = Family::<NamespaceLabels, Gauge<i64, AtomicI64>>::default();

        registry.register("kaniop_reconcile_operations", "Total number of reconcile operations", operations.clone());
        registry.register(
            "kaniop_reconcile_failures",
            "Number of errors that occurred during reconcile operations",
            failures.clone(),
        );
        registry.register(
            "kaniop_reconcile_duration_seconds",
            "Histogram of reconcile handler durations",
            duration.clone(),
        );
        registry.register(
            "kaniop_ipam_free_cidrs_remaining",
            "Number of unmaterialized subnet prefixes left in the FreeCIDR pool",
            free_cidrs_remaining.clone(),
        );
        registry.register(
            "kaniop_ipam_addresses_allocated",
            "Number of addresses currently allocated per namespace",
            addresses_allocated.clone(),
        );

        Self {
            operations,
            failures,
            duration,
            free_cidrs_remaining,
            addresses_allocated,
        }
    }

    pub fn reconcile_count_and_measure(&self, kind: ReconcilerKind) -> ReconcileMeasurer {
        self.operations.get_or_create(&ReconcileLabels { kind }).inc();
        ReconcileMeasurer {
            start: Instant::now(),
            kind,
            duration: self.duration.clone(),
        }
    }

    pub fn reconcile_failure_inc(&self, kind: ReconcilerKind) {
        self.failures.get_or_create(&ReconcileLabels { kind }).inc();
    }

    pub fn free_cidrs_remaining_set(&self, count: i64) {
        self.free_cidrs_remaining.set(count);
    }

    pub fn addresses_allocated_set(&self, namespace: &str, count: i64) {
        self.addresses_allocated
            .get_or_create(&NamespaceLabels { namespace: namespace.to_string() })
            .set(count);
    }
}

/// Records reconcile duration on drop, so every early return in a handler
/// still measures wall time without threading a stop-timer call through
/// each branch.
pub struct ReconcileMeasurer {
    start: Instant,
    kind: ReconcilerKind,
    duration: Family<ReconcileLabels, Histogram>,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.duration.get_or_create(&ReconcileLabels { kind: self.kind }).observe(elapsed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reconcile_measurer_records_on_drop_without_panicking() {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        {
            let _measurer = metrics.reconcile_count_and_measure(ReconcilerKind::Pod);
        }
        metrics.reconcile_failure_inc(ReconcilerKind::Pod);
        metrics.free_cidrs_remaining_set(42);
        metrics.addresses_allocated_set("alpha", 3);
    }
}
