use prometheus::{
    Histogram, HistogramOpts, HistogramTimer, IntCounter, IntCounterVec, Opts,
    Registry,
};

use crate::controller::ReconcileErr;
use crate::store::StoreOp;

/// Controller metrics. Built unregistered; [`Metrics::register`] attaches
/// them to the registry the metrics endpoint gathers from.
#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: Histogram,
    pub child_operations: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let reconciliations = IntCounter::with_opts(Opts::new(
            "app_controller_reconciliations_total",
            "reconciliations",
        ))?;
        let failures = IntCounterVec::new(
            Opts::new(
                "app_controller_reconciliation_errors_total",
                "reconciliation errors by child kind",
            ),
            &["kind"],
        )?;
        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new(
                "app_controller_reconcile_duration_seconds",
                "duration of reconcile to complete in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
        )?;
        let child_operations = IntCounterVec::new(
            Opts::new(
                "app_controller_child_operations_total",
                "writes issued against child resources",
            ),
            &["kind", "op"],
        )?;
        Ok(Self {
            reconciliations,
            failures,
            reconcile_duration,
            child_operations,
        })
    }

    pub fn register(self, registry: &Registry) -> prometheus::Result<Self> {
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.child_operations.clone()))?;
        Ok(self)
    }

    /// Counts a reconcile and times it until the returned timer drops.
    pub fn count_and_measure(&self) -> HistogramTimer {
        self.reconciliations.inc();
        self.reconcile_duration.start_timer()
    }

    pub fn reconcile_failure(&self, err: &ReconcileErr) {
        self.failures.with_label_values(&[err.kind()]).inc();
    }

    pub fn child_write(&self, kind: &str, op: StoreOp) {
        self.child_operations
            .with_label_values(&[kind, op.as_str()])
            .inc();
    }
}
