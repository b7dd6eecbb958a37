//! Analyzer Metrics and Observability
//!
//! Atomic counters with Prometheus text export, plus structured tracing
//! helpers for analysis events.

use crate::analyzer::{Analysis, InputFormatError};
use crate::bankers::SafetyStatus;
use crate::graph::CycleEdge;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Analyzer metrics for Prometheus export.
///
/// Cloning is cheap; clones share the same counters.
#[derive(Debug, Clone)]
pub struct AnalyzerMetrics {
    inner: Arc<AnalyzerMetricsInner>,
}

#[derive(Debug)]
struct AnalyzerMetricsInner {
    /// Instance label
    instance: String,

    // Counters
    analyses_total: AtomicU64,
    deadlocks_detected: AtomicU64,
    input_errors: AtomicU64,
    edges_processed: AtomicU64,
    safety_checks_total: AtomicU64,
    unsafe_states: AtomicU64,

    // Gauges
    last_cycle_len: AtomicU64,
    last_analysis_ns: AtomicU64,

    #[cfg(feature = "observability")]
    analysis_duration: Option<prometheus::Histogram>,
}

impl AnalyzerMetrics {
    /// Creates a new metrics instance labelled with `instance`.
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AnalyzerMetricsInner {
                instance: instance.into(),
                analyses_total: AtomicU64::new(0),
                deadlocks_detected: AtomicU64::new(0),
                input_errors: AtomicU64::new(0),
                edges_processed: AtomicU64::new(0),
                safety_checks_total: AtomicU64::new(0),
                unsafe_states: AtomicU64::new(0),
                last_cycle_len: AtomicU64::new(0),
                last_analysis_ns: AtomicU64::new(0),
                #[cfg(feature = "observability")]
                analysis_duration: analysis_histogram(),
            }),
        }
    }

    pub fn instance(&self) -> &str {
        &self.inner.instance
    }

    // ========================================================================
    // RECORDING
    // ========================================================================

    /// Records one completed analysis.
    pub fn record_analysis(&self, edges: usize, analysis: &Analysis, elapsed: Duration) {
        let inner = &self.inner;
        inner.analyses_total.fetch_add(1, Ordering::Relaxed);
        inner
            .edges_processed
            .fetch_add(edges as u64, Ordering::Relaxed);
        inner
            .last_cycle_len
            .store(analysis.cycle.len() as u64, Ordering::Relaxed);
        inner
            .last_analysis_ns
            .store(elapsed.as_nanos() as u64, Ordering::Relaxed);

        if analysis.deadlock_detected {
            inner.deadlocks_detected.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "observability")]
        if let Some(histogram) = &inner.analysis_duration {
            histogram.observe(elapsed.as_secs_f64());
        }
    }

    /// Increments the rejected-input counter.
    pub fn inc_input_errors(&self) {
        self.inner.input_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one Banker's safety check and its outcome.
    pub fn record_safety_check(&self, status: &SafetyStatus) {
        self.inner
            .safety_checks_total
            .fetch_add(1, Ordering::Relaxed);
        if matches!(status, SafetyStatus::Unsafe { .. }) {
            self.inner.unsafe_states.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ========================================================================
    // GETTERS (for export)
    // ========================================================================

    pub fn analyses_total(&self) -> u64 {
        self.inner.analyses_total.load(Ordering::Relaxed)
    }
    pub fn deadlocks_detected(&self) -> u64 {
        self.inner.deadlocks_detected.load(Ordering::Relaxed)
    }
    pub fn input_errors(&self) -> u64 {
        self.inner.input_errors.load(Ordering::Relaxed)
    }
    pub fn edges_processed(&self) -> u64 {
        self.inner.edges_processed.load(Ordering::Relaxed)
    }
    pub fn safety_checks_total(&self) -> u64 {
        self.inner.safety_checks_total.load(Ordering::Relaxed)
    }
    pub fn unsafe_states(&self) -> u64 {
        self.inner.unsafe_states.load(Ordering::Relaxed)
    }
    pub fn last_cycle_len(&self) -> u64 {
        self.inner.last_cycle_len.load(Ordering::Relaxed)
    }

    /// Duration of the most recent analysis.
    pub fn last_analysis_duration(&self) -> Duration {
        Duration::from_nanos(self.inner.last_analysis_ns.load(Ordering::Relaxed))
    }

    // ========================================================================
    // PROMETHEUS EXPORT
    // ========================================================================

    /// Exports metrics in Prometheus text format.
    pub fn to_prometheus_text(&self) -> String {
        let instance = self.instance();

        let mut output = String::new();

        macro_rules! metric {
            ($kind:expr, $name:expr, $help:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{}{{instance=\"{}\"}} {}\n",
                    $name, $help, $name, $kind, $name, instance, $value
                ));
            };
        }

        metric!(
            "counter",
            "deadlock_analyses_total",
            "Total allocation snapshots analyzed",
            self.analyses_total()
        );
        metric!(
            "counter",
            "deadlock_detected_total",
            "Snapshots in which a circular wait was found",
            self.deadlocks_detected()
        );
        metric!(
            "counter",
            "deadlock_input_errors_total",
            "Payloads rejected as malformed",
            self.input_errors()
        );
        metric!(
            "counter",
            "deadlock_edges_processed_total",
            "Edges inserted into allocation graphs",
            self.edges_processed()
        );
        metric!(
            "counter",
            "deadlock_safety_checks_total",
            "Banker's safety checks performed",
            self.safety_checks_total()
        );
        metric!(
            "counter",
            "deadlock_unsafe_states_total",
            "Safety checks that ended in an unsafe state",
            self.unsafe_states()
        );
        metric!(
            "gauge",
            "deadlock_last_cycle_length",
            "Edges in the most recently reported cycle",
            self.last_cycle_len()
        );
        metric!(
            "gauge",
            "deadlock_last_analysis_seconds",
            "Duration of the most recent analysis",
            self.last_analysis_duration().as_secs_f64()
        );

        output
    }
}

#[cfg(feature = "observability")]
const ANALYSIS_DURATION: &str = "deadlock_analysis_duration_seconds";
#[cfg(feature = "observability")]
const ANALYSIS_DURATION_HELP: &str = "Allocation snapshot analysis duration in seconds";

/// Registers the duration histogram with the default registry. A second
/// instance finds the name taken and keeps an unregistered histogram.
#[cfg(feature = "observability")]
fn analysis_histogram() -> Option<prometheus::Histogram> {
    prometheus::register_histogram!(
        ANALYSIS_DURATION,
        ANALYSIS_DURATION_HELP,
        prometheus::DEFAULT_BUCKETS.to_vec()
    )
    .or_else(|err| {
        tracing::debug!(
            error = %err,
            metric = ANALYSIS_DURATION,
            "Histogram registration failed, using a private histogram"
        );
        prometheus::Histogram::with_opts(prometheus::HistogramOpts::new(
            ANALYSIS_DURATION,
            ANALYSIS_DURATION_HELP,
        ))
    })
    .ok()
}

// ============================================================================
// TRACING HELPERS
// ============================================================================

/// Records a detected circular wait.
pub fn trace_deadlock_detected(edges: usize, cycle: &[CycleEdge]) {
    let path = cycle
        .iter()
        .map(|edge| edge.source.as_str())
        .collect::<Vec<_>>()
        .join(" -> ");
    tracing::info!(
        edges = edges,
        cycle_len = cycle.len(),
        cycle = %path,
        event = "deadlock_detected",
        "Circular wait detected"
    );
}

/// Records a rejected payload.
pub fn trace_input_rejected(err: &InputFormatError) {
    tracing::warn!(
        error = %err,
        event = "input_rejected",
        "Rejected allocation payload"
    );
}

/// Records the outcome of a safety check.
pub fn trace_safety_checked(process: usize, status: &SafetyStatus) {
    tracing::debug!(
        process = process,
        status = status.label(),
        event = "safety_checked",
        "Checked request safety"
    );
}

// ============================================================================
// TESTS
// ============================================================================
