//! Prometheus metrics for the custody ledger.
//!
//! All metrics follow the naming convention: `cc_<area>_<metric>_<unit>`
//! and live in a private registry rendered by [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Ledger metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Requests handled, by method
    pub static ref REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cc_node_requests_total", "Requests handled by method"),
        &["method"]
    ).expect("metric creation failed");

    /// Request handling latency
    pub static ref REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cc_node_request_duration_seconds",
            "Time spent handling one request"
        ).buckets(exponential_buckets(0.000_01, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Committed product transitions, by kind
    pub static ref TRANSITIONS_ACCEPTED: CounterVec = CounterVec::new(
        Opts::new("cc_ledger_transitions_accepted_total", "Committed transitions by kind"),
        &["kind"]
    ).expect("metric creation failed");

    /// Rejected writes, by error code
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("cc_ledger_requests_rejected_total", "Rejected writes by error code"),
        &["code"]
    ).expect("metric creation failed");

    /// Transitions that flagged their product
    pub static ref PRODUCTS_FLAGGED: Counter = Counter::new(
        "cc_ledger_products_flagged_total",
        "Transitions that marked a product suspicious"
    ).expect("metric creation failed");

    /// Committed role grants
    pub static ref ROLE_GRANTS: Counter = Counter::new(
        "cc_ledger_role_grants_total",
        "Role grants committed"
    ).expect("metric creation failed");
}

/// Proof that the ledger metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the ledger registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(REQUESTS_TOTAL.clone()),
        Box::new(REQUEST_DURATION.clone()),
        Box::new(TRANSITIONS_ACCEPTED.clone()),
        Box::new(REQUESTS_REJECTED.clone()),
        Box::new(PRODUCTS_FLAGGED.clone()),
        Box::new(ROLE_GRANTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Count a handled request.
pub fn record_request(method: &str) {
    REQUESTS_TOTAL.with_label_values(&[method]).inc();
}

/// Count a committed product transition.
pub fn record_accepted(kind: &str, flagged: bool) {
    TRANSITIONS_ACCEPTED.with_label_values(&[kind]).inc();
    if flagged {
        PRODUCTS_FLAGGED.inc();
    }
}

/// Count a rejected write.
pub fn record_rejected(code: &str) {
    REQUESTS_REJECTED.with_label_values(&[code]).inc();
}

/// Count a committed role grant.
pub fn record_role_grant() {
    ROLE_GRANTS.inc();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
