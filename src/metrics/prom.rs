use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::proto::MetricFamily;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

use crate::error::ProbeError;

lazy_static! {
    static ref PROBES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ssl_pubkey_exporter_probes_total",
        "Total number of probes, by result",
        &["result"]
    )
    .unwrap();
    static ref PROBE_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ssl_pubkey_exporter_probe_failures_total",
        "Total number of failed probes, by reason",
        &["reason"]
    )
    .unwrap();
    static ref PROBE_DURATION_SECONDS: Histogram = register_histogram!(
        "ssl_pubkey_exporter_probe_duration_seconds",
        "Time spent resolving and probing a target",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();
}

/// Records the outcome of one probe in the process wide registry.
///
/// # Arguments
/// * `elapsed` - time spent resolving and probing
/// * `error` - the failure, if the probe did not produce a fingerprint
pub fn observe_probe(elapsed: Duration, error: Option<&ProbeError>) {
    PROBE_DURATION_SECONDS.observe(elapsed.as_secs_f64());
    match error {
        None => PROBES_TOTAL.with_label_values(&["success"]).inc(),
        Some(e) => {
            PROBES_TOTAL.with_label_values(&["failure"]).inc();
            PROBE_FAILURES_TOTAL.with_label_values(&[e.kind()]).inc();
        }
    }
}

/// Encodes metric families in the text exposition format.
///
/// Returns the body and its content type.
pub fn encode_text(families: &[MetricFamily]) -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    let body = String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))?;
    Ok((body, encoder.format_type().to_string()))
}

/// Encodes the process wide registry: self metrics plus process metrics.
pub fn render_self_metrics() -> Result<(String, String), prometheus::Error> {
    encode_text(&prometheus::gather())
}
