//! Request scoped fingerprint collector.
//!
//! A [`ProbeCollector`] is built for one probe request, registered in a
//! throwaway [`prometheus::Registry`] and gathered once. Gathering runs the
//! probe and yields either a single `ssl_pubkey_fingerprint` sample or no
//! sample at all. Failures never reach the metric stream; they are logged
//! and kept in the collector's [`ProbeOutcome`].

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use log::{debug, error};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};

use crate::error::ProbeError;
use crate::metrics::prom;
use crate::probe::{self, ProbeOptions};
use crate::target;

pub const FINGERPRINT_METRIC: &str = "ssl_pubkey_fingerprint";
const FINGERPRINT_HELP: &str = "SSL certificate publickey SHA-256 fingerprint";
const FINGERPRINT_LABELS: [&str; 2] = ["fingerprint", "target"];

/// Failure slot shared between a collector and the request that built it.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome(Arc<OnceLock<ProbeError>>);

impl ProbeOutcome {
    /// The error recorded by the collector, if the probe failed.
    pub fn error(&self) -> Option<&ProbeError> {
        self.0.get()
    }

    fn fail(&self, err: ProbeError) {
        // Only the first failure of a collection is kept.
        let _ = self.0.set(err);
    }
}

pub struct ProbeCollector {
    target: String,
    timeout: Duration,
    gauge: GaugeVec,
    outcome: ProbeOutcome,
}

impl ProbeCollector {
    /// Creates a collector that probes `target` within `timeout` when gathered.
    pub fn new(target: &str, timeout: Duration) -> Result<Self, prometheus::Error> {
        let gauge = GaugeVec::new(
            Opts::new(FINGERPRINT_METRIC, FINGERPRINT_HELP),
            &FINGERPRINT_LABELS,
        )?;
        Ok(ProbeCollector {
            target: target.to_string(),
            timeout,
            gauge,
            outcome: ProbeOutcome::default(),
        })
    }

    /// Handle to the failure slot, readable after the collector was gathered.
    pub fn outcome(&self) -> ProbeOutcome {
        self.outcome.clone()
    }

    fn fingerprint(&self) -> Result<(String, String), ProbeError> {
        let resolved = target::resolve(&self.target).map_err(|e| {
            error!("Failed to parse target target={} error={}", self.target, e);
            e
        })?;

        let options = ProbeOptions::fingerprint_only(self.timeout);
        let fingerprint = probe::probe(&resolved, &options).map_err(|e| {
            error!(
                "Failed to get publickey fingerprint target={} error={}",
                resolved, e
            );
            e
        })?;

        debug!(
            "Probed publickey fingerprint target={} fingerprint={}",
            resolved, fingerprint
        );
        Ok((fingerprint.to_string(), resolved.to_string()))
    }
}

impl Collector for ProbeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let started = Instant::now();
        let result = self.fingerprint();
        prom::observe_probe(started.elapsed(), result.as_ref().err());

        match result {
            Ok((fingerprint, resolved)) => {
                self.gauge
                    .with_label_values(&[fingerprint.as_str(), resolved.as_str()])
                    .set(1.0);
                self.gauge.collect()
            }
            Err(e) => {
                self.outcome.fail(e);
                Vec::new()
            }
        }
    }
}
