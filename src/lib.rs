//! Prometheus exporter for TLS public key fingerprints.
//!
//! Each scrape of `/probe?target=<target>` connects to the target, takes the
//! leaf certificate presented during the TLS handshake and reports the
//! base64 encoded SHA-256 digest of its public key as
//!
//! ```text
//! ssl_pubkey_fingerprint{fingerprint="<base64>",target="<host:port>"} 1
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ssl_pubkey_exporter::{probe, resolve, ProbeOptions};
//!
//! let target = resolve("https://example.com")?;
//! let fingerprint = probe(&target, &ProbeOptions::fingerprint_only(Duration::from_secs(5)))?;
//! println!("{} {}", target, fingerprint);
//! # Ok::<(), ssl_pubkey_exporter::ProbeError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod server;
pub mod services;
pub mod target;

pub use error::ProbeError;
pub use metrics::{ProbeCollector, ProbeOutcome};
pub use probe::{probe, Fingerprint, ProbeOptions};
pub use target::{resolve, ResolvedTarget};

pub const APP_NAME: &str = "ssl-pubkey-exporter";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
