//! HTTP server exposing the probe endpoint.
//!
//! Routes:
//!
//! - `GET /probe?target=<target>` - probe one target and return its fingerprint
//! - `GET /metrics` - metrics about the exporter process itself
//! - `GET /` - landing page

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use log::{info, warn};
use prometheus::proto::MetricFamily;
use prometheus::Registry;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::metrics::{prom, ProbeCollector};

/// Header carrying the scrape timeout Prometheus applies to the request.
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Extra time granted to the probe task beyond its own timeout.
const TIMEOUT_SLACK: Duration = Duration::from_secs(1);

const INDEX_HTML: &str = r#"<html>
<head><title>SSL pubkey fingerprint exporter</title></head>
<body>
<h1>SSL pubkey fingerprint exporter</h1>
<p><a href="/probe?target=example.com:443">Probe example.com:443 for SSL pubkey fingerprint metrics</a></p>
<p><a href='/metrics'>Metrics</a></p>
</body>
</html>
"#;

/// Errors answered to the HTTP client.
#[derive(Debug)]
pub enum RequestError {
    /// The `target` query parameter is missing or empty
    MissingTarget,
    /// The scrape timeout header is present but not a number
    InvalidTimeout(String),
    /// Resolving or probing the target failed
    ProbeFailed(String),
    /// The probe task did not finish in time
    ProbeTimedOut(Duration),
    /// Registry, encoding or task failure
    Internal(String),
}

impl RequestError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingTarget | Self::InvalidTimeout(_) => StatusCode::BAD_REQUEST,
            Self::ProbeFailed(_) | Self::ProbeTimedOut(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTarget => write!(f, "target parameter is required"),
            Self::InvalidTimeout(msg) => write!(f, "{}", msg),
            Self::ProbeFailed(msg) => write!(f, "probe failed: {}", msg),
            Self::ProbeTimedOut(timeout) => {
                write!(f, "probe did not finish within {:?}", timeout)
            }
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<prometheus::Error> for RequestError {
    fn from(e: prometheus::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status(), format!("{}\n", self)).into_response()
    }
}

/// Builds the application router.
pub fn router(settings: Arc<Settings>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(self_metrics))
        .route("/probe", get(probe_handler))
        .with_state(settings)
}

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn serve(settings: Settings) -> io::Result<()> {
    let listener = bind_listener(&settings.listen_address).await?;
    info!(
        "Starting server address={} default_timeout={:?}",
        listener.local_addr()?,
        settings.default_timeout
    );

    axum::serve(listener, router(Arc::new(settings)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Binds `address`, retrying the IPv6 wildcard as `0.0.0.0` if it fails.
pub async fn bind_listener(address: &str) -> io::Result<TcpListener> {
    match TcpListener::bind(address).await {
        Ok(listener) => Ok(listener),
        Err(e) => match address.strip_prefix("[::]:") {
            Some(port) => {
                warn!("Failed to bind IPv6 wildcard address={} error={}, using IPv4", address, e);
                TcpListener::bind(format!("0.0.0.0:{}", port)).await
            }
            None => Err(e),
        },
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn self_metrics() -> Result<Response, RequestError> {
    let (body, content_type) = prom::render_self_metrics()?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// Probes the requested target in a request scoped registry.
pub async fn probe_handler(
    State(settings): State<Arc<Settings>>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, RequestError> {
    let target = match first_target(params).filter(|target| !target.is_empty()) {
        Some(target) => target,
        None => {
            warn!("Rejected probe request error=missing target");
            return Err(RequestError::MissingTarget);
        }
    };

    let timeout = scrape_timeout(&headers, settings.default_timeout).map_err(|e| {
        warn!("Failed to get scrape timeout target={} error={}", target, e);
        e
    })?;

    let collector = ProbeCollector::new(&target, timeout)?;
    let outcome = collector.outcome();

    let families = run_bounded(timeout, TIMEOUT_SLACK, move || gather_once(collector))
        .await
        .map_err(|e| {
            if let RequestError::ProbeTimedOut(_) = e {
                warn!("Probe task overran its timeout target={} timeout={:?}", target, timeout);
            }
            e
        })??;

    if let Some(e) = outcome.error() {
        return Err(RequestError::ProbeFailed(e.to_string()));
    }

    let (body, content_type) = prom::encode_text(&families)?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// Takes the first `target` query value. Later duplicates are ignored.
fn first_target(params: Vec<(String, String)>) -> Option<String> {
    params
        .into_iter()
        .find(|(key, _)| key == "target")
        .map(|(_, value)| value)
}

/// Runs blocking `work` and waits for it at most `timeout + slack`.
async fn run_bounded<T, F>(timeout: Duration, slack: Duration, work: F) -> Result<T, RequestError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(timeout.saturating_add(slack), task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(RequestError::Internal(e.to_string())),
        Err(_) => Err(RequestError::ProbeTimedOut(timeout)),
    }
}

/// Registers the collector in a fresh registry and gathers it once.
fn gather_once(collector: ProbeCollector) -> Result<Vec<MetricFamily>, prometheus::Error> {
    let registry = Registry::new();
    registry.register(Box::new(collector))?;
    Ok(registry.gather())
}

/// Picks the probe timeout for a request.
///
/// A missing or empty header, or a value that is not strictly positive
/// once converted to a `Duration`, selects `default`. A value that is not a number is an error.
pub fn scrape_timeout(headers: &HeaderMap, default: Duration) -> Result<Duration, RequestError> {
    let value = match headers.get(SCRAPE_TIMEOUT_HEADER) {
        Some(value) => value,
        None => return Ok(default),
    };

    let value = value
        .to_str()
        .map_err(|e| {
            RequestError::InvalidTimeout(format!("invalid {} header: {}", SCRAPE_TIMEOUT_HEADER, e))
        })?
        .trim();
    if value.is_empty() {
        return Ok(default);
    }

    let seconds = value.parse::<f64>().map_err(|e| {
        RequestError::InvalidTimeout(format!(
            "failed to parse timeout from Prometheus header: {}",
            e
        ))
    })?;

    if seconds.is_nan() || seconds <= 0.0 {
        return Ok(default);
    }
    // Values below one nanosecond would truncate to zero.
    Ok(Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|timeout| !timeout.is_zero())
        .unwrap_or(default))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C error={}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM error={}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
