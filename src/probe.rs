//! TLS probe and public key fingerprinting.
//!
//! A probe dials the target, completes a TLS handshake, takes the leaf
//! certificate presented by the peer and reduces its public key to a
//! [`Fingerprint`]. The whole exchange is bounded by a single timeout.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use openssl::ssl::{HandshakeError, SslConnector, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509Ref;
use sha2::{Digest, Sha256};

use crate::error::ProbeError;
use crate::target::ResolvedTarget;

/// Options applied to a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Upper bound for connecting and completing the handshake
    pub timeout: Duration,
    /// Verify the peer's certificate chain and hostname during the handshake
    pub verify_certificates: bool,
}

impl ProbeOptions {
    /// Options for fetching the key of any peer, trusted or not.
    ///
    /// Certificate verification is turned off: the probe only reads the
    /// public key and never relies on the peer's identity.
    pub fn fingerprint_only(timeout: Duration) -> Self {
        ProbeOptions {
            timeout,
            verify_certificates: false,
        }
    }
}

/// Base64 encoded SHA-256 digest of a DER encoded SubjectPublicKeyInfo.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints DER encoded public key bytes.
    pub fn from_public_key_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        Fingerprint(STANDARD.encode(digest))
    }

    /// Fingerprints the public key of a certificate.
    ///
    /// Only the key takes part: two certificates issued for the same key pair
    /// have the same fingerprint.
    pub fn from_certificate(cert: &X509Ref) -> Result<Self, ProbeError> {
        let der = cert
            .public_key()
            .and_then(|key| key.public_key_to_der())
            .map_err(|source| ProbeError::KeyEncodingFailed { source })?;
        Ok(Self::from_public_key_der(&der))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probes `target` and returns the fingerprint of its leaf certificate's key.
///
/// # Errors
///
/// * `ProbeError::ConnectFailed` - DNS, TCP connect or TLS handshake failed
///   or did not finish within `options.timeout`
/// * `ProbeError::NoCertificates` - the peer presented no certificate
/// * `ProbeError::KeyEncodingFailed` - the public key could not be encoded
pub fn probe(target: &ResolvedTarget, options: &ProbeOptions) -> Result<Fingerprint, ProbeError> {
    let address = target.to_string();
    let deadline = Instant::now().checked_add(options.timeout).ok_or_else(|| {
        ProbeError::connect_failed(
            &address,
            io::Error::new(io::ErrorKind::InvalidInput, "timeout out of range"),
        )
    })?;

    let mut stream = connect(target, &address, options, deadline)?;
    let result = match stream.ssl().peer_certificate() {
        Some(cert) => Fingerprint::from_certificate(&cert),
        None => Err(ProbeError::NoCertificates {
            address: address.clone(),
        }),
    };

    if let Err(e) = stream.shutdown() {
        debug!("TLS shutdown failed target={} error={}", address, e);
    }
    result
}

fn connect(
    target: &ResolvedTarget,
    address: &str,
    options: &ProbeOptions,
    deadline: Instant,
) -> Result<SslStream<DeadlineStream>, ProbeError> {
    let tcp_stream = connect_tcp(target, deadline)
        .map_err(|e| ProbeError::connect_failed(address, e))?;
    let stream = DeadlineStream {
        inner: tcp_stream,
        deadline,
    };

    let connector = tls_connector(options.verify_certificates)
        .map_err(|e| ProbeError::connect_failed(address, e))?;
    let config = connector
        .configure()
        .map_err(|e| ProbeError::connect_failed(address, e))?
        .verify_hostname(options.verify_certificates);

    config
        .connect(&target.host, stream)
        .map_err(|e| ProbeError::connect_failed(address, handshake_cause(e)))
}

fn tls_connector(verify_certificates: bool) -> Result<SslConnector, openssl::error::ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    if !verify_certificates {
        builder.set_verify(SslVerifyMode::NONE);
    }
    Ok(builder.build())
}

/// Connects to the first reachable address of `target` before `deadline`.
fn connect_tcp(target: &ResolvedTarget, deadline: Instant) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port).to_socket_addrs()?.collect();

    let mut last_error = None;
    for addr in addrs {
        let timeout = remaining(deadline)?;
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect failed addr={} error={}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no addresses found for host")
    }))
}

/// TCP stream whose reads and writes all end by a shared deadline.
///
/// The socket timeout is reset to the time left before every call, so a
/// peer trickling bytes cannot stretch the exchange past the deadline.
#[derive(Debug)]
struct DeadlineStream {
    inner: TcpStream,
    deadline: Instant,
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.set_read_timeout(Some(remaining(self.deadline)?))?;
        self.inner.read(buf)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.set_write_timeout(Some(remaining(self.deadline)?))?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn remaining(deadline: Instant) -> io::Result<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(io::Error::new(io::ErrorKind::TimedOut, "probe timed out"));
    }
    Ok(remaining)
}

fn handshake_cause(e: HandshakeError<DeadlineStream>) -> openssl::ssl::Error {
    match e {
        HandshakeError::SetupFailure(stack) => stack.into(),
        HandshakeError::Failure(mid) | HandshakeError::WouldBlock(mid) => mid.into_error(),
    }
}
