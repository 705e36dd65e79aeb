//! Error types for target resolution and certificate probing.
//!
//! Resolution failures (`InvalidFormat`, `UnknownScheme`,
//! `PortOrSchemeRequired`) are caused by the target string supplied by the
//! client. Probe failures (`ConnectFailed`, `NoCertificates`,
//! `KeyEncodingFailed`) are caused by the probed endpoint or the network.

use std::error::Error;
use std::fmt;

/// Boxed underlying cause of a failed connection attempt.
pub type BoxedCause = Box<dyn Error + Send + Sync + 'static>;

/// Error returned when a probe cannot produce a fingerprint.
#[derive(Debug)]
pub enum ProbeError {
    /// The target could not be parsed as `[scheme://]host[:port]`
    InvalidFormat {
        /// The target as supplied by the client
        target: String,
        /// Why it could not be parsed
        reason: String,
    },

    /// The scheme has no well-known TCP port
    UnknownScheme {
        /// The scheme name, lowercased
        scheme: String,
    },

    /// Neither an explicit port nor a scheme was supplied
    PortOrSchemeRequired {
        /// The target as supplied by the client
        target: String,
    },

    /// TCP connect or TLS handshake failed, including timeouts
    ConnectFailed {
        /// The `host:port` that was dialed
        address: String,
        /// The underlying I/O or TLS error
        source: BoxedCause,
    },

    /// The peer completed the handshake without presenting a certificate
    NoCertificates {
        /// The `host:port` that was dialed
        address: String,
    },

    /// The leaf certificate's public key could not be DER encoded
    KeyEncodingFailed {
        /// The underlying OpenSSL error
        source: openssl::error::ErrorStack,
    },
}

impl ProbeError {
    /// Stable snake_case name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat { .. } => "invalid_format",
            Self::UnknownScheme { .. } => "unknown_scheme",
            Self::PortOrSchemeRequired { .. } => "port_or_scheme_required",
            Self::ConnectFailed { .. } => "connect_failed",
            Self::NoCertificates { .. } => "no_certificates",
            Self::KeyEncodingFailed { .. } => "key_encoding_failed",
        }
    }

    /// Returns true if the error was caused by the target string itself.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. } | Self::UnknownScheme { .. } | Self::PortOrSchemeRequired { .. }
        )
    }

    pub(crate) fn connect_failed<E>(address: &str, source: E) -> Self
    where
        E: Into<BoxedCause>,
    {
        Self::ConnectFailed {
            address: address.to_string(),
            source: source.into(),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat { target, reason } => {
                write!(f, "failed to parse target '{}': {}", target, reason)
            }
            Self::UnknownScheme { scheme } => {
                write!(f, "failed to lookup port for scheme {}", scheme)
            }
            Self::PortOrSchemeRequired { target } => {
                write!(
                    f,
                    "protocol scheme or port number is required for target '{}'",
                    target
                )
            }
            Self::ConnectFailed { address, source } => {
                write!(
                    f,
                    "failed to establish TLS connection to {}: {}",
                    address, source
                )
            }
            Self::NoCertificates { address } => {
                write!(f, "no peer certificates found at {}", address)
            }
            Self::KeyEncodingFailed { source } => {
                write!(f, "failed to marshal public key: {}", source)
            }
        }
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConnectFailed { source, .. } => Some(source.as_ref()),
            Self::KeyEncodingFailed { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = ProbeError::UnknownScheme {
            scheme: "foobar".to_string(),
        };
        assert_eq!(err.to_string(), "failed to lookup port for scheme foobar");
    }

    #[test]
    fn test_connect_failed_keeps_source() {
        let err = ProbeError::connect_failed(
            "example.com:443",
            io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
        );
        assert_eq!(err.kind(), "connect_failed");
        assert!(!err.is_resolution_error());
        assert!(err.to_string().contains("example.com:443"));

        let source = err.source().expect("source should be kept");
        assert_eq!(source.to_string(), "connection timed out");
    }

    #[test]
    fn test_resolution_errors_are_classified() {
        let err = ProbeError::PortOrSchemeRequired {
            target: "example.com".to_string(),
        };
        assert!(err.is_resolution_error());
        assert_eq!(err.kind(), "port_or_scheme_required");
        assert!(err.source().is_none());
    }
}
