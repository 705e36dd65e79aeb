//! Local TLS endpoints for probing without network access.

#![allow(dead_code)]

use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::{X509NameBuilder, X509};

use ssl_pubkey_exporter::Fingerprint;

/// Generates a fresh P-256 key pair.
pub fn generate_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// Issues a self-signed certificate for `key`.
pub fn self_signed(key: &PKey<Private>, common_name: &str, serial: u32) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Fingerprint a probe of a server using `key` is expected to report.
pub fn expected_fingerprint(key: &PKey<Private>) -> Fingerprint {
    Fingerprint::from_public_key_der(&key.public_key_to_der().unwrap())
}

/// Serves TLS with `key` and `cert` on an ephemeral loopback port.
///
/// Connections are handled one at a time on a background thread for the
/// lifetime of the test binary.
pub fn spawn_tls_server(key: &PKey<Private>, cert: &X509) -> SocketAddr {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(key).unwrap();
    acceptor.set_certificate(cert).unwrap();
    acceptor.check_private_key().unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
            let _ = acceptor.accept(stream);
        }
    });

    addr
}

/// Convenience wrapper: new key, self-signed certificate, running server.
pub fn spawn_with_new_key() -> (SocketAddr, PKey<Private>) {
    let key = generate_key();
    let cert = self_signed(&key, "localhost", 1);
    (spawn_tls_server(&key, &cert), key)
}

/// A listener that completes TCP connects but never answers a handshake.
///
/// The returned listener must be kept alive for the duration of the test.
pub fn silent_listener() -> (SocketAddr, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    (listener.local_addr().unwrap(), listener)
}

/// A peer that starts a TLS record and then sends one byte every 100ms.
///
/// Each connection is kept trickling for about ten seconds, far longer than
/// any timeout used in the tests.
pub fn trickling_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            thread::spawn(move || {
                // Handshake record header announcing 16KiB of payload.
                let _ = stream.write_all(&[0x16, 0x03, 0x03, 0x40, 0x00]);
                for _ in 0..100 {
                    thread::sleep(Duration::from_millis(100));
                    if stream.write_all(&[0x00]).is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// An address on which nothing is listening.
pub fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
