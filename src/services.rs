//! Well-known TCP port lookup by service name.
//!
//! The system service table (`/etc/services`) is consulted first, then a
//! small built-in table for hosts that ship without one.

use std::fs;

const SERVICES_PATH: &str = "/etc/services";

static BUILTIN_TCP_SERVICES: &[(&str, u16)] = &[
    ("ftp", 21),
    ("ftps", 990),
    ("gopher", 70),
    ("http", 80),
    ("https", 443),
    ("imap2", 143),
    ("imap3", 220),
    ("imaps", 993),
    ("ldap", 389),
    ("ldaps", 636),
    ("pop3", 110),
    ("pop3s", 995),
    ("smtp", 25),
    ("submissions", 465),
    ("ssh", 22),
    ("telnet", 23),
];

/// Looks up the well-known TCP port of a service such as `https` or `ldaps`.
///
/// Names are matched case-insensitively.
pub fn lookup_tcp_port(service: &str) -> Option<u16> {
    let service = service.to_ascii_lowercase();
    if service.is_empty() {
        return None;
    }

    fs::read_to_string(SERVICES_PATH)
        .ok()
        .and_then(|table| find_tcp_port(&table, &service))
        .or_else(|| builtin_tcp_port(&service))
}

fn builtin_tcp_port(service: &str) -> Option<u16> {
    BUILTIN_TCP_SERVICES
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, port)| *port)
}

/// Finds `service` among the names and aliases of a services(5) table.
fn find_tcp_port(table: &str, service: &str) -> Option<u16> {
    for line in table.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();

        let (name, port_proto) = match (fields.next(), fields.next()) {
            (Some(name), Some(port_proto)) => (name, port_proto),
            _ => continue,
        };

        let (port, proto) = match port_proto.split_once('/') {
            Some(pair) => pair,
            None => continue,
        };
        if !proto.eq_ignore_ascii_case("tcp") {
            continue;
        }

        let matches = name.eq_ignore_ascii_case(service)
            || fields.any(|alias| alias.eq_ignore_ascii_case(service));
        if matches {
            if let Ok(port) = port.parse::<u16>() {
                return Some(port);
            }
        }
    }
    None
}
