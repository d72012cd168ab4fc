//! Outgoing peer resolution for service dependency views.

use super::Attributes;
use crate::semconv;

/// Derive the address a span called out to.
///
/// First match wins:
/// 1. `peer.service`, verbatim
/// 2. `server.address`, with `:server.port` appended when present
/// 3. `net.peer.name`, with `:net.peer.port` appended when present
pub fn resolve_peer_address(attributes: &Attributes) -> Option<String> {
    if let Some(service) = attributes.get(semconv::PEER_SERVICE) {
        return Some(service.to_owned());
    }

    host_with_port(attributes, semconv::SERVER_ADDRESS, semconv::SERVER_PORT)
        .or_else(|| host_with_port(attributes, semconv::NET_PEER_NAME, semconv::NET_PEER_PORT))
}

fn host_with_port(attributes: &Attributes, host_key: &str, port_key: &str) -> Option<String> {
    let host = attributes.get(host_key)?;
    Some(match attributes.get(port_key) {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().copied().collect()
    }

    #[rstest]
    #[case(&[("peer.service", "payments"), ("server.address", "10.0.0.1")], Some("payments"))]
    #[case(&[("server.address", "db.local"), ("server.port", "5432")], Some("db.local:5432"))]
    #[case(&[("server.address", "db.local")], Some("db.local"))]
    #[case(&[("net.peer.name", "legacy"), ("net.peer.port", "80")], Some("legacy:80"))]
    #[case(&[("net.peer.name", "legacy")], Some("legacy"))]
    #[case(&[("server.port", "5432"), ("net.peer.port", "80")], None)]
    #[case(&[], None)]
    fn fallback_chain(#[case] pairs: &[(&str, &str)], #[case] expected: Option<&str>) {
        assert_eq!(resolve_peer_address(&attrs(pairs)).as_deref(), expected);
    }

    #[test]
    fn server_address_wins_over_legacy_names() {
        let resolved = resolve_peer_address(&attrs(&[
            ("net.peer.name", "old"),
            ("net.peer.port", "1"),
            ("server.address", "new"),
        ]));
        assert_eq!(resolved.as_deref(), Some("new"));
    }

    #[test]
    fn ports_do_not_mix_between_conventions() {
        let resolved = resolve_peer_address(&attrs(&[
            ("server.address", "new"),
            ("net.peer.port", "1"),
        ]));
        assert_eq!(resolved.as_deref(), Some("new"));
    }
}
