use std::net::SocketAddr;
use std::sync::Arc;

use rustls_pki_types::CertificateDer;
use tracing::debug;

use crate::tls::{ClientAuthentication, PeerCertificate};

/// Per-connection TLS facts, inserted in the request extensions by the listener.
#[derive(Clone, Debug, Default)]
pub struct TlsConnectInfo {
    pub remote_address: Option<SocketAddr>,
    /// True only when the peer certificate chains to a trusted CA and is not revoked.
    pub authorized: bool,
    pub authorization_error: Option<String>,
    pub peer_certificate: Option<Arc<PeerCertificate>>,
}

impl TlsConnectInfo {
    pub fn new(
        client_auth: &ClientAuthentication,
        peer_certificates: Option<&[CertificateDer<'_>]>,
        remote_address: Option<SocketAddr>,
    ) -> Self {
        let authorization = client_auth.authorize(peer_certificates);

        let peer_certificate = peer_certificates
            .and_then(|certs| certs.first())
            .and_then(|der| {
                PeerCertificate::from_der(der)
                    .inspect_err(|e| debug!("Ignoring undecodable peer certificate: {e}"))
                    .ok()
            })
            .map(Arc::new);

        Self {
            remote_address,
            authorized: authorization.is_ok(),
            authorization_error: authorization.err().map(|e| e.to_string()),
            peer_certificate,
        }
    }
}
