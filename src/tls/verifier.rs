use std::fmt;
use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, CertificateRevocationListDer, UnixTime};
use tracing::debug;

use crate::tls::Error;

/// Reason a connection was not authorized by the TLS layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationError {
    NoPeerCertificate,
    Rejected(String),
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthorizationError::NoPeerCertificate => write!(f, "peer did not present a certificate"),
            AuthorizationError::Rejected(err) => write!(f, "{err}"),
        }
    }
}

/// Client certificate verifier that lets the handshake complete and defers the
/// trust decision to [`DeferredClientVerifier::authorize`].
///
/// Handshake signatures are still checked, so a peer holding a certificate has proven
/// possession of the matching private key. Chain and revocation checks against the
/// configured roots happen once the handshake is done, so that untrusted peers reach
/// the application flagged as unauthorized instead of being dropped.
#[derive(Debug)]
pub struct DeferredClientVerifier {
    inner: Arc<dyn ClientCertVerifier>,
}

impl DeferredClientVerifier {
    pub fn new(
        roots: RootCertStore,
        crls: Vec<CertificateRevocationListDer<'static>>,
    ) -> Result<Self, Error> {
        let inner = WebPkiClientVerifier::builder(Arc::new(roots))
            .with_crls(crls)
            .allow_unauthenticated()
            .build()?;

        Ok(Self { inner })
    }

    pub fn authorize(
        &self,
        peer_certificates: Option<&[CertificateDer<'_>]>,
    ) -> Result<(), AuthorizationError> {
        let Some((end_entity, intermediates)) =
            peer_certificates.and_then(|certs| certs.split_first())
        else {
            return Err(AuthorizationError::NoPeerCertificate);
        };

        self.inner
            .verify_client_cert(end_entity, intermediates, UnixTime::now())
            .map(|_| ())
            .map_err(|err| {
                debug!("Peer certificate rejected: {err}");
                AuthorizationError::Rejected(err.to_string())
            })
    }
}

impl ClientCertVerifier for DeferredClientVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// How the terminator establishes the per-connection authorization flag.
#[derive(Clone, Debug)]
pub enum ClientAuthentication {
    /// No client CA configured: client certificates are never requested.
    Disabled,
    /// Untrusted certificates are refused during the handshake.
    Strict,
    /// Untrusted certificates complete the handshake and are flagged afterwards.
    Deferred(Arc<DeferredClientVerifier>),
}

impl ClientAuthentication {
    pub fn authorize(
        &self,
        peer_certificates: Option<&[CertificateDer<'_>]>,
    ) -> Result<(), AuthorizationError> {
        let presented = peer_certificates.is_some_and(|certs| !certs.is_empty());

        match self {
            ClientAuthentication::Deferred(verifier) => verifier.authorize(peer_certificates),
            ClientAuthentication::Strict if presented => Ok(()),
            ClientAuthentication::Strict | ClientAuthentication::Disabled => {
                Err(AuthorizationError::NoPeerCertificate)
            }
        }
    }
}
