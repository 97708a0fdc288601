//! TLS termination facts consumed by the client certificate strategy.
//!
//! The listener decides, per connection, whether the peer certificate is trusted
//! (chain to a configured CA, not revoked) and decodes the end-entity certificate.
//! Both are published to request handlers through [`TlsConnectInfo`].

mod connect_info;
mod error;
mod peer_certificate;
mod verifier;

use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, CertificateRevocationListDer, PrivateKeyDer};
use std::path::Path;
use tracing::{debug, info};

pub use connect_info::TlsConnectInfo;
pub use error::Error;
pub use peer_certificate::{DistinguishedName, PeerCertificate};
pub use verifier::{AuthorizationError, ClientAuthentication, DeferredClientVerifier};

pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKeyDer<'static>, Error> {
    info!("Loading private key from {}", path.as_ref().display());
    Ok(PrivateKeyDer::from_pem_file(path)?)
}

pub fn load_certificate_bundle(
    path: impl AsRef<Path>,
) -> Result<Vec<CertificateDer<'static>>, Error> {
    info!("Loading certificate bundle from {}", path.as_ref().display());
    let certs = CertificateDer::pem_file_iter(path)?.collect::<Result<Vec<_>, _>>()?;
    Ok(certs)
}

pub fn load_crls<P: AsRef<Path>>(
    paths: &[P],
) -> Result<Vec<CertificateRevocationListDer<'static>>, Error> {
    let mut crls = Vec::new();
    for path in paths {
        info!("Loading certificate revocation list from {}", path.as_ref().display());
        for crl in CertificateRevocationListDer::pem_file_iter(path)? {
            crls.push(crl?);
        }
    }

    Ok(crls)
}

pub fn build_root_store(certs: Vec<CertificateDer<'static>>) -> Result<RootCertStore, Error> {
    let mut root_store = RootCertStore::empty();
    for cert in certs {
        root_store.add(cert)?;
    }

    debug!("Root store holds {} trust anchor(s)", root_store.len());
    Ok(root_store)
}
