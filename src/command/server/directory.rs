use std::collections::HashMap;

use async_trait::async_trait;
use hyper::http::request::Parts;
use tracing::{debug, instrument};

use crate::auth::{BoxError, VerifyWithRequest};
use crate::command::server::ClientIdentity;
use crate::configuration::IdentityConfig;
use crate::tls::{PeerCertificate, TlsConnectInfo};

/// Maps certificate fingerprints to the identities declared in `[identity.*]`.
#[derive(Clone, Debug, Default)]
pub struct IdentityDirectory {
    // upper-case fingerprint -> identity_id
    identities: HashMap<String, String>,
}

impl IdentityDirectory {
    pub fn new(identities: &HashMap<String, IdentityConfig>) -> Self {
        let identities = identities
            .iter()
            .filter(|(id, identity)| {
                if identity.disabled {
                    debug!("Identity '{id}' is disabled");
                }
                !identity.disabled
            })
            .map(|(id, identity)| (identity.fingerprint.to_uppercase(), id.clone()))
            .collect();

        Self { identities }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[async_trait]
impl VerifyWithRequest for IdentityDirectory {
    type Identity = ClientIdentity;

    #[instrument(skip_all, fields(fingerprint = %certificate.fingerprint))]
    async fn verify_with_request(
        &self,
        parts: &Parts,
        certificate: &PeerCertificate,
    ) -> Result<Option<ClientIdentity>, BoxError> {
        let Some(id) = self.identities.get(&certificate.fingerprint.to_uppercase()) else {
            debug!("No enabled identity matches the certificate");
            return Ok(None);
        };

        let client_ip = parts
            .extensions
            .get::<TlsConnectInfo>()
            .and_then(|connection| connection.remote_address)
            .map(|address| address.ip().to_string());

        Ok(Some(ClientIdentity {
            id: id.clone(),
            subject: certificate.subject.clone(),
            issuer: certificate.issuer.clone(),
            fingerprint: certificate.fingerprint.clone(),
            client_ip,
        }))
    }
}
