use serde::Serialize;

use crate::tls::DistinguishedName;

/// Identity resolved from a client certificate, attached to authenticated requests.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientIdentity {
    pub id: String,
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub fingerprint: String,
    pub client_ip: Option<String>,
}
