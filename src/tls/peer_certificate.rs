use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::{debug, instrument};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

use crate::tls::Error;

/// Flat record of the distinguished-name attributes exposed to verify callbacks.
///
/// Keys follow the short names used by most TLS stacks (`C`, `ST`, `L`, `O`, `OU`,
/// `CN`, `emailAddress`). When an attribute is repeated, the first value wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "ST", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(rename = "O", default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(rename = "OU", default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "CN", default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(
        rename = "emailAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub email_address: Option<String>,
}

impl DistinguishedName {
    fn from_x509(name: &X509Name<'_>) -> Self {
        Self {
            country: first_value(name.iter_country()),
            state: first_value(name.iter_state_or_province()),
            locality: first_value(name.iter_locality()),
            organization: first_value(name.iter_organization()),
            organizational_unit: first_value(name.iter_organizational_unit()),
            common_name: first_value(name.iter_common_name()),
            email_address: first_value(name.iter_email()),
        }
    }
}

fn first_value<'a>(
    mut values: impl Iterator<Item = &'a AttributeTypeAndValue<'a>>,
) -> Option<String> {
    values.find_map(|value| value.as_str().ok().map(String::from))
}

/// Peer certificate of a TLS connection, as handed to verify callbacks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PeerCertificate {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    /// SHA-1 digest of the DER encoding, upper-case hex pairs joined by `:`.
    pub fingerprint: String,
    /// SHA-256 digest of the DER encoding, same format as `fingerprint`.
    pub fingerprint256: String,
    pub serial_number: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl PeerCertificate {
    #[instrument(skip(der))]
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
            debug!("Failed to parse peer certificate: {e:?}");
            Error::MalformedCertificate(format!("{e:?}"))
        })?;

        let validity = cert.validity();
        let valid_from = timestamp(validity.not_before.timestamp())?;
        let valid_to = timestamp(validity.not_after.timestamp())?;

        Ok(Self {
            subject: DistinguishedName::from_x509(cert.subject()),
            issuer: DistinguishedName::from_x509(cert.issuer()),
            fingerprint: colon_hex(&Sha1::digest(der)),
            fingerprint256: colon_hex(&Sha256::digest(der)),
            serial_number: hex::encode_upper(cert.raw_serial()),
            valid_from,
            valid_to,
            raw: der.to_vec(),
        })
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::<Utc>::from_timestamp(seconds, 0).ok_or_else(|| {
        Error::MalformedCertificate(format!("validity timestamp out of range: {seconds}"))
    })
}

fn colon_hex(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
