//! Throw-away PKI used by the test suite: one CA, a `localhost` server certificate,
//! client certificates and CRLs.

use std::fs;
use std::path::PathBuf;

use rcgen::{
    date_time_ymd, BasicConstraints, Certificate, CertificateParams,
    CertificateRevocationListParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyIdMethod,
    KeyPair, KeyUsagePurpose, RevocationReason, RevokedCertParams, SerialNumber,
};
use rustls_pki_types::{
    CertificateDer, CertificateRevocationListDer, PrivateKeyDer, PrivatePkcs8KeyDer,
};
use tempfile::TempDir;

const EMAIL_ADDRESS_OID: [u64; 7] = [1, 2, 840, 113_549, 1, 9, 1];

pub struct IssuedCertificate {
    pub cert_der: CertificateDer<'static>,
    pub cert_pem: String,
    pub key_pem: String,
    key_der: Vec<u8>,
}

impl IssuedCertificate {
    fn new(cert: &Certificate, key: &KeyPair) -> Self {
        Self {
            cert_der: cert.der().clone(),
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }

    pub fn key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

pub struct TestPki {
    ca_cert: Certificate,
    ca_key: KeyPair,
}

impl TestPki {
    pub const REVOKED_SERIAL: u64 = 3;

    pub fn new() -> Self {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut params = CertificateParams::default();
        push_example_subject(&mut params, "ca");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let ca_key = KeyPair::generate().unwrap();
        let ca_cert = params.self_signed(&ca_key).unwrap();

        Self { ca_cert, ca_key }
    }

    pub fn ca_der(&self) -> CertificateDer<'static> {
        self.ca_cert.der().clone()
    }

    pub fn ca_pem(&self) -> String {
        self.ca_cert.pem()
    }

    pub fn issue_server(&self) -> IssuedCertificate {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "localhost");
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.use_authority_key_identifier_extension = true;
        params.serial_number = Some(SerialNumber::from(1u64));

        let key = KeyPair::generate().unwrap();
        let cert = params
            .signed_by(&key, &self.ca_cert, &self.ca_key)
            .unwrap();

        IssuedCertificate::new(&cert, &key)
    }

    pub fn issue_client(&self, common_name: &str, serial: u64) -> IssuedCertificate {
        let mut params = CertificateParams::default();
        push_example_subject(&mut params, common_name);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        params.use_authority_key_identifier_extension = true;
        params.serial_number = Some(SerialNumber::from(serial));

        let key = KeyPair::generate().unwrap();
        let cert = params
            .signed_by(&key, &self.ca_cert, &self.ca_key)
            .unwrap();

        IssuedCertificate::new(&cert, &key)
    }

    fn crl(&self, revoked: &[u64]) -> rcgen::CertificateRevocationList {
        let params = CertificateRevocationListParams {
            this_update: date_time_ymd(2024, 1, 1),
            next_update: date_time_ymd(2099, 1, 1),
            crl_number: SerialNumber::from(1u64),
            issuing_distribution_point: None,
            revoked_certs: revoked
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from(*serial),
                    revocation_time: date_time_ymd(2024, 1, 1),
                    reason_code: Some(RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::Sha256,
        };

        params.signed_by(&self.ca_cert, &self.ca_key).unwrap()
    }

    pub fn crl_der(&self, revoked: &[u64]) -> CertificateRevocationListDer<'static> {
        self.crl(revoked).der().clone()
    }

    pub fn crl_pem(&self, revoked: &[u64]) -> String {
        self.crl(revoked).pem().unwrap()
    }

    /// Writes the server identity, the CA and a CRL revoking [`Self::REVOKED_SERIAL`].
    pub fn write_files(&self) -> TestPkiFiles {
        let dir = TempDir::new().unwrap();
        let server = self.issue_server();

        fs::write(dir.path().join("server.pem"), &server.cert_pem).unwrap();
        fs::write(dir.path().join("server.key"), &server.key_pem).unwrap();
        fs::write(dir.path().join("ca.pem"), self.ca_pem()).unwrap();
        fs::write(
            dir.path().join("ca.crl"),
            self.crl_pem(&[Self::REVOKED_SERIAL]),
        )
        .unwrap();

        TestPkiFiles { dir }
    }
}

fn push_example_subject(params: &mut CertificateParams, common_name: &str) {
    let name = &mut params.distinguished_name;
    name.push(DnType::CountryName, "US");
    name.push(DnType::StateOrProvinceName, "CA");
    name.push(DnType::LocalityName, "San Francisco");
    name.push(DnType::OrganizationName, "Example Co");
    name.push(DnType::OrganizationalUnitName, "techops");
    name.push(DnType::CommonName, common_name);
    name.push(
        DnType::CustomDnType(EMAIL_ADDRESS_OID.to_vec()),
        "certs@example.com",
    );
}

pub struct TestPkiFiles {
    dir: TempDir,
}

impl TestPkiFiles {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn server_cert(&self) -> PathBuf {
        self.path("server.pem")
    }

    pub fn server_key(&self) -> PathBuf {
        self.path("server.key")
    }

    pub fn ca(&self) -> PathBuf {
        self.path("ca.pem")
    }

    pub fn crl(&self) -> PathBuf {
        self.path("ca.crl")
    }
}
