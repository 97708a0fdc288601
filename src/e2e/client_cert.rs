use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::http::request::Parts;
use hyper::StatusCode;
use serde_json::Value;

use super::util::{build_config, ServerFixture};
use crate::auth::{verify_fn, verify_with_request_fn, BoxError, VerifyCallback};
use crate::command::server::ClientIdentity;
use crate::test_pki::TestPki;
use crate::tls::{PeerCertificate, TlsConnectInfo};

fn identity_section(id: &str, fingerprint: &str) -> String {
    format!("\n[identity.{id}]\nfingerprint = \"{fingerprint}\"\n")
}

fn fingerprint_of(client: &crate::test_pki::IssuedCertificate) -> String {
    PeerCertificate::from_der(&client.cert_der)
        .unwrap()
        .fingerprint
}

fn counting_callback(calls: Arc<AtomicUsize>) -> VerifyCallback<ClientIdentity> {
    VerifyCallback::with_request(verify_with_request_fn(
        move |parts: Parts, certificate: PeerCertificate| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let client_ip = parts
                    .extensions
                    .get::<TlsConnectInfo>()
                    .and_then(|info| info.remote_address)
                    .map(|address| address.ip().to_string());

                Ok::<_, BoxError>(Some(ClientIdentity {
                    id: certificate.subject.common_name.clone().unwrap_or_default(),
                    subject: certificate.subject,
                    issuer: certificate.issuer,
                    fingerprint: certificate.fingerprint,
                    client_ip,
                }))
            }
        },
    ))
}

#[tokio::test]
async fn test_trusted_certificate_is_authenticated() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let client = pki.issue_client("client1", 2);
    let config = build_config(&files, &identity_section("client1", &fingerprint_of(&client)));

    let server = ServerFixture::start(pki, files, &config).await;
    let (status, body) = server.get(Some(&client), "/whoami").await.unwrap();

    assert_eq!(status, StatusCode::OK);
    let identity: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(identity["id"], "client1");
    assert_eq!(identity["subject"]["CN"], "client1");
    assert_eq!(identity["subject"]["O"], "Example Co");
    assert_eq!(identity["issuer"]["CN"], "ca");
    assert_eq!(identity["client_ip"], "127.0.0.1");
}

#[tokio::test]
async fn test_unknown_certificate_is_rejected() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let client = pki.issue_client("client1", 2);
    let config = build_config(&files, &identity_section("someone", "AA:BB:CC"));

    let server = ServerFixture::start(pki, files, &config).await;
    let (status, body) = server.get(Some(&client), "/whoami").await.unwrap();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("UNAUTHORIZED"));
}

#[tokio::test]
async fn test_revoked_certificate_never_reaches_callback() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let client = pki.issue_client("client1", TestPki::REVOKED_SERIAL);
    let config = build_config(&files, "");
    let calls = Arc::new(AtomicUsize::new(0));

    let server =
        ServerFixture::start_with_callback(pki, files, &config, counting_callback(calls.clone()))
            .await;
    let (status, _) = server.get(Some(&client), "/whoami").await.unwrap();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_untrusted_certificate_reaches_callback_when_allowed() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let client = TestPki::new().issue_client("stranger", 2);
    let config = build_config(&files, "\n[auth]\nallow_unauthorized = true\n");
    let calls = Arc::new(AtomicUsize::new(0));

    let server =
        ServerFixture::start_with_callback(pki, files, &config, counting_callback(calls.clone()))
            .await;
    let (status, body) = server.get(Some(&client), "/whoami").await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let identity: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(identity["id"], "stranger");
}

#[tokio::test]
async fn test_missing_certificate_is_rejected() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let config = build_config(&files, "");
    let calls = Arc::new(AtomicUsize::new(0));

    let server =
        ServerFixture::start_with_callback(pki, files, &config, counting_callback(calls.clone()))
            .await;
    let (status, _) = server.get(None, "/whoami").await.unwrap();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_certificate_reports_bad_request_message() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let config = build_config(
        &files,
        "\n[auth]\nallow_unauthorized = true\nbad_request_message = \"Present a certificate\"\n",
    );

    let server = ServerFixture::start(pki, files, &config).await;
    let (status, body) = server.get(None, "/whoami").await.unwrap();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Present a certificate"));
}

#[tokio::test]
async fn test_probes_do_not_require_a_certificate() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let config = build_config(&files, "");

    let server = ServerFixture::start(pki, files, &config).await;
    let (status, body) = server.get(None, "/healthz").await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn test_panicking_callback_yields_server_error() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let panicky = pki.issue_client("panicky", 4);
    let client = pki.issue_client("client1", 2);
    let config = build_config(&files, "");

    let verify = VerifyCallback::certificate(verify_fn(|certificate: PeerCertificate| async move {
        assert_ne!(
            certificate.subject.common_name.as_deref(),
            Some("panicky"),
            "refusing to look up panicky"
        );

        Ok::<_, BoxError>(Some(ClientIdentity {
            id: "client1".to_string(),
            subject: certificate.subject,
            issuer: certificate.issuer,
            fingerprint: certificate.fingerprint,
            client_ip: None,
        }))
    }));

    let server = ServerFixture::start_with_callback(pki, files, &config, verify).await;

    let (status, body) = server.get(Some(&panicky), "/whoami").await.unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("refusing to look up panicky"));

    let (status, _) = server.get(Some(&client), "/whoami").await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_strict_mode_refuses_revoked_certificate_during_handshake() {
    let pki = TestPki::new();
    let files = pki.write_files();
    let revoked = pki.issue_client("client1", TestPki::REVOKED_SERIAL);
    let client = pki.issue_client("client2", 2);
    let config = build_config(
        &files,
        &format!(
            "reject_unauthorized = true\n{}",
            identity_section("client2", &fingerprint_of(&client))
        ),
    );

    let server = ServerFixture::start(pki, files, &config).await;

    assert!(server.get(Some(&revoked), "/whoami").await.is_err());
    assert!(server.get(None, "/whoami").await.is_err());

    let (status, _) = server.get(Some(&client), "/whoami").await.unwrap();
    assert_eq!(status, StatusCode::OK);
}
