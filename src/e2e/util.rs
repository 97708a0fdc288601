use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

use crate::auth::{
    AuthenticateOptions, Authenticator, BoxError, ClientCertStrategy, StrategyOptions,
    VerifyCallback,
};
use crate::command::server::listeners::tls::TlsListener;
use crate::command::server::{ClientIdentity, ServerContext};
use crate::configuration::Configuration;
use crate::test_pki::{IssuedCertificate, TestPki, TestPkiFiles};

pub struct ServerFixture {
    pub pki: TestPki,
    pub address: SocketAddr,
    _files: TestPkiFiles,
    handle: JoinHandle<()>,
}

impl Drop for ServerFixture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn build_config(files: &TestPkiFiles, extra: &str) -> Configuration {
    let toml = format!(
        r#"
        [server]
        bind_address = "127.0.0.1"
        port = 0

        [server.tls]
        server_certificate_bundle = "{}"
        server_private_key = "{}"
        client_ca_bundle = "{}"
        client_crl = ["{}"]
        {extra}
        "#,
        files.server_cert().display(),
        files.server_key().display(),
        files.ca().display(),
        files.crl().display(),
    );

    Configuration::load_from_str(&toml).unwrap()
}

impl ServerFixture {
    /// Serves the configuration with the identity directory it declares.
    pub async fn start(pki: TestPki, files: TestPkiFiles, config: &Configuration) -> Self {
        let context = ServerContext::new(config).unwrap();
        Self::start_with_context(pki, files, config, context).await
    }

    /// Serves the configuration with a custom verify callback.
    pub async fn start_with_callback(
        pki: TestPki,
        files: TestPkiFiles,
        config: &Configuration,
        verify: VerifyCallback<ClientIdentity>,
    ) -> Self {
        let strategy = ClientCertStrategy::with_options(
            StrategyOptions {
                pass_req_to_callback: matches!(verify, VerifyCallback::WithRequest(_)),
            },
            Some(verify),
        )
        .unwrap();
        let mut authenticator = Authenticator::new();
        authenticator.use_strategy(strategy);

        let context = ServerContext::with_authenticator(
            authenticator,
            AuthenticateOptions::from(&config.auth),
        );
        Self::start_with_context(pki, files, config, context).await
    }

    async fn start_with_context(
        pki: TestPki,
        files: TestPkiFiles,
        config: &Configuration,
        context: ServerContext,
    ) -> Self {
        let listener = Arc::new(TlsListener::new(&config.server, context).unwrap());
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = tcp.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let _ = listener.serve_listener(tcp).await;
        });

        Self {
            pki,
            address,
            _files: files,
            handle,
        }
    }

    pub fn connector(&self, client: Option<&IssuedCertificate>) -> TlsConnector {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.pki.ca_der()).unwrap();

        let builder = rustls::ClientConfig::builder().with_root_certificates(roots);
        let config = match client {
            Some(client) => builder
                .with_client_auth_cert(vec![client.cert_der.clone()], client.key_der())
                .unwrap(),
            None => builder.with_no_client_auth(),
        };

        TlsConnector::from(Arc::new(config))
    }

    /// Sends `GET {path}` over a fresh TLS connection.
    pub async fn get(
        &self,
        client: Option<&IssuedCertificate>,
        path: &str,
    ) -> Result<(StatusCode, String), BoxError> {
        let tcp = TcpStream::connect(self.address).await?;
        let server_name = ServerName::try_from("localhost")?;
        let tls = self.connector(client).connect(server_name, tcp).await?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls)).await?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let request = Request::builder()
            .uri(path)
            .header(hyper::header::HOST, "localhost")
            .body(Empty::<Bytes>::new())?;
        let response = sender.send_request(request).await?;

        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        Ok((status, String::from_utf8(body.to_vec())?))
    }
}
