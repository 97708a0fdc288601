use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hyper_util::rt::TokioIo;
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

use crate::command::server::listeners::{accept, build_listener};
use crate::command::server::{serve_request, Error, ServerContext};
use crate::configuration::{ServerConfig, ServerTlsConfig};
use crate::tls::{self, ClientAuthentication, DeferredClientVerifier, TlsConnectInfo};

/// Acceptor and the matching way of deciding whether a peer is authorized.
pub struct TlsTerminator {
    acceptor: TlsAcceptor,
    client_auth: ClientAuthentication,
}

impl TlsTerminator {
    pub fn client_authentication(&self) -> &ClientAuthentication {
        &self.client_auth
    }
}

pub struct TlsListener {
    binding_address: SocketAddr,
    terminator: ArcSwap<TlsTerminator>,
    context: ArcSwap<ServerContext>,
    timeouts: ArcSwap<[Duration; 2]>,
}

fn build_timeouts(config: &ServerConfig) -> [Duration; 2] {
    [
        Duration::from_secs(config.query_timeout),
        Duration::from_secs(config.query_timeout_grace_period),
    ]
}

impl TlsListener {
    pub fn new(config: &ServerConfig, context: ServerContext) -> Result<Self, Error> {
        let binding_address = SocketAddr::new(config.bind_address, config.port);
        let terminator = ArcSwap::from_pointee(Self::build_tls_acceptor(&config.tls)?);

        Ok(Self {
            binding_address,
            terminator,
            context: ArcSwap::from_pointee(context),
            timeouts: ArcSwap::from_pointee(build_timeouts(config)),
        })
    }

    pub fn notify_config_change(
        &self,
        config: &ServerConfig,
        context: ServerContext,
    ) -> Result<(), Error> {
        let terminator = Arc::new(Self::build_tls_acceptor(&config.tls)?);
        self.terminator.store(terminator);
        self.timeouts.store(Arc::new(build_timeouts(config)));
        self.context.store(Arc::new(context));

        Ok(())
    }

    pub fn notify_tls_config_change(&self, config: &ServerTlsConfig) -> Result<(), Error> {
        let terminator = Arc::new(Self::build_tls_acceptor(config)?);
        self.terminator.store(terminator);

        Ok(())
    }

    pub fn build_tls_acceptor(tls_config: &ServerTlsConfig) -> Result<TlsTerminator, tls::Error> {
        debug!("Detected TLS configuration");
        let server_certs = tls::load_certificate_bundle(&tls_config.server_certificate_bundle)?;
        let server_key = tls::load_private_key(&tls_config.server_private_key)?;

        let Some(client_ca_bundle) = tls_config.client_ca_bundle.as_ref() else {
            debug!("No client CA bundle detected (will serve without TLS client authentication)");
            let server_config = rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(server_certs, server_key)?;

            return Ok(TlsTerminator {
                acceptor: TlsAcceptor::from(Arc::new(server_config)),
                client_auth: ClientAuthentication::Disabled,
            });
        };

        let client_cert_store =
            tls::build_root_store(tls::load_certificate_bundle(client_ca_bundle)?)?;
        let crls = tls::load_crls(&tls_config.client_crl)?;

        let (client_cert_verifier, client_auth) = if tls_config.reject_unauthorized {
            debug!("Client CA bundle detected (untrusted client certificates are refused)");
            let verifier = WebPkiClientVerifier::builder(Arc::new(client_cert_store))
                .with_crls(crls)
                .build()?;
            (verifier, ClientAuthentication::Strict)
        } else {
            debug!("Client CA bundle detected (untrusted client certificates are flagged)");
            let deferred = Arc::new(DeferredClientVerifier::new(client_cert_store, crls)?);
            let verifier: Arc<dyn ClientCertVerifier> = deferred.clone();
            (verifier, ClientAuthentication::Deferred(deferred))
        };

        let server_config = rustls::ServerConfig::builder()
            .with_client_cert_verifier(client_cert_verifier)
            .with_single_cert(server_certs, server_key)?;

        Ok(TlsTerminator {
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
            client_auth,
        })
    }

    pub async fn serve(&self) -> Result<(), Error> {
        let listener = build_listener(self.binding_address).await?;
        self.serve_listener(listener).await
    }

    pub async fn serve_listener(&self, listener: TcpListener) -> Result<(), Error> {
        if let Ok(local_address) = listener.local_addr() {
            info!("Listening on {local_address} (TLS)");
        }

        loop {
            let (tcp, remote_address) = accept(&listener).await?;

            let terminator = self.terminator.load_full();
            let context = self.context.load_full();
            let timeouts = self.timeouts.load_full();

            tokio::spawn(async move {
                let tls = match terminator.acceptor.accept(tcp).await {
                    Ok(tls) => tls,
                    Err(e) => {
                        debug!("TLS handshake with {remote_address} failed: {e}");
                        return;
                    }
                };

                let (_, session) = tls.get_ref();
                let connect_info = TlsConnectInfo::new(
                    &terminator.client_auth,
                    session.peer_certificates(),
                    Some(remote_address),
                );
                debug!(
                    "Accepted TLS connection from {remote_address} (authorized: {})",
                    connect_info.authorized
                );

                serve_request(TokioIo::new(tls), context, connect_info, timeouts).await;
            });
        }
    }
}
