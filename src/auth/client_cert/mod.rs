//! Authentication based on the TLS client certificate.
//!
//! The TLS layer decides whether a connection is trusted and decodes the peer
//! certificate. This strategy only reads those facts from [`TlsConnectInfo`] and hands
//! the certificate to an application supplied verify callback.

mod verify;


use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use hyper::http::request::Parts;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::auth::{AuthenticateOptions, Error, Outcome, Strategy};
use crate::tls::{PeerCertificate, TlsConnectInfo};

#[cfg(test)]
pub use verify::{MockVerify, MockVerifyWithRequest};
pub use verify::{
    verify_fn, verify_with_request_fn, Verify, VerifyFn, VerifyWithRequest, VerifyWithRequestFn,
};

pub const STRATEGY_NAME: &str = "client-cert";

const MISSING_CERTIFICATE_MESSAGE: &str = "Missing client certificate";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StrategyOptions {
    /// Hand the request head to the verify callback, before the certificate.
    #[serde(default)]
    pub pass_req_to_callback: bool,
}

/// The two verify callback shapes a strategy accepts.
pub enum VerifyCallback<I> {
    Certificate(Arc<dyn Verify<Identity = I>>),
    WithRequest(Arc<dyn VerifyWithRequest<Identity = I>>),
}

impl<I: Send + 'static> VerifyCallback<I> {
    pub fn certificate<V>(verify: V) -> Self
    where
        V: Verify<Identity = I> + 'static,
    {
        VerifyCallback::Certificate(Arc::new(verify))
    }

    pub fn with_request<V>(verify: V) -> Self
    where
        V: VerifyWithRequest<Identity = I> + 'static,
    {
        VerifyCallback::WithRequest(Arc::new(verify))
    }

    fn takes_request(&self) -> bool {
        matches!(self, VerifyCallback::WithRequest(_))
    }
}

impl<I> Clone for VerifyCallback<I> {
    fn clone(&self) -> Self {
        match self {
            VerifyCallback::Certificate(verify) => VerifyCallback::Certificate(Arc::clone(verify)),
            VerifyCallback::WithRequest(verify) => VerifyCallback::WithRequest(Arc::clone(verify)),
        }
    }
}

pub struct ClientCertStrategy<I> {
    options: StrategyOptions,
    verify: VerifyCallback<I>,
}

impl<I: Send + 'static> ClientCertStrategy<I> {
    pub fn new<V>(verify: V) -> Self
    where
        V: Verify<Identity = I> + 'static,
    {
        Self {
            options: StrategyOptions::default(),
            verify: VerifyCallback::certificate(verify),
        }
    }

    pub fn builder() -> Builder<I> {
        Builder::default()
    }

    /// Builds a strategy from options and an optional callback, as configuration driven
    /// code does. The callback shape must agree with `pass_req_to_callback`.
    pub fn with_options(
        options: StrategyOptions,
        verify: Option<VerifyCallback<I>>,
    ) -> Result<Self, Error> {
        let Some(verify) = verify else {
            return Err(Error::MissingVerifyCallback);
        };

        if verify.takes_request() != options.pass_req_to_callback {
            return Err(Error::CallbackShapeMismatch {
                pass_req_to_callback: options.pass_req_to_callback,
            });
        }

        Ok(Self { options, verify })
    }

    pub fn options(&self) -> StrategyOptions {
        self.options
    }

    async fn invoke(
        &self,
        parts: &Parts,
        certificate: &PeerCertificate,
    ) -> Result<Option<I>, Error> {
        let pending = panic::catch_unwind(AssertUnwindSafe(|| match &self.verify {
            VerifyCallback::Certificate(verify) => verify.verify(certificate),
            VerifyCallback::WithRequest(verify) => verify.verify_with_request(parts, certificate),
        }))
        .map_err(|payload| Error::VerifyPanicked(panic_message(payload.as_ref())))?;

        AssertUnwindSafe(pending)
            .catch_unwind()
            .await
            .map_err(|payload| Error::VerifyPanicked(panic_message(payload.as_ref())))?
            .map_err(Error::Verify)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[async_trait]
impl<I: Send + 'static> Strategy for ClientCertStrategy<I> {
    type Identity = I;

    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    #[instrument(skip_all, fields(strategy = STRATEGY_NAME))]
    async fn authenticate(&self, parts: &Parts, options: &AuthenticateOptions) -> Outcome<I> {
        let connection = parts.extensions.get::<TlsConnectInfo>();
        let authorized = connection.is_some_and(|connection| connection.authorized);

        if !authorized && !options.allow_unauthorized {
            let reason = connection.and_then(|connection| connection.authorization_error.as_deref());
            debug!("Connection not authorized by the TLS layer: {reason:?}");
            return Outcome::fail();
        }

        let certificate = connection.and_then(|connection| connection.peer_certificate.as_deref());
        let Some(certificate) = certificate else {
            debug!("No peer certificate on the connection");
            let reason = options
                .bad_request_message
                .as_deref()
                .unwrap_or(MISSING_CERTIFICATE_MESSAGE);
            return Outcome::fail_with(reason);
        };

        match self.invoke(parts, certificate).await {
            Ok(Some(identity)) => Outcome::success(identity),
            Ok(None) => {
                debug!("Verify callback rejected certificate {}", certificate.fingerprint);
                Outcome::fail()
            }
            Err(e) => {
                warn!("Verify callback error: {e}");
                Outcome::error(e)
            }
        }
    }
}

pub struct Builder<I> {
    pass_req_to_callback: bool,
    verify: Option<VerifyCallback<I>>,
}

impl<I> Default for Builder<I> {
    fn default() -> Self {
        Self {
            pass_req_to_callback: false,
            verify: None,
        }
    }
}

impl<I: Send + 'static> Builder<I> {
    pub fn pass_req_to_callback(mut self, enabled: bool) -> Self {
        self.pass_req_to_callback = enabled;
        self
    }

    pub fn verify<V>(mut self, verify: V) -> Self
    where
        V: Verify<Identity = I> + 'static,
    {
        self.verify = Some(VerifyCallback::certificate(verify));
        self
    }

    pub fn verify_with_request<V>(mut self, verify: V) -> Self
    where
        V: VerifyWithRequest<Identity = I> + 'static,
    {
        self.verify = Some(VerifyCallback::with_request(verify));
        self
    }

    pub fn build(self) -> Result<ClientCertStrategy<I>, Error> {
        let options = StrategyOptions {
            pass_req_to_callback: self.pass_req_to_callback,
        };

        ClientCertStrategy::with_options(options, self.verify)
    }
}
