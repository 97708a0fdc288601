//! Pluggable request authentication.
//!
//! A [`Strategy`] inspects the request head and terminates with exactly one
//! [`Outcome`]. Strategies are registered by name on an [`Authenticator`], which runs
//! them on behalf of the server and records the result.

pub mod authenticator;
pub mod client_cert;
mod error;
mod outcome;

use async_trait::async_trait;
use hyper::http::request::Parts;

pub use authenticator::{Authenticated, Authenticator};
pub use client_cert::{
    verify_fn, verify_with_request_fn, ClientCertStrategy, StrategyOptions, Verify,
    VerifyCallback, VerifyWithRequest,
};
pub use error::{BoxError, Error};
pub use outcome::Outcome;

/// Per-request options handed to a strategy by the hosting framework.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticateOptions {
    /// Run the strategy even when the TLS layer did not authorize the connection.
    pub allow_unauthorized: bool,
    /// Reason reported when the client presented no credential.
    pub bad_request_message: Option<String>,
}

/// Authentication strategy, registered under a stable name.
#[async_trait]
pub trait Strategy: Send + Sync {
    type Identity: Send;

    fn name(&self) -> &str;

    async fn authenticate(
        &self,
        parts: &Parts,
        options: &AuthenticateOptions,
    ) -> Outcome<Self::Identity>;
}
