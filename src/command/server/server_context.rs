use hyper::http::request::Parts;
use tracing::{info, instrument};

use crate::auth::client_cert::STRATEGY_NAME;
use crate::auth::{AuthenticateOptions, Authenticator, ClientCertStrategy, Outcome};
use crate::command::server::{ClientIdentity, Error, IdentityDirectory};
use crate::configuration::Configuration;

const AUTHENTICATION_FAILED_MESSAGE: &str = "Client certificate authentication failed";

pub struct ServerContext {
    authenticator: Authenticator<ClientIdentity>,
    auth_options: AuthenticateOptions,
}

impl ServerContext {
    pub fn new(config: &Configuration) -> Result<Self, Error> {
        let directory = IdentityDirectory::new(&config.identity);
        info!("{} enabled identities", directory.len());
        let strategy = ClientCertStrategy::builder()
            .pass_req_to_callback(true)
            .verify_with_request(directory)
            .build()?;

        let mut authenticator = Authenticator::new();
        authenticator.use_strategy(strategy);

        Ok(Self::with_authenticator(
            authenticator,
            AuthenticateOptions::from(&config.auth),
        ))
    }

    pub fn with_authenticator(
        authenticator: Authenticator<ClientIdentity>,
        auth_options: AuthenticateOptions,
    ) -> Self {
        Self {
            authenticator,
            auth_options,
        }
    }

    /// Runs the `client-cert` strategy and maps its outcome to an HTTP error.
    #[instrument(skip(self, parts))]
    pub async fn authenticate_request(&self, parts: &Parts) -> Result<ClientIdentity, Error> {
        let outcome = self
            .authenticator
            .authenticate(STRATEGY_NAME, parts, &self.auth_options)
            .await?;

        match outcome {
            Outcome::Success(identity) => Ok(identity),
            Outcome::Fail(reason) => Err(Error::Unauthorized(
                reason.unwrap_or_else(|| AUTHENTICATION_FAILED_MESSAGE.to_string()),
            )),
            Outcome::Error(error) => Err(error.into()),
        }
    }
}
