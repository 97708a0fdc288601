use std::collections::HashMap;
use std::sync::Arc;

use hyper::http::request::Parts;
use tracing::{debug, instrument, warn, Span};

use crate::auth::{AuthenticateOptions, Error, Outcome, Strategy};
use crate::metrics_provider::AUTH_ATTEMPTS;

/// Request extension carrying the identity resolved by a successful strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct Authenticated<I>(pub I);

/// Registry of named strategies.
pub struct Authenticator<I> {
    strategies: HashMap<String, Arc<dyn Strategy<Identity = I>>>,
}

impl<I> Default for Authenticator<I> {
    fn default() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }
}

impl<I: Send + 'static> Authenticator<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy under its own name, replacing any strategy with the same name.
    pub fn use_strategy<S>(&mut self, strategy: S) -> &mut Self
    where
        S: Strategy<Identity = I> + 'static,
    {
        let name = strategy.name().to_string();
        if self
            .strategies
            .insert(name.clone(), Arc::new(strategy))
            .is_some()
        {
            warn!("Replacing authentication strategy '{name}'");
        } else {
            debug!("Registered authentication strategy '{name}'");
        }

        self
    }

    pub fn has_strategy(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    #[instrument(skip(self, parts, options), fields(auth_result = tracing::field::Empty))]
    pub async fn authenticate(
        &self,
        name: &str,
        parts: &Parts,
        options: &AuthenticateOptions,
    ) -> Result<Outcome<I>, Error> {
        let Some(strategy) = self.strategies.get(name) else {
            return Err(Error::UnknownStrategy(name.to_string()));
        };

        let outcome = strategy.authenticate(parts, options).await;

        AUTH_ATTEMPTS
            .with_label_values(&[name, outcome.kind()])
            .inc();
        Span::current().record("auth_result", outcome.kind());

        match &outcome {
            Outcome::Success(_) => debug!("Strategy '{name}' authenticated the request"),
            Outcome::Fail(reason) => debug!("Strategy '{name}' failed: {reason:?}"),
            Outcome::Error(e) => warn!("Strategy '{name}' errored: {e}"),
        }

        Ok(outcome)
    }
}
