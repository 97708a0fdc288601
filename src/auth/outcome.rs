use crate::auth::Error;

/// Terminal result of a single authentication attempt.
#[derive(Debug)]
pub enum Outcome<I> {
    /// The strategy resolved an identity.
    Success(I),
    /// Credentials are missing or were rejected, with an optional reason for the client.
    Fail(Option<String>),
    /// The strategy could not reach a decision.
    Error(Error),
}

impl<I> Outcome<I> {
    pub fn success(identity: I) -> Self {
        Outcome::Success(identity)
    }

    pub fn fail() -> Self {
        Outcome::Fail(None)
    }

    pub fn fail_with(reason: impl Into<String>) -> Self {
        Outcome::Fail(Some(reason.into()))
    }

    pub fn error(cause: impl Into<Error>) -> Self {
        Outcome::Error(cause.into())
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Fail(_) => "fail",
            Outcome::Error(_) => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
