use std::{error, fmt};

/// Error type verify callbacks report application faults with.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum Error {
    MissingVerifyCallback,
    CallbackShapeMismatch { pass_req_to_callback: bool },
    UnknownStrategy(String),
    Verify(BoxError),
    VerifyPanicked(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingVerifyCallback => {
                write!(f, "Client certificate strategy requires a verify callback")
            }
            Error::CallbackShapeMismatch {
                pass_req_to_callback: true,
            } => write!(
                f,
                "pass_req_to_callback is set but the verify callback does not accept the request"
            ),
            Error::CallbackShapeMismatch {
                pass_req_to_callback: false,
            } => write!(
                f,
                "Verify callback expects the request but pass_req_to_callback is not set"
            ),
            Error::UnknownStrategy(name) => write!(f, "Unknown authentication strategy: {name}"),
            Error::Verify(err) => write!(f, "Verify callback failed: {err}"),
            Error::VerifyPanicked(msg) => write!(f, "Verify callback panicked: {msg}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Verify(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        Error::Verify(err)
    }
}
