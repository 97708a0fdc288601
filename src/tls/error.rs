use rustls_pki_types::pem;
use std::{fmt, io};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Pem(String),
    Tls(String),
    MalformedCertificate(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::Pem(err) => write!(f, "PEM error: {err}"),
            Error::Tls(err) => write!(f, "TLS error: {err}"),
            Error::MalformedCertificate(err) => write!(f, "Malformed certificate: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<pem::Error> for Error {
    fn from(err: pem::Error) -> Self {
        Error::Pem(err.to_string())
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(err.to_string())
    }
}

impl From<rustls::server::VerifierBuilderError> for Error {
    fn from(err: rustls::server::VerifierBuilderError) -> Self {
        Error::Tls(err.to_string())
    }
}
