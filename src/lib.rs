#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

//! Client certificate authentication strategy for TLS servers.
//!
//! [`auth::ClientCertStrategy`] reads the authorization state of the TLS connection a
//! request arrived on, hands the peer certificate to an application supplied verify
//! callback and reports exactly one of success, failure or error. The `command` module
//! wires the strategy into a hot-reloadable HTTPS listener.

pub mod auth;
pub mod command;
pub mod configuration;
pub mod metrics_provider;
pub mod tls;

#[cfg(test)]
pub mod test_pki;
