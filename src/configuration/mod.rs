use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

mod error;
pub mod watcher;

use crate::auth::AuthenticateOptions;
pub use error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub server: ServerConfig,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub identity: HashMap<String, IdentityConfig>, // identity_id <-> certificate fingerprint
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "ServerConfig::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
    pub tls: ServerTlsConfig,
}

impl ServerConfig {
    fn default_port() -> u16 {
        8443
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerTlsConfig {
    pub server_certificate_bundle: String,
    pub server_private_key: String,
    pub client_ca_bundle: Option<String>,
    #[serde(default)]
    pub client_crl: Vec<String>,
    /// Refuse untrusted client certificates during the handshake instead of
    /// flagging the connection as unauthorized.
    #[serde(default)]
    pub reject_unauthorized: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "GlobalConfig::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            max_concurrent_requests: GlobalConfig::default_max_concurrent_requests(),
        }
    }
}

impl GlobalConfig {
    fn default_max_concurrent_requests() -> usize {
        4
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub allow_unauthorized: bool,
    #[serde(default)]
    pub bad_request_message: Option<String>,
}

impl From<&AuthConfig> for AuthenticateOptions {
    fn from(config: &AuthConfig) -> Self {
        AuthenticateOptions {
            allow_unauthorized: config.allow_unauthorized,
            bad_request_message: config.bad_request_message.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IdentityConfig {
    pub fingerprint: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice).map_err(|e| {
            println!("Configuration file format error:");
            println!("{e}");
            Error::ConfigurationFileFormat(e.to_string())
        })?;

        let mut owners = HashMap::new();
        for (id, identity) in &config.identity {
            if !is_fingerprint(&identity.fingerprint) {
                let msg = format!("'{id}' has a malformed fingerprint");
                return Err(Error::InvalidIdentity(msg));
            }

            let fingerprint = identity.fingerprint.to_uppercase();
            if let Some(other) = owners.insert(fingerprint, id) {
                let msg = format!("'{id}' and '{other}' share the same fingerprint");
                return Err(Error::InvalidIdentity(msg));
            }
        }

        Ok(config)
    }
}

/// Colon separated hex pairs, as printed by the `fingerprint` subcommand.
fn is_fingerprint(value: &str) -> bool {
    !value.is_empty()
        && value
            .split(':')
            .all(|pair| pair.len() == 2 && pair.chars().all(|c| c.is_ascii_hexdigit()))
}
