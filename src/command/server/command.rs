use argh::FromArgs;

use super::listeners::tls::TlsListener;
use super::ServerContext;
use crate::command::server::error::Error;
use crate::configuration::{Configuration, ServerTlsConfig};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "serve",
    description = "Run the client certificate authenticated listener"
)]
pub struct Options {}

pub struct Command {
    listener: TlsListener,
}

impl Command {
    pub fn new(config: &Configuration) -> Result<Command, Error> {
        let context = ServerContext::new(config)?;
        let listener = TlsListener::new(&config.server, context)?;

        Ok(Command { listener })
    }

    pub fn notify_config_change(&self, config: &Configuration) -> Result<(), Error> {
        let context = ServerContext::new(config)?;
        self.listener.notify_config_change(&config.server, context)
    }

    pub fn notify_tls_config_change(&self, tls_config: &ServerTlsConfig) -> Result<(), Error> {
        self.listener.notify_tls_config_change(tls_config)
    }

    pub async fn run(&self) -> Result<(), Error> {
        self.listener.serve().await
    }
}
