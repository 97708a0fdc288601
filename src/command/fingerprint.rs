use std::path::Path;

use argh::FromArgs;

use crate::command;
use crate::tls::{self, PeerCertificate};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "fingerprint",
    description = "Print the attributes of the certificates in a PEM bundle, as seen by verify callbacks"
)]
pub struct Options {
    #[argh(positional)]
    /// path to a PEM encoded certificate or bundle
    pub path: String,
}

pub struct Command {}

impl Command {
    pub fn run(options: &Options) -> Result<(), command::Error> {
        println!("{}", Self::render(&options.path)?);
        Ok(())
    }

    pub fn render(path: impl AsRef<Path>) -> Result<String, command::Error> {
        let certificates = tls::load_certificate_bundle(path)?
            .iter()
            .map(|der| PeerCertificate::from_der(der))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(serde_json::to_string_pretty(&certificates)?)
    }
}
