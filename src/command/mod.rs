pub mod fingerprint;
pub mod server;

mod error;

pub use error::Error;
