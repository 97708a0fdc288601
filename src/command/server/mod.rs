mod client_identity;
mod command;
mod directory;
mod error;
mod http_server;
pub mod listeners;
mod route;
mod server_context;

pub use client_identity::ClientIdentity;
pub use command::{Command, Options};
pub use directory::IdentityDirectory;
pub use error::Error;
pub use http_server::{error_to_response, serve_request};
pub use server_context::ServerContext;
