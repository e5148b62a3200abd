// Tripforge - API Core
//
// This crate provides the backend core for the multi-brand travel-agency
// website builder: scheduled WhatsApp message dispatch and the one-time
// builder session token exchange.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
