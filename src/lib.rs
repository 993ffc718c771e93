//! Agent Matrix library root.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod matrix;
pub mod protocol;
pub mod transport;
pub mod web;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use self::core::{AgentProxy, MessageQueue, Registry};
pub use error::{Error, Result};
pub use matrix::{Matrix, MatrixConfig};
pub use protocol::Envelope;
pub use web::run_server;
