//! Web server module (Axum + WebSocket endpoint + API).

pub mod api;
pub mod router;
pub mod server;
pub mod ws;

use std::sync::Arc;

use crate::matrix::Matrix;

pub use server::{run_server, WebServerConfig};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub matrix: Arc<Matrix>,
}

impl AppState {
    pub fn new(matrix: Arc<Matrix>) -> Self {
        Self { matrix }
    }
}
