//! Web server module (Axum + webhook).

use std::sync::Arc;
use std::time::Instant;

use crate::core::Relay;

pub mod router;
pub mod server;
pub mod webhook;

pub use router::create_app_router;
pub use server::{run_server, WebServerConfig};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub verify_token: Arc<str>,
    pub started: Instant,
}

impl AppState {
    pub fn new(relay: Arc<Relay>, verify_token: &str) -> Self {
        Self {
            relay,
            verify_token: Arc::from(verify_token),
            started: Instant::now(),
        }
    }
}
