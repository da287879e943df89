use std::sync::Arc;

use crate::core::PairingEngine;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PairingEngine>,
}

impl AppState {
    pub fn new(engine: Arc<PairingEngine>) -> Self {
        Self { engine }
    }
}
