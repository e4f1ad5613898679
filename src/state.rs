// src/state.rs
use std::sync::Arc;

use crate::services::storage_gateway::StorageGateway;

pub type SharedState = Arc<AppState>;

/// Read-only per-process state; requests never mutate it.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub storage: StorageGateway,
}

impl AppState {
    pub fn new(storage: StorageGateway) -> Self {
        Self { storage }
    }
}
