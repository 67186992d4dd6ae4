//! Application state for the API server

use crate::{Config, UploadCoordinator};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the coordinator instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The upload coordinator every request is served from
    pub coordinator: Arc<UploadCoordinator>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(coordinator: Arc<UploadCoordinator>, config: Arc<Config>) -> Self {
        Self {
            coordinator,
            config,
        }
    }
}
