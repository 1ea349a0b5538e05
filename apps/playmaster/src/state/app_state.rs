use std::sync::Arc;

use crate::services::GameHost;

/// Shared handles given to every request handler.
#[derive(Clone)]
pub struct AppState {
    host: Arc<GameHost>,
}

impl AppState {
    pub fn new(host: Arc<GameHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &GameHost {
        &self.host
    }
}
