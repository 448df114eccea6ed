use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::PredictionService;

/// Shared handler state. Everything in here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    /// Price file re-read on every prediction request
    pub data_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(service: PredictionService, data_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            data_path: Arc::new(data_path.into()),
        }
    }
}
