pub mod artifact;
pub mod baseline;
pub mod linear;
pub mod persistence;

pub use artifact::ModelArtifact;
pub use baseline::LastValueModel;
pub use linear::{LinearForecaster, LinearWeights};
pub use persistence::ArtifactStore;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::pipeline::WindowSet;

/// Regression model over normalized windows.
///
/// `predict` must be a pure function of the trained parameters and accept any
/// batch size, including a single row.
#[cfg_attr(test, mockall::automock)]
pub trait Forecaster: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Input width fixed by training, if the model has one.
    fn window_size(&self) -> Option<usize>;

    /// Train on `train`, using `validation` for early stopping only.
    fn fit(&mut self, train: &WindowSet, validation: &WindowSet) -> Result<TrainingReport>;

    fn predict(&self, inputs: &Array2<f64>) -> Result<Array1<f64>>;

    fn to_artifact(&self) -> Result<ModelArtifact>;
}

/// Training report after model fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub train_samples: usize,
    pub validation_samples: usize,
    pub epochs_run: usize,
    pub best_epoch: usize,
    /// MSE on the normalized validation targets
    pub best_validation_loss: f64,
}

/// Gradient-descent hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub patience: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 25,
            batch_size: 32,
            learning_rate: 0.05,
            patience: 5,
        }
    }
}

/// Model type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LastValue,
    Linear,
}

impl ModelKind {
    pub fn as_str(&self) -> &str {
        match self {
            ModelKind::LastValue => "last_value",
            ModelKind::Linear => "linear",
        }
    }

    /// A fresh, untrained model of this kind.
    pub fn build(&self, params: TrainingParams) -> Box<dyn Forecaster> {
        match self {
            ModelKind::LastValue => Box::new(LastValueModel::new()),
            ModelKind::Linear => Box::new(LinearForecaster::new(params)),
        }
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last_value" => Ok(ModelKind::LastValue),
            "linear" => Ok(ModelKind::Linear),
            _ => Err(PipelineError::Config(format!("Unknown model type: {}", s))),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean squared error between two equally sized vectors.
pub(crate) fn mse(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let diff = predictions - targets;
    diff.dot(&diff) / targets.len() as f64
}
