use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{make_serving_window, LoadMode, Metrics, MinMaxScaler, Scaler, SeriesLoader};
use crate::error::{PipelineError, Result};
use crate::model::{ArtifactStore, Forecaster, ModelKind};
use crate::types::RawSeries;

/// Serving state loaded once at startup and never mutated afterwards.
///
/// There is no way to fit a scaler through this type: the scaler always comes
/// from the training run that produced the model.
pub struct ServingContext {
    model: Box<dyn Forecaster>,
    scaler: MinMaxScaler,
    metrics: Metrics,
    window_size: usize,
}

impl ServingContext {
    pub fn new(
        model: Box<dyn Forecaster>,
        scaler: MinMaxScaler,
        metrics: Metrics,
        window_size: usize,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(PipelineError::Config("window_size must be > 0".to_string()));
        }
        if let Some(trained) = model.window_size() {
            if trained != window_size {
                return Err(PipelineError::Config(format!(
                    "model was trained on windows of {} but serving is configured for {}",
                    trained, window_size
                )));
            }
        }
        Ok(Self {
            model,
            scaler,
            metrics,
            window_size,
        })
    }

    /// Read model, scaler and metrics from the artifact directory.
    pub fn load(store: &ArtifactStore, window_size: usize) -> Result<Self> {
        info!("Loading model...");
        let model = store.load_model()?.into_forecaster()?;
        info!("Loading scaler...");
        let scaler = store.load_scaler()?;
        info!("Loading metrics...");
        let metrics = store.load_metrics()?;
        Self::new(model, scaler, metrics, window_size)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model.kind()
    }
}

/// A single one-step-ahead prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub prediction: f64,
    pub latency_seconds: f64,
}

/// Turns the latest price series into a next-value prediction.
///
/// Holds only shared read-only state, so one instance can serve concurrent
/// requests.
#[derive(Clone)]
pub struct PredictionService {
    context: Arc<ServingContext>,
    loader: SeriesLoader,
}

impl PredictionService {
    pub fn new(context: Arc<ServingContext>, target_column: impl Into<String>) -> Self {
        let loader = SeriesLoader::new(target_column, context.window_size());
        Self { context, loader }
    }

    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    /// Load the price file and predict from its trailing window. The reported
    /// latency includes reading the file.
    pub fn predict_from_path(&self, path: &Path) -> Result<PredictionResult> {
        let started = Instant::now();
        let series = self.loader.load_path(path, LoadMode::Serving)?;
        let result = self.predict_latest(&series)?;
        Ok(PredictionResult {
            latency_seconds: started.elapsed().as_secs_f64(),
            ..result
        })
    }

    pub fn predict_latest(&self, series: &RawSeries) -> Result<PredictionResult> {
        let started = Instant::now();
        let ctx = &self.context;
        let w = ctx.window_size;

        if series.len() < w {
            return Err(PipelineError::InsufficientData {
                required: w,
                found: series.len(),
            });
        }

        let tail: Vec<f64> = series.last_n(w).iter().map(|p| p.close).collect();
        let scaled = ctx.scaler.transform(&tail);
        let window = make_serving_window(&scaled, w)?;

        let output = ctx.model.predict(&window)?;
        let normalized = match output.as_slice() {
            Some([value]) if value.is_finite() => *value,
            Some([value]) => {
                return Err(PipelineError::Model(format!(
                    "model produced a non-finite output {}",
                    value
                )))
            }
            _ => {
                return Err(PipelineError::Model(format!(
                    "expected one output for one window, got {}",
                    output.len()
                )))
            }
        };

        let prediction = ctx.scaler.inverse_value(normalized);
        let latency_seconds = started.elapsed().as_secs_f64();
        match series.last().and_then(|p| p.timestamp) {
            Some(ts) => debug!(
                "Predicted {:.4} for the step after {} in {:.6}s",
                prediction, ts, latency_seconds
            ),
            None => debug!(
                "Predicted {:.4} from {} rows in {:.6}s",
                prediction,
                series.len(),
                latency_seconds
            ),
        }

        Ok(PredictionResult {
            prediction,
            latency_seconds,
        })
    }
}
