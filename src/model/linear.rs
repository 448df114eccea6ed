use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{mse, Forecaster, ModelArtifact, ModelKind, TrainingParams, TrainingReport};
use crate::error::{PipelineError, Result};
use crate::pipeline::WindowSet;

/// Model weights for persistence (linear autoregression coefficients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub window_size: usize,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearWeights {
    /// Starts from the last-value forecast: all weight on the newest element.
    fn persistence(window_size: usize) -> Self {
        let mut coefficients = vec![0.0; window_size];
        if let Some(last) = coefficients.last_mut() {
            *last = 1.0;
        }
        Self {
            window_size,
            coefficients,
            intercept: 0.0,
        }
    }
}

/// Linear next-value regression over a normalized window.
///
/// Trained with mini-batch gradient descent on MSE. Batches are taken in
/// chronological order and nothing is sampled, so two fits on the same data
/// produce identical weights. Training stops once the validation loss has not
/// improved for `patience` epochs and the best weights are restored.
pub struct LinearForecaster {
    weights: Option<LinearWeights>,
    params: TrainingParams,
}

impl LinearForecaster {
    pub fn new(params: TrainingParams) -> Self {
        Self {
            weights: None,
            params,
        }
    }

    pub fn from_weights(weights: LinearWeights) -> Result<Self> {
        if weights.window_size == 0 || weights.coefficients.len() != weights.window_size {
            return Err(PipelineError::Model(format!(
                "inconsistent weights: window_size {} with {} coefficients",
                weights.window_size,
                weights.coefficients.len()
            )));
        }
        if !weights.intercept.is_finite() || weights.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::Model("weights must be finite".to_string()));
        }
        Ok(Self {
            weights: Some(weights),
            params: TrainingParams::default(),
        })
    }

    pub fn weights(&self) -> Option<&LinearWeights> {
        self.weights.as_ref()
    }

    fn validate_params(&self) -> Result<()> {
        let p = &self.params;
        if p.epochs == 0 || p.batch_size == 0 || p.patience == 0 {
            return Err(PipelineError::Config(
                "epochs, batch_size and patience must be > 0".to_string(),
            ));
        }
        if !(p.learning_rate > 0.0 && p.learning_rate.is_finite()) {
            return Err(PipelineError::Config(format!(
                "learning_rate must be a positive number, got {}",
                p.learning_rate
            )));
        }
        Ok(())
    }
}

fn linear_predict(inputs: &Array2<f64>, coefficients: &Array1<f64>, intercept: f64) -> Array1<f64> {
    inputs.dot(coefficients) + intercept
}

impl Forecaster for LinearForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn window_size(&self) -> Option<usize> {
        self.weights.as_ref().map(|w| w.window_size)
    }

    fn fit(&mut self, train: &WindowSet, validation: &WindowSet) -> Result<TrainingReport> {
        self.validate_params()?;
        if train.is_empty() || validation.is_empty() {
            return Err(PipelineError::InsufficientData {
                required: 1,
                found: train.len().min(validation.len()),
            });
        }
        let window_size = train.window_size();
        if validation.window_size() != window_size {
            return Err(PipelineError::Model(format!(
                "train windows have width {}, validation windows {}",
                window_size,
                validation.window_size()
            )));
        }

        let init = LinearWeights::persistence(window_size);
        let mut coefficients = Array1::from(init.coefficients);
        let mut intercept = init.intercept;

        let mut best_coefficients = coefficients.clone();
        let mut best_intercept = intercept;
        let mut best_loss = mse(
            &linear_predict(&validation.inputs, &coefficients, intercept),
            &validation.targets,
        );
        let mut best_epoch = 0;
        let mut epochs_run = 0;
        let mut stale_epochs = 0;

        let n = train.len();
        let lr = self.params.learning_rate;

        for epoch in 1..=self.params.epochs {
            let mut start = 0;
            while start < n {
                let end = (start + self.params.batch_size).min(n);
                let xb = train.inputs.slice(s![start..end, ..]);
                let yb = train.targets.slice(s![start..end]);
                let m = (end - start) as f64;

                let errors = xb.dot(&coefficients) + intercept - yb;
                let grad_coef = xb.t().dot(&errors) * (2.0 / m);
                let grad_intercept = errors.sum() * 2.0 / m;

                coefficients.scaled_add(-lr, &grad_coef);
                intercept -= lr * grad_intercept;
                start = end;
            }
            epochs_run = epoch;

            let train_loss = mse(&linear_predict(&train.inputs, &coefficients, intercept), &train.targets);
            let val_loss = mse(
                &linear_predict(&validation.inputs, &coefficients, intercept),
                &validation.targets,
            );
            if !train_loss.is_finite() || !val_loss.is_finite() {
                return Err(PipelineError::Model(format!(
                    "training diverged at epoch {} (learning_rate {})",
                    epoch, lr
                )));
            }
            debug!("Epoch {}: loss={:.6} val_loss={:.6}", epoch, train_loss, val_loss);

            if val_loss < best_loss {
                best_loss = val_loss;
                best_coefficients.assign(&coefficients);
                best_intercept = intercept;
                best_epoch = epoch;
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                if stale_epochs >= self.params.patience {
                    info!(
                        "Early stopping at epoch {} (best epoch {}, val_loss={:.6})",
                        epoch, best_epoch, best_loss
                    );
                    break;
                }
            }
        }

        self.weights = Some(LinearWeights {
            window_size,
            coefficients: best_coefficients.to_vec(),
            intercept: best_intercept,
        });

        info!(
            "Linear model trained: {} samples, {} epochs, best val_loss={:.6}",
            n, epochs_run, best_loss
        );

        Ok(TrainingReport {
            train_samples: n,
            validation_samples: validation.len(),
            epochs_run,
            best_epoch,
            best_validation_loss: best_loss,
        })
    }

    fn predict(&self, inputs: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| PipelineError::Model("linear model is not trained".to_string()))?;
        if inputs.ncols() != weights.window_size {
            return Err(PipelineError::Model(format!(
                "expected windows of width {}, got {}",
                weights.window_size,
                inputs.ncols()
            )));
        }
        let coefficients = Array1::from(weights.coefficients.clone());
        Ok(linear_predict(inputs, &coefficients, weights.intercept))
    }

    fn to_artifact(&self) -> Result<ModelArtifact> {
        self.weights()
            .cloned()
            .map(ModelArtifact::Linear)
            .ok_or_else(|| PipelineError::Model("No model to save".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{chronological_split, make_training_windows};
    use ndarray::array;

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 0.5 + 0.4 * (i as f64 * 0.2).sin())
            .collect()
    }

    fn split(series: &[f64], w: usize) -> (WindowSet, WindowSet) {
        let set = make_training_windows(series, w).unwrap();
        chronological_split(&set, 0.2).unwrap()
    }

    #[test]
    fn test_untrained_model_cannot_predict_or_save() {
        let model = LinearForecaster::new(TrainingParams::default());
        assert!(model.weights().is_none());
        assert!(model.predict(&array![[0.1, 0.2]]).is_err());
        assert!(model.to_artifact().is_err());
    }

    #[test]
    fn test_fit_does_not_worsen_on_baseline() {
        let (train, val) = split(&wave(200), 10);
        let mut model = LinearForecaster::new(TrainingParams::default());
        let report = model.fit(&train, &val).unwrap();

        let baseline = mse(&val.inputs.column(9).to_owned(), &val.targets);
        assert!(report.best_validation_loss <= baseline);
        assert_eq!(model.window_size(), Some(10));
        assert!(report.epochs_run >= 1 && report.epochs_run <= 25);
        assert_eq!(report.train_samples + report.validation_samples, 190);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (train, val) = split(&wave(150), 8);
        let mut a = LinearForecaster::new(TrainingParams::default());
        let mut b = LinearForecaster::new(TrainingParams::default());
        a.fit(&train, &val).unwrap();
        b.fit(&train, &val).unwrap();
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_early_stopping_respects_patience() {
        let (train, val) = split(&wave(120), 6);
        let params = TrainingParams { epochs: 500, batch_size: 8, learning_rate: 0.05, patience: 2 };
        let mut model = LinearForecaster::new(params);
        let report = model.fit(&train, &val).unwrap();
        assert!(report.epochs_run - report.best_epoch <= 2);
    }

    #[test]
    fn test_predict_batch_and_single() {
        let model = LinearForecaster::from_weights(LinearWeights {
            window_size: 3,
            coefficients: vec![0.0, 0.5, 0.5],
            intercept: 0.1,
        })
        .unwrap();
        let out = model.predict(&array![[1.0, 0.2, 0.4], [0.0, 1.0, 1.0]]).unwrap();
        assert!((out[0] - 0.4).abs() < 1e-12);
        assert!((out[1] - 1.1).abs() < 1e-12);
        let single = model.predict(&array![[1.0, 0.2, 0.4]]).unwrap();
        assert_eq!(single.len(), 1);
        assert!(model.predict(&array![[1.0, 0.2]]).is_err());
    }

    #[test]
    fn test_from_weights_validates_shape() {
        let bad = LinearWeights { window_size: 3, coefficients: vec![1.0], intercept: 0.0 };
        assert!(LinearForecaster::from_weights(bad).is_err());
    }

    #[test]
    fn test_diverging_learning_rate_is_reported() {
        let (train, val) = split(&wave(100), 5);
        let params = TrainingParams { epochs: 200, batch_size: 4, learning_rate: 1e6, patience: 200 };
        let mut model = LinearForecaster::new(params);
        let err = model.fit(&train, &val).unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
        assert!(model.weights().is_none());
    }
}
