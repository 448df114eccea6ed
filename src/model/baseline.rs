use ndarray::{Array1, Array2, Axis};
use tracing::info;

use super::{mse, Forecaster, ModelArtifact, ModelKind, TrainingReport};
use crate::error::{PipelineError, Result};
use crate::pipeline::WindowSet;

/// Naive forecast: tomorrow's price equals today's.
///
/// Has nothing to learn; `fit` only measures the validation loss so the
/// baseline can be compared with trained models.
#[derive(Debug, Clone, Default)]
pub struct LastValueModel;

impl LastValueModel {
    pub fn new() -> Self {
        Self
    }
}

impl Forecaster for LastValueModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LastValue
    }

    fn window_size(&self) -> Option<usize> {
        None
    }

    fn fit(&mut self, train: &WindowSet, validation: &WindowSet) -> Result<TrainingReport> {
        let predictions = self.predict(&validation.inputs)?;
        let loss = mse(&predictions, &validation.targets);
        info!("Last-value baseline: validation MSE {:.6}", loss);
        Ok(TrainingReport {
            train_samples: train.len(),
            validation_samples: validation.len(),
            epochs_run: 0,
            best_epoch: 0,
            best_validation_loss: loss,
        })
    }

    fn predict(&self, inputs: &Array2<f64>) -> Result<Array1<f64>> {
        let width = inputs.ncols();
        if width == 0 {
            return Err(PipelineError::Model(
                "last-value model needs windows with at least one element".to_string(),
            ));
        }
        Ok(inputs.index_axis(Axis(1), width - 1).to_owned())
    }

    fn to_artifact(&self) -> Result<ModelArtifact> {
        Ok(ModelArtifact::LastValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::make_training_windows;
    use ndarray::array;

    #[test]
    fn test_predicts_last_column() {
        let model = LastValueModel::new();
        let out = model.predict(&array![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]).unwrap();
        assert_eq!(out.to_vec(), vec![0.3, 0.6]);
    }

    #[test]
    fn test_fit_reports_validation_loss() {
        let series: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let set = make_training_windows(&series, 3).unwrap();
        let (train, val) = (set.slice(0, 5), set.slice(5, 7));
        let mut model = LastValueModel::new();
        let report = model.fit(&train, &val).unwrap();
        assert_eq!(report.train_samples, 5);
        assert_eq!(report.validation_samples, 2);
        assert!((report.best_validation_loss - 0.01).abs() < 1e-12);
    }
}
