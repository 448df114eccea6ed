use tracing::info;

use super::{
    chronological_split, evaluate, make_training_windows, min_split_windows, Metrics, MinMaxScaler,
    Scaler, WindowSet,
};
use crate::error::{PipelineError, Result};
use crate::model::{Forecaster, TrainingReport};
use crate::types::RawSeries;

/// Everything a training run produces besides the model itself.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub scaler: MinMaxScaler,
    pub metrics: Metrics,
    pub report: TrainingReport,
    /// De-normalized validation targets, in series order
    pub validation_true: Vec<f64>,
    /// De-normalized validation predictions, aligned with `validation_true`
    pub validation_pred: Vec<f64>,
}

/// Offline training pipeline: scale, window, split, fit, evaluate.
#[derive(Debug, Clone)]
pub struct Trainer {
    window_size: usize,
    validation_split: f64,
}

impl Trainer {
    pub fn new(window_size: usize, validation_split: f64) -> Self {
        Self {
            window_size,
            validation_split,
        }
    }

    /// Fit the scaler on the whole series and cut it into training windows.
    pub fn prepare(&self, series: &RawSeries) -> Result<(MinMaxScaler, WindowSet)> {
        let required = self.window_size + 1;
        if series.len() < required {
            return Err(PipelineError::InsufficientData {
                required,
                found: series.len(),
            });
        }

        let closes = series.closes();
        let (scaler, scaled) = MinMaxScaler::fit_transform(&closes)?;
        info!(
            "Scaler fitted on {} samples: min={:.4}, max={:.4}",
            closes.len(),
            scaler.min(),
            scaler.max()
        );

        let windows = make_training_windows(&scaled, self.window_size)?;
        info!("Shape X: ({}, {}, 1)", windows.len(), windows.window_size());
        info!("Shape y: ({}, 1)", windows.len());
        Ok((scaler, windows))
    }

    /// Rows needed so that both sides of the split hold at least one window.
    pub fn min_rows(&self) -> Result<usize> {
        Ok(self.window_size + min_split_windows(self.validation_split)?)
    }

    /// Run the full pipeline against `model`. Nothing is written to disk.
    pub fn run(&self, series: &RawSeries, model: &mut dyn Forecaster) -> Result<TrainingOutcome> {
        let required = self.min_rows()?;
        if series.len() < required {
            return Err(PipelineError::InsufficientData {
                required,
                found: series.len(),
            });
        }

        info!("━━━ Step 1: Normalizing and windowing ━━━");
        let (scaler, windows) = self.prepare(series)?;

        info!("━━━ Step 2: Chronological split ━━━");
        let (train, validation) = chronological_split(&windows, self.validation_split)?;
        info!("Train: {} samples", train.len());
        info!("Validation: {} samples", validation.len());

        info!("━━━ Step 3: Training {} model ━━━", model.kind());
        let report = model.fit(&train, &validation)?;

        info!("━━━ Step 4: Evaluating on validation split ━━━");
        let predicted = model.predict(&validation.inputs)?;
        if predicted.len() != validation.len() {
            return Err(PipelineError::Model(format!(
                "model returned {} predictions for {} windows",
                predicted.len(),
                validation.len()
            )));
        }

        let validation_true = scaler.inverse_transform(&validation.targets.to_vec());
        let validation_pred = scaler.inverse_transform(&predicted.to_vec());
        let metrics = evaluate(&validation_true, &validation_pred)?;
        info!(
            "Validation metrics: MAE={:.4} RMSE={:.4} MAPE={:.2}%",
            metrics.mae, metrics.rmse, metrics.mape
        );

        Ok(TrainingOutcome {
            scaler,
            metrics,
            report,
            validation_true,
            validation_pred,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LastValueModel, LinearForecaster, TrainingParams};

    fn prices(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 30.0 + 4.0 * (i as f64 * 0.15).sin() + i as f64 * 0.05)
            .collect()
    }

    fn assert_close(a: f64, b: f64) {
        let tol = 1e-9 * a.abs().max(b.abs()).max(1.0);
        assert!((a - b).abs() <= tol, "{} != {}", a, b);
    }

    #[test]
    fn test_identity_pipeline_has_no_drift() {
        let raw = prices(65);
        let series = RawSeries::from_closes(&raw);
        let w = 60;

        let (scaler, windows) = Trainer::new(w, 0.2).prepare(&series).unwrap();
        assert_eq!(windows.len(), 5);

        let model = LastValueModel::new();
        let predicted = model.predict(&windows.inputs).unwrap();
        let unscaled_pred = scaler.inverse_transform(&predicted.to_vec());
        let unscaled_targets = scaler.inverse_transform(&windows.targets.to_vec());

        for i in 0..windows.len() {
            // window i covers raw[i..i + 60] and targets raw[i + 60]
            assert_close(unscaled_pred[i], raw[i + w - 1]);
            assert_close(unscaled_targets[i], raw[i + w]);
        }
    }

    #[test]
    fn test_run_with_baseline_matches_manual_metrics() {
        let raw = prices(120);
        let series = RawSeries::from_closes(&raw);
        let w = 10;
        let mut model = LastValueModel::new();
        let outcome = Trainer::new(w, 0.2).run(&series, &mut model).unwrap();

        // 110 windows -> 88 train, 22 validation
        assert_eq!(outcome.report.train_samples, 88);
        assert_eq!(outcome.validation_true.len(), 22);

        let first_val = 88;
        for (k, (t, p)) in outcome
            .validation_true
            .iter()
            .zip(outcome.validation_pred.iter())
            .enumerate()
        {
            assert_close(*t, raw[first_val + k + w]);
            assert_close(*p, raw[first_val + k + w - 1]);
        }

        let expected = evaluate(&outcome.validation_true, &outcome.validation_pred).unwrap();
        assert_eq!(outcome.metrics, expected);
        assert_eq!(outcome.scaler.min(), raw.iter().cloned().fold(f64::MAX, f64::min));
    }

    #[test]
    fn test_run_with_linear_model() {
        let series = RawSeries::from_closes(&prices(200));
        let mut model = LinearForecaster::new(TrainingParams::default());
        let outcome = Trainer::new(20, 0.2).run(&series, &mut model).unwrap();
        assert!(outcome.metrics.mae.is_finite());
        assert!(outcome.metrics.mape >= 0.0);
        assert!(model.to_artifact().is_ok());
    }

    #[test]
    fn test_too_short_series() {
        let series = RawSeries::from_closes(&prices(10));
        let mut model = LastValueModel::new();
        let err = Trainer::new(10, 0.2).run(&series, &mut model).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { required: 12, found: 10 }
        ));
    }

    #[test]
    fn test_one_window_past_minimum_names_row_count() {
        let raw = prices(62);
        let mut model = LastValueModel::new();
        let trainer = Trainer::new(60, 0.2);
        assert_eq!(trainer.min_rows().unwrap(), 62);

        let err = trainer
            .run(&RawSeries::from_closes(&raw[..61]), &mut model)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { required: 62, found: 61 }
        ));
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 62 valid rows, found 61"
        );

        let outcome = trainer.run(&RawSeries::from_closes(&raw), &mut model).unwrap();
        assert_eq!(outcome.report.train_samples, 1);
        assert_eq!(outcome.validation_true.len(), 1);
    }

    #[test]
    fn test_constant_series_fails_before_fit() {
        let series = RawSeries::from_closes(&[5.0; 30]);
        let mut model = LastValueModel::new();
        let err = Trainer::new(5, 0.2).run(&series, &mut model).unwrap_err();
        assert!(matches!(err, PipelineError::DegenerateSeries { .. }));
    }
}
