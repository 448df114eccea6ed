use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Validation accuracy of a training run, in price units (MAPE in percent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
}

impl Metrics {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compare de-normalized predictions with the true prices.
///
/// Rows whose true value is exactly zero are left out of MAPE (they still
/// count for MAE and RMSE). If every true value is zero MAPE is undefined and
/// the evaluation fails.
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<Metrics> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::Metric(format!(
            "length mismatch: {} true values vs {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(PipelineError::Metric("no samples to evaluate".to_string()));
    }
    if y_true.iter().chain(y_pred.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::Metric(
            "true values and predictions must be finite".to_string(),
        ));
    }

    let n = y_true.len() as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_rows = 0usize;

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        let err = t - p;
        abs_sum += err.abs();
        sq_sum += err * err;
        if t != 0.0 {
            pct_sum += (err / t).abs();
            pct_rows += 1;
        }
    }

    if pct_rows == 0 {
        return Err(PipelineError::Metric(
            "MAPE is undefined: every true value is zero".to_string(),
        ));
    }
    let skipped = y_true.len() - pct_rows;
    if skipped > 0 {
        warn!("MAPE skipped {} rows with a zero true value", skipped);
    }

    Ok(Metrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        mape: pct_sum / pct_rows as f64 * 100.0,
    })
}
