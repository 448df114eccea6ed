use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Affine normalization over the target column.
pub trait Scaler: Sized {
    /// Learn the normalization from a training series.
    fn fit(series: &[f64]) -> Result<Self>;

    fn transform(&self, series: &[f64]) -> Vec<f64>;

    fn inverse_transform(&self, series: &[f64]) -> Vec<f64>;

    fn fit_transform(series: &[f64]) -> Result<(Self, Vec<f64>)> {
        let scaler = Self::fit(series)?;
        let scaled = scaler.transform(series);
        Ok((scaler, scaled))
    }
}

/// Persisted form of the min-max state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScalerState {
    pub min: f64,
    pub max: f64,
}

/// Min-max scaler. Maps the fitted `[min, max]` range onto `[0, 1]`.
///
/// Values outside the fitted range are not clipped and land outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalerState", into = "ScalerState")]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn transform_value(&self, x: f64) -> f64 {
        (x - self.min) / self.range()
    }

    pub fn inverse_value(&self, x: f64) -> f64 {
        x * self.range() + self.min
    }
}

impl Scaler for MinMaxScaler {
    fn fit(series: &[f64]) -> Result<Self> {
        if series.is_empty() {
            return Err(PipelineError::InsufficientData {
                required: 2,
                found: 0,
            });
        }
        if let Some(bad) = series.iter().find(|v| !v.is_finite()) {
            return Err(PipelineError::Schema(format!(
                "cannot fit scaler on non-finite value {}",
                bad
            )));
        }

        let (min, max) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if min == max {
            return Err(PipelineError::DegenerateSeries {
                len: series.len(),
                value: min,
            });
        }

        Ok(Self { min, max })
    }

    fn transform(&self, series: &[f64]) -> Vec<f64> {
        series.iter().map(|&x| self.transform_value(x)).collect()
    }

    fn inverse_transform(&self, series: &[f64]) -> Vec<f64> {
        series.iter().map(|&x| self.inverse_value(x)).collect()
    }
}

impl TryFrom<ScalerState> for MinMaxScaler {
    type Error = String;

    fn try_from(state: ScalerState) -> std::result::Result<Self, Self::Error> {
        if !state.min.is_finite() || !state.max.is_finite() {
            return Err(format!(
                "scaler bounds must be finite (min={}, max={})",
                state.min, state.max
            ));
        }
        if state.min >= state.max {
            return Err(format!(
                "scaler requires min < max (min={}, max={})",
                state.min, state.max
            ));
        }
        Ok(Self {
            min: state.min,
            max: state.max,
        })
    }
}

impl From<MinMaxScaler> for ScalerState {
    fn from(scaler: MinMaxScaler) -> Self {
        Self {
            min: scaler.min,
            max: scaler.max,
        }
    }
}
