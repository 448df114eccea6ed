use serde::{Deserialize, Serialize};

use super::{Forecaster, LastValueModel, LinearForecaster, LinearWeights, ModelKind};
use crate::error::Result;

/// Serialized trained model, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    LastValue,
    Linear(LinearWeights),
}

impl ModelArtifact {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelArtifact::LastValue => ModelKind::LastValue,
            ModelArtifact::Linear(_) => ModelKind::Linear,
        }
    }

    /// Rebuild a ready-to-predict model.
    pub fn into_forecaster(self) -> Result<Box<dyn Forecaster>> {
        match self {
            ModelArtifact::LastValue => Ok(Box::new(LastValueModel::new())),
            ModelArtifact::Linear(weights) => Ok(Box::new(LinearForecaster::from_weights(weights)?)),
        }
    }
}
