use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use super::ModelArtifact;
use crate::error::{PipelineError, Result};
use crate::pipeline::{Metrics, MinMaxScaler};

/// Directory holding the trained model, the fitted scaler and the validation
/// metrics as JSON files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    model_file: String,
    scaler_file: String,
    metrics_file: String,
}

impl ArtifactStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        model_file: impl Into<String>,
        scaler_file: impl Into<String>,
        metrics_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            model_file: model_file.into(),
            scaler_file: scaler_file.into(),
            metrics_file: metrics_file.into(),
        }
    }

    /// Ensure artifacts directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(&self.metrics_file)
    }

    pub fn save_scaler(&self, scaler: &MinMaxScaler) -> Result<()> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(scaler)?;
        write_atomic(&self.scaler_path(), &json)?;
        info!(
            "Saved scaler (min={}, max={}) to {}",
            scaler.min(),
            scaler.max(),
            self.scaler_path().display()
        );
        Ok(())
    }

    /// Persist the outputs of one training run.
    ///
    /// All three documents are serialized before anything is written, so a
    /// serialization failure leaves the directory untouched. Each file is then
    /// replaced by rename and is never half-written, but the three renames are
    /// not one transaction: if a later rename fails, the files already
    /// replaced belong to the new run and the rest to the previous one.
    pub fn save_all(&self, model: &ModelArtifact, scaler: &MinMaxScaler, metrics: &Metrics) -> Result<()> {
        let model_json = serde_json::to_string_pretty(model)?;
        let scaler_json = serde_json::to_string_pretty(scaler)?;
        let metrics_json = metrics.to_json()?;

        self.ensure_dir()?;
        write_atomic(&self.model_path(), &model_json)?;
        write_atomic(&self.scaler_path(), &scaler_json)?;
        write_atomic(&self.metrics_path(), &metrics_json)?;

        info!("Saved {} model to {}", model.kind(), self.model_path().display());
        info!("Saved scaler to {}", self.scaler_path().display());
        info!("Saved metrics to {}", self.metrics_path().display());
        Ok(())
    }

    pub fn load_model(&self) -> Result<ModelArtifact> {
        read_json(&self.model_path(), "model")
    }

    pub fn load_scaler(&self) -> Result<MinMaxScaler> {
        read_json(&self.scaler_path(), "scaler")
    }

    pub fn load_metrics(&self) -> Result<Metrics> {
        read_json(&self.metrics_path(), "metrics")
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| PipelineError::artifact(path, "artifact path has no file name"))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    if !path.exists() {
        return Err(PipelineError::artifact(path, format!("{} file not found", what)));
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::artifact(path, format!("cannot read {}: {}", what, e)))?;
    let value = serde_json::from_str(&json)
        .map_err(|e| PipelineError::artifact(path, format!("cannot parse {}: {}", what, e)))?;
    info!("Loaded {} from {}", what, path.display());
    Ok(value)
}
