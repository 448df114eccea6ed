use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::{ArtifactStore, ModelKind, TrainingParams};

pub const ENV_PREFIX: &str = "FORECASTER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub artifacts: ArtifactSettings,
    pub pipeline: PipelineSettings,
    pub training: TrainingSettings,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataSettings::default(),
            artifacts: ArtifactSettings::default(),
            pipeline: PipelineSettings::default(),
            training: TrainingSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (required only when `explicit`), then
    /// `FORECASTER__SECTION__KEY` environment variables.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        Self::build(path, explicit, None)
    }

    fn build(
        path: &Path,
        explicit: bool,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&Settings::default())?;
        Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.to_path_buf()).required(explicit))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.data.target_column.trim().is_empty() {
            errors.push("data.target_column must not be empty".to_string());
        }

        // Pipeline validation
        if self.pipeline.window_size == 0 {
            errors.push("pipeline.window_size must be > 0".to_string());
        }
        if !(self.pipeline.validation_split > 0.0 && self.pipeline.validation_split < 1.0) {
            errors.push("pipeline.validation_split must be between 0 and 1".to_string());
        }

        // Training validation
        if self.training.epochs == 0 {
            errors.push("training.epochs must be > 0".to_string());
        }
        if self.training.batch_size == 0 {
            errors.push("training.batch_size must be > 0".to_string());
        }
        if self.training.patience == 0 {
            errors.push("training.patience must be > 0".to_string());
        }
        if !(self.training.learning_rate > 0.0 && self.training.learning_rate.is_finite()) {
            errors.push("training.learning_rate must be > 0".to_string());
        }

        if [
            &self.artifacts.model_file,
            &self.artifacts.scaler_file,
            &self.artifacts.metrics_file,
        ]
        .iter()
        .any(|f| f.trim().is_empty())
        {
            errors.push("artifacts file names must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Price file read by training and by every prediction request
    pub path: PathBuf,
    pub target_column: String,
    /// Where `preprocess` writes the window table
    pub windows_path: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/current.csv"),
            target_column: "Close".to_string(),
            windows_path: PathBuf::from("data/windows.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    pub dir: PathBuf,
    pub model_file: String,
    pub scaler_file: String,
    pub metrics_file: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            model_file: "model.json".to_string(),
            scaler_file: "scaler.json".to_string(),
            metrics_file: "metrics.json".to_string(),
        }
    }
}

impl ArtifactSettings {
    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(
            self.dir.clone(),
            self.model_file.clone(),
            self.scaler_file.clone(),
            self.metrics_file.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub window_size: usize,
    /// Trailing fraction of windows held out for validation
    pub validation_split: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            window_size: 60,
            validation_split: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub model: ModelKind,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub patience: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let params = TrainingParams::default();
        Self {
            model: ModelKind::Linear,
            epochs: params.epochs,
            batch_size: params.batch_size,
            learning_rate: params.learning_rate,
            patience: params.patience,
        }
    }
}

impl TrainingSettings {
    pub fn params(&self) -> TrainingParams {
        TrainingParams {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            patience: self.patience,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}
