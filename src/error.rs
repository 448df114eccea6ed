use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the forecasting pipeline.
///
/// Every variant is a local failure reported to the immediate caller; none of
/// them leave persisted artifacts half-written.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("insufficient data: need at least {required} valid rows, found {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("insufficient data: {windows} windows cannot be split with validation_split {validation_split}, need at least {required}")]
    InsufficientSplit {
        windows: usize,
        required: usize,
        validation_split: f64,
    },

    #[error("insufficient window: a series of length {len} cannot produce {purpose} windows of size {window_size}")]
    InsufficientWindow {
        len: usize,
        window_size: usize,
        purpose: &'static str,
    },

    #[error("degenerate series: all {len} values equal {value}, min-max range is zero")]
    DegenerateSeries { len: usize, value: f64 },

    #[error("metric error: {0}")]
    Metric(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("invalid artifact {}: {reason}", .path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Stable taxonomy code carried by error responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Schema(_) => "SCHEMA_ERROR",
            PipelineError::InsufficientData { .. } | PipelineError::InsufficientSplit { .. } => {
                "INSUFFICIENT_DATA"
            }
            PipelineError::InsufficientWindow { .. } => "INSUFFICIENT_WINDOW",
            PipelineError::DegenerateSeries { .. } => "DEGENERATE_SERIES",
            PipelineError::Metric(_) => "METRIC_ERROR",
            PipelineError::Model(_) => "MODEL_ERROR",
            PipelineError::Artifact { .. } => "ARTIFACT_ERROR",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::Io(_) => "IO_ERROR",
            PipelineError::Csv(_) => "CSV_ERROR",
            PipelineError::Json(_) => "JSON_ERROR",
        }
    }

    /// True when the failure comes from the input data rather than from the
    /// service itself.
    /// Malformed CSV counts as bad input; a CSV read that failed on I/O does not.
    pub fn is_client_error(&self) -> bool {
        match self {
            PipelineError::Schema(_)
            | PipelineError::InsufficientData { .. }
            | PipelineError::InsufficientSplit { .. }
            | PipelineError::InsufficientWindow { .. } => true,
            PipelineError::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
            _ => false,
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(PipelineError::Schema("x".into()).code(), "SCHEMA_ERROR");
        assert_eq!(
            PipelineError::InsufficientData { required: 61, found: 3 }.code(),
            "INSUFFICIENT_DATA"
        );
        assert_eq!(
            PipelineError::DegenerateSeries { len: 4, value: 1.0 }.code(),
            "DEGENERATE_SERIES"
        );
    }

    #[test]
    fn test_client_vs_internal_classification() {
        assert!(PipelineError::Schema("missing Close".into()).is_client_error());
        assert!(PipelineError::InsufficientWindow {
            len: 3,
            window_size: 60,
            purpose: "serving",
        }
        .is_client_error());
        assert!(!PipelineError::Model("nan output".into()).is_client_error());
        assert!(!PipelineError::artifact("models/model.json", "missing").is_client_error());
    }

    #[test]
    fn test_malformed_csv_is_client_error() {
        let utf8 = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&b"ok,\xff\xfe\n"[..])
            .records()
            .next()
            .unwrap()
            .unwrap_err();
        let err = PipelineError::from(utf8);
        assert_eq!(err.code(), "CSV_ERROR");
        assert!(err.is_client_error());

        let io = csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!PipelineError::from(io).is_client_error());
    }

    #[test]
    fn test_messages_name_the_precondition() {
        let err = PipelineError::InsufficientData { required: 60, found: 12 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 60 valid rows, found 12"
        );
    }
}
