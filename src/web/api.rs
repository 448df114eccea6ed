use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt::Write;
use tracing::{error, warn};

use super::AppState;
use crate::error::PipelineError;
use crate::pipeline::Metrics;

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

// === Health Check ===

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Prediction ===

pub async fn get_predict(State(state): State<AppState>) -> Response {
    let service = state.service.clone();
    let path = state.data_path.clone();

    match tokio::task::spawn_blocking(move || service.predict_from_path(&path)).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Prediction task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"code": "INTERNAL_ERROR", "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

fn error_response(e: &PipelineError) -> Response {
    let status = if e.is_client_error() {
        warn!("Rejected prediction request: {}", e);
        StatusCode::BAD_REQUEST
    } else {
        error!("Prediction failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({"code": e.code(), "error": e.to_string()}))).into_response()
}

// === Prometheus ===

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus(state.service.context().metrics());
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

/// Training metrics as Prometheus gauges.
pub fn render_prometheus(metrics: &Metrics) -> String {
    let gauges = [
        ("model_mae", "Mean Absolute Error", metrics.mae),
        ("model_rmse", "Root Mean Squared Error", metrics.rmse),
        ("model_mape", "Mean Absolute Percentage Error", metrics.mape),
    ];

    let mut out = String::new();
    for (name, help, value) in gauges {
        // Writing into a String cannot fail
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} gauge", name);
        let _ = writeln!(out, "{} {}", name, value);
    }
    out
}
