//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fetalhealth_core::{check_class, Error, ExamRecord, PredictionResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::state::AppState;
use crate::telemetry::{INFERENCE_LATENCY_US, REQUESTS_TOTAL};

const INTERNAL_ERROR: &str = "Internal server error while processing the prediction.";
const MODEL_UNAVAILABLE: &str = "ML service unavailable: Model not loaded.";

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model_loaded": state.holder.has_model(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Successful prediction body
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub fetalhealth: PredictionResult,
}

/// Error body shared by every failure
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Main prediction handler
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    let result = run_prediction(&state, payload).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);

    match &result {
        Ok(Json(response)) => info!(
            "Predicted fetal health class {} in {}us",
            response.fetalhealth,
            start.elapsed().as_micros()
        ),
        Err(e @ (ApiError::Validation(_) | ApiError::ModelUnavailable)) => {
            warn!("Prediction rejected: {}", e)
        }
        Err(e) => error!("Prediction failed: {:?}", e),
    }

    result
}

async fn run_prediction(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(payload) = payload?;

    // Validation runs before the model is looked at
    let record = ExamRecord::from_json(&payload)?;
    debug!("Exam payload validated");

    let holder = state.holder.clone();
    let label = tokio::task::spawn_blocking(move || {
        if !holder.ensure_loaded() {
            return Err(ApiError::ModelUnavailable);
        }

        let start = Instant::now();
        let label = holder.inference(record.features())?;
        metrics::histogram!(INFERENCE_LATENCY_US).record(start.elapsed().as_micros() as f64);
        Ok(check_class(label)?)
    })
    .await
    .map_err(|e| ApiError::Internal {
        details: e.to_string(),
    })??;

    Ok(Json(PredictResponse { fetalhealth: label }))
}

async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// Error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Payload failed schema validation
    #[error("{0}")]
    Validation(Error),

    /// No model held and reloading failed
    #[error("{}", MODEL_UNAVAILABLE)]
    ModelUnavailable,

    /// State or value error raised during inference
    #[error("{0}")]
    Inference(Error),

    /// Anything else, reported with diagnostic details
    #[error("internal error: {details}")]
    Internal { details: String },
}

impl ApiError {
    /// Metrics label for this failure
    fn outcome(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid",
            Self::ModelUnavailable => "unavailable",
            Self::Inference(_) => "inference_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_validation() {
            ApiError::Validation(err)
        } else if err.is_inference_state() {
            ApiError::Inference(err)
        } else {
            ApiError::Internal {
                details: err.to_string(),
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Internal {
            details: format!("{} {}", rejection.status(), rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: err.to_string(),
                    details: None,
                },
            ),
            ApiError::ModelUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: MODEL_UNAVAILABLE.to_string(),
                    details: None,
                },
            ),
            ApiError::Inference(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: err.to_string(),
                    details: None,
                },
            ),
            ApiError::Internal { details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: INTERNAL_ERROR.to_string(),
                    details: Some(details),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_routing() {
        assert!(matches!(
            ApiError::from(Error::MissingField("baseline_value")),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(Error::ModelNotLoaded),
            ApiError::Inference(_)
        ));
        assert!(matches!(
            ApiError::from(Error::prediction("boom")),
            ApiError::Internal { .. }
        ));
        assert!(matches!(
            ApiError::from(Error::UnexpectedLabel(9)),
            ApiError::Internal { .. }
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::Validation(Error::EmptyPayload), StatusCode::BAD_REQUEST),
            (ApiError::ModelUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                ApiError::Inference(Error::ModelNotLoaded),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Internal {
                    details: "x".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
