//! HTTP surface.
//!
//! Exactly one classification endpoint is mounted, chosen at startup:
//!
//! * `POST /classification[?id=..]` with a JSON array of feature strings,
//!   answered by the loaded models;
//! * `GET /classification?id=..`, answered with the fixed default result.
//!
//! `GET /health` is always available.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::PredictError;
use crate::gateway::Predictor;
use crate::result::Classification;

/// Which classification endpoint the router exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /classification` with feature values.
    Features,
    /// `GET /classification?id=..` with fixed answers.
    Stub,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Features => "models",
            Endpoint::Stub => "stub",
        }
    }
}

#[derive(Clone)]
struct AppState {
    predictor: Arc<dyn Predictor>,
    endpoint: Endpoint,
}

/// Error returned from a handler.
///
/// Validation problems carry their message to the caller; internal failures
/// are logged and answered with an opaque body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        warn!("Bad request: {}", msg);
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: Some(msg),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!("Internal error: {}", msg);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        if err.is_validation() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: Option<String>,
}

/// Construct the router for `predictor`.
pub fn router(predictor: Arc<dyn Predictor>, endpoint: Endpoint) -> Router {
    let classification = match endpoint {
        Endpoint::Features => post(classify_features),
        Endpoint::Stub => get(classify_stub),
    };

    Router::new()
        .route("/classification", classification)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            predictor,
            endpoint,
        })
}

/// Serve `app` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Classify a feature array
///
/// POST /classification
async fn classify_features(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Json<Classification>, ApiError> {
    let Json(values) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let result = state.predictor.classify(&values, query.id)?;
    Ok(Json(result))
}

/// Fixed answer for wiring tests
///
/// GET /classification?id=..
/// Without `?id=` the `id` key is left out of the body, as in models mode,
/// rather than sent as `null`.
async fn classify_stub(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Classification>, ApiError> {
    let result = state.predictor.classify(&[], query.id)?;
    Ok(Json(result))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.endpoint.name().to_string(),
        features: state.predictor.feature_count(),
    })
}
