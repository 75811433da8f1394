//! HTTP boundary: routes, CORS headers, and error responses.

use crate::models::{Diagnosis, DiagnosisRequest, PersistedDiagnosis, Session};
use crate::pipeline::DiagnosisPipeline;
use crate::Error;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Headers a browser client may send on the diagnosis endpoint.
pub const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub diagnoses: Vec<PersistedDiagnosis>,
}

pub fn router(pipeline: Arc<DiagnosisPipeline>) -> Router {
    Router::new()
        .route("/", post(diagnose).options(preflight))
        .route("/diagnose-plant", post(diagnose).options(preflight))
        .route("/diagnoses", get(history).options(preflight))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// CORS preflight: empty body, headers come from the router layers.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn diagnose(
    State(pipeline): State<Arc<DiagnosisPipeline>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Diagnosis>, Error> {
    let request: DiagnosisRequest = serde_json::from_slice(&body)?;
    let session = Session::from_headers(&headers);
    let diagnosis = pipeline.diagnose(&request, &session).await?;
    Ok(Json(diagnosis))
}

async fn history(
    State(pipeline): State<Arc<DiagnosisPipeline>>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, Error> {
    let session = Session::from_headers(&headers);
    let diagnoses = pipeline.history(&session).await?;
    Ok(Json(HistoryResponse { diagnoses }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
