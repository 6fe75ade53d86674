use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::app::errors::json_error;
use crate::app::services::AppServices;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Accept one delivered batch: a JSON array whose elements are either
/// event objects or raw JSON strings (as a broker would hand them over).
///
/// Malformed elements do not fail the request; they show up as abandoned
/// events in the returned report.
///
/// The batch runs on its own task: a client that hangs up does not cut the
/// batch short, and the store connection is still released.
pub async fn ingest_batch(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> Response {
    let messages = match split_batch(&body) {
        Ok(messages) => messages,
        Err(resp) => return resp,
    };

    let intake = services.intake.clone();
    let run = tokio::spawn(async move { intake.process(messages).await });

    match run.await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "batch task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "batch_failed", e.to_string())
        }
    }
}

fn split_batch(body: &[u8]) -> Result<Vec<Vec<u8>>, Response> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_json", e.to_string()))?;

    let Value::Array(elements) = value else {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_batch",
            "batch body must be a JSON array",
        ));
    };

    Ok(elements
        .into_iter()
        .map(|element| match element {
            Value::String(raw) => raw.into_bytes(),
            other => other.to_string().into_bytes(),
        })
        .collect())
}
