//! Route handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::{error::ApiError, AppState};
use crate::sandbox::{ExecutionOutput, ExecutionRequest, ExecutionResult};

/// `POST /run`
pub async fn run_code(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<ExecutionOutput>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::Rejection(rejection.status(), rejection.body_text()))?;

    let span = info_span!("run", request_id = %Uuid::new_v4());
    execute(state, request).instrument(span).await
}

async fn execute(state: AppState, request: ExecutionRequest) -> Result<Json<ExecutionOutput>, ApiError> {
    info!("Received code execution request");
    request.validate()?;

    match state.runner.run(&request).await? {
        ExecutionResult::Success(output) => {
            info!("Run completed with exit code {}", output.exit_code);
            Ok(Json(output))
        }
        ExecutionResult::Failure { reason, message } => {
            info!("Run failed ({}): {}", reason, message);
            Err(ApiError::BadRequest(message))
        }
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
