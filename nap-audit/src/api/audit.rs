//! Audit trigger handlers
//!
//! GET|POST /audit/run, GET /audit/last

use axum::{extract::State, routing::get, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::models::RunSummary;
use crate::{trigger, AppState};

/// GET|POST /audit/run
///
/// Runs a full audit and returns its summary. Only one run at a time: a
/// trigger arriving mid-run gets 409 Conflict.
pub async fn run_audit(State(state): State<AppState>) -> ApiResult<Json<RunSummary>> {
    let _guard = state
        .run_lock
        .try_lock()
        .map_err(|_| ApiError::Conflict("Audit run already in progress".to_string()))?;

    match trigger::execute(&state.config, state.places.as_ref()).await {
        Ok(summary) => {
            *state.last_summary.write().await = Some(summary.clone());
            *state.last_error.write().await = None;
            Ok(Json(summary))
        }
        Err(e) => {
            tracing::error!(error = %e, "Audit run failed");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// GET /audit/last
///
/// Summary of the most recent successful run in this process.
pub async fn last_summary(State(state): State<AppState>) -> ApiResult<Json<RunSummary>> {
    state
        .last_summary
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No audit run has completed yet".to_string()))
}

/// Build audit trigger routes
pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/audit/run", get(run_audit).post(run_audit))
        .route("/audit/last", get(last_summary))
}
