use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use shared::types::{SolveRequest, SolveResponse};
use utoipa::IntoParams;

use crate::{api::state::RosterAppState, error::RosterServiceError};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SolveQuery {
    /// Per-attempt solver budget in seconds. Non-positive or unparseable
    /// values fall back to the configured default.
    pub time_limit_sec: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/schedules/solve",
    tag = "Schedules",
    params(SolveQuery),
    request_body = SolveRequest,
    responses(
        (status = 200, description = "Solve completed; the solver status (including INFEASIBLE) travels in the body", body = SolveResponse),
        (status = 400, description = "Malformed request body")
    )
)]
#[tracing::instrument(skip(state, payload))]
pub async fn solve_schedule(
    State(state): State<Arc<RosterAppState>>,
    Query(query): Query<SolveQuery>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<SolveResponse>, RosterServiceError> {
    let Json(request) =
        payload.map_err(|e| RosterServiceError::BadRequest(format!("Invalid request body: {e}")))?;

    let time_limit_override = query.time_limit_sec.as_deref().and_then(|raw| {
        let parsed = raw.parse::<u64>().ok().filter(|&seconds| seconds > 0);
        if parsed.is_none() {
            tracing::warn!(
                time_limit_sec = raw,
                "Ignoring invalid time_limit_sec query parameter"
            );
        }
        parsed
    });

    let response = state
        .solve_service
        .solve(request, time_limit_override)
        .await?;

    Ok(Json(response))
}
