use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::common::MatchId;
use crate::domains::matching::activities::{respond, sweep_expired};
use crate::domains::matching::{Decision, RespondOutcome, SweepReport};
use crate::server::app::AppState;
use crate::server::error::ApiError;

const SOMETHING_WENT_WRONG: &str = "Something went wrong on our side. Please try the link again in a minute.";

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    #[serde(flatten)]
    pub outcome: RespondOutcome,
    pub message: &'static str,
}

fn outcome_status(outcome: &RespondOutcome) -> StatusCode {
    match outcome {
        RespondOutcome::Matched { .. } | RespondOutcome::Rejected { .. } => StatusCode::OK,
        RespondOutcome::NotFound => StatusCode::NOT_FOUND,
        RespondOutcome::AlreadyFinalized => StatusCode::CONFLICT,
        RespondOutcome::Expired => StatusCode::GONE,
    }
}

/// Shared by the emailed accept/reject links. Always answers in plain text,
/// since whoever clicked has no session and no use for error codes.
async fn respond_from_link(state: AppState, raw_id: &str, decision: Decision) -> (StatusCode, String) {
    let Ok(match_id) = raw_id.parse::<MatchId>() else {
        let outcome = RespondOutcome::NotFound;
        return (outcome_status(&outcome), outcome.message().to_string());
    };

    match respond(match_id, decision, &state.deps).await {
        Ok(outcome) => (outcome_status(&outcome), outcome.message().to_string()),
        Err(e) => {
            error!(match_id = %match_id, error = %e, "Offer response failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                SOMETHING_WENT_WRONG.to_string(),
            )
        }
    }
}

/// GET /api/matches/:id/accept
pub async fn accept_link_handler(
    Extension(state): Extension<AppState>,
    Path(raw_id): Path<String>,
) -> (StatusCode, String) {
    respond_from_link(state, &raw_id, Decision::Accept).await
}

/// GET /api/matches/:id/reject
pub async fn reject_link_handler(
    Extension(state): Extension<AppState>,
    Path(raw_id): Path<String>,
) -> (StatusCode, String) {
    respond_from_link(state, &raw_id, Decision::Reject).await
}

/// POST /api/matches/:id/respond
pub async fn respond_handler(
    Extension(state): Extension<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<RespondBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RespondResponse>), ApiError> {
    let match_id: MatchId = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid match id: {}", raw_id)))?;
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let outcome = respond(match_id, body.decision, &state.deps).await?;
    let status = outcome_status(&outcome);

    Ok((
        status,
        Json(RespondResponse {
            message: outcome.message(),
            outcome,
        }),
    ))
}

/// POST /api/matches/sweep
pub async fn sweep_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(sweep_expired(&state.deps).await?))
}
