use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::common::pagination::{Connection, PageArgs};
use crate::common::RequestId;
use crate::domains::matching::activities::{advance, offer_history};
use crate::domains::matching::{AdvanceOutcome, Match};
use crate::domains::requests::activities::{
    create_request, list_all, list_for_client, CreateRequestInput, CreatedRequest,
};
use crate::domains::requests::models::{AdminRequestRow, RequestSummary};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    pub client_email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdvanceBody {
    pub radius_km: Option<f64>,
}

/// POST /api/requests
pub async fn create_request_handler(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreateRequestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedRequest>), ApiError> {
    let Json(input) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let created = create_request(input, &state.deps).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/requests?client_email=
pub async fn list_client_requests_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ClientQuery>,
) -> Result<Json<Vec<RequestSummary>>, ApiError> {
    if query.client_email.trim().is_empty() {
        return Err(ApiError::BadRequest("client_email is required".to_string()));
    }

    let requests = list_for_client(&query.client_email, &state.deps).await?;
    Ok(Json(requests))
}

/// GET /api/admin/requests?first=&after=
pub async fn list_all_requests_handler(
    Extension(state): Extension<AppState>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Connection<AdminRequestRow>>, ApiError> {
    let page = args
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(list_all(&page, &state.deps).await?))
}

/// POST /api/requests/:id/advance
///
/// Manual nudge for requests that ran out of candidates, usually with a
/// wider radius. An empty body uses the default radius.
pub async fn advance_request_handler(
    Extension(state): Extension<AppState>,
    Path(request_id): Path<RequestId>,
    body: Bytes,
) -> Result<Json<AdvanceOutcome>, ApiError> {
    let body = parse_advance_body(&body)?;
    let radius_km = body
        .radius_km
        .unwrap_or(state.deps.settings.default_radius_km);

    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(ApiError::BadRequest(
            "radius_km must be a positive distance".to_string(),
        ));
    }

    info!(request_id = %request_id, radius_km, "Manual advance requested");

    Ok(Json(advance(request_id, radius_km, &state.deps).await?))
}

fn parse_advance_body(raw: &[u8]) -> Result<AdvanceBody, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(AdvanceBody::default());
    }

    serde_json::from_slice(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid advance body: {}", e)))
}

/// GET /api/requests/:id/matches
pub async fn offer_history_handler(
    Extension(state): Extension<AppState>,
    Path(request_id): Path<RequestId>,
) -> Result<Json<Vec<Match>>, ApiError> {
    offer_history(request_id, &state.deps)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Request {} not found", request_id)))
}
