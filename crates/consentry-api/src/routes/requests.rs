//! # Access Request API
//!
//! Organizations file requests for a subject's consented data; subjects
//! approve or revoke them; subjects read their transparency log.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use consentry_core::{ConsentTypeId, RequestId, SubjectId, Timestamp};
use consentry_ledger::{AccessRequest, RequestDecision};

use crate::auth::{require_citizen, require_organization, CallerIdentity};
use crate::error::AppError;
use crate::state::AppState;

/// Request body for filing an access request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRequestBody {
    /// The subject whose data is requested.
    pub subject_id: Uuid,
    /// The consent type requested.
    pub consent_type_id: Uuid,
    /// Stated purpose (non-empty).
    pub purpose: String,
}

/// Request body for deciding a request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionBody {
    /// The subject's decision.
    #[schema(value_type = String)]
    pub decision: RequestDecision,
}

/// One entry of the citizen transparency log, with display names
/// resolved.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransparencyEntry {
    /// Request identifier.
    #[schema(value_type = String)]
    pub id: RequestId,
    /// Requesting organization's id.
    #[schema(value_type = String)]
    pub organization_id: consentry_core::OrgId,
    /// Requesting organization's name, when the directory knows it.
    pub organization_name: Option<String>,
    /// Consent type display name, when registered.
    pub consent_type: Option<String>,
    /// Current request status.
    #[schema(value_type = String)]
    pub status: consentry_ledger::RequestStatus,
    /// Stated purpose.
    pub purpose: Option<String>,
    /// When the request was filed.
    #[schema(value_type = String)]
    pub requested_at: Timestamp,
}

/// Transparency log response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransparencyResponse {
    /// Entry count.
    pub count: usize,
    /// Entries, newest first.
    pub entries: Vec<TransparencyEntry>,
}

/// Build the access-requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/access-requests", post(file_request))
        .route("/v1/access-requests/:id/decision", post(decide_request))
        .route("/v1/access-requests/transparency", get(transparency_log))
}

/// POST /v1/access-requests — file a request (starts PENDING).
#[utoipa::path(
    post,
    path = "/v1/access-requests",
    request_body = CreateRequestBody,
    responses(
        (status = 200, description = "Filed request"),
        (status = 404, description = "Unknown consent type"),
        (status = 409, description = "Duplicate (organization, subject, consent-type) triple"),
        (status = 422, description = "Empty purpose"),
    ),
    tag = "access-requests"
)]
pub(crate) async fn file_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<AccessRequest>, AppError> {
    let organization = require_organization(&caller)?;
    let consent_type_id = ConsentTypeId::from_uuid(body.consent_type_id);
    if state.ledger.consent_type(&consent_type_id).is_none() {
        return Err(AppError::NotFound(format!("consent type {consent_type_id}")));
    }

    let request = state.access_log.file(
        organization,
        SubjectId::from_uuid(body.subject_id),
        consent_type_id,
        body.purpose,
        Timestamp::now(),
    )?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::access_requests::upsert(pool, &request).await {
            tracing::warn!(error = %e, "access request persistence failed");
        }
    }
    Ok(Json(request))
}

/// POST /v1/access-requests/{id}/decision — approve or revoke a request
/// as its subject.
#[utoipa::path(
    post,
    path = "/v1/access-requests/{id}/decision",
    params(("id" = Uuid, Path, description = "The request to decide")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Updated request"),
        (status = 403, description = "Caller is not the request's subject"),
        (status = 404, description = "Unknown request"),
    ),
    tag = "access-requests"
)]
pub(crate) async fn decide_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<AccessRequest>, AppError> {
    let subject = require_citizen(&caller)?;
    let request = state
        .access_log
        .decide(&RequestId::from_uuid(id), &subject, body.decision)?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::access_requests::upsert(pool, &request).await {
            tracing::warn!(error = %e, "access request persistence failed");
        }
    }
    Ok(Json(request))
}

/// GET /v1/access-requests/transparency — the caller's transparency
/// log: every organization request naming them, newest first.
#[utoipa::path(
    get,
    path = "/v1/access-requests/transparency",
    responses((status = 200, description = "Transparency log", body = TransparencyResponse)),
    tag = "access-requests"
)]
pub(crate) async fn transparency_log(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<TransparencyResponse>, AppError> {
    let subject = require_citizen(&caller)?;
    let entries: Vec<TransparencyEntry> = state
        .access_log
        .for_subject(&subject)
        .into_iter()
        .map(|r| TransparencyEntry {
            organization_name: state.directory.get(&r.organization).map(|o| o.name),
            consent_type: state.ledger.consent_type(&r.consent_type).map(|t| t.name),
            id: r.id,
            organization_id: r.organization,
            status: r.status,
            purpose: r.purpose,
            requested_at: r.requested_at,
        })
        .collect();

    Ok(Json(TransparencyResponse {
        count: entries.len(),
        entries,
    }))
}
