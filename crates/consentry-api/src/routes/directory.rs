//! # Organization Directory API
//!
//! The ingress for the organization-directory collaborator: staff
//! register and update organization records. The scoring path never
//! creates organizations — it only writes their trust snapshot.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use consentry_core::OrgId;
use consentry_trust::OrganizationRecord;

use crate::auth::{require_staff, CallerIdentity};
use crate::error::AppError;
use crate::state::AppState;

/// Request body for registering an organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterOrgBody {
    /// Identifier supplied by the directory collaborator; generated
    /// when absent.
    pub id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Public website.
    pub website: Option<String>,
}

/// Build the directory router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/organizations", post(register_org).get(list_orgs))
        .route("/v1/organizations/:id", get(get_org))
}

/// POST /v1/organizations — register or update an organization (staff).
#[utoipa::path(
    post,
    path = "/v1/organizations",
    request_body = RegisterOrgBody,
    responses(
        (status = 200, description = "Registered organization"),
        (status = 403, description = "Caller is not staff"),
        (status = 422, description = "Empty name or email"),
    ),
    tag = "directory"
)]
pub(crate) async fn register_org(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<RegisterOrgBody>,
) -> Result<Json<OrganizationRecord>, AppError> {
    require_staff(&caller)?;
    if body.name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(AppError::Validation(
            "organization name and email must not be empty".into(),
        ));
    }

    let id = body.id.map(OrgId::from_uuid).unwrap_or_default();
    // Preserve an existing trust snapshot on update.
    let mut record = state
        .directory
        .get(&id)
        .unwrap_or_else(|| OrganizationRecord::new(id.clone(), "", ""));
    record.name = body.name.trim().to_string();
    record.email = body.email.trim().to_string();
    record.website = body.website;
    state.directory.upsert(record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::organizations::upsert(pool, &record).await {
            tracing::warn!(error = %e, "organization persistence failed");
        }
    }
    Ok(Json(record))
}

/// GET /v1/organizations — list all organizations (staff).
#[utoipa::path(
    get,
    path = "/v1/organizations",
    responses((status = 200, description = "All organizations")),
    tag = "directory"
)]
pub(crate) async fn list_orgs(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<OrganizationRecord>>, AppError> {
    require_staff(&caller)?;
    Ok(Json(state.directory.list()))
}

/// GET /v1/organizations/{id} — one organization (staff).
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}",
    params(("id" = Uuid, Path, description = "Organization identifier")),
    responses(
        (status = 200, description = "Organization record"),
        (status = 404, description = "Unknown organization"),
    ),
    tag = "directory"
)]
pub(crate) async fn get_org(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganizationRecord>, AppError> {
    require_staff(&caller)?;
    let id = OrgId::from_uuid(id);
    state
        .directory
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("organization {id}")))
}
