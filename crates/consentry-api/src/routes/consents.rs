//! # Consent API
//!
//! The citizen-facing consent surface: consent-type listing and
//! registration, per-type status, the grant/revoke toggle, history
//! queries, and the expiry check.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use consentry_core::{ConsentTypeId, Timestamp};
use consentry_ledger::{ConsentHistoryEntry, ConsentStatus, ConsentType, ExpirySweep};

use crate::auth::{require_citizen, require_staff, CallerIdentity};
use crate::error::AppError;
use crate::notify::ConsentChangeEvent;
use crate::state::AppState;

/// Request body for registering a consent type.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConsentTypeRequest {
    /// Display name of the data category.
    pub name: String,
}

/// Response to a consent toggle.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ToggleResponse {
    /// The consent type's display name.
    pub consent_type: String,
    /// The new access value.
    pub access: bool,
    /// Human-readable confirmation.
    pub message: String,
}

/// Query parameters for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Restrict history to one consent type.
    pub consent_type_id: Option<Uuid>,
}

/// History response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    /// Entry count.
    pub count: usize,
    /// Entries, newest first.
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<ConsentHistoryEntry>,
}

/// Build the consents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/consent-types", get(list_types).post(create_type))
        .route("/v1/consents/status", get(consent_status))
        .route("/v1/consents/:consent_type_id/toggle", post(toggle_consent))
        .route("/v1/consents/history", get(consent_history))
        .route("/v1/consents/expiry", get(check_expiry))
}

/// GET /v1/consent-types — list all registered consent types.
#[utoipa::path(
    get,
    path = "/v1/consent-types",
    responses((status = 200, description = "All consent types")),
    tag = "consents"
)]
pub(crate) async fn list_types(
    State(state): State<AppState>,
    _caller: CallerIdentity,
) -> Json<Vec<ConsentType>> {
    Json(state.ledger.list_types())
}

/// POST /v1/consent-types — register a consent type (staff only).
///
/// Types are immutable once created.
#[utoipa::path(
    post,
    path = "/v1/consent-types",
    request_body = CreateConsentTypeRequest,
    responses(
        (status = 200, description = "Registered consent type"),
        (status = 403, description = "Caller is not staff"),
        (status = 422, description = "Empty name"),
    ),
    tag = "consents"
)]
pub(crate) async fn create_type(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<CreateConsentTypeRequest>,
) -> Result<Json<ConsentType>, AppError> {
    require_staff(&caller)?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("consent type name must not be empty".into()));
    }

    let consent_type = state.ledger.register_type(name, Timestamp::now());
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::consents::insert_type(pool, &consent_type).await {
            tracing::warn!(error = %e, "consent type persistence failed");
        }
    }
    Ok(Json(consent_type))
}

/// GET /v1/consents/status — the caller's access flag per consent type.
#[utoipa::path(
    get,
    path = "/v1/consents/status",
    responses(
        (status = 200, description = "Per-type consent status"),
        (status = 403, description = "Caller is not a citizen"),
    ),
    tag = "consents"
)]
pub(crate) async fn consent_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ConsentStatus>>, AppError> {
    let subject = require_citizen(&caller)?;
    Ok(Json(state.ledger.status_for(&subject)))
}

/// POST /v1/consents/{consent_type_id}/toggle — flip the caller's grant.
///
/// Organizations holding approved requests for the flipped pair are
/// notified fire-and-forget; delivery failures never affect the
/// response.
#[utoipa::path(
    post,
    path = "/v1/consents/{consent_type_id}/toggle",
    params(("consent_type_id" = Uuid, Path, description = "Consent type to toggle")),
    responses(
        (status = 200, description = "Toggled", body = ToggleResponse),
        (status = 404, description = "Unknown consent type"),
    ),
    tag = "consents"
)]
pub(crate) async fn toggle_consent(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(consent_type_id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, AppError> {
    let subject = require_citizen(&caller)?;
    let consent_type_id = ConsentTypeId::from_uuid(consent_type_id);
    let consent_type = state
        .ledger
        .consent_type(&consent_type_id)
        .ok_or_else(|| AppError::NotFound(format!("consent type {consent_type_id}")))?;

    let now = Timestamp::now();
    let transition =
        state
            .ledger
            .toggle(&subject, &consent_type_id, Some(subject.clone()), now)?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::consents::upsert_grant(pool, &transition.grant).await {
            tracing::warn!(error = %e, "grant persistence failed");
        }
        if let Err(e) = crate::db::consents::insert_history(pool, &transition.entry).await {
            tracing::warn!(error = %e, "history persistence failed");
        }
    }

    let affected_organizations: Vec<_> = state
        .access_log
        .approved_for_pair(&subject, &consent_type_id)
        .into_iter()
        .map(|r| r.organization)
        .collect();
    state.notifier.consent_changed(ConsentChangeEvent {
        subject,
        consent_type: consent_type.name.clone(),
        granted: transition.grant.access,
        affected_organizations,
        changed_at: now,
    });

    let action = if transition.grant.access {
        "granted"
    } else {
        "revoked"
    };
    Ok(Json(ToggleResponse {
        consent_type: consent_type.name,
        access: transition.grant.access,
        message: format!("Consent {action}"),
    }))
}

/// GET /v1/consents/history — the caller's consent history, newest
/// first, optionally restricted to one consent type.
#[utoipa::path(
    get,
    path = "/v1/consents/history",
    params(("consent_type_id" = Option<Uuid>, Query, description = "Restrict to one consent type")),
    responses((status = 200, description = "Consent history", body = HistoryResponse)),
    tag = "consents"
)]
pub(crate) async fn consent_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let subject = require_citizen(&caller)?;
    let consent_type_id = params.consent_type_id.map(ConsentTypeId::from_uuid);
    let history = state
        .ledger
        .history_for(&subject, consent_type_id.as_ref());
    Ok(Json(HistoryResponse {
        count: history.len(),
        history,
    }))
}

/// GET /v1/consents/expiry — expire the caller's overdue grants and
/// report upcoming expiries.
///
/// Overdue active grants are force-revoked (with history); grants
/// within the warning window are reported untouched.
#[utoipa::path(
    get,
    path = "/v1/consents/expiry",
    responses((status = 200, description = "Expired and expiring-soon grants")),
    tag = "consents"
)]
pub(crate) async fn check_expiry(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ExpirySweep>, AppError> {
    let subject = require_citizen(&caller)?;
    let now = Timestamp::now();
    let sweep = state.ledger.check_expiry_for(&subject, now);

    if let Some(pool) = &state.db_pool {
        for expired in &sweep.expired {
            if let Some(grant) = state.ledger.grant(&expired.subject, &expired.consent_type) {
                if let Err(e) = crate::db::consents::upsert_grant(pool, &grant).await {
                    tracing::warn!(error = %e, "expired grant persistence failed");
                }
            }
        }
    }
    Ok(Json(sweep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use consentry_core::SubjectId;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app_with(identity: CallerIdentity, state: AppState) -> Router {
        router().layer(axum::Extension(identity)).with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_types_returns_registered_types() {
        let state = AppState::new();
        state.ledger.register_type("location", Timestamp::now());
        let app = app_with(CallerIdentity::staff(), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/consent-types")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let types: Vec<ConsentType> = body_json(resp).await;
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "location");
    }

    #[tokio::test]
    async fn create_type_requires_staff() {
        let state = AppState::new();
        let app = app_with(CallerIdentity::citizen(SubjectId::new()), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/consent-types")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"health"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_type_rejects_empty_name() {
        let state = AppState::new();
        let app = app_with(CallerIdentity::staff(), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/consent-types")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn toggle_flips_and_reports() {
        let state = AppState::new();
        let ct = state.ledger.register_type("location", Timestamp::now());
        let subject = SubjectId::new();
        let app = app_with(CallerIdentity::citizen(subject.clone()), state.clone());

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/consents/{}/toggle", ct.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ToggleResponse = body_json(resp).await;
        assert!(body.access);
        assert_eq!(body.consent_type, "location");

        // Second toggle revokes.
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/consents/{}/toggle", ct.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: ToggleResponse = body_json(resp).await;
        assert!(!body.access);
    }

    #[tokio::test]
    async fn toggle_unknown_type_is_404() {
        let state = AppState::new();
        let app = app_with(CallerIdentity::citizen(SubjectId::new()), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/consents/{}/toggle", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn toggle_requires_citizen_role() {
        let state = AppState::new();
        let ct = state.ledger.register_type("location", Timestamp::now());
        let app = app_with(
            CallerIdentity::organization(consentry_core::OrgId::new()),
            state,
        );

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/consents/{}/toggle", ct.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn history_counts_toggles() {
        let state = AppState::new();
        let ct = state.ledger.register_type("location", Timestamp::now());
        let subject = SubjectId::new();
        let app = app_with(CallerIdentity::citizen(subject.clone()), state.clone());

        for _ in 0..3 {
            app.clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/v1/consents/{}/toggle", ct.id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
        }

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/consents/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: HistoryResponse = body_json(resp).await;
        assert_eq!(body.count, 3);
    }

    #[tokio::test]
    async fn status_reports_all_types() {
        let state = AppState::new();
        state.ledger.register_type("location", Timestamp::now());
        state.ledger.register_type("health", Timestamp::now());
        let app = app_with(CallerIdentity::citizen(SubjectId::new()), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/consents/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let statuses: Vec<ConsentStatus> = body_json(resp).await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.access));
    }

    #[tokio::test]
    async fn expiry_endpoint_returns_sweep() {
        let state = AppState::new();
        let app = app_with(CallerIdentity::citizen(SubjectId::new()), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/consents/expiry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let sweep: ExpirySweep = body_json(resp).await;
        assert!(sweep.expired.is_empty());
        assert!(sweep.expiring_soon.is_empty());
    }
}
