//! # Trust Registry API
//!
//! Public rankings and per-organization trust scores, plus the
//! authenticated own-score and integrity endpoints. Score reads always
//! recompute and persist the refreshed snapshot (including the
//! certificate transition) — the cached snapshot on the organization
//! record is only a read cache for external display.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use consentry_core::{OrgId, Timestamp};
use consentry_trust::{
    integrity, CertificateTransition, IntegrityReport, RankedOrganization, TrustComponents,
    TrustLevel,
};

use crate::auth::{require_organization, CallerIdentity};
use crate::error::AppError;
use crate::state::AppState;

/// Default ranking size when the caller does not supply a limit.
const DEFAULT_RANKING_LIMIT: usize = 10;

/// Query parameters for the registry endpoint.
#[derive(Debug, Deserialize)]
pub struct RegistryParams {
    /// Maximum entries to return (clamped server-side).
    pub limit: Option<usize>,
}

/// Registry response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistryResponse {
    /// Entry count.
    pub count: usize,
    /// Ranked organizations, best first.
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<RankedOrganization>,
}

/// A trust score response with organization context and certificate
/// state.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrustScoreResponse {
    /// Organization identifier.
    #[schema(value_type = String)]
    pub organization_id: OrgId,
    /// Organization display name.
    pub organization_name: String,
    /// Freshly recomputed overall score.
    pub trust_score: f64,
    /// Band containing the score.
    #[schema(value_type = String)]
    pub trust_level: TrustLevel,
    /// Component breakdown.
    #[schema(value_type = Object)]
    pub components: TrustComponents,
    /// Whether a certificate is currently issued.
    pub certificate_issued: bool,
    /// When the current certificate was issued.
    #[schema(value_type = Option<String>)]
    pub certificate_issued_at: Option<Timestamp>,
    /// What the certificate did during this recompute.
    #[schema(value_type = String)]
    pub certificate_transition: CertificateTransition,
    /// When the score was computed.
    #[schema(value_type = String)]
    pub last_calculated: Timestamp,
    /// Integrity report (own-score endpoint only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data_integrity: Option<IntegrityReport>,
}

/// Build the public trust router (mounted outside the auth middleware).
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/v1/trust/registry", get(registry))
        .route("/v1/trust/score/:org_id", get(score_for))
}

/// Build the authenticated trust router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/trust/score", get(own_score))
        .route("/v1/trust/integrity", get(own_integrity))
}

/// GET /v1/trust/registry — ranked organizations by trust score.
///
/// Recomputes every organization's score; the limit is clamped
/// server-side to bound cost.
#[utoipa::path(
    get,
    path = "/v1/trust/registry",
    params(("limit" = Option<usize>, Query, description = "Maximum entries (clamped to 100)")),
    responses((status = 200, description = "Ranked organizations", body = RegistryResponse)),
    tag = "trust"
)]
pub(crate) async fn registry(
    State(state): State<AppState>,
    Query(params): Query<RegistryParams>,
) -> Result<Json<RegistryResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_RANKING_LIMIT);
    if limit == 0 {
        return Err(consentry_core::ValidationError::ZeroLimit.into());
    }

    let results = state.trust_engine.rank(
        &state.directory,
        &state.access_log,
        &state.ledger,
        &state.audit_store,
        limit,
        Timestamp::now(),
    );
    Ok(Json(RegistryResponse {
        count: results.len(),
        results,
    }))
}

/// GET /v1/trust/score/{org_id} — recompute and return one
/// organization's trust score (public).
#[utoipa::path(
    get,
    path = "/v1/trust/score/{org_id}",
    params(("org_id" = Uuid, Path, description = "Organization to score")),
    responses(
        (status = 200, description = "Trust score snapshot", body = TrustScoreResponse),
        (status = 404, description = "Unknown organization"),
    ),
    tag = "trust"
)]
pub(crate) async fn score_for(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<TrustScoreResponse>, AppError> {
    let organization = OrgId::from_uuid(org_id);
    compute_and_persist(&state, organization, false).await.map(Json)
}

/// GET /v1/trust/score — the caller organization's own score, with the
/// integrity report attached.
#[utoipa::path(
    get,
    path = "/v1/trust/score",
    responses(
        (status = 200, description = "Own trust score", body = TrustScoreResponse),
        (status = 403, description = "Caller is not an organization"),
    ),
    tag = "trust"
)]
pub(crate) async fn own_score(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<TrustScoreResponse>, AppError> {
    let organization = require_organization(&caller)?;
    compute_and_persist(&state, organization, true).await.map(Json)
}

/// GET /v1/trust/integrity — the caller organization's data-integrity
/// report.
#[utoipa::path(
    get,
    path = "/v1/trust/integrity",
    responses(
        (status = 200, description = "Integrity report"),
        (status = 403, description = "Caller is not an organization"),
    ),
    tag = "trust"
)]
pub(crate) async fn own_integrity(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<IntegrityReport>, AppError> {
    let organization = require_organization(&caller)?;
    Ok(Json(integrity::verify_organization(
        &state.access_log,
        &organization,
        Timestamp::now(),
    )))
}

/// Recompute, apply the snapshot atomically, mirror to the database,
/// and build the response.
pub(crate) async fn compute_and_persist(
    state: &AppState,
    organization: OrgId,
    with_integrity: bool,
) -> Result<TrustScoreResponse, AppError> {
    // 404 before computing anything for an unknown organization.
    if state.directory.get(&organization).is_none() {
        return Err(AppError::NotFound(format!("organization {organization}")));
    }

    let now = Timestamp::now();
    let score = state.trust_engine.calculate(
        &organization,
        &state.access_log,
        &state.ledger,
        &state.audit_store,
        now,
    );
    let (record, transition) = state.directory.apply_score(&organization, &score)?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::organizations::upsert(pool, &record).await {
            tracing::warn!(error = %e, "organization snapshot persistence failed");
        }
    }

    let data_integrity = with_integrity.then(|| {
        integrity::verify_organization(&state.access_log, &organization, now)
    });

    Ok(TrustScoreResponse {
        organization_id: record.id,
        organization_name: record.name,
        trust_score: score.overall_score,
        trust_level: score.trust_level,
        components: score.components,
        certificate_issued: record.certificate_issued,
        certificate_issued_at: record.certificate_issued_at,
        certificate_transition: transition,
        last_calculated: score.calculated_at,
        data_integrity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use consentry_core::SubjectId;
    use consentry_ledger::RequestDecision;
    use consentry_trust::OrganizationRecord;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn public_app(state: AppState) -> Router {
        public_router().with_state(state)
    }

    fn authed_app(identity: CallerIdentity, state: AppState) -> Router {
        router().layer(axum::Extension(identity)).with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn seed_org(state: &AppState, name: &str) -> OrgId {
        let id = OrgId::new();
        state.directory.upsert(OrganizationRecord::new(
            id.clone(),
            name,
            format!("{}@example.com", name.to_lowercase().replace(' ', "-")),
        ));
        id
    }

    #[tokio::test]
    async fn score_unknown_org_is_404() {
        let app = public_app(AppState::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/trust/score/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clean_org_scores_excellent_and_gets_certificate() {
        let state = AppState::new();
        let org = seed_org(&state, "Clean Co");
        let app = public_app(state.clone());

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/trust/score/{org}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: TrustScoreResponse = body_json(resp).await;
        assert_eq!(body.trust_score, 99.25);
        assert_eq!(body.trust_level, TrustLevel::Excellent);
        assert_eq!(body.certificate_transition, CertificateTransition::Issued);
        assert!(body.certificate_issued);

        // The snapshot was persisted.
        let record = state.directory.get(&org).unwrap();
        assert_eq!(record.trust_score, 99.25);
        assert!(record.certificate_issued);
    }

    #[tokio::test]
    async fn certificate_clears_when_score_drops() {
        let state = AppState::new();
        let org = seed_org(&state, "Shaky Co");
        let app = public_app(state.clone());

        // First read: clean, certificate issued.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/trust/score/{org}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: TrustScoreResponse = body_json(resp).await;
        assert!(body.certificate_issued);

        // Degrade: approved requests without any consent grant, plus
        // unresolved breach violations.
        let now = Timestamp::now();
        for i in 0..4 {
            let subject = SubjectId::new();
            let ct = state.ledger.register_type(format!("category-{i}"), now);
            let r = state
                .access_log
                .file(org.clone(), subject.clone(), ct.id, "general", now)
                .unwrap();
            state
                .access_log
                .decide(&r.id, &subject, RequestDecision::Approve)
                .unwrap();
        }
        for _ in 0..8 {
            state
                .audit_store
                .restore_violation(consentry_compliance::ViolationReport {
                    id: consentry_core::ViolationId::new(),
                    organization: org.clone(),
                    violation_type: consentry_compliance::ViolationType::PrivacyBreach,
                    description: "breach".to_string(),
                    affected_users_count: 1,
                    detected_at: now,
                    reported_to_oversight: true,
                    resolved: false,
                    related_audit: None,
                });
        }

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/trust/score/{org}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: TrustScoreResponse = body_json(resp).await;
        assert!(body.trust_score < 75.0);
        assert_eq!(body.certificate_transition, CertificateTransition::Cleared);
        assert!(!body.certificate_issued);
        assert!(body.certificate_issued_at.is_none());
    }

    #[tokio::test]
    async fn registry_ranks_descending() {
        let state = AppState::new();
        seed_org(&state, "Clean Co");
        let dirty = seed_org(&state, "Dirty Co");
        let now = Timestamp::now();
        let subject = SubjectId::new();
        let ct = state.ledger.register_type("location", now);
        let r = state
            .access_log
            .file(dirty, subject.clone(), ct.id, "general", now)
            .unwrap();
        state
            .access_log
            .decide(&r.id, &subject, RequestDecision::Approve)
            .unwrap();

        let app = public_app(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/trust/registry?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: RegistryResponse = body_json(resp).await;
        assert_eq!(body.count, 2);
        assert_eq!(body.results[0].name, "Clean Co");
        assert!(body.results[0].trust_score >= body.results[1].trust_score);
    }

    #[tokio::test]
    async fn registry_rejects_zero_limit() {
        let app = public_app(AppState::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/trust/registry?limit=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn own_score_includes_integrity_report() {
        let state = AppState::new();
        let org = seed_org(&state, "Acme Data Ltd");
        let app = authed_app(CallerIdentity::organization(org), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/trust/score")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: TrustScoreResponse = body_json(resp).await;
        assert!(body.data_integrity.is_some());
    }

    #[tokio::test]
    async fn own_score_requires_organization_role() {
        let state = AppState::new();
        let app = authed_app(CallerIdentity::citizen(SubjectId::new()), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/trust/score")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn integrity_endpoint_reports_clean_org() {
        let state = AppState::new();
        let org = seed_org(&state, "Acme Data Ltd");
        let app = authed_app(CallerIdentity::organization(org), state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/trust/integrity")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report: IntegrityReport = body_json(resp).await;
        assert_eq!(report.total_requests, 0);
        assert!(report.issues.is_empty());
    }
}
