//! # Compliance API
//!
//! The scan surface: run a scan (rule evaluation + idempotent
//! recording), read the persisted window view, fetch report statistics,
//! and transition audit lifecycle status.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use consentry_compliance::{
    AuditStatus, ComplianceAudit, ReportStatistics, ViolationReport,
};
use consentry_core::{AuditId, OrgId, Timestamp};

use crate::auth::{require_organization, CallerIdentity};
use crate::error::AppError;
use crate::notify::ViolationEvent;
use crate::state::AppState;

/// Number of records returned by the window view.
const WINDOW_VIEW_LIMIT: usize = 10;

/// Response to a scan run.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanResponse {
    /// Severity-weighted risk score, capped at 100.
    pub risk_score: u32,
    /// Total findings this scan.
    pub total_violations: usize,
    /// CRITICAL findings.
    pub critical_count: usize,
    /// HIGH findings.
    pub high_count: usize,
    /// MEDIUM findings.
    pub medium_count: usize,
    /// Audits created (window-suppressed duplicates excluded).
    pub audits_created: usize,
    /// Violation reports created.
    pub violations_created: usize,
    /// The created audit records.
    #[schema(value_type = Vec<Object>)]
    pub audits: Vec<ComplianceAudit>,
    /// The created violation reports.
    #[schema(value_type = Vec<Object>)]
    pub violations: Vec<ViolationReport>,
}

/// The persisted window view returned by `GET /v1/compliance/scan`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanWindowResponse {
    /// Risk recomputed over PENDING audits within the window.
    pub risk_score: u32,
    /// PENDING audits within the window.
    pub total_violations: usize,
    /// PENDING CRITICAL audits.
    pub critical_count: usize,
    /// PENDING HIGH audits.
    pub high_count: usize,
    /// PENDING MEDIUM audits.
    pub medium_count: usize,
    /// Most recent audits within the window.
    #[schema(value_type = Vec<Object>)]
    pub audits: Vec<ComplianceAudit>,
    /// Most recent violation reports within the window.
    #[schema(value_type = Vec<Object>)]
    pub violations: Vec<ViolationReport>,
}

/// Compliance report response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportResponse {
    /// The organization reported on.
    #[schema(value_type = String)]
    pub organization_id: OrgId,
    /// Aggregate statistics over the window.
    #[schema(value_type = Object)]
    pub statistics: ReportStatistics,
    /// Audits within the window.
    #[schema(value_type = Vec<Object>)]
    pub audits: Vec<ComplianceAudit>,
    /// Violation reports within the window.
    #[schema(value_type = Vec<Object>)]
    pub violations: Vec<ViolationReport>,
}

/// Request body for an audit status transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuditStatusBody {
    /// Target status (PENDING, INVESTIGATING, RESOLVED, or IGNORED).
    pub status: String,
}

/// Build the compliance router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/compliance/scan", post(run_scan).get(scan_window))
        .route("/v1/compliance/reports", get(own_report))
        .route("/v1/compliance/reports/:org_id", get(report_for))
        .route(
            "/v1/compliance/audits/:id",
            get(audit_detail).patch(patch_audit),
        )
}

/// POST /v1/compliance/scan — run all catalog rules for the caller's
/// organization and record the findings idempotently.
///
/// A failure anywhere in evaluation fails the whole request; a partial
/// scan could under-report risk.
#[utoipa::path(
    post,
    path = "/v1/compliance/scan",
    responses(
        (status = 200, description = "Scan outcome", body = ScanResponse),
        (status = 403, description = "Caller is not an organization"),
    ),
    tag = "compliance"
)]
pub(crate) async fn run_scan(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ScanResponse>, AppError> {
    let organization = require_organization(&caller)?;
    let now = Timestamp::now();

    let outcome = state.compliance_engine.run_all_checks(
        &organization,
        &state.access_log,
        &state.ledger,
        now,
    );
    let recorded = state.audit_store.record_scan(
        &organization,
        &outcome.findings,
        state.compliance_engine.catalog(),
        now,
    );

    if let Some(pool) = &state.db_pool {
        for audit in &recorded.audits {
            if let Err(e) = crate::db::audits::insert_audit(pool, audit).await {
                tracing::warn!(error = %e, "audit persistence failed");
            }
        }
        for violation in &recorded.violations {
            if let Err(e) = crate::db::audits::insert_violation(pool, violation).await {
                tracing::warn!(error = %e, "violation persistence failed");
            }
        }
    }

    // Violation alerts are fire-and-forget; failures never fail the scan.
    for violation in &recorded.violations {
        state.notifier.violation_recorded(ViolationEvent {
            organization: violation.organization.clone(),
            violation_type: violation.violation_type.as_str().to_string(),
            reported_to_oversight: violation.reported_to_oversight,
            detected_at: violation.detected_at,
        });
    }

    Ok(Json(ScanResponse {
        risk_score: outcome.risk_score,
        total_violations: outcome.total_violations,
        critical_count: outcome.critical_count,
        high_count: outcome.high_count,
        medium_count: outcome.medium_count,
        audits_created: recorded.audits_created(),
        violations_created: recorded.violations_created(),
        audits: recorded.audits,
        violations: recorded.violations,
    }))
}

/// GET /v1/compliance/scan — the persisted window view, with risk
/// recomputed over PENDING audits.
#[utoipa::path(
    get,
    path = "/v1/compliance/scan",
    responses(
        (status = 200, description = "Window view", body = ScanWindowResponse),
        (status = 403, description = "Caller is not an organization"),
    ),
    tag = "compliance"
)]
pub(crate) async fn scan_window(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ScanWindowResponse>, AppError> {
    let organization = require_organization(&caller)?;
    let now = Timestamp::now();
    let catalog = state.compliance_engine.catalog();

    let risk_score = state
        .audit_store
        .risk_over_pending(&organization, catalog, now);
    let (critical_count, high_count, medium_count) = state
        .audit_store
        .pending_severity_counts(&organization, now);

    let mut audits = state.audit_store.audits_in_window(&organization, now);
    let total_violations = audits
        .iter()
        .filter(|a| a.status == AuditStatus::Pending)
        .count();
    audits.truncate(WINDOW_VIEW_LIMIT);

    let mut violations = state.audit_store.violations_in_window(&organization, now);
    violations.truncate(WINDOW_VIEW_LIMIT);

    Ok(Json(ScanWindowResponse {
        risk_score,
        total_violations,
        critical_count,
        high_count,
        medium_count,
        audits,
        violations,
    }))
}

/// GET /v1/compliance/reports — the caller's own report.
#[utoipa::path(
    get,
    path = "/v1/compliance/reports",
    responses((status = 200, description = "Compliance report", body = ReportResponse)),
    tag = "compliance"
)]
pub(crate) async fn own_report(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ReportResponse>, AppError> {
    let organization = require_organization(&caller)?;
    Ok(Json(build_report(&state, organization)))
}

/// GET /v1/compliance/reports/{org_id} — a specific organization's
/// report. Organizations may only read their own; staff may read any.
#[utoipa::path(
    get,
    path = "/v1/compliance/reports/{org_id}",
    params(("org_id" = Uuid, Path, description = "Organization to report on")),
    responses(
        (status = 200, description = "Compliance report", body = ReportResponse),
        (status = 403, description = "Caller may not read this organization's report"),
    ),
    tag = "compliance"
)]
pub(crate) async fn report_for(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ReportResponse>, AppError> {
    let target = OrgId::from_uuid(org_id);
    if !caller.is_staff() {
        let own = require_organization(&caller)?;
        if own != target {
            return Err(AppError::Forbidden(
                "organizations may only read their own compliance report".into(),
            ));
        }
    }
    Ok(Json(build_report(&state, target)))
}

fn build_report(state: &AppState, organization: OrgId) -> ReportResponse {
    let now = Timestamp::now();
    ReportResponse {
        statistics: state.audit_store.statistics(&organization, now),
        audits: state.audit_store.audits_in_window(&organization, now),
        violations: state.audit_store.violations_in_window(&organization, now),
        organization_id: organization,
    }
}

/// GET /v1/compliance/audits/{id} — audit detail, scoped to the
/// caller's organization.
#[utoipa::path(
    get,
    path = "/v1/compliance/audits/{id}",
    params(("id" = Uuid, Path, description = "Audit identifier")),
    responses(
        (status = 200, description = "Audit detail"),
        (status = 404, description = "Unknown audit (or another organization's)"),
    ),
    tag = "compliance"
)]
pub(crate) async fn audit_detail(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ComplianceAudit>, AppError> {
    let organization = require_organization(&caller)?;
    let audit = state
        .audit_store
        .audit_for_org(&AuditId::from_uuid(id), &organization)?;
    Ok(Json(audit))
}

/// PATCH /v1/compliance/audits/{id} — transition an audit's status.
///
/// Only values in the defined status set are accepted; RESOLVED stamps
/// `resolved_at`. An invalid transition is rejected whole, never
/// partially applied.
#[utoipa::path(
    patch,
    path = "/v1/compliance/audits/{id}",
    params(("id" = Uuid, Path, description = "Audit identifier")),
    request_body = AuditStatusBody,
    responses(
        (status = 200, description = "Updated audit"),
        (status = 404, description = "Unknown audit"),
        (status = 422, description = "Status outside the defined set"),
    ),
    tag = "compliance"
)]
pub(crate) async fn patch_audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    Json(body): Json<AuditStatusBody>,
) -> Result<Json<ComplianceAudit>, AppError> {
    let organization = require_organization(&caller)?;
    let status = AuditStatus::parse(&body.status)?;
    let audit = state.audit_store.update_status(
        &AuditId::from_uuid(id),
        &organization,
        status,
        Timestamp::now(),
    )?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::audits::update_audit_status(pool, &audit).await {
            tracing::warn!(error = %e, "audit status persistence failed");
        }
    }
    Ok(Json(audit))
}
