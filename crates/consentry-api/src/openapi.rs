//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Consentry API",
        version = "0.3.0",
        description = "Consent-management platform: consent ledger, access-request lifecycle, compliance scans, trust registry, and transparency reporting.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Consents
        crate::routes::consents::list_types,
        crate::routes::consents::create_type,
        crate::routes::consents::consent_status,
        crate::routes::consents::toggle_consent,
        crate::routes::consents::consent_history,
        crate::routes::consents::check_expiry,
        // Access requests
        crate::routes::requests::file_request,
        crate::routes::requests::decide_request,
        crate::routes::requests::transparency_log,
        // Compliance
        crate::routes::compliance::run_scan,
        crate::routes::compliance::scan_window,
        crate::routes::compliance::own_report,
        crate::routes::compliance::report_for,
        crate::routes::compliance::audit_detail,
        crate::routes::compliance::patch_audit,
        // Trust
        crate::routes::trust::registry,
        crate::routes::trust::score_for,
        crate::routes::trust::own_score,
        crate::routes::trust::own_integrity,
        // Directory
        crate::routes::directory::register_org,
        crate::routes::directory::list_orgs,
        crate::routes::directory::get_org,
        // Reports
        crate::routes::reports::transparency_report,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::consents::CreateConsentTypeRequest,
        crate::routes::consents::ToggleResponse,
        crate::routes::consents::HistoryResponse,
        crate::routes::requests::CreateRequestBody,
        crate::routes::requests::DecisionBody,
        crate::routes::requests::TransparencyEntry,
        crate::routes::requests::TransparencyResponse,
        crate::routes::compliance::ScanResponse,
        crate::routes::compliance::ScanWindowResponse,
        crate::routes::compliance::ReportResponse,
        crate::routes::compliance::AuditStatusBody,
        crate::routes::trust::RegistryResponse,
        crate::routes::trust::TrustScoreResponse,
        crate::routes::directory::RegisterOrgBody,
        crate::routes::reports::TransparencyReport,
        crate::routes::reports::ConsentStats,
        crate::routes::reports::RequestStats,
        crate::routes::reports::ComplianceStats,
        crate::routes::reports::TrustStats,
        crate::routes::reports::TrustLevelBucket,
        crate::routes::reports::TopOrganization,
    ))
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
