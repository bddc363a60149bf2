//! # Transparency Reporting API
//!
//! Public, read-only aggregation over the ledger, the access log, the
//! audit store, and the trust snapshots. Pure reads — nothing here
//! mutates state or recomputes scores.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use consentry_core::Timestamp;
use consentry_trust::TrustLevel;

use crate::state::AppState;

/// Trailing window, in days, for the "recent" aggregates.
const REPORT_WINDOW_DAYS: i64 = 30;

/// Consent aggregates.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsentStats {
    /// Grants ever created.
    pub total: usize,
    /// Grants currently granted.
    pub active: usize,
    /// Grants currently revoked.
    pub revoked: usize,
    /// History entries within the window.
    pub changes_recent: usize,
}

/// Access-request aggregates.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestStats {
    /// Requests ever filed.
    pub total: usize,
    /// Requests currently approved.
    pub approved: usize,
    /// Requests currently revoked.
    pub revoked: usize,
    /// Requests filed within the window.
    pub filed_recent: usize,
}

/// Compliance aggregates.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComplianceStats {
    /// Audits ever recorded.
    pub total_audits: usize,
    /// Audits recorded within the window.
    pub audits_recent: usize,
    /// Open CRITICAL audits (pending or investigating).
    pub critical_open: usize,
    /// Audits resolved within the window.
    pub resolved_recent: usize,
}

/// One trust-level bucket of the distribution.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrustLevelBucket {
    /// The level.
    #[schema(value_type = String)]
    pub level: TrustLevel,
    /// Organizations currently cached at this level.
    pub count: usize,
}

/// A ranked entry of the cached top organizations.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopOrganization {
    /// Organization display name.
    pub name: String,
    /// Cached trust score (may be stale between recalculations).
    pub trust_score: f64,
    /// Cached trust level.
    #[schema(value_type = String)]
    pub trust_level: TrustLevel,
}

/// Trust aggregates, read from the cached snapshots.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrustStats {
    /// Mean cached score over organizations with a computed score.
    pub average_trust_score: f64,
    /// Distribution of cached levels.
    pub level_distribution: Vec<TrustLevelBucket>,
    /// Top cached organizations, best first.
    pub top_organizations: Vec<TopOrganization>,
}

/// The platform transparency report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransparencyReport {
    /// Registered organizations.
    pub organizations: usize,
    /// Registered consent types.
    pub consent_types: usize,
    /// Consent aggregates.
    pub consents: ConsentStats,
    /// Access-request aggregates.
    pub access_requests: RequestStats,
    /// Compliance aggregates.
    pub compliance: ComplianceStats,
    /// Trust aggregates.
    pub trust: TrustStats,
    /// When the report was generated.
    #[schema(value_type = String)]
    pub generated_at: Timestamp,
}

/// Build the reports router (mounted outside the auth middleware).
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/reports/transparency", get(transparency_report))
}

/// GET /v1/reports/transparency — platform-wide aggregates.
#[utoipa::path(
    get,
    path = "/v1/reports/transparency",
    responses((status = 200, description = "Transparency report", body = TransparencyReport)),
    tag = "reports"
)]
pub(crate) async fn transparency_report(State(state): State<AppState>) -> Json<TransparencyReport> {
    let now = Timestamp::now();
    let window_start = now.minus_days(REPORT_WINDOW_DAYS);

    let (total_grants, active_grants) = state.ledger.grant_counts();
    let (total_requests, approved, revoked, filed_recent) =
        state.access_log.platform_counts(window_start);
    let (total_audits, audits_recent, critical_open, resolved_recent) =
        state.audit_store.platform_stats(window_start);

    let organizations = state.directory.list();
    let scored: Vec<_> = organizations
        .iter()
        .filter(|o| o.last_calculated.is_some())
        .collect();
    let average_trust_score = if scored.is_empty() {
        0.0
    } else {
        let sum: f64 = scored.iter().map(|o| o.trust_score).sum();
        (sum / scored.len() as f64 * 100.0).round() / 100.0
    };

    let mut level_distribution: Vec<TrustLevelBucket> = [
        TrustLevel::Excellent,
        TrustLevel::Verified,
        TrustLevel::Good,
        TrustLevel::Basic,
        TrustLevel::Low,
    ]
    .into_iter()
    .map(|level| TrustLevelBucket {
        level,
        count: scored.iter().filter(|o| o.trust_level == level).count(),
    })
    .collect();
    level_distribution.retain(|bucket| bucket.count > 0);

    let mut top = scored.clone();
    top.sort_by(|a, b| {
        b.trust_score
            .partial_cmp(&a.trust_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let top_organizations = top
        .into_iter()
        .take(10)
        .map(|o| TopOrganization {
            name: o.name.clone(),
            trust_score: o.trust_score,
            trust_level: o.trust_level,
        })
        .collect();

    Json(TransparencyReport {
        organizations: organizations.len(),
        consent_types: state.ledger.list_types().len(),
        consents: ConsentStats {
            total: total_grants,
            active: active_grants,
            revoked: total_grants - active_grants,
            changes_recent: state.ledger.changes_since(window_start),
        },
        access_requests: RequestStats {
            total: total_requests,
            approved,
            revoked,
            filed_recent,
        },
        compliance: ComplianceStats {
            total_audits,
            audits_recent,
            critical_open,
            resolved_recent,
        },
        trust: TrustStats {
            average_trust_score,
            level_distribution,
            top_organizations,
        },
        generated_at: now,
    })
}
