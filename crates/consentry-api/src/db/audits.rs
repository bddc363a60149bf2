//! Compliance audit and violation report persistence.
//!
//! Inserts compute the idempotency `window_bucket` from `detected_at`
//! and rely on `ON CONFLICT DO NOTHING` against the unique indexes, so
//! concurrent scans across processes cannot create duplicate rows for
//! the same (organization, rule, window) or (organization,
//! violation-type, window).

use chrono::{DateTime, Utc};
use consentry_compliance::{AuditStatus, ComplianceAudit, ViolationReport, ViolationType};
use consentry_core::{AuditId, OrgId, Severity, Timestamp, ViolationId};
use sqlx::PgPool;
use uuid::Uuid;

use super::window_bucket;

/// Insert an audit record; silently skipped on window conflict.
pub async fn insert_audit(pool: &PgPool, audit: &ComplianceAudit) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO compliance_audits (id, organization_id, rule_name, rule_description,
         severity, status, detected_at, resolved_at, details, recommendation, window_bucket)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (organization_id, rule_name, window_bucket) DO NOTHING",
    )
    .bind(audit.id.as_uuid())
    .bind(audit.organization.as_uuid())
    .bind(&audit.rule_name)
    .bind(&audit.rule_description)
    .bind(audit.severity.as_str())
    .bind(audit.status.as_str())
    .bind(audit.detected_at.as_datetime())
    .bind(audit.resolved_at.map(|t| *t.as_datetime()))
    .bind(&audit.details)
    .bind(&audit.recommendation)
    .bind(window_bucket(&audit.detected_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a violation report; silently skipped on window conflict.
pub async fn insert_violation(
    pool: &PgPool,
    report: &ViolationReport,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO violation_reports (id, organization_id, violation_type, description,
         affected_users_count, detected_at, reported_to_oversight, resolved, related_audit,
         window_bucket)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (organization_id, violation_type, window_bucket) DO NOTHING",
    )
    .bind(report.id.as_uuid())
    .bind(report.organization.as_uuid())
    .bind(report.violation_type.as_str())
    .bind(&report.description)
    .bind(report.affected_users_count as i32)
    .bind(report.detected_at.as_datetime())
    .bind(report.reported_to_oversight)
    .bind(report.resolved)
    .bind(report.related_audit.as_ref().map(|a| *a.as_uuid()))
    .bind(window_bucket(&report.detected_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Mirror an audit status transition.
pub async fn update_audit_status(
    pool: &PgPool,
    audit: &ComplianceAudit,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE compliance_audits SET status = $1, resolved_at = $2 WHERE id = $3",
    )
    .bind(audit.status.as_str())
    .bind(audit.resolved_at.map(|t| *t.as_datetime()))
    .bind(audit.id.as_uuid())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all audits for startup hydration.
pub async fn load_audits(pool: &PgPool) -> Result<Vec<ComplianceAudit>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT id, organization_id, rule_name, rule_description, severity, status,
         detected_at, resolved_at, details, recommendation
         FROM compliance_audits ORDER BY detected_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(AuditRow::into_record).collect())
}

/// Load all violation reports for startup hydration.
pub async fn load_violations(pool: &PgPool) -> Result<Vec<ViolationReport>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ViolationRow>(
        "SELECT id, organization_id, violation_type, description, affected_users_count,
         detected_at, reported_to_oversight, resolved, related_audit
         FROM violation_reports ORDER BY detected_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ViolationRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    organization_id: Uuid,
    rule_name: String,
    rule_description: String,
    severity: String,
    status: String,
    detected_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    details: serde_json::Value,
    recommendation: String,
}

impl AuditRow {
    fn into_record(self) -> ComplianceAudit {
        ComplianceAudit {
            id: AuditId::from_uuid(self.id),
            organization: OrgId::from_uuid(self.organization_id),
            rule_name: self.rule_name,
            rule_description: self.rule_description,
            severity: Severity::parse_or_medium(&self.severity),
            status: AuditStatus::parse(&self.status).unwrap_or(AuditStatus::Pending),
            detected_at: Timestamp::from_datetime(self.detected_at),
            resolved_at: self.resolved_at.map(Timestamp::from_datetime),
            details: self.details,
            recommendation: self.recommendation,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ViolationRow {
    id: Uuid,
    organization_id: Uuid,
    violation_type: String,
    description: String,
    affected_users_count: i32,
    detected_at: DateTime<Utc>,
    reported_to_oversight: bool,
    resolved: bool,
    related_audit: Option<Uuid>,
}

impl ViolationRow {
    fn into_record(self) -> ViolationReport {
        ViolationReport {
            id: ViolationId::from_uuid(self.id),
            organization: OrgId::from_uuid(self.organization_id),
            violation_type: ViolationType::parse(&self.violation_type)
                .unwrap_or(ViolationType::PrivacyBreach),
            description: self.description,
            affected_users_count: self.affected_users_count.max(0) as u32,
            detected_at: Timestamp::from_datetime(self.detected_at),
            reported_to_oversight: self.reported_to_oversight,
            resolved: self.resolved,
            related_audit: self.related_audit.map(AuditId::from_uuid),
        }
    }
}
