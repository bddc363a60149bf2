//! Access request persistence.
//!
//! All functions take a `&PgPool` and operate on the `access_requests`
//! table. The `(organization_id, subject_id, consent_type_id)` unique
//! constraint backs the duplicate-triple rejection.

use chrono::{DateTime, Utc};
use consentry_core::{ConsentTypeId, OrgId, RequestId, SubjectId, Timestamp};
use consentry_ledger::{AccessRequest, RequestStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Upsert an access request (insert on filing, update on decision).
pub async fn upsert(pool: &PgPool, request: &AccessRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO access_requests (id, organization_id, subject_id, consent_type_id,
         status, purpose, requested_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status",
    )
    .bind(request.id.as_uuid())
    .bind(request.organization.as_uuid())
    .bind(request.subject.as_uuid())
    .bind(request.consent_type.as_uuid())
    .bind(request.status.as_str())
    .bind(&request.purpose)
    .bind(request.requested_at.as_datetime())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all access requests for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AccessRequest>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RequestRow>(
        "SELECT id, organization_id, subject_id, consent_type_id, status, purpose,
         requested_at FROM access_requests ORDER BY requested_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(RequestRow::into_record).collect())
}

fn parse_status(s: &str) -> RequestStatus {
    RequestStatus::parse(s).unwrap_or(RequestStatus::Pending)
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    organization_id: Uuid,
    subject_id: Uuid,
    consent_type_id: Uuid,
    status: String,
    purpose: Option<String>,
    requested_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_record(self) -> AccessRequest {
        AccessRequest {
            id: RequestId::from_uuid(self.id),
            organization: OrgId::from_uuid(self.organization_id),
            subject: SubjectId::from_uuid(self.subject_id),
            consent_type: ConsentTypeId::from_uuid(self.consent_type_id),
            status: parse_status(&self.status),
            purpose: self.purpose,
            requested_at: Timestamp::from_datetime(self.requested_at),
        }
    }
}
