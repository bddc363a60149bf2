//! Organization record persistence.
//!
//! All functions take a `&PgPool` and operate on the `organizations`
//! table, including the cached trust snapshot columns.

use chrono::{DateTime, Utc};
use consentry_core::{OrgId, Timestamp};
use consentry_trust::{OrganizationRecord, TrustLevel};
use sqlx::PgPool;
use uuid::Uuid;

/// Upsert an organization record with its trust snapshot.
pub async fn upsert(pool: &PgPool, record: &OrganizationRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO organizations (id, name, email, website, trust_score, trust_level,
         last_calculated, certificate_issued, certificate_issued_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
         name = EXCLUDED.name,
         email = EXCLUDED.email,
         website = EXCLUDED.website,
         trust_score = EXCLUDED.trust_score,
         trust_level = EXCLUDED.trust_level,
         last_calculated = EXCLUDED.last_calculated,
         certificate_issued = EXCLUDED.certificate_issued,
         certificate_issued_at = EXCLUDED.certificate_issued_at",
    )
    .bind(record.id.as_uuid())
    .bind(&record.name)
    .bind(&record.email)
    .bind(&record.website)
    .bind(record.trust_score)
    .bind(record.trust_level.as_str())
    .bind(record.last_calculated.map(|t| *t.as_datetime()))
    .bind(record.certificate_issued)
    .bind(record.certificate_issued_at.map(|t| *t.as_datetime()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all organizations for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<OrganizationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrgRow>(
        "SELECT id, name, email, website, trust_score, trust_level, last_calculated,
         certificate_issued, certificate_issued_at
         FROM organizations ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(OrgRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct OrgRow {
    id: Uuid,
    name: String,
    email: String,
    website: Option<String>,
    trust_score: f64,
    trust_level: String,
    last_calculated: Option<DateTime<Utc>>,
    certificate_issued: bool,
    certificate_issued_at: Option<DateTime<Utc>>,
}

impl OrgRow {
    fn into_record(self) -> OrganizationRecord {
        OrganizationRecord {
            id: OrgId::from_uuid(self.id),
            name: self.name,
            email: self.email,
            website: self.website,
            trust_score: self.trust_score,
            trust_level: TrustLevel::parse_or_low(&self.trust_level),
            last_calculated: self.last_calculated.map(Timestamp::from_datetime),
            certificate_issued: self.certificate_issued,
            certificate_issued_at: self.certificate_issued_at.map(Timestamp::from_datetime),
        }
    }
}
