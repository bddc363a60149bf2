//! Consent type, grant, and history persistence.
//!
//! All functions take a `&PgPool` and operate on the `consent_types`,
//! `consent_grants`, and `consent_history` tables.

use chrono::{DateTime, Utc};
use consentry_core::{ConsentTypeId, SubjectId, Timestamp};
use consentry_ledger::{ConsentAction, ConsentGrant, ConsentHistoryEntry, ConsentType};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a consent type.
pub async fn insert_type(pool: &PgPool, record: &ConsentType) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO consent_types (id, name, created_at) VALUES ($1, $2, $3)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(record.id.as_uuid())
    .bind(&record.name)
    .bind(record.created_at.as_datetime())
    .execute(pool)
    .await?;
    Ok(())
}

/// Upsert a consent grant (one row per (subject, consent-type) pair).
pub async fn upsert_grant(pool: &PgPool, grant: &ConsentGrant) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO consent_grants (subject_id, consent_type_id, access, granted_at,
         revoked_at, expires_at, duration_days)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (subject_id, consent_type_id) DO UPDATE SET
         access = EXCLUDED.access,
         granted_at = EXCLUDED.granted_at,
         revoked_at = EXCLUDED.revoked_at,
         expires_at = EXCLUDED.expires_at,
         duration_days = EXCLUDED.duration_days",
    )
    .bind(grant.subject.as_uuid())
    .bind(grant.consent_type.as_uuid())
    .bind(grant.access)
    .bind(grant.granted_at.map(|t| *t.as_datetime()))
    .bind(grant.revoked_at.map(|t| *t.as_datetime()))
    .bind(grant.expires_at.map(|t| *t.as_datetime()))
    .bind(grant.duration_days)
    .execute(pool)
    .await?;
    Ok(())
}

/// Append a history entry.
pub async fn insert_history(
    pool: &PgPool,
    entry: &ConsentHistoryEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO consent_history (subject_id, consent_type_id, action, previous_value,
         new_value, changed_at, actor_id, reason)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(entry.subject.as_uuid())
    .bind(entry.consent_type.as_uuid())
    .bind(entry.action.as_str())
    .bind(entry.previous_value)
    .bind(entry.new_value)
    .bind(entry.changed_at.as_datetime())
    .bind(entry.actor.as_ref().map(|a| *a.as_uuid()))
    .bind(&entry.reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all consent types for startup hydration.
pub async fn load_types(pool: &PgPool) -> Result<Vec<ConsentType>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConsentTypeRow>(
        "SELECT id, name, created_at FROM consent_types ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ConsentTypeRow::into_record).collect())
}

/// Load all consent grants for startup hydration.
pub async fn load_grants(pool: &PgPool) -> Result<Vec<ConsentGrant>, sqlx::Error> {
    let rows = sqlx::query_as::<_, GrantRow>(
        "SELECT subject_id, consent_type_id, access, granted_at, revoked_at,
         expires_at, duration_days FROM consent_grants",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(GrantRow::into_record).collect())
}

/// Load all history entries in chronological order for startup
/// hydration.
pub async fn load_history(pool: &PgPool) -> Result<Vec<ConsentHistoryEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT subject_id, consent_type_id, action, previous_value, new_value,
         changed_at, actor_id, reason FROM consent_history ORDER BY changed_at, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(HistoryRow::into_record).collect())
}

fn parse_action(s: &str) -> ConsentAction {
    match s {
        "GRANTED" => ConsentAction::Granted,
        "REVOKED" => ConsentAction::Revoked,
        "EXPIRED" => ConsentAction::Expired,
        _ => ConsentAction::Modified,
    }
}

#[derive(sqlx::FromRow)]
struct ConsentTypeRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl ConsentTypeRow {
    fn into_record(self) -> ConsentType {
        ConsentType {
            id: ConsentTypeId::from_uuid(self.id),
            name: self.name,
            created_at: Timestamp::from_datetime(self.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    subject_id: Uuid,
    consent_type_id: Uuid,
    access: bool,
    granted_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    duration_days: Option<i64>,
}

impl GrantRow {
    fn into_record(self) -> ConsentGrant {
        ConsentGrant {
            subject: SubjectId::from_uuid(self.subject_id),
            consent_type: ConsentTypeId::from_uuid(self.consent_type_id),
            access: self.access,
            granted_at: self.granted_at.map(Timestamp::from_datetime),
            revoked_at: self.revoked_at.map(Timestamp::from_datetime),
            expires_at: self.expires_at.map(Timestamp::from_datetime),
            duration_days: self.duration_days,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    subject_id: Uuid,
    consent_type_id: Uuid,
    action: String,
    previous_value: Option<bool>,
    new_value: bool,
    changed_at: DateTime<Utc>,
    actor_id: Option<Uuid>,
    reason: String,
}

impl HistoryRow {
    fn into_record(self) -> ConsentHistoryEntry {
        ConsentHistoryEntry {
            subject: SubjectId::from_uuid(self.subject_id),
            consent_type: ConsentTypeId::from_uuid(self.consent_type_id),
            action: parse_action(&self.action),
            previous_value: self.previous_value,
            new_value: self.new_value,
            changed_at: Timestamp::from_datetime(self.changed_at),
            actor: self.actor_id.map(SubjectId::from_uuid),
            reason: self.reason,
        }
    }
}
