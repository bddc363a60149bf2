//! # Database Persistence
//!
//! Optional Postgres persistence behind the in-memory stores. Writes are
//! best-effort mirrors (failures are logged, request handling proceeds
//! on the in-memory state); startup hydration replays the tables into
//! the stores.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE consent_types (
//!     id UUID PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! CREATE TABLE consent_grants (
//!     subject_id UUID NOT NULL,
//!     consent_type_id UUID NOT NULL REFERENCES consent_types(id),
//!     access BOOLEAN NOT NULL,
//!     granted_at TIMESTAMPTZ,
//!     revoked_at TIMESTAMPTZ,
//!     expires_at TIMESTAMPTZ,
//!     duration_days BIGINT,
//!     PRIMARY KEY (subject_id, consent_type_id)
//! );
//! CREATE TABLE consent_history (
//!     id BIGSERIAL PRIMARY KEY,
//!     subject_id UUID NOT NULL,
//!     consent_type_id UUID NOT NULL,
//!     action TEXT NOT NULL,
//!     previous_value BOOLEAN,
//!     new_value BOOLEAN NOT NULL,
//!     changed_at TIMESTAMPTZ NOT NULL,
//!     actor_id UUID,
//!     reason TEXT NOT NULL
//! );
//! CREATE TABLE access_requests (
//!     id UUID PRIMARY KEY,
//!     organization_id UUID NOT NULL,
//!     subject_id UUID NOT NULL,
//!     consent_type_id UUID NOT NULL,
//!     status TEXT NOT NULL,
//!     purpose TEXT,
//!     requested_at TIMESTAMPTZ NOT NULL,
//!     UNIQUE (organization_id, subject_id, consent_type_id)
//! );
//! CREATE TABLE compliance_audits (
//!     id UUID PRIMARY KEY,
//!     organization_id UUID NOT NULL,
//!     rule_name TEXT NOT NULL,
//!     rule_description TEXT NOT NULL,
//!     severity TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     detected_at TIMESTAMPTZ NOT NULL,
//!     resolved_at TIMESTAMPTZ,
//!     details JSONB NOT NULL,
//!     recommendation TEXT NOT NULL,
//!     window_bucket BIGINT NOT NULL,
//!     UNIQUE (organization_id, rule_name, window_bucket)
//! );
//! CREATE TABLE violation_reports (
//!     id UUID PRIMARY KEY,
//!     organization_id UUID NOT NULL,
//!     violation_type TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     affected_users_count INT NOT NULL,
//!     detected_at TIMESTAMPTZ NOT NULL,
//!     reported_to_oversight BOOLEAN NOT NULL,
//!     resolved BOOLEAN NOT NULL,
//!     related_audit UUID,
//!     window_bucket BIGINT NOT NULL,
//!     UNIQUE (organization_id, violation_type, window_bucket)
//! );
//! CREATE TABLE organizations (
//!     id UUID PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     email TEXT NOT NULL,
//!     website TEXT,
//!     trust_score DOUBLE PRECISION NOT NULL,
//!     trust_level TEXT NOT NULL,
//!     last_calculated TIMESTAMPTZ,
//!     certificate_issued BOOLEAN NOT NULL,
//!     certificate_issued_at TIMESTAMPTZ
//! );
//! ```
//!
//! The `(organization_id, rule_name, window_bucket)` and
//! `(organization_id, violation_type, window_bucket)` unique indexes
//! back the idempotency window under concurrent scans: inserts use
//! `ON CONFLICT DO NOTHING`, so two racing scans cannot produce
//! duplicate rows even across processes.

pub mod access_requests;
pub mod audits;
pub mod consents;
pub mod organizations;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Length of one idempotency bucket, in days. Matches the recorder's
/// window so the unique index and the in-memory check agree.
pub const WINDOW_BUCKET_DAYS: i64 = consentry_compliance::IDEMPOTENCY_WINDOW_DAYS;

/// Compute the window bucket for a detection timestamp: whole
/// 30-day periods since the Unix epoch.
pub fn window_bucket(detected_at: &consentry_core::Timestamp) -> i64 {
    detected_at.as_datetime().timestamp() / 86_400 / WINDOW_BUCKET_DAYS
}

/// Initialize the connection pool from `DATABASE_URL`.
///
/// Returns `Ok(None)` when the variable is unset — the API then runs in
/// in-memory-only mode.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::info!("DATABASE_URL not set — running in-memory only");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    tracing::info!("database pool initialized");
    Ok(Some(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use consentry_core::Timestamp;

    fn ts(s: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    #[test]
    fn bucket_is_stable_within_a_day() {
        let a = ts("2026-01-01T00:00:00Z");
        let b = ts("2026-01-01T23:59:59Z");
        assert_eq!(window_bucket(&a), window_bucket(&b));
    }

    #[test]
    fn bucket_advances_after_a_full_window() {
        let a = ts("2026-01-01T00:00:00Z");
        let b = ts("2026-03-15T00:00:00Z");
        assert_ne!(window_bucket(&a), window_bucket(&b));
    }
}
