//! # Temporal Types
//!
//! UTC-only timestamp type for the platform. All timestamps are stored in
//! UTC and serialize to ISO 8601 with a `Z` suffix.
//!
//! ## Design Decision
//!
//! Consent transitions, audit windows, and certificate issuance all hinge
//! on timestamp comparisons. To prevent ambiguity across subjects and
//! organizations in different time zones, every stored timestamp is UTC.
//! Local time conversion is a presentation concern handled by clients.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp.
///
/// Serializes to ISO 8601 format with `Z` suffix (e.g.,
/// `2026-01-15T12:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Return a timestamp `days` whole days after this one.
    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Return a timestamp `days` whole days before this one.
    pub fn minus_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Whole days from this timestamp until `other`, clamped at zero.
    ///
    /// Used for "expiring soon" windows, where a grant already past its
    /// expiry contributes zero remaining days.
    pub fn days_until(&self, other: &Timestamp) -> i64 {
        (other.0 - self.0).num_days().max(0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
