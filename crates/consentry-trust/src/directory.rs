//! # Organization Directory
//!
//! Organization records with their cached trust snapshot. The records
//! themselves come from the directory collaborator — this store never
//! creates organizations on its own — but the trust snapshot fields
//! (`trust_score`, `trust_level`, `last_calculated`, certificate flags)
//! are owned here, written only by [`OrgDirectory::apply_score`].
//!
//! The snapshot is a denormalized read cache: recomputation is its only
//! writer, and readers may see stale values between recalculations.
//! That is eventual consistency, not a correctness bug.

use std::collections::HashMap;
use std::sync::Arc;

use consentry_core::{OrgId, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::score::{TrustLevel, TrustScore};

/// Overall score at or above which a trust certificate is issued (the
/// VERIFIED band floor). Compared against the rounded overall score.
pub const CERTIFICATE_THRESHOLD: f64 = 75.0;

/// An organization with its cached trust snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    /// Stable identifier, supplied by the directory collaborator.
    pub id: OrgId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Public website, if any.
    pub website: Option<String>,
    /// Cached overall trust score. Derived; may be stale.
    pub trust_score: f64,
    /// Cached trust level. Derived; may be stale.
    pub trust_level: TrustLevel,
    /// When the snapshot was last recomputed.
    pub last_calculated: Option<Timestamp>,
    /// Whether a trust certificate is currently issued.
    pub certificate_issued: bool,
    /// When the current certificate was issued.
    pub certificate_issued_at: Option<Timestamp>,
}

impl OrganizationRecord {
    /// Create a record with an empty trust snapshot.
    pub fn new(id: OrgId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            website: None,
            trust_score: 0.0,
            trust_level: TrustLevel::Low,
            last_calculated: None,
            certificate_issued: false,
            certificate_issued_at: None,
        }
    }
}

/// What happened to the certificate during a snapshot update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateTransition {
    /// The score crossed the threshold upward; certificate issued.
    Issued,
    /// The score fell below the threshold; certificate cleared.
    Cleared,
    /// No change.
    Unchanged,
}

/// Errors raised by the organization directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The referenced organization does not exist.
    #[error("unknown organization: {0}")]
    UnknownOrganization(OrgId),
}

/// Thread-safe, cloneable organization directory.
#[derive(Clone, Default)]
pub struct OrgDirectory {
    inner: Arc<RwLock<HashMap<OrgId, OrganizationRecord>>>,
}

impl OrgDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an organization record. Called by the directory
    /// collaborator (and by database hydration); never by the scoring
    /// path.
    pub fn upsert(&self, record: OrganizationRecord) {
        self.inner.write().insert(record.id.clone(), record);
    }

    /// Look up an organization by id.
    pub fn get(&self, id: &OrgId) -> Option<OrganizationRecord> {
        self.inner.read().get(id).cloned()
    }

    /// All organizations, sorted by name for deterministic output.
    pub fn list(&self) -> Vec<OrganizationRecord> {
        let mut records: Vec<OrganizationRecord> =
            self.inner.read().values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.as_uuid().cmp(b.id.as_uuid())));
        records
    }

    /// Number of organizations.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Write a freshly computed score into the organization's snapshot
    /// and apply the certificate transition, as one atomic
    /// read-modify-write under the write lock.
    ///
    /// Issues the certificate when the rounded overall score reaches
    /// [`CERTIFICATE_THRESHOLD`] and none is issued; clears it (and its
    /// timestamp) when the score falls below while one is issued. Two
    /// interleaving recomputations cannot lose either side of the
    /// update.
    pub fn apply_score(
        &self,
        id: &OrgId,
        score: &TrustScore,
    ) -> Result<(OrganizationRecord, CertificateTransition), DirectoryError> {
        let mut inner = self.inner.write();
        let record = inner
            .get_mut(id)
            .ok_or_else(|| DirectoryError::UnknownOrganization(id.clone()))?;

        record.trust_score = score.overall_score;
        record.trust_level = score.trust_level;
        record.last_calculated = Some(score.calculated_at);

        let transition = if score.overall_score >= CERTIFICATE_THRESHOLD
            && !record.certificate_issued
        {
            record.certificate_issued = true;
            record.certificate_issued_at = Some(score.calculated_at);
            tracing::info!(organization = %id, score = score.overall_score, "trust certificate issued");
            CertificateTransition::Issued
        } else if score.overall_score < CERTIFICATE_THRESHOLD && record.certificate_issued {
            record.certificate_issued = false;
            record.certificate_issued_at = None;
            tracing::info!(organization = %id, score = score.overall_score, "trust certificate cleared");
            CertificateTransition::Cleared
        } else {
            CertificateTransition::Unchanged
        };

        Ok((record.clone(), transition))
    }
}

impl std::fmt::Debug for OrgDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgDirectory")
            .field("organizations", &self.inner.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::TrustComponents;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn score_of(overall: f64, at: Timestamp) -> TrustScore {
        TrustScore {
            overall_score: overall,
            trust_level: TrustLevel::from_score(overall),
            components: TrustComponents {
                compliance: overall,
                data_integrity: overall,
                consent_respect: overall,
                transparency: overall,
                user_satisfaction: overall,
            },
            calculated_at: at,
        }
    }

    fn seeded() -> (OrgDirectory, OrgId) {
        let directory = OrgDirectory::new();
        let id = OrgId::new();
        directory.upsert(OrganizationRecord::new(
            id.clone(),
            "Acme Data Ltd",
            "privacy@acme.example",
        ));
        (directory, id)
    }

    #[test]
    fn new_record_has_empty_snapshot() {
        let (directory, id) = seeded();
        let record = directory.get(&id).unwrap();
        assert_eq!(record.trust_score, 0.0);
        assert_eq!(record.trust_level, TrustLevel::Low);
        assert!(record.last_calculated.is_none());
        assert!(!record.certificate_issued);
    }

    #[test]
    fn apply_score_updates_snapshot() {
        let (directory, id) = seeded();
        let at = ts("2026-01-15T12:00:00Z");
        let (record, _) = directory.apply_score(&id, &score_of(68.5, at)).unwrap();
        assert_eq!(record.trust_score, 68.5);
        assert_eq!(record.trust_level, TrustLevel::Good);
        assert_eq!(record.last_calculated, Some(at));
    }

    #[test]
    fn certificate_issues_at_threshold() {
        let (directory, id) = seeded();
        let at = ts("2026-01-15T12:00:00Z");

        let (record, transition) = directory.apply_score(&id, &score_of(74.9, at)).unwrap();
        assert_eq!(transition, CertificateTransition::Unchanged);
        assert!(!record.certificate_issued);

        let later = ts("2026-01-16T12:00:00Z");
        let (record, transition) = directory.apply_score(&id, &score_of(75.0, later)).unwrap();
        assert_eq!(transition, CertificateTransition::Issued);
        assert!(record.certificate_issued);
        assert_eq!(record.certificate_issued_at, Some(later));
    }

    #[test]
    fn certificate_clears_below_threshold() {
        let (directory, id) = seeded();
        let at = ts("2026-01-15T12:00:00Z");
        directory.apply_score(&id, &score_of(80.0, at)).unwrap();

        let later = ts("2026-02-15T12:00:00Z");
        let (record, transition) = directory.apply_score(&id, &score_of(74.99, later)).unwrap();
        assert_eq!(transition, CertificateTransition::Cleared);
        assert!(!record.certificate_issued);
        assert!(record.certificate_issued_at.is_none());
    }

    #[test]
    fn certificate_stable_when_staying_above() {
        let (directory, id) = seeded();
        let at = ts("2026-01-15T12:00:00Z");
        directory.apply_score(&id, &score_of(80.0, at)).unwrap();

        let later = ts("2026-02-15T12:00:00Z");
        let (record, transition) = directory.apply_score(&id, &score_of(92.0, later)).unwrap();
        // Already issued: timestamp is preserved, not refreshed.
        assert_eq!(transition, CertificateTransition::Unchanged);
        assert!(record.certificate_issued);
        assert_eq!(record.certificate_issued_at, Some(at));
    }

    #[test]
    fn apply_score_unknown_org_fails() {
        let directory = OrgDirectory::new();
        let err = directory
            .apply_score(&OrgId::new(), &score_of(50.0, ts("2026-01-15T12:00:00Z")))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownOrganization(_)));
    }

    #[test]
    fn list_sorts_by_name() {
        let directory = OrgDirectory::new();
        for name in ["Zephyr Analytics", "Acme Data Ltd", "Midline Health"] {
            directory.upsert(OrganizationRecord::new(
                OrgId::new(),
                name,
                format!("{}@example.com", name.to_lowercase().replace(' ', "-")),
            ));
        }
        let names: Vec<String> = directory.list().into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["Acme Data Ltd", "Midline Health", "Zephyr Analytics"]
        );
    }

    #[test]
    fn upsert_replaces_existing() {
        let (directory, id) = seeded();
        let mut record = directory.get(&id).unwrap();
        record.website = Some("https://acme.example".to_string());
        directory.upsert(record);
        assert_eq!(
            directory.get(&id).unwrap().website.as_deref(),
            Some("https://acme.example")
        );
        assert_eq!(directory.len(), 1);
    }
}
