//! # Consent Ledger
//!
//! Thread-safe store for consent types, grants, and the append-only
//! history. A grant and its history entry are written under one lock so
//! they can never diverge. All operations are synchronous (the lock is
//! `parking_lot`, not `tokio::sync`) because no lock is ever held across
//! an `.await` point.

use std::collections::HashMap;
use std::sync::Arc;

use consentry_core::{ConsentTypeId, SubjectId, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::consent::{
    ConsentAction, ConsentGrant, ConsentHistoryEntry, ConsentTransition, ConsentType,
};
use crate::error::LedgerError;

/// Days before expiry at which a grant is reported as "expiring soon".
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// A subject's current access flag for one consent type, including
/// pairs for which no grant exists yet (reported as revoked).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentStatus {
    /// The consent type.
    pub consent_type: ConsentType,
    /// Whether access is currently granted.
    pub access: bool,
}

/// A grant force-revoked by the expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredGrant {
    /// The owning subject.
    pub subject: SubjectId,
    /// The consent type.
    pub consent_type: ConsentTypeId,
    /// The expiry that passed.
    pub expired_at: Timestamp,
}

/// A grant within [`EXPIRY_WARNING_DAYS`] of its expiry. Reported but
/// not mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringGrant {
    /// The owning subject.
    pub subject: SubjectId,
    /// The consent type.
    pub consent_type: ConsentTypeId,
    /// The upcoming expiry.
    pub expires_at: Timestamp,
    /// Whole days remaining.
    pub days_remaining: i64,
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpirySweep {
    /// Grants that were force-revoked.
    pub expired: Vec<ExpiredGrant>,
    /// Grants expiring within the warning window, untouched.
    pub expiring_soon: Vec<ExpiringGrant>,
}

#[derive(Default)]
struct LedgerInner {
    types: HashMap<ConsentTypeId, ConsentType>,
    grants: HashMap<(SubjectId, ConsentTypeId), ConsentGrant>,
    history: Vec<ConsentHistoryEntry>,
}

/// Thread-safe, cloneable consent ledger.
#[derive(Clone, Default)]
pub struct ConsentLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl ConsentLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Consent types ───────────────────────────────────────────────

    /// Register a consent type. Types are immutable once created.
    pub fn register_type(&self, name: impl Into<String>, now: Timestamp) -> ConsentType {
        let consent_type = ConsentType {
            id: ConsentTypeId::new(),
            name: name.into(),
            created_at: now,
        };
        self.inner
            .write()
            .types
            .insert(consent_type.id.clone(), consent_type.clone());
        consent_type
    }

    /// Look up a consent type by id.
    pub fn consent_type(&self, id: &ConsentTypeId) -> Option<ConsentType> {
        self.inner.read().types.get(id).cloned()
    }

    /// List all consent types, sorted by name for deterministic output.
    pub fn list_types(&self) -> Vec<ConsentType> {
        let mut types: Vec<ConsentType> = self.inner.read().types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    // ── Grant transitions ───────────────────────────────────────────

    /// Toggle the grant for (subject, consent-type), creating it on first
    /// use. Returns the applied transition.
    ///
    /// The transition and its history entry are committed under a single
    /// write lock.
    pub fn toggle(
        &self,
        subject: &SubjectId,
        consent_type: &ConsentTypeId,
        actor: Option<SubjectId>,
        now: Timestamp,
    ) -> Result<ConsentTransition, LedgerError> {
        let mut inner = self.inner.write();
        if !inner.types.contains_key(consent_type) {
            return Err(LedgerError::UnknownConsentType(consent_type.clone()));
        }

        let key = (subject.clone(), consent_type.clone());
        let transition = match inner.grants.get(&key) {
            Some(existing) => existing.toggled(actor, now),
            None => {
                ConsentGrant::first_grant(subject.clone(), consent_type.clone(), actor, now)
            }
        };
        inner.grants.insert(key, transition.grant.clone());
        inner.history.push(transition.entry.clone());
        Ok(transition)
    }

    /// Set the duration of an existing grant.
    pub fn set_duration(
        &self,
        subject: &SubjectId,
        consent_type: &ConsentTypeId,
        days: i64,
        actor: Option<SubjectId>,
        now: Timestamp,
    ) -> Result<ConsentTransition, LedgerError> {
        let mut inner = self.inner.write();
        let key = (subject.clone(), consent_type.clone());
        let existing = inner
            .grants
            .get(&key)
            .ok_or_else(|| LedgerError::UnknownGrant {
                subject: subject.clone(),
                consent_type: consent_type.clone(),
            })?;
        let transition = existing.with_duration(days, actor, now)?;
        inner.grants.insert(key, transition.grant.clone());
        inner.history.push(transition.entry.clone());
        Ok(transition)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Look up the grant for a (subject, consent-type) pair.
    pub fn grant(&self, subject: &SubjectId, consent_type: &ConsentTypeId) -> Option<ConsentGrant> {
        self.inner
            .read()
            .grants
            .get(&(subject.clone(), consent_type.clone()))
            .cloned()
    }

    /// Whether the pair currently has a valid grant: present, granted,
    /// and not past expiry.
    pub fn has_valid_grant(
        &self,
        subject: &SubjectId,
        consent_type: &ConsentTypeId,
        now: Timestamp,
    ) -> bool {
        self.grant(subject, consent_type)
            .map(|g| g.is_valid(now))
            .unwrap_or(false)
    }

    /// Per-type access status for one subject across every registered
    /// consent type. Pairs without a grant report `access = false`.
    pub fn status_for(&self, subject: &SubjectId) -> Vec<ConsentStatus> {
        let inner = self.inner.read();
        let mut statuses: Vec<ConsentStatus> = inner
            .types
            .values()
            .map(|ct| ConsentStatus {
                consent_type: ct.clone(),
                access: inner
                    .grants
                    .get(&(subject.clone(), ct.id.clone()))
                    .map(|g| g.access)
                    .unwrap_or(false),
            })
            .collect();
        statuses.sort_by(|a, b| a.consent_type.name.cmp(&b.consent_type.name));
        statuses
    }

    /// History entries for a subject, newest first. When `consent_type`
    /// is given, only entries for that type are returned.
    pub fn history_for(
        &self,
        subject: &SubjectId,
        consent_type: Option<&ConsentTypeId>,
    ) -> Vec<ConsentHistoryEntry> {
        let inner = self.inner.read();
        let mut entries: Vec<ConsentHistoryEntry> = inner
            .history
            .iter()
            .filter(|e| {
                e.subject == *subject
                    && consent_type.map(|ct| e.consent_type == *ct).unwrap_or(true)
            })
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    /// Number of history entries recorded at or after `since`.
    pub fn changes_since(&self, since: Timestamp) -> usize {
        self.inner
            .read()
            .history
            .iter()
            .filter(|e| e.changed_at >= since)
            .count()
    }

    /// Counts of (total, currently granted) grants.
    pub fn grant_counts(&self) -> (usize, usize) {
        let inner = self.inner.read();
        let total = inner.grants.len();
        let active = inner.grants.values().filter(|g| g.access).count();
        (total, active)
    }

    // ── Expiry sweep ────────────────────────────────────────────────

    /// Sweep all grants: force-revoke active grants past their expiry
    /// (recording an EXPIRED history entry each) and report grants
    /// within [`EXPIRY_WARNING_DAYS`] of expiry without mutating them.
    pub fn check_expiry(&self, now: Timestamp) -> ExpirySweep {
        self.sweep(None, now)
    }

    /// Expiry sweep scoped to a single subject's grants.
    pub fn check_expiry_for(&self, subject: &SubjectId, now: Timestamp) -> ExpirySweep {
        self.sweep(Some(subject), now)
    }

    fn sweep(&self, subject: Option<&SubjectId>, now: Timestamp) -> ExpirySweep {
        let mut inner = self.inner.write();
        let mut result = ExpirySweep::default();

        let keys: Vec<(SubjectId, ConsentTypeId)> = inner
            .grants
            .iter()
            .filter(|((s, _), g)| {
                subject.map(|sub| s == sub).unwrap_or(true) && g.access && g.expires_at.is_some()
            })
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys {
            let grant = inner.grants[&key].clone();
            let expires_at = match grant.expires_at {
                Some(expires) => expires,
                None => continue,
            };
            if grant.is_expired(now) {
                let transition = grant.expired(now);
                inner.grants.insert(key, transition.grant.clone());
                inner.history.push(transition.entry);
                tracing::info!(
                    subject = %grant.subject,
                    consent_type = %grant.consent_type,
                    "expired consent grant force-revoked"
                );
                result.expired.push(ExpiredGrant {
                    subject: grant.subject,
                    consent_type: grant.consent_type,
                    expired_at: expires_at,
                });
            } else {
                let days = now.days_until(&expires_at);
                if days <= EXPIRY_WARNING_DAYS {
                    result.expiring_soon.push(ExpiringGrant {
                        subject: grant.subject,
                        consent_type: grant.consent_type,
                        expires_at,
                        days_remaining: days,
                    });
                }
            }
        }

        result
    }

    // ── Hydration (database startup load) ───────────────────────────

    /// Insert a consent type without generating a fresh id. Used when
    /// hydrating from durable storage.
    pub fn restore_type(&self, consent_type: ConsentType) {
        self.inner
            .write()
            .types
            .insert(consent_type.id.clone(), consent_type);
    }

    /// Insert a grant as-is, bypassing transition logic. Used when
    /// hydrating from durable storage.
    pub fn restore_grant(&self, grant: ConsentGrant) {
        self.inner
            .write()
            .grants
            .insert((grant.subject.clone(), grant.consent_type.clone()), grant);
    }

    /// Append a history entry as-is. Used when hydrating from durable
    /// storage; entries must be supplied in chronological order.
    pub fn restore_history(&self, entry: ConsentHistoryEntry) {
        self.inner.write().history.push(entry);
    }
}

impl std::fmt::Debug for ConsentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ConsentLedger")
            .field("types", &inner.types.len())
            .field("grants", &inner.grants.len())
            .field("history", &inner.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn ledger_with_type(now: Timestamp) -> (ConsentLedger, ConsentType) {
        let ledger = ConsentLedger::new();
        let ct = ledger.register_type("location", now);
        (ledger, ct)
    }

    #[test]
    fn toggle_unknown_type_fails() {
        let ledger = ConsentLedger::new();
        let err = ledger
            .toggle(
                &SubjectId::new(),
                &ConsentTypeId::new(),
                None,
                ts("2026-01-01T00:00:00Z"),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownConsentType(_)));
    }

    #[test]
    fn n_toggles_produce_n_alternating_history_entries() {
        let now = ts("2026-01-01T00:00:00Z");
        let (ledger, ct) = ledger_with_type(now);
        let subject = SubjectId::new();

        for i in 0..6 {
            ledger
                .toggle(&subject, &ct.id, None, now.plus_days(i))
                .unwrap();
        }

        let history = ledger.history_for(&subject, None);
        assert_eq!(history.len(), 6);

        // Newest first: REVOKED, GRANTED, REVOKED, GRANTED, REVOKED, GRANTED.
        let actions: Vec<ConsentAction> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ConsentAction::Revoked,
                ConsentAction::Granted,
                ConsentAction::Revoked,
                ConsentAction::Granted,
                ConsentAction::Revoked,
                ConsentAction::Granted,
            ]
        );

        // previous/new values chain correctly (oldest first for chaining).
        let mut chronological = history.clone();
        chronological.reverse();
        assert_eq!(chronological[0].previous_value, None);
        for pair in chronological.windows(2) {
            assert_eq!(pair[1].previous_value, Some(pair[0].new_value));
        }
    }

    #[test]
    fn has_valid_grant_reflects_toggle_state() {
        let now = ts("2026-01-01T00:00:00Z");
        let (ledger, ct) = ledger_with_type(now);
        let subject = SubjectId::new();

        assert!(!ledger.has_valid_grant(&subject, &ct.id, now));
        ledger.toggle(&subject, &ct.id, None, now).unwrap();
        assert!(ledger.has_valid_grant(&subject, &ct.id, now));
        ledger.toggle(&subject, &ct.id, None, now).unwrap();
        assert!(!ledger.has_valid_grant(&subject, &ct.id, now));
    }

    #[test]
    fn status_for_reports_all_types() {
        let now = ts("2026-01-01T00:00:00Z");
        let ledger = ConsentLedger::new();
        let location = ledger.register_type("location", now);
        let _health = ledger.register_type("health", now);
        let subject = SubjectId::new();

        ledger.toggle(&subject, &location.id, None, now).unwrap();

        let statuses = ledger.status_for(&subject);
        assert_eq!(statuses.len(), 2);
        // Sorted by name: health, location.
        assert_eq!(statuses[0].consent_type.name, "health");
        assert!(!statuses[0].access);
        assert_eq!(statuses[1].consent_type.name, "location");
        assert!(statuses[1].access);
    }

    #[test]
    fn expiry_sweep_revokes_past_expiry_and_warns_on_upcoming() {
        let start = ts("2026-01-01T00:00:00Z");
        let ledger = ConsentLedger::new();
        let ct = ledger.register_type("location", start);

        // Grant A: expires after 10 days — already past at sweep time.
        let a = SubjectId::new();
        ledger.toggle(&a, &ct.id, None, start).unwrap();
        ledger.set_duration(&a, &ct.id, 10, None, start).unwrap();

        // Grant B: expires 5 days after the sweep — expiring soon.
        let b = SubjectId::new();
        ledger.toggle(&b, &ct.id, None, start).unwrap();
        ledger.set_duration(&b, &ct.id, 25, None, start).unwrap();

        // Grant C: indefinite — untouched.
        let c = SubjectId::new();
        ledger.toggle(&c, &ct.id, None, start).unwrap();

        let sweep_at = ts("2026-01-21T00:00:00Z");
        let sweep = ledger.check_expiry(sweep_at);

        assert_eq!(sweep.expired.len(), 1);
        assert_eq!(sweep.expired[0].subject, a);
        assert_eq!(sweep.expiring_soon.len(), 1);
        assert_eq!(sweep.expiring_soon[0].subject, b);
        assert_eq!(sweep.expiring_soon[0].days_remaining, 5);

        // A was force-revoked with an EXPIRED history entry.
        assert!(!ledger.grant(&a, &ct.id).unwrap().access);
        let a_history = ledger.history_for(&a, None);
        assert_eq!(a_history[0].action, ConsentAction::Expired);

        // B was reported but not mutated.
        assert!(ledger.grant(&b, &ct.id).unwrap().access);

        // C has no expiry and appears in neither list.
        assert!(ledger.grant(&c, &ct.id).unwrap().access);
    }

    #[test]
    fn expiry_sweep_is_idempotent_once_revoked() {
        let start = ts("2026-01-01T00:00:00Z");
        let ledger = ConsentLedger::new();
        let ct = ledger.register_type("location", start);
        let subject = SubjectId::new();
        ledger.toggle(&subject, &ct.id, None, start).unwrap();
        ledger
            .set_duration(&subject, &ct.id, 10, None, start)
            .unwrap();

        let sweep_at = ts("2026-02-01T00:00:00Z");
        let first = ledger.check_expiry(sweep_at);
        assert_eq!(first.expired.len(), 1);

        // The grant is no longer active, so a second sweep finds nothing.
        let second = ledger.check_expiry(sweep_at);
        assert!(second.expired.is_empty());
        assert!(second.expiring_soon.is_empty());
    }

    #[test]
    fn scoped_sweep_only_touches_one_subject() {
        let start = ts("2026-01-01T00:00:00Z");
        let ledger = ConsentLedger::new();
        let ct = ledger.register_type("location", start);

        let a = SubjectId::new();
        let b = SubjectId::new();
        for s in [&a, &b] {
            ledger.toggle(s, &ct.id, None, start).unwrap();
            ledger.set_duration(s, &ct.id, 10, None, start).unwrap();
        }

        let sweep_at = ts("2026-02-01T00:00:00Z");
        let sweep = ledger.check_expiry_for(&a, sweep_at);
        assert_eq!(sweep.expired.len(), 1);

        // B's grant is untouched by A's scoped sweep.
        assert!(ledger.grant(&b, &ct.id).unwrap().access);
    }

    #[test]
    fn set_duration_requires_existing_grant() {
        let now = ts("2026-01-01T00:00:00Z");
        let (ledger, ct) = ledger_with_type(now);
        let err = ledger
            .set_duration(&SubjectId::new(), &ct.id, 30, None, now)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownGrant { .. }));
    }

    #[test]
    fn grant_counts_and_changes_since() {
        let now = ts("2026-01-01T00:00:00Z");
        let (ledger, ct) = ledger_with_type(now);
        let a = SubjectId::new();
        let b = SubjectId::new();

        ledger.toggle(&a, &ct.id, None, now).unwrap();
        ledger.toggle(&b, &ct.id, None, now.plus_days(1)).unwrap();
        ledger.toggle(&b, &ct.id, None, now.plus_days(2)).unwrap();

        let (total, active) = ledger.grant_counts();
        assert_eq!(total, 2);
        assert_eq!(active, 1);

        assert_eq!(ledger.changes_since(now.plus_days(1)), 2);
        assert_eq!(ledger.changes_since(now.plus_days(3)), 0);
    }

    #[test]
    fn clone_shares_underlying_data() {
        let now = ts("2026-01-01T00:00:00Z");
        let (ledger, ct) = ledger_with_type(now);
        let clone = ledger.clone();
        let subject = SubjectId::new();

        clone.toggle(&subject, &ct.id, None, now).unwrap();
        assert!(ledger.has_valid_grant(&subject, &ct.id, now));
    }
}
