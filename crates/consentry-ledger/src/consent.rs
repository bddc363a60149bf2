//! # Consent Types, Grants, and History
//!
//! A [`ConsentGrant`] is the permission state for one (subject,
//! consent-type) pair; at most one grant exists per pair. Every state
//! change flows through the pure transition constructors, each of which
//! returns a [`ConsentTransition`] — the updated grant plus exactly one
//! append-only [`ConsentHistoryEntry`]. The ledger persists both
//! atomically; there is no hook that fires on save.

use consentry_core::{ConsentTypeId, SubjectId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// A named category of personal data (e.g. "location", "health").
/// Immutable once created; referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentType {
    /// Stable identifier.
    pub id: ConsentTypeId,
    /// Display name of the data category.
    pub name: String,
    /// When the category was registered.
    pub created_at: Timestamp,
}

/// The action recorded by a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentAction {
    /// Access flipped to granted.
    Granted,
    /// Access flipped to revoked by the subject.
    Revoked,
    /// Access forced to revoked by the expiry sweep.
    Expired,
    /// Grant settings changed without flipping access (e.g. duration).
    Modified,
}

impl ConsentAction {
    /// Return the string representation of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
            Self::Modified => "MODIFIED",
        }
    }
}

impl std::fmt::Display for ConsentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one transition on a consent grant.
///
/// Never updated or deleted, only appended — one entry per state
/// transition, including the very first creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentHistoryEntry {
    /// The subject whose grant changed.
    pub subject: SubjectId,
    /// The consent type of the grant.
    pub consent_type: ConsentTypeId,
    /// What happened.
    pub action: ConsentAction,
    /// Access value before the transition. `None` for the first creation.
    pub previous_value: Option<bool>,
    /// Access value after the transition.
    pub new_value: bool,
    /// When the transition occurred.
    pub changed_at: Timestamp,
    /// Who drove the transition. `None` for system-driven expiry.
    pub actor: Option<SubjectId>,
    /// Short reason tag for the change.
    pub reason: String,
}

/// The permission state for one (subject, consent-type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
    /// The owning subject. Only the subject (or system-driven expiry)
    /// mutates the grant.
    pub subject: SubjectId,
    /// The consent type this grant covers.
    pub consent_type: ConsentTypeId,
    /// `true` = granted, `false` = revoked.
    pub access: bool,
    /// When access was last granted.
    pub granted_at: Option<Timestamp>,
    /// When access was last revoked.
    pub revoked_at: Option<Timestamp>,
    /// Optional expiry; set from `duration_days` on each grant.
    pub expires_at: Option<Timestamp>,
    /// Consent duration in days (`None` = indefinite).
    pub duration_days: Option<i64>,
}

/// The result of one consent state change: the updated grant and the
/// single history entry recording it. Applied atomically by the ledger.
#[derive(Debug, Clone)]
pub struct ConsentTransition {
    /// The grant after the transition.
    pub grant: ConsentGrant,
    /// The history entry for the transition.
    pub entry: ConsentHistoryEntry,
}

impl ConsentGrant {
    /// First toggle for a pair: creates the grant with access granted.
    pub fn first_grant(
        subject: SubjectId,
        consent_type: ConsentTypeId,
        actor: Option<SubjectId>,
        now: Timestamp,
    ) -> ConsentTransition {
        let grant = ConsentGrant {
            subject: subject.clone(),
            consent_type: consent_type.clone(),
            access: true,
            granted_at: Some(now),
            revoked_at: None,
            expires_at: None,
            duration_days: None,
        };
        let entry = ConsentHistoryEntry {
            subject,
            consent_type,
            action: ConsentAction::Granted,
            previous_value: None,
            new_value: true,
            changed_at: now,
            actor,
            reason: "initial grant".to_string(),
        };
        ConsentTransition { grant, entry }
    }

    /// Flip the access flag.
    ///
    /// On flip to granted: stamps `granted_at`, clears `revoked_at`, and
    /// recomputes `expires_at` from `duration_days` when set. On flip to
    /// revoked: stamps `revoked_at`.
    pub fn toggled(&self, actor: Option<SubjectId>, now: Timestamp) -> ConsentTransition {
        let mut grant = self.clone();
        let granting = !self.access;
        grant.access = granting;
        if granting {
            grant.granted_at = Some(now);
            grant.revoked_at = None;
            grant.expires_at = self.duration_days.map(|d| now.plus_days(d));
        } else {
            grant.revoked_at = Some(now);
        }
        let entry = ConsentHistoryEntry {
            subject: self.subject.clone(),
            consent_type: self.consent_type.clone(),
            action: if granting {
                ConsentAction::Granted
            } else {
                ConsentAction::Revoked
            },
            previous_value: Some(self.access),
            new_value: granting,
            changed_at: now,
            actor,
            reason: "subject toggle".to_string(),
        };
        ConsentTransition { grant, entry }
    }

    /// Force the grant to revoked because its expiry has passed.
    pub fn expired(&self, now: Timestamp) -> ConsentTransition {
        let mut grant = self.clone();
        grant.access = false;
        grant.revoked_at = Some(now);
        let entry = ConsentHistoryEntry {
            subject: self.subject.clone(),
            consent_type: self.consent_type.clone(),
            action: ConsentAction::Expired,
            previous_value: Some(self.access),
            new_value: false,
            changed_at: now,
            actor: None,
            reason: "expiry sweep".to_string(),
        };
        ConsentTransition { grant, entry }
    }

    /// Change the grant's duration without flipping access.
    ///
    /// When the grant is currently active, `expires_at` is recomputed from
    /// the new duration immediately.
    pub fn with_duration(
        &self,
        days: i64,
        actor: Option<SubjectId>,
        now: Timestamp,
    ) -> Result<ConsentTransition, ValidationError> {
        if days <= 0 {
            return Err(ValidationError::InvalidDuration(days));
        }
        let mut grant = self.clone();
        grant.duration_days = Some(days);
        if grant.access {
            grant.expires_at = Some(now.plus_days(days));
        }
        let entry = ConsentHistoryEntry {
            subject: self.subject.clone(),
            consent_type: self.consent_type.clone(),
            action: ConsentAction::Modified,
            previous_value: Some(self.access),
            new_value: self.access,
            changed_at: now,
            actor,
            reason: "duration change".to_string(),
        };
        Ok(ConsentTransition { grant, entry })
    }

    /// Whether the grant has an expiry in the past.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Whether the grant currently authorizes access: granted and not
    /// past its expiry.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.access && !self.is_expired(now)
    }

    /// Whole days until expiry, or `None` when the grant never expires.
    pub fn days_until_expiry(&self, now: Timestamp) -> Option<i64> {
        self.expires_at.map(|expires| now.days_until(&expires))
    }
}
