//! # Access Request Log
//!
//! Each organization's historical requests to access a subject's
//! consented data. The (organization, subject, consent-type) triple is
//! unique — the constraint is load-bearing, preventing duplicate
//! simultaneous requests for the same data — and is enforced inside a
//! single write lock.
//!
//! Organizations file requests (starting PENDING); subjects approve or
//! revoke them. Rule evaluation reads this log but never mutates it.

use std::collections::HashMap;
use std::sync::Arc;

use consentry_core::{ConsentTypeId, OrgId, RequestId, SubjectId, Timestamp, ValidationError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Status of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Filed by the organization, awaiting the subject's decision.
    Pending,
    /// Approved by the subject.
    Approved,
    /// Revoked by the subject.
    Revoked,
}

impl RequestStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Revoked => "REVOKED",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REVOKED" => Ok(Self::Revoked),
            other => Err(ValidationError::InvalidRequestStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subject's decision on a pending or previously decided request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDecision {
    /// Approve the organization's access.
    Approve,
    /// Revoke the organization's access.
    Revoke,
}

/// An organization's record of intent/approval to use a subject's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Stable identifier.
    pub id: RequestId,
    /// The requesting organization.
    pub organization: OrgId,
    /// The subject whose data is requested.
    pub subject: SubjectId,
    /// The consent type requested.
    pub consent_type: ConsentTypeId,
    /// Current status.
    pub status: RequestStatus,
    /// Stated purpose. `None` only on legacy rows restored from storage;
    /// the creation path requires a non-empty purpose. The rule engine
    /// flags missing purposes as audit-trail gaps.
    pub purpose: Option<String>,
    /// When the request was filed.
    pub requested_at: Timestamp,
}

#[derive(Default)]
struct AccessLogInner {
    requests: HashMap<RequestId, AccessRequest>,
    // Uniqueness index for the load-bearing triple constraint.
    by_triple: HashMap<(OrgId, SubjectId, ConsentTypeId), RequestId>,
}

/// Thread-safe, cloneable access-request log.
#[derive(Clone, Default)]
pub struct AccessLog {
    inner: Arc<RwLock<AccessLogInner>>,
}

impl AccessLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// File a new access request (status PENDING).
    ///
    /// Rejects an empty or whitespace-only purpose, and rejects a
    /// duplicate (organization, subject, consent-type) triple. Both
    /// checks and the insert run under one write lock.
    pub fn file(
        &self,
        organization: OrgId,
        subject: SubjectId,
        consent_type: ConsentTypeId,
        purpose: impl Into<String>,
        now: Timestamp,
    ) -> Result<AccessRequest, LedgerError> {
        let purpose = purpose.into();
        if purpose.trim().is_empty() {
            return Err(ValidationError::EmptyPurpose.into());
        }

        let mut inner = self.inner.write();
        let triple = (
            organization.clone(),
            subject.clone(),
            consent_type.clone(),
        );
        if inner.by_triple.contains_key(&triple) {
            return Err(LedgerError::DuplicateRequest {
                organization,
                subject,
                consent_type,
            });
        }

        let request = AccessRequest {
            id: RequestId::new(),
            organization,
            subject,
            consent_type,
            status: RequestStatus::Pending,
            purpose: Some(purpose),
            requested_at: now,
        };
        inner.by_triple.insert(triple, request.id.clone());
        inner.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    /// Apply a subject's decision to a request.
    ///
    /// Only the request's own subject may decide it. Approve↔revoke may
    /// flip indefinitely; the status never returns to PENDING.
    pub fn decide(
        &self,
        request_id: &RequestId,
        subject: &SubjectId,
        decision: RequestDecision,
    ) -> Result<AccessRequest, LedgerError> {
        let mut inner = self.inner.write();
        let request = inner
            .requests
            .get_mut(request_id)
            .ok_or_else(|| LedgerError::UnknownRequest(request_id.clone()))?;
        if request.subject != *subject {
            return Err(LedgerError::NotRequestSubject {
                request: request_id.clone(),
                subject: subject.clone(),
            });
        }
        request.status = match decision {
            RequestDecision::Approve => RequestStatus::Approved,
            RequestDecision::Revoke => RequestStatus::Revoked,
        };
        Ok(request.clone())
    }

    /// Look up a request by id.
    pub fn get(&self, request_id: &RequestId) -> Option<AccessRequest> {
        self.inner.read().requests.get(request_id).cloned()
    }

    /// All requests filed by an organization, newest first.
    pub fn for_org(&self, organization: &OrgId) -> Vec<AccessRequest> {
        let mut requests: Vec<AccessRequest> = self
            .inner
            .read()
            .requests
            .values()
            .filter(|r| r.organization == *organization)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        requests
    }

    /// An organization's requests in the given status, newest first.
    pub fn for_org_with_status(
        &self,
        organization: &OrgId,
        status: RequestStatus,
    ) -> Vec<AccessRequest> {
        let mut requests: Vec<AccessRequest> = self
            .inner
            .read()
            .requests
            .values()
            .filter(|r| r.organization == *organization && r.status == status)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        requests
    }

    /// All requests naming a subject, newest first — the subject's
    /// transparency log.
    pub fn for_subject(&self, subject: &SubjectId) -> Vec<AccessRequest> {
        let mut requests: Vec<AccessRequest> = self
            .inner
            .read()
            .requests
            .values()
            .filter(|r| r.subject == *subject)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        requests
    }

    /// Approved requests naming a (subject, consent-type) pair. Used to
    /// find the organizations affected by a consent toggle.
    pub fn approved_for_pair(
        &self,
        subject: &SubjectId,
        consent_type: &ConsentTypeId,
    ) -> Vec<AccessRequest> {
        self.inner
            .read()
            .requests
            .values()
            .filter(|r| {
                r.subject == *subject
                    && r.consent_type == *consent_type
                    && r.status == RequestStatus::Approved
            })
            .cloned()
            .collect()
    }

    /// Count of an organization's requests filed at or after `since`.
    pub fn count_since(&self, organization: &OrgId, since: Timestamp) -> usize {
        self.inner
            .read()
            .requests
            .values()
            .filter(|r| r.organization == *organization && r.requested_at >= since)
            .count()
    }

    /// Platform-wide counts: (total, approved, revoked, filed since `since`).
    pub fn platform_counts(&self, since: Timestamp) -> (usize, usize, usize, usize) {
        let inner = self.inner.read();
        let total = inner.requests.len();
        let approved = inner
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Approved)
            .count();
        let revoked = inner
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Revoked)
            .count();
        let recent = inner
            .requests
            .values()
            .filter(|r| r.requested_at >= since)
            .count();
        (total, approved, revoked, recent)
    }

    /// Organizations that have filed at least one request.
    pub fn organizations(&self) -> Vec<OrgId> {
        let inner = self.inner.read();
        let mut orgs: Vec<OrgId> = inner
            .requests
            .values()
            .map(|r| r.organization.clone())
            .collect();
        orgs.sort_by_key(|o| *o.as_uuid());
        orgs.dedup();
        orgs
    }

    /// Insert a request as-is, bypassing validation. Used when hydrating
    /// from durable storage (including legacy rows without a purpose).
    pub fn restore(&self, request: AccessRequest) {
        let mut inner = self.inner.write();
        inner.by_triple.insert(
            (
                request.organization.clone(),
                request.subject.clone(),
                request.consent_type.clone(),
            ),
            request.id.clone(),
        );
        inner.requests.insert(request.id.clone(), request);
    }
}

impl std::fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLog")
            .field("requests", &self.inner.read().requests.len())
            .finish()
    }
}
