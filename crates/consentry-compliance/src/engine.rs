//! # Rule Engine
//!
//! Eight read-only predicate checks over one organization's slice of the
//! access log and consent ledger. Each check is a pure function of the
//! data it is handed plus the caller-supplied `now`; nothing here mutates
//! state, and an organization with zero requests yields zero findings.
//!
//! CONSENT_VALIDITY and REVOCATION_HANDLING deliberately overlap: both
//! fire per approved request whose consent grant is absent or revoked,
//! at different severities and with different remediation guidance. They
//! are kept distinct rather than merged — one records the validity gap,
//! the other demands immediate revocation.

use consentry_core::{OrgId, Timestamp};
use consentry_ledger::{AccessLog, AccessRequest, ConsentLedger, RequestStatus};
use serde::{Deserialize, Serialize};

use crate::catalog::{RuleCatalog, RuleId};
use crate::risk;

/// Purposes considered too vague to satisfy purpose limitation.
pub const VAGUE_PURPOSES: [&str; 4] = ["general", "testing", "research", "other"];

/// Minimum purpose length considered specific enough.
pub const MIN_PURPOSE_LEN: usize = 10;

/// Average distinct consent types per distinct subject above which data
/// minimization is flagged.
pub const DATA_MINIMIZATION_THRESHOLD: f64 = 3.5;

/// Approved requests older than this many days violate retention policy.
pub const RETENTION_LIMIT_DAYS: i64 = 365;

/// Revoked-request count above which access control is flagged.
pub const REVOKED_REQUEST_THRESHOLD: usize = 10;

/// Trailing window for the excessive-requests check, in days.
pub const EXCESSIVE_REQUEST_WINDOW_DAYS: i64 = 30;

/// Request count within the trailing window above which the
/// excessive-requests rule fires.
pub const EXCESSIVE_REQUEST_THRESHOLD: usize = 100;

/// An ephemeral rule-violation detection, consumed immediately by the
/// recorder. Not an entity with identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// The rule that fired.
    pub rule: RuleId,
    /// Structured detail payload.
    pub details: serde_json::Value,
    /// Human-readable remediation guidance.
    pub recommendation: String,
}

/// Aggregate result of running every catalog rule for one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// All findings, concatenated in catalog order.
    pub findings: Vec<Finding>,
    /// Severity-weighted risk score, capped at 100.
    pub risk_score: u32,
    /// Total finding count.
    pub total_violations: usize,
    /// Findings whose rule is CRITICAL severity.
    pub critical_count: usize,
    /// Findings whose rule is HIGH severity.
    pub high_count: usize,
    /// Findings whose rule is MEDIUM severity.
    pub medium_count: usize,
}

/// The compliance rule engine. Holds the catalog it evaluates; all data
/// is passed in per call, keeping every check a pure read.
#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    catalog: RuleCatalog,
}

impl ComplianceEngine {
    /// Create an engine over the given catalog.
    pub fn new(catalog: RuleCatalog) -> Self {
        Self { catalog }
    }

    /// Create an engine over the standard catalog.
    pub fn standard() -> Self {
        Self::new(RuleCatalog::standard())
    }

    /// The catalog this engine evaluates.
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Run every rule in the catalog for one organization.
    ///
    /// Deterministic: identical inputs and `now` yield identical output,
    /// including finding order (catalog order, requests sorted by filing
    /// time then id within per-request rules).
    pub fn run_all_checks(
        &self,
        organization: &OrgId,
        log: &AccessLog,
        ledger: &ConsentLedger,
        now: Timestamp,
    ) -> ScanOutcome {
        let requests = sorted_requests(log, organization);

        let mut findings = Vec::new();
        for (rule, _) in self.catalog.iter() {
            let rule_findings = match rule {
                RuleId::ConsentValidity => self.check_consent_validity(&requests, ledger),
                RuleId::PurposeLimitation => self.check_purpose_limitation(&requests),
                RuleId::DataMinimization => self.check_data_minimization(&requests),
                RuleId::RetentionPolicy => self.check_retention_policy(&requests, now),
                RuleId::AccessControl => self.check_access_control(&requests),
                RuleId::AuditTrail => self.check_audit_trail(&requests),
                RuleId::RevocationHandling => self.check_revocation_handling(&requests, ledger),
                RuleId::ExcessiveRequests => self.check_excessive_requests(&requests, now),
            };
            findings.extend(rule_findings);
        }

        let risk_score = risk::calculate_risk_score(&self.catalog, &findings);
        let (critical_count, high_count, medium_count) =
            self.severity_counts(&findings);

        tracing::debug!(
            organization = %organization,
            findings = findings.len(),
            risk_score,
            "compliance scan complete"
        );

        ScanOutcome {
            total_violations: findings.len(),
            critical_count,
            high_count,
            medium_count,
            risk_score,
            findings,
        }
    }

    fn severity_counts(&self, findings: &[Finding]) -> (usize, usize, usize) {
        use consentry_core::Severity;
        let mut critical = 0;
        let mut high = 0;
        let mut medium = 0;
        for finding in findings {
            match self.catalog.severity_of(finding.rule) {
                Severity::Critical => critical += 1,
                Severity::High => high += 1,
                Severity::Medium => medium += 1,
                Severity::Low => {}
            }
        }
        (critical, high, medium)
    }

    /// CONSENT_VALIDITY: one finding per approved request whose consent
    /// grant is absent or revoked.
    pub fn check_consent_validity(
        &self,
        requests: &[AccessRequest],
        ledger: &ConsentLedger,
    ) -> Vec<Finding> {
        requests
            .iter()
            .filter(|r| r.status == RequestStatus::Approved)
            .filter(|r| !grant_is_live(ledger, r))
            .map(|r| Finding {
                rule: RuleId::ConsentValidity,
                details: serde_json::json!({
                    "access_request_id": r.id,
                    "subject_id": r.subject,
                    "consent_type_id": r.consent_type,
                    "issue": "Access approved but subject consent revoked",
                }),
                recommendation: format!(
                    "Revoke access request {} as the subject has revoked consent",
                    r.id
                ),
            })
            .collect()
    }

    /// PURPOSE_LIMITATION: at most one aggregate finding over requests
    /// whose stated purpose is empty, vague, or shorter than
    /// [`MIN_PURPOSE_LEN`] characters.
    pub fn check_purpose_limitation(&self, requests: &[AccessRequest]) -> Vec<Finding> {
        let offending: Vec<&AccessRequest> = requests
            .iter()
            .filter(|r| {
                r.purpose
                    .as_deref()
                    .map(purpose_is_vague)
                    .unwrap_or(false)
            })
            .collect();

        if offending.is_empty() {
            return Vec::new();
        }
        vec![Finding {
            rule: RuleId::PurposeLimitation,
            details: serde_json::json!({
                "offending_count": offending.len(),
                "request_ids": offending.iter().map(|r| &r.id).collect::<Vec<_>>(),
                "issue": "Purpose is too vague or insufficient",
            }),
            recommendation: format!(
                "Specify clear, specific purposes for data access (minimum {MIN_PURPOSE_LEN} characters)"
            ),
        }]
    }

    /// DATA_MINIMIZATION: flags when the average distinct consent types
    /// accessed per distinct subject (over approved requests) reaches
    /// [`DATA_MINIMIZATION_THRESHOLD`].
    pub fn check_data_minimization(&self, requests: &[AccessRequest]) -> Vec<Finding> {
        let approved: Vec<&AccessRequest> = requests
            .iter()
            .filter(|r| r.status == RequestStatus::Approved)
            .collect();

        let mut subjects: Vec<&consentry_core::SubjectId> =
            approved.iter().map(|r| &r.subject).collect();
        subjects.sort_by_key(|s| *s.as_uuid());
        subjects.dedup();

        let mut types: Vec<&consentry_core::ConsentTypeId> =
            approved.iter().map(|r| &r.consent_type).collect();
        types.sort_by_key(|t| *t.as_uuid());
        types.dedup();

        if subjects.is_empty() {
            return Vec::new();
        }
        let average = types.len() as f64 / subjects.len() as f64;
        if average < DATA_MINIMIZATION_THRESHOLD {
            return Vec::new();
        }
        vec![Finding {
            rule: RuleId::DataMinimization,
            details: serde_json::json!({
                "unique_subjects": subjects.len(),
                "consent_types_accessed": types.len(),
                "avg_consents_per_subject": (average * 100.0).round() / 100.0,
                "issue": "Accessing multiple data types per subject may violate data minimization",
            }),
            recommendation:
                "Review whether all requested data types are necessary for the stated purpose"
                    .to_string(),
        }]
    }

    /// RETENTION_POLICY: flags when any approved request is older than
    /// [`RETENTION_LIMIT_DAYS`].
    pub fn check_retention_policy(
        &self,
        requests: &[AccessRequest],
        now: Timestamp,
    ) -> Vec<Finding> {
        let cutoff = now.minus_days(RETENTION_LIMIT_DAYS);
        let old: Vec<&AccessRequest> = requests
            .iter()
            .filter(|r| r.status == RequestStatus::Approved && r.requested_at < cutoff)
            .collect();

        if old.is_empty() {
            return Vec::new();
        }
        let oldest = old
            .iter()
            .map(|r| r.requested_at)
            .min()
            .unwrap_or(now);
        vec![Finding {
            rule: RuleId::RetentionPolicy,
            details: serde_json::json!({
                "old_requests_count": old.len(),
                "oldest_request_date": oldest.to_string(),
                "issue": format!(
                    "{} approved access requests older than {RETENTION_LIMIT_DAYS} days",
                    old.len()
                ),
            }),
            recommendation: "Review and archive data access older than the retention period"
                .to_string(),
        }]
    }

    /// ACCESS_CONTROL: flags when more than
    /// [`REVOKED_REQUEST_THRESHOLD`] requests are in REVOKED status.
    pub fn check_access_control(&self, requests: &[AccessRequest]) -> Vec<Finding> {
        let revoked = requests
            .iter()
            .filter(|r| r.status == RequestStatus::Revoked)
            .count();

        if revoked <= REVOKED_REQUEST_THRESHOLD {
            return Vec::new();
        }
        vec![Finding {
            rule: RuleId::AccessControl,
            details: serde_json::json!({
                "revoked_count": revoked,
                "issue": "High number of revoked access requests may indicate access control issues",
            }),
            recommendation:
                "Review access control policies and ensure revoked access is immediately enforced"
                    .to_string(),
        }]
    }

    /// AUDIT_TRAIL: flags when any request has no recorded purpose.
    pub fn check_audit_trail(&self, requests: &[AccessRequest]) -> Vec<Finding> {
        let missing = requests.iter().filter(|r| r.purpose.is_none()).count();
        if missing == 0 {
            return Vec::new();
        }
        vec![Finding {
            rule: RuleId::AuditTrail,
            details: serde_json::json!({
                "missing_purpose_count": missing,
                "issue": "Some access requests lack purpose documentation",
            }),
            recommendation: "Ensure all access requests have a clear purpose documented"
                .to_string(),
        }]
    }

    /// REVOCATION_HANDLING: one finding per approved request whose
    /// consent grant is missing or revoked. Same data condition as
    /// CONSENT_VALIDITY, escalated to an immediate-action demand.
    pub fn check_revocation_handling(
        &self,
        requests: &[AccessRequest],
        ledger: &ConsentLedger,
    ) -> Vec<Finding> {
        requests
            .iter()
            .filter(|r| r.status == RequestStatus::Approved)
            .filter(|r| !grant_is_live(ledger, r))
            .map(|r| Finding {
                rule: RuleId::RevocationHandling,
                details: serde_json::json!({
                    "access_request_id": r.id,
                    "subject_id": r.subject,
                    "consent_type_id": r.consent_type,
                    "issue": "Access still approved but subject consent is missing or revoked",
                }),
                recommendation: format!(
                    "Immediately revoke access request {} — subject consent is missing or revoked",
                    r.id
                ),
            })
            .collect()
    }

    /// EXCESSIVE_REQUESTS: flags when more than
    /// [`EXCESSIVE_REQUEST_THRESHOLD`] requests were filed within the
    /// trailing [`EXCESSIVE_REQUEST_WINDOW_DAYS`].
    pub fn check_excessive_requests(
        &self,
        requests: &[AccessRequest],
        now: Timestamp,
    ) -> Vec<Finding> {
        let window_start = now.minus_days(EXCESSIVE_REQUEST_WINDOW_DAYS);
        let recent = requests
            .iter()
            .filter(|r| r.requested_at >= window_start)
            .count();

        if recent <= EXCESSIVE_REQUEST_THRESHOLD {
            return Vec::new();
        }
        vec![Finding {
            rule: RuleId::ExcessiveRequests,
            details: serde_json::json!({
                "requests_count": recent,
                "period_days": EXCESSIVE_REQUEST_WINDOW_DAYS,
                "issue": "Unusually high number of data access requests",
            }),
            recommendation: "Review whether all requests are necessary and legitimate".to_string(),
        }]
    }
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::standard()
    }
}

/// Whether the request's backing grant exists with access granted.
fn grant_is_live(ledger: &ConsentLedger, request: &AccessRequest) -> bool {
    ledger
        .grant(&request.subject, &request.consent_type)
        .map(|g| g.access)
        .unwrap_or(false)
}

/// Whether a stated purpose fails the purpose-limitation bar: empty,
/// in the vague-term set, or shorter than [`MIN_PURPOSE_LEN`]. Shared
/// with the transparency trust component, which scores its complement.
pub fn purpose_is_vague(purpose: &str) -> bool {
    let trimmed = purpose.trim();
    trimmed.is_empty()
        || VAGUE_PURPOSES.contains(&trimmed.to_lowercase().as_str())
        || trimmed.len() < MIN_PURPOSE_LEN
}

/// One organization's requests in deterministic order (filing time, then
/// id as tiebreaker).
fn sorted_requests(log: &AccessLog, organization: &OrgId) -> Vec<AccessRequest> {
    let mut requests = log.for_org(organization);
    requests.sort_by(|a, b| {
        a.requested_at
            .cmp(&b.requested_at)
            .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
    });
    requests
}
