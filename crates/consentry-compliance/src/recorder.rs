//! # Audit/Violation Recorder
//!
//! Persists findings as durable audit records and, for high-severity
//! findings, as separate violation reports.
//!
//! ## Idempotency
//!
//! Before creating a `ComplianceAudit` for a given (organization,
//! rule-name) pair, the store checks for an existing record with
//! `detected_at` inside the trailing [`IDEMPOTENCY_WINDOW_DAYS`]; if one
//! exists, creation is skipped for that rule this scan. The same check
//! applies independently to `ViolationReport` creation keyed by
//! (organization, violation-type). Both the existence check and the
//! insert run under a single write lock, so two scans racing within the
//! same window cannot double-insert — the uniqueness guard lives in the
//! store, not in the caller.

use std::collections::HashMap;
use std::sync::Arc;

use consentry_core::{AuditId, OrgId, Severity, Timestamp, ValidationError, ViolationId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{RuleCatalog, RuleId};
use crate::engine::Finding;
use crate::risk::RISK_SCORE_CAP;

/// The trailing idempotency window, in days.
pub const IDEMPOTENCY_WINDOW_DAYS: i64 = 30;

/// Lifecycle status of a persisted audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// Awaiting review.
    Pending,
    /// Under investigation by an operator.
    Investigating,
    /// Remediated; `resolved_at` is stamped.
    Resolved,
    /// Dismissed as a false positive.
    Ignored,
}

impl AuditStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Investigating => "INVESTIGATING",
            Self::Resolved => "RESOLVED",
            Self::Ignored => "IGNORED",
        }
    }

    /// Parse a status string, rejecting values outside the defined set.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "INVESTIGATING" => Ok(Self::Investigating),
            "RESOLVED" => Ok(Self::Resolved),
            "IGNORED" => Ok(Self::Ignored),
            other => Err(ValidationError::InvalidAuditStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted finding with lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAudit {
    /// Stable identifier.
    pub id: AuditId,
    /// The audited organization.
    pub organization: OrgId,
    /// Rule display name — the idempotency key within the window.
    pub rule_name: String,
    /// What the rule enforces.
    pub rule_description: String,
    /// Severity at detection time.
    pub severity: Severity,
    /// Lifecycle status. Mutated only via explicit transition.
    pub status: AuditStatus,
    /// When the finding was recorded.
    pub detected_at: Timestamp,
    /// When the audit was resolved, if it was.
    pub resolved_at: Option<Timestamp>,
    /// Structured rule-specific details.
    pub details: serde_json::Value,
    /// Remediation guidance.
    pub recommendation: String,
}

/// Taxonomy of oversight-facing violation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    /// Access without a live consent grant.
    ConsentViolation,
    /// Data retained beyond the stated purpose.
    DataRetention,
    /// Unauthorized access patterns.
    AccessControl,
    /// Generic privacy breach (fallback for unmapped rules).
    PrivacyBreach,
    /// Audit trail gaps.
    AuditFailure,
    /// Vague or missing purposes.
    PurposeLimitation,
}

impl ViolationType {
    /// The violation type derived from a rule. Unmapped rules default to
    /// [`ViolationType::PrivacyBreach`].
    pub fn for_rule(rule: RuleId) -> Self {
        match rule {
            RuleId::ConsentValidity | RuleId::RevocationHandling => Self::ConsentViolation,
            RuleId::AccessControl => Self::AccessControl,
            RuleId::RetentionPolicy => Self::DataRetention,
            RuleId::PurposeLimitation => Self::PurposeLimitation,
            RuleId::DataMinimization | RuleId::AuditTrail | RuleId::ExcessiveRequests => {
                Self::PrivacyBreach
            }
        }
    }

    /// Return the string representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentViolation => "CONSENT_VIOLATION",
            Self::DataRetention => "DATA_RETENTION",
            Self::AccessControl => "ACCESS_CONTROL",
            Self::PrivacyBreach => "PRIVACY_BREACH",
            Self::AuditFailure => "AUDIT_FAILURE",
            Self::PurposeLimitation => "PURPOSE_LIMITATION",
        }
    }

    /// Parse a stored violation-type string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONSENT_VIOLATION" => Some(Self::ConsentViolation),
            "DATA_RETENTION" => Some(Self::DataRetention),
            "ACCESS_CONTROL" => Some(Self::AccessControl),
            "PRIVACY_BREACH" => Some(Self::PrivacyBreach),
            "AUDIT_FAILURE" => Some(Self::AuditFailure),
            "PURPOSE_LIMITATION" => Some(Self::PurposeLimitation),
            _ => None,
        }
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted, oversight-facing record derived from a high-severity
/// finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Stable identifier.
    pub id: ViolationId,
    /// The violating organization.
    pub organization: OrgId,
    /// Violation taxonomy value — the idempotency key within the window.
    pub violation_type: ViolationType,
    /// What happened.
    pub description: String,
    /// Number of subjects affected (0 when not attributable).
    pub affected_users_count: u32,
    /// When the violation was recorded.
    pub detected_at: Timestamp,
    /// Whether the oversight body was notified (automatic for CRITICAL).
    pub reported_to_oversight: bool,
    /// Whether the violation has been resolved.
    pub resolved: bool,
    /// The audit created alongside this report, when one was.
    pub related_audit: Option<AuditId>,
}

/// Result of one `record_scan` call: the records actually created
/// (window-suppressed duplicates are absent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Audits created this scan.
    pub audits: Vec<ComplianceAudit>,
    /// Violation reports created this scan.
    pub violations: Vec<ViolationReport>,
}

impl RecordOutcome {
    /// Number of audits created.
    pub fn audits_created(&self) -> usize {
        self.audits.len()
    }

    /// Number of violation reports created.
    pub fn violations_created(&self) -> usize {
        self.violations.len()
    }
}

/// Per-organization report statistics over the idempotency window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatistics {
    /// Audits detected within the window.
    pub total_audits: usize,
    /// Of those, still pending.
    pub pending_audits: usize,
    /// Of those, resolved.
    pub resolved_audits: usize,
    /// Unresolved violation reports within the window.
    pub unresolved_violations: usize,
}

/// Errors raised by the audit store.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The audit does not exist (or does not belong to the organization
    /// making the request — not distinguished, to avoid leaking record
    /// existence across organizations).
    #[error("unknown compliance audit: {0}")]
    UnknownAudit(AuditId),
}

#[derive(Default)]
struct AuditStoreInner {
    audits: HashMap<AuditId, ComplianceAudit>,
    violations: HashMap<ViolationId, ViolationReport>,
}

/// Thread-safe, cloneable store of audits and violation reports.
#[derive(Clone, Default)]
pub struct AuditStore {
    inner: Arc<RwLock<AuditStoreInner>>,
}

impl AuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scan's findings idempotently.
    ///
    /// One audit per (organization, rule-name) pair per window; one
    /// violation report per (organization, violation-type) pair per
    /// window, for CRITICAL/HIGH findings only. Runs entirely under one
    /// write lock.
    pub fn record_scan(
        &self,
        organization: &OrgId,
        findings: &[Finding],
        catalog: &RuleCatalog,
        now: Timestamp,
    ) -> RecordOutcome {
        let window_start = now.minus_days(IDEMPOTENCY_WINDOW_DAYS);
        let mut inner = self.inner.write();
        let mut outcome = RecordOutcome::default();

        for finding in findings {
            let (rule_name, rule_description, severity) = match catalog.spec(finding.rule) {
                Some(spec) => (spec.name.clone(), spec.description.clone(), spec.severity),
                None => (finding.rule.as_str().to_string(), String::new(), Severity::Medium),
            };

            let audit_exists = inner.audits.values().any(|a| {
                a.organization == *organization
                    && a.rule_name == rule_name
                    && a.detected_at >= window_start
            });
            let mut created_audit_id = None;
            if !audit_exists {
                let audit = ComplianceAudit {
                    id: AuditId::new(),
                    organization: organization.clone(),
                    rule_name: rule_name.clone(),
                    rule_description: rule_description.clone(),
                    severity,
                    status: AuditStatus::Pending,
                    detected_at: now,
                    resolved_at: None,
                    details: finding.details.clone(),
                    recommendation: finding.recommendation.clone(),
                };
                created_audit_id = Some(audit.id.clone());
                inner.audits.insert(audit.id.clone(), audit.clone());
                outcome.audits.push(audit);
            }

            if !severity.warrants_violation_report() {
                continue;
            }
            let violation_type = ViolationType::for_rule(finding.rule);
            let violation_exists = inner.violations.values().any(|v| {
                v.organization == *organization
                    && v.violation_type == violation_type
                    && v.detected_at >= window_start
            });
            if !violation_exists {
                let report = ViolationReport {
                    id: ViolationId::new(),
                    organization: organization.clone(),
                    violation_type,
                    description: if finding.recommendation.is_empty() {
                        rule_description
                    } else {
                        finding.recommendation.clone()
                    },
                    affected_users_count: affected_count(&finding.details),
                    detected_at: now,
                    reported_to_oversight: severity == Severity::Critical,
                    resolved: false,
                    related_audit: created_audit_id,
                };
                inner.violations.insert(report.id.clone(), report.clone());
                outcome.violations.push(report);
            }
        }

        tracing::info!(
            organization = %organization,
            audits_created = outcome.audits_created(),
            violations_created = outcome.violations_created(),
            "scan recorded"
        );
        outcome
    }

    /// Audits for an organization within the window, newest first.
    pub fn audits_in_window(&self, organization: &OrgId, now: Timestamp) -> Vec<ComplianceAudit> {
        let window_start = now.minus_days(IDEMPOTENCY_WINDOW_DAYS);
        let mut audits: Vec<ComplianceAudit> = self
            .inner
            .read()
            .audits
            .values()
            .filter(|a| a.organization == *organization && a.detected_at >= window_start)
            .cloned()
            .collect();
        audits.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| a.rule_name.cmp(&b.rule_name))
        });
        audits
    }

    /// Violation reports for an organization within the window, newest
    /// first.
    pub fn violations_in_window(
        &self,
        organization: &OrgId,
        now: Timestamp,
    ) -> Vec<ViolationReport> {
        let window_start = now.minus_days(IDEMPOTENCY_WINDOW_DAYS);
        let mut violations: Vec<ViolationReport> = self
            .inner
            .read()
            .violations
            .values()
            .filter(|v| v.organization == *organization && v.detected_at >= window_start)
            .cloned()
            .collect();
        violations.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| a.violation_type.as_str().cmp(b.violation_type.as_str()))
        });
        violations
    }

    /// Look up an audit scoped to its organization.
    pub fn audit_for_org(
        &self,
        audit_id: &AuditId,
        organization: &OrgId,
    ) -> Result<ComplianceAudit, RecorderError> {
        self.inner
            .read()
            .audits
            .get(audit_id)
            .filter(|a| a.organization == *organization)
            .cloned()
            .ok_or_else(|| RecorderError::UnknownAudit(audit_id.clone()))
    }

    /// Transition an audit's status. RESOLVED stamps `resolved_at`; the
    /// stamp is cleared again when the audit leaves RESOLVED. Applied as
    /// one atomic read-modify-write.
    pub fn update_status(
        &self,
        audit_id: &AuditId,
        organization: &OrgId,
        status: AuditStatus,
        now: Timestamp,
    ) -> Result<ComplianceAudit, RecorderError> {
        let mut inner = self.inner.write();
        let audit = inner
            .audits
            .get_mut(audit_id)
            .filter(|a| a.organization == *organization)
            .ok_or_else(|| RecorderError::UnknownAudit(audit_id.clone()))?;
        audit.status = status;
        audit.resolved_at = match status {
            AuditStatus::Resolved => Some(now),
            _ => None,
        };
        Ok(audit.clone())
    }

    /// Risk score recomputed over PENDING audits within the window.
    ///
    /// Audit rows key on rule name, so the catalog maps names back to
    /// rule severities; names without a catalog entry weigh MEDIUM.
    pub fn risk_over_pending(
        &self,
        organization: &OrgId,
        catalog: &RuleCatalog,
        now: Timestamp,
    ) -> u32 {
        let total: u32 = self
            .audits_in_window(organization, now)
            .iter()
            .filter(|a| a.status == AuditStatus::Pending)
            .map(|a| {
                catalog
                    .rule_by_name(&a.rule_name)
                    .map(|rule| catalog.severity_of(rule))
                    .unwrap_or(Severity::Medium)
                    .risk_weight()
            })
            .sum();
        total.min(RISK_SCORE_CAP)
    }

    /// Counts of PENDING in-window audits by severity:
    /// (critical, high, medium).
    pub fn pending_severity_counts(
        &self,
        organization: &OrgId,
        now: Timestamp,
    ) -> (usize, usize, usize) {
        let mut critical = 0;
        let mut high = 0;
        let mut medium = 0;
        for audit in self
            .audits_in_window(organization, now)
            .iter()
            .filter(|a| a.status == AuditStatus::Pending)
        {
            match audit.severity {
                Severity::Critical => critical += 1,
                Severity::High => high += 1,
                Severity::Medium => medium += 1,
                Severity::Low => {}
            }
        }
        (critical, high, medium)
    }

    /// Unresolved violation reports of the given types for an
    /// organization, regardless of window. Feeds the data-integrity
    /// trust component.
    pub fn unresolved_violation_count(
        &self,
        organization: &OrgId,
        types: &[ViolationType],
    ) -> usize {
        self.inner
            .read()
            .violations
            .values()
            .filter(|v| {
                v.organization == *organization
                    && !v.resolved
                    && types.contains(&v.violation_type)
            })
            .count()
    }

    /// Per-organization report statistics over the window.
    pub fn statistics(&self, organization: &OrgId, now: Timestamp) -> ReportStatistics {
        let audits = self.audits_in_window(organization, now);
        let violations = self.violations_in_window(organization, now);
        ReportStatistics {
            total_audits: audits.len(),
            pending_audits: audits
                .iter()
                .filter(|a| a.status == AuditStatus::Pending)
                .count(),
            resolved_audits: audits
                .iter()
                .filter(|a| a.status == AuditStatus::Resolved)
                .count(),
            unresolved_violations: violations.iter().filter(|v| !v.resolved).count(),
        }
    }

    /// Platform-wide compliance aggregates for transparency reporting:
    /// (total audits, audits since `since`, open critical audits,
    /// audits resolved since `since`).
    pub fn platform_stats(&self, since: Timestamp) -> (usize, usize, usize, usize) {
        let inner = self.inner.read();
        let total = inner.audits.len();
        let recent = inner
            .audits
            .values()
            .filter(|a| a.detected_at >= since)
            .count();
        let critical_open = inner
            .audits
            .values()
            .filter(|a| {
                a.severity == Severity::Critical
                    && matches!(a.status, AuditStatus::Pending | AuditStatus::Investigating)
            })
            .count();
        let resolved_recent = inner
            .audits
            .values()
            .filter(|a| {
                a.status == AuditStatus::Resolved
                    && a.resolved_at.map(|t| t >= since).unwrap_or(false)
            })
            .count();
        (total, recent, critical_open, resolved_recent)
    }

    /// Insert an audit as-is. Used when hydrating from durable storage.
    pub fn restore_audit(&self, audit: ComplianceAudit) {
        self.inner.write().audits.insert(audit.id.clone(), audit);
    }

    /// Insert a violation report as-is. Used when hydrating from durable
    /// storage.
    pub fn restore_violation(&self, report: ViolationReport) {
        self.inner
            .write()
            .violations
            .insert(report.id.clone(), report);
    }
}

impl std::fmt::Debug for AuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("AuditStore")
            .field("audits", &inner.audits.len())
            .field("violations", &inner.violations.len())
            .finish()
    }
}

/// A finding naming a specific subject or request affects one user;
/// aggregate findings are not attributable.
fn affected_count(details: &serde_json::Value) -> u32 {
    let attributable = details.get("subject_id").is_some()
        || details.get("access_request_id").is_some();
    u32::from(attributable)
}
