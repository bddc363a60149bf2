//! # Trust Score Engine
//!
//! Five independently-computed components, each clamped to [0, 100],
//! combined by fixed weights. The compliance component reuses the risk
//! score from a fresh rule-engine run — never the cached snapshot — so
//! a trust recomputation always reflects the current ledger and log.

use consentry_compliance::{purpose_is_vague, AuditStore, ComplianceEngine, ViolationType};
use consentry_core::{OrgId, Timestamp};
use consentry_ledger::{AccessLog, ConsentLedger, RequestStatus};
use serde::{Deserialize, Serialize};

use crate::directory::OrgDirectory;
use crate::score::{round2, ComponentWeights, TrustComponents, TrustLevel, TrustScore};

/// Fixed user-satisfaction component value — no feedback subsystem
/// exists yet.
pub const USER_SATISFACTION_PLACEHOLDER: f64 = 85.0;

/// Maximum penalty applied to consent respect for revoked requests.
pub const REVOCATION_PENALTY_CAP: f64 = 20.0;

/// Trailing window, in days, for the transparency recency ratio.
pub const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// Upper bound on ranking size, clamping the caller-supplied limit.
pub const RANKING_LIMIT_MAX: usize = 100;

/// One entry of the trust ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedOrganization {
    /// Organization identifier.
    pub id: OrgId,
    /// Organization display name.
    pub name: String,
    /// Organization contact email.
    pub email: String,
    /// Freshly recomputed overall score.
    pub trust_score: f64,
    /// Band containing the score.
    pub trust_level: TrustLevel,
}

/// The trust score engine.
#[derive(Debug, Clone)]
pub struct TrustScoreEngine {
    weights: ComponentWeights,
    compliance: ComplianceEngine,
}

impl TrustScoreEngine {
    /// Create an engine with explicit weights and compliance engine.
    pub fn new(weights: ComponentWeights, compliance: ComplianceEngine) -> Self {
        Self { weights, compliance }
    }

    /// Create an engine with default weights over the standard rule
    /// catalog.
    pub fn standard() -> Self {
        Self::new(ComponentWeights::default(), ComplianceEngine::standard())
    }

    /// The weights in effect.
    pub fn weights(&self) -> &ComponentWeights {
        &self.weights
    }

    /// Compute the full trust score for one organization.
    ///
    /// Pure with respect to its inputs plus `now`; persisting the result
    /// into the organization's snapshot is the caller's step (via
    /// [`OrgDirectory::apply_score`]), kept separate so the computation
    /// itself stays read-only.
    pub fn calculate(
        &self,
        organization: &OrgId,
        log: &AccessLog,
        ledger: &ConsentLedger,
        audits: &AuditStore,
        now: Timestamp,
    ) -> TrustScore {
        let compliance = self.compliance_score(organization, log, ledger, now);
        let data_integrity = self.data_integrity_score(organization, log, audits);
        let consent_respect = self.consent_respect_score(organization, log, ledger, now);
        let transparency = self.transparency_score(organization, log, now);
        let user_satisfaction = USER_SATISFACTION_PLACEHOLDER;

        let overall = compliance * self.weights.compliance
            + data_integrity * self.weights.data_integrity
            + consent_respect * self.weights.consent_respect
            + transparency * self.weights.transparency
            + user_satisfaction * self.weights.user_satisfaction;
        let overall = round2(overall);

        tracing::debug!(
            organization = %organization,
            overall,
            compliance,
            data_integrity,
            consent_respect,
            transparency,
            "trust score computed"
        );

        TrustScore {
            overall_score: overall,
            trust_level: TrustLevel::from_score(overall),
            components: TrustComponents {
                compliance: round2(compliance),
                data_integrity: round2(data_integrity),
                consent_respect: round2(consent_respect),
                transparency: round2(transparency),
                user_satisfaction: round2(user_satisfaction),
            },
            calculated_at: now,
        }
    }

    /// Compliance component: `100 − riskScore` from a fresh rule-engine
    /// run, floored at 0.
    pub fn compliance_score(
        &self,
        organization: &OrgId,
        log: &AccessLog,
        ledger: &ConsentLedger,
        now: Timestamp,
    ) -> f64 {
        let outcome = self
            .compliance
            .run_all_checks(organization, log, ledger, now);
        (100.0 - outcome.risk_score as f64).max(0.0)
    }

    /// Data-integrity component: 100 with no access requests; otherwise
    /// `100 − 10 ×` unresolved privacy-breach/audit-failure violations,
    /// floored at 0.
    pub fn data_integrity_score(
        &self,
        organization: &OrgId,
        log: &AccessLog,
        audits: &AuditStore,
    ) -> f64 {
        if log.for_org(organization).is_empty() {
            return 100.0;
        }
        let unresolved = audits.unresolved_violation_count(
            organization,
            &[ViolationType::PrivacyBreach, ViolationType::AuditFailure],
        );
        (100.0 - unresolved as f64 * 10.0).max(0.0)
    }

    /// Consent-respect component: the fraction of the organization's
    /// requests that are approved *and* backed by a currently-valid
    /// grant, scaled to 100, penalized by up to
    /// [`REVOCATION_PENALTY_CAP`] points proportional to the revoked
    /// fraction.
    pub fn consent_respect_score(
        &self,
        organization: &OrgId,
        log: &AccessLog,
        ledger: &ConsentLedger,
        now: Timestamp,
    ) -> f64 {
        let requests = log.for_org(organization);
        if requests.is_empty() {
            return 100.0;
        }
        let total = requests.len() as f64;

        let valid = requests
            .iter()
            .filter(|r| r.status == RequestStatus::Approved)
            .filter(|r| ledger.has_valid_grant(&r.subject, &r.consent_type, now))
            .count() as f64;
        let mut score = valid / total * 100.0;

        let revoked = requests
            .iter()
            .filter(|r| r.status == RequestStatus::Revoked)
            .count() as f64;
        if revoked > 0.0 {
            let penalty = (revoked / total * 100.0).min(REVOCATION_PENALTY_CAP);
            score -= penalty;
        }
        score.max(0.0)
    }

    /// Transparency component: 70%-weighted clear-purpose fraction plus
    /// 30%-weighted recency-of-activity ratio (capped), total capped at
    /// 100.
    pub fn transparency_score(
        &self,
        organization: &OrgId,
        log: &AccessLog,
        now: Timestamp,
    ) -> f64 {
        let requests = log.for_org(organization);
        if requests.is_empty() {
            return 100.0;
        }
        let total = requests.len() as f64;

        let clear = requests
            .iter()
            .filter(|r| {
                r.purpose
                    .as_deref()
                    .map(|p| !purpose_is_vague(p))
                    .unwrap_or(false)
            })
            .count() as f64;
        let purpose_score = clear / total * 70.0;

        let window_start = now.minus_days(ACTIVITY_WINDOW_DAYS);
        let recent = requests
            .iter()
            .filter(|r| r.requested_at >= window_start)
            .count() as f64;
        let activity_score = (recent / total * 30.0).min(30.0);

        (purpose_score + activity_score).min(100.0)
    }

    /// Recompute trust scores for every organization in the directory,
    /// sort descending by overall score, and return the top `limit`
    /// entries (clamped to [`RANKING_LIMIT_MAX`]).
    ///
    /// Rankings always recompute — the cached snapshot is never read.
    pub fn rank(
        &self,
        directory: &OrgDirectory,
        log: &AccessLog,
        ledger: &ConsentLedger,
        audits: &AuditStore,
        limit: usize,
        now: Timestamp,
    ) -> Vec<RankedOrganization> {
        let limit = limit.min(RANKING_LIMIT_MAX);
        let mut rankings: Vec<RankedOrganization> = directory
            .list()
            .into_iter()
            .map(|record| {
                let score = self.calculate(&record.id, log, ledger, audits, now);
                RankedOrganization {
                    id: record.id,
                    name: record.name,
                    email: record.email,
                    trust_score: score.overall_score,
                    trust_level: score.trust_level,
                }
            })
            .collect();

        rankings.sort_by(|a, b| {
            b.trust_score
                .partial_cmp(&a.trust_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        rankings.truncate(limit);
        rankings
    }
}

impl Default for TrustScoreEngine {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::OrganizationRecord;
    use chrono::{DateTime, Utc};
    use consentry_compliance::RuleCatalog;
    use consentry_core::{RequestId, SubjectId};
    use consentry_ledger::{AccessRequest, RequestDecision};

    fn ts(s: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn now() -> Timestamp {
        ts("2026-06-01T00:00:00Z")
    }

    struct Fixture {
        log: AccessLog,
        ledger: ConsentLedger,
        audits: AuditStore,
        org: OrgId,
        engine: TrustScoreEngine,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                log: AccessLog::new(),
                ledger: ConsentLedger::new(),
                audits: AuditStore::new(),
                org: OrgId::new(),
                engine: TrustScoreEngine::standard(),
            }
        }

        fn approved_with_consent(&self, purpose: &str, at: Timestamp) {
            let subject = SubjectId::new();
            let ct = self.ledger.register_type("category", at);
            self.ledger.toggle(&subject, &ct.id, None, at).unwrap();
            let r = self
                .log
                .file(self.org.clone(), subject.clone(), ct.id, purpose, at)
                .unwrap();
            self.log
                .decide(&r.id, &subject, RequestDecision::Approve)
                .unwrap();
        }

        fn calculate(&self) -> TrustScore {
            self.engine
                .calculate(&self.org, &self.log, &self.ledger, &self.audits, now())
        }
    }

    #[test]
    fn empty_organization_scores_high() {
        let f = Fixture::new();
        let score = f.calculate();

        // All activity components are 100; satisfaction is 85.
        assert_eq!(score.components.compliance, 100.0);
        assert_eq!(score.components.data_integrity, 100.0);
        assert_eq!(score.components.consent_respect, 100.0);
        assert_eq!(score.components.transparency, 100.0);
        assert_eq!(score.components.user_satisfaction, 85.0);
        // 100×0.95 + 85×0.05 = 99.25.
        assert_eq!(score.overall_score, 99.25);
        assert_eq!(score.trust_level, TrustLevel::Excellent);
    }

    #[test]
    fn overall_is_weighted_sum_rounded() {
        let f = Fixture::new();
        f.approved_with_consent("documented service delivery", ts("2026-05-20T00:00:00Z"));
        let score = f.calculate();

        let w = ComponentWeights::default();
        let expected = score.components.compliance * w.compliance
            + score.components.data_integrity * w.data_integrity
            + score.components.consent_respect * w.consent_respect
            + score.components.transparency * w.transparency
            + score.components.user_satisfaction * w.user_satisfaction;
        assert!((score.overall_score - expected).abs() < 0.01);
        assert!(score.overall_score >= 0.0 && score.overall_score <= 100.0);
    }

    #[test]
    fn level_matches_band_of_overall() {
        let f = Fixture::new();
        f.approved_with_consent("general", ts("2026-05-20T00:00:00Z"));
        let score = f.calculate();
        assert_eq!(score.trust_level, TrustLevel::from_score(score.overall_score));
    }

    #[test]
    fn compliance_component_reflects_findings() {
        let f = Fixture::new();
        // Approved request, consent then revoked: CONSENT_VALIDITY (15)
        // + REVOCATION_HANDLING (20) = risk 35.
        let subject = SubjectId::new();
        let ct = f.ledger.register_type("location", ts("2026-05-01T00:00:00Z"));
        f.ledger
            .toggle(&subject, &ct.id, None, ts("2026-05-01T00:00:00Z"))
            .unwrap();
        let r = f
            .log
            .file(
                f.org.clone(),
                subject.clone(),
                ct.id.clone(),
                "documented service delivery",
                ts("2026-05-01T00:00:00Z"),
            )
            .unwrap();
        f.log.decide(&r.id, &subject, RequestDecision::Approve).unwrap();
        f.ledger
            .toggle(&subject, &ct.id, None, ts("2026-05-02T00:00:00Z"))
            .unwrap();

        let compliance = f
            .engine
            .compliance_score(&f.org, &f.log, &f.ledger, now());
        assert_eq!(compliance, 65.0);
    }

    #[test]
    fn data_integrity_penalizes_unresolved_breaches() {
        let f = Fixture::new();
        f.approved_with_consent("documented service delivery", now());

        // Two unresolved privacy-breach violations: 100 − 20 = 80.
        for _ in 0..2 {
            f.audits.restore_violation(consentry_compliance::ViolationReport {
                id: consentry_core::ViolationId::new(),
                organization: f.org.clone(),
                violation_type: ViolationType::PrivacyBreach,
                description: "test".to_string(),
                affected_users_count: 0,
                detected_at: now(),
                reported_to_oversight: false,
                resolved: false,
                related_audit: None,
            });
        }
        assert_eq!(f.engine.data_integrity_score(&f.org, &f.log, &f.audits), 80.0);
    }

    #[test]
    fn data_integrity_floors_at_zero() {
        let f = Fixture::new();
        f.approved_with_consent("documented service delivery", now());
        for _ in 0..12 {
            f.audits.restore_violation(consentry_compliance::ViolationReport {
                id: consentry_core::ViolationId::new(),
                organization: f.org.clone(),
                violation_type: ViolationType::AuditFailure,
                description: "test".to_string(),
                affected_users_count: 0,
                detected_at: now(),
                reported_to_oversight: false,
                resolved: false,
                related_audit: None,
            });
        }
        assert_eq!(f.engine.data_integrity_score(&f.org, &f.log, &f.audits), 0.0);
    }

    #[test]
    fn consent_respect_penalizes_revocations() {
        let f = Fixture::new();
        let at = ts("2026-05-20T00:00:00Z");

        // 3 approved-with-consent, 1 revoked: valid 3/4 = 75, penalty
        // min(20, 25) = 20 → 55.
        for _ in 0..3 {
            f.approved_with_consent("documented service delivery", at);
        }
        let subject = SubjectId::new();
        let ct = f.ledger.register_type("category", at);
        let r = f
            .log
            .file(f.org.clone(), subject.clone(), ct.id, "documented service delivery", at)
            .unwrap();
        f.log.decide(&r.id, &subject, RequestDecision::Revoke).unwrap();

        let score = f
            .engine
            .consent_respect_score(&f.org, &f.log, &f.ledger, now());
        assert_eq!(score, 55.0);
    }

    #[test]
    fn consent_respect_ignores_expired_grants() {
        let f = Fixture::new();
        let at = ts("2026-01-01T00:00:00Z");
        let subject = SubjectId::new();
        let ct = f.ledger.register_type("location", at);
        f.ledger.toggle(&subject, &ct.id, None, at).unwrap();
        f.ledger.set_duration(&subject, &ct.id, 30, None, at).unwrap();
        let r = f
            .log
            .file(f.org.clone(), subject.clone(), ct.id, "documented service delivery", at)
            .unwrap();
        f.log.decide(&r.id, &subject, RequestDecision::Approve).unwrap();

        // Grant expired long before `now`; no valid backing → 0.
        let score = f
            .engine
            .consent_respect_score(&f.org, &f.log, &f.ledger, now());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn transparency_scores_purposes_and_recency() {
        let f = Fixture::new();
        // One clear + recent, one vague + old.
        f.approved_with_consent("documented service delivery", ts("2026-05-20T00:00:00Z"));
        f.approved_with_consent("general", ts("2026-01-01T00:00:00Z"));

        // purpose: 1/2 × 70 = 35; activity: 1/2 × 30 = 15 → 50.
        let score = f.engine.transparency_score(&f.org, &f.log, now());
        assert_eq!(score, 50.0);
    }

    #[test]
    fn transparency_counts_missing_purpose_as_unclear() {
        let f = Fixture::new();
        f.log.restore(AccessRequest {
            id: RequestId::new(),
            organization: f.org.clone(),
            subject: SubjectId::new(),
            consent_type: consentry_core::ConsentTypeId::new(),
            status: RequestStatus::Pending,
            purpose: None,
            requested_at: ts("2026-05-20T00:00:00Z"),
        });

        // purpose: 0; activity: 1/1 × 30 = 30.
        let score = f.engine.transparency_score(&f.org, &f.log, now());
        assert_eq!(score, 30.0);
    }

    #[test]
    fn ranking_sorts_descending_and_clamps() {
        let f = Fixture::new();
        let directory = OrgDirectory::new();

        // Clean org scores higher than one with revocation findings.
        let clean = OrgId::new();
        directory.upsert(OrganizationRecord::new(clean.clone(), "Clean Co", "c@example.com"));

        let dirty = f.org.clone();
        directory.upsert(OrganizationRecord::new(dirty.clone(), "Dirty Co", "d@example.com"));
        let subject = SubjectId::new();
        let ct = f.ledger.register_type("location", now());
        let r = f
            .log
            .file(dirty.clone(), subject.clone(), ct.id, "documented service delivery", now())
            .unwrap();
        f.log.decide(&r.id, &subject, RequestDecision::Approve).unwrap();
        // No grant ever toggled → consent rules fire for Dirty Co.

        let rankings = f
            .engine
            .rank(&directory, &f.log, &f.ledger, &f.audits, 10, now());
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].name, "Clean Co");
        assert!(rankings[0].trust_score > rankings[1].trust_score);

        // Limit of 1 truncates.
        let top = f
            .engine
            .rank(&directory, &f.log, &f.ledger, &f.audits, 1, now());
        assert_eq!(top.len(), 1);

        // Limit above the cap is clamped (no panic, full list here).
        let all = f
            .engine
            .rank(&directory, &f.log, &f.ledger, &f.audits, 10_000, now());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn reduced_catalog_changes_compliance_component() {
        let mut catalog = RuleCatalog::standard();
        catalog.remove(consentry_compliance::RuleId::RevocationHandling);
        catalog.remove(consentry_compliance::RuleId::ConsentValidity);
        let engine = TrustScoreEngine::new(
            ComponentWeights::default(),
            consentry_compliance::ComplianceEngine::new(catalog),
        );

        let f = Fixture::new();
        let subject = SubjectId::new();
        let ct = f.ledger.register_type("location", now());
        let r = f
            .log
            .file(f.org.clone(), subject.clone(), ct.id, "documented service delivery", now())
            .unwrap();
        f.log.decide(&r.id, &subject, RequestDecision::Approve).unwrap();

        // With consent rules removed, no findings fire.
        assert_eq!(engine.compliance_score(&f.org, &f.log, &f.ledger, now()), 100.0);
    }
}
