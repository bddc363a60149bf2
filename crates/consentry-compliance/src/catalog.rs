//! # Rule Catalog
//!
//! The catalog is an explicit value passed to the engine at construction,
//! not a global. `BTreeMap` keys guarantee deterministic rule iteration
//! order. Removing a rule from the catalog disables it entirely — the
//! engine never evaluates a rule it cannot look up.

use std::collections::BTreeMap;

use consentry_core::Severity;
use serde::{Deserialize, Serialize};

/// Identifier of a compliance rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    /// Approved access must be backed by a live consent grant.
    ConsentValidity,
    /// Data access must state a clear, specific purpose.
    PurposeLimitation,
    /// Organizations should only request the data they need.
    DataMinimization,
    /// Approved access must not outlive the retention period.
    RetentionPolicy,
    /// A high volume of revoked requests signals access-control gaps.
    AccessControl,
    /// Every request must be documented with a purpose.
    AuditTrail,
    /// Revoked or missing consent must be respected immediately.
    RevocationHandling,
    /// An unusual volume of recent requests.
    ExcessiveRequests,
}

impl RuleId {
    /// All rules, in catalog order.
    pub fn all() -> [RuleId; 8] {
        [
            Self::ConsentValidity,
            Self::PurposeLimitation,
            Self::DataMinimization,
            Self::RetentionPolicy,
            Self::AccessControl,
            Self::AuditTrail,
            Self::RevocationHandling,
            Self::ExcessiveRequests,
        ]
    }

    /// Return the string representation of this rule id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentValidity => "CONSENT_VALIDITY",
            Self::PurposeLimitation => "PURPOSE_LIMITATION",
            Self::DataMinimization => "DATA_MINIMIZATION",
            Self::RetentionPolicy => "RETENTION_POLICY",
            Self::AccessControl => "ACCESS_CONTROL",
            Self::AuditTrail => "AUDIT_TRAIL",
            Self::RevocationHandling => "REVOCATION_HANDLING",
            Self::ExcessiveRequests => "EXCESSIVE_REQUESTS",
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one rule: display name, description, and severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Human-readable rule name, also the idempotency key for audit
    /// records.
    pub name: String,
    /// What the rule enforces.
    pub description: String,
    /// Severity assigned to findings of this rule.
    pub severity: Severity,
}

/// An injectable table of rules keyed by [`RuleId`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCatalog {
    rules: BTreeMap<RuleId, RuleSpec>,
}

impl RuleCatalog {
    /// An empty catalog. Useful as a starting point for tests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard catalog: all eight rules with production severities.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(
            RuleId::ConsentValidity,
            RuleSpec {
                name: "Consent Validity Check".to_string(),
                description: "Ensures all data access has valid, explicit consent".to_string(),
                severity: Severity::High,
            },
        );
        catalog.insert(
            RuleId::PurposeLimitation,
            RuleSpec {
                name: "Purpose Limitation".to_string(),
                description: "Data access must align with stated purpose".to_string(),
                severity: Severity::High,
            },
        );
        catalog.insert(
            RuleId::DataMinimization,
            RuleSpec {
                name: "Data Minimization".to_string(),
                description: "Organizations should only request necessary data".to_string(),
                severity: Severity::Medium,
            },
        );
        catalog.insert(
            RuleId::RetentionPolicy,
            RuleSpec {
                name: "Data Retention Policy".to_string(),
                description: "Data should not be retained beyond stated purpose".to_string(),
                severity: Severity::Medium,
            },
        );
        catalog.insert(
            RuleId::AccessControl,
            RuleSpec {
                name: "Access Control".to_string(),
                description: "Unauthorized access attempts detected".to_string(),
                severity: Severity::Critical,
            },
        );
        catalog.insert(
            RuleId::AuditTrail,
            RuleSpec {
                name: "Audit Trail Completeness".to_string(),
                description: "All data access must be logged and auditable".to_string(),
                severity: Severity::High,
            },
        );
        catalog.insert(
            RuleId::RevocationHandling,
            RuleSpec {
                name: "Consent Revocation Handling".to_string(),
                description: "Revoked consents must be respected immediately".to_string(),
                severity: Severity::Critical,
            },
        );
        catalog.insert(
            RuleId::ExcessiveRequests,
            RuleSpec {
                name: "Excessive Data Requests".to_string(),
                description: "Unusual pattern of data access requests detected".to_string(),
                severity: Severity::Medium,
            },
        );
        catalog
    }

    /// Insert or replace a rule.
    pub fn insert(&mut self, id: RuleId, spec: RuleSpec) {
        self.rules.insert(id, spec);
    }

    /// Remove a rule, disabling it for any engine using this catalog.
    pub fn remove(&mut self, id: RuleId) -> Option<RuleSpec> {
        self.rules.remove(&id)
    }

    /// Look up a rule's metadata.
    pub fn spec(&self, id: RuleId) -> Option<&RuleSpec> {
        self.rules.get(&id)
    }

    /// The severity of a rule, defaulting to [`Severity::Medium`] when
    /// the rule is not in the catalog (findings referencing unknown
    /// rules still contribute to the risk score).
    pub fn severity_of(&self, id: RuleId) -> Severity {
        self.rules
            .get(&id)
            .map(|spec| spec.severity)
            .unwrap_or(Severity::Medium)
    }

    /// Whether the catalog contains a rule.
    pub fn contains(&self, id: RuleId) -> bool {
        self.rules.contains_key(&id)
    }

    /// Reverse lookup: the rule whose display name matches `name`.
    /// Persisted audit records key on rule name; this maps them back.
    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.rules
            .iter()
            .find(|(_, spec)| spec.name == name)
            .map(|(id, _)| *id)
    }

    /// Iterate rules in deterministic (BTreeMap) order.
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &RuleSpec)> {
        self.rules.iter().map(|(id, spec)| (*id, spec))
    }

    /// Number of rules in the catalog.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_eight_rules() {
        let catalog = RuleCatalog::standard();
        assert_eq!(catalog.len(), 8);
        for rule in RuleId::all() {
            assert!(catalog.contains(rule), "missing {rule}");
        }
    }

    #[test]
    fn standard_severities() {
        let catalog = RuleCatalog::standard();
        assert_eq!(catalog.severity_of(RuleId::ConsentValidity), Severity::High);
        assert_eq!(catalog.severity_of(RuleId::PurposeLimitation), Severity::High);
        assert_eq!(catalog.severity_of(RuleId::DataMinimization), Severity::Medium);
        assert_eq!(catalog.severity_of(RuleId::RetentionPolicy), Severity::Medium);
        assert_eq!(catalog.severity_of(RuleId::AccessControl), Severity::Critical);
        assert_eq!(catalog.severity_of(RuleId::AuditTrail), Severity::High);
        assert_eq!(
            catalog.severity_of(RuleId::RevocationHandling),
            Severity::Critical
        );
        assert_eq!(
            catalog.severity_of(RuleId::ExcessiveRequests),
            Severity::Medium
        );
    }

    #[test]
    fn severity_of_missing_rule_defaults_to_medium() {
        let catalog = RuleCatalog::empty();
        assert_eq!(catalog.severity_of(RuleId::AccessControl), Severity::Medium);
    }

    #[test]
    fn remove_disables_rule() {
        let mut catalog = RuleCatalog::standard();
        assert!(catalog.remove(RuleId::ExcessiveRequests).is_some());
        assert!(!catalog.contains(RuleId::ExcessiveRequests));
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn rule_by_name_reverse_lookup() {
        let catalog = RuleCatalog::standard();
        assert_eq!(
            catalog.rule_by_name("Consent Revocation Handling"),
            Some(RuleId::RevocationHandling)
        );
        assert_eq!(catalog.rule_by_name("No Such Rule"), None);
    }

    #[test]
    fn iteration_is_sorted_by_rule_id() {
        let catalog = RuleCatalog::standard();
        let ids: Vec<RuleId> = catalog.iter().map(|(id, _)| id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn rule_id_serde_screaming_case() {
        let json = serde_json::to_string(&RuleId::RevocationHandling).unwrap();
        assert_eq!(json, "\"REVOCATION_HANDLING\"");
        let back: RuleId = serde_json::from_str("\"CONSENT_VALIDITY\"").unwrap();
        assert_eq!(back, RuleId::ConsentValidity);
    }

    #[test]
    fn rule_id_display_matches_as_str() {
        for rule in RuleId::all() {
            assert_eq!(rule.to_string(), rule.as_str());
        }
    }
}
