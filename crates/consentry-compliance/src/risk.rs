//! # Risk Scorer
//!
//! Pure severity-weighted summation with a cap. No side effects, no
//! clock — separately unit-testable from a literal list of findings.

use crate::catalog::RuleCatalog;
use crate::engine::Finding;

/// Upper bound of the risk score.
pub const RISK_SCORE_CAP: u32 = 100;

/// Compute the risk score for a list of findings.
///
/// Each finding contributes its rule's severity weight (CRITICAL=20,
/// HIGH=15, MEDIUM=10, LOW=5); findings whose rule is absent from the
/// catalog contribute the MEDIUM weight. The sum is capped at 100.
/// Empty input yields 0. Summation is commutative, so the order of
/// findings never affects the result.
pub fn calculate_risk_score(catalog: &RuleCatalog, findings: &[Finding]) -> u32 {
    let total: u32 = findings
        .iter()
        .map(|f| catalog.severity_of(f.rule).risk_weight())
        .sum();
    total.min(RISK_SCORE_CAP)
}
