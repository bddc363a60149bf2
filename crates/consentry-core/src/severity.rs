//! # Severity Taxonomy
//!
//! The single severity scale shared by the rule catalog, persisted audit
//! records, and the risk scorer. One definition, exhaustive `match`
//! everywhere — no independent severity lists that can diverge.

use serde::{Deserialize, Serialize};

/// Severity of a compliance rule or finding, ordered from least to most
/// severe.
///
/// The `Ord` derivation respects variant declaration order:
/// `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational; contributes the smallest risk weight.
    Low,
    /// Default severity for unclassified findings.
    Medium,
    /// Serious violation requiring prompt remediation.
    High,
    /// Violation requiring immediate action and oversight reporting.
    Critical,
}

impl Severity {
    /// Risk-score weight contributed by one finding of this severity.
    ///
    /// Summed over all findings and capped at 100 by the risk scorer.
    pub fn risk_weight(&self) -> u32 {
        match self {
            Self::Low => 5,
            Self::Medium => 10,
            Self::High => 15,
            Self::Critical => 20,
        }
    }

    /// Whether findings of this severity produce a violation report in
    /// addition to an audit record.
    pub fn warrants_violation_report(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Return the string representation of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse a stored severity string, defaulting unknown values to
    /// [`Severity::Medium`].
    pub fn parse_or_medium(s: &str) -> Self {
        match s {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            "CRITICAL" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
