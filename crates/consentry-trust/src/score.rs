//! # Trust Score Types
//!
//! The weighted component model and the discrete trust-level bands.

use consentry_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Discrete trust level, a lookup into disjoint score bands.
///
/// Bands are contiguous and half-open below the next floor, so every
/// score in [0, 100] maps to exactly one level: EXCELLENT [90, 100],
/// VERIFIED [75, 90), GOOD [60, 75), BASIC [40, 60), LOW [0, 40).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// Score in [0, 40), or any score outside [0, 100] (defensive).
    Low,
    /// Score in [40, 60).
    Basic,
    /// Score in [60, 75).
    Good,
    /// Score in [75, 90).
    Verified,
    /// Score in [90, 100].
    Excellent,
}

impl TrustLevel {
    /// Map an overall score to its trust level.
    ///
    /// Scores outside [0, 100] should never occur (components are
    /// clamped and weights sum to 1.0) but map to LOW rather than
    /// panicking.
    pub fn from_score(score: f64) -> Self {
        if (90.0..=100.0).contains(&score) {
            Self::Excellent
        } else if (75.0..90.0).contains(&score) {
            Self::Verified
        } else if (60.0..75.0).contains(&score) {
            Self::Good
        } else if (40.0..60.0).contains(&score) {
            Self::Basic
        } else if (0.0..40.0).contains(&score) {
            Self::Low
        } else {
            Self::Low
        }
    }

    /// Return the string representation of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Basic => "BASIC",
            Self::Good => "GOOD",
            Self::Verified => "VERIFIED",
            Self::Excellent => "EXCELLENT",
        }
    }

    /// Parse a stored level string, defaulting unknown values to LOW.
    pub fn parse_or_low(s: &str) -> Self {
        match s {
            "EXCELLENT" => Self::Excellent,
            "VERIFIED" => Self::Verified,
            "GOOD" => Self::Good,
            "BASIC" => Self::Basic,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed component weights, summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    /// Weight of the compliance component.
    pub compliance: f64,
    /// Weight of the data-integrity component.
    pub data_integrity: f64,
    /// Weight of the consent-respect component.
    pub consent_respect: f64,
    /// Weight of the transparency component.
    pub transparency: f64,
    /// Weight of the user-satisfaction component.
    pub user_satisfaction: f64,
}

impl ComponentWeights {
    /// Sum of all weights. Should be 1.0 for a normalized model.
    pub fn sum(&self) -> f64 {
        self.compliance
            + self.data_integrity
            + self.consent_respect
            + self.transparency
            + self.user_satisfaction
    }

    /// Whether the weights sum to 1.0 within floating-point tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() < 1e-9
    }
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            compliance: 0.40,
            data_integrity: 0.25,
            consent_respect: 0.20,
            transparency: 0.10,
            user_satisfaction: 0.05,
        }
    }
}

/// The five component scores, each in [0, 100], rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustComponents {
    /// `100 − riskScore` from a fresh rule-engine run.
    pub compliance: f64,
    /// Penalized by unresolved privacy-breach/audit-failure violations.
    pub data_integrity: f64,
    /// Fraction of requests backed by a currently-valid grant, penalized
    /// by the revoked fraction.
    pub consent_respect: f64,
    /// Clear-purpose fraction plus recency of activity.
    pub transparency: f64,
    /// Fixed placeholder until a feedback subsystem exists.
    pub user_satisfaction: f64,
}

/// A computed trust score: the weighted overall value, its level, the
/// component breakdown, and when it was calculated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    /// Weighted sum of components, rounded to 2 decimals.
    pub overall_score: f64,
    /// Band containing `overall_score`.
    pub trust_level: TrustLevel,
    /// Component breakdown.
    pub components: TrustComponents,
    /// When the score was computed.
    pub calculated_at: Timestamp,
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
