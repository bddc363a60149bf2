//! # consentry-trust — Trust Score Engine
//!
//! Computes a weighted multi-component trust score per organization,
//! maps it to a discrete trust level, and manages certificate issuance
//! state:
//!
//! - [`TrustScoreEngine`]: five independently-computed components
//!   (compliance, data integrity, consent respect, transparency, user
//!   satisfaction), each clamped to [0, 100], combined by fixed weights
//!   summing to 1.0. The compliance component reuses the risk score from
//!   a fresh rule-engine run.
//!
//! - [`OrgDirectory`]: the organization records with their cached trust
//!   snapshot. Recomputation is the snapshot's **only writer** and is
//!   applied as a single atomic read-modify-write, including the
//!   certificate transition. Readers may see stale values between
//!   recalculations — the snapshot is a derived cache, never the source
//!   of truth.
//!
//! - [`integrity`]: SHA-256 checksums over canonical request snapshots
//!   and an organization-wide consistency report.

pub mod directory;
pub mod engine;
pub mod integrity;
pub mod score;

pub use directory::{
    CertificateTransition, DirectoryError, OrgDirectory, OrganizationRecord,
    CERTIFICATE_THRESHOLD,
};
pub use engine::{RankedOrganization, TrustScoreEngine, USER_SATISFACTION_PLACEHOLDER};
pub use integrity::{request_checksum, verify_checksum, IntegrityReport};
pub use score::{ComponentWeights, TrustComponents, TrustLevel, TrustScore};
