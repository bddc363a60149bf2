//! # Error Hierarchy
//!
//! Structured error types for the whole platform, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! The variants mirror how failures surface to callers: a missing
//! referenced record is never retried, a malformed transition is rejected
//! without partial application, and an unexpected computation failure
//! fails the whole operation rather than silently skipping records (a
//! partial scan could under-report risk).

use thiserror::Error;

/// Top-level error type for the Consentry platform.
#[derive(Error, Debug)]
pub enum ConsentryError {
    /// A referenced organization, consent type, subject, or audit record
    /// does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Domain validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The caller's role does not permit the attempted operation.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A uniqueness constraint rejected the write (e.g., a duplicate
    /// access-request triple).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected failure inside rule evaluation or scoring. Fails the
    /// whole scan — a partial result could under-report risk.
    #[error("computation error: {0}")]
    Computation(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors for domain values.
///
/// Each variant carries the invalid input so operators can diagnose
/// misconfiguration without guesswork.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// An access-request purpose was empty or whitespace-only.
    #[error("purpose must not be empty")]
    EmptyPurpose,

    /// An audit status transition named a status outside the defined set.
    #[error("invalid audit status: \"{0}\" (expected PENDING, INVESTIGATING, RESOLVED, or IGNORED)")]
    InvalidAuditStatus(String),

    /// A request status transition named a status outside the defined set.
    #[error("invalid request status: \"{0}\" (expected PENDING, APPROVED, or REVOKED)")]
    InvalidRequestStatus(String),

    /// A consent duration was zero or negative.
    #[error("invalid consent duration: {0} days (must be positive)")]
    InvalidDuration(i64),

    /// A ranking limit was zero.
    #[error("ranking limit must be positive")]
    ZeroLimit,
}
