#![deny(missing_docs)]

//! # consentry-core — Foundational Types for the Consentry Platform
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `thiserror`, `chrono`, and `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass a [`SubjectId`] where an [`OrgId`] is
//!    expected.
//!
//! 2. **UTC-only timestamps.** All timestamps flow through [`Timestamp`];
//!    local time is a presentation concern for clients.
//!
//! 3. **Single [`Severity`] enum.** One definition shared by the rule
//!    catalog, the audit records, and the risk scorer. No independent
//!    severity lists that can diverge.
//!
//! 4. **[`ConsentryError`] hierarchy.** Structured errors with `thiserror`
//!    — no `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod severity;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{ConsentryError, ValidationError};
pub use identity::{AuditId, ConsentTypeId, OrgId, RequestId, SubjectId, ViolationId};
pub use severity::Severity;
pub use temporal::Timestamp;
