//! # consentry-ledger — Consent Ledger & Access Request Log
//!
//! The two leaf data stores of the platform:
//!
//! - [`ConsentLedger`]: the grant/revoke state for each (subject,
//!   consent-type) pair, with an append-only history of every transition
//!   and an expiry sweep for time-limited grants.
//!
//! - [`AccessLog`]: each organization's historical requests to access a
//!   subject's consented data, unique per (organization, subject,
//!   consent-type) triple.
//!
//! ## Transitions are explicit
//!
//! A consent state change is a value, not a side effect: the pure
//! constructors on [`ConsentGrant`] return a [`ConsentTransition`]
//! carrying both the updated grant and the single history entry for the
//! change. The ledger applies both under one write lock, so a grant row
//! and its history can never diverge. Nothing fires implicitly on save.
//!
//! ## Concurrency
//!
//! Stores are `parking_lot::RwLock`-backed and never hold a lock across
//! an `.await` point. A compliance scan may observe a grant
//! mid-transition; that is acceptable — the next scan catches it.

pub mod access;
pub mod consent;
pub mod error;
pub mod ledger;

pub use access::{AccessLog, AccessRequest, RequestDecision, RequestStatus};
pub use consent::{
    ConsentAction, ConsentGrant, ConsentHistoryEntry, ConsentTransition, ConsentType,
};
pub use error::LedgerError;
pub use ledger::{ConsentLedger, ConsentStatus, ExpirySweep, ExpiredGrant, ExpiringGrant};
