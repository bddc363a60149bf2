//! API route modules.
//!
//! Each module builds its own `Router<AppState>`; `crate::app` merges
//! them and applies the middleware stack. `trust::public_router` and
//! `reports` are mounted outside the auth middleware.

pub mod compliance;
pub mod consents;
pub mod directory;
pub mod reports;
pub mod requests;
pub mod trust;
