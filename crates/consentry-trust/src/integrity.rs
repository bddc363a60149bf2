//! # Data Integrity Verification
//!
//! SHA-256 checksums over canonical JSON snapshots of access requests,
//! and an organization-wide consistency report. Serde's default map
//! representation keeps object keys sorted, so serializing a snapshot
//! yields canonical bytes without extra machinery.

use consentry_core::{OrgId, Timestamp};
use consentry_ledger::{AccessLog, AccessRequest, RequestStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An organization-wide integrity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Requests examined.
    pub total_requests: usize,
    /// Requests that passed every consistency check.
    pub verified_count: usize,
    /// Human-readable descriptions of each inconsistency found.
    pub issues: Vec<String>,
    /// When the verification ran.
    pub verified_at: Timestamp,
}

/// Compute the SHA-256 checksum of an access request's canonical JSON
/// snapshot, as lowercase hex.
pub fn request_checksum(request: &AccessRequest) -> String {
    let snapshot = serde_json::json!({
        "id": request.id,
        "organization_id": request.organization,
        "subject_id": request.subject,
        "consent_type_id": request.consent_type,
        "status": request.status,
        "purpose": request.purpose,
        "requested_at": request.requested_at,
    });
    // Map keys serialize sorted, so this string is canonical.
    let canonical = snapshot.to_string();
    sha256_hex(canonical.as_bytes())
}

/// Verify a request against a previously stored checksum.
pub fn verify_checksum(request: &AccessRequest, expected: &str) -> bool {
    request_checksum(request) == expected
}

/// Verify consistency of all of an organization's requests.
///
/// Flags approved requests without a documented purpose and requests
/// stamped in the future — both indicate tampered or malformed rows.
pub fn verify_organization(log: &AccessLog, organization: &OrgId, now: Timestamp) -> IntegrityReport {
    let requests = log.for_org(organization);
    let total_requests = requests.len();
    let mut issues = Vec::new();

    for request in &requests {
        if request.status == RequestStatus::Approved && request.purpose.is_none() {
            issues.push(format!(
                "request {} is approved without a documented purpose",
                request.id
            ));
        }
        if request.requested_at > now {
            issues.push(format!(
                "request {} is stamped in the future ({})",
                request.id, request.requested_at
            ));
        }
    }

    IntegrityReport {
        total_requests,
        verified_count: total_requests - issues.len().min(total_requests),
        issues,
        verified_at: now,
    }
}

fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
