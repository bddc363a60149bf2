//! Ledger error types.

use consentry_core::{ConsentTypeId, OrgId, RequestId, SubjectId, ValidationError};
use thiserror::Error;

/// Errors raised by the consent ledger and access log.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The referenced consent type is not registered.
    #[error("unknown consent type: {0}")]
    UnknownConsentType(ConsentTypeId),

    /// The referenced access request does not exist.
    #[error("unknown access request: {0}")]
    UnknownRequest(RequestId),

    /// No grant exists for the (subject, consent-type) pair.
    #[error("no consent grant for subject {subject} and consent type {consent_type}")]
    UnknownGrant {
        /// The subject queried.
        subject: SubjectId,
        /// The consent type queried.
        consent_type: ConsentTypeId,
    },

    /// An access request for this (organization, subject, consent-type)
    /// triple already exists. The uniqueness constraint is load-bearing:
    /// it prevents duplicate simultaneous requests for the same data.
    #[error("access request already exists for organization {organization}, subject {subject}, consent type {consent_type}")]
    DuplicateRequest {
        /// The requesting organization.
        organization: OrgId,
        /// The subject whose data is requested.
        subject: SubjectId,
        /// The consent type requested.
        consent_type: ConsentTypeId,
    },

    /// The caller is not the subject of the request being decided.
    #[error("subject {subject} cannot decide access request {request} owned by another subject")]
    NotRequestSubject {
        /// The request being decided.
        request: RequestId,
        /// The caller.
        subject: SubjectId,
    },

    /// Domain validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_request_display_names_all_three_keys() {
        let org = OrgId::new();
        let subject = SubjectId::new();
        let consent_type = ConsentTypeId::new();
        let err = LedgerError::DuplicateRequest {
            organization: org.clone(),
            subject: subject.clone(),
            consent_type: consent_type.clone(),
        };
        let msg = format!("{err}");
        assert!(msg.contains(&org.to_string()));
        assert!(msg.contains(&subject.to_string()));
        assert!(msg.contains(&consent_type.to_string()));
    }

    #[test]
    fn validation_error_passes_through() {
        let err = LedgerError::from(ValidationError::EmptyPurpose);
        assert!(format!("{err}").contains("purpose"));
    }
}
