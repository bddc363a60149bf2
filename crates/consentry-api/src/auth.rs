//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control. The identity
//! collaborator issues tokens; this layer trusts the principal once the
//! shared secret matches — no credential re-validation happens here.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{id}:{secret}   — role ∈ {citizen, organization, staff}
//! Bearer {secret}               — legacy format (treated as staff)
//! ```
//!
//! The `{id}` field binds a citizen token to its subject or an
//! organization token to its organization; it is empty for staff.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into
//! the request extensions. Handlers extract it via `FromRequestParts`.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use consentry_core::{OrgId, SubjectId};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles supplied by the identity collaborator.
///
/// Citizen and organization are disjoint capabilities, not a privilege
/// ladder; staff passes every role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A data subject. Owns consent grants and decides access requests.
    Citizen,
    /// An organization principal. Files requests and runs scans.
    Organization,
    /// Platform staff. Full access to all resources.
    Staff,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Organization => "organization",
            Self::Staff => "staff",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The caller's role.
    pub role: Role,
    /// The subject binding (citizen tokens only).
    pub subject_id: Option<SubjectId>,
    /// The organization binding (organization tokens only).
    pub org_id: Option<OrgId>,
}

impl CallerIdentity {
    /// A staff identity with no bindings.
    pub fn staff() -> Self {
        Self {
            role: Role::Staff,
            subject_id: None,
            org_id: None,
        }
    }

    /// A citizen identity bound to a subject.
    pub fn citizen(subject_id: SubjectId) -> Self {
        Self {
            role: Role::Citizen,
            subject_id: Some(subject_id),
            org_id: None,
        }
    }

    /// An organization identity bound to an organization.
    pub fn organization(org_id: OrgId) -> Self {
        Self {
            role: Role::Organization,
            subject_id: None,
            org_id: Some(org_id),
        }
    }

    /// Whether the caller is staff.
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Require a citizen caller and return their subject binding.
pub fn require_citizen(caller: &CallerIdentity) -> Result<SubjectId, AppError> {
    match (&caller.role, &caller.subject_id) {
        (Role::Citizen, Some(subject)) => Ok(subject.clone()),
        (Role::Citizen, None) => Err(AppError::Unauthorized(
            "citizen token is missing its subject binding".into(),
        )),
        _ => Err(AppError::Forbidden(format!(
            "citizen role required, caller has '{}'",
            caller.role.as_str()
        ))),
    }
}

/// Require an organization caller and return their organization binding.
pub fn require_organization(caller: &CallerIdentity) -> Result<OrgId, AppError> {
    match (&caller.role, &caller.org_id) {
        (Role::Organization, Some(org)) => Ok(org.clone()),
        (Role::Organization, None) => Err(AppError::Unauthorized(
            "organization token is missing its organization binding".into(),
        )),
        _ => Err(AppError::Forbidden(format!(
            "organization role required, caller has '{}'",
            caller.role.as_str()
        ))),
    }
}

/// Require a staff caller.
pub fn require_staff(caller: &CallerIdentity) -> Result<(), AppError> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "staff role required, caller has '{}'",
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token to prevent credential leakage in
/// logs.
#[derive(Clone)]
pub struct AuthConfig {
    /// The shared secret, or `None` to disable authentication
    /// (development mode — every request becomes staff).
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, a dummy comparison keeps timing constant
/// regardless of the mismatch position.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token in format `{role}:{id}:{secret}` or `{secret}`
/// (legacy, treated as staff).
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.len() {
        // Legacy format: just the secret.
        1 => {
            if constant_time_token_eq(provided, expected_secret) {
                Ok(CallerIdentity::staff())
            } else {
                Err("invalid bearer token".into())
            }
        }
        3 => {
            let role_str = parts[0];
            let id_str = parts[1];
            let secret = parts[2];

            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }

            let id = if id_str.is_empty() {
                None
            } else {
                Some(
                    id_str
                        .parse::<Uuid>()
                        .map_err(|e| format!("invalid principal id: {e}"))?,
                )
            };

            match role_str {
                "citizen" => match id {
                    Some(id) => Ok(CallerIdentity::citizen(SubjectId::from_uuid(id))),
                    None => Err("citizen token requires a subject id".into()),
                },
                "organization" => match id {
                    Some(id) => Ok(CallerIdentity::organization(OrgId::from_uuid(id))),
                    None => Err("organization token requires an organization id".into()),
                },
                "staff" => Ok(CallerIdentity::staff()),
                other => Err(format!("unknown role: {other}")),
            }
        }
        _ => Err("invalid token format — expected {role}:{id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Extract and validate the Bearer token from the Authorization header,
/// injecting the parsed [`CallerIdentity`] into request extensions.
///
/// When `AuthConfig.token` is `None`, all requests are allowed with
/// staff identity (auth disabled / development mode).
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    let provided = &header_value[7..];
                    match parse_bearer_token(provided, expected) {
                        Ok(identity) => {
                            request.extensions_mut().insert(identity);
                            next.run(request).await
                        }
                        Err(msg) => {
                            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                            unauthorized_response(&msg)
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            // Auth disabled — inject staff identity for full access.
            request.extensions_mut().insert(CallerIdentity::staff());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
