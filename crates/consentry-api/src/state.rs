//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The in-memory stores are the synchronous source of truth for request
//! handling; the optional Postgres pool mirrors writes for durability
//! and hydrates the stores on startup. Handlers never hold a store lock
//! across an `.await` point.

use std::sync::Arc;

use consentry_compliance::{AuditStore, ComplianceEngine};
use consentry_ledger::{AccessLog, ConsentLedger};
use consentry_trust::{OrgDirectory, TrustScoreEngine};
use sqlx::PgPool;

use crate::notify::{Notifier, NoopNotifier};

/// Application configuration.
///
/// Custom `Debug` redacts the auth token to prevent credential leakage
/// in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

/// Shared application state accessible to all route handlers.
/// Clone-friendly via `Arc` internals in each store.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Consent types, grants, and history.
    pub ledger: ConsentLedger,
    /// Access requests.
    pub access_log: AccessLog,
    /// Persisted audits and violation reports.
    pub audit_store: AuditStore,
    /// Organization records with cached trust snapshots.
    pub directory: OrgDirectory,
    /// The rule engine used by scans.
    pub compliance_engine: ComplianceEngine,
    /// The trust score engine.
    pub trust_engine: TrustScoreEngine,
    /// Outbound notification delivery (fire-and-forget).
    pub notifier: Arc<dyn Notifier>,
    /// PostgreSQL pool for durable persistence. `None` = in-memory only.
    pub db_pool: Option<PgPool>,
    /// Application configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Create application state with default configuration, the standard
    /// rule catalog, and notifications disabled.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), Arc::new(NoopNotifier), None)
    }

    /// Create application state with explicit configuration, notifier,
    /// and optional database pool.
    pub fn with_config(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            ledger: ConsentLedger::new(),
            access_log: AccessLog::new(),
            audit_store: AuditStore::new(),
            directory: OrgDirectory::new(),
            compliance_engine: ComplianceEngine::standard(),
            trust_engine: TrustScoreEngine::standard(),
            notifier,
            db_pool,
            config,
        }
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a pool is available. Read operations
    /// stay fast and synchronous afterwards.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let types = crate::db::consents::load_types(pool)
            .await
            .map_err(|e| format!("failed to load consent types: {e}"))?;
        let type_count = types.len();
        for record in types {
            self.ledger.restore_type(record);
        }

        let grants = crate::db::consents::load_grants(pool)
            .await
            .map_err(|e| format!("failed to load consent grants: {e}"))?;
        let grant_count = grants.len();
        for record in grants {
            self.ledger.restore_grant(record);
        }

        let history = crate::db::consents::load_history(pool)
            .await
            .map_err(|e| format!("failed to load consent history: {e}"))?;
        let history_count = history.len();
        for entry in history {
            self.ledger.restore_history(entry);
        }

        let requests = crate::db::access_requests::load_all(pool)
            .await
            .map_err(|e| format!("failed to load access requests: {e}"))?;
        let request_count = requests.len();
        for record in requests {
            self.access_log.restore(record);
        }

        let audits = crate::db::audits::load_audits(pool)
            .await
            .map_err(|e| format!("failed to load compliance audits: {e}"))?;
        let audit_count = audits.len();
        for record in audits {
            self.audit_store.restore_audit(record);
        }

        let violations = crate::db::audits::load_violations(pool)
            .await
            .map_err(|e| format!("failed to load violation reports: {e}"))?;
        let violation_count = violations.len();
        for record in violations {
            self.audit_store.restore_violation(record);
        }

        let organizations = crate::db::organizations::load_all(pool)
            .await
            .map_err(|e| format!("failed to load organizations: {e}"))?;
        let org_count = organizations.len();
        for record in organizations {
            self.directory.upsert(record);
        }

        tracing::info!(
            consent_types = type_count,
            grants = grant_count,
            history = history_count,
            requests = request_count,
            audits = audit_count,
            violations = violation_count,
            organizations = org_count,
            "hydrated in-memory stores from database"
        );
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
