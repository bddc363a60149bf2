//! # Notification Collaborator
//!
//! Outbound alerts for consent changes and recorded violations.
//! Delivery is fire-and-forget: failures are logged and swallowed, never
//! surfaced to the caller, and never roll back the write that triggered
//! them.

use std::sync::Arc;

use consentry_core::{OrgId, SubjectId, Timestamp};
use serde::Serialize;

/// A consent-change event delivered to affected organizations.
#[derive(Debug, Clone, Serialize)]
pub struct ConsentChangeEvent {
    /// The subject whose consent changed.
    pub subject: SubjectId,
    /// The consent type's display name.
    pub consent_type: String,
    /// The new access value.
    pub granted: bool,
    /// Organizations holding approved requests for the flipped pair.
    pub affected_organizations: Vec<OrgId>,
    /// When the change occurred.
    pub changed_at: Timestamp,
}

/// A violation-recorded event delivered to the oversight channel.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationEvent {
    /// The violating organization.
    pub organization: OrgId,
    /// Violation taxonomy value.
    pub violation_type: String,
    /// Whether the record was flagged for the oversight body.
    pub reported_to_oversight: bool,
    /// When the violation was recorded.
    pub detected_at: Timestamp,
}

/// The notification delivery contract. Implementations must not block
/// the caller and must not propagate failures.
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver a consent-change alert.
    fn consent_changed(&self, event: ConsentChangeEvent);

    /// Deliver a violation alert.
    fn violation_recorded(&self, event: ViolationEvent);
}

/// Default notifier: logs events and delivers nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn consent_changed(&self, event: ConsentChangeEvent) {
        tracing::debug!(
            subject = %event.subject,
            consent_type = %event.consent_type,
            granted = event.granted,
            affected = event.affected_organizations.len(),
            "consent change (notifications disabled)"
        );
    }

    fn violation_recorded(&self, event: ViolationEvent) {
        tracing::debug!(
            organization = %event.organization,
            violation_type = %event.violation_type,
            "violation recorded (notifications disabled)"
        );
    }
}

/// Webhook notifier: posts each event as JSON to a configured URL on a
/// spawned task. Any delivery error is logged at `warn` and dropped.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier targeting `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn post_json<T: Serialize>(&self, kind: &'static str, payload: &T) {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(kind, error = %e, "notification payload serialization failed");
                return;
            }
        };
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&serde_json::json!({ "event": kind, "payload": body }))
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(kind, status = %response.status(), "notification delivery rejected");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(kind, error = %e, "notification delivery failed");
                }
            }
        });
    }
}

impl Notifier for WebhookNotifier {
    fn consent_changed(&self, event: ConsentChangeEvent) {
        self.post_json("consent_changed", &event);
    }

    fn violation_recorded(&self, event: ViolationEvent) {
        self.post_json("violation_recorded", &event);
    }
}

/// Build the notifier from the environment: webhook delivery when
/// `NOTIFY_WEBHOOK_URL` is set, a no-op otherwise.
pub fn notifier_from_env() -> Arc<dyn Notifier> {
    match std::env::var("NOTIFY_WEBHOOK_URL") {
        Ok(url) if !url.trim().is_empty() => {
            tracing::info!(url = %url, "webhook notifications enabled");
            Arc::new(WebhookNotifier::new(url))
        }
        _ => Arc::new(NoopNotifier),
    }
}
