//! Assignment notification boundary.
//!
//! The rotator hands a lead snapshot to a `Notifier` after every successful
//! assignment. Delivery is fire-and-forget: it runs on its own thread and a
//! failure is logged, never surfaced to the caller of the assignment.

use std::sync::Arc;

use serde::Serialize;

use crate::db::{DbCaller, DbLead};

/// What the notifier receives: the caller's contact address plus a snapshot
/// of the lead at assignment time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentNotice {
    pub recipient_email: String,
    pub caller_name: String,
    pub lead_id: String,
    pub lead_name: String,
    pub phone: String,
    pub email: String,
    pub value: f64,
    pub source: String,
    pub city: String,
}

impl AssignmentNotice {
    pub fn new(caller: &DbCaller, lead: &DbLead) -> Self {
        AssignmentNotice {
            recipient_email: caller.email.clone(),
            caller_name: caller.display_name().to_string(),
            lead_id: lead.id.clone(),
            lead_name: lead.name.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            value: lead.value,
            source: lead.source.clone(),
            city: lead.city.clone(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &AssignmentNotice) -> Result<(), String>;
}

/// POSTs the notice as JSON to a configured webhook endpoint.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        WebhookNotifier {
            url,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notice: &AssignmentNotice) -> Result<(), String> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .map_err(|e| format!("webhook request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("webhook returned {}", response.status()));
        }
        Ok(())
    }
}

/// Discards every notice. Used in tests and when no webhook is configured.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: &AssignmentNotice) -> Result<(), String> {
        Ok(())
    }
}

/// Build the notifier implied by the store's settings: webhook when a URL is
/// configured, otherwise a no-op.
pub fn notifier_from_settings(db: &crate::db::CrmDb) -> Arc<dyn Notifier> {
    match db.notify_webhook_url() {
        Ok(Some(url)) => Arc::new(WebhookNotifier::new(url)),
        Ok(None) => Arc::new(NullNotifier),
        Err(e) => {
            log::warn!("Failed to read notifier settings, notifications disabled: {e}");
            Arc::new(NullNotifier)
        }
    }
}

/// Dispatch a notice without blocking the caller. The assignment result is
/// already persisted by the time this runs; a delivery failure only warns.
pub fn dispatch(notifier: Arc<dyn Notifier>, notice: AssignmentNotice) {
    std::thread::spawn(move || {
        if let Err(e) = notifier.notify(&notice) {
            log::warn!(
                "Assignment notification for lead {} failed: {e}",
                notice.lead_id
            );
        }
    });
}
