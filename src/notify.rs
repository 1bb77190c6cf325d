//! Best-effort submitter notification.
//!
//! Delivery is an external collaborator: the pipeline only depends on the
//! [`Notifier`] trait, and a notification failure is never allowed to block
//! or fail a submission. The default sink writes the receipt to the log,
//! which is what the demo deployment wants.

use anyhow::Result;

use crate::submission::types::{Status, Verdict};

/// Boundary trait for delivering a submission receipt to the submitter.
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// Notifier that records receipts in the log instead of delivering them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(recipient = %recipient, subject = %subject, body = %body, "notification");
        Ok(())
    }
}

/// Create a notifier from config. Only the logging sink is currently wired.
pub fn create_notifier() -> Box<dyn Notifier> {
    Box::new(LogNotifier)
}

/// Compose and send the receipt for an accepted submission. Failures are
/// logged and swallowed.
pub fn notify_receipt(
    notifier: &dyn Notifier,
    email: &str,
    application_id: &str,
    verdict: Verdict,
    status: Status,
) {
    let subject = format!("Application {application_id} received");
    let body = match status {
        Status::Error => format!(
            "Your application {application_id} was received and recorded, but the photo \
             could not be analyzed. It has been queued for manual review."
        ),
        _ => format!(
            "Your application {application_id} was received. Photo screening result: {verdict}."
        ),
    };

    if let Err(e) = notifier.send(email, &subject, &body) {
        tracing::warn!(recipient = %email, error = %e, "notification failed");
    }
}
