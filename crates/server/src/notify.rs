//! Confirmation email delivery.
//!
//! Registration hands each confirmation to a bounded queue and returns
//! immediately. A background dispatcher drains the queue and posts each
//! email to a Resend-compatible API. Delivery failures are logged and
//! counted, never retried, and never surface to the API caller.

use crate::metrics::{NOTIFICATIONS_DROPPED, NOTIFICATIONS_FAILED, NOTIFICATIONS_SENT};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use vaxtrack_core::config::NotificationConfig;
use vaxtrack_core::{CertId, VaccinationRecord};

/// Subject line of every confirmation email.
pub const CONFIRMATION_SUBJECT: &str = "Vaccination Registration Confirmation";

/// Errors from the email API.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A rendered confirmation email.
#[derive(Clone, Debug)]
pub struct ConfirmationEmail {
    pub cert_id: CertId,
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl ConfirmationEmail {
    /// Render the confirmation for `record`, or `None` if it has no email address.
    pub fn for_record(record: &VaccinationRecord) -> Option<Self> {
        let to = record.email.as_deref()?.trim();
        if to.is_empty() {
            return None;
        }
        Some(Self {
            cert_id: record.cert_id.clone(),
            to: to.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            html: render_confirmation_html(record),
        })
    }
}

/// Outbound email transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Notifier for the Resend `POST /emails` API.
pub struct ResendNotifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendNotifier {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendEmailRequest {
                from: &self.from,
                to: [&email.to],
                subject: &email.subject,
                html: &email.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// What happened to a confirmation handed to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Delivery is not configured.
    Disabled,
    /// The record has no email address.
    NoRecipient,
    QueueFull,
    QueueClosed,
}

/// Sending half of the notification queue.
#[derive(Clone, Debug, Default)]
pub struct NotificationQueue {
    tx: Option<mpsc::Sender<ConfirmationEmail>>,
}

impl NotificationQueue {
    /// A queue that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a queue without a dispatcher; the caller owns the receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ConfirmationEmail>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Create a queue drained by a background task that sends through `notifier`.
    ///
    /// The task exits once every clone of the queue has been dropped and the
    /// remaining emails have been sent.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_dispatcher(rx, notifier));
        (queue, handle)
    }

    /// Build the queue described by `config`.
    ///
    /// Delivery is disabled, with a log line saying why, when turned off or
    /// when no usable API key is configured.
    pub fn from_config(
        config: &NotificationConfig,
    ) -> Result<(Self, Option<JoinHandle<()>>), NotifyError> {
        if !config.enabled {
            tracing::info!("Confirmation emails disabled by configuration");
            return Ok((Self::disabled(), None));
        }

        let Some(api_key) = config.resolve_api_key() else {
            tracing::warn!(
                api_key_env = config.api_key_env.as_deref().unwrap_or("<none>"),
                "Email API key is missing or a placeholder; confirmation emails will not be sent"
            );
            return Ok((Self::disabled(), None));
        };

        let notifier = ResendNotifier::new(
            config.api_url.clone(),
            api_key,
            config.from.clone(),
            config.timeout(),
        )?;
        tracing::info!(
            api_url = %config.api_url,
            queue_capacity = config.queue_capacity,
            "Confirmation emails enabled"
        );

        let (queue, handle) = Self::spawn(Arc::new(notifier), config.queue_capacity);
        Ok((queue, Some(handle)))
    }

    /// Queue the confirmation for `record` without waiting.
    pub fn enqueue(&self, record: &VaccinationRecord) -> EnqueueOutcome {
        let Some(tx) = &self.tx else {
            return EnqueueOutcome::Disabled;
        };
        let Some(email) = ConfirmationEmail::for_record(record) else {
            tracing::debug!(cert_id = %record.cert_id, "No email address, skipping confirmation");
            return EnqueueOutcome::NoRecipient;
        };

        match tx.try_send(email) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(email)) => {
                NOTIFICATIONS_DROPPED.inc();
                tracing::warn!(
                    cert_id = %email.cert_id,
                    "Notification queue full, dropping confirmation"
                );
                EnqueueOutcome::QueueFull
            }
            Err(TrySendError::Closed(email)) => {
                NOTIFICATIONS_DROPPED.inc();
                tracing::warn!(
                    cert_id = %email.cert_id,
                    "Notification queue closed, dropping confirmation"
                );
                EnqueueOutcome::QueueClosed
            }
        }
    }
}

async fn run_dispatcher(mut rx: mpsc::Receiver<ConfirmationEmail>, notifier: Arc<dyn Notifier>) {
    while let Some(email) = rx.recv().await {
        match notifier.send(&email).await {
            Ok(()) => {
                NOTIFICATIONS_SENT.inc();
                tracing::info!(cert_id = %email.cert_id, "Confirmation email sent");
            }
            Err(e) => {
                NOTIFICATIONS_FAILED.inc();
                tracing::warn!(
                    cert_id = %email.cert_id,
                    error = %e,
                    "Failed to send confirmation email"
                );
            }
        }
    }
    tracing::debug!("Notification queue closed, dispatcher exiting");
}

/// Escape text for interpolation into HTML.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        "<div class=\"detail-row\"><div class=\"detail-label\">{label}:</div><div>{}</div></div>\n",
        escape_html(value)
    )
}

/// Render the confirmation email body.
pub fn render_confirmation_html(record: &VaccinationRecord) -> String {
    let mut details = String::new();
    details.push_str(&detail_row("Name", &record.name));
    details.push_str(&detail_row("Vaccine Type", &record.vaccine_type));
    details.push_str(&detail_row("Dose", &record.dose_label()));
    details.push_str(&detail_row("Date", &record.date_administered));
    details.push_str(&detail_row(
        "Location",
        &format!("{}, {}", record.district, record.state),
    ));
    if let Some(officer) = &record.administering_officer {
        details.push_str(&detail_row("Officer", officer));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
.container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
.header {{ background-color: #4F46E5; color: white; padding: 20px; text-align: center; }}
.cert-id {{ font-size: 24px; font-weight: bold; color: #4F46E5; text-align: center; padding: 15px; }}
.detail-row {{ display: flex; padding: 10px 0; border-bottom: 1px solid #e5e7eb; }}
.detail-label {{ font-weight: bold; width: 150px; }}
.footer {{ text-align: center; padding: 20px; color: #6b7280; font-size: 14px; }}
</style>
</head>
<body>
<div class="container">
<div class="header"><h1>{subject}</h1></div>
<p>Dear {name},</p>
<p>Your vaccination has been successfully registered in our system.</p>
<div class="cert-id">Certificate ID: {cert_id}</div>
<p><strong>Please save this Certificate ID for future reference.</strong> You will need it to retrieve your vaccination certificate.</p>
<h3>Vaccination Details</h3>
{details}<p>You can retrieve your vaccination certificate anytime using your Certificate ID.</p>
<div class="footer"><p>This is an automated message. Please do not reply to this email.</p></div>
</div>
</body>
</html>
"#,
        subject = CONFIRMATION_SUBJECT,
        name = escape_html(&record.name),
        cert_id = escape_html(record.cert_id.as_str()),
    )
}
