// file: src/mail/mod.rs
// description: outgoing notification model and the mail transport seam
// reference: https://docs.rs/lettre

pub mod compose;
pub mod smtp;
pub mod template;

pub use compose::MessageComposer;
pub use smtp::SmtpMailer;
pub use template::EmailTemplate;

use crate::error::Result;
use async_trait::async_trait;
use crate::utils::Validator;
use tracing::{debug, info};

/// Content-ID the HTML template references as `cid:qr_code`.
pub const QR_CONTENT_ID: &str = "qr_code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One composed notification, independent of the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: String,
    pub recipient_name: String,
    pub subject: String,
    pub html_body: String,
    pub inline_image: Option<AttachmentPart>,
    pub attachment: Option<AttachmentPart>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<()>;
}

/// Logs what would be sent. Used for dry runs.
pub struct PreviewTransport;

#[async_trait]
impl MailTransport for PreviewTransport {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        info!(
            "[dry-run] {} <{}> subject='{}' inline_image={} attachment={}",
            envelope.recipient_name,
            envelope.to,
            envelope.subject,
            envelope
                .inline_image
                .as_ref()
                .map(|p| p.filename.as_str())
                .unwrap_or("none"),
            envelope
                .attachment
                .as_ref()
                .map(|p| p.filename.as_str())
                .unwrap_or("none"),
        );
        debug!("[dry-run] body: {}", Validator::truncate_text(&envelope.html_body, 200));
        Ok(())
    }
}
