// file: src/mail/smtp.rs
// description: STARTTLS SMTP transport built on lettre
// reference: https://docs.rs/lettre

use crate::config::MailConfig;
use crate::error::{PipelineError, Result};
use crate::mail::{Envelope, MailTransport, QR_CONTENT_ID};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Requires sender address and password; run `Config::validate_for_send` first.
    pub fn new(config: &MailConfig) -> Result<Self> {
        let sender = config
            .sender_email
            .clone()
            .ok_or_else(|| PipelineError::Config("SENDER_EMAIL is not set".to_string()))?;
        let password = config
            .sender_password
            .clone()
            .ok_or_else(|| PipelineError::Config("SENDER_PASSWORD is not set".to_string()))?;

        let from: Mailbox = sender
            .parse()
            .map_err(|e| PipelineError::Config(format!("Invalid sender {}: {}", sender, e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| PipelineError::Config(format!("Invalid SMTP relay: {}", e)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(sender, password))
            .build();

        Ok(Self { transport, from })
    }

    /// HTML body and inline QR image share a multipart/related part; the
    /// shared document rides alongside in multipart/mixed.
    pub fn build_message(from: &Mailbox, envelope: &Envelope) -> Result<Message> {
        let to: Mailbox = envelope.to.parse().map_err(|e| {
            PipelineError::Transport(format!("Invalid recipient {}: {}", envelope.to, e))
        })?;

        let mut related = MultiPart::related().singlepart(SinglePart::html(envelope.html_body.clone()));
        if let Some(image) = &envelope.inline_image {
            related = related.singlepart(
                Attachment::new_inline(QR_CONTENT_ID.to_string())
                    .body(image.bytes.clone(), parse_content_type(&image.content_type)?),
            );
        }

        let mut body = MultiPart::mixed().multipart(related);
        if let Some(document) = &envelope.attachment {
            body = body.singlepart(
                Attachment::new(document.filename.clone())
                    .body(document.bytes.clone(), parse_content_type(&document.content_type)?),
            );
        }

        Message::builder()
            .from(from.clone())
            .to(to)
            .subject(envelope.subject.clone())
            .multipart(body)
            .map_err(|e| PipelineError::Transport(format!("Failed to build message: {}", e)))
    }
}

fn parse_content_type(value: &str) -> Result<ContentType> {
    ContentType::parse(value)
        .map_err(|e| PipelineError::Transport(format!("Invalid content type {}: {}", value, e)))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        let message = Self::build_message(&self.from, envelope)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| PipelineError::Transport(format!("{}: {}", envelope.to, e)))?;
        debug!("SMTP accepted message for {}: {:?}", envelope.to, response.code());
        Ok(())
    }
}
