// file: src/mail/compose.rs
// description: builds per-participant envelopes from the template, QR artifact and shared document

use crate::config::MailConfig;
use crate::mail::{AttachmentPart, Envelope, EmailTemplate};
use crate::models::Participant;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

pub struct Composed {
    pub envelope: Envelope,
    pub artifact_attached: bool,
}

/// Holds what is identical for every recipient: subject, template and the
/// shared document, read once per batch.
pub struct MessageComposer {
    subject: String,
    template: EmailTemplate,
    attachment: Option<AttachmentPart>,
}

impl MessageComposer {
    pub fn new(subject: String, template: EmailTemplate, attachment: Option<AttachmentPart>) -> Self {
        Self {
            subject,
            template,
            attachment,
        }
    }

    pub fn load(config: &MailConfig) -> Self {
        let template = EmailTemplate::load(&config.template_path);
        let attachment = read_part(&config.attachment_path);
        if attachment.is_none() {
            warn!(
                "Attachment {} not found, notifications go out without it",
                config.attachment_path.display()
            );
        }
        Self::new(config.subject.clone(), template, attachment)
    }

    pub fn compose(&self, participant: &Participant, artifact_path: &Path) -> Composed {
        let values: HashMap<&str, &str> = [
            ("name", participant.name.as_str()),
            ("email", participant.email.as_str()),
            ("unique_id", participant.unique_id.as_str()),
        ]
        .into_iter()
        .collect();

        let inline_image = read_part(artifact_path);
        let artifact_attached = inline_image.is_some();

        Composed {
            envelope: Envelope {
                to: participant.email.clone(),
                recipient_name: participant.name.clone(),
                subject: self.subject.clone(),
                html_body: self.template.render_with_map(&values),
                inline_image,
                attachment: self.attachment.clone(),
            },
            artifact_attached,
        }
    }
}

fn read_part(path: &Path) -> Option<AttachmentPart> {
    let bytes = fs::read(path).ok()?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());

    Some(AttachmentPart {
        content_type: content_type_for(path).to_string(),
        filename,
        bytes,
    })
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
