//! Source-side message and attachment types.
//!
//! These are the already-decoded fields handed over by a mailbox source.
//! They are read once per export and never mutated.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};

use crate::error::{ExportError, Result};

/// Format of the message body as declared by the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// `text/plain`.
    #[default]
    Plain,
    /// `text/html` (rich text).
    Html,
}

impl BodyFormat {
    /// MIME subtype of a text part in this format.
    pub fn subtype(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
        }
    }
}

/// One mailbox item, as decoded by the source.
///
/// Every field is optional in practice: sources routinely surface items
/// without a subject, without a sender address, or without timestamps.
#[derive(Debug, Clone, Default)]
pub struct SourceMessage {
    /// Sender display name (`"Alice Example"`).
    pub sender_name: Option<String>,

    /// Sender address (`"alice@example.com"`).
    pub sender_address: Option<String>,

    /// Name of the mailbox the message was sent on behalf of.
    pub on_behalf_of: Option<String>,

    /// `To` recipients, already comma-joined.
    pub to: Option<String>,

    /// `Cc` recipients, already comma-joined.
    pub cc: Option<String>,

    /// `Bcc` recipients, already comma-joined.
    pub bcc: Option<String>,

    /// Subject line, decoded.
    pub subject: Option<String>,

    /// Time the message arrived in the mailbox.
    pub received: Option<DateTime<FixedOffset>>,

    /// Time the message was sent.
    pub sent: Option<DateTime<FixedOffset>>,

    /// Body text in `body_format`.
    pub body: String,

    /// Whether `body` is plain text or HTML.
    pub body_format: BodyFormat,

    /// `Message-ID` including angle brackets, when the source knows it.
    pub message_id: Option<String>,

    /// Attachments in source order.
    pub attachments: Vec<SourceAttachment>,
}

impl SourceMessage {
    /// Best available ordering key: received time, then sent time.
    pub fn receipt_time(&self) -> Option<DateTime<FixedOffset>> {
        self.received.or(self.sent)
    }
}

/// How an attachment is carried by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Content embedded in the message. The only kind that is exported.
    ByValue,
    /// A link or external-body reference; no content to export.
    ByReference,
    /// An embedded mail item (forwarded message as attachment).
    EmbeddedMessage,
}

/// Where the bytes of a source attachment come from.
#[derive(Debug, Clone)]
pub enum AttachmentContent {
    /// Bytes already held in memory.
    Inline(Vec<u8>),
    /// Bytes stored in a file that is read on demand.
    File(PathBuf),
    /// The source knows the attachment exists but cannot provide its bytes.
    Unavailable(String),
}

/// One attachment of a [`SourceMessage`].
#[derive(Debug, Clone)]
pub struct SourceAttachment {
    /// Name reported by the source. Frequently missing or an opaque GUID.
    pub display_name: Option<String>,
    /// How the attachment is carried.
    pub kind: AttachmentKind,
    /// Bytes accessor.
    pub content: AttachmentContent,
}

impl SourceAttachment {
    /// Convenience constructor for an in-memory by-value attachment.
    pub fn by_value(display_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            kind: AttachmentKind::ByValue,
            content: AttachmentContent::Inline(data),
        }
    }

    /// Read the raw bytes of the attachment.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.content {
            AttachmentContent::Inline(data) => Ok(data.clone()),
            AttachmentContent::File(path) => std::fs::read(path).map_err(|e| {
                ExportError::AttachmentRead {
                    name: self.best_name().to_string(),
                    reason: format!("{}: {e}", path.display()),
                }
            }),
            AttachmentContent::Unavailable(reason) => Err(ExportError::AttachmentRead {
                name: self.best_name().to_string(),
                reason: reason.clone(),
            }),
        }
    }

    /// Name to use in log output.
    pub fn best_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("unknown")
    }
}
