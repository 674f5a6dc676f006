//! Message assembly: header population and the single-part / multipart shape.

use crate::model::address::EmailAddress;
use crate::model::attachment::NormalizedAttachment;
use crate::model::message::{BodyFormat, SourceMessage};

use super::header::{rfc5322_date, HeaderMap};

/// Charset of every text part we produce.
pub const CHARSET: &str = "utf-8";

/// The single text part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Body text, with whatever line endings the source used.
    pub text: String,
    /// Plain or HTML.
    pub format: BodyFormat,
    /// Always [`CHARSET`].
    pub charset: &'static str,
}

impl BodyPart {
    pub fn new(text: impl Into<String>, format: BodyFormat) -> Self {
        Self {
            text: text.into(),
            format,
            charset: CHARSET,
        }
    }

    /// `text/plain` or `text/html`.
    pub fn mime_type(&self) -> String {
        format!("text/{}", self.format.subtype())
    }
}

/// An assembled message, ready for rendering.
///
/// The two shapes place headers differently when rendered: a simple message
/// puts the content headers next to the top-level headers, while a
/// multipart message keeps them on the body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledMessage {
    /// Body only.
    Simple { headers: HeaderMap, body: BodyPart },
    /// `multipart/mixed`: body first, then one part per attachment.
    Multipart {
        headers: HeaderMap,
        body: BodyPart,
        attachments: Vec<NormalizedAttachment>,
    },
}

impl AssembledMessage {
    /// Top-level headers (From, To, Subject, ...).
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Self::Simple { headers, .. } | Self::Multipart { headers, .. } => headers,
        }
    }

    pub fn body(&self) -> &BodyPart {
        match self {
            Self::Simple { body, .. } | Self::Multipart { body, .. } => body,
        }
    }

    /// Attachments in part order. Empty for a simple message.
    pub fn attachments(&self) -> &[NormalizedAttachment] {
        match self {
            Self::Simple { .. } => &[],
            Self::Multipart { attachments, .. } => attachments,
        }
    }

    /// Top-level content type without parameters.
    pub fn mime_type(&self) -> String {
        match self {
            Self::Simple { body, .. } => body.mime_type(),
            Self::Multipart { .. } => "multipart/mixed".to_string(),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }
}

/// Build the message for `source` with the attachments that survived
/// normalization.
///
/// An empty attachment list yields [`AssembledMessage::Simple`], even when
/// the source declared attachments that all failed.
pub fn assemble(source: &SourceMessage, attachments: Vec<NormalizedAttachment>) -> AssembledMessage {
    let headers = build_headers(source);
    let body = BodyPart::new(source.body.clone(), source.body_format);

    if attachments.is_empty() {
        AssembledMessage::Simple { headers, body }
    } else {
        AssembledMessage::Multipart {
            headers,
            body,
            attachments,
        }
    }
}

/// Populate the top-level headers. Each is omitted when its source field is
/// absent or blank.
pub fn build_headers(source: &SourceMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(from) = from_value(source) {
        headers.insert("From", from);
    }
    for (name, value) in [("To", &source.to), ("Cc", &source.cc), ("Bcc", &source.bcc)] {
        if let Some(value) = present(value) {
            headers.insert(name, value);
        }
    }
    if let Some(subject) = present(&source.subject) {
        headers.insert("Subject", subject);
    }
    if let Some(date) = date_value(source) {
        headers.insert("Date", date);
    }
    if let Some(id) = present(&source.message_id) {
        headers.insert("Message-ID", id);
    }

    headers
}

/// `"Name <address>"`, the bare address, or the on-behalf-of name.
fn from_value(source: &SourceMessage) -> Option<String> {
    match present(&source.sender_address) {
        Some(address) => {
            let name = present(&source.sender_name).unwrap_or("");
            Some(EmailAddress::new(name, address).formatted())
        }
        None => present(&source.on_behalf_of).map(str::to_string),
    }
}

/// Received time if it can be formatted, otherwise the sent time.
fn date_value(source: &SourceMessage) -> Option<String> {
    source
        .received
        .as_ref()
        .and_then(rfc5322_date)
        .or_else(|| source.sent.as_ref().and_then(rfc5322_date))
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}
