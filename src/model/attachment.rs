//! Normalized attachment: bytes plus the identity re-derived from them.

/// An attachment ready to be embedded and copied to disk.
///
/// `filename` is final: it is the name written into the MIME
/// `Content-Disposition` header and the name of the on-disk copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAttachment {
    /// Raw (decoded) bytes, owned.
    pub data: Vec<u8>,

    /// Final display name, unique within the attachments directory.
    pub filename: String,

    /// MIME content type (e.g. `"image/png"`), sniffed from the bytes.
    pub content_type: String,

    /// Canonical extension including the dot (`".png"`), empty when unknown.
    pub extension: String,
}

impl NormalizedAttachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Split `content_type` into `(type, subtype)`.
    ///
    /// Malformed values degrade to `application/octet-stream`.
    pub fn mime_parts(&self) -> (&str, &str) {
        match self.content_type.split_once('/') {
            Some((main, sub)) if !main.is_empty() && !sub.is_empty() => (main, sub),
            _ => ("application", "octet-stream"),
        }
    }
}
