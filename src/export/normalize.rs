//! Attachment identity normalization.
//!
//! Sources often report attachment names that are opaque GUIDs or carry no
//! extension at all. The content is sniffed and such names are replaced with
//! generic ones (`image1.png`, `attachment2.pdf`) that carry the right
//! extension.

use crate::error::Result;
use crate::mime::sniff::{sniff, split_extension};
use crate::model::attachment::NormalizedAttachment;
use crate::model::message::SourceAttachment;

/// Length of a hyphenated GUID (`8-4-4-4-12`).
const GUID_LEN: usize = 36;

/// Extensionless names longer than this are treated as opaque identifiers.
const OPAQUE_NAME_LEN: usize = 20;

/// Numbering for generated image names. Local to one message, starts at 1.
#[derive(Debug, Clone)]
pub struct ImageCounter {
    next: usize,
}

impl ImageCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the current number and advance.
    pub fn take(&mut self) -> usize {
        let n = self.next;
        self.next += 1;
        n
    }
}

impl Default for ImageCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a reported name looks like an identifier rather than a file name.
pub fn is_untrustworthy(name: &str) -> bool {
    let (_, ext) = split_extension(name);
    let len = name.chars().count();
    let hyphens = name.chars().filter(|&c| c == '-').count();

    (len == GUID_LEN && hyphens == 4) || (ext.is_empty() && len > OPAQUE_NAME_LEN)
}

/// Name reported for the attachment at `position`, or a positional default.
pub fn reported_name(attachment: &SourceAttachment, position: usize) -> String {
    match attachment.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("attachment_{}", position + 1),
    }
}

/// Derive the identity of `data` given the name the source reported.
///
/// `rank` is the zero-based index of the attachment among the by-value
/// attachments of its message.
pub fn identify(
    data: Vec<u8>,
    reported: &str,
    rank: usize,
    images: &mut ImageCounter,
) -> NormalizedAttachment {
    let sniffed = sniff(&data, Some(reported));
    let (_, ext) = split_extension(reported);
    let has_extension = !ext.is_empty();

    let filename = if (is_untrustworthy(reported) || !has_extension) && sniffed.is_image() {
        format!("image{}{}", images.take(), sniffed.extension)
    } else if !has_extension {
        format!("attachment{}{}", rank + 1, sniffed.extension)
    } else {
        reported.to_string()
    };

    NormalizedAttachment {
        data,
        filename,
        content_type: sniffed.mime_type.to_string(),
        extension: sniffed.extension.to_string(),
    }
}

/// Read and identify one source attachment.
///
/// `position` indexes the full attachment list and only feeds the default
/// name; `rank` counts by-value attachments. Fails only when the source
/// cannot provide the bytes.
pub fn normalize(
    attachment: &SourceAttachment,
    position: usize,
    rank: usize,
    images: &mut ImageCounter,
) -> Result<NormalizedAttachment> {
    let data = attachment.read_bytes()?;
    let reported = reported_name(attachment, position);
    Ok(identify(data, &reported, rank, images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{AttachmentContent, AttachmentKind};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF";
    const GUID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    #[test]
    fn test_untrustworthy_names() {
        assert!(is_untrustworthy(GUID));
        assert!(is_untrustworthy("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert!(!is_untrustworthy("report.pdf"));
        assert!(!is_untrustworthy("short"));
        assert!(!is_untrustworthy("a-very-long-but-honest-name.docx"));
    }

    #[test]
    fn test_guid_jpeg_becomes_image() {
        let mut images = ImageCounter::new();
        let att = identify(JPEG.to_vec(), GUID, 0, &mut images);
        assert_eq!(att.filename, "image1.jpg");
        assert_eq!(att.content_type, "image/jpeg");
        assert_eq!(att.extension, ".jpg");
    }

    #[test]
    fn test_image_counter_is_per_message() {
        let mut images = ImageCounter::new();
        let first = identify(PNG.to_vec(), GUID, 0, &mut images);
        let second = identify(JPEG.to_vec(), "inline-photo", 1, &mut images);
        assert_eq!(first.filename, "image1.png");
        assert_eq!(second.filename, "image2.jpg");

        let mut fresh = ImageCounter::new();
        assert_eq!(identify(PNG.to_vec(), GUID, 0, &mut fresh).filename, "image1.png");
    }

    #[test]
    fn test_extensionless_non_image_uses_position() {
        let mut images = ImageCounter::new();
        let att = identify(b"%PDF-1.4 ...".to_vec(), "statement", 2, &mut images);
        assert_eq!(att.filename, "attachment3.pdf");
        assert_eq!(att.content_type, "application/pdf");
    }

    #[test]
    fn test_extensionless_unknown_keeps_no_extension() {
        let mut images = ImageCounter::new();
        let att = identify(b"\x00\x01\x02".to_vec(), "blob", 0, &mut images);
        assert_eq!(att.filename, "attachment1");
        assert_eq!(att.content_type, "application/octet-stream");
        assert!(att.extension.is_empty());
    }

    #[test]
    fn test_named_file_is_kept() {
        let mut images = ImageCounter::new();
        let att = identify(PNG.to_vec(), "chart.png", 0, &mut images);
        assert_eq!(att.filename, "chart.png");

        let att = identify(Vec::new(), "report.xlsx", 1, &mut images);
        assert_eq!(att.filename, "report.xlsx");
        assert_eq!(
            att.content_type,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    #[test]
    fn test_normalize_missing_name_defaults_to_position() {
        let source = SourceAttachment {
            display_name: None,
            kind: AttachmentKind::ByValue,
            content: AttachmentContent::Inline(b"plain words".to_vec()),
        };
        let mut images = ImageCounter::new();
        let att = normalize(&source, 4, 4, &mut images).unwrap();
        assert_eq!(att.filename, "attachment5");
        assert_eq!(att.data, b"plain words");
    }

    #[test]
    fn test_normalize_propagates_read_failure() {
        let source = SourceAttachment {
            display_name: Some("cloud.docx".to_string()),
            kind: AttachmentKind::ByValue,
            content: AttachmentContent::Unavailable("offline".to_string()),
        };
        let mut images = ImageCounter::new();
        assert!(normalize(&source, 0, 0, &mut images).is_err());
    }

    #[test]
    fn test_rename_counts_by_value_rank_not_position() {
        let source = SourceAttachment {
            display_name: Some("statement".to_string()),
            kind: AttachmentKind::ByValue,
            content: AttachmentContent::Inline(b"%PDF-1.4".to_vec()),
        };
        let mut images = ImageCounter::new();
        let att = normalize(&source, 1, 0, &mut images).unwrap();
        assert_eq!(att.filename, "attachment1.pdf");
    }
}
