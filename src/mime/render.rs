//! Serialization of an [`AssembledMessage`] to `.eml` bytes.
//!
//! Every line written here ends in CRLF, whatever the host convention and
//! whatever line endings the source body used.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::model::attachment::NormalizedAttachment;

use super::assemble::{AssembledMessage, BodyPart};
use super::header::{attachment_disposition, encode_value, fold_header, HeaderMap};

/// Line length for base64 bodies (RFC 2045 §6.8).
const BASE64_LINE_LEN: usize = 76;

/// Longest line allowed in a `7bit` body (RFC 5322 §2.1.1), excluding CRLF.
const MAX_7BIT_LINE: usize = 998;

/// Content-Transfer-Encoding of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    Base64,
}

impl TransferEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::Base64 => "base64",
        }
    }
}

/// Render the complete message.
pub fn render(message: &AssembledMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(estimated_size(message));
    write_headers(&mut out, message.headers());
    write_header(&mut out, "MIME-Version", "1.0");

    match message {
        AssembledMessage::Simple { body, .. } => {
            write_body_part(&mut out, body);
        }
        AssembledMessage::Multipart {
            body, attachments, ..
        } => {
            let boundary = boundary_for(message);
            write_header(
                &mut out,
                "Content-Type",
                &format!("multipart/mixed; boundary=\"{boundary}\""),
            );
            out.extend_from_slice(b"\r\n");

            write_delimiter(&mut out, &boundary);
            write_body_part(&mut out, body);
            for attachment in attachments {
                write_delimiter(&mut out, &boundary);
                write_attachment_part(&mut out, attachment);
            }
            out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        }
    }

    out
}

/// Choose `7bit` for ASCII text with short lines, `base64` otherwise.
pub fn body_encoding(text: &str) -> TransferEncoding {
    let short_lines = text
        .split('\n')
        .all(|line| line.trim_end_matches('\r').len() <= MAX_7BIT_LINE);
    if text.is_ascii() && short_lines && !text.contains('\0') {
        TransferEncoding::SevenBit
    } else {
        TransferEncoding::Base64
    }
}

/// Convert every `\r\n`, bare `\n`, and bare `\r` to `\r\n`.
pub fn canonicalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            _ => out.push(ch),
        }
    }
    out
}

/// Base64 with CRLF every 76 characters, ending in CRLF.
pub fn wrapped_base64(data: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(data);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LEN * 2 + 2);
    for line in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Multipart boundary derived from the message content.
///
/// The same message always renders to the same bytes. The boundary cannot
/// occur in base64 data; a `7bit` body containing it forces a new salt.
pub fn boundary_for(message: &AssembledMessage) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in message.headers().iter() {
        hasher.update(name.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.update(message.body().text.as_bytes());
    for attachment in message.attachments() {
        hasher.update(attachment.filename.as_bytes());
        hasher.update(&attachment.data);
    }
    let digest = hasher.finalize();

    let body = &message.body().text;
    let mut salt: u32 = 0;
    loop {
        let mut salted = Sha256::new();
        salted.update(digest.as_slice());
        salted.update(salt.to_be_bytes());
        let hex: String = salted
            .finalize()
            .iter()
            .take(12)
            .map(|b| format!("{b:02x}"))
            .collect();
        let boundary = format!("=_emlexport_{hex}");
        if !body.contains(&boundary) {
            return boundary;
        }
        salt += 1;
    }
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        write_header(out, name, &encode_value(name, value));
    }
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(fold_header(name, value).as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_delimiter(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
}

/// Content headers, blank line, and the body of a text part.
fn write_body_part(out: &mut Vec<u8>, body: &BodyPart) {
    let encoding = body_encoding(&body.text);
    write_header(
        out,
        "Content-Type",
        &format!("{}; charset=\"{}\"", body.mime_type(), body.charset),
    );
    write_header(out, "Content-Transfer-Encoding", encoding.as_str());
    out.extend_from_slice(b"\r\n");

    let text = canonicalize_line_endings(&body.text);
    match encoding {
        TransferEncoding::SevenBit => {
            out.extend_from_slice(text.as_bytes());
            if !text.ends_with("\r\n") {
                out.extend_from_slice(b"\r\n");
            }
        }
        TransferEncoding::Base64 => out.extend_from_slice(&wrapped_base64(text.as_bytes())),
    }
}

fn write_attachment_part(out: &mut Vec<u8>, attachment: &NormalizedAttachment) {
    let (main, sub) = attachment.mime_parts();
    write_header(out, "Content-Type", &format!("{main}/{sub}"));
    write_header(out, "Content-Transfer-Encoding", TransferEncoding::Base64.as_str());
    write_header(
        out,
        "Content-Disposition",
        &attachment_disposition(&attachment.filename),
    );
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&wrapped_base64(&attachment.data));
}

fn estimated_size(message: &AssembledMessage) -> usize {
    let attachments: usize = message
        .attachments()
        .iter()
        .map(|a| a.data.len() * 4 / 3 + 256)
        .sum();
    1024 + message.body().text.len() * 4 / 3 + attachments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::assemble::assemble;
    use crate::model::message::{BodyFormat, SourceMessage};

    fn source(body: &str) -> SourceMessage {
        SourceMessage {
            sender_address: Some("alice@example.com".to_string()),
            to: Some("bob@example.com".to_string()),
            subject: Some("Status".to_string()),
            body: body.to_string(),
            ..Default::default()
        }
    }

    fn has_bare_lf(bytes: &[u8]) -> bool {
        bytes
            .iter()
            .enumerate()
            .any(|(i, &b)| b == b'\n' && (i == 0 || bytes[i - 1] != b'\r'))
    }

    #[test]
    fn test_canonicalize_line_endings() {
        assert_eq!(canonicalize_line_endings("a\nb\r\nc\rd"), "a\r\nb\r\nc\r\nd");
        assert_eq!(canonicalize_line_endings("\r\n\r\n"), "\r\n\r\n");
        assert_eq!(canonicalize_line_endings(""), "");
    }

    #[test]
    fn test_body_encoding() {
        assert_eq!(body_encoding("plain ascii\n"), TransferEncoding::SevenBit);
        assert_eq!(body_encoding("naïve"), TransferEncoding::Base64);
        assert_eq!(body_encoding(&"x".repeat(1200)), TransferEncoding::Base64);
    }

    #[test]
    fn test_wrapped_base64_line_length() {
        let data = vec![0xABu8; 200];
        let wrapped = wrapped_base64(&data);
        let text = String::from_utf8(wrapped).unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == 76));
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn test_render_simple_message() {
        let msg = assemble(&source("Line one\nLine two\n"), Vec::new());
        let bytes = render(&msg);
        let text = String::from_utf8(bytes.clone()).unwrap();

        assert!(text.starts_with("From: alice@example.com\r\nTo: bob@example.com\r\n"));
        assert!(text.contains("MIME-Version: 1.0\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=\"utf-8\"\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(text.ends_with("\r\n\r\nLine one\r\nLine two\r\n"));
        assert!(!text.contains("multipart"));
        assert!(!has_bare_lf(&bytes));
    }

    #[test]
    fn test_render_html_message() {
        let mut src = source("<p>Hello</p>");
        src.body_format = BodyFormat::Html;
        let text = String::from_utf8(render(&assemble(&src, Vec::new()))).unwrap();
        assert!(text.contains("Content-Type: text/html; charset=\"utf-8\"\r\n"));
    }

    #[test]
    fn test_render_multipart_message() {
        let attachment = NormalizedAttachment {
            data: b"%PDF-1.4\nbinary\x00\xff".to_vec(),
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            extension: ".pdf".to_string(),
        };
        let msg = assemble(&source("See attached.\n"), vec![attachment]);
        let bytes = render(&msg);
        let text = String::from_utf8(bytes.clone()).unwrap();
        let boundary = boundary_for(&msg);

        assert_eq!(text.matches("Subject: Status\r\n").count(), 1);
        assert!(text.contains("Content-Type: multipart/mixed;"));
        assert!(text.contains(&format!("boundary=\"{boundary}\"\r\n")));

        let first = text.find(&format!("--{boundary}\r\n")).unwrap();
        let body_at = text.find("Content-Type: text/plain").unwrap();
        let attachment_at = text.find("Content-Type: application/pdf").unwrap();
        assert!(first < body_at && body_at < attachment_at);

        assert!(text.contains("Content-Disposition: attachment; filename=\"report.pdf\"\r\n"));
        assert!(text.contains(&STANDARD.encode(b"%PDF-1.4\nbinary\x00\xff")));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert!(!has_bare_lf(&bytes));
    }

    #[test]
    fn test_render_is_deterministic() {
        let msg = assemble(&source("same"), Vec::new());
        assert_eq!(render(&msg), render(&msg));
    }

    #[test]
    fn test_boundary_avoids_body_collision() {
        let attachment = NormalizedAttachment {
            data: vec![1, 2, 3],
            filename: "a.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            extension: String::new(),
        };
        let msg = assemble(&source("body"), vec![attachment.clone()]);
        let boundary = boundary_for(&msg);

        let sneaky = assemble(&source(&format!("text {boundary} text")), vec![attachment]);
        assert!(!sneaky.body().text.contains(&boundary_for(&sneaky)));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let mut src = source("x");
        src.subject = Some("Café".to_string());
        let bytes = render(&assemble(&src, Vec::new()));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Subject: =?utf-8?b?Q2Fmw6k=?=\r\n"));
    }

    #[test]
    fn test_non_ascii_body_is_base64() {
        let bytes = render(&assemble(&source("Grüße\n"), Vec::new()));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(text.contains(&STANDARD.encode("Grüße\r\n".as_bytes())));
    }
}
