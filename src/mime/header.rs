//! RFC 5322 header handling for output: ordered header map, date
//! formatting, RFC 2047 encoded-words, RFC 2231 parameters, and folding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Datelike, FixedOffset};

use crate::model::address::EmailAddress;

/// Recommended maximum line length (RFC 5322 §2.1.1), excluding CRLF.
pub const MAX_LINE_LEN: usize = 78;

/// Largest UTF-8 payload per encoded-word: 45 bytes → 60 base64 chars,
/// which keeps `=?utf-8?b?...?=` within 75 characters.
const ENCODED_WORD_CHUNK: usize = 45;

/// Header names written with a casing other than plain Title-Case.
const CANONICAL_NAMES: &[&str] = &["Message-ID", "MIME-Version", "Cc", "Bcc"];

/// Headers whose values are mailbox lists.
const ADDRESS_HEADERS: &[&str] = &["From", "To", "Cc", "Bcc", "Reply-To", "Sender"];

/// Ordered header collection.
///
/// Insertion order is preserved; lookups are case-insensitive; names are
/// stored in their canonical casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing an existing value in place.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((canonical_name(name), value)),
        }
    }

    /// Value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Standard casing for a header name: `"content-type"` → `"Content-Type"`,
/// `"message-id"` → `"Message-ID"`.
pub fn canonical_name(name: &str) -> String {
    if let Some(known) = CANONICAL_NAMES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
    {
        return (*known).to_string();
    }
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Format a timestamp as an RFC 5322 date-time.
///
/// Returns `None` when the year cannot be written with four digits.
pub fn rfc5322_date(dt: &DateTime<FixedOffset>) -> Option<String> {
    if (0..=9999).contains(&dt.year()) {
        Some(dt.to_rfc2822())
    } else {
        None
    }
}

/// Encode `text` as one or more RFC 2047 `B` encoded-words (UTF-8),
/// separated by spaces. Words are split on character boundaries.
pub fn encode_words(text: &str) -> String {
    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() || words.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join(" ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(chunk.as_bytes()))
}

/// Encode an unstructured value (e.g. `Subject`) for 7-bit transport.
pub fn encode_unstructured(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        encode_words(value)
    }
}

/// Encode a mailbox-list value for 7-bit transport.
///
/// ASCII values are kept verbatim; otherwise each mailbox is re-written with
/// its display name encoded.
pub fn encode_address_list(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    let encoded: Vec<String> = EmailAddress::parse_list(value)
        .iter()
        .map(EmailAddress::encoded)
        .collect();
    if encoded.is_empty() {
        encode_words(value)
    } else {
        encoded.join(", ")
    }
}

/// Encode a header value for output according to the kind of header.
pub fn encode_value(name: &str, value: &str) -> String {
    let value = single_line(value);
    if ADDRESS_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
        encode_address_list(&value)
    } else {
        encode_unstructured(&value)
    }
}

/// Replace embedded CR/LF so a value cannot break out of its header line.
fn single_line(value: &str) -> String {
    if value.contains(['\r', '\n']) {
        value
            .split(['\r', '\n'])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        value.to_string()
    }
}

/// `attachment; filename="..."`, using RFC 2231 for non-ASCII names.
pub fn attachment_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    } else {
        format!("attachment; filename*=utf-8''{}", percent_encode(filename))
    }
}

/// RFC 2231 / RFC 5987 `attr-char` percent-encoding.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Render `name: value` folded at whitespace so that lines stay within
/// [`MAX_LINE_LEN`] where possible. Continuation lines start with a space.
/// The result has no trailing CRLF.
pub fn fold_header(name: &str, value: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = format!("{name}:");
    let mut has_word = false;

    for word in value.split(' ') {
        if has_word && !word.is_empty() && current.len() + 1 + word.len() > MAX_LINE_LEN {
            lines.push(std::mem::take(&mut current));
        }
        current.push(' ');
        current.push_str(word);
        has_word |= !word.is_empty();
    }
    lines.push(current);
    lines.join("\r\n")
}
