//! Mailbox formatting and parsing (RFC 5322 §3.4).

use crate::mime::header::encode_words;

/// Characters that force a display name into a quoted string.
const SPECIALS: &[char] = &[
    '(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
];

/// A single mailbox.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`), or free text when the
    /// source only knows a name.
    pub address: String,
}

impl EmailAddress {
    /// Build from separate name and address fields.
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a single mailbox from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// If parsing fails, the raw string is stored as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::new("", "");
        }

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                    let display_name = unquote(&trimmed[..angle_start]);
                    return Self {
                        display_name,
                        address: addr,
                    };
                }
            }
        }

        Self::new("", trimmed)
    }

    /// Parse a comma-separated list of mailboxes.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    let addr = Self::parse(&current);
                    if !addr.address.is_empty() {
                        results.push(addr);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        let addr = Self::parse(&current);
        if !addr.address.is_empty() {
            results.push(addr);
        }

        results
    }

    /// Whether `address` looks like an actual `local@domain` address.
    pub fn has_address(&self) -> bool {
        self.address.contains('@')
    }

    /// Header form: `"Display Name <address>"` or just `"address"`.
    ///
    /// Display names containing RFC 5322 specials are quoted.
    pub fn formatted(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", quote_phrase(&self.display_name), self.address)
        }
    }

    /// Header form safe for 7-bit transport.
    ///
    /// Non-ASCII display names become RFC 2047 encoded-words. A value with no
    /// real address (a bare display name) is encoded as a whole.
    pub fn encoded(&self) -> String {
        if !self.has_address() {
            return encode_words(&self.formatted());
        }
        if self.display_name.is_empty() {
            self.address.clone()
        } else if self.display_name.is_ascii() {
            self.formatted()
        } else {
            format!("{} <{}>", encode_words(&self.display_name), self.address)
        }
    }
}

/// Quote a display name when it contains specials.
fn quote_phrase(name: &str) -> String {
    if name.contains(SPECIALS) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        name.to_string()
    }
}

/// Strip surrounding double-quotes and quoted-pair escapes.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1]
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
            .trim()
            .to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.formatted())
    }
}
