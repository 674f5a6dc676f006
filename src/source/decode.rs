//! Decode raw RFC 5322 bytes into a [`SourceMessage`] with `mail-parser`.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use mail_parser::{Address, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{ExportError, Result};
use crate::model::address::EmailAddress;
use crate::model::message::{
    AttachmentContent, AttachmentKind, BodyFormat, SourceAttachment, SourceMessage,
};

/// Decode one raw message.
pub fn decode_message(raw: &[u8]) -> Result<SourceMessage> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ExportError::MessageDecode("empty message".to_string()));
    }

    let msg = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ExportError::MessageDecode("not an RFC 5322 message".to_string()))?;

    let (sender_name, sender_address) = match msg.from().and_then(first_addr) {
        Some((name, address)) => (name, address),
        None => (None, None),
    };
    let on_behalf_of = msg
        .sender()
        .and_then(first_addr)
        .and_then(|(name, address)| name.or(address));

    let (body, body_format) = match msg.html_part(0) {
        Some(part) if matches!(part.body, PartType::Html(_)) => (
            msg.body_html(0).map(Cow::into_owned).unwrap_or_default(),
            BodyFormat::Html,
        ),
        _ => (
            msg.body_text(0).map(Cow::into_owned).unwrap_or_default(),
            BodyFormat::Plain,
        ),
    };

    Ok(SourceMessage {
        sender_name,
        sender_address,
        on_behalf_of,
        to: msg.to().and_then(join_addresses),
        cc: msg.cc().and_then(join_addresses),
        bcc: msg.bcc().and_then(join_addresses),
        subject: msg.subject().map(str::to_string),
        received: received_time(raw),
        sent: msg.date().and_then(|d| parse_date(&d.to_rfc3339())),
        body,
        body_format,
        message_id: msg.message_id().map(|id| format!("<{id}>")),
        attachments: msg.attachments().map(source_attachment).collect(),
    })
}

/// `(display name, address)` of the first mailbox in `address`.
fn first_addr(address: &Address<'_>) -> Option<(Option<String>, Option<String>)> {
    let addr = match address {
        Address::List(list) => list.first()?,
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).next()?,
    };
    let name = addr.name.as_deref().map(str::to_string);
    let address = addr.address.as_deref().map(str::to_string);
    Some((name, address))
}

/// Comma-joined mailboxes, group members flattened.
fn join_addresses(address: &Address<'_>) -> Option<String> {
    let addrs: Vec<_> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    let formatted: Vec<String> = addrs
        .into_iter()
        .filter_map(|addr| match (addr.name.as_deref(), addr.address.as_deref()) {
            (name, Some(address)) => {
                Some(EmailAddress::new(name.unwrap_or(""), address).formatted())
            }
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .collect();

    if formatted.is_empty() {
        None
    } else {
        Some(formatted.join(", "))
    }
}

fn source_attachment(part: &MessagePart<'_>) -> SourceAttachment {
    let display_name = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(str::to_string);

    let is_external = part.content_type().is_some_and(|ct| {
        ct.ctype().eq_ignore_ascii_case("message")
            && ct
                .subtype()
                .is_some_and(|sub| sub.eq_ignore_ascii_case("external-body"))
    });

    let kind = if is_external {
        AttachmentKind::ByReference
    } else if matches!(part.body, PartType::Message(_)) {
        AttachmentKind::EmbeddedMessage
    } else {
        AttachmentKind::ByValue
    };

    SourceAttachment {
        display_name,
        kind,
        content: AttachmentContent::Inline(part.contents().to_vec()),
    }
}

/// Timestamp of the topmost `Received:` header, i.e. the final delivery hop.
pub fn received_time(raw: &[u8]) -> Option<DateTime<FixedOffset>> {
    let headers = unfold_headers(&String::from_utf8_lossy(header_section(raw)));
    let (_, value) = headers.iter().find(|(name, _)| name == "received")?;
    let (_, date) = value.rsplit_once(';')?;
    parse_date(date)
}

/// Everything before the first blank line.
fn header_section(raw: &[u8]) -> &[u8] {
    let lf = raw.windows(2).position(|w| w == b"\n\n");
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => &raw[..a.min(b)],
        (Some(a), None) => &raw[..a],
        (None, Some(b)) => &raw[..b],
        (None, None) => raw,
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with
/// the previous header. Returns `(lowercase_name, value)` pairs in order.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// Parse a header date, keeping its UTC offset.
///
/// RFC 2822 and RFC 3339 are tried first; anything else goes through
/// `mail-parser`'s lenient date parser.
pub fn parse_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    let fake_msg = format!("Date: {trimmed}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    let result = DateTime::parse_from_rfc3339(&dt).ok();
    if result.is_none() {
        tracing::debug!(date = trimmed, "Could not parse date");
    }
    result
}
