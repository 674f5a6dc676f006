//! Content-type sniffing from magic bytes, with a name-based fallback.
//!
//! [`sniff`] is total: every input yields exactly one `(type, extension)`
//! pair, and unknown data degrades to `application/octet-stream`.

/// Generic binary type.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Office Open XML word-processing document.
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Office Open XML spreadsheet.
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Fixed magic prefixes, checked in order.
const MAGIC: &[(&[u8], &str, &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png", ".png"),
    (b"\xff\xd8\xff", "image/jpeg", ".jpg"),
    (b"GIF87a", "image/gif", ".gif"),
    (b"GIF89a", "image/gif", ".gif"),
    (b"%PDF", "application/pdf", ".pdf"),
];

/// ZIP local file header. Office Open XML documents are ZIP containers.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Extension lookup used when no magic prefix matches.
const EXTENSIONS: &[(&str, &str)] = &[
    (".pdf", "application/pdf"),
    (".doc", "application/msword"),
    (".docx", DOCX),
    (".xls", "application/vnd.ms-excel"),
    (".xlsx", XLSX),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".txt", "text/plain"),
    (".zip", "application/zip"),
];

/// Result of sniffing: a MIME type and its canonical extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Sniffed {
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: &'static str,
    /// Extension including the dot, e.g. `".png"`. Empty when unknown.
    pub extension: &'static str,
}

impl Sniffed {
    const UNKNOWN: Self = Self {
        mime_type: OCTET_STREAM,
        extension: "",
    };

    /// `true` for any `image/*` type.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// `true` unless the data degraded to `application/octet-stream`.
    pub fn is_known(&self) -> bool {
        self.mime_type != OCTET_STREAM
    }
}

/// Identify `data`, using `hint` (the reported file name) to disambiguate
/// ZIP containers and as a fallback when no magic prefix matches.
pub fn sniff(data: &[u8], hint: Option<&str>) -> Sniffed {
    let hint = hint.unwrap_or("");

    for &(magic, mime_type, extension) in MAGIC {
        if data.starts_with(magic) {
            return Sniffed {
                mime_type,
                extension,
            };
        }
    }

    if data.starts_with(ZIP_MAGIC) {
        return sniff_zip(hint);
    }

    let (_, ext) = split_extension(hint);
    let ext = ext.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|&(extension, mime_type)| Sniffed {
            mime_type,
            extension,
        })
        .unwrap_or(Sniffed::UNKNOWN)
}

/// Tell Word and Excel documents apart from plain ZIP archives by name.
fn sniff_zip(hint: &str) -> Sniffed {
    let lower = hint.to_lowercase();
    if lower.ends_with(".docx") || lower.contains("word") {
        Sniffed {
            mime_type: DOCX,
            extension: ".docx",
        }
    } else if lower.ends_with(".xlsx") || lower.contains("excel") {
        Sniffed {
            mime_type: XLSX,
            extension: ".xlsx",
        }
    } else {
        Sniffed {
            mime_type: "application/zip",
            extension: ".zip",
        }
    }
}

/// Split a file name into `(stem, extension)` where the extension keeps its dot.
///
/// Leading dots belong to the stem (`".profile"` has no extension) and a
/// trailing dot is not an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(pos) if leading + pos + 1 < name.len() => name.split_at(leading + pos),
        _ => (name, ""),
    }
}
