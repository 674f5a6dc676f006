//! Export: attachment normalization, per-message `.eml` output, and the
//! folder-tree walk.

pub mod eml;
pub mod normalize;
pub mod tree;

use crate::config::ExportConfig;
use crate::naming::{FALLBACK_SUBJECT, SUBJECT_MAX_LEN};

pub use tree::{ExportStats, Exporter};

/// Settings shared by every message of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub subject_max_len: usize,
    pub fallback_subject: String,
    pub attachments_suffix: String,
    pub newest_first: bool,
    pub save_attachment_copies: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            subject_max_len: SUBJECT_MAX_LEN,
            fallback_subject: FALLBACK_SUBJECT.to_string(),
            attachments_suffix: "_attachments".to_string(),
            newest_first: true,
            save_attachment_copies: true,
        }
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            subject_max_len: config.subject_max_len,
            fallback_subject: config.fallback_subject.clone(),
            attachments_suffix: config.attachments_suffix.clone(),
            newest_first: config.newest_first,
            save_attachment_copies: config.save_attachment_copies,
        }
    }
}
