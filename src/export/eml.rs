//! Export one source message as an `.eml` file plus its attachments directory.
//!
//! Attachment names are resolved against the attachments directory before
//! the message is assembled, so the name in `Content-Disposition` is the name
//! of the file written next to the message.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{truncate_message, ExportError, Result};
use crate::mime::assemble::assemble;
use crate::mime::render::render;
use crate::model::attachment::NormalizedAttachment;
use crate::model::message::{AttachmentKind, SourceMessage};
use crate::naming::{sanitize_subject, NameRegistry};

use super::normalize::{normalize, reported_name, ImageCounter};
use super::ExportOptions;

/// Attachment warnings keep at most this many characters of the error.
const ATTACHMENT_ERROR_LEN: usize = 80;

/// Where one message and its attachments are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    /// The `.eml` file.
    pub message_path: PathBuf,
    /// Directory for attachment copies; created only when there are any.
    pub attachments_dir: PathBuf,
}

impl OutputLocation {
    /// Reserve a message file name for `subject_name` in `folder_dir`.
    ///
    /// The attachments directory takes the resolved `.eml` stem, so a
    /// colliding `Report_1.eml` gets `Report_1_attachments/`.
    pub fn resolve(
        folder_dir: &Path,
        subject_name: &str,
        attachments_suffix: &str,
        registry: &NameRegistry,
    ) -> Self {
        let file_name = registry.resolve(folder_dir, &format!("{subject_name}.eml"));
        let stem = file_name.strip_suffix(".eml").unwrap_or(&file_name);
        Self {
            attachments_dir: folder_dir.join(format!("{stem}{attachments_suffix}")),
            message_path: folder_dir.join(&file_name),
        }
    }
}

/// What happened to one exported message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReport {
    /// The `.eml` file written.
    pub path: PathBuf,
    /// Attachments embedded in the message.
    pub attachments_embedded: usize,
    /// Attachments that could not be read and were left out.
    pub attachments_failed: usize,
    /// Attachments that are not exportable (references, embedded items).
    pub attachments_skipped: usize,
    /// Standalone attachment copies written.
    pub attachments_copied: usize,
    /// Standalone copies that failed (the attachment stays embedded).
    pub copy_failures: usize,
    /// Bytes written for the message and its copies.
    pub bytes_written: u64,
}

/// Outcome of [`persist`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub copied: usize,
    pub copy_failures: usize,
    pub bytes_written: u64,
}

/// Export `source` into `folder_dir`.
///
/// Attachment failures are logged and skipped. An error is returned only
/// when the `.eml` file itself cannot be written.
pub fn export_message(
    source: &SourceMessage,
    folder_dir: &Path,
    registry: &NameRegistry,
    options: &ExportOptions,
) -> Result<MessageReport> {
    let subject_name = sanitize_subject(
        source.subject.as_deref(),
        options.subject_max_len,
        &options.fallback_subject,
    );
    let location =
        OutputLocation::resolve(folder_dir, &subject_name, &options.attachments_suffix, registry);

    let mut report = MessageReport {
        path: location.message_path.clone(),
        ..Default::default()
    };

    let attachments = collect_attachments(source, &location, registry, &mut report);
    report.attachments_embedded = attachments.len();

    let message = assemble(source, attachments);
    let bytes = render(&message);

    let outcome = persist(
        &bytes,
        message.attachments(),
        &location,
        options.save_attachment_copies,
    )?;
    report.attachments_copied = outcome.copied;
    report.copy_failures = outcome.copy_failures;
    report.bytes_written = outcome.bytes_written;

    tracing::debug!(
        path = %report.path.display(),
        attachments = report.attachments_embedded,
        "Exported message"
    );
    Ok(report)
}

/// Normalize every by-value attachment and give it its final name.
fn collect_attachments(
    source: &SourceMessage,
    location: &OutputLocation,
    registry: &NameRegistry,
    report: &mut MessageReport,
) -> Vec<NormalizedAttachment> {
    let mut images = ImageCounter::new();
    let mut attachments = Vec::with_capacity(source.attachments.len());
    let mut rank = 0;

    for (position, attachment) in source.attachments.iter().enumerate() {
        if attachment.kind != AttachmentKind::ByValue {
            tracing::debug!(
                attachment = %reported_name(attachment, position),
                kind = ?attachment.kind,
                "Skipping attachment that is not stored by value"
            );
            report.attachments_skipped += 1;
            continue;
        }

        let result = normalize(attachment, position, rank, &mut images);
        rank += 1;
        match result {
            Ok(mut normalized) => {
                normalized.filename =
                    registry.resolve(&location.attachments_dir, &normalized.filename);
                attachments.push(normalized);
            }
            Err(e) => {
                tracing::warn!(
                    attachment = %attachment.best_name(),
                    error = %truncate_message(&e.to_string(), ATTACHMENT_ERROR_LEN),
                    "Failed to process attachment"
                );
                report.attachments_failed += 1;
            }
        }
    }

    attachments
}

/// Write the rendered message and, optionally, standalone attachment copies.
///
/// Copies are written first; a copy that fails is logged and counted. The
/// message file is created last and removed again if writing it fails.
pub fn persist(
    bytes: &[u8],
    attachments: &[NormalizedAttachment],
    location: &OutputLocation,
    save_copies: bool,
) -> Result<PersistOutcome> {
    let mut outcome = PersistOutcome::default();

    if save_copies && !attachments.is_empty() {
        match std::fs::create_dir_all(&location.attachments_dir) {
            Ok(()) => {
                for attachment in attachments {
                    let path = location.attachments_dir.join(&attachment.filename);
                    match write_new_file(&path, &attachment.data) {
                        Ok(()) => {
                            outcome.copied += 1;
                            outcome.bytes_written += attachment.size();
                        }
                        Err(e) => {
                            tracing::warn!(
                                attachment = %attachment.filename,
                                error = %truncate_message(&e.to_string(), ATTACHMENT_ERROR_LEN),
                                "Failed to save attachment copy"
                            );
                            outcome.copy_failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                let e = ExportError::io(&location.attachments_dir, e);
                tracing::warn!(
                    error = %truncate_message(&e.to_string(), ATTACHMENT_ERROR_LEN),
                    "Failed to create attachments directory"
                );
                outcome.copy_failures += attachments.len();
            }
        }
    }

    write_new_file(&location.message_path, bytes)?;
    outcome.bytes_written += bytes.len() as u64;
    Ok(outcome)
}

/// Create `path` (never replacing an existing file) and write `data` to it.
///
/// A partially written file is removed.
pub fn write_new_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ExportError::io(path, e))?;

    if let Err(e) = file.write_all(data).and_then(|()| file.flush()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(ExportError::io(path, e));
    }
    Ok(())
}
