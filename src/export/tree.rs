//! Depth-first export of a whole source tree.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{truncate_message, ExportError, Result};
use crate::model::message::SourceMessage;
use crate::naming::{sanitize_file_name, sanitize_subject, NameRegistry};
use crate::source::{MailSource, SourceFolder};

use super::eml::{export_message, MessageReport};
use super::ExportOptions;

/// Message warnings keep at most this many characters of the error.
const MESSAGE_ERROR_LEN: usize = 100;

/// Counters for one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// Folders whose output directory was created.
    pub folders: usize,
    /// Folders that could not be created or enumerated.
    pub folders_failed: usize,
    pub messages_exported: usize,
    pub messages_failed: usize,
    /// Source items that could not be decoded at all.
    pub items_skipped: usize,
    /// Attachments embedded in exported messages.
    pub attachments_exported: usize,
    /// Attachments left out because their bytes could not be read.
    pub attachments_failed: usize,
    /// Standalone attachment copies that could not be written.
    pub copy_failures: usize,
    pub bytes_written: u64,
}

impl ExportStats {
    fn record(&mut self, report: &MessageReport) {
        self.messages_exported += 1;
        self.attachments_exported += report.attachments_embedded;
        self.attachments_failed += report.attachments_failed;
        self.copy_failures += report.copy_failures;
        self.bytes_written += report.bytes_written;
    }
}

/// Progress callback: `(folder name, messages processed so far)`.
pub type ProgressFn<'p> = &'p dyn Fn(&str, usize);

/// Exports every folder of a source below an output root.
pub struct Exporter<'a> {
    source: &'a dyn MailSource,
    output_root: PathBuf,
    options: ExportOptions,
    registry: NameRegistry,
}

impl<'a> Exporter<'a> {
    pub fn new(
        source: &'a dyn MailSource,
        output_root: impl Into<PathBuf>,
        options: ExportOptions,
    ) -> Self {
        Self {
            source,
            output_root: output_root.into(),
            options,
            registry: NameRegistry::new(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Walk the source and export everything.
    ///
    /// Only an unusable output root or an unreadable source root aborts the
    /// run; folder, message, and attachment failures are logged and counted.
    pub fn run(&self, progress: Option<ProgressFn<'_>>) -> Result<ExportStats> {
        if self.output_root.exists() && !self.output_root.is_dir() {
            return Err(ExportError::Export(format!(
                "output root '{}' is not a directory",
                self.output_root.display()
            )));
        }
        std::fs::create_dir_all(&self.output_root)
            .map_err(|e| ExportError::io(&self.output_root, e))?;

        let roots = self.source.root_folders()?;
        info!(
            root = %self.output_root.display(),
            folders = roots.len(),
            "Starting export"
        );

        let mut stats = ExportStats::default();
        for folder in &roots {
            self.export_folder(folder, &self.output_root, &mut stats, progress);
        }

        info!(
            exported = stats.messages_exported,
            failed = stats.messages_failed,
            skipped = stats.items_skipped,
            "Export finished"
        );
        Ok(stats)
    }

    /// Export `folder` into `parent_dir`, then its subfolders.
    fn export_folder(
        &self,
        folder: &SourceFolder,
        parent_dir: &Path,
        stats: &mut ExportStats,
        progress: Option<ProgressFn<'_>>,
    ) {
        let dir = parent_dir.join(sanitize_file_name(&folder.name));
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(
                folder = %folder.name,
                error = %ExportError::io(&dir, e),
                "Failed to create folder directory, skipping folder"
            );
            stats.folders_failed += 1;
            return;
        }
        stats.folders += 1;
        debug!(folder = %folder.name, dir = %dir.display(), "Exporting folder");

        match self.load_messages(folder, stats) {
            Ok(mut messages) => {
                order_messages(&mut messages, self.options.newest_first);
                for message in &messages {
                    self.export_one(message, &dir, stats);
                    if let Some(cb) = progress {
                        cb(&folder.name, stats.messages_exported + stats.messages_failed);
                    }
                }
            }
            Err(e) => {
                warn!(folder = %folder.name, error = %e, "Failed to enumerate folder");
                stats.folders_failed += 1;
            }
        }

        match self.source.child_folders(folder) {
            Ok(children) => {
                for child in &children {
                    self.export_folder(child, &dir, stats, progress);
                }
            }
            Err(e) => {
                warn!(folder = %folder.name, error = %e, "Failed to list subfolders");
            }
        }

        self.registry.forget(&dir);
    }

    /// Decode every item of `folder`, skipping the unreadable ones.
    fn load_messages(
        &self,
        folder: &SourceFolder,
        stats: &mut ExportStats,
    ) -> Result<Vec<SourceMessage>> {
        let mut messages = Vec::new();
        for item in self.source.messages(folder)? {
            match item {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!(
                        folder = %folder.name,
                        error = %truncate_message(&e.to_string(), MESSAGE_ERROR_LEN),
                        "Skipping unreadable item"
                    );
                    stats.items_skipped += 1;
                }
            }
        }
        Ok(messages)
    }

    fn export_one(&self, message: &SourceMessage, dir: &Path, stats: &mut ExportStats) {
        match export_message(message, dir, &self.registry, &self.options) {
            Ok(report) => stats.record(&report),
            Err(e) => {
                let subject = sanitize_subject(
                    message.subject.as_deref(),
                    self.options.subject_max_len,
                    &self.options.fallback_subject,
                );
                warn!(
                    subject = %subject,
                    error = %truncate_message(&e.to_string(), MESSAGE_ERROR_LEN),
                    "Failed to export message"
                );
                stats.messages_failed += 1;
            }
        }
    }
}

/// Sort newest first by receipt time. Items without a time go last; ties
/// keep source order. With `newest_first` off, source order is kept.
pub fn order_messages(messages: &mut [SourceMessage], newest_first: bool) {
    if !newest_first {
        return;
    }
    messages.sort_by(|a, b| match (a.receipt_time(), b.receipt_time()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryFolder, MemorySource};
    use chrono::DateTime;

    fn dated(subject: &str, received: Option<&str>) -> SourceMessage {
        SourceMessage {
            subject: Some(subject.to_string()),
            received: received.map(|r| DateTime::parse_from_rfc3339(r).unwrap()),
            body: "body\n".to_string(),
            ..Default::default()
        }
    }

    fn subjects(messages: &[SourceMessage]) -> Vec<&str> {
        messages
            .iter()
            .map(|m| m.subject.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn test_order_newest_first_untimed_last() {
        let mut messages = vec![
            dated("untimed-a", None),
            dated("old", Some("2023-01-01T00:00:00Z")),
            dated("new", Some("2024-06-01T00:00:00Z")),
            dated("untimed-b", None),
            dated("middle", Some("2023-06-01T12:00:00+02:00")),
        ];
        order_messages(&mut messages, true);
        assert_eq!(
            subjects(&messages),
            vec!["new", "middle", "old", "untimed-a", "untimed-b"]
        );
    }

    #[test]
    fn test_order_disabled_keeps_source_order() {
        let mut messages = vec![
            dated("a", Some("2023-01-01T00:00:00Z")),
            dated("b", Some("2024-01-01T00:00:00Z")),
        ];
        order_messages(&mut messages, false);
        assert_eq!(subjects(&messages), vec!["a", "b"]);
    }

    #[test]
    fn test_run_counts_and_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let source = MemorySource::new(vec![MemoryFolder::new("Inbox")
            .with_message(dated("Hello", Some("2024-01-01T00:00:00Z")))
            .with_unreadable("broken")
            .with_child(MemoryFolder::new("Sub/Folder").with_message(dated("Nested", None)))]);

        let exporter = Exporter::new(&source, tmp.path(), ExportOptions::default());
        let stats = exporter.run(None).unwrap();

        assert_eq!(stats.folders, 2);
        assert_eq!(stats.messages_exported, 2);
        assert_eq!(stats.items_skipped, 1);
        assert_eq!(stats.messages_failed, 0);
        assert!(tmp.path().join("Inbox/Hello.eml").is_file());
        assert!(tmp.path().join("Inbox/Sub_Folder/Nested.eml").is_file());
    }

    #[test]
    fn test_output_root_must_be_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, b"x").unwrap();
        let source = MemorySource::new(vec![MemoryFolder::new("Inbox")]);

        let result = Exporter::new(&source, &file, ExportOptions::default()).run(None);
        assert!(matches!(result, Err(ExportError::Export(_))));
    }

    #[test]
    fn test_progress_reports_each_message() {
        let tmp = tempfile::tempdir().unwrap();
        let source = MemorySource::new(vec![MemoryFolder::new("Inbox")
            .with_message(dated("One", None))
            .with_message(dated("Two", None))]);

        let seen = std::cell::RefCell::new(Vec::new());
        let callback = |folder: &str, n: usize| seen.borrow_mut().push((folder.to_string(), n));
        Exporter::new(&source, tmp.path(), ExportOptions::default())
            .run(Some(&callback))
            .unwrap();

        assert_eq!(
            seen.into_inner(),
            vec![("Inbox".to_string(), 1), ("Inbox".to_string(), 2)]
        );
    }
}
