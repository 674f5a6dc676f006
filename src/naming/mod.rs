//! Output naming: subject sanitization, file-name cleanup, and collision
//! resolution against a per-directory registry of used names.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::mime::sniff::split_extension;

/// Default length limit for subject-derived file names, in characters.
pub const SUBJECT_MAX_LEN: usize = 50;

/// Used when a subject is absent or sanitizes to nothing.
pub const FALLBACK_SUBJECT: &str = "No Subject";

/// Characters that are never valid in a file name on common filesystems.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reduce a subject to alphanumerics, spaces, underscores, and hyphens,
/// truncated to `max_len` characters. Surrounding spaces are trimmed; a
/// result with nothing left falls back to `fallback`.
pub fn sanitize_subject(subject: Option<&str>, max_len: usize, fallback: &str) -> String {
    let sanitized: String = subject
        .unwrap_or("")
        .chars()
        .filter(|&c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-')
        .take(max_len)
        .collect();

    match sanitized.trim() {
        "" => fallback.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Make an arbitrary name usable as a single path component.
///
/// Separators, reserved characters, and control characters become `_`;
/// trailing dots and spaces are dropped; `.`/`..`/empty become `unnamed`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || RESERVED.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `name` with `_{n}` inserted before the extension (or appended).
pub fn with_suffix(name: &str, n: usize) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}_{n}{ext}")
}

/// Registry of names issued per output directory.
///
/// A candidate name is taken if it was issued before for the same directory
/// or already exists on disk there, so repeated runs never overwrite earlier
/// output. The registry is `Sync`; concurrent resolutions within one
/// directory are serialized.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: Mutex<HashMap<PathBuf, HashSet<String>>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `desired` to a free, filesystem-safe name in `dir` and mark it used.
    ///
    /// The first free candidate of `desired`, `desired_1`, `desired_2`, ...
    /// (suffix before the extension) is returned.
    pub fn resolve(&self, dir: &Path, desired: &str) -> String {
        let desired = sanitize_file_name(desired);
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        let issued = used.entry(dir.to_path_buf()).or_default();

        let mut candidate = desired.clone();
        let mut counter = 1;
        while issued.contains(&candidate) || dir.join(&candidate).exists() {
            candidate = with_suffix(&desired, counter);
            counter += 1;
        }

        issued.insert(candidate.clone());
        candidate
    }

    /// Drop the names recorded for `dir` and every directory below it.
    ///
    /// Names already written to disk stay protected by the existence check.
    pub fn forget(&self, dir: &Path) {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        used.retain(|key, _| !key.starts_with(dir));
    }

    /// Number of names issued for `dir` since it was last forgotten.
    pub fn issued_count(&self, dir: &Path) -> usize {
        let used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        used.get(dir).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_subject() {
        assert_eq!(
            sanitize_subject(Some("Q3 Report!!"), SUBJECT_MAX_LEN, FALLBACK_SUBJECT),
            "Q3 Report"
        );
        assert_eq!(
            sanitize_subject(Some("RE: a/b\\c"), SUBJECT_MAX_LEN, FALLBACK_SUBJECT),
            "RE abc"
        );
        assert_eq!(
            sanitize_subject(Some("Café_menu-2024"), SUBJECT_MAX_LEN, FALLBACK_SUBJECT),
            "Café_menu-2024"
        );
    }

    #[test]
    fn test_sanitize_subject_fallback() {
        assert_eq!(sanitize_subject(None, 50, FALLBACK_SUBJECT), "No Subject");
        assert_eq!(sanitize_subject(Some("!!!"), 50, FALLBACK_SUBJECT), "No Subject");
        assert_eq!(sanitize_subject(Some(""), 50, FALLBACK_SUBJECT), "No Subject");
    }

    #[test]
    fn test_sanitize_subject_blank_after_filtering() {
        assert_eq!(sanitize_subject(Some("!! "), 50, "No Subject"), "No Subject");
        assert_eq!(sanitize_subject(Some("   "), 50, "No Subject"), "No Subject");
        assert_eq!(sanitize_subject(Some("  Hi "), 50, "No Subject"), "Hi");
    }

    #[test]
    fn test_sanitize_subject_truncates_chars() {
        let long = "é".repeat(80);
        let result = sanitize_subject(Some(&long), SUBJECT_MAX_LEN, FALLBACK_SUBJECT);
        assert_eq!(result.chars().count(), 50);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("a:b*c?.txt"), "a_b_c_.txt");
        assert_eq!(sanitize_file_name("name. . "), "name");
        assert_eq!(sanitize_file_name(".."), "unnamed");
        assert_eq!(sanitize_file_name(""), "unnamed");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("image1.png", 1), "image1_1.png");
        assert_eq!(with_suffix("Q3 Report.eml", 2), "Q3 Report_2.eml");
        assert_eq!(with_suffix("README", 3), "README_3");
    }

    #[test]
    fn test_resolve_repeated_names_are_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = NameRegistry::new();
        let names: Vec<String> = (0..5)
            .map(|_| registry.resolve(tmp.path(), "image1.png"))
            .collect();
        assert_eq!(names[0], "image1.png");
        assert_eq!(names[1], "image1_1.png");
        assert_eq!(names[4], "image1_4.png");
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(registry.issued_count(tmp.path()), 5);
    }

    #[test]
    fn test_resolve_respects_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Q3 Report.eml"), b"old").unwrap();
        std::fs::write(tmp.path().join("Q3 Report_1.eml"), b"old").unwrap();

        let registry = NameRegistry::new();
        assert_eq!(registry.resolve(tmp.path(), "Q3 Report.eml"), "Q3 Report_2.eml");
    }

    #[test]
    fn test_resolve_is_scoped_per_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let registry = NameRegistry::new();
        assert_eq!(registry.resolve(&a, "x.txt"), "x.txt");
        assert_eq!(registry.resolve(&b, "x.txt"), "x.txt");
        assert_eq!(registry.resolve(&a, "x.txt"), "x_1.txt");
    }

    #[test]
    fn test_forget_clears_subtree() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("Inbox");
        let attachments = folder.join("Hello_attachments");
        let registry = NameRegistry::new();
        registry.resolve(&folder, "Hello.eml");
        registry.resolve(&attachments, "image1.png");

        registry.forget(&folder);
        assert_eq!(registry.issued_count(&folder), 0);
        assert_eq!(registry.issued_count(&attachments), 0);
        assert_eq!(registry.resolve(&folder, "Hello.eml"), "Hello.eml");
    }

    #[test]
    fn test_concurrent_resolution_is_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = NameRegistry::new();
        let dir = tmp.path();

        let names: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.resolve(dir, "No Subject.eml")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), 8);
        assert!(names.contains(&"No Subject.eml".to_string()));
    }
}
