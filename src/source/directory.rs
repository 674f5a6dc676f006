//! Filesystem mailbox tree.
//!
//! Layout:
//! - every subdirectory is a folder;
//! - every `*.mbox` file is a folder named after its stem, holding the
//!   messages of the file and no subfolders;
//! - `*.eml` files inside a folder directory are its items.
//!
//! A `.mbox` file given as the root is a single top-level folder. Loose
//! `.eml` files directly under a root directory belong to no folder and are
//! not exported.

use std::path::{Path, PathBuf};

use crate::error::{ExportError, Result};

use super::decode::decode_message;
use super::mbox::MboxReader;
use super::{MailSource, MessageIter, SourceFolder};

/// A mailbox tree rooted at a directory or a single MBOX file.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Validate `root` and create the source.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let metadata = std::fs::metadata(root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::SourceNotFound(root.to_path_buf())
            } else {
                ExportError::SourceUnavailable(format!("{}: {e}", root.display()))
            }
        })?;

        if metadata.is_dir() || (metadata.is_file() && has_extension(root, "mbox")) {
            Ok(Self {
                root: root.to_path_buf(),
            })
        } else {
            Err(ExportError::SourceUnavailable(format!(
                "{} is neither a directory nor an .mbox file",
                root.display()
            )))
        }
    }

    /// Subdirectories and `.mbox` files of `dir`, sorted by name.
    fn folders_in(&self, dir: &Path) -> Result<Vec<SourceFolder>> {
        let mut folders: Vec<SourceFolder> = read_dir_sorted(dir)?
            .into_iter()
            .filter_map(|path| {
                if path.is_dir() {
                    let name = path.file_name()?.to_string_lossy().into_owned();
                    Some(SourceFolder {
                        name,
                        locator: path,
                    })
                } else if path.is_file() && has_extension(&path, "mbox") {
                    let name = path.file_stem()?.to_string_lossy().into_owned();
                    Some(SourceFolder {
                        name,
                        locator: path,
                    })
                } else {
                    None
                }
            })
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }
}

impl MailSource for DirectorySource {
    fn root_folders(&self) -> Result<Vec<SourceFolder>> {
        if self.root.is_file() {
            let name = self
                .root
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mbox".to_string());
            return Ok(vec![SourceFolder {
                name,
                locator: self.root.clone(),
            }]);
        }

        let loose = read_dir_sorted(&self.root)?
            .iter()
            .filter(|p| p.is_file() && has_extension(p, "eml"))
            .count();
        if loose > 0 {
            tracing::warn!(
                root = %self.root.display(),
                count = loose,
                "Ignoring .eml files outside any folder"
            );
        }

        self.folders_in(&self.root)
    }

    fn child_folders(&self, folder: &SourceFolder) -> Result<Vec<SourceFolder>> {
        if folder.locator.is_dir() {
            self.folders_in(&folder.locator)
        } else {
            Ok(Vec::new())
        }
    }

    fn messages<'a>(&'a self, folder: &SourceFolder) -> Result<MessageIter<'a>> {
        if folder.locator.is_dir() {
            let files: Vec<PathBuf> = read_dir_sorted(&folder.locator)?
                .into_iter()
                .filter(|p| p.is_file() && has_extension(p, "eml"))
                .collect();
            Ok(Box::new(files.into_iter().map(|path| {
                let raw = std::fs::read(&path).map_err(|e| ExportError::io(&path, e))?;
                decode_message(&raw).map_err(|e| {
                    ExportError::MessageDecode(format!("{}: {e}", path.display()))
                })
            })))
        } else {
            let reader = MboxReader::open(&folder.locator)?;
            Ok(Box::new(reader.map(|raw| decode_message(&raw?))))
        }
    }
}

/// Entries of `dir` sorted by path.
fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExportError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ExportError::io(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
