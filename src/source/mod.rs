//! Mailbox sources: the read-only folder tree that an export walks.

pub mod decode;
pub mod directory;
pub mod mbox;
pub mod memory;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::message::SourceMessage;

pub use directory::DirectorySource;
pub use memory::{MemoryFolder, MemorySource};

/// One folder of a source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    /// Display name, used for the output directory.
    pub name: String,
    /// Source-specific handle used to enumerate the folder again.
    pub locator: PathBuf,
}

/// Items of one folder. Each item is decoded independently, so one
/// unreadable item does not hide the rest.
pub type MessageIter<'a> = Box<dyn Iterator<Item = Result<SourceMessage>> + 'a>;

/// Read-only access to a mailbox tree.
pub trait MailSource {
    /// Top-level folders.
    fn root_folders(&self) -> Result<Vec<SourceFolder>>;

    /// Direct subfolders of `folder`, in source order.
    fn child_folders(&self, folder: &SourceFolder) -> Result<Vec<SourceFolder>>;

    /// Items of `folder`, in source order.
    fn messages<'a>(&'a self, folder: &SourceFolder) -> Result<MessageIter<'a>>;
}

/// Open the source at `path` (a directory tree or a single `.mbox` file).
pub fn open(path: &Path) -> Result<Box<dyn MailSource>> {
    Ok(Box::new(DirectorySource::open(path)?))
}
