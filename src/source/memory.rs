//! In-memory mailbox tree for library callers and tests.

use std::path::{Path, PathBuf};

use crate::error::{ExportError, Result};
use crate::model::message::SourceMessage;

use super::{MailSource, MessageIter, SourceFolder};

/// A folder with its items and subfolders.
#[derive(Debug, Clone, Default)]
pub struct MemoryFolder {
    pub name: String,
    /// Items in source order. `Err` entries model unreadable items.
    pub items: Vec<std::result::Result<SourceMessage, String>>,
    pub children: Vec<MemoryFolder>,
}

impl MemoryFolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: SourceMessage) -> Self {
        self.items.push(Ok(message));
        self
    }

    /// Add an item that fails to decode with `reason`.
    pub fn with_unreadable(mut self, reason: impl Into<String>) -> Self {
        self.items.push(Err(reason.into()));
        self
    }

    pub fn with_child(mut self, child: MemoryFolder) -> Self {
        self.children.push(child);
        self
    }
}

/// Source over a list of [`MemoryFolder`] roots.
///
/// Locators are index paths (`0/2/1`) into the tree.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    roots: Vec<MemoryFolder>,
}

impl MemorySource {
    pub fn new(roots: Vec<MemoryFolder>) -> Self {
        Self { roots }
    }

    fn lookup(&self, locator: &Path) -> Result<&MemoryFolder> {
        let invalid = || ExportError::InvalidPath(locator.display().to_string());
        let mut level = &self.roots;
        let mut found = None;
        for component in locator.iter() {
            let index: usize = component
                .to_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(invalid)?;
            let folder = level.get(index).ok_or_else(invalid)?;
            level = &folder.children;
            found = Some(folder);
        }
        found.ok_or_else(invalid)
    }
}

fn listing(folders: &[MemoryFolder], parent: &Path) -> Vec<SourceFolder> {
    folders
        .iter()
        .enumerate()
        .map(|(i, f)| SourceFolder {
            name: f.name.clone(),
            locator: parent.join(i.to_string()),
        })
        .collect()
}

impl MailSource for MemorySource {
    fn root_folders(&self) -> Result<Vec<SourceFolder>> {
        Ok(listing(&self.roots, Path::new("")))
    }

    fn child_folders(&self, folder: &SourceFolder) -> Result<Vec<SourceFolder>> {
        let node = self.lookup(&folder.locator)?;
        Ok(listing(&node.children, &folder.locator))
    }

    fn messages<'a>(&'a self, folder: &SourceFolder) -> Result<MessageIter<'a>> {
        let node = self.lookup(&folder.locator)?;
        Ok(Box::new(node.items.iter().map(|item| {
            item.clone().map_err(ExportError::MessageDecode)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> MemorySource {
        MemorySource::new(vec![MemoryFolder::new("Inbox")
            .with_message(SourceMessage::default())
            .with_unreadable("corrupt item")
            .with_child(MemoryFolder::new("Projects"))])
    }

    #[test]
    fn test_walk_tree() {
        let source = tree();
        let roots = source.root_folders().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "Inbox");

        let children = source.child_folders(&roots[0]).unwrap();
        assert_eq!(children[0].name, "Projects");
        assert!(source.child_folders(&children[0]).unwrap().is_empty());
    }

    #[test]
    fn test_items_keep_failures() {
        let source = tree();
        let roots = source.root_folders().unwrap();
        let items: Vec<_> = source.messages(&roots[0]).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ExportError::MessageDecode(_))));
    }

    #[test]
    fn test_bad_locator() {
        let source = tree();
        let bogus = SourceFolder {
            name: "x".to_string(),
            locator: PathBuf::from("7"),
        };
        assert!(source.messages(&bogus).is_err());
    }
}
