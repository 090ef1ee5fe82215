// Tree Lister
// Sorted, recursive enumeration of a directory tree, one entry per directory

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One directory level of a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Path relative to the listed root; empty for the root itself
    pub path: PathBuf,
    /// Names of subdirectories, sorted
    pub subdirs: Vec<OsString>,
    /// Names of files, sorted
    pub files: Vec<OsString>,
}

impl DirEntry {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            subdirs: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Whether a file of this name is listed here
    pub fn has_file(&self, name: &OsStr) -> bool {
        self.files
            .binary_search_by(|file| file.as_os_str().cmp(name))
            .is_ok()
    }
}

/// Every directory of a tree, sorted ascending by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    entries: Vec<DirEntry>,
}

impl Listing {
    /// Walk `root` and list every directory under it
    ///
    /// Symbolic links are not followed. A link to a directory is reported as a
    /// subdirectory without an entry of its own; any other link is a file.
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut entries = vec![DirEntry::new(PathBuf::new())];
        let mut index: HashMap<PathBuf, usize> = HashMap::new();
        index.insert(PathBuf::new(), 0);

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                Error::io(path, source)
            })?;

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| Error::io(entry.path(), std::io::Error::other(e)))?
                .to_path_buf();
            let parent = relative.parent().unwrap_or(Path::new("")).to_path_buf();
            let name = entry.file_name().to_os_string();

            let file_type = entry.file_type();
            let is_dir = if file_type.is_symlink() {
                fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false)
            } else {
                file_type.is_dir()
            };

            // Walkdir yields a directory before its contents, so the parent is known
            let Some(&slot) = index.get(&parent) else {
                continue;
            };

            if is_dir {
                entries[slot].subdirs.push(name);
                if !file_type.is_symlink() {
                    index.insert(relative.clone(), entries.len());
                    entries.push(DirEntry::new(relative));
                }
            } else {
                entries[slot].files.push(name);
            }
        }

        for entry in &mut entries {
            entry.subdirs.sort();
            entry.files.sort();
        }
        entries.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));

        tracing::debug!(root = %root.display(), directories = entries.len(), "listed tree");

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of files across all directories
    pub fn file_count(&self) -> usize {
        self.entries.iter().map(|e| e.files.len()).sum()
    }
}
