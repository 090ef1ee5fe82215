// Operation Sink
// Records every mutating action to the run log and, in execute mode, performs it

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::utilities::quote;

/// A single mutating filesystem action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a directory and any missing parents
    MakeDirs(PathBuf),
    /// Delete a single file
    Remove(PathBuf),
    /// Delete a directory and everything beneath it
    RemoveTree(PathBuf),
    /// Relocate a file or a whole subtree
    Move(PathBuf, PathBuf),
    /// Copy a single file
    Copy(PathBuf, PathBuf),
    /// Copy a whole subtree to a destination that does not exist yet
    CopyTree(PathBuf, PathBuf),
}

impl fmt::Display for Operation {
    /// Shell rendering written to the run log
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::MakeDirs(path) => write!(f, "mkdir -p {}", quote(path)),
            Operation::Remove(path) => write!(f, "rm {}", quote(path)),
            Operation::RemoveTree(path) => write!(f, "rm -r {}", quote(path)),
            Operation::Move(src, dst) => write!(f, "mv {} {}", quote(src), quote(dst)),
            Operation::Copy(src, dst) => write!(f, "cp {} {}", quote(src), quote(dst)),
            Operation::CopyTree(src, dst) => write!(f, "cp -r {} {}", quote(src), quote(dst)),
        }
    }
}

/// Destination for every operation the reconciler decides on
///
/// Implementations must write the textual record before doing anything else,
/// so the log stays a complete account of what was attempted.
pub trait OperationSink {
    /// Whether applied operations change the filesystem
    fn mutates(&self) -> bool;

    /// Record and, depending on the sink, perform one operation
    fn apply(&mut self, op: &Operation) -> Result<()>;

    /// Flush the run log
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn make_dirs(&mut self, path: &Path) -> Result<()> {
        self.apply(&Operation::MakeDirs(path.to_path_buf()))
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.apply(&Operation::Remove(path.to_path_buf()))
    }

    fn remove_tree(&mut self, path: &Path) -> Result<()> {
        self.apply(&Operation::RemoveTree(path.to_path_buf()))
    }

    fn move_path(&mut self, src: &Path, dst: &Path) -> Result<()> {
        self.apply(&Operation::Move(src.to_path_buf(), dst.to_path_buf()))
    }

    fn copy(&mut self, src: &Path, dst: &Path) -> Result<()> {
        self.apply(&Operation::Copy(src.to_path_buf(), dst.to_path_buf()))
    }

    fn copy_tree(&mut self, src: &Path, dst: &Path) -> Result<()> {
        self.apply(&Operation::CopyTree(src.to_path_buf(), dst.to_path_buf()))
    }
}

/// Line-oriented operation log shared by both sinks
struct Journal<W: Write> {
    out: W,
}

impl<W: Write> Journal<W> {
    fn line(&mut self, line: impl fmt::Display) -> Result<()> {
        writeln!(self.out, "{line}").map_err(Error::Log)
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(Error::Log)
    }

    fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.out)
    }
}

/// Sink that logs each operation and then carries it out
pub struct ExecuteSink<W: Write> {
    journal: Journal<W>,
}

impl<W: Write> ExecuteSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            journal: Journal { out },
        }
    }

    /// Flush and hand back the log writer
    pub fn into_inner(self) -> Result<W> {
        self.journal.into_inner()
    }
}

impl<W: Write> OperationSink for ExecuteSink<W> {
    fn mutates(&self) -> bool {
        true
    }

    fn apply(&mut self, op: &Operation) -> Result<()> {
        self.journal.line(op)?;

        let outcome = match op {
            Operation::MakeDirs(path) => fs::create_dir_all(path),
            Operation::Remove(path) => fs::remove_file(path),
            Operation::RemoveTree(path) => fs::remove_dir_all(path),
            Operation::Move(src, dst) => move_path(src, dst),
            Operation::Copy(src, dst) => copy_file(src, dst),
            Operation::CopyTree(src, dst) => copy_tree(src, dst),
        };

        outcome.map_err(|e| Error::operation(op, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.journal.flush()
    }
}

/// Sink that only writes the log, producing a replayable shell script
pub struct RecordSink<W: Write> {
    journal: Journal<W>,
}

impl<W: Write> RecordSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            journal: Journal { out },
        }
    }

    /// Start a script whose first line is `shebang`
    pub fn script(out: W, shebang: &str) -> Result<Self> {
        let mut sink = Self::new(out);
        sink.journal.line(shebang)?;
        Ok(sink)
    }

    /// Flush and hand back the log writer
    pub fn into_inner(self) -> Result<W> {
        self.journal.into_inner()
    }
}

impl<W: Write> OperationSink for RecordSink<W> {
    fn mutates(&self) -> bool {
        false
    }

    fn apply(&mut self, op: &Operation) -> Result<()> {
        self.journal.line(op)
    }

    fn flush(&mut self) -> Result<()> {
        self.journal.flush()
    }
}

// ============================================================================
// Filesystem primitives used by ExecuteSink
// ============================================================================

/// Relocate a file or directory
///
/// Only what rename itself replaces is overwritten (a file over a file); any
/// other occupant of `dst` makes the move fail. Falls back to copy-then-delete
/// when rename is refused, e.g. across filesystems.
fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            let src_is_dir = fs::symlink_metadata(src)?.is_dir();
            tracing::warn!(
                src = %src.display(),
                dst = %dst.display(),
                error = %e,
                "rename refused, copying instead"
            );
            if src_is_dir {
                copy_tree(src, dst)?;
                fs::remove_dir_all(src)
            } else {
                copy_file(src, dst)?;
                fs::remove_file(src)
            }
        }
    }
}

/// Copy one file, keeping permissions and modification time
fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;

    // Preserve modification time so the copy is not reported stale next run
    match fs::metadata(src) {
        Ok(meta) => {
            let mtime = filetime::FileTime::from_last_modification_time(&meta);
            if let Err(e) = filetime::set_file_mtime(dst, mtime) {
                tracing::warn!(path = %dst.display(), error = %e, "could not preserve mtime");
            }
        }
        Err(e) => {
            tracing::warn!(path = %src.display(), error = %e, "could not read source mtime");
        }
    }

    Ok(())
}

/// Copy a directory tree to a destination that must not exist yet
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dst.display()),
        ));
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = if relative.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_link(src: &Path, dst: &Path) -> io::Result<()> {
    copy_file(src, dst)
}
