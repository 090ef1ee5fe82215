// Reconciler
// Two-pass lockstep merge of the master and slave listings:
// pass 1 evicts stale slave content into the bin, pass 2 copies master content in

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use super::listing::{DirEntry, Listing};
use super::merge::merge_join;
use super::sink::{Operation, OperationSink};
use crate::core::{SyncConfig, SyncMode};
use crate::error::{Error, Result};
use crate::utilities::{is_inside, normalize_path, relative_path};

/// Counters describing what a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Directory entries visited across both passes
    pub directories_inspected: usize,
    /// Slave files checked for staleness
    pub files_inspected: usize,
    pub dirs_made: usize,
    pub removed: usize,
    pub trees_removed: usize,
    pub moved: usize,
    pub copied: usize,
    pub trees_copied: usize,
}

impl ReconcileReport {
    fn record(&mut self, op: &Operation) {
        match op {
            Operation::MakeDirs(_) => self.dirs_made += 1,
            Operation::Remove(_) => self.removed += 1,
            Operation::RemoveTree(_) => self.trees_removed += 1,
            Operation::Move(..) => self.moved += 1,
            Operation::Copy(..) => self.copied += 1,
            Operation::CopyTree(..) => self.trees_copied += 1,
        }
    }

    /// Number of operations emitted
    pub fn operations(&self) -> usize {
        self.dirs_made
            + self.removed
            + self.trees_removed
            + self.moved
            + self.copied
            + self.trees_copied
    }

    /// True when the trees were already in sync
    pub fn is_noop(&self) -> bool {
        self.operations() == 0
    }
}

/// Directories already handled as a whole during the current pass
#[derive(Debug, Default)]
struct DiscardedSet {
    roots: Vec<PathBuf>,
}

impl DiscardedSet {
    fn insert(&mut self, path: &Path) {
        self.roots.push(path.to_path_buf());
    }

    /// Whether `path` is one of the handled directories or lies beneath one
    fn covers(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| is_inside(path, root))
    }
}

fn entry_key(entry: &DirEntry) -> &OsStr {
    entry.path.as_os_str()
}

/// Metadata of `path`, falling back to the link itself when it dangles
fn stat(path: &Path) -> Result<fs::Metadata> {
    fs::metadata(path)
        .or_else(|_| fs::symlink_metadata(path))
        .map_err(|e| Error::io(path, e))
}

/// Check that all three roots are directories and none contains another
pub fn validate_trees(config: &SyncConfig) -> Result<()> {
    let roots = [&config.master, &config.slave, &config.bin];

    let mut resolved = Vec::with_capacity(roots.len());
    for root in roots {
        if !root.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        let canonical = root.canonicalize().map_err(|e| Error::io(root, e))?;
        resolved.push((root, normalize_path(&canonical)));
    }

    for (i, (outer, outer_path)) in resolved.iter().enumerate() {
        for (j, (inner, inner_path)) in resolved.iter().enumerate() {
            if i != j && is_inside(inner_path, outer_path) {
                return Err(Error::OverlappingTrees {
                    outer: outer.to_path_buf(),
                    inner: inner.to_path_buf(),
                });
            }
        }
    }

    Ok(())
}

/// Drives one reconciliation run against an operation sink
pub struct Reconciler<'a, S: OperationSink + ?Sized> {
    config: &'a SyncConfig,
    sink: &'a mut S,
    /// Bin directories already created (or recorded as created) this run
    ensured_bins: HashSet<PathBuf>,
    report: ReconcileReport,
}

impl<'a, S: OperationSink + ?Sized> Reconciler<'a, S> {
    pub fn new(config: &'a SyncConfig, sink: &'a mut S) -> Self {
        Self {
            config,
            sink,
            ensured_bins: HashSet::new(),
            report: ReconcileReport::default(),
        }
    }

    /// List both trees and run both passes
    pub fn run(mut self) -> Result<ReconcileReport> {
        validate_trees(self.config)?;

        if self.config.mode == SyncMode::RecordOnly && self.sink.mutates() {
            tracing::warn!("record-only run given a mutating sink; operations will be executed");
        }

        let master = Listing::scan(&self.config.master)?;
        let slave = Listing::scan(&self.config.slave)?;
        tracing::info!(
            master_dirs = master.len(),
            master_files = master.file_count(),
            slave_dirs = slave.len(),
            slave_files = slave.file_count(),
            "listed trees"
        );

        self.evict_pass(&master, &slave)?;
        self.populate_pass(&master, &slave)?;
        self.sink.flush()?;

        tracing::info!(
            operations = self.report.operations(),
            moved = self.report.moved,
            removed = self.report.removed,
            trees_removed = self.report.trees_removed,
            copied = self.report.copied,
            trees_copied = self.report.trees_copied,
            "reconciliation finished"
        );

        Ok(self.report)
    }

    fn emit(&mut self, op: Operation) -> Result<()> {
        self.report.record(&op);
        self.sink.apply(&op)
    }

    /// Pass 1: move slave content that master no longer has, or has newer, into the bin
    fn evict_pass(&mut self, master: &Listing, slave: &Listing) -> Result<()> {
        tracing::debug!("pass 1: evicting stale slave content");
        let mut discarded = DiscardedSet::default();

        for (slave_dir, master_dir) in
            merge_join(slave.entries(), master.entries(), entry_key, entry_key)
        {
            self.report.directories_inspected += 1;

            match master_dir {
                Some(master_dir) => self.evict_stale_files(slave_dir, master_dir)?,
                None if discarded.covers(&slave_dir.path) => {}
                None => {
                    self.evict_directory(&slave_dir.path)?;
                    discarded.insert(&slave_dir.path);
                }
            }
        }

        Ok(())
    }

    /// Move a directory master no longer has into the bin, deleting oversized files first
    fn evict_directory(&mut self, relative: &Path) -> Result<()> {
        let src = relative_path(&self.config.slave, relative);
        let dst = relative_path(&self.config.bin, relative);
        tracing::debug!(path = %relative.display(), "directory removed upstream");

        for entry in WalkDir::new(&src).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(src.as_path()).to_path_buf();
                Error::io(path, e.into())
            })?;
            if entry.file_type().is_dir() {
                continue;
            }

            let len = entry
                .metadata()
                .map_err(|e| Error::io(entry.path(), e.into()))?
                .len();
            if self.config.threshold.is_exceeded_by(len) {
                self.emit(Operation::Remove(entry.path().to_path_buf()))?;
            }
        }

        if let Some(parent) = dst.parent() {
            self.ensure_bin_dir(parent)?;
        }
        self.clear_bin_target(&dst, true)?;
        self.emit(Operation::Move(src, dst))
    }

    /// Handle the files of a directory both trees have
    fn evict_stale_files(&mut self, slave_dir: &DirEntry, master_dir: &DirEntry) -> Result<()> {
        let slave_root = relative_path(&self.config.slave, &slave_dir.path);
        let master_root = relative_path(&self.config.master, &master_dir.path);
        let bin_root = relative_path(&self.config.bin, &slave_dir.path);

        for name in &slave_dir.files {
            self.report.files_inspected += 1;

            let slave_file = slave_root.join(name);
            let master_file = master_root.join(name);
            let in_master = master_dir.has_file(name);
            let slave_meta = stat(&slave_file)?;

            let stale = if in_master {
                let master_meta = stat(&master_file)?;
                FileTime::from_last_modification_time(&master_meta)
                    > FileTime::from_last_modification_time(&slave_meta)
            } else {
                true
            };
            if !stale {
                continue;
            }

            tracing::debug!(
                file = %slave_file.display(),
                updated = in_master,
                "stale slave file"
            );

            if self.config.threshold.is_exceeded_by(slave_meta.len()) {
                self.emit(Operation::Remove(slave_file.clone()))?;
            } else {
                let archived = bin_root.join(name);
                self.ensure_bin_dir(&bin_root)?;
                self.clear_bin_target(&archived, false)?;
                self.emit(Operation::Move(slave_file.clone(), archived))?;
            }

            // Record-only: the old file is still in place, so pass 2 will not copy it
            if in_master && !self.sink.mutates() {
                self.emit(Operation::Copy(master_file, slave_file))?;
            }
        }

        Ok(())
    }

    fn ensure_bin_dir(&mut self, dir: &Path) -> Result<()> {
        if self.ensured_bins.contains(dir) {
            return Ok(());
        }
        if !dir.is_dir() {
            if let Some(blocker) = self.bin_blocker(dir) {
                tracing::debug!(
                    path = %blocker.display(),
                    "archived file is in the way of a bin directory"
                );
                self.emit(Operation::Remove(blocker))?;
            }
            self.emit(Operation::MakeDirs(dir.to_path_buf()))?;
        }
        self.ensured_bins.insert(dir.to_path_buf());
        Ok(())
    }

    /// The non-directory below BIN, if any, occupying `dir` or one of its parents
    fn bin_blocker(&self, dir: &Path) -> Option<PathBuf> {
        let mut chain: Vec<&Path> = dir
            .ancestors()
            .take_while(|path| *path != self.config.bin.as_path())
            .collect();
        chain.reverse();

        for path in chain {
            if self.ensured_bins.contains(path) {
                continue;
            }
            match fs::symlink_metadata(path) {
                Err(_) => return None,
                Ok(_) if path.is_dir() => continue,
                Ok(_) => return Some(path.to_path_buf()),
            }
        }
        None
    }

    /// Clear whatever a move to `dst` could not simply replace
    ///
    /// A rename replaces a file with a file and nothing else, so an existing
    /// directory, a symlink, or a file standing where a directory goes is
    /// removed through the sink first.
    fn clear_bin_target(&mut self, dst: &Path, incoming_dir: bool) -> Result<()> {
        let Ok(meta) = fs::symlink_metadata(dst) else {
            return Ok(());
        };

        if meta.is_dir() {
            self.emit(Operation::RemoveTree(dst.to_path_buf()))
        } else if incoming_dir || meta.file_type().is_symlink() {
            self.emit(Operation::Remove(dst.to_path_buf()))
        } else {
            Ok(())
        }
    }

    /// Pass 2: copy into slave whatever master has and slave lacks
    fn populate_pass(&mut self, master: &Listing, slave: &Listing) -> Result<()> {
        tracing::debug!("pass 2: populating slave from master");
        let mut discarded = DiscardedSet::default();

        for (master_dir, slave_dir) in
            merge_join(master.entries(), slave.entries(), entry_key, entry_key)
        {
            self.report.directories_inspected += 1;

            match slave_dir {
                Some(_) => self.copy_missing_files(master_dir)?,
                None if discarded.covers(&master_dir.path) => {}
                None => {
                    tracing::debug!(path = %master_dir.path.display(), "directory added upstream");
                    self.emit(Operation::CopyTree(
                        relative_path(&self.config.master, &master_dir.path),
                        relative_path(&self.config.slave, &master_dir.path),
                    ))?;
                    discarded.insert(&master_dir.path);
                }
            }
        }

        Ok(())
    }

    /// Copy each master file that is not currently a file in slave
    fn copy_missing_files(&mut self, master_dir: &DirEntry) -> Result<()> {
        let master_root = relative_path(&self.config.master, &master_dir.path);
        let slave_root = relative_path(&self.config.slave, &master_dir.path);

        for name in &master_dir.files {
            let target = slave_root.join(name);
            if !target.is_file() {
                self.emit(Operation::Copy(master_root.join(name), target))?;
            }
        }

        Ok(())
    }
}

/// Reconcile `config.slave` toward `config.master`, sending every operation to `sink`
pub fn reconcile<S: OperationSink + ?Sized>(
    config: &SyncConfig,
    sink: &mut S,
) -> Result<ReconcileReport> {
    Reconciler::new(config, sink).run()
}
