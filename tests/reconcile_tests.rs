//! Reconciliation scenarios run against real temporary trees.
//!
//! Each test builds MASTER, SLAVE and BIN under a `TempDir`, pins file
//! modification times with `filetime`, and captures the operations the
//! reconciler emits while forwarding them to a real sink.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;
use tree_sync::{
    reconcile, Error, ExecuteSink, Operation, OperationSink, RecordSink, Result, SizeThreshold,
    SyncConfig, SyncMode,
};

/// Forwards to an inner sink and keeps a copy of every operation
struct Capture<S> {
    inner: S,
    ops: Vec<Operation>,
}

impl<S: OperationSink> Capture<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            ops: Vec::new(),
        }
    }
}

impl<S: OperationSink> OperationSink for Capture<S> {
    fn mutates(&self) -> bool {
        self.inner.mutates()
    }

    fn apply(&mut self, op: &Operation) -> Result<()> {
        self.ops.push(op.clone());
        self.inner.apply(op)
    }
}

struct Trees {
    _temp: TempDir,
    master: PathBuf,
    slave: PathBuf,
    bin: PathBuf,
}

impl Trees {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let master = temp.path().join("master");
        let slave = temp.path().join("slave");
        let bin = temp.path().join("bin");
        for dir in [&master, &slave, &bin] {
            fs::create_dir(dir).unwrap();
        }
        Self {
            _temp: temp,
            master,
            slave,
            bin,
        }
    }

    fn config(&self, threshold: u64, mode: SyncMode) -> SyncConfig {
        SyncConfig::new(&self.master, &self.slave, &self.bin)
            .unwrap()
            .with_threshold(SizeThreshold::from_bytes(threshold))
            .with_mode(mode)
    }

    fn execute(&self, threshold: u64) -> Vec<Operation> {
        let config = self.config(threshold, SyncMode::Execute);
        let mut sink = Capture::new(ExecuteSink::new(Vec::new()));
        reconcile(&config, &mut sink).unwrap();
        sink.ops
    }

    fn record(&self, threshold: u64) -> Vec<Operation> {
        let config = self.config(threshold, SyncMode::RecordOnly);
        let mut sink = Capture::new(RecordSink::new(Vec::new()));
        reconcile(&config, &mut sink).unwrap();
        sink.ops
    }
}

/// Write `len` bytes to `root/relative` with the given mtime (unix seconds)
fn put(root: &Path, relative: &str, len: usize, mtime: i64) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, vec![b'x'; len]).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

fn mv(from: PathBuf, to: PathBuf) -> Operation {
    Operation::Move(from, to)
}

fn cp(from: PathBuf, to: PathBuf) -> Operation {
    Operation::Copy(from, to)
}

/// Sorted list of every file under `root`, relative to it
fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[test]
fn test_stale_file_and_removed_directory() {
    let t = Trees::new();
    put(&t.master, "a/x.txt", 10, 2_000);
    put(&t.slave, "a/x.txt", 10, 1_000);
    put(&t.slave, "b/y.txt", 10, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            Operation::MakeDirs(t.bin.join("a")),
            mv(t.slave.join("a/x.txt"), t.bin.join("a/x.txt")),
            mv(t.slave.join("b"), t.bin.join("b")),
            cp(t.master.join("a/x.txt"), t.slave.join("a/x.txt")),
        ]
    );
    assert_eq!(files_under(&t.slave), vec!["a/x.txt"]);
    assert_eq!(files_under(&t.bin), vec!["a/x.txt", "b/y.txt"]);

    let refreshed = fs::metadata(t.slave.join("a/x.txt")).unwrap();
    assert_eq!(
        FileTime::from_last_modification_time(&refreshed),
        FileTime::from_unix_time(2_000, 0)
    );
}

#[test]
fn test_record_only_emits_replacement_copy_immediately() {
    let t = Trees::new();
    put(&t.master, "a/x.txt", 10, 2_000);
    put(&t.slave, "a/x.txt", 10, 1_000);
    put(&t.slave, "b/y.txt", 10, 1_000);

    let ops = t.record(1000);

    assert_eq!(
        ops,
        vec![
            Operation::MakeDirs(t.bin.join("a")),
            mv(t.slave.join("a/x.txt"), t.bin.join("a/x.txt")),
            cp(t.master.join("a/x.txt"), t.slave.join("a/x.txt")),
            mv(t.slave.join("b"), t.bin.join("b")),
        ]
    );
    // Nothing was touched
    assert_eq!(files_under(&t.slave), vec!["a/x.txt", "b/y.txt"]);
    assert!(files_under(&t.bin).is_empty());
}

#[test]
fn test_record_only_does_not_copy_files_deleted_upstream() {
    let t = Trees::new();
    put(&t.master, "keep.txt", 1, 1_000);
    put(&t.slave, "keep.txt", 1, 1_000);
    put(&t.slave, "gone.txt", 1, 1_000);

    let ops = t.record(1000);

    assert_eq!(ops, vec![mv(t.slave.join("gone.txt"), t.bin.join("gone.txt"))]);
}

#[rstest]
#[case::same_mtime(1_000, 1_000)]
#[case::master_older(1_000, 5_000)]
fn test_up_to_date_file_is_left_alone(#[case] master_mtime: i64, #[case] slave_mtime: i64) {
    let t = Trees::new();
    put(&t.master, "d/f.txt", 10, master_mtime);
    put(&t.slave, "d/f.txt", 10, slave_mtime);

    assert!(t.execute(1000).is_empty());
    assert!(t.record(1000).is_empty());
}

#[test]
fn test_oversized_stale_file_is_removed_not_archived() {
    let t = Trees::new();
    put(&t.master, "big.iso", 2_000, 2_000);
    put(&t.slave, "big.iso", 2_000, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            Operation::Remove(t.slave.join("big.iso")),
            cp(t.master.join("big.iso"), t.slave.join("big.iso")),
        ]
    );
    assert!(files_under(&t.bin).is_empty());
}

#[test]
fn test_record_only_oversized_update_is_removed_then_copied() {
    let t = Trees::new();
    put(&t.master, "big.iso", 2_000, 2_000);
    put(&t.slave, "big.iso", 2_000, 1_000);

    let ops = t.record(1000);

    assert_eq!(
        ops,
        vec![
            Operation::Remove(t.slave.join("big.iso")),
            cp(t.master.join("big.iso"), t.slave.join("big.iso")),
        ]
    );
    assert_eq!(files_under(&t.slave), vec!["big.iso"]);
}

#[test]
fn test_file_at_threshold_is_still_archived() {
    let t = Trees::new();
    put(&t.slave, "edge.bin", 1000, 1_000);

    let ops = t.execute(1000);

    assert_eq!(ops, vec![mv(t.slave.join("edge.bin"), t.bin.join("edge.bin"))]);
}

#[test]
fn test_removed_directory_is_stripped_of_oversized_files_then_archived() {
    let t = Trees::new();
    put(&t.slave, "old/small.txt", 10, 1_000);
    put(&t.slave, "old/deep/huge.bin", 5_000, 1_000);
    put(&t.slave, "old/deep/tiny.txt", 1, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            Operation::Remove(t.slave.join("old/deep/huge.bin")),
            mv(t.slave.join("old"), t.bin.join("old")),
        ]
    );
    assert!(files_under(&t.slave).is_empty());
    assert_eq!(files_under(&t.bin), vec!["old/deep/tiny.txt", "old/small.txt"]);
}

#[test]
fn test_nested_removed_directory_lands_at_same_relative_path() {
    let t = Trees::new();
    put(&t.master, "keep/a.txt", 1, 1_000);
    put(&t.slave, "keep/a.txt", 1, 1_000);
    put(&t.slave, "keep/drop/b.txt", 1, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            Operation::MakeDirs(t.bin.join("keep")),
            mv(t.slave.join("keep/drop"), t.bin.join("keep/drop")),
        ]
    );
    assert_eq!(files_under(&t.bin), vec!["keep/drop/b.txt"]);
}

#[test]
fn test_sibling_with_shared_prefix_is_not_covered() {
    let t = Trees::new();
    put(&t.slave, "b/one.txt", 1, 1_000);
    put(&t.slave, "bb/two.txt", 1, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            mv(t.slave.join("b"), t.bin.join("b")),
            mv(t.slave.join("bb"), t.bin.join("bb")),
        ]
    );
}

#[test]
fn test_disjoint_trees() {
    let t = Trees::new();
    put(&t.master, "m/inner/deep.txt", 1, 1_000);
    put(&t.master, "m/top.txt", 1, 1_000);
    put(&t.master, "root.txt", 1, 1_000);
    put(&t.slave, "s/inner/other.txt", 1, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            mv(t.slave.join("s"), t.bin.join("s")),
            cp(t.master.join("root.txt"), t.slave.join("root.txt")),
            Operation::CopyTree(t.master.join("m"), t.slave.join("m")),
        ]
    );
    assert_eq!(files_under(&t.slave), files_under(&t.master));
}

#[test]
fn test_second_run_is_a_noop() {
    let t = Trees::new();
    put(&t.master, "a/x.txt", 10, 2_000);
    put(&t.master, "n/new/file.txt", 10, 2_000);
    put(&t.master, "same.txt", 10, 1_000);
    put(&t.slave, "a/x.txt", 10, 1_000);
    put(&t.slave, "same.txt", 10, 1_000);
    put(&t.slave, "b/y.txt", 10, 1_000);
    put(&t.slave, "orphan.txt", 10, 1_000);

    assert!(!t.execute(1000).is_empty());
    assert_eq!(files_under(&t.slave), files_under(&t.master));

    assert_eq!(t.execute(1000), Vec::<Operation>::new());
}

#[test]
fn test_file_replaced_by_directory_upstream() {
    let t = Trees::new();
    put(&t.master, "thing/inside.txt", 1, 1_000);
    put(&t.slave, "thing", 1, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            mv(t.slave.join("thing"), t.bin.join("thing")),
            Operation::CopyTree(t.master.join("thing"), t.slave.join("thing")),
        ]
    );
    assert!(t.slave.join("thing/inside.txt").is_file());
}

#[test]
fn test_rerun_replaces_archived_directory_through_the_log() {
    let t = Trees::new();
    put(&t.bin, "old/archived.txt", 1, 500);
    put(&t.slave, "old/fresh.txt", 1, 1_000);

    let expected = vec![
        Operation::RemoveTree(t.bin.join("old")),
        mv(t.slave.join("old"), t.bin.join("old")),
    ];
    assert_eq!(t.record(1000), expected);
    assert_eq!(t.execute(1000), expected);
    assert_eq!(files_under(&t.bin), vec!["old/fresh.txt"]);
}

#[test]
fn test_file_evicted_onto_archived_directory() {
    let t = Trees::new();
    put(&t.master, "a/keep.txt", 1, 1_000);
    put(&t.slave, "a/keep.txt", 1, 1_000);
    put(&t.slave, "a/thing", 1, 1_000);
    put(&t.bin, "a/thing/archived.txt", 1, 500);

    let expected = vec![
        Operation::RemoveTree(t.bin.join("a/thing")),
        mv(t.slave.join("a/thing"), t.bin.join("a/thing")),
    ];

    // Replaying the recorded script and executing must do the same thing
    assert_eq!(t.record(1000), expected);
    assert!(t.bin.join("a/thing/archived.txt").is_file());

    assert_eq!(t.execute(1000), expected);
    assert!(t.bin.join("a/thing").is_file());
    assert_eq!(files_under(&t.bin), vec!["a/thing"]);
}

#[test]
fn test_directory_evicted_onto_archived_file() {
    let t = Trees::new();
    put(&t.bin, "old", 1, 500);
    put(&t.slave, "old/fresh.txt", 1, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            Operation::Remove(t.bin.join("old")),
            mv(t.slave.join("old"), t.bin.join("old")),
        ]
    );
    assert_eq!(files_under(&t.bin), vec!["old/fresh.txt"]);
}

#[test]
fn test_archived_file_blocking_bin_directory_is_removed() {
    let t = Trees::new();
    put(&t.bin, "a", 1, 500);
    put(&t.master, "a/x.txt", 10, 2_000);
    put(&t.slave, "a/x.txt", 10, 1_000);

    let ops = t.execute(1000);

    assert_eq!(
        ops,
        vec![
            Operation::Remove(t.bin.join("a")),
            Operation::MakeDirs(t.bin.join("a")),
            mv(t.slave.join("a/x.txt"), t.bin.join("a/x.txt")),
            cp(t.master.join("a/x.txt"), t.slave.join("a/x.txt")),
        ]
    );
    assert_eq!(files_under(&t.bin), vec!["a/x.txt"]);

    // The next run finds nothing to do
    assert_eq!(t.execute(1000), Vec::<Operation>::new());
}

#[test]
fn test_missing_master_is_reported() {
    let t = Trees::new();
    fs::remove_dir(&t.master).unwrap();

    let config = t.config(1000, SyncMode::Execute);
    let mut sink = RecordSink::new(Vec::new());
    let err = reconcile(&config, &mut sink).unwrap_err();

    assert!(matches!(err, Error::DirectoryNotFound { path } if path == t.master));
}

#[cfg(unix)]
#[test]
fn test_failed_operation_aborts_run() {
    use std::os::unix::fs::PermissionsExt;

    let t = Trees::new();
    put(&t.slave, "gone.txt", 1, 1_000);
    put(&t.slave, "later/also_gone.txt", 1, 1_000);
    fs::set_permissions(&t.bin, fs::Permissions::from_mode(0o555)).unwrap();

    // Root can write anywhere; the check is meaningless there
    if fs::write(t.bin.join("writable"), "").is_ok() {
        return;
    }

    let config = t.config(1000, SyncMode::Execute);
    let mut sink = Capture::new(ExecuteSink::new(Vec::new()));
    let err = reconcile(&config, &mut sink).unwrap_err();

    assert!(matches!(err, Error::FilesystemOperationFailed { .. }));
    assert_eq!(sink.ops.len(), 1);
    assert!(t.slave.join("later/also_gone.txt").exists());

    fs::set_permissions(&t.bin, fs::Permissions::from_mode(0o755)).unwrap();
}
