// Tests for scan module
// Discovery, the worker pool and the full pipeline

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossbeam_channel::bounded;
use hashit::config::Config;
use hashit::hash::{
    self, discover, Aggregator, AlgorithmSelection, DigestEngine, FileTask, HashitError, ScanEngine, WorkerPool,
};
use tempfile::TempDir;

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn discovered(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, HashitError> {
    let (tx, rx) = bounded(1000);
    let cancel = AtomicBool::new(false);
    let count = discover(paths, recursive, &tx, &cancel)?;
    drop(tx);
    let mut found: Vec<PathBuf> = rx.iter().map(|task: FileTask| task.path).collect();
    assert_eq!(found.len(), count);
    found.sort();
    Ok(found)
}

fn tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
    fs::write(dir.path().join("root.txt"), b"root").unwrap();
    fs::write(dir.path().join(".hidden"), b"hidden").unwrap();
    fs::write(dir.path().join("sub/one.txt"), b"one").unwrap();
    fs::write(dir.path().join("sub/deeper/two.txt"), b"two").unwrap();
    dir
}

#[test]
fn test_discover_recursive_finds_every_regular_file() {
    let dir = tree();
    let found = discovered(&[dir.path().to_path_buf()], true).unwrap();

    assert_eq!(found.len(), 4);
    assert!(found.iter().any(|p| p.ends_with(".hidden")));
    assert!(found.iter().any(|p| p.ends_with("sub/deeper/two.txt")));
}

#[test]
fn test_discover_non_recursive_skips_directories() {
    let dir = tree();
    let file = dir.path().join("root.txt");
    let found = discovered(&[dir.path().join("sub"), file.clone()], false).unwrap();
    assert_eq!(found, vec![file]);
}

#[test]
fn test_discover_missing_path_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = discovered(&[dir.path().join("nope")], true).unwrap_err();
    assert!(matches!(err, HashitError::FileNotFound { .. }));
}

#[cfg(unix)]
#[test]
fn test_discover_does_not_follow_symlinks() {
    let dir = tree();
    std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("link")).unwrap();
    let found = discovered(&[dir.path().to_path_buf()], true).unwrap();
    assert_eq!(found.len(), 4);
}

#[test]
fn test_worker_pool_drains_queue_and_closes_results() {
    let dir = tree();
    let files = discovered(&[dir.path().to_path_buf()], true).unwrap();

    let (task_tx, task_rx) = bounded(2);
    let (result_tx, result_rx) = bounded(2);
    let pool = WorkerPool::new(3, DigestEngine::new(), AlgorithmSelection::default());
    let handles = pool
        .spawn(task_rx, result_tx, Arc::new(AtomicBool::new(false)))
        .unwrap();

    let producer = std::thread::spawn(move || {
        for path in files {
            task_tx.send(FileTask { path }).unwrap();
        }
    });

    // Returns only once every worker has dropped its sender
    let report = Aggregator::new().summarize(result_rx);
    producer.join().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(report.files_processed(), 4);
    assert!(report.valid);
}

#[test]
fn test_run_reports_each_file_once() {
    let dir = TempDir::new().unwrap();
    for i in 0..50 {
        fs::write(dir.path().join(format!("file{:02}.txt", i)), format!("content {}", i)).unwrap();
    }

    let config = Config {
        paths: vec![dir.path().to_path_buf()],
        queue_capacity: 4,
        workers: 4,
        ..Config::default()
    };
    let report = hash::run(&config).unwrap();

    assert_eq!(report.files_processed(), 50);
    assert!(report.valid);
    let mut files: Vec<&str> = report.results.iter().map(|s| s.file.as_str()).collect();
    let before = files.clone();
    files.sort();
    files.dedup();
    assert_eq!(files, before);
}

#[test]
fn test_run_single_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.txt");
    fs::write(&path, b"hello").unwrap();

    let config = Config {
        paths: vec![path],
        ..Config::default()
    };
    let report = hash::run(&config).unwrap();

    assert_eq!(report.files_processed(), 1);
    assert_eq!(report.results[0].sha256.as_deref(), Some(HELLO_SHA256));
    assert_eq!(report.total_bytes(), 5);
}

#[test]
fn test_run_missing_path_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ok.txt"), b"ok").unwrap();

    let config = Config {
        paths: vec![dir.path().to_path_buf(), dir.path().join("missing")],
        ..Config::default()
    };
    assert!(matches!(hash::run(&config), Err(HashitError::FileNotFound { .. })));
}

#[test]
fn test_run_empty_directory() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        paths: vec![dir.path().to_path_buf()],
        ..Config::default()
    };
    let report = hash::run(&config).unwrap();
    assert!(report.results.is_empty());
    assert!(report.valid);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_marks_report_invalid() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let locked = dir.path().join("locked.txt");
    fs::write(dir.path().join("open.txt"), b"open").unwrap();
    fs::write(&locked, b"secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores file modes
    if fs::File::open(&locked).is_ok() {
        return;
    }

    let config = Config {
        paths: vec![dir.path().to_path_buf()],
        ..Config::default()
    };
    let report = hash::run(&config).unwrap();

    assert_eq!(report.files_processed(), 2);
    assert_eq!(report.files_failed(), 1);
    assert!(!report.valid);
    let failed = report.results.iter().find(|s| s.is_failed()).unwrap();
    assert!(failed.file.ends_with("locked.txt"));
    assert_eq!(failed.digests().count(), 0);
}

#[test]
fn test_standard_input_mode() {
    let config = Config {
        standard_input: true,
        ..Config::default()
    };
    let report = hash::run_with_input(&config, &b"hello"[..]).unwrap();

    assert_eq!(report.files_processed(), 1);
    assert_eq!(report.results[0].file, "");
    assert_eq!(report.results[0].sha256.as_deref(), Some(HELLO_SHA256));
    assert!(report.valid);
}

#[test]
fn test_scan_engine_reader_with_reference() {
    let config = Config::default();
    let index = hash::ReferenceIndex::load().unwrap();
    let report = ScanEngine::new(&config)
        .with_reference(Arc::new(index))
        .run_reader(&b""[..])
        .unwrap();
    assert_eq!(report.results[0].known.as_deref(), Some("empty-file"));
}
