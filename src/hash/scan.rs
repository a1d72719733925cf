// Directory scanning module
// Discovery producer and the digest worker pool, connected by bounded channels

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use jwalk::WalkDir;
use tracing::{debug, error, info, warn};

use super::audit::AuditManifest;
use super::error::HashitError;
use super::hash::{AlgorithmSelection, DigestEngine, DigestSet};
use super::path_utils;
use super::reference::ReferenceIndex;
use super::summary::{Aggregator, Report};
use crate::config::Config;

/// A file queued for digesting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub path: PathBuf,
}

/// Walk the requested paths, sending one FileTask per file into the task queue
///
/// Named files are queued regardless of `recursive`; directories are only
/// walked when it is set. A path that cannot be statted is fatal. Returns the
/// number of tasks sent. Dropping `tasks` afterwards closes the queue.
pub fn discover(
    paths: &[PathBuf],
    recursive: bool,
    tasks: &Sender<FileTask>,
    cancel: &AtomicBool,
) -> Result<usize, HashitError> {
    let mut sent = 0;

    for raw in paths {
        let path = path_utils::clean_path(raw);
        let metadata = fs::metadata(&path).map_err(|e| {
            HashitError::from_io_error(e, "opening", Some(path.clone()))
        })?;

        if metadata.is_dir() {
            if recursive {
                sent += walk_directory(&path, tasks, cancel);
            } else {
                debug!(path = %path.display(), "skipping directory, recursion disabled");
            }
        } else {
            // Receiver gone means the run was cancelled
            if tasks.send(FileTask { path }).is_err() {
                break;
            }
            sent += 1;
        }

        if cancel.load(Ordering::Relaxed) {
            break;
        }
    }

    Ok(sent)
}

/// Send every regular file under `root` to the task queue
/// Blocks when the queue is full, which keeps discovery from outrunning the workers
fn walk_directory(root: &Path, tasks: &Sender<FileTask>, cancel: &AtomicBool) -> usize {
    let mut sent = 0;

    for entry_result in WalkDir::new(root)
        .parallelism(jwalk::Parallelism::RayonNewPool(0))
        .skip_hidden(false)
        .follow_links(false)
    {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        match entry_result {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = path_utils::clean_path(&entry.path());
                if tasks.send(FileTask { path }).is_err() {
                    break;
                }
                sent += 1;
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "error walking directory");
            }
        }
    }

    sent
}

/// Fixed set of workers draining the task queue into the result queue
///
/// The engine, selection and reference index are immutable and shared by `Arc`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    engine: Arc<DigestEngine>,
    selection: Arc<AlgorithmSelection>,
    reference: Option<Arc<ReferenceIndex>>,
}

impl WorkerPool {
    pub fn new(workers: usize, engine: DigestEngine, selection: AlgorithmSelection) -> Self {
        Self {
            workers: workers.max(1),
            engine: Arc::new(engine),
            selection: Arc::new(selection),
            reference: None,
        }
    }

    /// Annotate results with names from the known-hash database
    pub fn with_reference(mut self, reference: Arc<ReferenceIndex>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start the workers
    ///
    /// Each worker owns a clone of `results`; the queue closes once the last
    /// worker exits, which is what lets the aggregator finish.
    pub fn spawn(
        &self,
        tasks: Receiver<FileTask>,
        results: Sender<DigestSet>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<JoinHandle<()>>, HashitError> {
        let mut handles = Vec::with_capacity(self.workers);

        for id in 0..self.workers {
            let worker = self.clone();
            let tasks = tasks.clone();
            let results = results.clone();
            let cancel = Arc::clone(&cancel);

            let handle = thread::Builder::new()
                .name(format!("hashit-worker-{}", id))
                .spawn(move || {
                    for task in tasks.iter() {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        if results.send(worker.process(&task)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| HashitError::from_io_error(e, "spawning worker thread", None))?;

            handles.push(handle);
        }

        Ok(handles)
    }

    /// Digest one file; read failures become a failed DigestSet rather than an error
    pub fn process(&self, task: &FileTask) -> DigestSet {
        let set = match self.engine.compute(&task.path, &self.selection) {
            Ok(set) => set,
            Err(e) => {
                warn!(path = %task.path.display(), error = %e.summary(), "failed to hash file");
                DigestSet::failed(task.path.to_string_lossy(), &e)
            }
        };
        self.annotate(set)
    }

    fn annotate(&self, mut set: DigestSet) -> DigestSet {
        if let Some(index) = &self.reference {
            if !set.is_failed() {
                set.known = index.identify(&set).map(str::to_string);
            }
        }
        set
    }
}

/// Runs the discovery → workers → aggregator pipeline for one Config
pub struct ScanEngine<'a> {
    config: &'a Config,
    reference: Option<Arc<ReferenceIndex>>,
}

impl<'a> ScanEngine<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Arc<ReferenceIndex>) -> Self {
        self.reference = Some(reference);
        self
    }

    fn pool(&self) -> WorkerPool {
        let engine = DigestEngine::new()
            .with_stream_threshold(self.config.stream_threshold)
            .with_chunk_size(self.config.chunk_size);
        let pool = WorkerPool::new(self.config.workers, engine, self.config.algorithms.clone());
        match &self.reference {
            Some(reference) => pool.with_reference(Arc::clone(reference)),
            None => pool,
        }
    }

    /// Digest the configured paths
    pub fn run(&self) -> Result<Report, HashitError> {
        let start = Instant::now();
        let capacity = self.config.queue_capacity.max(1);
        let (task_tx, task_rx) = bounded::<FileTask>(capacity);
        let (result_tx, result_rx) = bounded::<DigestSet>(capacity);
        let cancel = Arc::new(AtomicBool::new(false));

        let paths = self.config.input_paths();
        let recursive = self.config.effective_recursive();
        let discovery_cancel = Arc::clone(&cancel);

        let discovery = thread::Builder::new()
            .name("hashit-discovery".to_string())
            .spawn(move || {
                let result = discover(&paths, recursive, &task_tx, &discovery_cancel);
                if result.is_err() {
                    discovery_cancel.store(true, Ordering::SeqCst);
                }
                result
            })
            .map_err(|e| HashitError::from_io_error(e, "spawning discovery thread", None))?;

        let pool = self.pool();
        let workers = pool.spawn(task_rx, result_tx, Arc::clone(&cancel))?;

        let mut report = Aggregator::new().summarize(result_rx);

        for handle in workers {
            if handle.join().is_err() {
                error!("digest worker panicked");
                report.valid = false;
            }
        }

        match discovery.join() {
            Ok(Ok(discovered)) => {
                info!(
                    files = discovered,
                    workers = pool.workers(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "scan complete"
                );
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(HashitError::IoError {
                    path: None,
                    operation: "discovering files".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "discovery thread panicked"),
                })
            }
        }

        Ok(report)
    }

    /// Digest a single stream (standard input), bypassing discovery and the worker pool
    pub fn run_reader<R: Read>(&self, reader: R) -> Result<Report, HashitError> {
        let engine = DigestEngine::new().with_chunk_size(self.config.chunk_size);
        let pool = self.pool();

        let set = match engine.compute_reader(reader, "", &self.config.algorithms) {
            Ok(set) => pool.annotate(set),
            Err(e) => {
                warn!(error = %e.summary(), "failed to read standard input");
                DigestSet::failed("", &e)
            }
        };

        let (tx, rx) = bounded(1);
        // Capacity one, so this cannot block
        let _ = tx.send(set);
        drop(tx);

        Ok(Aggregator::new().summarize(rx))
    }
}

/// Execute a full run: load the reference index and manifest, digest, then reconcile
///
/// Fatal errors (bad path, unreadable manifest, corrupt reference data) are returned;
/// per-file failures only lower `Report::valid`.
pub fn run(config: &Config) -> Result<Report, HashitError> {
    if config.standard_input {
        run_with_input(config, std::io::stdin().lock())
    } else {
        execute(config, None::<std::io::Empty>)
    }
}

/// Like [`run`], reading the single input stream from `input` when standard input mode is set
pub fn run_with_input<R: Read>(config: &Config, input: R) -> Result<Report, HashitError> {
    execute(config, Some(input))
}

fn execute<R: Read>(config: &Config, input: Option<R>) -> Result<Report, HashitError> {
    let manifest = match &config.audit_file {
        Some(path) => Some(AuditManifest::load(path)?),
        None => None,
    };

    let mut engine = ScanEngine::new(config);
    if config.known_audit {
        let index = ReferenceIndex::load()?;
        debug!(entries = index.len(), digests = index.digest_count(), "loaded known-hash database");
        engine = engine.with_reference(Arc::new(index));
    }

    let mut report = match input {
        Some(reader) if config.standard_input => engine.run_reader(reader)?,
        _ => engine.run()?,
    };

    if let Some(manifest) = &manifest {
        report.reconcile(manifest);
    }

    Ok(report)
}
