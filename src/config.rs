//! Run configuration.
//!
//! A [`Config`] is built once at startup (usually by [`crate::cli::Cli::into_config`])
//! and passed by reference to every stage of the pipeline. Nothing reads
//! ambient global state.

use std::path::PathBuf;

use crate::hash::hash::{AlgorithmSelection, DEFAULT_CHUNK_SIZE, DEFAULT_STREAM_THRESHOLD};
use crate::output::{DigestEncoding, OutputFormat};

/// Default capacity of the task and result queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Files or directories to process.
    pub paths: Vec<PathBuf>,
    /// Walk directories recursively.
    pub recursive: bool,
    pub algorithms: AlgorithmSelection,
    /// Files at or above this many bytes are streamed instead of read whole.
    pub stream_threshold: u64,
    pub chunk_size: usize,
    /// Capacity of both bounded queues.
    pub queue_capacity: usize,
    /// Number of digest workers.
    pub workers: usize,
    /// Identify files against the embedded known-hash database.
    pub known_audit: bool,
    /// Manifest to audit the run against.
    pub audit_file: Option<PathBuf>,
    /// Digest standard input instead of walking paths.
    pub standard_input: bool,
    pub format: OutputFormat,
    pub encoding: DigestEncoding,
    /// Write the report here instead of stdout.
    pub output: Option<PathBuf>,
}

impl Config {
    /// Paths to process; the current directory when none were given.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.paths.clone()
        }
    }

    /// A single path argument always recurses: a lone directory means "hash everything under it".
    pub fn effective_recursive(&self) -> bool {
        self.recursive || self.input_paths().len() == 1
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            recursive: false,
            algorithms: AlgorithmSelection::default(),
            stream_threshold: DEFAULT_STREAM_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: num_cpus::get().max(1),
            known_audit: false,
            audit_file: None,
            standard_input: false,
            format: OutputFormat::Text,
            encoding: DigestEncoding::Hex,
            output: None,
        }
    }
}
