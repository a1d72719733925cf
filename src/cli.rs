// Command line interface
// Parsed once in main and turned into an immutable Config

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, DEFAULT_QUEUE_CAPACITY};
use crate::hash::hash::{AlgorithmSelection, DEFAULT_CHUNK_SIZE, DEFAULT_STREAM_THRESHOLD};
use crate::output::{DigestEncoding, OutputFormat};

/// hashit - concurrent multi-algorithm file hasher
#[derive(Parser, Debug)]
#[command(name = "hashit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to hash (defaults to the current directory)
    pub paths: Vec<PathBuf>,

    /// Hash algorithms to compute, comma separated or repeated ("all" for every one)
    #[arg(short = 'c', long = "hash", value_delimiter = ',', default_value = "md5,sha1,sha256,sha512")]
    pub hashes: Vec<String>,

    /// Audit the results against a previously written manifest
    #[arg(long, value_name = "PATH")]
    pub audit_file: Option<PathBuf>,

    /// Identify files against the built-in known-hash database
    #[arg(short = 'a', long)]
    pub audit: bool,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Digest encoding in the report
    #[arg(long, value_enum, default_value_t = DigestEncoding::Hex)]
    pub encoding: DigestEncoding,

    /// List the supported hash algorithms and exit
    #[arg(long = "hashes")]
    pub list_hashes: bool,

    /// Never read from standard input, even when it is piped
    #[arg(long)]
    pub no_stdin: bool,

    /// Files of at least this many bytes are streamed in chunks
    #[arg(long, default_value_t = DEFAULT_STREAM_THRESHOLD)]
    pub stream_size: u64,

    /// Capacity of the task and result queues
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_size: usize,

    /// Number of digest workers (defaults to the number of CPUs)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Log progress at info level
    #[arg(short, long)]
    pub verbose: bool,

    /// Log at debug level
    #[arg(long)]
    pub debug: bool,

    /// Log at trace level
    #[arg(long)]
    pub trace: bool,
}

impl Cli {
    /// Log level implied by the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    /// Build the run configuration
    ///
    /// `stdin_piped` is whether standard input looks like a pipe or file. It only
    /// selects standard input mode when no paths were given and `--no-stdin` is unset.
    pub fn into_config(self, stdin_piped: bool) -> Config {
        Config {
            standard_input: stdin_piped && !self.no_stdin && self.paths.is_empty(),
            recursive: self.recursive,
            algorithms: AlgorithmSelection::parse(&self.hashes),
            stream_threshold: self.stream_size,
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_capacity: self.queue_size.max(1),
            workers: self.workers.unwrap_or_else(num_cpus::get).max(1),
            known_audit: self.audit,
            audit_file: self.audit_file,
            format: self.format,
            encoding: self.encoding,
            output: self.output,
            paths: self.paths,
        }
    }
}
