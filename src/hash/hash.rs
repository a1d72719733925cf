// Digest computation module
// Algorithm registry, DigestSet record and the single-pass DigestEngine

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512};
use md4::Md4;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use tracing::debug;

use super::error::HashitError;

/// Files at or above this size are streamed in chunks instead of read whole
pub const DEFAULT_STREAM_THRESHOLD: u64 = 1_000_000;

/// Chunk size used for streaming reads (1MB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

// BLAKE3 only benefits from rayon on larger inputs
const BLAKE3_RAYON_THRESHOLD: usize = 128 * 1024;

/// Trait for hash algorithm implementations
pub trait Hasher: Send {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the raw digest bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

// Every RustCrypto hasher shares the digest 0.10 `Digest` trait
struct DigestWrapper<D>(D);

impl<D: Digest + Send> Hasher for DigestWrapper<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

// BLAKE3 wrapper
//
// Large buffers go through update_rayon so a single big file can still use
// every core when the worker pool is otherwise idle.
struct Blake3Wrapper(blake3::Hasher);

impl Hasher for Blake3Wrapper {
    fn update(&mut self, data: &[u8]) {
        if data.len() >= BLAKE3_RAYON_THRESHOLD {
            self.0.update_rayon(data);
        } else {
            self.0.update(data);
        }
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}

type Blake2b256 = Blake2b<U32>;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "md4")]
    Md4,
    #[serde(rename = "md5")]
    Md5,
    #[serde(rename = "sha1")]
    Sha1,
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "sha512")]
    Sha512,
    #[serde(rename = "blake2b256")]
    Blake2b256,
    #[serde(rename = "blake2b512")]
    Blake2b512,
    #[serde(rename = "blake3")]
    Blake3,
    #[serde(rename = "sha3224")]
    Sha3_224,
    #[serde(rename = "sha3256")]
    Sha3_256,
    #[serde(rename = "sha3384")]
    Sha3_384,
    #[serde(rename = "sha3512")]
    Sha3_512,
}

/// Information about a hash algorithm
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmInfo {
    pub name: String,
    pub output_bits: usize,
    /// Known practical collision attacks exist
    pub legacy: bool,
}

impl Algorithm {
    /// Every supported algorithm, in report order
    pub const ALL: [Algorithm; 12] = [
        Algorithm::Md4,
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
        Algorithm::Blake2b256,
        Algorithm::Blake2b512,
        Algorithm::Blake3,
        Algorithm::Sha3_224,
        Algorithm::Sha3_256,
        Algorithm::Sha3_384,
        Algorithm::Sha3_512,
    ];

    /// Canonical lowercase name, as accepted on the command line and used as a JSON key
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md4 => "md4",
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
            Algorithm::Blake2b256 => "blake2b256",
            Algorithm::Blake2b512 => "blake2b512",
            Algorithm::Blake3 => "blake3",
            Algorithm::Sha3_224 => "sha3224",
            Algorithm::Sha3_256 => "sha3256",
            Algorithm::Sha3_384 => "sha3384",
            Algorithm::Sha3_512 => "sha3512",
        }
    }

    /// Label used in text reports
    pub fn label(self) -> &'static str {
        match self {
            Algorithm::Md4 => "MD4",
            Algorithm::Md5 => "MD5",
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
            Algorithm::Blake2b256 => "BLAKE2B-256",
            Algorithm::Blake2b512 => "BLAKE2B-512",
            Algorithm::Blake3 => "BLAKE3",
            Algorithm::Sha3_224 => "SHA3-224",
            Algorithm::Sha3_256 => "SHA3-256",
            Algorithm::Sha3_384 => "SHA3-384",
            Algorithm::Sha3_512 => "SHA3-512",
        }
    }

    /// Look up an algorithm by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Algorithm> {
        let lower = name.trim().to_lowercase();

        match lower.as_str() {
            "md4" => Some(Algorithm::Md4),
            "md5" => Some(Algorithm::Md5),
            "sha1" | "sha-1" => Some(Algorithm::Sha1),
            "sha256" | "sha-256" => Some(Algorithm::Sha256),
            "sha512" | "sha-512" => Some(Algorithm::Sha512),
            "blake2b256" | "blake2b-256" => Some(Algorithm::Blake2b256),
            "blake2b512" | "blake2b-512" | "blake2b" => Some(Algorithm::Blake2b512),
            "blake3" => Some(Algorithm::Blake3),
            "sha3224" | "sha3-224" => Some(Algorithm::Sha3_224),
            "sha3256" | "sha3-256" => Some(Algorithm::Sha3_256),
            "sha3384" | "sha3-384" => Some(Algorithm::Sha3_384),
            "sha3512" | "sha3-512" => Some(Algorithm::Sha3_512),
            _ => None,
        }
    }

    /// Digest size in bits
    pub fn output_bits(self) -> usize {
        match self {
            Algorithm::Md4 | Algorithm::Md5 => 128,
            Algorithm::Sha1 => 160,
            Algorithm::Sha3_224 => 224,
            Algorithm::Sha256 | Algorithm::Blake2b256 | Algorithm::Blake3 | Algorithm::Sha3_256 => 256,
            Algorithm::Sha3_384 => 384,
            Algorithm::Sha512 | Algorithm::Blake2b512 | Algorithm::Sha3_512 => 512,
        }
    }

    /// Create a fresh incremental hasher
    pub fn hasher(self) -> Box<dyn Hasher> {
        match self {
            Algorithm::Md4 => Box::new(DigestWrapper(Md4::new())),
            Algorithm::Md5 => Box::new(DigestWrapper(Md5::new())),
            Algorithm::Sha1 => Box::new(DigestWrapper(Sha1::new())),
            Algorithm::Sha256 => Box::new(DigestWrapper(Sha256::new())),
            Algorithm::Sha512 => Box::new(DigestWrapper(Sha512::new())),
            Algorithm::Blake2b256 => Box::new(DigestWrapper(Blake2b256::new())),
            Algorithm::Blake2b512 => Box::new(DigestWrapper(Blake2b512::new())),
            Algorithm::Blake3 => Box::new(Blake3Wrapper(blake3::Hasher::new())),
            Algorithm::Sha3_224 => Box::new(DigestWrapper(Sha3_224::new())),
            Algorithm::Sha3_256 => Box::new(DigestWrapper(Sha3_256::new())),
            Algorithm::Sha3_384 => Box::new(DigestWrapper(Sha3_384::new())),
            Algorithm::Sha3_512 => Box::new(DigestWrapper(Sha3_512::new())),
        }
    }

    /// Infer an algorithm from the length of a hex digest
    /// Ambiguous lengths resolve to the algorithm hash lists most commonly carry
    pub fn infer_from_hex(digest: &str) -> Option<Algorithm> {
        match digest.len() {
            32 => Some(Algorithm::Md5),
            40 => Some(Algorithm::Sha1),
            56 => Some(Algorithm::Sha3_224),
            64 => Some(Algorithm::Sha256),
            96 => Some(Algorithm::Sha3_384),
            128 => Some(Algorithm::Sha512),
            _ => None,
        }
    }

    /// List all available hash algorithms
    pub fn list_algorithms() -> Vec<AlgorithmInfo> {
        Algorithm::ALL
            .iter()
            .map(|alg| AlgorithmInfo {
                name: alg.name().to_string(),
                output_bits: alg.output_bits(),
                legacy: matches!(alg, Algorithm::Md4 | Algorithm::Md5 | Algorithm::Sha1),
            })
            .collect()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of algorithms requested for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmSelection {
    algorithms: BTreeSet<Algorithm>,
}

impl AlgorithmSelection {
    /// Build a selection from user supplied names
    ///
    /// Names are lowercased and may be comma separated. `all` selects every
    /// algorithm. Unrecognised names are ignored.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Self {
        let mut algorithms = BTreeSet::new();

        for name in names.iter().flat_map(|n| n.as_ref().split(',')) {
            let lower = name.trim().to_lowercase();
            if lower.is_empty() {
                continue;
            }
            if lower == "all" {
                return Self::all();
            }
            match Algorithm::from_name(&lower) {
                Some(alg) => {
                    algorithms.insert(alg);
                }
                None => debug!(name = %lower, "ignoring unknown hash algorithm"),
            }
        }

        Self { algorithms }
    }

    /// Select every supported algorithm
    pub fn all() -> Self {
        Self {
            algorithms: Algorithm::ALL.iter().copied().collect(),
        }
    }

    pub fn contains(&self, algorithm: Algorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }

    pub fn iter(&self) -> impl Iterator<Item = Algorithm> + '_ {
        self.algorithms.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

impl Default for AlgorithmSelection {
    fn default() -> Self {
        Self::parse(&["md5", "sha1", "sha256", "sha512"])
    }
}

impl FromIterator<Algorithm> for AlgorithmSelection {
    fn from_iter<I: IntoIterator<Item = Algorithm>>(iter: I) -> Self {
        Self {
            algorithms: iter.into_iter().collect(),
        }
    }
}

/// Digests computed for one file (or one entry of a reference dataset / manifest)
///
/// Only requested algorithms are populated. Values are lowercase hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSet {
    #[serde(default, alias = "File")]
    pub file: String,
    #[serde(default, alias = "Bytes")]
    pub bytes: u64,
    #[serde(default, alias = "MD4", skip_serializing_if = "Option::is_none")]
    pub md4: Option<String>,
    #[serde(default, alias = "MD5", skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, alias = "SHA1", skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, alias = "SHA256", skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, alias = "SHA512", skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(rename = "blake2b256", default, alias = "Blake2b256", skip_serializing_if = "Option::is_none")]
    pub blake2b_256: Option<String>,
    #[serde(rename = "blake2b512", default, alias = "Blake2b512", skip_serializing_if = "Option::is_none")]
    pub blake2b_512: Option<String>,
    #[serde(default, alias = "Blake3", skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
    #[serde(rename = "sha3224", default, alias = "Sha3224", skip_serializing_if = "Option::is_none")]
    pub sha3_224: Option<String>,
    #[serde(rename = "sha3256", default, alias = "Sha3256", skip_serializing_if = "Option::is_none")]
    pub sha3_256: Option<String>,
    #[serde(rename = "sha3384", default, alias = "Sha3384", skip_serializing_if = "Option::is_none")]
    pub sha3_384: Option<String>,
    #[serde(rename = "sha3512", default, alias = "Sha3512", skip_serializing_if = "Option::is_none")]
    pub sha3_512: Option<String>,
    /// Canonical name from the known-hash database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known: Option<String>,
    /// Set when the file could not be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DigestSet {
    pub fn new(file: impl Into<String>, bytes: u64) -> Self {
        Self {
            file: file.into(),
            bytes,
            ..Default::default()
        }
    }

    /// Record for a file that could not be digested
    pub fn failed(file: impl Into<String>, error: &HashitError) -> Self {
        Self {
            file: file.into(),
            error: Some(error.summary()),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&str> {
        match algorithm {
            Algorithm::Md4 => self.md4.as_deref(),
            Algorithm::Md5 => self.md5.as_deref(),
            Algorithm::Sha1 => self.sha1.as_deref(),
            Algorithm::Sha256 => self.sha256.as_deref(),
            Algorithm::Sha512 => self.sha512.as_deref(),
            Algorithm::Blake2b256 => self.blake2b_256.as_deref(),
            Algorithm::Blake2b512 => self.blake2b_512.as_deref(),
            Algorithm::Blake3 => self.blake3.as_deref(),
            Algorithm::Sha3_224 => self.sha3_224.as_deref(),
            Algorithm::Sha3_256 => self.sha3_256.as_deref(),
            Algorithm::Sha3_384 => self.sha3_384.as_deref(),
            Algorithm::Sha3_512 => self.sha3_512.as_deref(),
        }
    }

    pub fn set(&mut self, algorithm: Algorithm, value: impl Into<String>) {
        let slot = match algorithm {
            Algorithm::Md4 => &mut self.md4,
            Algorithm::Md5 => &mut self.md5,
            Algorithm::Sha1 => &mut self.sha1,
            Algorithm::Sha256 => &mut self.sha256,
            Algorithm::Sha512 => &mut self.sha512,
            Algorithm::Blake2b256 => &mut self.blake2b_256,
            Algorithm::Blake2b512 => &mut self.blake2b_512,
            Algorithm::Blake3 => &mut self.blake3,
            Algorithm::Sha3_224 => &mut self.sha3_224,
            Algorithm::Sha3_256 => &mut self.sha3_256,
            Algorithm::Sha3_384 => &mut self.sha3_384,
            Algorithm::Sha3_512 => &mut self.sha3_512,
        };
        *slot = Some(value.into());
    }

    /// Populated digests in report order
    pub fn digests(&self) -> impl Iterator<Item = (Algorithm, &str)> + '_ {
        Algorithm::ALL
            .iter()
            .filter_map(move |&alg| self.get(alg).map(|value| (alg, value)))
    }
}

/// Computes every requested digest of a byte source in a single read pass
///
/// Files smaller than the stream threshold are read into one buffer; larger
/// files are streamed through all hashers in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct DigestEngine {
    stream_threshold: u64,
    chunk_size: usize,
}

impl DigestEngine {
    /// Create a DigestEngine with the default threshold (1,000,000 bytes) and chunk size (1MB)
    pub fn new() -> Self {
        Self {
            stream_threshold: DEFAULT_STREAM_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_stream_threshold(mut self, stream_threshold: u64) -> Self {
        self.stream_threshold = stream_threshold;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn stream_threshold(&self) -> u64 {
        self.stream_threshold
    }

    /// Compute all selected digests for a file
    pub fn compute(
        &self,
        path: &Path,
        selection: &AlgorithmSelection,
    ) -> Result<DigestSet, HashitError> {
        let mut hashers = Self::hashers_for(selection);

        let mut file = File::open(path).map_err(|e| {
            HashitError::from_io_error(e, "reading", Some(path.to_path_buf()))
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| HashitError::from_io_error(e, "reading metadata of", Some(path.to_path_buf())))?
            .len();

        let bytes = if file_size >= self.stream_threshold {
            self.stream_into(&mut hashers, &mut file, Some(path))?
        } else {
            let mut buffer = Vec::with_capacity(file_size as usize);
            file.read_to_end(&mut buffer).map_err(|e| {
                HashitError::from_io_error(e, "reading", Some(path.to_path_buf()))
            })?;
            for (_, hasher) in hashers.iter_mut() {
                hasher.update(&buffer);
            }
            buffer.len() as u64
        };

        Ok(Self::finish(hashers, path.to_string_lossy(), bytes))
    }

    /// Compute all selected digests for an arbitrary reader, such as standard input
    pub fn compute_reader<R: Read>(
        &self,
        mut reader: R,
        label: &str,
        selection: &AlgorithmSelection,
    ) -> Result<DigestSet, HashitError> {
        let mut hashers = Self::hashers_for(selection);
        let bytes = self.stream_into(&mut hashers, &mut reader, None)?;
        Ok(Self::finish(hashers, label, bytes))
    }

    /// Compute all selected digests for an in-memory buffer
    pub fn compute_bytes(&self, data: &[u8], label: &str, selection: &AlgorithmSelection) -> DigestSet {
        let mut hashers = Self::hashers_for(selection);
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(data);
        }
        Self::finish(hashers, label, data.len() as u64)
    }

    fn hashers_for(selection: &AlgorithmSelection) -> Vec<(Algorithm, Box<dyn Hasher>)> {
        selection.iter().map(|alg| (alg, alg.hasher())).collect()
    }

    // Feed every hasher from the same chunk so the source is only read once
    fn stream_into<R: Read>(
        &self,
        hashers: &mut [(Algorithm, Box<dyn Hasher>)],
        reader: &mut R,
        path: Option<&Path>,
    ) -> Result<u64, HashitError> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total = 0u64;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(match path {
                        Some(p) => HashitError::from_io_error(e, "reading", Some(p.to_path_buf())),
                        None => HashitError::from_io_error(e, "reading from stdin", None),
                    })
                }
            };

            for (_, hasher) in hashers.iter_mut() {
                hasher.update(&buffer[..bytes_read]);
            }
            total += bytes_read as u64;
        }

        Ok(total)
    }

    fn finish(
        hashers: Vec<(Algorithm, Box<dyn Hasher>)>,
        file: impl Into<String>,
        bytes: u64,
    ) -> DigestSet {
        let mut set = DigestSet::new(file, bytes);
        for (alg, hasher) in hashers {
            set.set(alg, hex::encode(hasher.finalize()));
        }
        set
    }
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Tests live in tests/hash/hash_tests.rs
