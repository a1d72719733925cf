// Hash Core Library
// Digest computation, known-hash lookup, manifest auditing and the scanning pipeline

pub mod audit;
pub mod error;
pub mod hash;
pub mod path_utils;
pub mod reference;
pub mod scan;
pub mod summary;

// Re-export commonly used types for convenience
pub use audit::{AuditEntry, AuditManifest, AuditRecord, AuditStatus, DiffReport, ManifestDialect, ManifestParser};
pub use error::HashitError;
pub use hash::{Algorithm, AlgorithmInfo, AlgorithmSelection, DigestEngine, DigestSet, Hasher};
pub use reference::ReferenceIndex;
pub use scan::{discover, run, run_with_input, FileTask, ScanEngine, WorkerPool};
pub use summary::{Aggregator, Report};
