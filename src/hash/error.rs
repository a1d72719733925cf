// Centralized error handling module
// Fatal errors abort a run; per-file read failures are attached to DigestSets instead

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for hashit
/// Provides context-rich error messages with file paths and operations
#[derive(Debug)]
pub enum HashitError {
    /// File system errors with context
    FileNotFound { path: PathBuf },
    PermissionDenied { path: PathBuf, operation: String },
    IoError { path: Option<PathBuf>, operation: String, source: io::Error },

    /// Audit manifest errors
    AuditFileUnreadable { path: PathBuf, source: io::Error },
    AuditParseError { path: PathBuf, line: usize, reason: String },

    /// The reference dataset compiled into the binary could not be decoded
    ReferenceDataCorrupt { reason: String },

    /// Output errors
    OutputError { reason: String },
}

impl fmt::Display for HashitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HashitError::FileNotFound { path } => {
                write!(f, "File or directory not found: {}\n", path.display())?;
                write!(f, "Suggestion: Check that the path is correct and exists")
            }
            HashitError::PermissionDenied { path, operation } => {
                write!(f, "Permission denied while {} {}\n", operation, path.display())?;
                write!(f, "Suggestion: Check file permissions or run with appropriate privileges")
            }
            HashitError::IoError { path, operation, source } => {
                if let Some(p) = path {
                    write!(f, "I/O error while {} {}: {}\n", operation, p.display(), source)?;
                } else {
                    write!(f, "I/O error while {}: {}\n", operation, source)?;
                }
                write!(f, "Suggestion: Check file permissions and disk space")
            }

            HashitError::AuditFileUnreadable { path, source } => {
                write!(f, "Unable to load audit file {}: {}\n", path.display(), source)?;
                write!(f, "Suggestion: Check that the audit file exists and is readable")
            }
            HashitError::AuditParseError { path, line, reason } => {
                write!(f, "Error parsing audit file {} at line {}: {}\n", path.display(), line, reason)?;
                write!(f, "Suggestion: Audit files must be a JSON array or a hashdeep style hash list")
            }

            HashitError::ReferenceDataCorrupt { reason } => {
                write!(f, "Embedded known-hash database is invalid: {}\n", reason)?;
                write!(f, "Suggestion: The binary is damaged, rebuild or reinstall hashit")
            }

            HashitError::OutputError { reason } => {
                write!(f, "Failed to render output: {}", reason)
            }
        }
    }
}

impl std::error::Error for HashitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HashitError::IoError { source, .. } => Some(source),
            HashitError::AuditFileUnreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl HashitError {
    /// Create an error with context about the operation and optional path
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        match (err.kind(), path) {
            (io::ErrorKind::NotFound, Some(p)) => HashitError::FileNotFound { path: p },
            (io::ErrorKind::PermissionDenied, Some(p)) => HashitError::PermissionDenied {
                path: p,
                operation: operation.to_string(),
            },
            (_, path) => HashitError::IoError {
                path,
                operation: operation.to_string(),
                source: err,
            },
        }
    }

    /// Short single-line description, used when the error is attached to a DigestSet
    pub fn summary(&self) -> String {
        self.to_string()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }
}
