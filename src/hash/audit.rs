// Audit manifest module
// Parses previously recorded manifests (JSON or hash list) and diffs them against a run

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{debug, warn};
use xz2::read::XzDecoder;

use super::error::HashitError;
use super::hash::{Algorithm, DigestSet};
use super::path_utils;

/// One file recorded in an audit manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub path: String,
    pub digests: DigestSet,
}

/// Manifest dialect, detected from content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestDialect {
    /// JSON array of DigestSet objects
    Json,
    /// Flat hashdeep style list: `size,md5,sha256,filename`
    HashList,
}

impl ManifestDialect {
    /// Sniff the dialect: `[{` (or an empty `[]`) at the first non-whitespace characters means JSON
    pub fn detect(content: &str) -> Self {
        let mut chars = content.trim_start().chars();
        if chars.next() == Some('[') {
            let next = chars.find(|c| !c.is_whitespace());
            if matches!(next, Some('{') | Some(']')) {
                return ManifestDialect::Json;
            }
        }
        ManifestDialect::HashList
    }

    pub fn parser(self) -> Box<dyn ManifestParser> {
        match self {
            ManifestDialect::Json => Box::new(JsonManifest),
            ManifestDialect::HashList => Box::new(HashListManifest),
        }
    }
}

/// Turns manifest content into canonical audit records
pub trait ManifestParser {
    fn parse(&self, content: &str, source: &Path) -> Result<Vec<AuditRecord>, HashitError>;
}

/// JSON array dialect, as written by `--format json`
pub struct JsonManifest;

impl ManifestParser for JsonManifest {
    fn parse(&self, content: &str, source: &Path) -> Result<Vec<AuditRecord>, HashitError> {
        let sets: Vec<DigestSet> = serde_json::from_str(content).map_err(|e| {
            HashitError::AuditParseError {
                path: source.to_path_buf(),
                line: e.line(),
                reason: e.to_string(),
            }
        })?;

        sets.into_iter()
            .enumerate()
            .map(|(index, digests)| {
                if digests.file.trim().is_empty() {
                    return Err(HashitError::AuditParseError {
                        path: source.to_path_buf(),
                        line: 0,
                        reason: format!("record {} has no file", index + 1),
                    });
                }
                Ok(AuditRecord {
                    path: digests.file.clone(),
                    digests,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Size,
    Digest(Algorithm),
    Ignored,
    Filename,
}

/// Flat hash list dialect
///
/// Grammar:
/// - blank lines and lines starting with `#` are skipped
/// - `%%%% HASHDEEP-1.0` is a banner, `%%%% size,md5,sha256,filename` names the columns
/// - fields are separated by `|` or `,`, whichever appears first in the line
/// - with a column header the filename is everything after the last named column
/// - without one, a leading numeric field is the size, the last field is the
///   filename and the digest algorithms are inferred from their length
pub struct HashListManifest;

impl HashListManifest {
    fn parse_header(header: &str) -> Option<(char, Vec<Column>)> {
        let delimiter = if header.contains('|') { '|' } else { ',' };
        let columns: Vec<Column> = header
            .split(delimiter)
            .map(|name| match name.trim().to_lowercase().as_str() {
                "size" => Column::Size,
                "filename" | "file" | "path" => Column::Filename,
                other => Algorithm::from_name(other)
                    .map(Column::Digest)
                    .unwrap_or(Column::Ignored),
            })
            .collect();

        // The filename must be the final column so it can contain delimiters
        let filename_columns = columns.iter().filter(|c| **c == Column::Filename).count();
        if filename_columns != 1 || columns.last() != Some(&Column::Filename) {
            return None;
        }

        Some((delimiter, columns))
    }

    fn parse_with_header(line: &str, delimiter: char, columns: &[Column]) -> Option<AuditRecord> {
        let fields: Vec<&str> = line.splitn(columns.len(), delimiter).collect();
        if fields.len() != columns.len() {
            return None;
        }

        let mut digests = DigestSet::default();
        for (column, field) in columns.iter().zip(fields) {
            match column {
                Column::Size => digests.bytes = field.trim().parse().ok()?,
                Column::Digest(alg) => {
                    let value = field.trim();
                    if !value.is_empty() {
                        digests.set(*alg, value);
                    }
                }
                Column::Ignored => {}
                Column::Filename => digests.file = field.trim().to_string(),
            }
        }

        if digests.file.is_empty() {
            return None;
        }

        Some(AuditRecord {
            path: digests.file.clone(),
            digests,
        })
    }

    fn parse_inferred(line: &str) -> Option<AuditRecord> {
        // The first delimiter seen decides, so the filename may contain the other one
        let delimiter = line
            .find(['|', ','])
            .and_then(|i| line[i..].chars().next())
            .unwrap_or(',');
        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        let (path, rest) = fields.split_last()?;
        if path.is_empty() || rest.is_empty() {
            return None;
        }

        let mut digests = DigestSet::new(*path, 0);
        let mut hashes = rest;
        if let Some((first, tail)) = rest.split_first() {
            if first.len() < 20 && !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
                digests.bytes = first.parse().ok()?;
                hashes = tail;
            }
        }

        if hashes.is_empty() {
            return None;
        }

        for hash in hashes {
            if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            digests.set(Algorithm::infer_from_hex(hash)?, hash.to_lowercase());
        }

        Some(AuditRecord {
            path: path.to_string(),
            digests,
        })
    }
}

impl ManifestParser for HashListManifest {
    fn parse(&self, content: &str, source: &Path) -> Result<Vec<AuditRecord>, HashitError> {
        let mut header: Option<(char, Vec<Column>)> = None;
        let mut records = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("%%%%") {
                let rest = rest.trim();
                if rest.contains(',') || rest.contains('|') {
                    header = Some(Self::parse_header(rest).ok_or_else(|| {
                        HashitError::AuditParseError {
                            path: source.to_path_buf(),
                            line: line_number,
                            reason: format!("invalid column header: {}", rest),
                        }
                    })?);
                }
                continue;
            }

            let record = match &header {
                Some((delimiter, columns)) => Self::parse_with_header(trimmed, *delimiter, columns),
                None => Self::parse_inferred(trimmed),
            };

            match record {
                Some(record) => records.push(record),
                None => {
                    return Err(HashitError::AuditParseError {
                        path: source.to_path_buf(),
                        line: line_number,
                        reason: format!("malformed line: {}", trimmed),
                    })
                }
            }
        }

        Ok(records)
    }
}

/// A parsed audit manifest
#[derive(Debug, Clone)]
pub struct AuditManifest {
    pub source: PathBuf,
    pub dialect: ManifestDialect,
    pub records: Vec<AuditRecord>,
}

impl AuditManifest {
    /// Read and parse a manifest file, decompressing `.xz` files on the fly
    pub fn load(path: &Path) -> Result<Self, HashitError> {
        let unreadable = |source: std::io::Error| HashitError::AuditFileUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let mut content = String::new();
        let read = if Self::is_compressed(path) {
            BufReader::new(XzDecoder::new(file)).read_to_string(&mut content)
        } else {
            BufReader::new(file).read_to_string(&mut content)
        };
        read.map_err(unreadable)?;

        Self::parse(&content, path)
    }

    /// Parse manifest content, sniffing the dialect
    pub fn parse(content: &str, source: &Path) -> Result<Self, HashitError> {
        let dialect = ManifestDialect::detect(content);
        let records = dialect.parser().parse(content, source)?;
        debug!(path = %source.display(), ?dialect, records = records.len(), "loaded audit manifest");

        Ok(Self {
            source: source.to_path_buf(),
            dialect,
            records,
        })
    }

    fn is_compressed(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xz"))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Diff this manifest against freshly computed results
    pub fn diff(&self, computed: &[DigestSet]) -> DiffReport {
        diff(computed, &self.records)
    }
}

/// Outcome for a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Every digest present in both records agrees
    Match,
    /// At least one shared digest disagrees, or the file could not be read
    Changed,
    /// In the manifest but not in the current file set
    Missing,
    /// In the current file set but not in the manifest
    New,
}

/// A digest that no longer matches the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub algorithm: Algorithm,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub path: String,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
}

/// Result of comparing a run against a manifest
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub entries: Vec<AuditEntry>,
}

impl DiffReport {
    pub fn count(&self, status: AuditStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn with_status(&self, status: AuditStatus) -> impl Iterator<Item = &AuditEntry> + '_ {
        self.entries.iter().filter(move |e| e.status == status)
    }

    pub fn status_of(&self, path: &str) -> Option<AuditStatus> {
        let key = path_utils::audit_key(path);
        self.entries
            .iter()
            .find(|e| path_utils::audit_key(&e.path) == key)
            .map(|e| e.status)
    }

    /// False when any record changed or went missing
    pub fn is_valid(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| matches!(e.status, AuditStatus::Changed | AuditStatus::Missing))
    }
}

/// Compare computed DigestSets with manifest records, independent of manifest dialect
pub fn diff(computed: &[DigestSet], records: &[AuditRecord]) -> DiffReport {
    let current: HashMap<String, &DigestSet> = computed
        .iter()
        .map(|set| (path_utils::audit_key(&set.file), set))
        .collect();
    let recorded: HashSet<String> = records
        .iter()
        .map(|record| path_utils::audit_key(&record.path))
        .collect();

    let mut entries = Vec::with_capacity(records.len());

    for record in records {
        let key = path_utils::audit_key(&record.path);
        let entry = match current.get(&key) {
            Some(actual) => {
                let shared = record
                    .digests
                    .digests()
                    .filter(|(alg, _)| actual.get(*alg).is_some())
                    .count();
                if shared == 0 && !actual.is_failed() {
                    warn!(path = %record.path, "no digest algorithm in common with the audit record, nothing compared");
                }
                let mismatches = compare_digests(&record.digests, actual);
                let status = if actual.is_failed() || !mismatches.is_empty() {
                    AuditStatus::Changed
                } else {
                    AuditStatus::Match
                };
                AuditEntry {
                    path: record.path.clone(),
                    status,
                    mismatches,
                }
            }
            None => AuditEntry {
                path: record.path.clone(),
                status: AuditStatus::Missing,
                mismatches: Vec::new(),
            },
        };
        entries.push(entry);
    }

    for set in computed {
        if !recorded.contains(&path_utils::audit_key(&set.file)) {
            entries.push(AuditEntry {
                path: set.file.clone(),
                status: AuditStatus::New,
                mismatches: Vec::new(),
            });
        }
    }

    // Sort for consistent output
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    DiffReport { entries }
}

fn compare_digests(expected: &DigestSet, actual: &DigestSet) -> Vec<Mismatch> {
    expected
        .digests()
        .filter_map(|(alg, want)| {
            let got = actual.get(alg)?;
            if digests_agree(want, got) {
                None
            } else {
                Some(Mismatch {
                    algorithm: alg,
                    expected: want.to_string(),
                    actual: got.to_string(),
                })
            }
        })
        .collect()
}

/// Compare two digest strings that may each be hex or base64 encoded
pub fn digests_agree(a: &str, b: &str) -> bool {
    match (decode_digest(a), decode_digest(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

fn decode_digest(value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    hex::decode(value)
        .ok()
        .or_else(|| STANDARD.decode(value).ok())
}
