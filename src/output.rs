// Report rendering module
// Formats a Report as text, JSON or a hashdeep style list and writes it out

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::ValueEnum;
use serde::Serialize;

use crate::hash::audit::{AuditStatus, DiffReport};
use crate::hash::error::HashitError;
use crate::hash::hash::{AlgorithmSelection, DigestSet};
use crate::hash::summary::Report;

/// Filename written for the standard input row of a hash list
pub const STDIN_FILENAME: &str = "-";

/// Report layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable, one block per file
    #[default]
    Text,
    /// Pretty printed JSON
    Json,
    /// hashdeep compatible list, usable later as an audit file
    Hashdeep,
}

/// How digest bytes are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DigestEncoding {
    #[default]
    Hex,
    Base64,
}

impl DigestEncoding {
    /// Re-encode a lowercase hex digest
    pub fn encode(self, hex_digest: &str) -> String {
        match self {
            DigestEncoding::Hex => hex_digest.to_string(),
            DigestEncoding::Base64 => match hex::decode(hex_digest) {
                Ok(bytes) => STANDARD.encode(bytes),
                Err(_) => hex_digest.to_string(),
            },
        }
    }
}

/// Render a report in the requested format
pub fn render(
    report: &Report,
    format: OutputFormat,
    encoding: DigestEncoding,
    selection: &AlgorithmSelection,
) -> Result<String, HashitError> {
    match format {
        OutputFormat::Text => Ok(to_plain_text(report, encoding)),
        OutputFormat::Json => to_json(report, encoding),
        OutputFormat::Hashdeep => Ok(to_hashdeep(report, encoding, selection)),
    }
}

fn encoded(set: &DigestSet, encoding: DigestEncoding) -> DigestSet {
    let mut out = set.clone();
    for (alg, value) in set.digests() {
        out.set(alg, encoding.encode(value));
    }
    out
}

pub fn to_plain_text(report: &Report, encoding: DigestEncoding) -> String {
    let mut output = String::new();

    for set in &report.results {
        let name = if set.file.is_empty() { "<stdin>" } else { set.file.as_str() };
        output.push_str(&format!("{} ({} bytes)\n", name, set.bytes));

        if let Some(error) = &set.error {
            output.push_str(&format!("   ERROR {}\n", error));
            continue;
        }
        for (alg, value) in set.digests() {
            output.push_str(&format!("   {} {}\n", alg.label(), encoding.encode(value)));
        }
        if let Some(known) = &set.known {
            output.push_str(&format!("   KNOWN {}\n", known));
        }
    }

    if let Some(audit) = &report.audit {
        output.push_str(&audit_text(audit));
    }

    output
}

fn audit_text(audit: &DiffReport) -> String {
    let mut output = String::new();

    output.push_str("\n=== Audit Report ===\n\n");
    output.push_str(&format!("  Matched: {} files\n", audit.count(AuditStatus::Match)));
    output.push_str(&format!("  Changed: {} files\n", audit.count(AuditStatus::Changed)));
    output.push_str(&format!("  Missing: {} files\n", audit.count(AuditStatus::Missing)));
    output.push_str(&format!("  New:     {} files\n", audit.count(AuditStatus::New)));

    let changed: Vec<_> = audit.with_status(AuditStatus::Changed).collect();
    if !changed.is_empty() {
        output.push_str("\nChanged Files:\n");
        for entry in changed {
            output.push_str(&format!("  {}\n", entry.path));
            for mismatch in &entry.mismatches {
                output.push_str(&format!(
                    "    {} expected {} got {}\n",
                    mismatch.algorithm.label(),
                    mismatch.expected,
                    mismatch.actual
                ));
            }
        }
    }

    for (status, title) in [
        (AuditStatus::Missing, "Missing Files (in audit file but not found):"),
        (AuditStatus::New, "New Files (found but not in audit file):"),
    ] {
        let paths: Vec<_> = audit.with_status(status).map(|e| e.path.as_str()).collect();
        if !paths.is_empty() {
            output.push_str(&format!("\n{}\n", title));
            for path in paths {
                output.push_str(&format!("  {}\n", path));
            }
        }
    }

    output
}

pub fn to_json(report: &Report, encoding: DigestEncoding) -> Result<String, HashitError> {
    #[derive(Serialize)]
    struct AuditOutput<'a> {
        metadata: Metadata,
        valid: bool,
        results: Vec<DigestSet>,
        audit: &'a DiffReport,
    }

    #[derive(Serialize)]
    struct Metadata {
        timestamp: String,
    }

    let results: Vec<DigestSet> = report.results.iter().map(|s| encoded(s, encoding)).collect();

    let rendered = match &report.audit {
        Some(audit) => serde_json::to_string_pretty(&AuditOutput {
            metadata: Metadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            valid: report.valid,
            results,
            audit,
        }),
        None => serde_json::to_string_pretty(&results),
    };

    rendered
        .map(|mut json| {
            json.push('\n');
            json
        })
        .map_err(|e| HashitError::OutputError {
            reason: format!("failed to serialize report: {}", e),
        })
}

/// Render as `%%%% HASHDEEP-1.0` list; the result parses back as an audit manifest
pub fn to_hashdeep(report: &Report, encoding: DigestEncoding, selection: &AlgorithmSelection) -> String {
    let mut output = String::new();
    let names: Vec<&str> = selection.iter().map(|alg| alg.name()).collect();

    output.push_str("%%%% HASHDEEP-1.0\n");
    output.push_str(&format!("%%%% size,{},filename\n", names.join(",")));
    output.push_str("## Invoked from: hashit\n");
    output.push_str(&format!("## Generated: {}\n", chrono::Utc::now().to_rfc3339()));
    output.push_str("##\n");

    for set in report.results.iter().filter(|s| !s.is_failed()) {
        let mut fields = vec![set.bytes.to_string()];
        for alg in selection.iter() {
            fields.push(set.get(alg).map(|v| encoding.encode(v)).unwrap_or_default());
        }
        if set.file.is_empty() {
            fields.push(STDIN_FILENAME.to_string());
        } else {
            fields.push(set.file.clone());
        }
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}

/// Write rendered output to `path`, or stdout when none is given
///
/// Files are created owner read/write only on Unix.
pub fn write_output(rendered: &str, path: Option<&Path>) -> Result<(), HashitError> {
    match path {
        Some(path) => {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options
                .open(path)
                .map_err(|e| HashitError::from_io_error(e, "creating output file", Some(path.to_path_buf())))?;
            file.write_all(rendered.as_bytes())
                .map_err(|e| HashitError::from_io_error(e, "writing output file", Some(path.to_path_buf())))
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .and_then(|_| handle.flush())
                .map_err(|e| HashitError::from_io_error(e, "writing to stdout", None))
        }
    }
}
