// Tests for report rendering

use std::fs;
use std::path::Path;

use hashit::hash::audit::{diff, AuditManifest, AuditRecord, AuditStatus, ManifestDialect};
use hashit::hash::{AlgorithmSelection, DigestEngine, DigestSet, HashitError, Report};
use hashit::output::{render, write_output, DigestEncoding, OutputFormat, STDIN_FILENAME};
use tempfile::TempDir;

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

fn sample_report(selection: &AlgorithmSelection) -> Report {
    let engine = DigestEngine::new();
    let err = HashitError::FileNotFound { path: "gone.txt".into() };
    let mut known = engine.compute_bytes(b"", "empty.txt", selection);
    known.known = Some("empty-file".to_string());

    Report {
        results: vec![
            known,
            DigestSet::failed("gone.txt", &err),
            engine.compute_bytes(b"hello", "hello.txt", selection),
        ],
        valid: false,
        audit: None,
    }
}

#[test]
fn test_text_output() {
    let selection = AlgorithmSelection::parse(&["md5", "sha1"]);
    let text = render(&sample_report(&selection), OutputFormat::Text, DigestEncoding::Hex, &selection).unwrap();

    assert!(text.contains("hello.txt (5 bytes)\n"));
    assert!(text.contains(&format!("   MD5 {}\n", HELLO_MD5)));
    assert!(text.contains("   SHA1 aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d\n"));
    assert!(text.contains("   KNOWN empty-file\n"));
    assert!(text.contains("gone.txt (0 bytes)\n   ERROR "));
    assert!(!text.contains("Audit Report"));
}

#[test]
fn test_text_output_base64() {
    let selection = AlgorithmSelection::parse(&["md5"]);
    let text = render(&sample_report(&selection), OutputFormat::Text, DigestEncoding::Base64, &selection).unwrap();
    assert!(text.contains("   MD5 XUFAKrxLKna5cZ2REBfFkg==\n"));
}

#[test]
fn test_json_output_is_array_without_audit() {
    let selection = AlgorithmSelection::default();
    let json = render(&sample_report(&selection), OutputFormat::Json, DigestEncoding::Hex, &selection).unwrap();

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["file"], "hello.txt");
    assert_eq!(rows[2]["md5"], HELLO_MD5);
    assert!(rows[1]["error"].is_string());
}

#[test]
fn test_json_output_with_audit() {
    let selection = AlgorithmSelection::default();
    let mut report = sample_report(&selection);
    report.audit = Some(diff(&report.results, &[]));

    let json = render(&report, OutputFormat::Json, DigestEncoding::Hex, &selection).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert!(value["metadata"]["timestamp"].is_string());
    assert_eq!(value["results"].as_array().unwrap().len(), 3);
    assert_eq!(value["audit"]["entries"][0]["status"], "new");
}

#[test]
fn test_json_output_reparses_as_manifest() {
    let selection = AlgorithmSelection::default();
    let report = sample_report(&selection);
    let json = render(&report, OutputFormat::Json, DigestEncoding::Base64, &selection).unwrap();

    let manifest = AuditManifest::parse(&json, Path::new("out.json")).unwrap();
    assert_eq!(manifest.dialect, ManifestDialect::Json);

    // Base64 values in the manifest still match freshly computed hex values
    let audit = manifest.diff(&report.results);
    assert_eq!(audit.status_of("hello.txt"), Some(AuditStatus::Match));
    assert_eq!(audit.status_of("empty.txt"), Some(AuditStatus::Match));
}

#[test]
fn test_hashdeep_output_reparses_as_manifest() {
    let selection = AlgorithmSelection::parse(&["md5", "sha256"]);
    let mut report = sample_report(&selection);
    report.results.push(DigestEngine::new().compute_bytes(b"abc", "dir/with, comma.txt", &selection));

    let listing = render(&report, OutputFormat::Hashdeep, DigestEncoding::Hex, &selection).unwrap();
    assert!(listing.starts_with("%%%% HASHDEEP-1.0\n%%%% size,md5,sha256,filename\n"));
    assert!(!listing.contains("gone.txt"));

    let manifest = AuditManifest::parse(&listing, Path::new("out.txt")).unwrap();
    assert_eq!(manifest.dialect, ManifestDialect::HashList);
    assert_eq!(manifest.len(), 3);

    let records: Vec<AuditRecord> = manifest.records.clone();
    let audit = diff(&report.results, &records);
    assert_eq!(audit.count(AuditStatus::Match), 3);
    // The unreadable file was never recorded
    assert_eq!(audit.status_of("gone.txt"), Some(AuditStatus::New));
}

#[test]
fn test_write_output_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.txt");

    write_output("first\n", Some(&path)).unwrap();
    write_output("second\n", Some(&path)).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_write_output_to_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no/such/dir/report.txt");
    assert!(write_output("x", Some(&path)).is_err());
}

#[test]
fn test_hashdeep_stdin_report_reparses() {
    let selection = AlgorithmSelection::parse(&["md5"]);
    let report = Report {
        results: vec![DigestEngine::new().compute_bytes(b"hello", "", &selection)],
        valid: true,
        audit: None,
    };

    let listing = render(&report, OutputFormat::Hashdeep, DigestEncoding::Hex, &selection).unwrap();
    assert!(listing.ends_with(&format!("5,{},{}\n", HELLO_MD5, STDIN_FILENAME)));

    let manifest = AuditManifest::parse(&listing, Path::new("stdin.txt")).unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest.records[0].path, STDIN_FILENAME);
    assert_eq!(manifest.records[0].digests.md5.as_deref(), Some(HELLO_MD5));
}
