// Tests for the known-hash reference index

use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hashit::config::Config;
use hashit::hash::{self, AlgorithmSelection, DigestEngine, DigestSet, HashitError, ReferenceIndex};
use tempfile::TempDir;

const EICAR: &[u8] = br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

fn entry(md5: Option<&str>, sha256: Option<&str>) -> DigestSet {
    DigestSet {
        md5: md5.map(str::to_string),
        sha256: sha256.map(str::to_string),
        ..Default::default()
    }
}

#[test]
fn test_embedded_dataset_loads() {
    let index = ReferenceIndex::load().unwrap();
    assert!(!index.is_empty());
    assert!(index.entry("empty-file").is_some());
    // md5, sha1, sha256 and sha512 for every entry
    assert_eq!(index.digest_count(), index.len() * 4);
}

#[test]
fn test_identify_eicar() {
    let index = ReferenceIndex::load().unwrap();
    let set = DigestEngine::new().compute_bytes(EICAR, "eicar.com", &AlgorithmSelection::default());
    assert_eq!(set.md5.as_deref(), Some("44d88612fea8a8f36de82e1278abb02f"));
    assert_eq!(index.identify(&set), Some("eicar-test-file"));
}

#[test]
fn test_identify_unknown_file() {
    let index = ReferenceIndex::load().unwrap();
    let set = DigestEngine::new().compute_bytes(b"nothing to see here", "x", &AlgorithmSelection::default());
    assert_eq!(index.identify(&set), None);
}

#[test]
fn test_name_for_is_case_insensitive() {
    let index = ReferenceIndex::load().unwrap();
    assert_eq!(index.name_for("44D88612FEA8A8F36DE82E1278ABB02F"), Some("eicar-test-file"));
}

#[test]
fn test_known_bad_sha256_only_entry() {
    let index = ReferenceIndex::from_entries(vec![(
        "known-bad".to_string(),
        entry(None, Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")),
    )]);
    assert_eq!(index.digest_count(), 1);

    let set = DigestEngine::new().compute_bytes(b"hello", "hello.txt", &AlgorithmSelection::default());
    assert_eq!(index.identify(&set), Some("known-bad"));

    // Only md5 computed, which the entry does not carry
    let md5_only = DigestEngine::new().compute_bytes(b"hello", "hello.txt", &AlgorithmSelection::parse(&["md5"]));
    assert_eq!(index.identify(&md5_only), None);
}

#[test]
fn test_identify_prefers_strongest_digest() {
    let index = ReferenceIndex::from_entries(vec![
        ("by-md5".to_string(), entry(Some("5d41402abc4b2a76b9719d911017c592"), None)),
        (
            "by-sha256".to_string(),
            entry(None, Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")),
        ),
    ]);
    let set = DigestEngine::new().compute_bytes(b"hello", "hello.txt", &AlgorithmSelection::default());
    assert_eq!(index.identify(&set), Some("by-sha256"));
}

#[test]
fn test_collision_last_name_wins() {
    let md5 = Some("5d41402abc4b2a76b9719d911017c592");
    let index = ReferenceIndex::from_entries(vec![
        ("zeta".to_string(), entry(md5, None)),
        ("alpha".to_string(), entry(md5, None)),
    ]);
    assert_eq!(index.name_for("5d41402abc4b2a76b9719d911017c592"), Some("zeta"));
    assert_eq!(index.digest_count(), 1);
}

#[test]
fn test_empty_entries_contribute_nothing() {
    let index = ReferenceIndex::from_entries(vec![("blank".to_string(), DigestSet::default())]);
    assert_eq!(index.len(), 1);
    assert_eq!(index.digest_count(), 0);
}

#[test]
fn test_from_payload_roundtrip() {
    let json = r#"{"sample":{"md5":"900150983cd24fb0d6963f7d28e17f72"}}"#;
    let payload = STANDARD.encode(json);
    let index = ReferenceIndex::from_payload(&payload).unwrap();
    assert_eq!(index.name_for("900150983cd24fb0d6963f7d28e17f72"), Some("sample"));
}

#[test]
fn test_corrupt_payload_is_fatal() {
    let err = ReferenceIndex::from_payload("!!! not base64 !!!").unwrap_err();
    assert!(matches!(err, HashitError::ReferenceDataCorrupt { .. }));

    let err = ReferenceIndex::from_payload(&STANDARD.encode("[not an object")).unwrap_err();
    assert!(matches!(err, HashitError::ReferenceDataCorrupt { .. }));
}

#[test]
fn test_known_audit_run_annotates_results() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("eicar.com"), EICAR).unwrap();
    fs::write(dir.path().join("plain.txt"), b"plain").unwrap();

    let config = Config {
        paths: vec![dir.path().to_path_buf()],
        known_audit: true,
        workers: 2,
        ..Config::default()
    };
    let report = hash::run(&config).unwrap();

    let known: Vec<_> = report.known_files().collect();
    assert_eq!(known.len(), 1);
    assert!(known[0].file.ends_with("eicar.com"));
    assert_eq!(known[0].known.as_deref(), Some("eicar-test-file"));
    assert!(report.valid);
}
