// Known-hash reference index
// Decodes the embedded reference dataset and answers "is this a known file" queries

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, trace};

use super::error::HashitError;
use super::hash::{Algorithm, DigestSet};

/// Base64 wrapped JSON object of canonical name to DigestSet, compiled in
const EMBEDDED_PAYLOAD: &str = include_str!("data/known.b64");

/// Algorithms indexed for reverse lookup
const INDEXED: [Algorithm; 4] = [Algorithm::Md5, Algorithm::Sha1, Algorithm::Sha256, Algorithm::Sha512];

/// Order in which a computed DigestSet is checked against the index, strongest first
const LOOKUP_PRIORITY: [Algorithm; 4] = [Algorithm::Sha512, Algorithm::Sha256, Algorithm::Sha1, Algorithm::Md5];

/// Reverse lookup from a digest value to the canonical name that produced it
///
/// Built once and never mutated, so workers share it through an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: BTreeMap<String, DigestSet>,
    lookup: HashMap<String, String>,
}

impl ReferenceIndex {
    /// Load the dataset compiled into the binary
    pub fn load() -> Result<Self, HashitError> {
        Self::from_payload(EMBEDDED_PAYLOAD)
    }

    /// Build an index from a base64 wrapped JSON payload
    pub fn from_payload(payload: &str) -> Result<Self, HashitError> {
        let start = Instant::now();

        // Payload is line wrapped, the decoder does not accept whitespace
        let compact: String = payload.split_whitespace().collect();
        let json = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| HashitError::ReferenceDataCorrupt {
                reason: format!("failed to base64 decode: {}", e),
            })?;

        let entries: BTreeMap<String, DigestSet> =
            serde_json::from_slice(&json).map_err(|e| HashitError::ReferenceDataCorrupt {
                reason: format!("json invalid: {}", e),
            })?;

        trace!(elapsed_us = start.elapsed().as_micros() as u64, "decoded known-hash database");

        Ok(Self::from_entries(entries))
    }

    /// Build an index from (canonical name, DigestSet) pairs
    ///
    /// Entries are indexed in name order. When two names share a digest the
    /// later one wins.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, DigestSet)>,
    {
        let start = Instant::now();
        let entries: BTreeMap<String, DigestSet> = entries.into_iter().collect();
        let mut lookup = HashMap::with_capacity(entries.len() * INDEXED.len());

        for (name, digests) in &entries {
            for alg in INDEXED {
                if let Some(value) = digests.get(alg).filter(|v| !v.is_empty()) {
                    if let Some(previous) = lookup.insert(value.to_lowercase(), name.clone()) {
                        if &previous != name {
                            debug!(digest = %value, previous = %previous, name = %name, "known-hash collision");
                        }
                    }
                }
            }
        }

        trace!(
            entries = entries.len(),
            digests = lookup.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "built known-hash reverse index"
        );

        Self { entries, lookup }
    }

    /// Return the canonical name of the first computed digest found in the index
    pub fn identify(&self, digests: &DigestSet) -> Option<&str> {
        LOOKUP_PRIORITY
            .iter()
            .filter_map(|&alg| digests.get(alg))
            .find_map(|value| self.name_for(value))
    }

    /// Look up a single digest value of any indexed algorithm
    pub fn name_for(&self, digest: &str) -> Option<&str> {
        self.lookup.get(&digest.to_lowercase()).map(String::as_str)
    }

    /// The reference entry for a canonical name
    pub fn entry(&self, name: &str) -> Option<&DigestSet> {
        self.entries.get(name)
    }

    /// Number of reference entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct digest values in the reverse map
    pub fn digest_count(&self) -> usize {
        self.lookup.len()
    }
}

// Tests live in tests/hash/reference_tests.rs
