use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::RwLock;

/// SHA-256 hostname hash storage, keyed by the first 2 bytes of the digest
/// (spec §3 "Hash Storage maps a 2-byte SHA-256 prefix to a list of 30-byte
/// suffixes"). Used both for safe-browsing matching and the TXT hash-prefix
/// query API (§4.11), whose 4-hex-character prefixes are exactly these 2
/// bytes hex-encoded.
///
/// Grounded on the teacher's reload-under-a-writer-lock, atomic-swap shape
/// (`ArcSwap<BlockIndex>`/`decision_cache.rs`), adapted here to a
/// `RwLock<HashMap<..>>` since the replaced value is a plain hash map, not a
/// struct with its own internal synchronization.
pub struct HashStorage {
    inner: RwLock<HashMap<[u8; 2], Vec<[u8; 30]>>>,
}

impl HashStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Parses `text` as one hostname per line (blank/`#` lines ignored),
    /// hashes each with SHA-256, and replaces the stored map wholesale under
    /// a writer lock. Returns the number of hostnames stored.
    pub fn reset(&self, text: &str) -> usize {
        let mut map: HashMap<[u8; 2], Vec<[u8; 30]>> = HashMap::new();
        let mut count = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let digest = Sha256::digest(line.as_bytes());
            let prefix = [digest[0], digest[1]];
            let mut suffix = [0u8; 30];
            suffix.copy_from_slice(&digest[2..32]);
            map.entry(prefix).or_default().push(suffix);
            count += 1;
        }
        *self.inner.write().unwrap() = map;
        count
    }

    /// Hashes `host` and returns true iff some stored suffix under its
    /// prefix bytes reconstructs the full digest.
    pub fn matches(&self, host: &str) -> bool {
        let digest = Sha256::digest(host.as_bytes());
        let prefix = [digest[0], digest[1]];
        let suffix = &digest[2..32];
        let map = self.inner.read().unwrap();
        match map.get(&prefix) {
            Some(suffixes) => suffixes.iter().any(|s| s.as_slice() == suffix),
            None => false,
        }
    }

    /// For each requested 2-byte prefix, emits every known full hash
    /// hex-encoded (64 chars). All hashes are written into one buffer and
    /// returned as byte ranges into it, per §4.4's explicit memory-layout
    /// note — one allocation instead of one `String` per hash.
    pub fn hashes(&self, prefixes: &[[u8; 2]]) -> (String, Vec<Range<usize>>) {
        let map = self.inner.read().unwrap();
        let mut buffer = String::new();
        let mut ranges = Vec::new();
        for &prefix in prefixes {
            if let Some(suffixes) = map.get(&prefix) {
                for suffix in suffixes {
                    let start = buffer.len();
                    buffer.push_str(&hex::encode(prefix));
                    buffer.push_str(&hex::encode(suffix));
                    ranges.push(start..buffer.len());
                }
            }
        }
        (buffer, ranges)
    }
}

impl Default for HashStorage {
    fn default() -> Self {
        Self::new()
    }
}
