//! Cache key derivation
//!
//! A key identifies one read: the repository, the method, the call
//! arguments and the serialized criteria in force. Arguments are hashed in a
//! canonical form (object keys sorted, array order kept), so two argument
//! maps that differ only in key order share a key. The format version is
//! hashed first; bumping it retires every key derived by an older format.

use sha2::{Digest, Sha256};
use std::fmt;

/// Current key format version
pub const CACHE_KEY_VERSION: u8 = 1;

/// Opaque cache key of the form `{repository}@{method}-{digest}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKeyDeriver {
    version: u8,
}

impl Default for CacheKeyDeriver {
    fn default() -> Self {
        Self {
            version: CACHE_KEY_VERSION,
        }
    }
}

impl CacheKeyDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: u8) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Derive the key for `method` called with `args` under `criteria`
    pub fn derive(
        &self,
        repository: &str,
        method: &str,
        args: &serde_json::Value,
        criteria: &serde_json::Value,
    ) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(b"quarry:cachekey");
        hasher.update([self.version]);

        write_tag(&mut hasher, 0x01);
        write_str(&mut hasher, method);

        write_tag(&mut hasher, 0x02);
        hash_json(&mut hasher, args);

        write_tag(&mut hasher, 0x03);
        hash_json(&mut hasher, criteria);

        let digest = hasher.finalize();
        CacheKey(format!("{}@{}-{}", repository, method, to_hex(&digest)))
    }
}

fn hash_json(hasher: &mut Sha256, value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => write_tag(hasher, 0x10),
        serde_json::Value::Bool(b) => {
            write_tag(hasher, 0x11);
            hasher.update([u8::from(*b)]);
        }
        serde_json::Value::Number(n) => {
            write_tag(hasher, 0x12);
            write_str(hasher, &n.to_string());
        }
        serde_json::Value::String(s) => {
            write_tag(hasher, 0x13);
            write_str(hasher, s);
        }
        serde_json::Value::Array(items) => {
            write_tag(hasher, 0x14);
            write_len(hasher, items.len());
            for item in items {
                hash_json(hasher, item);
            }
        }
        serde_json::Value::Object(map) => {
            write_tag(hasher, 0x15);
            write_len(hasher, map.len());
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                write_str(hasher, key);
                hash_json(hasher, value);
            }
        }
    }
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}

fn write_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_be_bytes());
}

fn write_str(hasher: &mut Sha256, s: &str) {
    write_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
