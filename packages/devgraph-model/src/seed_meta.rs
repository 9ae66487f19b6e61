//! `SeedMeta`: per-package/per-branch descriptor written alongside the
//! columnar seed files (C2). Writing this file last is what makes a
//! generation visible to readers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current on-disk schema version for seed artifacts. Bumped whenever the
/// column projection of [`crate::Node`]/[`crate::Edge`]/[`crate::ExternalRef`]/
/// [`crate::DomainEffect`] changes in a way readers must know about.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedMeta {
    pub schema_version: u32,
    pub generation: u64,
    pub source_fingerprint: String,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
    pub parser_versions: BTreeMap<String, String>,
    pub package_path: String,
    pub repo_name: String,
    pub branch: String,
}

impl SeedMeta {
    /// Computes the fingerprint over every analyzed file's content hash.
    /// Order-independent: the same file set always yields the same
    /// fingerprint regardless of discovery order.
    pub fn fingerprint<'a>(file_hashes: impl IntoIterator<Item = &'a str>) -> String {
        let mut sorted: Vec<&str> = file_hashes.into_iter().collect();
        sorted.sort_unstable();
        let mut hasher = Sha256::new();
        for hash in sorted {
            hasher.update(hash.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_independent() {
        let a = SeedMeta::fingerprint(["h1", "h2", "h3"]);
        let b = SeedMeta::fingerprint(["h3", "h1", "h2"]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_when_a_file_hash_changes() {
        let a = SeedMeta::fingerprint(["h1", "h2"]);
        let b = SeedMeta::fingerprint(["h1", "h2-changed"]);
        assert_ne!(a, b);
    }
}
