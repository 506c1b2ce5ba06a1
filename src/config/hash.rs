//! Configuration hashing for change detection.
//!
//! Hashes are taken over canonical JSON: object keys are sorted, so two
//! configurations that differ only in key order hash the same.

use serde_json::Value as Json;
use sha2::{Digest, Sha256};

use super::spec::{ResourceConfig, WorkspaceConfig};

/// Hasher for computing configuration hashes.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire workspace configuration.
    #[must_use]
    pub fn hash_config(&self, config: &WorkspaceConfig) -> String {
        let mut hasher = Sha256::new();
        hasher.update(config.workspace.as_bytes());
        hasher.update(canonical(&config.provider_body()).as_bytes());
        for resource in config.resources.iter().chain(&config.data) {
            hasher.update(self.hash_resource(resource).as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single resource block.
    #[must_use]
    pub fn hash_resource(&self, resource: &ResourceConfig) -> String {
        let mut hasher = Sha256::new();
        hasher.update(resource.type_name.as_bytes());
        hasher.update([0]);
        hasher.update(resource.name.as_bytes());
        hasher.update([0]);
        hasher.update(canonical(&resource.body()).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Renders JSON with sorted object keys.
fn canonical(json: &Json) -> String {
    match json {
        Json::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Json::String(k.clone()), canonical(&map[k.as_str()])))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Json::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(name: &str, config: Json) -> ResourceConfig {
        ResourceConfig {
            type_name: "local_file".to_string(),
            name: name.to_string(),
            config: config.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_resource_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let a = resource("a", json!({"path": "x", "content": "y"}));
        let b = resource("a", json!({"content": "y", "path": "x"}));
        assert_eq!(hasher.hash_resource(&a), hasher.hash_resource(&b));
    }

    #[test]
    fn test_different_resources_different_hash() {
        let hasher = ConfigHasher::new();
        let a = resource("a", json!({"path": "x"}));
        let b = resource("b", json!({"path": "x"}));
        let c = resource("a", json!({"path": "z"}));
        assert_ne!(hasher.hash_resource(&a), hasher.hash_resource(&b));
        assert_ne!(hasher.hash_resource(&a), hasher.hash_resource(&c));
    }

    #[test]
    fn test_canonical_nested() {
        assert_eq!(
            canonical(&json!({"b": [1, {"d": 1, "c": null}], "a": "s"})),
            r#"{"a":"s","b":[1,{"c":null,"d":1}]}"#
        );
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let full_hash = "abcdef1234567890abcdef1234567890";
        assert_eq!(hasher.short_hash(full_hash), "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(ConfigHasher::hashes_match("abc123", "abc123"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc124"));
        assert!(!ConfigHasher::hashes_match("abc", "abcd"));
    }
}
