//! Opaque per-resource private state.
//!
//! The persisted blob is a single JSON object. Keys starting with `.` belong
//! to the engine; every other key belongs to the provider. Providers only
//! ever see their own namespace through [`ProviderData`].

use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};

fn key_error(key: &str, reason: &str) -> Diagnostic {
    Diagnostic::error(
        DiagnosticClass::Provider,
        "Restricted Resource Private State Key",
        format!("Private state key {key:?} {reason}."),
    )
}

/// Provider-owned private key/value pairs. Values are JSON documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderData {
    data: BTreeMap<String, Vec<u8>>,
}

impl ProviderData {
    /// Creates an empty namespace.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    fn check_key(key: &str) -> Result<(), Diagnostic> {
        if key.is_empty() {
            return Err(key_error(key, "must not be empty"));
        }
        if key.starts_with('.') {
            return Err(key_error(key, "is reserved for engine use"));
        }
        Ok(())
    }

    /// Reads a key.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the key is invalid.
    pub fn get_key(&self, key: &str) -> Result<Option<&[u8]>, Diagnostics> {
        Self::check_key(key)?;
        Ok(self.data.get(key).map(Vec::as_slice))
    }

    /// Writes a key. An empty value removes it.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the key is invalid or the value is not a UTF-8
    /// JSON document.
    pub fn set_key(&mut self, key: &str, value: &[u8]) -> Result<(), Diagnostics> {
        Self::check_key(key)?;
        if value.is_empty() {
            self.data.remove(key);
            return Ok(());
        }
        if serde_json::from_slice::<Json>(value).is_err() {
            return Err(Diagnostic::error(
                DiagnosticClass::Provider,
                "Invalid Private State Value",
                format!("The value for private state key {key:?} must be valid UTF-8 encoded JSON."),
            )
            .into());
        }
        self.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    /// Keys currently set.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Returns true if no key is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The full private state blob of one resource instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrivateState {
    engine: BTreeMap<String, Vec<u8>>,
    /// Provider namespace.
    pub provider: ProviderData,
}

impl PrivateState {
    /// Decodes a persisted blob. An empty blob decodes to empty state.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the blob is not a JSON object.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Diagnostics> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let decoded: BTreeMap<String, Json> = serde_json::from_slice(bytes).map_err(|e| {
            Diagnostic::error(
                DiagnosticClass::LifecycleState,
                "Error Decoding Private State",
                format!("An error was encountered when decoding private state: {e}."),
            )
        })?;

        let mut state = Self::default();
        for (key, value) in decoded {
            let encoded = value.to_string().into_bytes();
            if key.starts_with('.') {
                state.engine.insert(key, encoded);
            } else {
                state.provider.data.insert(key, encoded);
            }
        }
        Ok(state)
    }

    /// Encodes to the persisted blob. Empty state encodes to no bytes.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if a stored value is no longer valid JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Diagnostics> {
        if self.engine.is_empty() && self.provider.is_empty() {
            return Ok(Vec::new());
        }
        let mut merged = serde_json::Map::new();
        for (key, bytes) in self.engine.iter().chain(self.provider.data.iter()) {
            let value: Json = serde_json::from_slice(bytes).map_err(|e| {
                Diagnostic::error(
                    DiagnosticClass::Provider,
                    "Error Encoding Private State",
                    format!("Private state key {key:?} holds invalid JSON: {e}."),
                )
            })?;
            merged.insert(key.clone(), value);
        }
        Ok(Json::Object(merged).to_string().into_bytes())
    }

    /// Reads an engine-owned key.
    #[must_use]
    pub fn engine_key(&self, key: &str) -> Option<&[u8]> {
        self.engine.get(key).map(Vec::as_slice)
    }

    /// Writes an engine-owned key; the leading `.` is added if missing.
    pub fn set_engine_key(&mut self, key: &str, value: Json) {
        let key = if key.starts_with('.') {
            key.to_string()
        } else {
            format!(".{key}")
        };
        self.engine.insert(key, value.to_string().into_bytes());
    }

    /// Replaces the provider namespace, keeping engine keys.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderData) -> Self {
        self.provider = provider;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_keys_are_validated() {
        let mut data = ProviderData::new();
        assert!(data.set_key(".engine", b"{}").is_err());
        assert!(data.set_key("", b"{}").is_err());
        assert!(data.set_key("etag", b"not json").is_err());

        data.set_key("etag", br#""abc""#).expect("valid key");
        assert_eq!(
            data.get_key("etag").expect("valid key"),
            Some(&br#""abc""#[..])
        );

        data.set_key("etag", b"").expect("removal");
        assert!(data.is_empty());
    }

    #[test]
    fn test_namespaces_round_trip() {
        let mut state = PrivateState::default();
        state.set_engine_key("upgraded_from", json!(0));
        state.provider.set_key("etag", br#""v1""#).expect("valid");

        let bytes = state.to_bytes().expect("encodes");
        let decoded = PrivateState::from_bytes(&bytes).expect("decodes");
        assert_eq!(decoded, state);
        assert_eq!(decoded.engine_key(".upgraded_from"), Some(&b"0"[..]));
        assert_eq!(decoded.provider.keys().collect::<Vec<_>>(), vec!["etag"]);
    }

    #[test]
    fn test_empty_blob() {
        assert!(PrivateState::default().to_bytes().expect("encodes").is_empty());
        assert_eq!(
            PrivateState::from_bytes(b"").expect("decodes"),
            PrivateState::default()
        );
    }
}
