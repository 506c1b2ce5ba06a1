//! Content encoding type for `local_file`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use crate::diag::{Diagnostic, Diagnostics};
use crate::path::Path;
use crate::value::{CustomType, Type, Value};

/// How the `content` string maps to file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// Content is written as UTF-8 text.
    Utf8,
    /// Content is hex and decoded before writing.
    Hex,
}

impl ContentEncoding {
    /// Canonical spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Hex => "hex",
        }
    }

    /// Converts configured content to file bytes.
    ///
    /// # Errors
    ///
    /// Returns a message if hex content does not decode.
    pub fn decode(self, content: &str) -> Result<Vec<u8>, String> {
        match self {
            Self::Utf8 => Ok(content.as_bytes().to_vec()),
            Self::Hex => hex::decode(content).map_err(|e| e.to_string()),
        }
    }

    /// Converts file bytes back to content, if they are representable.
    #[must_use]
    pub fn encode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).ok(),
            Self::Hex => Some(hex::encode(bytes)),
        }
    }
}

impl FromStr for ContentEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "utf8" => Ok(Self::Utf8),
            "hex" | "base16" => Ok(Self::Hex),
            _ => Err(format!("unsupported encoding {s:?}, expected \"utf-8\" or \"hex\"")),
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String type holding a [`ContentEncoding`]. Spellings of the same
/// encoding ("UTF8", "utf-8") are semantically equal.
#[derive(Debug)]
pub struct EncodingType;

impl EncodingType {
    /// The shared instance.
    pub fn shared() -> Arc<dyn CustomType> {
        static SHARED: OnceLock<Arc<dyn CustomType>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self)))
    }

    /// The shared instance as a [`Type`].
    pub fn ty() -> Type {
        Type::Custom(Self::shared())
    }

    /// Parses the encoding held by `value`. Null means the default.
    #[must_use]
    pub fn parse(value: Option<&Value>) -> Option<ContentEncoding> {
        match value {
            Some(v) if v.is_null() => Some(ContentEncoding::Utf8),
            None => Some(ContentEncoding::Utf8),
            Some(v) => v.as_str().and_then(|s| s.parse().ok()),
        }
    }
}

impl CustomType for EncodingType {
    fn name(&self) -> &str {
        "content_encoding"
    }

    fn base_type(&self) -> Type {
        Type::String
    }

    fn check_base(&self, base: &Value, path: &Path) -> Diagnostics {
        let Some(s) = base.as_str() else {
            return Diagnostics::new();
        };
        match s.parse::<ContentEncoding>() {
            Ok(_) => Diagnostics::new(),
            Err(e) => Diagnostic::invalid_configuration(path, "Invalid Encoding", e).into(),
        }
    }

    fn semantic_equal(&self, prior: &Value, proposed: &Value) -> Result<bool, Diagnostics> {
        let parse = |v: &Value| v.as_str().and_then(|s| s.parse::<ContentEncoding>().ok());
        Ok(parse(prior).is_some() && parse(prior) == parse(proposed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spellings() {
        assert_eq!("UTF8".parse(), Ok(ContentEncoding::Utf8));
        assert_eq!("utf_8".parse(), Ok(ContentEncoding::Utf8));
        assert_eq!("Hex".parse(), Ok(ContentEncoding::Hex));
        assert!("latin1".parse::<ContentEncoding>().is_err());
    }

    #[test]
    fn test_semantic_equality() {
        let ty = EncodingType;
        assert_eq!(ty.semantic_equal(&Value::string("utf-8"), &Value::string("UTF8")), Ok(true));
        assert_eq!(ty.semantic_equal(&Value::string("utf-8"), &Value::string("hex")), Ok(false));
    }

    #[test]
    fn test_check_base_rejects_unknown_encoding() {
        let diags = EncodingType.check_base(&Value::string("ebcdic"), &Path::root("encoding"));
        assert!(diags.has_error());
        assert_eq!(diags.iter().next().and_then(|d| d.path.clone()), Some(Path::root("encoding")));
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = ContentEncoding::Hex.decode("00ff").expect("hex");
        assert_eq!(bytes, vec![0, 255]);
        assert_eq!(ContentEncoding::Hex.encode(&bytes).as_deref(), Some("00ff"));
        assert!(ContentEncoding::Hex.decode("zz").is_err());
    }
}
