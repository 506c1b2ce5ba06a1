//! Diagnostics produced by validation, plan modification and the resource
//! lifecycle.
//!
//! Diagnostics are accumulated rather than returned early: an error only halts
//! descent into the subtree that produced it, and every independent problem
//! is reported back to the caller in one round-trip.

use serde::Serialize;
use std::fmt;

use crate::path::Path;

/// Sentence appended to every diagnostic caused by a provider bug.
pub const PROVIDER_BUG_NOTICE: &str =
    "This is always a problem with the provider and should be reported to the provider developer.";

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported to the user, does not fail the call.
    Warning,
    /// Fails the call.
    Error,
}

/// Which part of the system a diagnostic is attributable to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticClass {
    /// Schema authoring mistake (cardinality, nesting mode, type mismatch).
    SchemaDefinition,
    /// The user-supplied configuration violates a rule of the schema.
    Configuration,
    /// A plan modifier, default, or container rebuild broke a plan invariant.
    PlanConsistency,
    /// Create or Update reported success without producing state.
    LifecycleState,
    /// Surfaced as-is from a remote service client.
    RemoteOperation,
    /// Raised by provider-defined code without a more specific class.
    Provider,
}

impl DiagnosticClass {
    /// Returns true if diagnostics of this class always indicate a provider bug.
    #[must_use]
    pub const fn is_provider_bug(self) -> bool {
        matches!(
            self,
            Self::SchemaDefinition | Self::PlanConsistency | Self::LifecycleState
        )
    }
}

/// A single warning or error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Classification.
    pub class: DiagnosticClass,
    /// Location the diagnostic is tied to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    /// Short summary.
    pub summary: String,
    /// Longer explanation.
    pub detail: String,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(
        class: DiagnosticClass,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, class, summary, detail)
    }

    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(
        class: DiagnosticClass,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, class, summary, detail)
    }

    fn new(
        severity: Severity,
        class: DiagnosticClass,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut detail = detail.into();
        if class.is_provider_bug() && !detail.contains(PROVIDER_BUG_NOTICE) {
            if !detail.is_empty() {
                detail.push_str("\n\n");
            }
            detail.push_str(PROVIDER_BUG_NOTICE);
        }

        Self {
            severity,
            class,
            path: None,
            summary: summary.into(),
            detail,
        }
    }

    /// Ties the diagnostic to a path.
    #[must_use]
    pub fn at(mut self, path: &Path) -> Self {
        self.path = Some(path.clone());
        self
    }

    /// Creates a configuration error at `path`, addressed to the end user.
    #[must_use]
    pub fn invalid_configuration(
        path: &Path,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::error(DiagnosticClass::Configuration, summary, detail).at(path)
    }

    /// Creates the error raised when a value is not of the kind the schema expects.
    #[must_use]
    pub fn invalid_value_type(path: &Path, expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::error(
            DiagnosticClass::SchemaDefinition,
            "Invalid Value Type",
            format!(
                "An unexpected value type was encountered at {path}. Expected {expected}, found {found}."
            ),
        )
        .at(path)
    }

    /// Returns true for error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        write!(f, "{severity}: {}", self.summary)?;
        if let Some(path) = &self.path
            && !path.is_empty()
        {
            write!(f, " (at {path})")?;
        }
        if !self.detail.is_empty() {
            write!(f, "\n  {}", self.detail.replace('\n', "\n  "))?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Appends every diagnostic of `other`.
    pub fn append(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Returns true if any diagnostic has error severity.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// Number of error diagnostics.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.0.iter().filter(|d| d.is_error()).count()
    }

    /// Number of warning diagnostics.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.0.len() - self.error_count()
    }

    /// Iterates the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    /// Iterates the warning diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    /// Iterates all diagnostics in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Number of diagnostics.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no diagnostics.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_bug_classes_carry_notice() {
        let diag = Diagnostic::error(DiagnosticClass::SchemaDefinition, "Bad", "Broken schema.");
        assert!(diag.detail.ends_with(PROVIDER_BUG_NOTICE));

        let diag = Diagnostic::error(DiagnosticClass::Configuration, "Bad", "Fix your config.");
        assert!(!diag.detail.contains(PROVIDER_BUG_NOTICE));
    }

    #[test]
    fn test_counts() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(DiagnosticClass::Configuration, "w", ""));
        assert!(!diags.has_error());

        diags.push(Diagnostic::error(DiagnosticClass::Provider, "e", ""));
        assert!(diags.has_error());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn test_display_includes_path() {
        let path = Path::root("name");
        let diag = Diagnostic::invalid_configuration(&path, "Missing", "Set it.");
        let rendered = diag.to_string();
        assert!(rendered.contains("(at name)"));
        assert!(rendered.starts_with("Error: Missing"));
    }
}
