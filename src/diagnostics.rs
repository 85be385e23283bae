//! Validation Findings
//!
//! Collects warnings and errors raised while loading, resolving and assembling
//! library models. Findings are the recoverable channel: each one carries a
//! stable message key, the identity of the source that caused it (a URL, a
//! library or an entity name) and positional arguments for the message.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Finding Codes
// =============================================================================

/// Message key for a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    // === Loader ===
    /// Input source could not be opened
    LibraryNotFound,
    /// Content failed strict validation but parsed without it
    CorruptLibraryContent,
    /// Content matched none of the supported grammars
    UnreadableLibraryContent,

    // === Assembly ===
    /// Two libraries share a namespace and name
    DuplicateLibrary,
    /// Two entities share a qualified name within one namespace
    DuplicateSymbol,
    /// Chameleon entities collide after merging into a host namespace
    DuplicateChameleonSymbols,
    /// A type reference does not resolve to any symbol
    UnresolvedReference,
    /// A namespace does not follow the active version scheme
    InvalidVersionNamespace,
    /// An extension chain loops back on itself
    CircularExtension,
    /// A contextual facet is attached to an entity that cannot own it
    InvalidFacetOwner,
}

impl FindingCode {
    /// Stable message key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LibraryNotFound => "LIBRARY_NOT_FOUND",
            Self::CorruptLibraryContent => "CORRUPT_LIBRARY_CONTENT",
            Self::UnreadableLibraryContent => "UNREADABLE_LIBRARY_CONTENT",
            Self::DuplicateLibrary => "DUPLICATE_LIBRARY",
            Self::DuplicateSymbol => "DUPLICATE_SYMBOL",
            Self::DuplicateChameleonSymbols => "DUPLICATE_CHAMELEON_SYMBOLS",
            Self::UnresolvedReference => "UNRESOLVED_REFERENCE",
            Self::InvalidVersionNamespace => "INVALID_VERSION_NAMESPACE",
            Self::CircularExtension => "CIRCULAR_EXTENSION",
            Self::InvalidFacetOwner => "INVALID_FACET_OWNER",
        }
    }

    /// Default severity when the reporter does not override it
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::LibraryNotFound
            | Self::CorruptLibraryContent
            | Self::InvalidVersionNamespace => Severity::Warning,

            Self::UnreadableLibraryContent
            | Self::DuplicateLibrary
            | Self::DuplicateSymbol
            | Self::DuplicateChameleonSymbols
            | Self::UnresolvedReference
            | Self::CircularExtension
            | Self::InvalidFacetOwner => Severity::Error,
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// =============================================================================
// Finding
// =============================================================================

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Identity of the item that caused this finding
    pub source: String,
    pub code: FindingCode,
    /// Message arguments, in message order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Finding {
    pub fn new(
        severity: Severity,
        source: impl Into<String>,
        code: FindingCode,
        args: Vec<String>,
    ) -> Self {
        Self {
            severity,
            source: source.into(),
            code,
            args,
        }
    }

    /// Render the message text for this finding
    pub fn message(&self) -> String {
        let arg = |i: usize| self.args.get(i).map(String::as_str).unwrap_or("?");
        match self.code {
            FindingCode::LibraryNotFound => format!("Library not found: {}", arg(0)),
            FindingCode::CorruptLibraryContent => format!(
                "Library content does not conform to {} and was loaded without validation: {}",
                arg(0),
                arg(1)
            ),
            FindingCode::UnreadableLibraryContent => {
                format!("Library content is unreadable as {}: {}", arg(0), arg(1))
            }
            FindingCode::DuplicateLibrary => {
                format!("Library '{}' is already defined in namespace '{}'", arg(0), arg(1))
            }
            FindingCode::DuplicateSymbol => {
                format!("Symbol '{}' is defined more than once in namespace '{}'", arg(0), arg(1))
            }
            FindingCode::DuplicateChameleonSymbols => format!(
                "Chameleon symbol '{}' collides in namespace '{}' (contributors: {})",
                arg(0),
                arg(1),
                arg(2)
            ),
            FindingCode::UnresolvedReference => {
                let base = format!("Reference '{}' could not be resolved", arg(0));
                match self.args.get(1) {
                    Some(suggestion) => format!("{} (did you mean '{}'?)", base, suggestion),
                    None => base,
                }
            }
            FindingCode::InvalidVersionNamespace => format!(
                "Namespace '{}' does not follow the version scheme: {}",
                arg(0),
                arg(1)
            ),
            FindingCode::CircularExtension => {
                format!("Extension of '{}' is circular", arg(0))
            }
            FindingCode::InvalidFacetOwner => {
                format!("'{}' cannot own contextual facet '{}'", arg(0), arg(1))
            }
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.severity,
            self.message(),
            self.source
        )
    }
}

// =============================================================================
// Findings Sink
// =============================================================================

/// Receiver for findings
///
/// Collaborators (loader, resolver, assembly) report through this so callers
/// can plug in their own collection.
pub trait FindingsSink {
    fn add(&mut self, severity: Severity, source: &str, code: FindingCode, args: Vec<String>);

    fn warning(&mut self, source: &str, code: FindingCode, args: Vec<String>) {
        self.add(Severity::Warning, source, code, args);
    }

    fn error(&mut self, source: &str, code: FindingCode, args: Vec<String>) {
        self.add(Severity::Error, source, code, args);
    }

    /// Report with the code's default severity
    fn report(&mut self, source: &str, code: FindingCode, args: Vec<String>) {
        self.add(code.default_severity(), source, code, args);
    }
}

// =============================================================================
// Findings Collection
// =============================================================================

/// Ordered collection of findings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    items: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.items.push(finding);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// All findings carrying a given message key
    pub fn with_code(&self, code: FindingCode) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn count_of(&self, code: FindingCode) -> usize {
        self.with_code(code).count()
    }

    pub fn all(&self) -> &[Finding] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another collection into this one
    pub fn merge(&mut self, other: Findings) {
        self.items.extend(other.items);
    }

    /// Format all findings for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        }

        output
    }
}

impl FindingsSink for Findings {
    fn add(&mut self, severity: Severity, source: &str, code: FindingCode, args: Vec<String>) {
        self.push(Finding::new(severity, source, code, args));
    }
}

impl fmt::Display for Findings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Findings {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Findings {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severity() {
        assert_eq!(FindingCode::LibraryNotFound.default_severity(), Severity::Warning);
        assert_eq!(
            FindingCode::DuplicateChameleonSymbols.default_severity(),
            Severity::Error
        );
    }

    #[test]
    fn test_findings_collection() {
        let mut findings = Findings::new();
        findings.error("lib.otm", FindingCode::UnresolvedReference, vec!["Foo".into()]);
        findings.warning("lib.otm", FindingCode::LibraryNotFound, vec!["x.otm".into()]);

        assert_eq!(findings.error_count(), 1);
        assert_eq!(findings.warning_count(), 1);
        assert!(findings.has_errors());
        assert_eq!(findings.count_of(FindingCode::LibraryNotFound), 1);
    }

    #[test]
    fn test_message_with_suggestion() {
        let finding = Finding::new(
            Severity::Error,
            "a",
            FindingCode::UnresolvedReference,
            vec!["Ordr".into(), "Order".into()],
        );
        assert!(finding.message().contains("did you mean 'Order'"));
        assert_eq!(finding.code.to_string(), "UNRESOLVED_REFERENCE");
    }
}
