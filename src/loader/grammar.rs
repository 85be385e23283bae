//! Library model grammars
//!
//! Each grammar version is identified by its namespace (carried by documents
//! in `$grammar`), ships an embedded JSON Schema for strict validation and
//! has a serde model for the lenient parse.

use include_dir::{include_dir, Dir};
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

use super::{v01_04, v01_05, LibraryModule};
use crate::error::{CompilerError, Result};
use crate::model::{ContextDecl, ImportDecl, LibraryHeader, MemberDecl};

static GRAMMARS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/grammars");

/// Key holding a document's grammar namespace
pub const GRAMMAR_KEY: &str = "$grammar";

/// Supported library model grammar versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GrammarVersion {
    V01_06,
    V01_05,
    V01_04,
}

impl GrammarVersion {
    /// Every grammar, most specific first
    pub const ALL: [GrammarVersion; 3] = [Self::V01_06, Self::V01_05, Self::V01_04];

    pub fn namespace(&self) -> &'static str {
        match self {
            Self::V01_06 => "http://www.OpenTravel.org/ns/OTA2/LibraryModel_v01_06",
            Self::V01_05 => "http://www.OpenTravel.org/ns/OTA2/LibraryModel_v01_05",
            Self::V01_04 => "http://www.OpenTravel.org/ns/OTA2/LibraryModel_v01_04",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::V01_06 => "LibraryModel_v01_06",
            Self::V01_05 => "LibraryModel_v01_05",
            Self::V01_04 => "LibraryModel_v01_04",
        }
    }

    fn schema_file(&self) -> String {
        format!("{}.schema.json", self.label())
    }

    /// Whether a document claims this grammar
    pub fn claims(&self, document: &Value) -> bool {
        document.get(GRAMMAR_KEY).and_then(Value::as_str) == Some(self.namespace())
    }

    /// Parse without strict validation
    ///
    /// An error means the document does not structurally match this grammar.
    pub fn parse_lenient(&self, url: &Url, document: &Value) -> std::result::Result<LibraryModule, String> {
        match self {
            Self::V01_06 => parse_current(url.clone(), document.clone()),
            Self::V01_05 => v01_05::parse(url, document),
            Self::V01_04 => v01_04::parse(url, document),
        }
    }
}

impl fmt::Display for GrammarVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// =============================================================================
// Strict Validation
// =============================================================================

/// A grammar with its compiled JSON Schema
pub struct CompiledGrammar {
    pub version: GrammarVersion,
    validator: JSONSchema,
}

impl fmt::Debug for CompiledGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGrammar")
            .field("version", &self.version)
            .finish()
    }
}

impl CompiledGrammar {
    pub fn compile(version: GrammarVersion) -> Result<Self> {
        let grammar_error = |reason: String| CompilerError::Grammar {
            grammar: version.label().to_string(),
            reason,
        };
        let file = GRAMMARS
            .get_file(version.schema_file())
            .ok_or_else(|| grammar_error("schema not embedded".to_string()))?;
        let schema: Value = serde_json::from_slice(file.contents())?;
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| grammar_error(e.to_string()))?;
        Ok(Self { version, validator })
    }

    /// Strict structural validation; returns every violation
    pub fn validate(&self, document: &Value) -> std::result::Result<(), Vec<String>> {
        self.validator.validate(document).map_err(|errors| {
            errors
                .map(|e| format!("{} at {}", e, e.instance_path))
                .collect()
        })
    }
}

// =============================================================================
// Current Grammar (v01_06)
// =============================================================================

/// Document model of the current grammar
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryDocument {
    #[serde(flatten)]
    header: LibraryHeader,
    #[serde(default)]
    imports: Vec<ImportDecl>,
    #[serde(default)]
    includes: Vec<String>,
    #[serde(default)]
    contexts: Vec<ContextDecl>,
    members: Vec<MemberDecl>,
}

/// Parse a document of the current grammar
pub fn parse_current(url: Url, document: Value) -> std::result::Result<LibraryModule, String> {
    let doc: LibraryDocument = serde_json::from_value(document).map_err(|e| e.to_string())?;
    Ok(LibraryModule {
        url,
        grammar: GrammarVersion::V01_06,
        header: doc.header,
        imports: doc.imports,
        includes: doc.includes,
        contexts: doc.contexts,
        members: doc.members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_grammars_compile() {
        for version in GrammarVersion::ALL {
            assert!(CompiledGrammar::compile(version).is_ok(), "{}", version);
        }
    }

    #[test]
    fn test_strict_rejects_bad_names() {
        let grammar = CompiledGrammar::compile(GrammarVersion::V01_06).unwrap();
        let doc = json!({
            "$grammar": GrammarVersion::V01_06.namespace(),
            "name": "Orders",
            "members": [{ "kind": "simpleType", "name": "Bad Name", "base": "xsd:string" }]
        });
        let errors = grammar.validate(&doc).unwrap_err();
        assert!(!errors.is_empty());
        assert!(GrammarVersion::V01_06.claims(&doc));
        assert!(!GrammarVersion::V01_05.claims(&doc));
    }

    #[test]
    fn test_parse_current() {
        let url = Url::parse("file:///libs/Orders.otm").unwrap();
        let module = parse_current(url, json!({
            "$grammar": GrammarVersion::V01_06.namespace(),
            "name": "Orders",
            "namespace": "http://example.com/ns/Orders/v01",
            "imports": [{ "namespace": "http://example.com/ns/Base/v01", "prefix": "b", "fileHints": ["Base.otm"] }],
            "members": [{ "kind": "simpleType", "name": "Code", "base": "xsd:string" }]
        }))
        .unwrap();
        assert_eq!(module.header.name, "Orders");
        assert_eq!(module.imports[0].file_hints, vec!["Base.otm".to_string()]);
        assert_eq!(module.members.len(), 1);
    }
}
