//! Module Loader
//!
//! Reads library module documents and produces version-tagged modules.
//!
//! For each input the grammars are tried most specific first:
//! 1. A grammar whose namespace the document does not claim, or whose serde
//!    model the document does not fit, is a structural mismatch: move on to
//!    the next-older grammar.
//! 2. A structural match that fails strict JSON Schema validation is still
//!    accepted, with a `CORRUPT_LIBRARY_CONTENT` finding.
//! 3. When no grammar matches, the first grammar's error is reported as
//!    `UNREADABLE_LIBRARY_CONTENT`.
//!
//! Inputs without a stream report `LIBRARY_NOT_FOUND`. The loader holds no
//! mutable state and can be shared across threads.

pub mod grammar;
pub mod v01_04;
pub mod v01_05;

pub use grammar::{parse_current, CompiledGrammar, GrammarVersion};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use url::Url;

use crate::diagnostics::{FindingCode, Findings, FindingsSink, Severity};
use crate::error::Result;
use crate::model::{ContextDecl, ImportDecl, LibraryHeader, MemberDecl};

// =============================================================================
// Modules
// =============================================================================

/// A parsed library module, tagged with the grammar it was read with
#[derive(Debug, Clone)]
pub struct LibraryModule {
    pub url: Url,
    pub grammar: GrammarVersion,
    pub header: LibraryHeader,
    pub imports: Vec<ImportDecl>,
    /// Include file hints
    pub includes: Vec<String>,
    pub contexts: Vec<ContextDecl>,
    pub members: Vec<MemberDecl>,
}

impl LibraryModule {
    /// Every (namespace, hints) pair this module depends on
    pub fn dependencies(&self) -> Vec<(Option<&str>, &[String])> {
        let mut deps: Vec<(Option<&str>, &[String])> = self
            .imports
            .iter()
            .map(|i| (i.namespace.as_deref(), i.file_hints.as_slice()))
            .collect();
        if !self.includes.is_empty() {
            deps.push((self.header.namespace.as_deref(), self.includes.as_slice()));
        }
        deps
    }
}

/// An input to load: originating URL plus an optional open stream
pub struct ModuleSource {
    pub url: Url,
    pub stream: Option<Box<dyn Read + Send>>,
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSource")
            .field("url", &self.url.as_str())
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl ModuleSource {
    /// Open a URL; only `file:` URLs can be opened
    pub fn open(url: Url) -> Self {
        let stream = url
            .to_file_path()
            .ok()
            .and_then(|path| File::open(path).ok())
            .map(|f| Box::new(f) as Box<dyn Read + Send>);
        Self { url, stream }
    }

    pub fn from_bytes(url: Url, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            stream: Some(Box::new(Cursor::new(bytes.into()))),
        }
    }

    pub fn unopened(url: Url) -> Self {
        Self { url, stream: None }
    }
}

/// Outcome of loading one source
#[derive(Debug)]
pub struct LoadResult {
    pub url: Url,
    pub module: Option<LibraryModule>,
    pub findings: Findings,
}

// =============================================================================
// Loader
// =============================================================================

/// Severity of the finding raised when a library loads only without validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackSeverity {
    #[default]
    Warning,
    Error,
}

impl From<FallbackSeverity> for Severity {
    fn from(value: FallbackSeverity) -> Self {
        match value {
            FallbackSeverity::Warning => Severity::Warning,
            FallbackSeverity::Error => Severity::Error,
        }
    }
}

#[derive(Debug)]
pub struct ModuleLoader {
    grammars: Vec<CompiledGrammar>,
    fallback: FallbackSeverity,
}

impl ModuleLoader {
    /// Loader over every supported grammar
    pub fn new() -> Result<Self> {
        Self::with_grammars(&GrammarVersion::ALL)
    }

    /// Loader over a grammar priority list, most specific first
    pub fn with_grammars(priority: &[GrammarVersion]) -> Result<Self> {
        let grammars = priority
            .iter()
            .map(|v| CompiledGrammar::compile(*v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            grammars,
            fallback: FallbackSeverity::default(),
        })
    }

    pub fn with_fallback_severity(mut self, fallback: FallbackSeverity) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn grammars(&self) -> impl Iterator<Item = GrammarVersion> + '_ {
        self.grammars.iter().map(|g| g.version)
    }

    /// Load a single source
    pub fn load(&self, source: ModuleSource) -> LoadResult {
        let url = source.url;
        let mut findings = Findings::new();

        let Some(mut stream) = source.stream else {
            warn!(url = %url, "Library source could not be opened");
            findings.report(url.as_str(), FindingCode::LibraryNotFound, vec![url.to_string()]);
            return LoadResult { url, module: None, findings };
        };

        let mut bytes = Vec::new();
        if let Err(e) = stream.read_to_end(&mut bytes) {
            warn!(url = %url, error = %e, "Library source could not be read");
            findings.report(url.as_str(), FindingCode::LibraryNotFound, vec![url.to_string()]);
            return LoadResult { url, module: None, findings };
        }

        let module = self.load_bytes(&url, &bytes, &mut findings);
        LoadResult { url, module, findings }
    }

    /// Load many sources in parallel; results keep input order
    pub fn load_all(&self, sources: Vec<ModuleSource>) -> Vec<LoadResult> {
        sources.into_par_iter().map(|s| self.load(s)).collect()
    }

    fn load_bytes(&self, url: &Url, bytes: &[u8], sink: &mut dyn FindingsSink) -> Option<LibraryModule> {
        let first = self.grammars.first().map(|g| g.version.label()).unwrap_or("?");

        let document: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(e) => {
                sink.report(
                    url.as_str(),
                    FindingCode::UnreadableLibraryContent,
                    vec![first.to_string(), e.to_string()],
                );
                return None;
            }
        };

        let mut first_error: Option<String> = None;

        for grammar in &self.grammars {
            let version = grammar.version;
            if !version.claims(&document) {
                first_error.get_or_insert_with(|| {
                    format!("document root is not a {} library", version.label())
                });
                continue;
            }

            let strict = grammar.validate(&document);
            match (version.parse_lenient(url, &document), strict) {
                (Ok(module), Ok(())) => {
                    debug!(url = %url, grammar = %version, "Library loaded");
                    return Some(module);
                }
                (Ok(module), Err(violations)) => {
                    warn!(url = %url, grammar = %version, "Library loaded without validation");
                    sink.add(
                        self.fallback.into(),
                        url.as_str(),
                        FindingCode::CorruptLibraryContent,
                        vec![
                            version.label().to_string(),
                            violations.into_iter().next().unwrap_or_default(),
                        ],
                    );
                    return Some(module);
                }
                (Err(e), _) => {
                    debug!(url = %url, grammar = %version, error = %e, "Grammar did not match");
                    first_error.get_or_insert(e);
                }
            }
        }

        sink.report(
            url.as_str(),
            FindingCode::UnreadableLibraryContent,
            vec![first.to_string(), first_error.unwrap_or_default()],
        );
        None
    }
}
