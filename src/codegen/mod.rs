//! Code Generation
//!
//! Turns an assembled model into XML Schema, JSON Schema, OpenAPI/Swagger and
//! service schema documents.
//!
//! Architecture:
//! - GenerationContext: per-run view of the model, the filter and the options,
//!   with memo caches for derived facet data
//! - TransformerRegistry: (entity kind, target format) -> transformer function
//! - Format generators: build documents for every in-scope library, resource
//!   or service; XML documents get their imports consolidated before writing
//!
//! A run moves through INIT -> FILTERING -> EMITTING -> CONSOLIDATING-IMPORTS
//! -> DONE, or ends in FAILED on an unrecoverable error.

pub mod context;
pub mod json_schema;
pub mod manifest;
pub mod names;
pub mod openapi;
pub mod registry;
pub mod service;
pub mod xsd;

pub use context::GenerationContext;
pub use manifest::GenerationManifest;
pub use registry::{Transformer, TransformerRegistry};

use petgraph::algo::condensation;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CompilerError, Result};
use crate::filter::{self, CodeGenerationFilter, FilterBuilder};
use crate::model::{EntityId, LibraryId, Model};

// =============================================================================
// Formats and Options
// =============================================================================

/// Output format a transformer targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFormat {
    XmlSchema,
    ServiceSchema,
    JsonSchema,
    #[serde(rename = "openapi")]
    OpenApi,
    Swagger,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XmlSchema => "xml_schema",
            Self::ServiceSchema => "service_schema",
            Self::JsonSchema => "json_schema",
            Self::OpenApi => "openapi",
            Self::Swagger => "swagger",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which output formats a request asks for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSelection {
    pub schemas: bool,
    pub json_schemas: bool,
    pub services: bool,
    pub swagger: bool,
    pub openapi: bool,
    /// Accepted for compatibility; nothing is generated for it
    pub html_docs: bool,
}

impl FormatSelection {
    /// Selected formats in emit order
    pub fn targets(&self) -> Vec<TargetFormat> {
        [
            (self.schemas, TargetFormat::XmlSchema),
            (self.services, TargetFormat::ServiceSchema),
            (self.json_schemas, TargetFormat::JsonSchema),
            (self.openapi, TargetFormat::OpenApi),
            (self.swagger, TargetFormat::Swagger),
        ]
        .into_iter()
        .filter_map(|(on, format)| on.then_some(format))
        .collect()
    }
}

/// Namespace written into generated documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespacePolicy {
    /// The library namespace as declared
    #[default]
    Full,
    /// The major-version namespace of the library (`.../v01`)
    Major,
}

/// Options of one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub output_dir: PathBuf,
    pub formats: FormatSelection,
    pub service_endpoint_url: Option<String>,
    pub resource_base_url: Option<String>,
    pub suppress_extensions: bool,
    /// Per-format file name templates (`{library}`, `{version}`)
    pub filename_overrides: BTreeMap<TargetFormat, String>,
    pub namespace_policy: NamespacePolicy,
}

impl GenerationOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            formats: FormatSelection {
                schemas: true,
                ..FormatSelection::default()
            },
            service_endpoint_url: None,
            resource_base_url: None,
            suppress_extensions: false,
            filename_overrides: BTreeMap::new(),
            namespace_policy: NamespacePolicy::default(),
        }
    }

    /// Check the options against the model before anything is generated
    pub fn validate(&self, model: &Model) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(CompilerError::InvalidOptions("output directory is required".into()));
        }
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(CompilerError::InvalidOptions(format!(
                "{} is not a directory",
                self.output_dir.display()
            )));
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            CompilerError::InvalidOptions(format!(
                "cannot create {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        if self.formats.targets().is_empty() {
            return Err(CompilerError::InvalidOptions("no output format selected".into()));
        }

        for (name, url) in [
            ("service endpoint URL", &self.service_endpoint_url),
            ("resource base URL", &self.resource_base_url),
        ] {
            if let Some(url) = url {
                Url::parse(url).map_err(|e| {
                    CompilerError::InvalidOptions(format!("invalid {} '{}': {}", name, url, e))
                })?;
            }
        }

        if self.namespace_policy == NamespacePolicy::Major {
            let scheme = model.version_scheme();
            for library in model.user_libraries() {
                if let Some(ns) = &library.namespace {
                    scheme.major_version_namespace(ns).map_err(|e| {
                        CompilerError::InvalidOptions(format!(
                            "library {} cannot use the major namespace policy: {}",
                            library.name, e
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Run State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Init,
    Filtering,
    Emitting,
    ConsolidatingImports,
    Done,
    Failed,
}

/// Cooperative cancellation, checked at every library boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A generated document, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub format: TargetFormat,
    pub contents: Vec<u8>,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Every file written, including the manifest and checksum files
    pub files: Vec<PathBuf>,
    pub manifest: GenerationManifest,
}

// =============================================================================
// Generator
// =============================================================================

/// Runs generation requests against one model
pub struct CodeGenerator<'a> {
    model: &'a Model,
    registry: TransformerRegistry,
    global_filter: Option<CodeGenerationFilter>,
    cancellation: Option<CancellationToken>,
    state: GenerationState,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            registry: TransformerRegistry::standard(),
            global_filter: None,
            cancellation: None,
            state: GenerationState::Init,
        }
    }

    pub fn with_registry(mut self, registry: TransformerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_global_filter(mut self, filter: CodeGenerationFilter) -> Self {
        self.global_filter = Some(filter);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Generate everything reachable from `roots`
    ///
    /// With no roots every user library is generated in full.
    pub fn generate(&mut self, roots: &[EntityId], options: &GenerationOptions) -> Result<GenerationReport> {
        self.state = GenerationState::Init;
        let result = self.run(roots, options);
        match &result {
            Ok(report) => {
                self.transition(GenerationState::Done);
                info!(files = report.files.len(), "Generation complete");
            }
            Err(e) => {
                self.transition(GenerationState::Failed);
                warn!(error = %e, "Generation failed");
            }
        }
        result
    }

    fn transition(&mut self, next: GenerationState) {
        debug!(from = ?self.state, to = ?next, "Generation state");
        self.state = next;
    }

    fn run(&mut self, roots: &[EntityId], options: &GenerationOptions) -> Result<GenerationReport> {
        options.validate(self.model)?;
        if options.formats.html_docs {
            warn!("HTML documentation is not supported and will not be generated");
        }

        self.transition(GenerationState::Filtering);
        let filter = self.build_filter(roots)?;
        let order = emit_order(self.model, &filter);

        // The context outlives the state transitions below
        let registry = self.registry.clone();
        let cancellation = self.cancellation.clone();
        let ctx = GenerationContext::new(
            self.model,
            filter,
            options,
            &registry,
            order,
            cancellation.as_ref(),
        );

        self.transition(GenerationState::Emitting);
        let mut files = Vec::new();
        let mut schemas = Vec::new();
        for format in options.formats.targets() {
            info!(format = %format, "Emitting documents");
            match format {
                TargetFormat::XmlSchema => schemas.extend(xsd::emit(&ctx)?),
                TargetFormat::ServiceSchema => schemas.extend(service::emit(&ctx)?),
                TargetFormat::JsonSchema => files.extend(json_schema::emit(&ctx)?),
                TargetFormat::OpenApi | TargetFormat::Swagger => {
                    files.extend(openapi::emit(&ctx, format)?)
                }
            }
        }

        self.transition(GenerationState::ConsolidatingImports);
        files.extend(xsd::consolidate(&ctx, schemas)?);

        let mut written = write_files(&options.output_dir, &files)?;
        let manifest = GenerationManifest::new(&options.formats.targets(), &files);
        written.extend(manifest.write(&options.output_dir)?);

        Ok(GenerationReport {
            files: written,
            manifest,
        })
    }

    fn build_filter(&self, roots: &[EntityId]) -> Result<CodeGenerationFilter> {
        for root in roots {
            if self.model.entity(*root).is_none() {
                return Err(CompilerError::UnknownEntity(root.to_string()));
            }
        }

        let mut builder = FilterBuilder::new(self.model);
        if roots.is_empty() {
            let libraries: Vec<LibraryId> = self.model.user_libraries().map(|l| l.id).collect();
            builder = builder.for_libraries(&libraries);
        } else {
            builder = builder.roots(roots.iter().copied());
        }
        if let Some(global) = &self.global_filter {
            builder = builder.with_global(global.clone());
        }
        Ok(builder.build())
    }
}

/// Write files under the output directory, returning their full paths
fn write_files(output_dir: &Path, files: &[OutputFile]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = output_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompilerError::output(parent, e))?;
        }
        std::fs::write(&path, &file.contents).map_err(|e| CompilerError::output(&path, e))?;
        debug!(path = %path.display(), format = %file.format, "Wrote file");
        written.push(path);
    }
    Ok(written)
}

// =============================================================================
// Emit Order
// =============================================================================

/// In-scope user libraries, dependencies first, ties broken by name
///
/// Libraries that depend on each other are condensed into one group and
/// emitted together in name order.
pub fn emit_order(model: &Model, filter: &CodeGenerationFilter) -> Vec<LibraryId> {
    let libraries: Vec<LibraryId> = filter
        .libraries()
        .filter(|id| model.library(*id).map(|l| !l.built_in).unwrap_or(false))
        .collect();

    let mut graph: DiGraph<LibraryId, ()> = DiGraph::new();
    let index: HashMap<LibraryId, NodeIndex> = libraries
        .iter()
        .map(|id| (*id, graph.add_node(*id)))
        .collect();

    for id in &libraries {
        for entity in model.library_entities(*id) {
            for dep in filter::dependencies(model, entity.id) {
                let Some(dep_library) = model.entity(dep).map(|e| e.library) else {
                    continue;
                };
                if dep_library == *id {
                    continue;
                }
                if let (Some(from), Some(to)) = (index.get(id), index.get(&dep_library)) {
                    graph.update_edge(*from, *to, ());
                }
            }
        }
    }

    let sort_key = |id: &LibraryId| {
        model
            .library(*id)
            .map(|l| (l.name.clone(), l.namespace.clone().unwrap_or_default()))
            .unwrap_or_default()
    };

    let mut condensed = condensation(graph, true);
    for group in condensed.node_weights_mut() {
        group.sort_by_key(sort_key);
    }

    let mut pending: HashMap<NodeIndex, usize> = condensed
        .node_indices()
        .map(|n| (n, condensed.edges_directed(n, Direction::Outgoing).count()))
        .collect();
    let group_key = |n: NodeIndex| condensed[n].first().map(sort_key).unwrap_or_default();

    let mut ready: BTreeSet<((String, String), NodeIndex)> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(n, _)| (group_key(*n), *n))
        .collect();

    let mut order = Vec::with_capacity(libraries.len());
    while let Some((_, node)) = ready.pop_first() {
        order.extend(condensed[node].iter().copied());

        for edge in condensed.edges_directed(node, Direction::Incoming) {
            let dependent = edge.source();
            if let Some(count) = pending.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert((group_key(dependent), dependent));
                }
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{GrammarVersion, LibraryModule};
    use crate::model::{Assembly, ImportDecl, LibraryHeader, MemberDecl};
    use crate::version::OtmVersionScheme;

    #[test]
    fn test_format_selection_targets() {
        let selection = FormatSelection {
            schemas: true,
            openapi: true,
            html_docs: true,
            ..FormatSelection::default()
        };
        assert_eq!(
            selection.targets(),
            vec![TargetFormat::XmlSchema, TargetFormat::OpenApi]
        );
        assert!(FormatSelection::default().targets().is_empty());
    }

    #[test]
    fn test_target_format_serde_names() {
        let json = serde_json::to_string(&TargetFormat::OpenApi).unwrap();
        assert_eq!(json, "\"openapi\"");
        let parsed: TargetFormat = serde_json::from_str("\"xml_schema\"").unwrap();
        assert_eq!(parsed, TargetFormat::XmlSchema);
    }

    #[test]
    fn test_validate_rejects_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = GenerationOptions::new(dir.path());
        options.formats = FormatSelection {
            html_docs: true,
            ..FormatSelection::default()
        };
        let err = options.validate(&Model::default()).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidOptions(_)));
    }

    #[test]
    fn test_validate_rejects_file_as_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, "x").unwrap();
        let options = GenerationOptions::new(&file);
        assert!(options.validate(&Model::default()).is_err());
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    fn library(name: &str, imports: &[(&str, &str)], members: serde_json::Value) -> LibraryModule {
        LibraryModule {
            url: Url::parse(&format!("file:///libs/{}.otm", name)).unwrap(),
            grammar: GrammarVersion::V01_06,
            header: LibraryHeader {
                name: name.into(),
                namespace: Some(format!("http://example.com/ns/{}/v01", name)),
                prefix: Some(name.to_lowercase()),
                version: Some("1.0.0".into()),
                ..LibraryHeader::default()
            },
            imports: imports
                .iter()
                .map(|(target, prefix)| ImportDecl {
                    namespace: Some(format!("http://example.com/ns/{}/v01", target)),
                    prefix: Some(prefix.to_string()),
                    file_hints: vec![format!("{}.otm", target)],
                })
                .collect(),
            includes: Vec::new(),
            contexts: Vec::new(),
            members: serde_json::from_value::<Vec<MemberDecl>>(members).unwrap(),
        }
    }

    fn core_using(name: &str, type_ref: &str) -> serde_json::Value {
        serde_json::json!({
            "kind": "coreObject", "name": name,
            "summary": { "elements": [{ "name": "Value", "type": type_ref }] }
        })
    }

    #[test]
    fn test_emit_order_dependencies_first_then_by_name() {
        let modules = vec![
            library("Apex", &[("Mid", "m")], serde_json::json!([core_using("Top", "m:Code")])),
            library("Mid", &[], serde_json::json!([
                { "kind": "simpleType", "name": "Code", "base": "xsd:string" }
            ])),
            library("Alpha", &[], serde_json::json!([
                { "kind": "simpleType", "name": "Letter", "base": "xsd:string" }
            ])),
            library("Pong", &[("Ping", "pi")], serde_json::json!([
                { "kind": "simpleType", "name": "PongCode", "base": "xsd:string" },
                core_using("PongObject", "pi:PingCode")
            ])),
            library("Ping", &[("Pong", "po")], serde_json::json!([
                { "kind": "simpleType", "name": "PingCode", "base": "xsd:string" },
                core_using("PingObject", "po:PongCode")
            ])),
        ];
        let assembly = Assembly::from_modules(modules, Arc::new(OtmVersionScheme::new())).unwrap();
        assert!(!assembly.findings.has_errors(), "{}", assembly.findings);
        let model = assembly.model;

        let order: Vec<String> = emit_order(&model, &CodeGenerationFilter::everything(&model))
            .into_iter()
            .map(|id| model.library(id).unwrap().name.clone())
            .collect();
        assert_eq!(order, vec!["Alpha", "Mid", "Apex", "Ping", "Pong"]);
    }
}
