//! XML Schema generation
//!
//! Two passes:
//! - `emit`: one in-memory document per in-scope library, built from the
//!   registered per-kind transformers, in dependency order
//! - `consolidate`: resolves every cross-document reference into an
//!   include (same namespace) or import (other namespace), merges multi-file
//!   namespaces behind an import consolidation document, assigns prefixes
//!   once for the whole run and serializes everything
//!
//! Chameleon libraries produce a document without a target namespace that
//! every host document includes.

pub mod model;
pub mod transform;
pub mod writer;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use self::model::{Schema, XsdDocument};
use super::context::GenerationContext;
use super::{names, OutputFile, TargetFormat};
use crate::error::Result;
use crate::model::builtins::{self, BUILT_INS_DIR, OTM_COMMON_NAMESPACE, XSD_NAMESPACE};
use crate::model::Library;

/// Build the schema document of every in-scope library
pub fn emit(ctx: &GenerationContext) -> Result<Vec<XsdDocument>> {
    let mut documents = Vec::new();

    for library_id in ctx.library_order() {
        ctx.check_cancelled()?;
        let Some(library) = ctx.model().library(*library_id) else {
            continue;
        };
        let Some(path) = ctx.library_file(library, TargetFormat::XmlSchema) else {
            continue;
        };

        let mut schema = Schema {
            target_namespace: ctx.library_namespace(library),
            version: Some(library.version.clone()),
            documentation: library.documentation.clone(),
            ..Schema::default()
        };
        for entity in ctx.emitted_entities(*library_id) {
            let transform = ctx.registry().xsd(entity.kind())?;
            schema.components.extend(transform(ctx, entity)?);
        }

        debug!(library = %library.name, components = schema.components.len(), "Emitted schema");
        documents.push(XsdDocument {
            path,
            library: Some(library.id),
            hosts: library_hosts(ctx, library),
            schema,
            service: false,
        });
    }

    Ok(documents)
}

/// Output namespaces a chameleon library's documents are included into
pub(crate) fn library_hosts(ctx: &GenerationContext, library: &Library) -> Vec<String> {
    if !library.is_chameleon() {
        return Vec::new();
    }
    ctx.symbols()
        .chameleon_hosts(library.id)
        .iter()
        .map(|host| ctx.output_namespace(host))
        .collect()
}

/// Resolve references, consolidate imports and serialize every document
pub fn consolidate(ctx: &GenerationContext, mut documents: Vec<XsdDocument>) -> Result<Vec<OutputFile>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let locator = Locator::new(ctx, &documents);
    for document in &mut documents {
        locator.link(document);
    }

    let preferred = preferred_prefixes(ctx);
    let mut namespaces: BTreeSet<String> = BTreeSet::new();
    for document in &documents {
        namespaces.extend(document.schema.namespaces().into_iter().map(str::to_string));
        namespaces.extend(document.hosts.iter().cloned());
    }
    let prefixes = assign_prefixes(&namespaces, &preferred);

    let consolidated = consolidate_imports(&mut documents, &prefixes);

    let mut files = Vec::with_capacity(documents.len() + consolidated.len() + 1);
    for document in documents.iter().chain(consolidated.iter()) {
        files.push(OutputFile {
            path: document.path.clone().into(),
            format: if document.service {
                TargetFormat::ServiceSchema
            } else {
                TargetFormat::XmlSchema
            },
            contents: writer::write_schema(&document.schema, &prefixes)?,
        });
    }

    let needs_common = documents
        .iter()
        .any(|d| d.schema.imports.iter().any(|i| i.namespace == OTM_COMMON_NAMESPACE));
    if needs_common {
        if let Some(common) = builtins::schema_for(OTM_COMMON_NAMESPACE) {
            files.push(OutputFile {
                path: format!("{}/{}", BUILT_INS_DIR, common.file_name).into(),
                format: TargetFormat::XmlSchema,
                contents: common.contents.to_vec(),
            });
        }
    }

    Ok(files)
}

// =============================================================================
// Reference Resolution
// =============================================================================

/// Finds the document declaring a (namespace, name) pair
struct Locator {
    components: HashMap<(String, String), String>,
    /// Namespaces published by a single hand-written document
    fixed: HashMap<String, String>,
}

impl Locator {
    fn new(ctx: &GenerationContext, documents: &[XsdDocument]) -> Self {
        let mut components = HashMap::new();
        for document in documents {
            let namespaces: Vec<&String> = match &document.schema.target_namespace {
                Some(ns) => vec![ns],
                None => document.hosts.iter().collect(),
            };
            for ns in namespaces {
                for component in &document.schema.components {
                    components
                        .entry((ns.clone(), component.name().to_string()))
                        .or_insert_with(|| document.path.clone());
                }
            }
        }

        let fixed = ctx
            .model()
            .libraries()
            .filter(|l| l.built_in)
            .filter_map(|l| {
                let ns = l.namespace.clone()?;
                let file = ctx.library_file(l, TargetFormat::XmlSchema)?;
                Some((ns, file))
            })
            .collect();

        Self { components, fixed }
    }

    fn location(&self, namespace: &str, local: &str) -> Option<&str> {
        self.components
            .get(&(namespace.to_string(), local.to_string()))
            .or_else(|| self.fixed.get(namespace))
            .map(String::as_str)
    }

    /// Add the includes and imports a document's references need
    fn link(&self, document: &mut XsdDocument) {
        let own: HashSet<&str> = match &document.schema.target_namespace {
            Some(ns) => HashSet::from([ns.as_str()]),
            None => document.hosts.iter().map(String::as_str).collect(),
        };

        let mut includes = Vec::new();
        let mut imports = Vec::new();
        for name in document.schema.references() {
            let Some(ns) = name.namespace.as_deref() else {
                continue;
            };
            if ns == XSD_NAMESPACE {
                continue;
            }
            let location = self.location(ns, &name.local);
            if own.contains(ns) {
                if let Some(location) = location.filter(|l| *l != document.path) {
                    includes.push(location.to_string());
                }
            } else {
                imports.push((ns.to_string(), location.map(str::to_string)));
            }
        }

        for location in includes {
            document.schema.add_include(&location);
        }
        for (ns, location) in imports {
            document.schema.add_import(&ns, location.as_deref());
        }
        document.schema.includes.sort();
        document
            .schema
            .imports
            .sort_by(|a, b| (&a.namespace, &a.location).cmp(&(&b.namespace, &b.location)));
    }
}

// =============================================================================
// Import Consolidation
// =============================================================================

/// Redirect imports of namespaces spread over several files
///
/// When the documents of a run import one namespace from more than one
/// location, a `{prefix}_ImportConsolidation.xsd` document including all of
/// them is created and every import of that namespace points at it instead.
fn consolidate_imports(
    documents: &mut [XsdDocument],
    prefixes: &BTreeMap<String, String>,
) -> Vec<XsdDocument> {
    let mut locations: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for document in documents.iter() {
        for import in &document.schema.imports {
            if let Some(location) = &import.location {
                locations
                    .entry(import.namespace.clone())
                    .or_default()
                    .insert(location.clone());
            }
        }
    }

    let mut consolidated = Vec::new();
    for (ns, files) in locations.into_iter().filter(|(_, files)| files.len() > 1) {
        let prefix = prefixes.get(&ns).map(String::as_str).unwrap_or("ns");
        let path = names::consolidation_file_name(prefix);
        debug!(namespace = %ns, files = files.len(), path = %path, "Consolidating imports");

        for document in documents.iter_mut() {
            if !document.schema.imports.iter().any(|i| i.namespace == ns) {
                continue;
            }
            document.schema.imports.retain(|i| i.namespace != ns);
            document.schema.add_import(&ns, Some(&path));
            document.schema.imports.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        }

        consolidated.push(XsdDocument {
            path,
            library: None,
            hosts: Vec::new(),
            schema: Schema {
                target_namespace: Some(ns),
                includes: files.into_iter().collect(),
                ..Schema::default()
            },
            service: false,
        });
    }
    consolidated
}

// =============================================================================
// Prefixes
// =============================================================================

/// Declared prefix of every library, keyed by output namespace
fn preferred_prefixes(ctx: &GenerationContext) -> HashMap<String, String> {
    let mut preferred = HashMap::new();
    for library in ctx.model().libraries() {
        let (Some(ns), Some(prefix)) = (ctx.library_namespace(library), library.prefix.clone()) else {
            continue;
        };
        preferred.entry(ns).or_insert(prefix);
    }
    preferred
}

/// One prefix per namespace for the whole run
///
/// `xsd` is reserved for XML Schema. A namespace keeps its library's prefix
/// unless an earlier namespace took it, in which case a number is appended.
fn assign_prefixes(
    namespaces: &BTreeSet<String>,
    preferred: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let mut assigned = BTreeMap::from([(XSD_NAMESPACE.to_string(), "xsd".to_string())]);
    let mut used: HashSet<String> = HashSet::from(["xsd".to_string(), "xml".to_string()]);

    for ns in namespaces {
        if assigned.contains_key(ns) {
            continue;
        }
        let base = preferred.get(ns).cloned().unwrap_or_else(|| "ns".to_string());
        let mut prefix = base.clone();
        let mut n = 1;
        while used.contains(&prefix) {
            prefix = format!("{}{}", base, n);
            n += 1;
        }
        used.insert(prefix.clone());
        assigned.insert(ns.clone(), prefix);
    }
    assigned
}
