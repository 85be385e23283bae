//! Model Assembly
//!
//! Turns loaded library modules into a [`Model`]: built-in libraries first,
//! then user modules in input order. After libraries are added the symbol
//! table is (re)built and every type reference is bound in the context of
//! its declaring library.

use std::sync::Arc;
use tracing::{debug, info};

use super::builtins::{self, XSD_NAMESPACE};
use super::entity::EntityBody;
use super::facet;
use super::symbols::{Symbol, SymbolTable};
use super::{EntityId, Library, LibraryId, Model};
use crate::diagnostics::{FindingCode, Findings, FindingsSink};
use crate::error::Result;
use crate::loader::LibraryModule;
use crate::version::VersionScheme;

/// An assembled model with the findings raised while building it
#[derive(Debug)]
pub struct Assembly {
    pub model: Model,
    pub findings: Findings,
}

impl Assembly {
    /// Assemble user modules on top of the standard built-in libraries
    pub fn from_modules(modules: Vec<LibraryModule>, scheme: Arc<dyn VersionScheme>) -> Result<Self> {
        Ok(assemble(modules, builtins::standard_modules()?, scheme))
    }
}

/// Assemble modules and built-ins into a model with a bound symbol table
pub fn assemble(
    modules: Vec<LibraryModule>,
    built_ins: Vec<LibraryModule>,
    scheme: Arc<dyn VersionScheme>,
) -> Assembly {
    let mut model = Model::new(scheme);
    let mut findings = Findings::new();

    for module in built_ins {
        add_module(&mut model, module, true, &mut findings);
    }
    for module in modules {
        add_module(&mut model, module, false, &mut findings);
    }

    model.refresh(&mut findings);

    info!(
        libraries = model.libraries().count(),
        entities = model.entities().count(),
        errors = findings.error_count(),
        "Model assembled"
    );

    Assembly { model, findings }
}

/// Add one loaded module as a library
pub fn add_module(
    model: &mut Model,
    module: LibraryModule,
    built_in: bool,
    sink: &mut dyn FindingsSink,
) -> Option<LibraryId> {
    let header = module.header;
    let version = match (&header.version, &header.namespace) {
        (Some(version), _) => version.clone(),
        (None, Some(ns)) => model.version_scheme().version_identifier(ns).unwrap_or_default(),
        (None, None) => String::new(),
    };

    if !built_in {
        if let Some(ns) = &header.namespace {
            if let Err(e) = model.version_scheme().decompose(ns) {
                sink.report(
                    module.url.as_str(),
                    FindingCode::InvalidVersionNamespace,
                    vec![ns.clone(), e.to_string()],
                );
            }
        }
    }

    debug!(library = %header.name, url = %module.url, "Adding library");

    let library = Library {
        id: LibraryId(0),
        name: header.name,
        namespace: header.namespace,
        prefix: header.prefix,
        version,
        status: header.status,
        documentation: header.documentation,
        url: Some(module.url),
        grammar: Some(module.grammar),
        built_in,
        imports: module.imports,
        includes: module.includes,
        contexts: module.contexts,
        members: Vec::new(),
    };

    model.add_library(library, module.members, sink)
}

impl Model {
    /// Rebuild the symbol table and rebind every reference
    pub fn refresh(&mut self, sink: &mut dyn FindingsSink) {
        let table = SymbolTable::build(self, sink);
        self.set_symbols(table);

        resolve_references(self, sink);

        let mut table = self.take_symbols();
        table.index_contextual_facets(self);
        self.set_symbols(table);

        let ghosts = SymbolTable::register_ghosts(self);
        let mut table = self.take_symbols();
        table.insert_derived(ghosts);
        self.set_symbols(table);

        check_structure(self, sink);
    }
}

// =============================================================================
// Reference Resolution
// =============================================================================

/// Bind every type reference of every entity
fn resolve_references(model: &mut Model, sink: &mut dyn FindingsSink) {
    for id in model.entity_ids() {
        let bindings = bind_entity(model, id, sink);
        if let Some(entity) = model.entity_mut(id) {
            for (type_ref, target) in entity.body.type_refs_mut().into_iter().zip(bindings) {
                type_ref.target = target;
            }
        }
    }
}

fn bind_entity(model: &Model, id: EntityId, sink: &mut dyn FindingsSink) -> Vec<Option<Symbol>> {
    let (Some(entity), Some(library)) = (model.entity(id), model.owner(id)) else {
        return Vec::new();
    };
    let symbols = model.symbols();
    let own_namespaces = symbols.effective_namespaces(model, id);

    entity
        .body
        .type_refs()
        .into_iter()
        .map(|type_ref| {
            let (prefix, local) = type_ref.parts();
            let candidates: Vec<String> = match prefix {
                Some(prefix) => library
                    .namespace_for_prefix(prefix)
                    .or_else(|| symbols.namespace_for_prefix(prefix))
                    .map(|ns| vec![ns.to_string()])
                    .unwrap_or_default(),
                None => own_namespaces
                    .iter()
                    .cloned()
                    .chain(std::iter::once(XSD_NAMESPACE.to_string()))
                    .collect(),
            };

            let found = candidates
                .iter()
                .find_map(|ns| symbols.lookup(ns, local))
                .or_else(|| {
                    // Chameleon libraries see their own members even when unhosted
                    library
                        .is_chameleon()
                        .then(|| {
                            model
                                .library_entities(library.id)
                                .find(|e| e.name == local)
                                .map(|e| Symbol::Entity(e.id))
                        })
                        .flatten()
                });

            if found.is_none() {
                let mut args = vec![type_ref.name.clone()];
                let ambiguous = candidates.iter().any(|ns| symbols.is_ambiguous(ns, local));
                if !ambiguous {
                    if let Some(suggestion) = candidates.iter().find_map(|ns| symbols.suggest(ns, local)) {
                        args.push(suggestion);
                    }
                }
                sink.report(
                    &format!("{}:{}", library.name, entity.name),
                    FindingCode::UnresolvedReference,
                    args,
                );
            }
            found
        })
        .collect()
}

// =============================================================================
// Structural Checks
// =============================================================================

fn check_structure(model: &Model, sink: &mut dyn FindingsSink) {
    for entity in model.entities() {
        let source = || {
            let library = model.owner(entity.id).map(|l| l.name.as_str()).unwrap_or("?");
            format!("{}:{}", library, entity.name)
        };

        if entity.body.extension().is_some() && facet::has_circular_extension(model, entity.id) {
            sink.report(&source(), FindingCode::CircularExtension, vec![entity.name.clone()]);
        }

        if let EntityBody::ContextualFacet(cf) = &entity.body {
            let owner_ok = cf
                .owner
                .entity()
                .and_then(|owner| model.entity(owner))
                .map(|owner| owner.kind().is_object() || owner.kind() == entity.kind());
            if owner_ok == Some(false) {
                sink.report(
                    &source(),
                    FindingCode::InvalidFacetOwner,
                    vec![cf.owner.name.clone(), entity.name.clone()],
                );
            }
        }
    }
}
