//! Dependency Filter
//!
//! Computes the transitive closure of everything a set of root entities
//! needs in order to be emitted. The traversal follows:
//! - type references (attributes, elements, payloads, value types, owners)
//! - extension edges (including facets named by extension-point facets)
//! - alias and facet symbols, through the entity that owns them
//! - contextual facets attached to a reachable object
//! - ghost facets, through the supertype facet they are derived from
//!
//! A library is in scope when it owns a reachable entity, or when its schema
//! is pulled in as an extended document: the owner of a facet extended by a
//! reachable extension-point facet, or a chameleon library included by a
//! library in scope. Filters are immutable once built.

use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::model::facet::ghost_facets;
use crate::model::{EntityBody, EntityId, LibraryId, Model, Symbol};

// =============================================================================
// Filter
// =============================================================================

/// Inclusion predicate for code generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeGenerationFilter {
    libraries: BTreeSet<LibraryId>,
    entities: BTreeSet<EntityId>,
    extended_libraries: BTreeSet<LibraryId>,
}

impl CodeGenerationFilter {
    /// Filter accepting every library and entity in the model
    pub fn everything(model: &Model) -> Self {
        Self {
            libraries: model.libraries().map(|l| l.id).collect(),
            entities: model.entities().map(|e| e.id).collect(),
            extended_libraries: BTreeSet::new(),
        }
    }

    pub fn process_library(&self, id: LibraryId) -> bool {
        self.libraries.contains(&id)
    }

    pub fn process_entity(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    /// Whether a library is in scope as an extended or included document
    pub fn process_extended_library(&self, id: LibraryId) -> bool {
        self.extended_libraries.contains(&id)
    }

    pub fn libraries(&self) -> impl Iterator<Item = LibraryId> + '_ {
        self.libraries.iter().copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty() && self.entities.is_empty()
    }

    /// Logical AND of two filters
    pub fn and(&self, other: &Self) -> Self {
        Self {
            libraries: self.libraries.intersection(&other.libraries).copied().collect(),
            entities: self.entities.intersection(&other.entities).copied().collect(),
            extended_libraries: self
                .extended_libraries
                .intersection(&other.extended_libraries)
                .copied()
                .collect(),
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`CodeGenerationFilter`] from root entities
#[derive(Debug)]
pub struct FilterBuilder<'a> {
    model: &'a Model,
    roots: Vec<EntityId>,
    global: Option<CodeGenerationFilter>,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            roots: Vec::new(),
            global: None,
        }
    }

    pub fn root(mut self, id: EntityId) -> Self {
        self.roots.push(id);
        self
    }

    pub fn roots(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.roots.extend(ids);
        self
    }

    /// Seed the roots with every member of the given libraries
    pub fn for_libraries(mut self, libraries: &[LibraryId]) -> Self {
        for library in libraries {
            self.roots
                .extend(self.model.library_entities(*library).map(|e| e.id));
        }
        self
    }

    /// Global filter combined by logical AND with the computed closure
    ///
    /// The roots and their libraries are always kept.
    pub fn with_global(mut self, filter: CodeGenerationFilter) -> Self {
        self.global = Some(filter);
        self
    }

    pub fn build(&self) -> CodeGenerationFilter {
        let entities = self.closure();

        let mut filter = CodeGenerationFilter::default();
        for id in &entities {
            if let Some(entity) = self.model.entity(*id) {
                filter.entities.insert(*id);
                filter.libraries.insert(entity.library);
            }
        }

        for id in &entities {
            if let Some(EntityBody::ExtensionPointFacet(ep)) = self.model.entity(*id).map(|e| &e.body) {
                if let Some(extended) = ep.extends.entity().and_then(|e| self.model.entity(e)) {
                    filter.extended_libraries.insert(extended.library);
                }
            }
        }

        let in_scope: Vec<LibraryId> = filter.libraries.iter().copied().collect();
        for library in self.model.libraries().filter(|l| l.is_chameleon()) {
            let hosts = self.model.symbols().chameleon_hosts(library.id);
            let included = in_scope.iter().any(|id| {
                self.model
                    .library(*id)
                    .and_then(|l| l.namespace.as_deref())
                    .map(|ns| hosts.iter().any(|h| h == ns))
                    .unwrap_or(false)
            });
            if included && !in_scope.contains(&library.id) {
                filter.extended_libraries.insert(library.id);
            }
        }
        filter.libraries.extend(filter.extended_libraries.iter().copied());

        let mut filter = match &self.global {
            Some(global) => filter.and(global),
            None => filter,
        };
        for root in &self.roots {
            if let Some(entity) = self.model.entity(*root) {
                filter.entities.insert(*root);
                filter.libraries.insert(entity.library);
            }
        }

        debug!(
            roots = self.roots.len(),
            entities = filter.entities.len(),
            libraries = filter.libraries.len(),
            "Built code generation filter"
        );
        filter
    }

    /// Every entity reachable from the roots, roots included
    fn closure(&self) -> HashSet<EntityId> {
        let mut visited = HashSet::new();
        let mut stack: Vec<EntityId> = self.roots.clone();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for next in dependencies(self.model, current) {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        visited
    }
}

/// Direct dependencies of one entity
pub fn dependencies(model: &Model, id: EntityId) -> Vec<EntityId> {
    let Some(entity) = model.entity(id) else {
        return Vec::new();
    };

    let mut deps = Vec::new();
    for type_ref in entity.body.type_refs() {
        match type_ref.target {
            Some(Symbol::Ghost { owner, source }) => {
                deps.push(owner);
                deps.push(source);
            }
            Some(symbol) => deps.push(symbol.entity()),
            None => {}
        }
    }

    if entity.kind().is_object() {
        deps.extend_from_slice(model.symbols().contextual_facets_of(id));
        deps.extend(ghost_facets(model, id).into_iter().map(|g| g.source));
    }

    deps.retain(|d| *d != id);
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{GrammarVersion, LibraryModule};
    use crate::model::{Assembly, ImportDecl, LibraryHeader, MemberDecl};
    use crate::version::OtmVersionScheme;
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    const BASE_NS: &str = "http://example.com/ns/Base/v01";

    fn module(name: &str, ns: &str, members: serde_json::Value) -> LibraryModule {
        LibraryModule {
            url: Url::parse(&format!("file:///libs/{}.otm", name)).unwrap(),
            grammar: GrammarVersion::V01_06,
            header: LibraryHeader {
                name: name.into(),
                namespace: Some(ns.into()),
                ..LibraryHeader::default()
            },
            imports: Vec::new(),
            includes: Vec::new(),
            contexts: Vec::new(),
            members: serde_json::from_value::<Vec<MemberDecl>>(members).unwrap(),
        }
    }

    fn model() -> Model {
        let base = module("Base", BASE_NS, json!([
            { "kind": "simpleType", "name": "Code", "base": "xsd:string" },
            { "kind": "businessObject", "name": "BaseOrder",
              "id": { "attributes": [{ "name": "code", "type": "Code" }] } },
            { "kind": "contextualFacet", "facetKind": "custom", "facetName": "Web", "owner": "BaseOrder" },
            { "kind": "simpleType", "name": "Unused", "base": "xsd:int" }
        ]));
        let mut orders = module("Orders", "http://example.com/ns/Orders/v01", json!([
            { "kind": "businessObject", "name": "Order", "extension": "b:BaseOrder" },
            { "kind": "simpleType", "name": "Lonely", "base": "xsd:int" }
        ]));
        orders.imports.push(ImportDecl {
            namespace: Some(BASE_NS.into()),
            prefix: Some("b".into()),
            file_hints: vec!["Base.otm".into()],
        });
        let other = module("Other", "http://example.com/ns/Other/v01", json!([
            { "kind": "simpleType", "name": "Thing", "base": "xsd:string" }
        ]));

        let assembly =
            Assembly::from_modules(vec![base, orders, other], Arc::new(OtmVersionScheme::new())).unwrap();
        assert!(!assembly.findings.has_errors(), "{}", assembly.findings);
        assembly.model
    }

    fn find(model: &Model, name: &str) -> EntityId {
        model.find_entity(name).unwrap()
    }

    #[test]
    fn test_closure_follows_extension_and_facets() {
        let model = model();
        let filter = FilterBuilder::new(&model).root(find(&model, "Order")).build();

        assert!(filter.process_entity(find(&model, "BaseOrder")));
        assert!(filter.process_entity(find(&model, "Code")));
        assert!(filter.process_entity(find(&model, "BaseOrder_Custom_Web")));
        assert!(!filter.process_entity(find(&model, "Unused")));
        assert!(!filter.process_entity(find(&model, "Lonely")));

        let base = model.entity(find(&model, "Code")).unwrap().library;
        assert!(filter.process_library(base));
    }

    #[test]
    fn test_unreachable_library_excluded() {
        let model = model();
        let filter = FilterBuilder::new(&model).root(find(&model, "Order")).build();
        let other = model.entity(find(&model, "Thing")).unwrap().library;
        assert!(!filter.process_library(other));
    }

    #[test]
    fn test_global_filter_keeps_roots() {
        let model = model();
        let order = find(&model, "Order");
        let filter = FilterBuilder::new(&model)
            .root(order)
            .with_global(CodeGenerationFilter::default())
            .build();

        assert!(filter.process_entity(order));
        assert!(filter.process_library(model.entity(order).unwrap().library));
        assert!(!filter.process_entity(find(&model, "BaseOrder")));
    }

    #[test]
    fn test_for_libraries_seeds_all_members() {
        let model = model();
        let orders = model.entity(find(&model, "Order")).unwrap().library;
        let filter = FilterBuilder::new(&model).for_libraries(&[orders]).build();
        assert!(filter.process_entity(find(&model, "Lonely")));
        assert!(filter.process_entity(find(&model, "BaseOrder")));
    }

    #[test]
    fn test_build_is_deterministic() {
        let model = model();
        let builder = FilterBuilder::new(&model).root(find(&model, "Order"));
        assert_eq!(builder.build(), builder.build());
    }
}
