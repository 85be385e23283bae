//! Generation context
//!
//! Everything a transformer may look at: the model and its symbol table, the
//! active filter, the request options and the emit order. Derived facet data
//! (ghost facets, extension chains, flattened facet content) is computed on
//! first use and memoized for the rest of the run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::names;
use super::registry::TransformerRegistry;
use super::{CancellationToken, GenerationOptions, NamespacePolicy, TargetFormat};
use crate::error::{CompilerError, Result};
use crate::filter::CodeGenerationFilter;
use crate::model::builtins::{self, BUILT_INS_DIR, OTM_COMMON_NAMESPACE};
use crate::model::facet::{self, fixed_facets, GhostFacet};
use crate::model::{
    EntityBody, EntityId, FacetContent, FacetKind, Library, LibraryId, Model, NamedEntity, Symbol,
    SymbolTable, TypeRef,
};

pub struct GenerationContext<'a> {
    model: &'a Model,
    filter: CodeGenerationFilter,
    options: &'a GenerationOptions,
    registry: &'a TransformerRegistry,
    library_order: Vec<LibraryId>,
    cancellation: Option<&'a CancellationToken>,
    ghosts: RefCell<HashMap<EntityId, Rc<Vec<GhostFacet>>>>,
    chains: RefCell<HashMap<EntityId, Rc<Vec<EntityId>>>>,
    facets: RefCell<HashMap<(EntityId, FacetKind), Rc<FacetContent>>>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(
        model: &'a Model,
        filter: CodeGenerationFilter,
        options: &'a GenerationOptions,
        registry: &'a TransformerRegistry,
        library_order: Vec<LibraryId>,
        cancellation: Option<&'a CancellationToken>,
    ) -> Self {
        Self {
            model,
            filter,
            options,
            registry,
            library_order,
            cancellation,
            ghosts: RefCell::new(HashMap::new()),
            chains: RefCell::new(HashMap::new()),
            facets: RefCell::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn symbols(&self) -> &'a SymbolTable {
        self.model.symbols()
    }

    pub fn filter(&self) -> &CodeGenerationFilter {
        &self.filter
    }

    pub fn options(&self) -> &'a GenerationOptions {
        self.options
    }

    pub fn registry(&self) -> &'a TransformerRegistry {
        self.registry
    }

    /// In-scope user libraries, dependencies first
    pub fn library_order(&self) -> &[LibraryId] {
        &self.library_order
    }

    /// Fail with `Cancelled` once the token has been triggered
    pub fn check_cancelled(&self) -> Result<()> {
        match self.cancellation {
            Some(token) if token.is_cancelled() => Err(CompilerError::Cancelled),
            _ => Ok(()),
        }
    }

    /// In-scope entities of a library, in declaration order
    pub fn emitted_entities(&self, library: LibraryId) -> impl Iterator<Item = &'a NamedEntity> + '_ {
        self.model
            .library_entities(library)
            .filter(move |e| self.filter.process_entity(e.id))
    }

    // === Memoized facet data ===

    pub fn ghost_facets(&self, id: EntityId) -> Rc<Vec<GhostFacet>> {
        if let Some(cached) = self.ghosts.borrow().get(&id) {
            return Rc::clone(cached);
        }
        let ghosts = Rc::new(facet::ghost_facets(self.model, id));
        self.ghosts.borrow_mut().insert(id, Rc::clone(&ghosts));
        ghosts
    }

    pub fn extension_chain(&self, id: EntityId) -> Rc<Vec<EntityId>> {
        if let Some(cached) = self.chains.borrow().get(&id) {
            return Rc::clone(cached);
        }
        let chain = Rc::new(facet::extension_chain(self.model, id));
        self.chains.borrow_mut().insert(id, Rc::clone(&chain));
        chain
    }

    /// Content of a fixed facet including inherited and lower facets
    ///
    /// Supertype content comes first, farthest ancestor first; within one
    /// object the facets are taken in ID, Summary, Detail order up to `kind`.
    pub fn facet_content(&self, id: EntityId, kind: FacetKind) -> Rc<FacetContent> {
        if let Some(cached) = self.facets.borrow().get(&(id, kind)) {
            return Rc::clone(cached);
        }

        let chain = self.extension_chain(id);
        let mut content = FacetContent::default();
        for owner in chain.iter().rev().chain(std::iter::once(&id)) {
            let Some(entity) = self.model.entity(*owner) else {
                continue;
            };
            for (facet, facet_content) in fixed_facets(&entity.body) {
                if facet.rank() <= kind.rank() && facet != FacetKind::Simple {
                    content.extend_from(facet_content);
                }
            }
        }

        let content = Rc::new(content);
        self.facets.borrow_mut().insert((id, kind), Rc::clone(&content));
        content
    }

    // === Namespaces and files ===

    /// Namespace written for a library namespace under the request policy
    pub fn output_namespace(&self, namespace: &str) -> String {
        match self.options.namespace_policy {
            NamespacePolicy::Full => namespace.to_string(),
            NamespacePolicy::Major => self
                .model
                .version_scheme()
                .major_version_namespace(namespace)
                .unwrap_or_else(|_| namespace.to_string()),
        }
    }

    /// Output namespace of a library; chameleons have none of their own
    pub fn library_namespace(&self, library: &Library) -> Option<String> {
        let ns = library.namespace.as_deref()?;
        Some(if library.built_in {
            ns.to_string()
        } else {
            self.output_namespace(ns)
        })
    }

    /// Output namespace an entity is referenced under from `context`
    ///
    /// Chameleon entities take the namespace of the referencing library when
    /// that library hosts them, otherwise their first host. `None` means the
    /// name is unqualified.
    pub fn entity_namespace(&self, id: EntityId, context: Option<LibraryId>) -> Option<String> {
        let library = self.model.owner(id)?;
        if let Some(ns) = self.library_namespace(library) {
            return Some(ns);
        }

        let context_library = context.and_then(|c| self.model.library(c));
        if context_library.map(|l| l.id) == Some(library.id) {
            return None;
        }
        let hosts = self.symbols().chameleon_hosts(library.id);
        let host = context_library
            .and_then(|l| l.namespace.as_deref())
            .filter(|ns| hosts.iter().any(|h| h == ns))
            .or_else(|| hosts.first().map(String::as_str))?;
        Some(self.output_namespace(host))
    }

    /// File a library's document is written to, relative to the output root
    pub fn library_file(&self, library: &Library, format: TargetFormat) -> Option<String> {
        if library.built_in {
            return match (format, library.namespace.as_deref()) {
                (TargetFormat::XmlSchema | TargetFormat::ServiceSchema, Some(OTM_COMMON_NAMESPACE)) => {
                    builtins::schema_for(OTM_COMMON_NAMESPACE)
                        .map(|s| format!("{}/{}", BUILT_INS_DIR, s.file_name))
                }
                _ => None,
            };
        }

        let format = match format {
            TargetFormat::ServiceSchema => TargetFormat::XmlSchema,
            other => other,
        };
        if let Some(template) = self.options.filename_overrides.get(&format) {
            return Some(names::apply_template(template, library));
        }
        let extension = match format {
            TargetFormat::XmlSchema => "xsd",
            TargetFormat::JsonSchema => "schema.json",
            _ => return None,
        };
        Some(format!("{}.{}", names::library_stem(library), extension))
    }

    // === Type names ===

    /// Local name of the type a reference denotes
    ///
    /// References to objects denote their default facet (Summary, or Shared
    /// for choice objects); references to aliases denote the owner's.
    pub fn type_name(&self, symbol: Symbol) -> Option<String> {
        let owner = self.model.entity(symbol.entity())?;
        match symbol {
            Symbol::Entity(_) | Symbol::Alias { .. } => Some(self.declared_type_name(owner)),
            Symbol::Facet { facet, .. } => Some(names::facet_type_name(&owner.name, facet)),
            Symbol::Ghost { .. } => SymbolTable::local_name(self.model, symbol),
        }
    }

    /// Type name an entity is referenced by
    pub fn declared_type_name(&self, entity: &NamedEntity) -> String {
        match &entity.body {
            EntityBody::CoreObject(_) | EntityBody::BusinessObject(_) => {
                names::facet_type_name(&entity.name, FacetKind::Summary)
            }
            EntityBody::ChoiceObject(_) => names::facet_type_name(&entity.name, FacetKind::Shared),
            EntityBody::ExtensionPointFacet(ep) => self.extension_point_type_name(entity, &ep.extends),
            _ => entity.name.clone(),
        }
    }

    /// `ExtensionPoint_{Facet}_{Owner}` for the facet an extension point extends
    pub fn extension_point_type_name(&self, entity: &NamedEntity, extends: &TypeRef) -> String {
        let target = extends
            .target
            .and_then(|symbol| Some((symbol, self.model.entity(symbol.entity())?)));
        match target {
            Some((Symbol::Facet { facet, .. }, owner)) => names::extension_point_name(&owner.name, facet),
            Some((Symbol::Entity(_), owner)) if owner.kind().is_object() => {
                names::extension_point_name(&owner.name, default_facet(&owner.body))
            }
            _ => entity.name.clone(),
        }
    }

    pub fn is_built_in(&self, id: EntityId) -> bool {
        self.model.owner(id).map(|l| l.built_in).unwrap_or(false)
    }
}

/// Facet a plain reference to an object denotes
pub fn default_facet(body: &EntityBody) -> FacetKind {
    match body {
        EntityBody::ChoiceObject(_) => FacetKind::Shared,
        _ => FacetKind::Summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{GrammarVersion, LibraryModule};
    use crate::model::{Assembly, LibraryHeader, MemberDecl};
    use crate::version::OtmVersionScheme;
    use std::sync::Arc;
    use url::Url;

    fn model() -> Model {
        let module = LibraryModule {
            url: Url::parse("file:///libs/Orders.otm").unwrap(),
            grammar: GrammarVersion::V01_06,
            header: LibraryHeader {
                name: "Orders".into(),
                namespace: Some("http://example.com/ns/Orders/v01_02".into()),
                prefix: Some("o".into()),
                version: Some("1.2.0".into()),
                ..LibraryHeader::default()
            },
            imports: Vec::new(),
            includes: Vec::new(),
            contexts: Vec::new(),
            members: serde_json::from_value::<Vec<MemberDecl>>(serde_json::json!([
                { "kind": "businessObject", "name": "Base",
                  "id": { "attributes": [{ "name": "baseId", "type": "xsd:string" }] },
                  "summary": { "attributes": [{ "name": "baseName", "type": "xsd:string" }] } },
                { "kind": "businessObject", "name": "Order", "extension": "Base",
                  "id": { "attributes": [{ "name": "orderId", "type": "xsd:string" }] },
                  "detail": { "attributes": [{ "name": "total", "type": "xsd:decimal" }] } }
            ]))
            .unwrap(),
        };
        Assembly::from_modules(vec![module], Arc::new(OtmVersionScheme::new()))
            .unwrap()
            .model
    }

    #[test]
    fn test_flattened_facet_content() {
        let model = model();
        let options = GenerationOptions::new("/tmp/out");
        let registry = TransformerRegistry::standard();
        let ctx = GenerationContext::new(&model, CodeGenerationFilter::everything(&model), &options, &registry, vec![], None);

        let order = model.find_entity("Order").unwrap();
        let names = |kind| -> Vec<String> {
            ctx.facet_content(order, kind).attributes.iter().map(|a| a.name.clone()).collect()
        };
        assert_eq!(names(FacetKind::Id), vec!["baseId", "orderId"]);
        assert_eq!(names(FacetKind::Detail), vec!["baseId", "baseName", "orderId", "total"]);
    }

    #[test]
    fn test_major_policy_and_file_names() {
        let model = model();
        let mut options = GenerationOptions::new("/tmp/out");
        options.namespace_policy = NamespacePolicy::Major;
        let registry = TransformerRegistry::standard();
        let ctx = GenerationContext::new(&model, CodeGenerationFilter::everything(&model), &options, &registry, vec![], None);

        let library = model.user_libraries().next().unwrap();
        assert_eq!(ctx.library_namespace(library).as_deref(), Some("http://example.com/ns/Orders/v01"));
        assert_eq!(ctx.library_file(library, TargetFormat::XmlSchema).as_deref(), Some("Orders_1_2_0.xsd"));
        assert_eq!(
            ctx.library_file(library, TargetFormat::JsonSchema).as_deref(),
            Some("Orders_1_2_0.schema.json")
        );
    }

    #[test]
    fn test_cancellation_checked() {
        let model = model();
        let options = GenerationOptions::new("/tmp/out");
        let registry = TransformerRegistry::standard();
        let token = CancellationToken::new();
        let ctx = GenerationContext::new(&model, CodeGenerationFilter::default(), &options, &registry, vec![], Some(&token));
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(CompilerError::Cancelled)));
    }
}
