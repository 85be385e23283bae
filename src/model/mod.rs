//! Library Model
//!
//! Arena of libraries and named entities addressed by integer ids.
//!
//! - Every entity has exactly one owning library (`NamedEntity::library`)
//! - A library appears at most once per (namespace, name)
//! - The symbol table is rebuilt whenever libraries are added or removed
//!
//! Assembly (`assembly`) populates the model from loaded modules and binds
//! every type reference to a symbol.

pub mod assembly;
pub mod builtins;
pub mod entity;
pub mod facet;
pub mod symbols;

pub use assembly::{assemble, Assembly};
pub use entity::{
    EntityBody, EntityKind, MemberDecl, MessageKind, NamedEntity, TypeRef,
};
pub use facet::{ContextualKind, FacetContent, FacetKind, GhostFacet};
pub use symbols::{QualifiedName, Symbol, SymbolTable};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::diagnostics::{FindingCode, FindingsSink};
use crate::loader::GrammarVersion;
use crate::version::{OtmVersionScheme, VersionScheme};

// =============================================================================
// Identifiers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub(crate) usize);

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lib#{}", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

// =============================================================================
// Library Declarations
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LibraryStatus {
    #[default]
    Draft,
    UnderReview,
    Final,
    Obsolete,
}

/// An import of another namespace, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDecl {
    /// Absent for imports of chameleon libraries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_hints: Vec<String>,
}

/// A context a library's contextual facets may refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDecl {
    pub context_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_context: Option<String>,
}

/// Library header as declared by a module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryHeader {
    pub name: String,
    /// Absent for chameleon libraries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Defaults to the version encoded in the namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub status: LibraryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

// =============================================================================
// Library
// =============================================================================

#[derive(Debug, Clone)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub version: String,
    pub status: LibraryStatus,
    pub documentation: Option<String>,
    /// Where the library was loaded from
    pub url: Option<Url>,
    pub grammar: Option<GrammarVersion>,
    pub built_in: bool,
    pub imports: Vec<ImportDecl>,
    /// Include file hints
    pub includes: Vec<String>,
    pub contexts: Vec<ContextDecl>,
    /// Owned entities in declaration order
    pub members: Vec<EntityId>,
}

impl Library {
    pub fn is_chameleon(&self) -> bool {
        self.namespace.is_none()
    }

    /// Last path segment of the library's URL
    pub fn file_name(&self) -> Option<&str> {
        self.url
            .as_ref()
            .and_then(|u| u.path_segments())
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
    }

    /// Namespace bound to a prefix in this library's scope
    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        if self.prefix.as_deref() == Some(prefix) {
            return self.namespace.as_deref();
        }
        self.imports
            .iter()
            .find(|i| i.prefix.as_deref() == Some(prefix))
            .and_then(|i| i.namespace.as_deref())
    }

    /// Display identity used as a finding source
    pub fn identity(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{} ({})", self.name, ns),
            None => self.name.clone(),
        }
    }
}

// =============================================================================
// Model
// =============================================================================

/// Arena of libraries and entities plus the symbol table over them
#[derive(Debug)]
pub struct Model {
    libraries: Vec<Option<Library>>,
    entities: Vec<Option<NamedEntity>>,
    by_key: HashMap<(Option<String>, String), LibraryId>,
    symbols: SymbolTable,
    symbols_stale: bool,
    scheme: Arc<dyn VersionScheme>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Arc::new(OtmVersionScheme::new()))
    }
}

impl Model {
    pub fn new(scheme: Arc<dyn VersionScheme>) -> Self {
        Self {
            libraries: Vec::new(),
            entities: Vec::new(),
            by_key: HashMap::new(),
            symbols: SymbolTable::default(),
            symbols_stale: false,
            scheme,
        }
    }

    pub fn version_scheme(&self) -> &dyn VersionScheme {
        self.scheme.as_ref()
    }

    pub fn scheme_handle(&self) -> Arc<dyn VersionScheme> {
        Arc::clone(&self.scheme)
    }

    // === Libraries ===

    /// Add a library and its members
    ///
    /// Returns `None` and reports `DUPLICATE_LIBRARY` when a library with the
    /// same namespace and name is already present.
    pub fn add_library(
        &mut self,
        mut library: Library,
        members: Vec<MemberDecl>,
        sink: &mut dyn FindingsSink,
    ) -> Option<LibraryId> {
        let key = (library.namespace.clone(), library.name.clone());
        if self.by_key.contains_key(&key) {
            sink.report(
                &library.identity(),
                FindingCode::DuplicateLibrary,
                vec![library.name.clone(), library.namespace.clone().unwrap_or_default()],
            );
            return None;
        }

        let id = LibraryId(self.libraries.len());
        library.id = id;
        library.members.clear();

        for member in members {
            let entity_id = EntityId(self.entities.len());
            let name = match &member.body {
                EntityBody::ContextualFacet(cf) => cf
                    .facet_kind
                    .facet_entity_name(cf.owner.local_name(), &cf.facet_name),
                EntityBody::ExtensionPointFacet(ep) if member.name.is_empty() => {
                    format!("ExtensionPoint_{}", ep.extends.local_name())
                }
                _ => member.name,
            };
            self.entities.push(Some(NamedEntity {
                id: entity_id,
                library: id,
                name,
                documentation: member.documentation,
                body: member.body,
            }));
            library.members.push(entity_id);
        }

        self.by_key.insert(key, id);
        self.libraries.push(Some(library));
        self.symbols_stale = true;
        Some(id)
    }

    /// Remove a library and every entity it owns
    pub fn remove_library(&mut self, id: LibraryId) -> Option<Library> {
        let library = self.libraries.get_mut(id.0)?.take()?;
        for member in &library.members {
            if let Some(slot) = self.entities.get_mut(member.0) {
                *slot = None;
            }
        }
        self.by_key
            .remove(&(library.namespace.clone(), library.name.clone()));
        self.symbols_stale = true;
        Some(library)
    }

    pub fn library(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.get(id.0).and_then(Option::as_ref)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter().flatten()
    }

    pub fn user_libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries().filter(|l| !l.built_in)
    }

    pub fn find_library(&self, namespace: Option<&str>, name: &str) -> Option<LibraryId> {
        self.by_key
            .get(&(namespace.map(str::to_string), name.to_string()))
            .copied()
    }

    pub fn libraries_in_namespace<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a Library> + 'a {
        self.libraries()
            .filter(move |l| l.namespace.as_deref() == Some(namespace))
    }

    /// Library loaded from a given URL
    pub fn library_by_url(&self, url: &Url) -> Option<&Library> {
        self.libraries().find(|l| l.url.as_ref() == Some(url))
    }

    // === Entities ===

    pub fn entity(&self, id: EntityId) -> Option<&NamedEntity> {
        self.entities.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut NamedEntity> {
        self.entities.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn entities(&self) -> impl Iterator<Item = &NamedEntity> {
        self.entities.iter().flatten()
    }

    pub fn library_entities(&self, id: LibraryId) -> impl Iterator<Item = &NamedEntity> {
        self.library(id)
            .map(|l| l.members.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|e| self.entity(*e))
    }

    /// Library owning an entity
    pub fn owner(&self, id: EntityId) -> Option<&Library> {
        self.entity(id).and_then(|e| self.library(e.library))
    }

    /// Find an entity by library name and local name
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        match name.split_once(':') {
            Some((library, local)) => self
                .libraries()
                .filter(|l| l.name == library)
                .flat_map(|l| self.library_entities(l.id))
                .find(|e| e.name == local)
                .map(|e| e.id),
            None => self
                .entities()
                .find(|e| e.name == name && !self.owner(e.id).map(|l| l.built_in).unwrap_or(true))
                .map(|e| e.id),
        }
    }

    // === Symbols ===

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Whether libraries changed since the symbol table was last built
    pub fn symbols_stale(&self) -> bool {
        self.symbols_stale
    }

    pub(crate) fn set_symbols(&mut self, symbols: SymbolTable) {
        self.symbols = symbols;
        self.symbols_stale = false;
    }

    pub(crate) fn take_symbols(&mut self) -> SymbolTable {
        std::mem::take(&mut self.symbols)
    }

    pub(crate) fn entity_ids(&self) -> Vec<EntityId> {
        self.entities().map(|e| e.id).collect()
    }
}
