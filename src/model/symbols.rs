//! Symbol Table
//!
//! Maps (namespace, local name) to symbols with O(1) lookup, plus a secondary
//! index of operation-scoped message names (`OrderService_Create_RQ`).
//!
//! Chameleon libraries have no namespace of their own; their entities are
//! merged into the namespace of every library that includes them. A name
//! contributed by two chameleon libraries (or colliding with a native symbol)
//! after the merge is ambiguous: it is reported once as
//! `DUPLICATE_CHAMELEON_SYMBOLS` and lookups of it return nothing.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::entity::{EntityBody, MessageKind, NamedEntity};
use super::facet::{self, FacetKind};
use super::{EntityId, LibraryId, Model};
use crate::diagnostics::{FindingCode, FindingsSink};

// =============================================================================
// Symbols
// =============================================================================

/// What a qualified name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Entity(EntityId),
    /// Alias of an object, by position in its alias list
    Alias { owner: EntityId, index: usize },
    /// Fixed facet of an object (`Order_Summary`)
    Facet { owner: EntityId, facet: FacetKind },
    /// Inherited contextual facet seen through a subtype
    Ghost { owner: EntityId, source: EntityId },
}

impl Symbol {
    /// Entity that owns this symbol
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Entity(id) => *id,
            Self::Alias { owner, .. } | Self::Facet { owner, .. } | Self::Ghost { owner, .. } => {
                *owner
            }
        }
    }
}

/// Operation-scoped message symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationSymbol {
    pub service: EntityId,
    /// Index into the service's operation list
    pub operation: usize,
    pub message: MessageKind,
}

/// A namespace-qualified name with its normalized prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub namespace: String,
    pub prefix: String,
    pub local: String,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

// =============================================================================
// Symbol Table
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, HashMap<String, Symbol>>,
    ambiguous: HashMap<String, HashSet<String>>,
    operations: HashMap<String, HashMap<String, OperationSymbol>>,
    /// Namespace -> normalized prefix
    prefixes: BTreeMap<String, String>,
    /// Chameleon library -> namespaces it is merged into
    chameleon_hosts: HashMap<LibraryId, Vec<String>>,
    /// Owner entity -> contextual facets attached to it
    facets_by_owner: HashMap<EntityId, Vec<EntityId>>,
}

impl SymbolTable {
    /// Build the table for every library currently in the model
    pub fn build(model: &Model, sink: &mut dyn FindingsSink) -> Self {
        let mut table = Self::default();

        for library in model.libraries() {
            if let Some(ns) = &library.namespace {
                table.assign_prefix(ns, library.prefix.as_deref());
            }
        }

        table.chameleon_hosts = chameleon_hosts(model);

        for library in model.libraries() {
            let Some(ns) = &library.namespace else {
                continue;
            };
            for entity in model.library_entities(library.id) {
                for (name, symbol) in symbol_names(entity) {
                    table.insert_native(ns, name, symbol, &library.identity(), sink);
                }
            }
        }

        table.merge_chameleons(model, sink);
        table.index_operations(model);
        table
    }

    // === Prefixes ===

    /// Assign a stable prefix to a namespace, suffixing on collision
    fn assign_prefix(&mut self, namespace: &str, preferred: Option<&str>) -> String {
        if let Some(prefix) = self.prefixes.get(namespace) {
            return prefix.clone();
        }
        let base = preferred.filter(|p| !p.is_empty()).unwrap_or("ns");
        let used: HashSet<&str> = self.prefixes.values().map(String::as_str).collect();

        let mut candidate = base.to_string();
        let mut suffix = 1;
        while used.contains(candidate.as_str()) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }

        self.prefixes.insert(namespace.to_string(), candidate.clone());
        candidate
    }

    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(String::as_str)
    }

    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, p)| p.as_str() == prefix)
            .map(|(ns, _)| ns.as_str())
    }

    /// Namespace -> prefix assignments in namespace order
    pub fn prefixes(&self) -> &BTreeMap<String, String> {
        &self.prefixes
    }

    // === Registration ===

    fn insert_native(
        &mut self,
        namespace: &str,
        name: String,
        symbol: Symbol,
        source: &str,
        sink: &mut dyn FindingsSink,
    ) {
        let names = self.symbols.entry(namespace.to_string()).or_default();
        match names.get(&name) {
            Some(existing) if *existing != symbol => {
                sink.report(
                    source,
                    FindingCode::DuplicateSymbol,
                    vec![name, namespace.to_string()],
                );
            }
            Some(_) => {}
            None => {
                names.insert(name, symbol);
            }
        }
    }

    fn merge_chameleons(&mut self, model: &Model, sink: &mut dyn FindingsSink) {
        let mut contributions: BTreeMap<(String, String), Vec<(LibraryId, Symbol)>> =
            BTreeMap::new();

        for (library, hosts) in &self.chameleon_hosts {
            for host in hosts {
                for entity in model.library_entities(*library) {
                    for (name, symbol) in symbol_names(entity) {
                        let entry = contributions.entry((host.clone(), name)).or_default();
                        if !entry.iter().any(|(lib, _)| lib == library) {
                            entry.push((*library, symbol));
                        }
                    }
                }
            }
        }

        for ((namespace, name), contributors) in contributions {
            let native = self.lookup(&namespace, &name);
            if contributors.len() == 1 && native.is_none() {
                self.symbols
                    .entry(namespace)
                    .or_default()
                    .insert(name, contributors[0].1);
                continue;
            }

            if let Some(names) = self.symbols.get_mut(&namespace) {
                names.remove(&name);
            }
            self.ambiguous
                .entry(namespace.clone())
                .or_default()
                .insert(name.clone());

            let primary = contributors
                .iter()
                .any(|(_, symbol)| matches!(symbol, Symbol::Entity(_)));
            if primary {
                let mut names: Vec<String> = contributors
                    .iter()
                    .filter_map(|(lib, _)| model.library(*lib).map(|l| l.name.clone()))
                    .collect();
                if let Some(native) = native.and_then(|s| model.owner(s.entity())) {
                    names.push(native.name.clone());
                }
                sink.report(
                    &namespace,
                    FindingCode::DuplicateChameleonSymbols,
                    vec![name, namespace.clone(), names.join(", ")],
                );
            }
        }
    }

    fn index_operations(&mut self, model: &Model) {
        for entity in model.entities() {
            let EntityBody::Service(service) = &entity.body else {
                continue;
            };
            for namespace in self.effective_namespaces(model, entity.id) {
                let index = self.operations.entry(namespace).or_default();
                for (position, operation) in service.operations.iter().enumerate() {
                    for (kind, _) in operation.messages() {
                        index.insert(
                            operation.message_name(&entity.name, kind),
                            OperationSymbol {
                                service: entity.id,
                                operation: position,
                                message: kind,
                            },
                        );
                    }
                }
            }
        }
    }

    /// Index contextual facets by their resolved owner
    pub(crate) fn index_contextual_facets(&mut self, model: &Model) {
        self.facets_by_owner.clear();
        for entity in model.entities() {
            if let EntityBody::ContextualFacet(cf) = &entity.body {
                if let Some(owner) = cf.owner.entity() {
                    self.facets_by_owner.entry(owner).or_default().push(entity.id);
                }
            }
        }
    }

    /// Register ghost facet names; requires the contextual facet index
    pub(crate) fn register_ghosts(model: &Model) -> Vec<(String, String, Symbol)> {
        let symbols = model.symbols();
        let mut entries = Vec::new();
        for entity in model.entities().filter(|e| e.kind().is_object()) {
            let namespaces = symbols.effective_namespaces(model, entity.id);
            for ghost in facet::ghost_facets(model, entity.id) {
                let name = ghost.name(model);
                for ns in &namespaces {
                    entries.push((
                        ns.clone(),
                        name.clone(),
                        Symbol::Ghost {
                            owner: ghost.owner,
                            source: ghost.source,
                        },
                    ));
                }
            }
        }
        entries
    }

    pub(crate) fn insert_derived(&mut self, entries: Vec<(String, String, Symbol)>) {
        for (namespace, name, symbol) in entries {
            if self.is_ambiguous(&namespace, &name) {
                continue;
            }
            self.symbols
                .entry(namespace)
                .or_default()
                .entry(name)
                .or_insert(symbol);
        }
    }

    // === Lookup ===

    /// Look up a name; ambiguous chameleon names return `None`
    pub fn lookup(&self, namespace: &str, local: &str) -> Option<Symbol> {
        self.symbols.get(namespace)?.get(local).copied()
    }

    pub fn is_ambiguous(&self, namespace: &str, local: &str) -> bool {
        self.ambiguous
            .get(namespace)
            .map(|names| names.contains(local))
            .unwrap_or(false)
    }

    pub fn lookup_operation(&self, namespace: &str, name: &str) -> Option<OperationSymbol> {
        self.operations.get(namespace)?.get(name).copied()
    }

    pub fn contextual_facets_of(&self, owner: EntityId) -> &[EntityId] {
        self.facets_by_owner
            .get(&owner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Namespaces a chameleon library is merged into
    pub fn chameleon_hosts(&self, library: LibraryId) -> &[String] {
        self.chameleon_hosts
            .get(&library)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Namespaces an entity is visible in
    pub fn effective_namespaces(&self, model: &Model, id: EntityId) -> Vec<String> {
        match model.owner(id) {
            Some(library) => match &library.namespace {
                Some(ns) => vec![ns.clone()],
                None => self.chameleon_hosts(library.id).to_vec(),
            },
            None => Vec::new(),
        }
    }

    /// Local name a symbol is registered under
    pub fn local_name(model: &Model, symbol: Symbol) -> Option<String> {
        let owner = model.entity(symbol.entity())?;
        match symbol {
            Symbol::Entity(_) => Some(owner.name.clone()),
            Symbol::Alias { index, .. } => owner.body.aliases().get(index).cloned(),
            Symbol::Facet { facet, .. } => Some(format!("{}_{}", owner.name, facet.as_str())),
            Symbol::Ghost { source, .. } => match &model.entity(source)?.body {
                EntityBody::ContextualFacet(cf) => {
                    Some(cf.facet_kind.facet_entity_name(&owner.name, &cf.facet_name))
                }
                _ => None,
            },
        }
    }

    /// Qualified name of a symbol, normalized through the prefix table
    ///
    /// `context` picks the host namespace for chameleon entities; without
    /// one the first host is used.
    pub fn qualified_name(
        &self,
        model: &Model,
        symbol: Symbol,
        context: Option<&str>,
    ) -> Option<QualifiedName> {
        let namespaces = self.effective_namespaces(model, symbol.entity());
        let namespace = context
            .filter(|ctx| namespaces.iter().any(|ns| ns == ctx))
            .map(str::to_string)
            .or_else(|| namespaces.first().cloned())?;
        Some(QualifiedName {
            prefix: self.prefix_for(&namespace)?.to_string(),
            local: Self::local_name(model, symbol)?,
            namespace,
        })
    }

    /// Closest registered name in a namespace
    pub fn suggest(&self, namespace: &str, local: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default();
        self.symbols
            .get(namespace)?
            .keys()
            .filter_map(|name| matcher.fuzzy_match(name, local).map(|score| (score, name)))
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, name)| name.clone())
    }

    /// All (namespace, name, symbol) entries, sorted
    pub fn entries(&self) -> Vec<(&str, &str, Symbol)> {
        let mut entries: Vec<_> = self
            .symbols
            .iter()
            .flat_map(|(ns, names)| {
                names
                    .iter()
                    .map(move |(name, symbol)| (ns.as_str(), name.as_str(), *symbol))
            })
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }

    pub fn len(&self) -> usize {
        self.symbols.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Names an entity contributes: itself, its aliases and its fixed facets
fn symbol_names(entity: &NamedEntity) -> Vec<(String, Symbol)> {
    let mut names = vec![(entity.name.clone(), Symbol::Entity(entity.id))];

    for (index, alias) in entity.body.aliases().iter().enumerate() {
        names.push((
            alias.clone(),
            Symbol::Alias {
                owner: entity.id,
                index,
            },
        ));
    }

    for kind in facet::fixed_facet_kinds(&entity.body) {
        names.push((
            format!("{}_{}", entity.name, kind.as_str()),
            Symbol::Facet {
                owner: entity.id,
                facet: *kind,
            },
        ));
    }

    names
}

/// Chameleon libraries and the namespaces that include or import them
fn chameleon_hosts(model: &Model) -> HashMap<LibraryId, Vec<String>> {
    let chameleons: Vec<_> = model.libraries().filter(|l| l.is_chameleon()).collect();
    let mut hosts: HashMap<LibraryId, Vec<String>> = HashMap::new();
    if chameleons.is_empty() {
        return hosts;
    }

    for library in model.libraries() {
        let Some(ns) = &library.namespace else {
            continue;
        };
        let hints = library.includes.iter().chain(
            library
                .imports
                .iter()
                .filter(|i| i.namespace.is_none())
                .flat_map(|i| i.file_hints.iter()),
        );

        for hint in hints {
            let resolved = library.url.as_ref().and_then(|u| u.join(hint).ok());
            let hint_file = hint.rsplit('/').next().unwrap_or(hint);

            for chameleon in &chameleons {
                let matches = match (&resolved, &chameleon.url) {
                    (Some(resolved), Some(url)) if resolved == url => true,
                    _ => chameleon.file_name() == Some(hint_file),
                };
                if matches {
                    let entry = hosts.entry(chameleon.id).or_default();
                    if !entry.contains(ns) {
                        entry.push(ns.clone());
                    }
                }
            }
        }
    }

    hosts
}
