//! Facets and ghost facet derivation
//!
//! Object-like entities own fixed facets (ID/Summary/Detail, Simple, Shared);
//! contextual facets are standalone entities attached to an owner. A ghost
//! facet is the view a subtype gets of a contextual facet declared on one of
//! its supertypes when it does not redeclare that facet itself. Ghost facets
//! are never stored: they are recomputed from the extension chain on demand.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::entity::{EntityBody, TypeRef};
use super::{EntityId, Model};

// =============================================================================
// Facet Kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FacetKind {
    Id,
    Summary,
    Detail,
    Shared,
    Simple,
    Custom,
    Query,
    Update,
    Choice,
}

impl FacetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Summary => "Summary",
            Self::Detail => "Detail",
            Self::Shared => "Shared",
            Self::Simple => "Simple",
            Self::Custom => "Custom",
            Self::Query => "Query",
            Self::Update => "Update",
            Self::Choice => "Choice",
        }
    }

    /// Parse the suffix of a derived facet name (`Order_Detail`)
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "ID" => Some(Self::Id),
            "Summary" => Some(Self::Summary),
            "Detail" => Some(Self::Detail),
            "Shared" => Some(Self::Shared),
            "Simple" => Some(Self::Simple),
            _ => None,
        }
    }

    /// Position in the ID < Summary < Detail content hierarchy
    pub fn rank(&self) -> u8 {
        match self {
            Self::Id | Self::Simple | Self::Shared => 0,
            Self::Summary => 1,
            Self::Detail => 2,
            Self::Custom | Self::Query | Self::Update | Self::Choice => 3,
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a contextual facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextualKind {
    Custom,
    Query,
    Update,
    Choice,
}

impl ContextualKind {
    pub fn facet_kind(&self) -> FacetKind {
        match self {
            Self::Custom => FacetKind::Custom,
            Self::Query => FacetKind::Query,
            Self::Update => FacetKind::Update,
            Self::Choice => FacetKind::Choice,
        }
    }

    /// Entity name of a contextual facet (`Order_Custom_Web`)
    pub fn facet_entity_name(&self, owner: &str, facet_name: &str) -> String {
        format!("{}_{}_{}", owner, self.facet_kind().as_str(), facet_name)
    }
}

// =============================================================================
// Facet Content
// =============================================================================

/// Attributes, elements and indicators of a facet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacetContent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<Indicator>,
}

impl FacetContent {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.elements.is_empty() && self.indicators.is_empty()
    }

    /// Append another facet's content after this one's
    pub fn extend_from(&mut self, other: &FacetContent) {
        self.attributes.extend(other.attributes.iter().cloned());
        self.elements.extend(other.elements.iter().cloned());
        self.indicators.extend(other.indicators.iter().cloned());
    }

    pub(crate) fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a TypeRef>) {
        refs.extend(self.attributes.iter().map(|a| &a.type_ref));
        refs.extend(self.elements.iter().map(|e| &e.type_ref));
    }

    pub(crate) fn collect_refs_mut<'a>(&'a mut self, refs: &mut Vec<&'a mut TypeRef>) {
        refs.extend(self.attributes.iter_mut().map(|a| &mut a.type_ref));
        refs.extend(self.elements.iter_mut().map(|e| &mut e.type_ref));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Property name; empty means the referenced type's name
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub mandatory: bool,
    /// Maximum occurrences; 0 and 1 mean a single value
    #[serde(default)]
    pub repeat: u32,
    #[serde(default)]
    pub unbounded: bool,
    /// Reference by identifier instead of containment
    #[serde(default)]
    pub reference: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl Element {
    pub fn property_name(&self) -> &str {
        if self.name.is_empty() {
            self.type_ref.local_name()
        } else {
            &self.name
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.unbounded || self.repeat > 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub name: String,
    #[serde(default)]
    pub publish_as_element: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

// =============================================================================
// Fixed Facets
// =============================================================================

/// Fixed facets owned by an entity body, in hierarchy order
pub fn fixed_facets(body: &EntityBody) -> Vec<(FacetKind, &FacetContent)> {
    match body {
        EntityBody::BusinessObject(bo) => vec![
            (FacetKind::Id, &bo.id),
            (FacetKind::Summary, &bo.summary),
            (FacetKind::Detail, &bo.detail),
        ],
        EntityBody::CoreObject(core) => vec![
            (FacetKind::Summary, &core.summary),
            (FacetKind::Detail, &core.detail),
        ],
        EntityBody::ChoiceObject(choice) => vec![(FacetKind::Shared, &choice.shared)],
        _ => Vec::new(),
    }
}

/// Kinds of fixed facets that get a derived symbol (`{Owner}_{Facet}`)
pub fn fixed_facet_kinds(body: &EntityBody) -> &'static [FacetKind] {
    match body {
        EntityBody::BusinessObject(_) => &[FacetKind::Id, FacetKind::Summary, FacetKind::Detail],
        EntityBody::CoreObject(_) => &[FacetKind::Simple, FacetKind::Summary, FacetKind::Detail],
        EntityBody::ChoiceObject(_) => &[FacetKind::Shared],
        _ => &[],
    }
}

pub fn facet_content(body: &EntityBody, kind: FacetKind) -> Option<&FacetContent> {
    fixed_facets(body)
        .into_iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, c)| c)
}

// =============================================================================
// Extension Chains
// =============================================================================

/// Supertypes of an entity, nearest first
///
/// Stops at the first repeated entity, so circular extensions terminate.
pub fn extension_chain(model: &Model, id: EntityId) -> Vec<EntityId> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([id]);
    let mut current = id;

    while let Some(parent) = model
        .entity(current)
        .and_then(|e| e.body.extension())
        .and_then(TypeRef::entity)
    {
        if !visited.insert(parent) {
            break;
        }
        chain.push(parent);
        current = parent;
    }

    chain
}

/// Whether following extensions from `id` returns to an entity already seen
pub fn has_circular_extension(model: &Model, id: EntityId) -> bool {
    let chain = extension_chain(model, id);
    let last = chain.last().copied().unwrap_or(id);
    model
        .entity(last)
        .and_then(|e| e.body.extension())
        .and_then(TypeRef::entity)
        .map(|next| next == id || chain.contains(&next))
        .unwrap_or(false)
}

// =============================================================================
// Ghost Facets
// =============================================================================

/// A contextual facet inherited through extension and not redeclared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostFacet {
    /// Subtype the view is synthesized for
    pub owner: EntityId,
    /// Contextual facet entity on the supertype
    pub source: EntityId,
    pub kind: ContextualKind,
    pub facet_name: String,
    /// Source facet is declared in the owner's library
    pub local: bool,
}

impl GhostFacet {
    pub fn name(&self, model: &Model) -> String {
        let owner = model.entity(self.owner).map(|e| e.name.as_str()).unwrap_or("?");
        self.kind.facet_entity_name(owner, &self.facet_name)
    }
}

/// (kind, short name) of a contextual facet entity
fn contextual_key(model: &Model, id: EntityId) -> Option<(ContextualKind, String)> {
    match &model.entity(id)?.body {
        EntityBody::ContextualFacet(cf) => Some((cf.facet_kind, cf.facet_name.clone())),
        _ => None,
    }
}

/// Ghost facets of an object, nearest supertype first
pub fn ghost_facets(model: &Model, id: EntityId) -> Vec<GhostFacet> {
    let Some(owner) = model.entity(id) else {
        return Vec::new();
    };
    if !owner.kind().is_object() {
        return Vec::new();
    }

    let symbols = model.symbols();
    let mut seen: HashSet<(ContextualKind, String)> = symbols
        .contextual_facets_of(id)
        .iter()
        .filter_map(|cf| contextual_key(model, *cf))
        .collect();

    let mut ghosts = Vec::new();
    for ancestor in extension_chain(model, id) {
        for source in symbols.contextual_facets_of(ancestor) {
            let Some(key) = contextual_key(model, *source) else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            let local = model.entity(*source).map(|e| e.library) == Some(owner.library);
            ghosts.push(GhostFacet {
                owner: id,
                source: *source,
                kind: key.0,
                facet_name: key.1,
                local,
            });
        }
    }

    ghosts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_kind_suffix() {
        assert_eq!(FacetKind::from_suffix("ID"), Some(FacetKind::Id));
        assert_eq!(FacetKind::from_suffix("Custom"), None);
        assert!(FacetKind::Summary.rank() < FacetKind::Detail.rank());
    }

    #[test]
    fn test_contextual_entity_name() {
        assert_eq!(
            ContextualKind::Query.facet_entity_name("Order", "Find"),
            "Order_Query_Find"
        );
    }

    #[test]
    fn test_element_property_name_defaults_to_type() {
        let element: Element =
            serde_json::from_value(serde_json::json!({ "type": "b:Customer", "repeat": 3 })).unwrap();
        assert_eq!(element.property_name(), "Customer");
        assert!(element.is_repeating());
    }
}
