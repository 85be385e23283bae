//! Named entities
//!
//! The closed set of entity kinds a library can declare. Entity bodies are
//! plain data deserialized from library modules; cross references between
//! entities are [`TypeRef`]s that start out unresolved and are bound to a
//! [`Symbol`] during assembly.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::facet::{ContextualKind, FacetContent};
use super::symbols::Symbol;
use super::{EntityId, LibraryId};

// =============================================================================
// Type References
// =============================================================================

/// A reference to another entity, as written (`prefix:Name` or `Name`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TypeRef {
    pub name: String,
    /// Bound during assembly
    pub target: Option<Symbol>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }

    /// Split into (prefix, local name)
    pub fn parts(&self) -> (Option<&str>, &str) {
        match self.name.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, self.name.as_str()),
        }
    }

    pub fn local_name(&self) -> &str {
        self.parts().1
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    /// Entity this reference points at, whatever kind of symbol it bound to
    pub fn entity(&self) -> Option<EntityId> {
        self.target.map(|t| t.entity())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<TypeRef> for String {
    fn from(r: TypeRef) -> Self {
        r.name
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// =============================================================================
// Entity Kind
// =============================================================================

/// Runtime kind tag of a named entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    SimpleType,
    Enumeration,
    ValueWithAttributes,
    CoreObject,
    BusinessObject,
    ChoiceObject,
    ContextualFacet,
    ExtensionPointFacet,
    Resource,
    Service,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleType => "SimpleType",
            Self::Enumeration => "Enumeration",
            Self::ValueWithAttributes => "ValueWithAttributes",
            Self::CoreObject => "CoreObject",
            Self::BusinessObject => "BusinessObject",
            Self::ChoiceObject => "ChoiceObject",
            Self::ContextualFacet => "ContextualFacet",
            Self::ExtensionPointFacet => "ExtensionPointFacet",
            Self::Resource => "Resource",
            Self::Service => "Service",
        }
    }

    /// Kinds that own facets and can be extended
    pub fn is_object(&self) -> bool {
        matches!(self, Self::CoreObject | Self::BusinessObject | Self::ChoiceObject)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Named Entity
// =============================================================================

/// An entity owned by exactly one library
#[derive(Debug, Clone)]
pub struct NamedEntity {
    pub id: EntityId,
    /// Owning library
    pub library: LibraryId,
    /// Local name, unique within the owning library
    pub name: String,
    pub documentation: Option<String>,
    pub body: EntityBody,
}

impl NamedEntity {
    pub fn kind(&self) -> EntityKind {
        self.body.kind()
    }
}

/// Entity declaration as it appears in a library module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDecl {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(flatten)]
    pub body: EntityBody,
}

/// Kind-specific content of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityBody {
    SimpleType(SimpleType),
    Enumeration(Enumeration),
    ValueWithAttributes(ValueWithAttributes),
    CoreObject(CoreObject),
    BusinessObject(BusinessObject),
    ChoiceObject(ChoiceObject),
    ContextualFacet(ContextualFacet),
    ExtensionPointFacet(ExtensionPointFacet),
    Resource(Resource),
    Service(Service),
}

impl EntityBody {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::SimpleType(_) => EntityKind::SimpleType,
            Self::Enumeration(_) => EntityKind::Enumeration,
            Self::ValueWithAttributes(_) => EntityKind::ValueWithAttributes,
            Self::CoreObject(_) => EntityKind::CoreObject,
            Self::BusinessObject(_) => EntityKind::BusinessObject,
            Self::ChoiceObject(_) => EntityKind::ChoiceObject,
            Self::ContextualFacet(_) => EntityKind::ContextualFacet,
            Self::ExtensionPointFacet(_) => EntityKind::ExtensionPointFacet,
            Self::Resource(_) => EntityKind::Resource,
            Self::Service(_) => EntityKind::Service,
        }
    }

    /// Extension (supertype) reference of an object
    pub fn extension(&self) -> Option<&TypeRef> {
        match self {
            Self::CoreObject(o) => o.extension.as_ref(),
            Self::BusinessObject(o) => o.extension.as_ref(),
            Self::ChoiceObject(o) => o.extension.as_ref(),
            Self::Enumeration(e) => e.extension.as_ref(),
            _ => None,
        }
    }

    /// Objects declared closed to extension point facets
    pub fn not_extendable(&self) -> bool {
        match self {
            Self::CoreObject(o) => o.not_extendable,
            Self::BusinessObject(o) => o.not_extendable,
            Self::ChoiceObject(o) => o.not_extendable,
            _ => false,
        }
    }

    pub fn aliases(&self) -> &[String] {
        match self {
            Self::CoreObject(o) => &o.aliases,
            Self::BusinessObject(o) => &o.aliases,
            Self::ChoiceObject(o) => &o.aliases,
            _ => &[],
        }
    }

    /// Every type reference held by this body, in declaration order
    pub fn type_refs(&self) -> Vec<&TypeRef> {
        let mut refs = Vec::new();
        match self {
            Self::SimpleType(t) => refs.extend(t.base.as_ref()),
            Self::Enumeration(e) => refs.extend(e.extension.as_ref()),
            Self::ValueWithAttributes(v) => {
                refs.extend(v.value_type.as_ref());
                v.content.collect_refs(&mut refs);
            }
            Self::CoreObject(o) => {
                refs.extend(o.extension.as_ref());
                refs.extend(o.simple_type.as_ref());
                o.summary.collect_refs(&mut refs);
                o.detail.collect_refs(&mut refs);
            }
            Self::BusinessObject(o) => {
                refs.extend(o.extension.as_ref());
                o.id.collect_refs(&mut refs);
                o.summary.collect_refs(&mut refs);
                o.detail.collect_refs(&mut refs);
            }
            Self::ChoiceObject(o) => {
                refs.extend(o.extension.as_ref());
                o.shared.collect_refs(&mut refs);
            }
            Self::ContextualFacet(f) => {
                refs.push(&f.owner);
                f.content.collect_refs(&mut refs);
            }
            Self::ExtensionPointFacet(f) => {
                refs.push(&f.extends);
                f.content.collect_refs(&mut refs);
            }
            Self::Resource(r) => r.collect_refs(&mut refs),
            Self::Service(s) => {
                for op in &s.operations {
                    for message in op.messages() {
                        message.1.collect_refs(&mut refs);
                    }
                }
            }
        }
        refs
    }

    /// Mutable access to every type reference, same order as [`Self::type_refs`]
    pub fn type_refs_mut(&mut self) -> Vec<&mut TypeRef> {
        let mut refs = Vec::new();
        match self {
            Self::SimpleType(t) => refs.extend(t.base.as_mut()),
            Self::Enumeration(e) => refs.extend(e.extension.as_mut()),
            Self::ValueWithAttributes(v) => {
                refs.extend(v.value_type.as_mut());
                v.content.collect_refs_mut(&mut refs);
            }
            Self::CoreObject(o) => {
                refs.extend(o.extension.as_mut());
                refs.extend(o.simple_type.as_mut());
                o.summary.collect_refs_mut(&mut refs);
                o.detail.collect_refs_mut(&mut refs);
            }
            Self::BusinessObject(o) => {
                refs.extend(o.extension.as_mut());
                o.id.collect_refs_mut(&mut refs);
                o.summary.collect_refs_mut(&mut refs);
                o.detail.collect_refs_mut(&mut refs);
            }
            Self::ChoiceObject(o) => {
                refs.extend(o.extension.as_mut());
                o.shared.collect_refs_mut(&mut refs);
            }
            Self::ContextualFacet(f) => {
                refs.push(&mut f.owner);
                f.content.collect_refs_mut(&mut refs);
            }
            Self::ExtensionPointFacet(f) => {
                refs.push(&mut f.extends);
                f.content.collect_refs_mut(&mut refs);
            }
            Self::Resource(r) => r.collect_refs_mut(&mut refs),
            Self::Service(s) => {
                for op in &mut s.operations {
                    for message in [&mut op.request, &mut op.response, &mut op.notification]
                        .into_iter()
                        .flatten()
                    {
                        message.collect_refs_mut(&mut refs);
                    }
                }
            }
        }
        refs
    }
}

// =============================================================================
// Simple Kinds
// =============================================================================

/// Restriction of a primitive or another simple type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction_digits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_digits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_inclusive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_inclusive: Option<String>,
    /// Whitespace separated list of the base type
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
}

/// Open or closed enumeration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enumeration {
    /// Open enumerations accept values outside the list
    pub open: bool,
    pub values: Vec<EnumValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub literal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// A simple value carrying attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueWithAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<TypeRef>,
    #[serde(flatten)]
    pub content: FacetContent,
}

// =============================================================================
// Objects
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<TypeRef>,
    /// Type of the simple facet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simple_type: Option<TypeRef>,
    pub summary: FacetContent,
    pub detail: FacetContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub not_extendable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<TypeRef>,
    pub id: FacetContent,
    pub summary: FacetContent,
    pub detail: FacetContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub not_extendable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChoiceObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<TypeRef>,
    pub shared: FacetContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub not_extendable: bool,
}

/// Facet attached to an owning object under a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualFacet {
    pub facet_kind: ContextualKind,
    /// Short facet name; the entity name is derived from owner, kind and this
    pub facet_name: String,
    pub owner: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(flatten)]
    pub content: FacetContent,
}

/// Adds content to a facet of an object declared elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPointFacet {
    /// Facet being extended (`prefix:Owner_Summary`)
    pub extends: TypeRef,
    #[serde(flatten)]
    pub content: FacetContent,
}

// =============================================================================
// Resources
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_object: Option<TypeRef>,
    pub base_path: String,
    #[serde(rename = "abstract", skip_serializing_if = "std::ops::Not::not")]
    pub is_abstract: bool,
    pub first_class: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_groups: Vec<ParameterGroup>,
    pub actions: Vec<ResourceAction>,
}

impl Resource {
    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a TypeRef>) {
        refs.extend(self.business_object.as_ref());
        for parent in &self.parents {
            refs.push(&parent.resource);
        }
        for group in &self.parameter_groups {
            refs.extend(group.facet.as_ref());
        }
        for action in &self.actions {
            refs.extend(action.request.payload.as_ref());
            for response in &action.responses {
                refs.extend(response.payload.as_ref());
            }
        }
    }

    fn collect_refs_mut<'a>(&'a mut self, refs: &mut Vec<&'a mut TypeRef>) {
        refs.extend(self.business_object.as_mut());
        for parent in &mut self.parents {
            refs.push(&mut parent.resource);
        }
        for group in &mut self.parameter_groups {
            refs.extend(group.facet.as_mut());
        }
        for action in &mut self.actions {
            refs.extend(action.request.payload.as_mut());
            for response in &mut action.responses {
                refs.extend(response.payload.as_mut());
            }
        }
    }

    pub fn parameter_group(&self, name: &str) -> Option<&ParameterGroup> {
        self.parameter_groups.iter().find(|g| g.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub resource: TypeRef,
    #[serde(default)]
    pub path_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterGroup {
    pub name: String,
    #[serde(default)]
    pub id_group: bool,
    /// Facet the parameters are drawn from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<TypeRef>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub field_name: String,
    #[serde(default)]
    pub location: ParameterLocation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    #[default]
    Path,
    Query,
    Header,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAction {
    pub action_id: String,
    #[serde(default)]
    pub common: bool,
    pub request: ActionRequest,
    #[serde(default)]
    pub responses: Vec<ActionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub method: HttpMethod,
    #[serde(default)]
    pub path_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mime_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub status_codes: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mime_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_lower(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
        }
    }
}

// =============================================================================
// Services
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    pub operations: Vec<Operation>,
}

/// Message direction of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    Request,
    Response,
    Notification,
}

impl MessageKind {
    /// Suffix used in operation-scoped names
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Request => "RQ",
            Self::Response => "RS",
            Self::Notification => "Notif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<FacetContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<FacetContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<FacetContent>,
}

impl Operation {
    /// Declared messages in request, response, notification order
    pub fn messages(&self) -> Vec<(MessageKind, &FacetContent)> {
        [
            (MessageKind::Request, self.request.as_ref()),
            (MessageKind::Response, self.response.as_ref()),
            (MessageKind::Notification, self.notification.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, content)| content.map(|c| (kind, c)))
        .collect()
    }

    /// Operation-scoped message name (`{Service}_{Operation}_RQ`)
    pub fn message_name(&self, service: &str, kind: MessageKind) -> String {
        format!("{}_{}_{}", service, self.name, kind.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_parts() {
        let r = TypeRef::new("b:BaseOrder");
        assert_eq!(r.parts(), (Some("b"), "BaseOrder"));
        assert_eq!(TypeRef::new("Order").parts(), (None, "Order"));
    }

    #[test]
    fn test_member_decl_deserializes_tagged_body() {
        let member: MemberDecl = serde_json::from_value(serde_json::json!({
            "kind": "businessObject",
            "name": "Order",
            "extension": "b:BaseOrder",
            "id": { "elements": [{ "name": "OrderID", "type": "xsd:string" }] }
        }))
        .unwrap();
        assert_eq!(member.body.kind(), EntityKind::BusinessObject);
        let refs = member.body.type_refs();
        assert_eq!(refs[0].name, "b:BaseOrder");
        assert_eq!(refs[1].name, "xsd:string");
    }

    #[test]
    fn test_operation_message_names() {
        let op = Operation {
            name: "Create".into(),
            request: Some(FacetContent::default()),
            response: Some(FacetContent::default()),
            notification: None,
        };
        assert_eq!(op.messages().len(), 2);
        assert_eq!(op.message_name("OrderService", MessageKind::Request), "OrderService_Create_RQ");
    }
}
