//! Entity to schema component transformers
//!
//! One function per entity kind, registered in the
//! [`TransformerRegistry`](crate::codegen::TransformerRegistry) under
//! `TargetFormat::XmlSchema`. Each returns the global components the entity
//! contributes to its library's document, in declaration order.
//!
//! Facet types are flattened: a facet type carries the content of every
//! supertype and every lower facet (ID < Summary < Detail) instead of
//! deriving from the supertype's facet type.

use std::collections::HashSet;

use super::model::{
    AttributeDef, ComplexContent, ComplexTypeDef, Component, ElementDef, Facet, Particle, QName,
    SimpleDerivation, SimpleTypeDef, Term,
};
use crate::codegen::context::{default_facet, GenerationContext};
use crate::codegen::names;
use crate::error::Result;
use crate::model::builtins::OTM_COMMON_NAMESPACE;
use crate::model::entity::{ContextualFacet, CoreObject};
use crate::model::{EntityBody, FacetContent, FacetKind, LibraryId, NamedEntity, Symbol, TypeRef};

// =============================================================================
// Simple Kinds
// =============================================================================

pub fn simple_type(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::SimpleType(simple) = &entity.body else {
        return Ok(Vec::new());
    };
    let base = simple
        .base
        .as_ref()
        .map(|b| type_qname(ctx, b, entity.library))
        .unwrap_or_else(|| QName::xsd("string"));

    let derivation = if simple.list {
        SimpleDerivation::List { item: base }
    } else {
        let mut facets = Vec::new();
        if let Some(pattern) = &simple.pattern {
            facets.push(Facet::Pattern(pattern.clone()));
        }
        facets.extend(simple.min_length.map(Facet::MinLength));
        facets.extend(simple.max_length.map(Facet::MaxLength));
        facets.extend(simple.fraction_digits.map(Facet::FractionDigits));
        facets.extend(simple.total_digits.map(Facet::TotalDigits));
        facets.extend(simple.min_inclusive.clone().map(Facet::MinInclusive));
        facets.extend(simple.max_inclusive.clone().map(Facet::MaxInclusive));
        SimpleDerivation::Restriction { base, facets }
    };

    Ok(vec![Component::SimpleType(SimpleTypeDef {
        name: entity.name.clone(),
        documentation: entity.documentation.clone(),
        derivation,
    })])
}

/// Closed enumerations become a restricted string; open ones a `_Base`
/// restriction admitting `Other_` plus a simple-content type with an
/// `extension` attribute carrying the actual value.
pub fn enumeration(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::Enumeration(enumeration) = &entity.body else {
        return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut facets = Vec::new();
    let chain = ctx.extension_chain(entity.id);
    for owner in chain.iter().rev().chain(std::iter::once(&entity.id)) {
        let Some(EntityBody::Enumeration(e)) = ctx.model().entity(*owner).map(|e| &e.body) else {
            continue;
        };
        for value in &e.values {
            if seen.insert(value.literal.clone()) {
                facets.push(Facet::Enumeration {
                    value: value.literal.clone(),
                    documentation: value.documentation.clone(),
                });
            }
        }
    }

    if !enumeration.open {
        return Ok(vec![Component::SimpleType(SimpleTypeDef {
            name: entity.name.clone(),
            documentation: entity.documentation.clone(),
            derivation: SimpleDerivation::Restriction {
                base: QName::xsd("string"),
                facets,
            },
        })]);
    }

    if seen.insert(names::OPEN_ENUM_OTHER.to_string()) {
        facets.push(Facet::Enumeration {
            value: names::OPEN_ENUM_OTHER.to_string(),
            documentation: None,
        });
    }
    let base_name = names::open_enum_base_name(&entity.name);
    Ok(vec![
        Component::SimpleType(SimpleTypeDef {
            name: base_name.clone(),
            documentation: None,
            derivation: SimpleDerivation::Restriction {
                base: QName::xsd("string"),
                facets,
            },
        }),
        Component::ComplexType(ComplexTypeDef {
            name: entity.name.clone(),
            documentation: entity.documentation.clone(),
            content: ComplexContent::SimpleExtension(own_name(ctx, entity, base_name)),
            attributes: vec![AttributeDef {
                name: "extension".into(),
                type_name: QName::xsd("string"),
                required: false,
                documentation: None,
            }],
        }),
    ])
}

pub fn value_with_attributes(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::ValueWithAttributes(vwa) = &entity.body else {
        return Ok(Vec::new());
    };
    let base = vwa
        .value_type
        .as_ref()
        .map(|t| type_qname(ctx, t, entity.library))
        .unwrap_or_else(|| QName::in_namespace(OTM_COMMON_NAMESPACE, "Empty"));

    let mut attributes = attributes(ctx, &vwa.content, entity.library);
    attributes.extend(vwa.content.indicators.iter().map(|i| AttributeDef {
        name: i.name.clone(),
        type_name: QName::xsd("boolean"),
        required: false,
        documentation: i.documentation.clone(),
    }));

    Ok(vec![Component::ComplexType(ComplexTypeDef {
        name: entity.name.clone(),
        documentation: entity.documentation.clone(),
        content: ComplexContent::SimpleExtension(base),
        attributes,
    })])
}

// =============================================================================
// Objects
// =============================================================================

pub fn core_object(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::CoreObject(core) = &entity.body else {
        return Ok(Vec::new());
    };
    let mut components = vec![Component::SimpleType(SimpleTypeDef {
        name: names::facet_type_name(&entity.name, FacetKind::Simple),
        documentation: None,
        derivation: SimpleDerivation::Restriction {
            base: core_simple_base(ctx, entity, core),
            facets: Vec::new(),
        },
    })];

    if !core.roles.is_empty() {
        components.push(Component::SimpleType(SimpleTypeDef {
            name: format!("{}_Role", entity.name),
            documentation: None,
            derivation: SimpleDerivation::Restriction {
                base: QName::xsd("string"),
                facets: core
                    .roles
                    .iter()
                    .map(|role| Facet::Enumeration {
                        value: role.clone(),
                        documentation: None,
                    })
                    .collect(),
            },
        }));
    }

    components.extend(fixed_facet_components(
        ctx,
        entity,
        &[FacetKind::Summary, FacetKind::Detail],
    ));
    components.extend(ghost_facet_components(ctx, entity));
    Ok(components)
}

pub fn business_object(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::BusinessObject(_) = &entity.body else {
        return Ok(Vec::new());
    };
    let mut components = fixed_facet_components(
        ctx,
        entity,
        &[FacetKind::Id, FacetKind::Summary, FacetKind::Detail],
    );
    components.extend(ghost_facet_components(ctx, entity));
    Ok(components)
}

pub fn choice_object(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::ChoiceObject(_) = &entity.body else {
        return Ok(Vec::new());
    };
    let mut components = fixed_facet_components(ctx, entity, &[FacetKind::Shared]);
    components.extend(ghost_facet_components(ctx, entity));
    Ok(components)
}

/// A contextual facet declared in this library, possibly on a foreign owner
pub fn contextual_facet(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::ContextualFacet(cf) = &entity.body else {
        return Ok(Vec::new());
    };
    let owner = cf.owner.entity().and_then(|id| ctx.model().entity(id));
    let content = contextual_content(ctx, owner, cf, &cf.content);
    let kind = cf.facet_kind.facet_kind();
    let owner_name = owner.map(|o| o.name.as_str()).unwrap_or(cf.owner.local_name());
    let closed = owner.is_some_and(|o| o.body.not_extendable());

    Ok(vec![
        Component::ComplexType(facet_type(
            ctx,
            entity.name.clone(),
            entity.documentation.clone(),
            &content,
            (!closed).then_some(kind),
            entity.library,
        )),
        Component::Element(ElementDef {
            name: names::contextual_element_name(owner_name, kind, &cf.facet_name),
            type_name: own_name(ctx, entity, entity.name.clone()),
            substitution_group: None,
            documentation: None,
        }),
    ])
}

/// Extension point facets extend the built-in extension point type and join
/// the substitution group of the facet they extend.
pub fn extension_point_facet(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<Component>> {
    let EntityBody::ExtensionPointFacet(ep) = &entity.body else {
        return Ok(Vec::new());
    };
    let name = ctx.extension_point_type_name(entity, &ep.extends);
    let group = extended_facet(ctx, &ep.extends)
        .and_then(names::extension_point_element)
        .filter(|_| !ctx.options().suppress_extensions);

    let mut def = facet_type(
        ctx,
        name.clone(),
        entity.documentation.clone(),
        &ep.content,
        None,
        entity.library,
    );
    if group.is_some() {
        if let ComplexContent::Sequence(particles) = def.content {
            def.content = ComplexContent::Extension {
                base: QName::in_namespace(OTM_COMMON_NAMESPACE, "ExtensionPoint_Type"),
                particles,
            };
        }
    }

    Ok(vec![
        Component::ComplexType(def),
        Component::Element(ElementDef {
            name: name.clone(),
            type_name: own_name(ctx, entity, name),
            substitution_group: group.map(|g| QName::in_namespace(OTM_COMMON_NAMESPACE, g)),
            documentation: None,
        }),
    ])
}

/// Resources and services have no library-level schema components
pub fn nothing(_ctx: &GenerationContext, _entity: &NamedEntity) -> Result<Vec<Component>> {
    Ok(Vec::new())
}

// =============================================================================
// Facets
// =============================================================================

/// Types and elements of an object's fixed facets, repeated for each alias
fn fixed_facet_components(
    ctx: &GenerationContext,
    entity: &NamedEntity,
    kinds: &[FacetKind],
) -> Vec<Component> {
    let mut components = Vec::new();
    for kind in kinds {
        let type_name = names::facet_type_name(&entity.name, *kind);
        let content = ctx.facet_content(entity.id, *kind);
        let documentation = (*kind == default_facet(&entity.body))
            .then(|| entity.documentation.clone())
            .flatten();
        components.push(Component::ComplexType(facet_type(
            ctx,
            type_name.clone(),
            documentation,
            &content,
            extension_kind(entity, *kind),
            entity.library,
        )));

        for element_owner in std::iter::once(&entity.name).chain(entity.body.aliases()) {
            if let Some(element) = names::facet_element_name(element_owner, *kind) {
                components.push(Component::Element(ElementDef {
                    name: element,
                    type_name: own_name(ctx, entity, type_name.clone()),
                    substitution_group: None,
                    documentation: None,
                }));
            }
        }
    }
    components
}

/// Facet kind whose extension point closes a sequence; none for closed objects
fn extension_kind(entity: &NamedEntity, kind: FacetKind) -> Option<FacetKind> {
    (!entity.body.not_extendable()).then_some(kind)
}

/// Inherited contextual facets an object does not redeclare
fn ghost_facet_components(ctx: &GenerationContext, entity: &NamedEntity) -> Vec<Component> {
    let mut components = Vec::new();
    for ghost in ctx.ghost_facets(entity.id).iter() {
        let Some(source) = ctx.model().entity(ghost.source) else {
            continue;
        };
        let EntityBody::ContextualFacet(cf) = &source.body else {
            continue;
        };
        let content = contextual_content(ctx, Some(entity), cf, &cf.content);
        let type_name = ghost.name(ctx.model());
        let kind = ghost.kind.facet_kind();
        components.push(Component::ComplexType(facet_type(
            ctx,
            type_name.clone(),
            source.documentation.clone(),
            &content,
            extension_kind(entity, kind),
            entity.library,
        )));
        components.push(Component::Element(ElementDef {
            name: names::contextual_element_name(&entity.name, kind, &ghost.facet_name),
            type_name: own_name(ctx, entity, type_name),
            substitution_group: None,
            documentation: None,
        }));
    }
    components
}

/// Content of a contextual facet as seen on `owner`
///
/// Query facets carry only their own fields; the other kinds start from
/// the owner's default facet.
pub(crate) fn contextual_content(
    ctx: &GenerationContext,
    owner: Option<&NamedEntity>,
    cf: &ContextualFacet,
    own: &FacetContent,
) -> FacetContent {
    let mut content = FacetContent::default();
    if cf.facet_kind.facet_kind() != FacetKind::Query {
        if let Some(owner) = owner.filter(|o| o.kind().is_object()) {
            content.extend_from(&ctx.facet_content(owner.id, default_facet(&owner.body)));
        }
    }
    content.extend_from(own);
    content
}

/// Complex type for facet content
///
/// `kind` selects the extension point element the sequence ends with;
/// `None` leaves the sequence closed.
pub(crate) fn facet_type(
    ctx: &GenerationContext,
    name: String,
    documentation: Option<String>,
    content: &FacetContent,
    kind: Option<FacetKind>,
    from: LibraryId,
) -> ComplexTypeDef {
    let mut particles = Vec::new();
    let mut attributes = attributes(ctx, content, from);

    for element in &content.elements {
        let min_occurs = u32::from(element.mandatory);
        if element.reference {
            let id_type = if element.is_repeating() { "IDREFS" } else { "IDREF" };
            particles.push(Particle {
                term: Term::Element {
                    name: format!("{}Ref", element.property_name()),
                    type_name: QName::xsd(id_type),
                    documentation: element.documentation.clone(),
                },
                min_occurs,
                max_occurs: Some(1),
            });
            continue;
        }
        let max_occurs = if element.unbounded {
            None
        } else {
            Some(element.repeat.max(1))
        };
        particles.push(Particle {
            term: Term::Element {
                name: element.property_name().to_string(),
                type_name: type_qname(ctx, &element.type_ref, from),
                documentation: element.documentation.clone(),
            },
            min_occurs,
            max_occurs,
        });
    }

    for indicator in &content.indicators {
        if indicator.publish_as_element {
            particles.push(Particle {
                term: Term::Element {
                    name: indicator.name.clone(),
                    type_name: QName::xsd("boolean"),
                    documentation: indicator.documentation.clone(),
                },
                min_occurs: 0,
                max_occurs: Some(1),
            });
        } else {
            attributes.push(AttributeDef {
                name: indicator.name.clone(),
                type_name: QName::xsd("boolean"),
                required: false,
                documentation: indicator.documentation.clone(),
            });
        }
    }

    if !ctx.options().suppress_extensions {
        if let Some(element) = kind.and_then(names::extension_point_element) {
            particles.push(Particle {
                term: Term::Ref(QName::in_namespace(OTM_COMMON_NAMESPACE, element)),
                min_occurs: 0,
                max_occurs: Some(1),
            });
        }
    }

    ComplexTypeDef {
        name,
        documentation,
        content: ComplexContent::Sequence(particles),
        attributes,
    }
}

fn attributes(ctx: &GenerationContext, content: &FacetContent, from: LibraryId) -> Vec<AttributeDef> {
    content
        .attributes
        .iter()
        .map(|a| AttributeDef {
            name: a.name.clone(),
            type_name: type_qname(ctx, &a.type_ref, from),
            required: a.mandatory,
            documentation: a.documentation.clone(),
        })
        .collect()
}

// =============================================================================
// Names
// =============================================================================

/// Qualified type name a reference denotes when written from library `from`
///
/// Unresolved references have already been reported; they fall back to
/// `xsd:string` so the document stays well-formed.
pub fn type_qname(ctx: &GenerationContext, type_ref: &TypeRef, from: LibraryId) -> QName {
    match type_ref.target.and_then(|symbol| Some((symbol, ctx.type_name(symbol)?))) {
        Some((symbol, local)) => QName::new(ctx.entity_namespace(symbol.entity(), Some(from)), local),
        None => QName::xsd("string"),
    }
}

/// Name in the entity's own output namespace
fn own_name(ctx: &GenerationContext, entity: &NamedEntity, local: String) -> QName {
    QName::new(ctx.entity_namespace(entity.id, Some(entity.library)), local)
}

fn core_simple_base(ctx: &GenerationContext, entity: &NamedEntity, core: &CoreObject) -> QName {
    core.simple_type
        .as_ref()
        .map(|t| type_qname(ctx, t, entity.library))
        .unwrap_or_else(|| QName::xsd("string"))
}

/// Facet kind an extension point targets
fn extended_facet(ctx: &GenerationContext, extends: &TypeRef) -> Option<FacetKind> {
    match extends.target? {
        Symbol::Facet { facet, .. } => Some(facet),
        Symbol::Entity(id) | Symbol::Alias { owner: id, .. } => {
            let owner = ctx.model().entity(id)?;
            owner.kind().is_object().then(|| default_facet(&owner.body))
        }
        Symbol::Ghost { source, .. } => match &ctx.model().entity(source)?.body {
            EntityBody::ContextualFacet(cf) => Some(cf.facet_kind.facet_kind()),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{GenerationOptions, TransformerRegistry};
    use crate::filter::CodeGenerationFilter;
    use crate::loader::{GrammarVersion, LibraryModule};
    use crate::model::facet::ghost_facets;
    use crate::model::{Assembly, ImportDecl, LibraryHeader, MemberDecl, Model};
    use crate::version::OtmVersionScheme;
    use std::sync::Arc;
    use url::Url;

    const NS: &str = "http://example.com/ns/Orders/v01";

    const BASE_NS: &str = "http://example.com/ns/Base/v01";

    fn module(
        name: &str,
        namespace: &str,
        prefix: &str,
        imports: Vec<ImportDecl>,
        members: serde_json::Value,
    ) -> LibraryModule {
        LibraryModule {
            url: Url::parse(&format!("file:///libs/{}.otm", name)).unwrap(),
            grammar: GrammarVersion::V01_06,
            header: LibraryHeader {
                name: name.into(),
                namespace: Some(namespace.into()),
                prefix: Some(prefix.into()),
                version: Some("1.0.0".into()),
                ..LibraryHeader::default()
            },
            imports,
            includes: Vec::new(),
            contexts: Vec::new(),
            members: serde_json::from_value::<Vec<MemberDecl>>(members).unwrap(),
        }
    }

    fn assemble(modules: Vec<LibraryModule>) -> Model {
        Assembly::from_modules(modules, Arc::new(OtmVersionScheme::new()))
            .unwrap()
            .model
    }

    fn model(members: serde_json::Value) -> Model {
        assemble(vec![module("Orders", NS, "o", Vec::new(), members)])
    }

    fn transform(
        model: &Model,
        options: &GenerationOptions,
        name: &str,
        f: fn(&GenerationContext, &NamedEntity) -> Result<Vec<Component>>,
    ) -> Vec<Component> {
        let registry = TransformerRegistry::standard();
        let ctx = GenerationContext::new(
            model,
            CodeGenerationFilter::everything(model),
            options,
            &registry,
            vec![],
            None,
        );
        let entity = model.entity(model.find_entity(name).unwrap()).unwrap();
        f(&ctx, entity).unwrap()
    }

    fn names(components: &[Component]) -> Vec<&str> {
        components.iter().map(Component::name).collect()
    }

    #[test]
    fn test_business_object_facets() {
        let model = model(serde_json::json!([
            { "kind": "businessObject", "name": "Order", "aliases": ["Booking"],
              "id": { "attributes": [{ "name": "orderId", "type": "xsd:string", "mandatory": true }] },
              "summary": { "elements": [{ "name": "Lines", "type": "xsd:string", "unbounded": true }] } }
        ]));
        let options = GenerationOptions::new("/tmp/out");
        let components = transform(&model, &options, "Order", business_object);

        assert_eq!(
            names(&components),
            vec![
                "Order_ID", "OrderID", "BookingID",
                "Order_Summary", "Order", "Booking",
                "Order_Detail", "OrderDetail", "BookingDetail",
            ]
        );
        let Component::ComplexType(detail) = &components[6] else {
            panic!("expected complex type");
        };
        assert_eq!(detail.attributes[0].name, "orderId");
        assert!(detail.attributes[0].required);
        let ComplexContent::Sequence(particles) = &detail.content else {
            panic!("expected sequence");
        };
        assert_eq!(particles[0].max_occurs, None);
        assert_eq!(
            particles.last().unwrap().term,
            Term::Ref(QName::in_namespace(OTM_COMMON_NAMESPACE, "ExtensionPoint_Detail"))
        );
    }

    #[test]
    fn test_suppressed_extensions_close_sequences() {
        let model = model(serde_json::json!([
            { "kind": "choiceObject", "name": "Payment",
              "shared": { "attributes": [{ "name": "amount", "type": "xsd:decimal" }] } }
        ]));
        let mut options = GenerationOptions::new("/tmp/out");
        options.suppress_extensions = true;
        let components = transform(&model, &options, "Payment", choice_object);

        assert_eq!(names(&components), vec!["Payment_Shared", "Payment"]);
        let Component::ComplexType(shared) = &components[0] else {
            panic!("expected complex type");
        };
        assert_eq!(shared.content, ComplexContent::Sequence(vec![]));
    }

    #[test]
    fn test_open_enumeration() {
        let model = model(serde_json::json!([
            { "kind": "enumeration", "name": "Color", "open": true,
              "values": [{ "literal": "Red" }, { "literal": "Blue" }] }
        ]));
        let options = GenerationOptions::new("/tmp/out");
        let components = transform(&model, &options, "Color", enumeration);

        assert_eq!(names(&components), vec!["Color_Base", "Color"]);
        let Component::SimpleType(base) = &components[0] else {
            panic!("expected simple type");
        };
        let SimpleDerivation::Restriction { facets, .. } = &base.derivation else {
            panic!("expected restriction");
        };
        let values: Vec<String> = facets.iter().map(Facet::value).collect();
        assert_eq!(values, vec!["Red", "Blue", "Other_"]);
        let Component::ComplexType(wrapper) = &components[1] else {
            panic!("expected complex type");
        };
        assert_eq!(
            wrapper.content,
            ComplexContent::SimpleExtension(QName::in_namespace(NS, "Color_Base"))
        );
    }

    #[test]
    fn test_reference_elements_use_idrefs() {
        let model = model(serde_json::json!([
            { "kind": "businessObject", "name": "Customer",
              "id": { "attributes": [{ "name": "id", "type": "xsd:ID" }] } },
            { "kind": "valueWithAttributes", "name": "Amount", "valueType": "xsd:decimal",
              "attributes": [{ "name": "currency", "type": "xsd:string" }],
              "indicators": [{ "name": "estimated" }] },
            { "kind": "coreObject", "name": "Visit",
              "summary": { "elements": [
                  { "type": "Customer", "reference": true, "repeat": 3 },
                  { "name": "Price", "type": "Amount" }
              ] } }
        ]));
        let options = GenerationOptions::new("/tmp/out");
        let components = transform(&model, &options, "Visit", core_object);
        let Component::ComplexType(summary) = &components[1] else {
            panic!("expected complex type");
        };
        let ComplexContent::Sequence(particles) = &summary.content else {
            panic!("expected sequence");
        };
        assert_eq!(
            particles[0].term,
            Term::Element {
                name: "CustomerRef".into(),
                type_name: QName::xsd("IDREFS"),
                documentation: None,
            }
        );
        assert_eq!(
            particles[1].term,
            Term::Element {
                name: "Price".into(),
                type_name: QName::in_namespace(NS, "Amount"),
                documentation: None,
            }
        );

        let vwa = transform(&model, &options, "Amount", value_with_attributes);
        let Component::ComplexType(amount) = &vwa[0] else {
            panic!("expected complex type");
        };
        let attrs: Vec<&str> = amount.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attrs, vec!["currency", "estimated"]);
    }

    fn complex_type<'c>(components: &'c [Component], name: &str) -> &'c ComplexTypeDef {
        components
            .iter()
            .find_map(|c| match c {
                Component::ComplexType(def) if def.name == name => Some(def),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no complex type {}", name))
    }

    #[test]
    fn test_not_extendable_objects_have_no_extension_points() {
        let model = model(serde_json::json!([
            { "kind": "businessObject", "name": "Receipt", "notExtendable": true,
              "summary": { "elements": [{ "name": "Total", "type": "xsd:decimal" }] } },
            { "kind": "contextualFacet", "facetKind": "custom", "facetName": "Print", "owner": "Receipt",
              "elements": [{ "name": "Copies", "type": "xsd:int" }] }
        ]));
        let options = GenerationOptions::new("/tmp/out");

        let receipt = transform(&model, &options, "Receipt", business_object);
        for facet in ["Receipt_ID", "Receipt_Summary", "Receipt_Detail"] {
            let ComplexContent::Sequence(particles) = &complex_type(&receipt, facet).content else {
                panic!("expected sequence");
            };
            assert!(
                particles.iter().all(|p| !matches!(p.term, Term::Ref(_))),
                "{} ends with an extension point",
                facet
            );
        }

        let print = transform(&model, &options, "Receipt_Custom_Print", contextual_facet);
        let ComplexContent::Sequence(particles) = &complex_type(&print, "Receipt_Custom_Print").content else {
            panic!("expected sequence");
        };
        assert!(particles.iter().all(|p| !matches!(p.term, Term::Ref(_))));
    }

    #[test]
    fn test_ghost_facet_in_same_library() {
        let model = model(serde_json::json!([
            { "kind": "businessObject", "name": "BaseOrder",
              "summary": { "elements": [{ "name": "Status", "type": "xsd:string" }] } },
            { "kind": "contextualFacet", "facetKind": "query", "facetName": "Find", "owner": "BaseOrder",
              "elements": [{ "name": "Since", "type": "xsd:date" }] },
            { "kind": "businessObject", "name": "Order", "extension": "BaseOrder" }
        ]));
        let order = model.find_entity("Orders:Order").unwrap();
        let ghosts = ghost_facets(&model, order);
        assert_eq!(ghosts.len(), 1);
        assert!(ghosts[0].local);

        let options = GenerationOptions::new("/tmp/out");
        let parent = transform(&model, &options, "BaseOrder_Query_Find", contextual_facet);
        let ghost = transform(&model, &options, "Order", business_object);
        assert_eq!(
            complex_type(&ghost, "Order_Query_Find").content,
            complex_type(&parent, "BaseOrder_Query_Find").content
        );
    }

    #[test]
    fn test_ghost_facet_from_other_library() {
        let base = module(
            "Base",
            BASE_NS,
            "b",
            Vec::new(),
            serde_json::json!([
                { "kind": "businessObject", "name": "BaseOrder",
                  "summary": { "elements": [{ "name": "Status", "type": "xsd:string" }] } },
                { "kind": "contextualFacet", "facetKind": "query", "facetName": "Find", "owner": "BaseOrder",
                  "elements": [{ "name": "Since", "type": "xsd:date" }] }
            ]),
        );
        let orders = module(
            "Orders",
            NS,
            "o",
            vec![ImportDecl {
                namespace: Some(BASE_NS.into()),
                prefix: Some("b".into()),
                file_hints: vec!["Base.otm".into()],
            }],
            serde_json::json!([
                { "kind": "businessObject", "name": "Order", "extension": "b:BaseOrder" }
            ]),
        );
        let model = assemble(vec![base, orders]);
        let order = model.find_entity("Orders:Order").unwrap();
        let ghosts = ghost_facets(&model, order);
        assert_eq!(ghosts.len(), 1);
        assert!(!ghosts[0].local);
        assert_eq!(ghosts[0].name(&model), "Order_Query_Find");

        let options = GenerationOptions::new("/tmp/out");
        let parent = transform(&model, &options, "Base:BaseOrder_Query_Find", contextual_facet);
        let ghost = transform(&model, &options, "Orders:Order", business_object);
        assert_eq!(
            complex_type(&ghost, "Order_Query_Find").content,
            complex_type(&parent, "BaseOrder_Query_Find").content
        );
    }
}
