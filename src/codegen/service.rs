//! Service schemas
//!
//! Two document families, both in the namespace of the declaring library:
//! - `{Service}_Messages.xsd`: one element and type per operation message
//!   (`{Service}_{Operation}_RQ` / `_RS` / `_Notif`)
//! - `{BusinessObject}_RAS.xsd`: generic request/response messages that
//!   fetch a business object by identifier in a chosen facet
//!
//! Both are written as `TargetFormat::ServiceSchema` and go through the same
//! import consolidation as the library schemas.

use tracing::debug;

use super::context::GenerationContext;
use super::names;
use super::xsd::library_hosts;
use super::xsd::model::{
    AttributeDef, ComplexContent, ComplexTypeDef, Component, ElementDef, Facet, Particle, QName,
    Schema, SimpleDerivation, SimpleTypeDef, Term, XsdDocument,
};
use super::xsd::transform::facet_type;
use crate::error::Result;
use crate::model::{EntityBody, FacetKind, NamedEntity};

/// Service documents for every in-scope entity with a service transformer
pub fn emit(ctx: &GenerationContext) -> Result<Vec<XsdDocument>> {
    let mut documents = Vec::new();
    for library in ctx.library_order() {
        ctx.check_cancelled()?;
        for entity in ctx.emitted_entities(*library) {
            if !ctx
                .registry()
                .contains(entity.kind(), super::TargetFormat::ServiceSchema)
            {
                continue;
            }
            let transform = ctx.registry().service(entity.kind())?;
            documents.extend(transform(ctx, entity)?);
        }
    }
    Ok(documents)
}

/// `{Service}_Messages.xsd`
pub fn messages(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<XsdDocument>> {
    let EntityBody::Service(service) = &entity.body else {
        return Ok(Vec::new());
    };
    let Some(mut document) = service_document(ctx, entity, names::service_file_name(&entity.name)) else {
        return Ok(Vec::new());
    };

    if let Some(endpoint) = &ctx.options().service_endpoint_url {
        document.schema.documentation = Some(format!("Service endpoint: {}", endpoint));
    }

    for operation in &service.operations {
        for (kind, content) in operation.messages() {
            let name = operation.message_name(&entity.name, kind);
            document.schema.components.push(Component::ComplexType(facet_type(
                ctx,
                name.clone(),
                None,
                content,
                None,
                entity.library,
            )));
            document.schema.components.push(Component::Element(ElementDef {
                type_name: QName::new(document.schema.target_namespace.clone(), name.clone()),
                name,
                substitution_group: None,
                documentation: None,
            }));
        }
    }

    debug!(service = %entity.name, operations = service.operations.len(), "Emitted service schema");
    Ok(vec![document])
}

/// `{BusinessObject}_RAS.xsd`
///
/// The request carries the object identifier and a `facet` attribute naming
/// the facet wanted back; each facet gets its own request and response
/// element.
pub fn request_response(ctx: &GenerationContext, entity: &NamedEntity) -> Result<Vec<XsdDocument>> {
    let EntityBody::BusinessObject(_) = &entity.body else {
        return Ok(Vec::new());
    };
    let Some(mut document) = service_document(ctx, entity, names::ras_file_name(&entity.name)) else {
        return Ok(Vec::new());
    };
    let namespace = document.schema.target_namespace.clone();
    let own = |local: String| QName::new(namespace.clone(), local);

    let facets = response_facets(ctx, entity);
    let selector = names::facet_selector_name(&entity.name);
    let request = format!("{}_RQ", entity.name);
    let id_element = names::facet_element_name(&entity.name, FacetKind::Id).unwrap_or_default();

    let components = &mut document.schema.components;
    components.push(Component::SimpleType(SimpleTypeDef {
        name: selector.clone(),
        documentation: None,
        derivation: SimpleDerivation::Restriction {
            base: QName::xsd("string"),
            facets: facets
                .iter()
                .map(|(label, _)| Facet::Enumeration {
                    value: label.clone(),
                    documentation: None,
                })
                .collect(),
        },
    }));
    components.push(Component::ComplexType(ComplexTypeDef {
        name: request.clone(),
        documentation: None,
        content: ComplexContent::Sequence(vec![Particle {
            term: Term::Ref(own(id_element)),
            min_occurs: 1,
            max_occurs: Some(1),
        }]),
        attributes: vec![AttributeDef {
            name: "facet".into(),
            type_name: own(selector),
            required: true,
            documentation: None,
        }],
    }));

    for (label, response_type) in facets {
        components.push(Component::Element(ElementDef {
            name: format!("{}_{}_RQ", entity.name, label),
            type_name: own(request.clone()),
            substitution_group: None,
            documentation: None,
        }));
        components.push(Component::Element(ElementDef {
            name: format!("{}_{}_RS", entity.name, label),
            type_name: response_type,
            substitution_group: None,
            documentation: None,
        }));
    }

    Ok(vec![document])
}

/// Empty service document in the namespace of the entity's library
fn service_document(ctx: &GenerationContext, entity: &NamedEntity, path: String) -> Option<XsdDocument> {
    let library = ctx.model().library(entity.library)?;
    Some(XsdDocument {
        path,
        library: Some(library.id),
        hosts: library_hosts(ctx, library),
        schema: Schema {
            target_namespace: ctx.library_namespace(library),
            version: Some(library.version.clone()),
            ..Schema::default()
        },
        service: true,
    })
}

/// (label, facet type) of every facet a business object can be fetched in
fn response_facets(ctx: &GenerationContext, entity: &NamedEntity) -> Vec<(String, QName)> {
    let own_ns = ctx.entity_namespace(entity.id, Some(entity.library));
    let mut facets: Vec<(String, QName)> = [FacetKind::Id, FacetKind::Summary, FacetKind::Detail]
        .into_iter()
        .map(|kind| {
            (
                kind.as_str().to_string(),
                QName::new(own_ns.clone(), names::facet_type_name(&entity.name, kind)),
            )
        })
        .collect();

    for facet_id in ctx.symbols().contextual_facets_of(entity.id) {
        if !ctx.filter().process_entity(*facet_id) {
            continue;
        }
        let Some(facet) = ctx.model().entity(*facet_id) else {
            continue;
        };
        let EntityBody::ContextualFacet(cf) = &facet.body else {
            continue;
        };
        facets.push((
            format!("{}_{}", cf.facet_kind.facet_kind().as_str(), cf.facet_name),
            QName::new(ctx.entity_namespace(facet.id, Some(entity.library)), facet.name.clone()),
        ));
    }

    for ghost in ctx.ghost_facets(entity.id).iter() {
        facets.push((
            format!("{}_{}", ghost.kind.facet_kind().as_str(), ghost.facet_name),
            QName::new(own_ns.clone(), ghost.name(ctx.model())),
        ));
    }

    facets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{GenerationOptions, TransformerRegistry};
    use crate::filter::CodeGenerationFilter;
    use crate::loader::{GrammarVersion, LibraryModule};
    use crate::model::{Assembly, LibraryHeader, MemberDecl, Model};
    use crate::version::OtmVersionScheme;
    use std::sync::Arc;
    use url::Url;

    const NS: &str = "http://example.com/ns/Orders/v01";

    fn model() -> Model {
        let module = LibraryModule {
            url: Url::parse("file:///libs/Orders.otm").unwrap(),
            grammar: GrammarVersion::V01_06,
            header: LibraryHeader {
                name: "Orders".into(),
                namespace: Some(NS.into()),
                prefix: Some("o".into()),
                version: Some("1.0.0".into()),
                ..LibraryHeader::default()
            },
            imports: Vec::new(),
            includes: Vec::new(),
            contexts: Vec::new(),
            members: serde_json::from_value::<Vec<MemberDecl>>(serde_json::json!([
                { "kind": "businessObject", "name": "Order",
                  "id": { "attributes": [{ "name": "orderId", "type": "xsd:string" }] } },
                { "kind": "contextualFacet", "facetKind": "custom", "facetName": "Web", "owner": "Order",
                  "attributes": [{ "name": "channel", "type": "xsd:string" }] },
                { "kind": "service", "name": "OrderService",
                  "operations": [{ "name": "Create",
                                   "request": { "elements": [{ "type": "Order" }] },
                                   "response": { "attributes": [{ "name": "ok", "type": "xsd:boolean" }] } }] }
            ]))
            .unwrap(),
        };
        Assembly::from_modules(vec![module], Arc::new(OtmVersionScheme::new()))
            .unwrap()
            .model
    }

    fn run(name: &str, f: fn(&GenerationContext, &NamedEntity) -> Result<Vec<XsdDocument>>) -> XsdDocument {
        let model = model();
        let mut options = GenerationOptions::new("/tmp/out");
        options.service_endpoint_url = Some("https://api.example.com/orders".into());
        let registry = TransformerRegistry::standard();
        let ctx = GenerationContext::new(&model, CodeGenerationFilter::everything(&model), &options, &registry, vec![], None);
        let entity = model.entity(model.find_entity(name).unwrap()).unwrap();
        let mut documents = f(&ctx, entity).unwrap();
        assert_eq!(documents.len(), 1);
        documents.remove(0)
    }

    #[test]
    fn test_operation_messages() {
        let document = run("OrderService", messages);
        assert_eq!(document.path, "OrderService_Messages.xsd");
        assert!(document.service);
        assert_eq!(document.schema.target_namespace.as_deref(), Some(NS));
        assert_eq!(
            document.schema.documentation.as_deref(),
            Some("Service endpoint: https://api.example.com/orders")
        );
        let names: Vec<&str> = document.schema.components.iter().map(Component::name).collect();
        assert_eq!(
            names,
            vec!["OrderService_Create_RQ", "OrderService_Create_RQ", "OrderService_Create_RS", "OrderService_Create_RS"]
        );
    }

    #[test]
    fn test_request_response_facets() {
        let document = run("Order", request_response);
        assert_eq!(document.path, "Order_RAS.xsd");

        let Component::SimpleType(selector) = &document.schema.components[0] else {
            panic!("expected facet selector");
        };
        assert_eq!(selector.name, "Order_FacetType");
        let SimpleDerivation::Restriction { facets, .. } = &selector.derivation else {
            panic!("expected restriction");
        };
        let labels: Vec<String> = facets.iter().map(Facet::value).collect();
        assert_eq!(labels, vec!["ID", "Summary", "Detail", "Custom_Web"]);

        let response = document
            .schema
            .components
            .iter()
            .find(|c| c.name() == "Order_Custom_Web_RS");
        let Some(Component::Element(response)) = response else {
            panic!("missing contextual facet response");
        };
        assert_eq!(response.type_name, QName::in_namespace(NS, "Order_Custom_Web"));
    }
}
