//! JSON Schema generation
//!
//! One draft-07 document per in-scope library (`{Library}_{M}_{m}_{p}.schema.json`)
//! whose `definitions` hold the same named types the XML Schema output
//! declares. XSD primitives and built-in simple types are inlined; every
//! other reference becomes a `$ref`, cross-file when the target lives in
//! another library. The OpenAPI generators reuse the same definitions with a
//! different reference style.

use serde_json::{json, Map, Value};
use tracing::debug;

use super::context::GenerationContext;
use super::names;
use super::xsd::transform::contextual_content;
use super::{OutputFile, TargetFormat};
use crate::error::Result;
use crate::model::builtins::XSD_NAMESPACE;
use crate::model::entity::SimpleType;
use crate::model::{EntityBody, EntityId, FacetContent, FacetKind, LibraryId, NamedEntity, TypeRef};

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// How `$ref` values are spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefStyle {
    /// Per-library documents; references into other libraries name their file
    Library(LibraryId),
    /// OpenAPI 3 `#/components/schemas/`
    Components,
    /// Swagger 2 `#/definitions/`
    Definitions,
}

impl RefStyle {
    fn reference(&self, ctx: &GenerationContext, target: EntityId, name: &str) -> String {
        match self {
            Self::Library(from) => {
                let file = ctx
                    .model()
                    .owner(target)
                    .filter(|l| l.id != *from)
                    .and_then(|l| ctx.library_file(l, TargetFormat::JsonSchema));
                match file {
                    Some(file) => format!("{}#/definitions/{}", file, name),
                    None => format!("#/definitions/{}", name),
                }
            }
            Self::Components => format!("#/components/schemas/{}", name),
            Self::Definitions => format!("#/definitions/{}", name),
        }
    }
}

/// One schema document per in-scope library
pub fn emit(ctx: &GenerationContext) -> Result<Vec<OutputFile>> {
    let mut files = Vec::new();
    for library_id in ctx.library_order() {
        ctx.check_cancelled()?;
        let Some(library) = ctx.model().library(*library_id) else {
            continue;
        };
        let Some(path) = ctx.library_file(library, TargetFormat::JsonSchema) else {
            continue;
        };

        let style = RefStyle::Library(library.id);
        let mut definitions = Map::new();
        for entity in ctx.emitted_entities(*library_id) {
            let transform = ctx.registry().json(entity.kind())?;
            definitions.extend(transform(ctx, entity, &style)?);
        }

        let mut document = Map::new();
        document.insert("$schema".into(), json!(DRAFT_07));
        if let Some(ns) = ctx.library_namespace(library) {
            document.insert("$id".into(), json!(ns));
        }
        document.insert("title".into(), json!(library.name));
        if let Some(doc) = &library.documentation {
            document.insert("description".into(), json!(doc));
        }
        document.insert("definitions".into(), Value::Object(definitions));

        debug!(library = %library.name, path = %path, "Emitted JSON schema");
        files.push(OutputFile {
            path: path.into(),
            format: TargetFormat::JsonSchema,
            contents: to_pretty(&Value::Object(document))?,
        });
    }
    Ok(files)
}

pub(crate) fn to_pretty(value: &Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

// =============================================================================
// Definitions
// =============================================================================

/// Named definitions an entity contributes, in declaration order
pub fn definitions(ctx: &GenerationContext, entity: &NamedEntity, style: &RefStyle) -> Result<Vec<(String, Value)>> {
    let from = entity.library;
    let mut defs = Vec::new();

    match &entity.body {
        EntityBody::SimpleType(simple) => {
            defs.push((entity.name.clone(), describe(simple_schema(ctx, simple, style), entity)));
        }
        EntityBody::Enumeration(_) => {
            let values: Vec<Value> = enum_literals(ctx, entity.id).into_iter().map(Value::from).collect();
            let closed = json!({ "type": "string", "enum": values });
            let open = matches!(&entity.body, EntityBody::Enumeration(e) if e.open);
            let schema = if open {
                json!({ "anyOf": [closed, { "type": "string" }] })
            } else {
                closed
            };
            defs.push((entity.name.clone(), describe(schema, entity)));
        }
        EntityBody::ValueWithAttributes(vwa) => {
            let value = vwa
                .value_type
                .as_ref()
                .map(|t| type_schema(ctx, t, style))
                .unwrap_or_else(|| json!({ "type": "string" }));
            let mut schema = content_schema(ctx, &vwa.content, style);
            if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
                properties.insert("value".into(), value);
            }
            defs.push((entity.name.clone(), describe(schema, entity)));
        }
        EntityBody::CoreObject(core) => {
            let simple = core
                .simple_type
                .as_ref()
                .map(|t| type_schema(ctx, t, style))
                .unwrap_or_else(|| json!({ "type": "string" }));
            defs.push((names::facet_type_name(&entity.name, FacetKind::Simple), simple));
            if !core.roles.is_empty() {
                defs.push((
                    format!("{}_Role", entity.name),
                    json!({ "type": "string", "enum": core.roles }),
                ));
            }
            defs.extend(fixed_facets(ctx, entity, &[FacetKind::Summary, FacetKind::Detail], style));
            defs.extend(ghost_facets(ctx, entity, style));
        }
        EntityBody::BusinessObject(_) => {
            defs.extend(fixed_facets(
                ctx,
                entity,
                &[FacetKind::Id, FacetKind::Summary, FacetKind::Detail],
                style,
            ));
            defs.extend(ghost_facets(ctx, entity, style));
        }
        EntityBody::ChoiceObject(_) => {
            defs.extend(fixed_facets(ctx, entity, &[FacetKind::Shared], style));
            defs.extend(ghost_facets(ctx, entity, style));
        }
        EntityBody::ContextualFacet(cf) => {
            let owner = cf.owner.entity().and_then(|id| ctx.model().entity(id));
            let content = contextual_content(ctx, owner, cf, &cf.content);
            defs.push((entity.name.clone(), describe(content_schema(ctx, &content, style), entity)));
        }
        EntityBody::ExtensionPointFacet(ep) => {
            let name = ctx.extension_point_type_name(entity, &ep.extends);
            defs.push((name, describe(content_schema(ctx, &ep.content, style), entity)));
        }
        EntityBody::Resource(_) | EntityBody::Service(_) => {}
    }

    debug!(entity = %entity.name, library = %from, definitions = defs.len(), "JSON definitions");
    Ok(defs)
}

fn describe(mut schema: Value, entity: &NamedEntity) -> Value {
    if let (Some(doc), Some(object)) = (&entity.documentation, schema.as_object_mut()) {
        object.insert("description".into(), json!(doc));
    }
    schema
}

fn fixed_facets(
    ctx: &GenerationContext,
    entity: &NamedEntity,
    kinds: &[FacetKind],
    style: &RefStyle,
) -> Vec<(String, Value)> {
    kinds
        .iter()
        .map(|kind| {
            let content = ctx.facet_content(entity.id, *kind);
            (
                names::facet_type_name(&entity.name, *kind),
                content_schema(ctx, &content, style),
            )
        })
        .collect()
}

fn ghost_facets(ctx: &GenerationContext, entity: &NamedEntity, style: &RefStyle) -> Vec<(String, Value)> {
    let mut defs = Vec::new();
    for ghost in ctx.ghost_facets(entity.id).iter() {
        let Some(EntityBody::ContextualFacet(cf)) = ctx.model().entity(ghost.source).map(|e| &e.body) else {
            continue;
        };
        let content = contextual_content(ctx, Some(entity), cf, &cf.content);
        defs.push((ghost.name(ctx.model()), content_schema(ctx, &content, style)));
    }
    defs
}

/// Literals of an enumeration and its supertypes, farthest supertype first
fn enum_literals(ctx: &GenerationContext, id: EntityId) -> Vec<String> {
    let chain = ctx.extension_chain(id);
    let mut literals: Vec<String> = Vec::new();
    for owner in chain.iter().rev().chain(std::iter::once(&id)) {
        if let Some(EntityBody::Enumeration(e)) = ctx.model().entity(*owner).map(|e| &e.body) {
            for value in &e.values {
                if !literals.contains(&value.literal) {
                    literals.push(value.literal.clone());
                }
            }
        }
    }
    literals
}

// =============================================================================
// Schemas
// =============================================================================

fn simple_schema(ctx: &GenerationContext, simple: &SimpleType, style: &RefStyle) -> Value {
    let base = simple
        .base
        .as_ref()
        .map(|b| type_schema(ctx, b, style))
        .unwrap_or_else(|| json!({ "type": "string" }));
    if simple.list {
        return json!({ "type": "array", "items": base });
    }

    let mut facets = Map::new();
    if let Some(pattern) = &simple.pattern {
        facets.insert("pattern".into(), json!(pattern));
    }
    if let Some(n) = simple.min_length {
        facets.insert("minLength".into(), json!(n));
    }
    if let Some(n) = simple.max_length {
        facets.insert("maxLength".into(), json!(n));
    }
    if let Some(n) = simple.min_inclusive.as_deref().and_then(|v| v.parse::<f64>().ok()) {
        facets.insert("minimum".into(), json!(n));
    }
    if let Some(n) = simple.max_inclusive.as_deref().and_then(|v| v.parse::<f64>().ok()) {
        facets.insert("maximum".into(), json!(n));
    }
    if facets.is_empty() {
        return base;
    }

    match base {
        Value::Object(mut inline) if !inline.contains_key("$ref") => {
            inline.extend(facets);
            Value::Object(inline)
        }
        reference => json!({ "allOf": [reference, Value::Object(facets)] }),
    }
}

/// Object schema of facet content
fn content_schema(ctx: &GenerationContext, content: &FacetContent, style: &RefStyle) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for attribute in &content.attributes {
        properties.insert(attribute.name.clone(), type_schema(ctx, &attribute.type_ref, style));
        if attribute.mandatory {
            required.push(json!(attribute.name));
        }
    }

    for element in &content.elements {
        let (name, item) = if element.reference {
            (format!("{}Ref", element.property_name()), json!({ "type": "string" }))
        } else {
            (element.property_name().to_string(), type_schema(ctx, &element.type_ref, style))
        };
        let schema = if element.is_repeating() {
            let mut array = json!({ "type": "array", "items": item });
            if !element.unbounded {
                array["maxItems"] = json!(element.repeat);
            }
            array
        } else {
            item
        };
        if element.mandatory {
            required.push(json!(name));
        }
        properties.insert(name, schema);
    }

    for indicator in &content.indicators {
        properties.insert(indicator.name.clone(), json!({ "type": "boolean" }));
    }

    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

/// Schema a type reference denotes
pub fn type_schema(ctx: &GenerationContext, type_ref: &TypeRef, style: &RefStyle) -> Value {
    let Some(symbol) = type_ref.target else {
        return json!({ "type": "string" });
    };
    let Some(entity) = ctx.model().entity(symbol.entity()) else {
        return json!({ "type": "string" });
    };

    if ctx.is_built_in(entity.id) {
        let is_xsd = ctx
            .model()
            .owner(entity.id)
            .and_then(|l| l.namespace.as_deref())
            == Some(XSD_NAMESPACE);
        if is_xsd {
            return primitive_schema(&entity.name);
        }
        return match &entity.body {
            EntityBody::SimpleType(simple) => simple_schema(ctx, simple, style),
            _ => json!({ "type": "string" }),
        };
    }

    let name = ctx.type_name(symbol).unwrap_or_else(|| entity.name.clone());
    json!({ "$ref": style.reference(ctx, entity.id, &name) })
}

/// JSON type and format of an XSD primitive
pub fn primitive_schema(name: &str) -> Value {
    match name {
        "boolean" => json!({ "type": "boolean" }),
        "decimal" | "double" | "float" => json!({ "type": "number" }),
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger" | "nonPositiveInteger"
        | "negativeInteger" | "positiveInteger" | "unsignedInt" | "unsignedLong" | "unsignedShort"
        | "unsignedByte" => json!({ "type": "integer" }),
        "date" => json!({ "type": "string", "format": "date" }),
        "dateTime" => json!({ "type": "string", "format": "date-time" }),
        "time" => json!({ "type": "string", "format": "time" }),
        "anyURI" => json!({ "type": "string", "format": "uri" }),
        "base64Binary" => json!({ "type": "string", "format": "byte" }),
        "IDREFS" | "NMTOKENS" => json!({ "type": "array", "items": { "type": "string" } }),
        _ => json!({ "type": "string" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{GenerationOptions, TransformerRegistry};
    use crate::filter::CodeGenerationFilter;
    use crate::loader::{GrammarVersion, LibraryModule};
    use crate::model::{Assembly, ImportDecl, LibraryHeader, MemberDecl, Model};
    use crate::version::OtmVersionScheme;
    use std::sync::Arc;
    use url::Url;

    fn module(name: &str, prefix: &str, imports: Vec<ImportDecl>, members: Value) -> LibraryModule {
        LibraryModule {
            url: Url::parse(&format!("file:///libs/{}.otm", name)).unwrap(),
            grammar: GrammarVersion::V01_06,
            header: LibraryHeader {
                name: name.into(),
                namespace: Some(format!("http://example.com/ns/{}/v01", name)),
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

    fn model() -> Model {
        let base = module("Base", "b", vec![], json!([
            { "kind": "simpleType", "name": "Code", "base": "xsd:string", "maxLength": 3 },
            { "kind": "enumeration", "name": "Status", "open": true, "values": [{ "literal": "Open" }] }
        ]));
        let orders = module(
            "Orders",
            "o",
            vec![ImportDecl {
                namespace: Some("http://example.com/ns/Base/v01".into()),
                prefix: Some("b".into()),
                file_hints: vec![],
            }],
            json!([
                { "kind": "businessObject", "name": "Order",
                  "id": { "attributes": [{ "name": "code", "type": "b:Code", "mandatory": true }] },
                  "summary": { "elements": [
                      { "name": "Status", "type": "b:Status" },
                      { "name": "Placed", "type": "xsd:dateTime", "repeat": 2 }
                  ] } }
            ]),
        );
        Assembly::from_modules(vec![base, orders], Arc::new(OtmVersionScheme::new()))
            .unwrap()
            .model
    }

    fn order_definitions(style: impl Fn(&Model) -> RefStyle) -> Vec<(String, Value)> {
        let model = model();
        let options = GenerationOptions::new("/tmp/out");
        let registry = TransformerRegistry::standard();
        let ctx = GenerationContext::new(&model, CodeGenerationFilter::everything(&model), &options, &registry, vec![], None);
        let order = model.entity(model.find_entity("Order").unwrap()).unwrap();
        definitions(&ctx, order, &style(&model)).unwrap()
    }

    #[test]
    fn test_cross_library_refs_name_the_file() {
        let defs = order_definitions(|model| {
            RefStyle::Library(model.entity(model.find_entity("Order").unwrap()).unwrap().library)
        });
        let names: Vec<&str> = defs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Order_ID", "Order_Summary", "Order_Detail"]);

        let summary = &defs[1].1;
        assert_eq!(
            summary["properties"]["code"]["$ref"],
            "Base_1_0_0.schema.json#/definitions/Code"
        );
        assert_eq!(summary["required"], json!(["code"]));
        assert_eq!(summary["properties"]["Placed"]["type"], "array");
        assert_eq!(summary["properties"]["Placed"]["maxItems"], 2);
        assert_eq!(summary["properties"]["Placed"]["items"]["format"], "date-time");
    }

    #[test]
    fn test_component_ref_style() {
        let defs = order_definitions(|_| RefStyle::Components);
        assert_eq!(
            defs[0].1["properties"]["code"]["$ref"],
            "#/components/schemas/Code"
        );
    }

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(primitive_schema("decimal"), json!({ "type": "number" }));
        assert_eq!(primitive_schema("positiveInteger"), json!({ "type": "integer" }));
        assert_eq!(primitive_schema("token"), json!({ "type": "string" }));
    }
}
