//! OpenAPI 3 and Swagger 2 documents for resources
//!
//! One document per in-scope, non-abstract resource. Operations come from
//! the resource's actions; their paths are the resource base path (prefixed
//! by the parent resource paths for nested resources) plus the action path
//! template. Schemas are the JSON Schema definitions of everything the
//! resource reaches, written as components (3.x) or definitions (2.0).

use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use super::context::{default_facet, GenerationContext};
use super::json_schema::{self, to_pretty, RefStyle};
use super::{OutputFile, TargetFormat};
use crate::error::Result;
use crate::filter::FilterBuilder;
use crate::model::entity::{ActionResponse, ParameterGroup, ParameterLocation, Resource, ResourceAction};
use crate::model::{EntityBody, EntityKind, NamedEntity, Symbol};

pub const OPENAPI_VERSION: &str = "3.0.3";
pub const SWAGGER_VERSION: &str = "2.0";
const DEFAULT_MIME_TYPE: &str = "application/json";

/// API documents of every in-scope resource
pub fn emit(ctx: &GenerationContext, format: TargetFormat) -> Result<Vec<OutputFile>> {
    let mut files = Vec::new();
    for library in ctx.library_order() {
        ctx.check_cancelled()?;
        for entity in ctx.emitted_entities(*library) {
            if !ctx.registry().contains(entity.kind(), format) {
                continue;
            }
            let transform = ctx.registry().api(entity.kind(), format)?;
            files.extend(transform(ctx, entity, format)?);
        }
    }
    Ok(files)
}

/// `{Resource}.openapi.json` or `{Resource}.swagger.json`
pub fn document(ctx: &GenerationContext, entity: &NamedEntity, format: TargetFormat) -> Result<Option<OutputFile>> {
    let EntityBody::Resource(resource) = &entity.body else {
        return Ok(None);
    };
    if resource.is_abstract {
        debug!(resource = %entity.name, "Skipping abstract resource");
        return Ok(None);
    }
    let swagger = format == TargetFormat::Swagger;
    let style = if swagger {
        RefStyle::Definitions
    } else {
        RefStyle::Components
    };

    let api = ApiBuilder { ctx, style, swagger };
    let paths = api.paths(entity, resource);
    let schemas = api.schemas(entity)?;

    let mut info = Map::new();
    info.insert("title".into(), json!(entity.name));
    let version = ctx
        .model()
        .library(entity.library)
        .map(|l| l.version.clone())
        .unwrap_or_default();
    info.insert("version".into(), json!(version));
    if let Some(doc) = &entity.documentation {
        info.insert("description".into(), json!(doc));
    }

    let base_url = ctx.options().resource_base_url.as_deref().and_then(|u| Url::parse(u).ok());
    let mut document = Map::new();
    if swagger {
        document.insert("swagger".into(), json!(SWAGGER_VERSION));
        document.insert("info".into(), Value::Object(info));
        if let Some(url) = &base_url {
            if let Some(host) = url.host_str() {
                let host = match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                document.insert("host".into(), json!(host));
            }
            document.insert("basePath".into(), json!(url.path()));
            document.insert("schemes".into(), json!([url.scheme()]));
        }
        document.insert("paths".into(), Value::Object(paths));
        document.insert("definitions".into(), Value::Object(schemas));
    } else {
        document.insert("openapi".into(), json!(OPENAPI_VERSION));
        document.insert("info".into(), Value::Object(info));
        if let Some(url) = &base_url {
            document.insert("servers".into(), json!([{ "url": url.as_str() }]));
        }
        document.insert("paths".into(), Value::Object(paths));
        document.insert("components".into(), json!({ "schemas": schemas }));
    }

    let extension = if swagger { "swagger.json" } else { "openapi.json" };
    Ok(Some(OutputFile {
        path: format!("{}.{}", entity.name, extension).into(),
        format,
        contents: to_pretty(&Value::Object(document))?,
    }))
}

struct ApiBuilder<'c, 'a> {
    ctx: &'c GenerationContext<'a>,
    style: RefStyle,
    swagger: bool,
}

impl ApiBuilder<'_, '_> {
    /// Definitions of everything reachable from the resource
    fn schemas(&self, entity: &NamedEntity) -> Result<Map<String, Value>> {
        let closure = FilterBuilder::new(self.ctx.model()).root(entity.id).build();
        let mut schemas = Map::new();
        for id in closure.entities() {
            let Some(member) = self.ctx.model().entity(id) else {
                continue;
            };
            if matches!(member.kind(), EntityKind::Resource | EntityKind::Service) {
                continue;
            }
            if self.ctx.is_built_in(id) {
                continue;
            }
            let transform = self.ctx.registry().json(member.kind())?;
            schemas.extend(transform(self.ctx, member, &self.style)?);
        }
        Ok(schemas)
    }

    fn paths(&self, entity: &NamedEntity, resource: &Resource) -> Map<String, Value> {
        let mut paths = Map::new();
        for (prefix, parent_params) in self.path_prefixes(resource) {
            for action in &resource.actions {
                let path = join_path(&[&prefix, &resource.base_path, &action.request.path_template]);
                let mut parameters = parent_params.clone();
                if let Some(group) = action
                    .request
                    .parameter_group
                    .as_deref()
                    .and_then(|g| resource.parameter_group(g))
                {
                    parameters.extend(self.parameters(group));
                }

                let operation = self.operation(entity, action, parameters);
                let entry = paths.entry(path).or_insert_with(|| json!({}));
                entry[action.request.method.as_lower()] = operation;
            }
        }
        paths
    }

    /// Path prefixes a resource is reachable under, with the parameters each adds
    ///
    /// First-class resources are reachable on their own; nested resources
    /// are reachable through every parent.
    fn path_prefixes(&self, resource: &Resource) -> Vec<(String, Vec<Value>)> {
        let mut prefixes = Vec::new();
        if resource.first_class || resource.parents.is_empty() {
            prefixes.push((String::new(), Vec::new()));
        }
        for parent_ref in &resource.parents {
            let Some(EntityBody::Resource(parent)) = parent_ref
                .resource
                .entity()
                .and_then(|id| self.ctx.model().entity(id))
                .map(|e| &e.body)
            else {
                continue;
            };
            let prefix = join_path(&[&parent.base_path, &parent_ref.path_template]);
            let params = parent_ref
                .parameter_group
                .as_deref()
                .and_then(|g| parent.parameter_group(g))
                .map(|g| self.parameters(g))
                .unwrap_or_default();
            prefixes.push((prefix, params));
        }
        prefixes
    }

    fn operation(&self, entity: &NamedEntity, action: &ResourceAction, mut parameters: Vec<Value>) -> Value {
        let mut operation = Map::new();
        operation.insert("operationId".into(), json!(action.action_id));
        operation.insert("tags".into(), json!([entity.name]));

        if let Some(payload) = &action.request.payload {
            let schema = json_schema::type_schema(self.ctx, payload, &self.style);
            let mime_types = mime_types(&action.request.mime_types);
            if self.swagger {
                parameters.push(json!({ "in": "body", "name": "body", "required": true, "schema": schema }));
                operation.insert("consumes".into(), json!(mime_types));
            } else {
                let content: Map<String, Value> = mime_types
                    .iter()
                    .map(|m| (m.clone(), json!({ "schema": schema })))
                    .collect();
                operation.insert("requestBody".into(), json!({ "required": true, "content": content }));
            }
        }
        if !parameters.is_empty() {
            operation.insert("parameters".into(), Value::Array(parameters));
        }

        let mut responses = Map::new();
        let mut produces: Vec<String> = Vec::new();
        for response in &action.responses {
            for code in &response.status_codes {
                responses.insert(code.to_string(), self.response(response, *code));
            }
            if response.payload.is_some() {
                for mime in mime_types(&response.mime_types) {
                    if !produces.contains(&mime) {
                        produces.push(mime);
                    }
                }
            }
        }
        if responses.is_empty() {
            responses.insert("default".into(), json!({ "description": "Unexpected error" }));
        }
        if self.swagger && !produces.is_empty() {
            operation.insert("produces".into(), json!(produces));
        }
        operation.insert("responses".into(), Value::Object(responses));

        Value::Object(operation)
    }

    fn response(&self, response: &ActionResponse, code: u16) -> Value {
        let mut out = Map::new();
        out.insert("description".into(), json!(status_text(code)));
        if let Some(payload) = &response.payload {
            let schema = json_schema::type_schema(self.ctx, payload, &self.style);
            if self.swagger {
                out.insert("schema".into(), schema);
            } else {
                let content: Map<String, Value> = mime_types(&response.mime_types)
                    .into_iter()
                    .map(|m| (m, json!({ "schema": schema })))
                    .collect();
                out.insert("content".into(), Value::Object(content));
            }
        }
        Value::Object(out)
    }

    fn parameters(&self, group: &ParameterGroup) -> Vec<Value> {
        group
            .parameters
            .iter()
            .map(|param| {
                let schema = self.field_schema(group, &param.field_name);
                let required = param.location == ParameterLocation::Path;
                if self.swagger {
                    let mut value = json!({
                        "name": param.field_name,
                        "in": param.location.as_str(),
                        "required": required,
                    });
                    let kind = schema.get("type").cloned().unwrap_or_else(|| json!("string"));
                    value["type"] = kind;
                    if let Some(format) = schema.get("format") {
                        value["format"] = format.clone();
                    }
                    value
                } else {
                    json!({
                        "name": param.field_name,
                        "in": param.location.as_str(),
                        "required": required,
                        "schema": schema,
                    })
                }
            })
            .collect()
    }

    /// Schema of a parameter, taken from the field it names in the group's facet
    fn field_schema(&self, group: &ParameterGroup, field: &str) -> Value {
        let content = group.facet.as_ref().and_then(|f| f.target).and_then(|symbol| match symbol {
            Symbol::Facet { owner, facet } => Some(self.ctx.facet_content(owner, facet)),
            Symbol::Entity(owner) | Symbol::Alias { owner, .. } => {
                let body = &self.ctx.model().entity(owner)?.body;
                Some(self.ctx.facet_content(owner, default_facet(body)))
            }
            Symbol::Ghost { .. } => None,
        });
        let Some(content) = content else {
            return json!({ "type": "string" });
        };

        let type_ref = content
            .attributes
            .iter()
            .find(|a| a.name == field)
            .map(|a| &a.type_ref)
            .or_else(|| {
                content
                    .elements
                    .iter()
                    .find(|e| e.property_name() == field)
                    .map(|e| &e.type_ref)
            });
        match type_ref {
            Some(type_ref) => {
                let schema = json_schema::type_schema(self.ctx, type_ref, &self.style);
                if schema.get("$ref").is_some() {
                    json!({ "type": "string" })
                } else {
                    schema
                }
            }
            None => json!({ "type": "string" }),
        }
    }
}

fn mime_types(declared: &[String]) -> Vec<String> {
    if declared.is_empty() {
        vec![DEFAULT_MIME_TYPE.to_string()]
    } else {
        declared.to_vec()
    }
}

/// Join path segments with single slashes, keeping `{param}` templates
fn join_path(segments: &[&str]) -> String {
    let mut path = String::new();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Response",
    }
}
