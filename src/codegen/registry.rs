//! Transformer registry
//!
//! Maps (entity kind, target format) to the function that transforms an
//! entity of that kind. Generators look transformers up here instead of
//! matching on entity kinds themselves, so a caller can swap or add
//! transformers without touching the generators.

use serde_json::Value;
use std::collections::HashMap;

use super::context::GenerationContext;
use super::json_schema::{self, RefStyle};
use super::xsd::model::{Component, XsdDocument};
use super::xsd::transform;
use super::{openapi, service, OutputFile, TargetFormat};
use crate::error::{CompilerError, Result};
use crate::model::{EntityKind, NamedEntity};

/// Global XML Schema components for one entity
pub type XsdTransform = fn(&GenerationContext, &NamedEntity) -> Result<Vec<Component>>;

/// Named JSON Schema definitions for one entity
pub type JsonTransform = fn(&GenerationContext, &NamedEntity, &RefStyle) -> Result<Vec<(String, Value)>>;

/// A complete API document for one entity, if it produces one
pub type ApiTransform = fn(&GenerationContext, &NamedEntity, TargetFormat) -> Result<Option<OutputFile>>;

/// Standalone service schema documents for one entity
pub type ServiceTransform = fn(&GenerationContext, &NamedEntity) -> Result<Vec<XsdDocument>>;

#[derive(Clone, Copy, Debug)]
pub enum Transformer {
    Xsd(XsdTransform),
    Json(JsonTransform),
    Api(ApiTransform),
    Service(ServiceTransform),
}

#[derive(Debug, Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<(EntityKind, TargetFormat), Transformer>,
}

const ALL_KINDS: [EntityKind; 10] = [
    EntityKind::SimpleType,
    EntityKind::Enumeration,
    EntityKind::ValueWithAttributes,
    EntityKind::CoreObject,
    EntityKind::BusinessObject,
    EntityKind::ChoiceObject,
    EntityKind::ContextualFacet,
    EntityKind::ExtensionPointFacet,
    EntityKind::Resource,
    EntityKind::Service,
];

impl TransformerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Transformers for every kind and format the compiler supports
    pub fn standard() -> Self {
        let mut registry = Self::new();

        for kind in ALL_KINDS {
            let xsd: XsdTransform = match kind {
                EntityKind::SimpleType => transform::simple_type,
                EntityKind::Enumeration => transform::enumeration,
                EntityKind::ValueWithAttributes => transform::value_with_attributes,
                EntityKind::CoreObject => transform::core_object,
                EntityKind::BusinessObject => transform::business_object,
                EntityKind::ChoiceObject => transform::choice_object,
                EntityKind::ContextualFacet => transform::contextual_facet,
                EntityKind::ExtensionPointFacet => transform::extension_point_facet,
                EntityKind::Resource | EntityKind::Service => transform::nothing,
            };
            registry.register(kind, TargetFormat::XmlSchema, Transformer::Xsd(xsd));
            registry.register(
                kind,
                TargetFormat::JsonSchema,
                Transformer::Json(json_schema::definitions),
            );
        }

        for format in [TargetFormat::OpenApi, TargetFormat::Swagger] {
            registry.register(EntityKind::Resource, format, Transformer::Api(openapi::document));
        }

        registry.register(
            EntityKind::Service,
            TargetFormat::ServiceSchema,
            Transformer::Service(service::messages),
        );
        registry.register(
            EntityKind::BusinessObject,
            TargetFormat::ServiceSchema,
            Transformer::Service(service::request_response),
        );

        registry
    }

    /// Register a transformer, returning the one it replaces
    pub fn register(
        &mut self,
        kind: EntityKind,
        format: TargetFormat,
        transformer: Transformer,
    ) -> Option<Transformer> {
        self.transformers.insert((kind, format), transformer)
    }

    pub fn get(&self, kind: EntityKind, format: TargetFormat) -> Result<Transformer> {
        self.transformers
            .get(&(kind, format))
            .copied()
            .ok_or(CompilerError::NoTransformer { kind, format })
    }

    pub fn contains(&self, kind: EntityKind, format: TargetFormat) -> bool {
        self.transformers.contains_key(&(kind, format))
    }

    pub fn xsd(&self, kind: EntityKind) -> Result<XsdTransform> {
        match self.get(kind, TargetFormat::XmlSchema)? {
            Transformer::Xsd(f) => Ok(f),
            _ => Err(mismatch(kind, TargetFormat::XmlSchema)),
        }
    }

    pub fn json(&self, kind: EntityKind) -> Result<JsonTransform> {
        match self.get(kind, TargetFormat::JsonSchema)? {
            Transformer::Json(f) => Ok(f),
            _ => Err(mismatch(kind, TargetFormat::JsonSchema)),
        }
    }

    pub fn api(&self, kind: EntityKind, format: TargetFormat) -> Result<ApiTransform> {
        match self.get(kind, format)? {
            Transformer::Api(f) => Ok(f),
            _ => Err(mismatch(kind, format)),
        }
    }

    pub fn service(&self, kind: EntityKind) -> Result<ServiceTransform> {
        match self.get(kind, TargetFormat::ServiceSchema)? {
            Transformer::Service(f) => Ok(f),
            _ => Err(mismatch(kind, TargetFormat::ServiceSchema)),
        }
    }
}

/// A transformer registered under the wrong format counts as missing
fn mismatch(kind: EntityKind, format: TargetFormat) -> CompilerError {
    CompilerError::NoTransformer { kind, format }
}
