//! LibraryModel_v01_04
//!
//! Oldest supported grammar. Differences from the current one:
//! - no choice objects, resources or contextual facets
//! - enumerations list plain literals and mark openness with `extensible`
//! - value-with-attributes is spelled `valueWithAttrs`
//! - libraries declare no contexts

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{GrammarVersion, LibraryModule};
use crate::model::entity::{
    BusinessObject, CoreObject, EnumValue, Enumeration, ExtensionPointFacet, Service, SimpleType,
    ValueWithAttributes,
};
use crate::model::{EntityBody, ImportDecl, LibraryHeader, MemberDecl, TypeRef};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(flatten)]
    header: LibraryHeader,
    #[serde(default)]
    imports: Vec<ImportDecl>,
    #[serde(default)]
    includes: Vec<String>,
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    name: String,
    #[serde(default)]
    documentation: Option<String>,
    #[serde(flatten)]
    body: Body,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Body {
    SimpleType(SimpleType),
    Enumeration(LegacyEnumeration),
    ValueWithAttrs(ValueWithAttributes),
    CoreObject(CoreObject),
    BusinessObject(BusinessObject),
    ExtensionPointFacet(ExtensionPointFacet),
    Service(Service),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEnumeration {
    #[serde(default)]
    extensible: bool,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    extension: Option<TypeRef>,
}

impl From<Body> for EntityBody {
    fn from(body: Body) -> Self {
        match body {
            Body::SimpleType(t) => EntityBody::SimpleType(t),
            Body::Enumeration(e) => EntityBody::Enumeration(Enumeration {
                open: e.extensible,
                values: e
                    .values
                    .into_iter()
                    .map(|literal| EnumValue {
                        literal,
                        documentation: None,
                    })
                    .collect(),
                extension: e.extension,
            }),
            Body::ValueWithAttrs(v) => EntityBody::ValueWithAttributes(v),
            Body::CoreObject(o) => EntityBody::CoreObject(o),
            Body::BusinessObject(o) => EntityBody::BusinessObject(o),
            Body::ExtensionPointFacet(f) => EntityBody::ExtensionPointFacet(f),
            Body::Service(s) => EntityBody::Service(s),
        }
    }
}

pub(super) fn parse(url: &Url, document: &Value) -> Result<LibraryModule, String> {
    let doc: Document = serde_json::from_value(document.clone()).map_err(|e| e.to_string())?;

    Ok(LibraryModule {
        url: url.clone(),
        grammar: GrammarVersion::V01_04,
        header: doc.header,
        imports: doc.imports,
        includes: doc.includes,
        contexts: Vec::new(),
        members: doc
            .members
            .into_iter()
            .map(|m| MemberDecl {
                name: m.name,
                documentation: m.documentation,
                body: m.body.into(),
            })
            .collect(),
    })
}
