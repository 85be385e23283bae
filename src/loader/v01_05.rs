//! LibraryModel_v01_05
//!
//! Contextual facets are declared inline on their owning object
//! (`customFacets`, `queryFacets`, `updateFacets`, `choiceFacets`) instead of
//! as standalone members. Parsing normalizes each inline facet into a
//! contextual facet member placed right after its owner.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{GrammarVersion, LibraryModule};
use crate::model::entity::ContextualFacet;
use crate::model::{
    ContextDecl, ContextualKind, EntityBody, FacetContent, ImportDecl, LibraryHeader, MemberDecl,
    TypeRef,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(flatten)]
    header: LibraryHeader,
    #[serde(default)]
    imports: Vec<ImportDecl>,
    #[serde(default)]
    includes: Vec<String>,
    #[serde(default)]
    contexts: Vec<ContextDecl>,
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Member {
    #[serde(default)]
    custom_facets: Vec<InlineFacet>,
    #[serde(default)]
    query_facets: Vec<InlineFacet>,
    #[serde(default)]
    update_facets: Vec<InlineFacet>,
    #[serde(default)]
    choice_facets: Vec<InlineFacet>,
    #[serde(flatten)]
    decl: MemberDecl,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineFacet {
    name: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    documentation: Option<String>,
    #[serde(flatten)]
    content: FacetContent,
}

pub(super) fn parse(url: &Url, document: &Value) -> Result<LibraryModule, String> {
    let doc: Document = serde_json::from_value(document.clone()).map_err(|e| e.to_string())?;

    let mut members = Vec::with_capacity(doc.members.len());
    for member in doc.members {
        if let EntityBody::ContextualFacet(_) = member.decl.body {
            return Err(format!(
                "contextual facet '{}' must be declared inline in {}",
                member.decl.name,
                GrammarVersion::V01_05
            ));
        }

        let owner = member.decl.name.clone();
        let inline = [
            (ContextualKind::Custom, member.custom_facets),
            (ContextualKind::Query, member.query_facets),
            (ContextualKind::Update, member.update_facets),
            (ContextualKind::Choice, member.choice_facets),
        ];
        members.push(member.decl);

        for (kind, facets) in inline {
            for facet in facets {
                members.push(MemberDecl {
                    name: String::new(),
                    documentation: facet.documentation,
                    body: EntityBody::ContextualFacet(ContextualFacet {
                        facet_kind: kind,
                        facet_name: facet.name,
                        owner: TypeRef::new(owner.clone()),
                        context: facet.context,
                        content: facet.content,
                    }),
                });
            }
        }
    }

    Ok(LibraryModule {
        url: url.clone(),
        grammar: GrammarVersion::V01_05,
        header: doc.header,
        imports: doc.imports,
        includes: doc.includes,
        contexts: doc.contexts,
        members,
    })
}
