//! XML serialization of schema documents

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;

use super::model::{
    AttributeDef, ComplexContent, ComplexTypeDef, Component, ElementDef, Particle, QName, Schema,
    SimpleDerivation, SimpleTypeDef, Term,
};
use crate::error::{CompilerError, Result};
use crate::model::builtins::XSD_NAMESPACE;

/// Serialize a schema using the run's namespace -> prefix assignments
pub fn write_schema(schema: &Schema, prefixes: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let mut writer = SchemaWriter {
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        prefixes,
    };
    writer.schema(schema)?;
    let mut bytes = writer.writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

struct SchemaWriter<'a> {
    writer: Writer<Vec<u8>>,
    prefixes: &'a BTreeMap<String, String>,
}

impl SchemaWriter<'_> {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| CompilerError::Xml(e.to_string()))
    }

    fn qname(&self, name: &QName) -> String {
        match name.namespace.as_deref() {
            Some(XSD_NAMESPACE) => format!("xsd:{}", name.local),
            Some(ns) => match self.prefixes.get(ns) {
                Some(prefix) => format!("{}:{}", prefix, name.local),
                None => name.local.clone(),
            },
            None => name.local.clone(),
        }
    }

    fn end(&mut self, tag: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn documentation(&mut self, documentation: Option<&str>) -> Result<()> {
        let Some(text) = documentation else {
            return Ok(());
        };
        self.event(Event::Start(BytesStart::new("xsd:annotation")))?;
        self.event(Event::Start(BytesStart::new("xsd:documentation")))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end("xsd:documentation")?;
        self.end("xsd:annotation")
    }

    /// Start tag, or empty tag when there is no content
    fn open(&mut self, tag: BytesStart<'_>, has_content: bool) -> Result<()> {
        if has_content {
            self.event(Event::Start(tag))
        } else {
            self.event(Event::Empty(tag))
        }
    }

    fn schema(&mut self, schema: &Schema) -> Result<()> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("xsd:schema");
        root.push_attribute(("xmlns:xsd", XSD_NAMESPACE));
        for ns in schema.namespaces() {
            if ns == XSD_NAMESPACE {
                continue;
            }
            if let Some(prefix) = self.prefixes.get(ns) {
                root.push_attribute((format!("xmlns:{}", prefix).as_str(), ns));
            }
        }
        if let Some(target) = &schema.target_namespace {
            root.push_attribute(("targetNamespace", target.as_str()));
        }
        if let Some(version) = &schema.version {
            root.push_attribute(("version", version.as_str()));
        }
        root.push_attribute(("elementFormDefault", "qualified"));
        root.push_attribute(("attributeFormDefault", "unqualified"));
        self.event(Event::Start(root))?;

        self.documentation(schema.documentation.as_deref())?;

        for location in &schema.includes {
            let mut include = BytesStart::new("xsd:include");
            include.push_attribute(("schemaLocation", location.as_str()));
            self.event(Event::Empty(include))?;
        }
        for import in &schema.imports {
            let mut tag = BytesStart::new("xsd:import");
            tag.push_attribute(("namespace", import.namespace.as_str()));
            if let Some(location) = &import.location {
                tag.push_attribute(("schemaLocation", location.as_str()));
            }
            self.event(Event::Empty(tag))?;
        }

        for component in &schema.components {
            match component {
                Component::SimpleType(t) => self.simple_type(t)?,
                Component::ComplexType(t) => self.complex_type(t)?,
                Component::Element(e) => self.element(e)?,
            }
        }

        self.end("xsd:schema")
    }

    fn simple_type(&mut self, def: &SimpleTypeDef) -> Result<()> {
        let mut tag = BytesStart::new("xsd:simpleType");
        tag.push_attribute(("name", def.name.as_str()));
        self.event(Event::Start(tag))?;
        self.documentation(def.documentation.as_deref())?;

        match &def.derivation {
            SimpleDerivation::Restriction { base, facets } => {
                let mut restriction = BytesStart::new("xsd:restriction");
                restriction.push_attribute(("base", self.qname(base).as_str()));
                self.open(restriction, !facets.is_empty())?;
                if !facets.is_empty() {
                    for facet in facets {
                        let mut tag = BytesStart::new(facet.tag());
                        tag.push_attribute(("value", facet.value().as_str()));
                        match facet {
                            super::model::Facet::Enumeration {
                                documentation: Some(doc),
                                ..
                            } => {
                                self.event(Event::Start(tag))?;
                                self.documentation(Some(doc))?;
                                self.end(facet.tag())?;
                            }
                            _ => self.event(Event::Empty(tag))?,
                        }
                    }
                    self.end("xsd:restriction")?;
                }
            }
            SimpleDerivation::List { item } => {
                let mut list = BytesStart::new("xsd:list");
                list.push_attribute(("itemType", self.qname(item).as_str()));
                self.event(Event::Empty(list))?;
            }
        }

        self.end("xsd:simpleType")
    }

    fn complex_type(&mut self, def: &ComplexTypeDef) -> Result<()> {
        let mut tag = BytesStart::new("xsd:complexType");
        tag.push_attribute(("name", def.name.as_str()));
        self.event(Event::Start(tag))?;
        self.documentation(def.documentation.as_deref())?;

        match &def.content {
            ComplexContent::Sequence(particles) => {
                self.sequence(particles)?;
                for attribute in &def.attributes {
                    self.attribute(attribute)?;
                }
            }
            ComplexContent::Extension { base, particles } => {
                self.event(Event::Start(BytesStart::new("xsd:complexContent")))?;
                let mut extension = BytesStart::new("xsd:extension");
                extension.push_attribute(("base", self.qname(base).as_str()));
                self.event(Event::Start(extension))?;
                self.sequence(particles)?;
                for attribute in &def.attributes {
                    self.attribute(attribute)?;
                }
                self.end("xsd:extension")?;
                self.end("xsd:complexContent")?;
            }
            ComplexContent::SimpleExtension(base) => {
                self.event(Event::Start(BytesStart::new("xsd:simpleContent")))?;
                let mut extension = BytesStart::new("xsd:extension");
                extension.push_attribute(("base", self.qname(base).as_str()));
                self.open(extension, !def.attributes.is_empty())?;
                if !def.attributes.is_empty() {
                    for attribute in &def.attributes {
                        self.attribute(attribute)?;
                    }
                    self.end("xsd:extension")?;
                }
                self.end("xsd:simpleContent")?;
            }
        }

        self.end("xsd:complexType")
    }

    fn sequence(&mut self, particles: &[Particle]) -> Result<()> {
        if particles.is_empty() {
            return self.event(Event::Empty(BytesStart::new("xsd:sequence")));
        }
        self.event(Event::Start(BytesStart::new("xsd:sequence")))?;
        for particle in particles {
            self.particle(particle)?;
        }
        self.end("xsd:sequence")
    }

    fn particle(&mut self, particle: &Particle) -> Result<()> {
        let mut tag = BytesStart::new("xsd:element");
        let documentation = match &particle.term {
            Term::Element {
                name,
                type_name,
                documentation,
            } => {
                tag.push_attribute(("name", name.as_str()));
                tag.push_attribute(("type", self.qname(type_name).as_str()));
                documentation.as_deref()
            }
            Term::Ref(name) => {
                tag.push_attribute(("ref", self.qname(name).as_str()));
                None
            }
        };
        if particle.min_occurs != 1 {
            tag.push_attribute(("minOccurs", particle.min_occurs.to_string().as_str()));
        }
        match particle.max_occurs {
            None => tag.push_attribute(("maxOccurs", "unbounded")),
            Some(1) => {}
            Some(n) => tag.push_attribute(("maxOccurs", n.to_string().as_str())),
        }

        self.open(tag, documentation.is_some())?;
        if documentation.is_some() {
            self.documentation(documentation)?;
            self.end("xsd:element")?;
        }
        Ok(())
    }

    fn attribute(&mut self, def: &AttributeDef) -> Result<()> {
        let mut tag = BytesStart::new("xsd:attribute");
        tag.push_attribute(("name", def.name.as_str()));
        tag.push_attribute(("type", self.qname(&def.type_name).as_str()));
        tag.push_attribute(("use", if def.required { "required" } else { "optional" }));
        self.open(tag, def.documentation.is_some())?;
        if def.documentation.is_some() {
            self.documentation(def.documentation.as_deref())?;
            self.end("xsd:attribute")?;
        }
        Ok(())
    }

    fn element(&mut self, def: &ElementDef) -> Result<()> {
        let mut tag = BytesStart::new("xsd:element");
        tag.push_attribute(("name", def.name.as_str()));
        tag.push_attribute(("type", self.qname(&def.type_name).as_str()));
        if let Some(group) = &def.substitution_group {
            tag.push_attribute(("substitutionGroup", self.qname(group).as_str()));
        }
        self.open(tag, def.documentation.is_some())?;
        if def.documentation.is_some() {
            self.documentation(def.documentation.as_deref())?;
            self.end("xsd:element")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::xsd::model::{Facet, Import};

    const NS: &str = "http://example.com/ns/Orders/v01";

    #[test]
    fn test_writes_prefixed_components() {
        let schema = Schema {
            target_namespace: Some(NS.to_string()),
            version: Some("1.0.0".into()),
            imports: vec![Import {
                namespace: "http://example.com/ns/Base/v01".into(),
                location: Some("Base_1_0_0.xsd".into()),
            }],
            components: vec![
                Component::SimpleType(SimpleTypeDef {
                    name: "Code".into(),
                    documentation: Some("A & B".into()),
                    derivation: SimpleDerivation::Restriction {
                        base: QName::xsd("string"),
                        facets: vec![Facet::MaxLength(3)],
                    },
                }),
                Component::ComplexType(ComplexTypeDef {
                    name: "Order_Summary".into(),
                    documentation: None,
                    content: ComplexContent::Sequence(vec![Particle {
                        term: Term::Element {
                            name: "Base".into(),
                            type_name: QName::in_namespace("http://example.com/ns/Base/v01", "Base_Summary"),
                            documentation: None,
                        },
                        min_occurs: 0,
                        max_occurs: None,
                    }]),
                    attributes: vec![AttributeDef {
                        name: "code".into(),
                        type_name: QName::in_namespace(NS, "Code"),
                        required: true,
                        documentation: None,
                    }],
                }),
            ],
            ..Schema::default()
        };
        let prefixes = BTreeMap::from([
            (NS.to_string(), "o".to_string()),
            ("http://example.com/ns/Base/v01".to_string(), "b".to_string()),
        ]);

        let xml = String::from_utf8(write_schema(&schema, &prefixes).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("xmlns:o=\"http://example.com/ns/Orders/v01\""));
        assert!(xml.contains("targetNamespace=\"http://example.com/ns/Orders/v01\""));
        assert!(xml.contains("<xsd:import namespace=\"http://example.com/ns/Base/v01\" schemaLocation=\"Base_1_0_0.xsd\"/>"));
        assert!(xml.contains("A &amp; B"));
        assert!(xml.contains("<xsd:maxLength value=\"3\"/>"));
        assert!(xml.contains("type=\"b:Base_Summary\" minOccurs=\"0\" maxOccurs=\"unbounded\""));
        assert!(xml.contains("<xsd:attribute name=\"code\" type=\"o:Code\" use=\"required\"/>"));
    }

    #[test]
    fn test_chameleon_names_unqualified() {
        let schema = Schema {
            components: vec![Component::Element(ElementDef {
                name: "Shared".into(),
                type_name: QName::new(None, "Shared_Type"),
                substitution_group: None,
                documentation: None,
            })],
            ..Schema::default()
        };
        let xml = String::from_utf8(write_schema(&schema, &BTreeMap::new()).unwrap()).unwrap();
        assert!(!xml.contains("targetNamespace"));
        assert!(xml.contains("<xsd:element name=\"Shared\" type=\"Shared_Type\"/>"));
    }
}
