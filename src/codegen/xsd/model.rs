//! In-memory XML Schema documents
//!
//! Components carry namespace-qualified names rather than prefixed strings;
//! prefixes are assigned once per run and applied when a document is written.

use crate::model::builtins::XSD_NAMESPACE;
use crate::model::LibraryId;

/// A namespace-qualified component name; no namespace means unqualified
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<String>, local: impl Into<String>) -> Self {
        Self {
            namespace,
            local: local.into(),
        }
    }

    /// A type from the XML Schema namespace
    pub fn xsd(local: &str) -> Self {
        Self::new(Some(XSD_NAMESPACE.to_string()), local)
    }

    pub fn in_namespace(namespace: &str, local: impl Into<String>) -> Self {
        Self::new(Some(namespace.to_string()), local)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub namespace: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    /// Absent for chameleon schemas
    pub target_namespace: Option<String>,
    pub version: Option<String>,
    pub documentation: Option<String>,
    pub includes: Vec<String>,
    pub imports: Vec<Import>,
    pub components: Vec<Component>,
}

impl Schema {
    /// Every qualified name referenced by a component
    pub fn references(&self) -> Vec<&QName> {
        let mut refs = Vec::new();
        for component in &self.components {
            component.collect_references(&mut refs);
        }
        refs
    }

    /// Namespaces a writer must declare prefixes for
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self
            .target_namespace
            .iter()
            .map(String::as_str)
            .chain(self.imports.iter().map(|i| i.namespace.as_str()))
            .chain(self.references().into_iter().filter_map(|q| q.namespace.as_deref()))
            .collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        namespaces
    }

    pub fn add_include(&mut self, location: &str) {
        if !self.includes.iter().any(|i| i == location) {
            self.includes.push(location.to_string());
        }
    }

    pub fn add_import(&mut self, namespace: &str, location: Option<&str>) {
        let exists = self
            .imports
            .iter()
            .any(|i| i.namespace == namespace && i.location.as_deref() == location);
        if !exists {
            self.imports.push(Import {
                namespace: namespace.to_string(),
                location: location.map(str::to_string),
            });
        }
    }
}

// =============================================================================
// Components
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    SimpleType(SimpleTypeDef),
    ComplexType(ComplexTypeDef),
    Element(ElementDef),
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Self::SimpleType(t) => &t.name,
            Self::ComplexType(t) => &t.name,
            Self::Element(e) => &e.name,
        }
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a QName>) {
        match self {
            Self::SimpleType(t) => match &t.derivation {
                SimpleDerivation::Restriction { base, .. } => refs.push(base),
                SimpleDerivation::List { item } => refs.push(item),
            },
            Self::ComplexType(t) => {
                match &t.content {
                    ComplexContent::Sequence(particles) => {
                        for particle in particles {
                            refs.push(particle.term.name());
                        }
                    }
                    ComplexContent::SimpleExtension(base) => refs.push(base),
                    ComplexContent::Extension { base, particles } => {
                        refs.push(base);
                        for particle in particles {
                            refs.push(particle.term.name());
                        }
                    }
                }
                refs.extend(t.attributes.iter().map(|a| &a.type_name));
            }
            Self::Element(e) => {
                refs.push(&e.type_name);
                refs.extend(e.substitution_group.as_ref());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTypeDef {
    pub name: String,
    pub documentation: Option<String>,
    pub derivation: SimpleDerivation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleDerivation {
    Restriction { base: QName, facets: Vec<Facet> },
    List { item: QName },
}

/// Constraining facet of a simple type restriction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet {
    Pattern(String),
    MinLength(u32),
    MaxLength(u32),
    FractionDigits(u32),
    TotalDigits(u32),
    MinInclusive(String),
    MaxInclusive(String),
    Enumeration { value: String, documentation: Option<String> },
}

impl Facet {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Pattern(_) => "xsd:pattern",
            Self::MinLength(_) => "xsd:minLength",
            Self::MaxLength(_) => "xsd:maxLength",
            Self::FractionDigits(_) => "xsd:fractionDigits",
            Self::TotalDigits(_) => "xsd:totalDigits",
            Self::MinInclusive(_) => "xsd:minInclusive",
            Self::MaxInclusive(_) => "xsd:maxInclusive",
            Self::Enumeration { .. } => "xsd:enumeration",
        }
    }

    pub fn value(&self) -> String {
        match self {
            Self::Pattern(v) | Self::MinInclusive(v) | Self::MaxInclusive(v) => v.clone(),
            Self::MinLength(n) | Self::MaxLength(n) | Self::FractionDigits(n) | Self::TotalDigits(n) => {
                n.to_string()
            }
            Self::Enumeration { value, .. } => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexTypeDef {
    pub name: String,
    pub documentation: Option<String>,
    pub content: ComplexContent,
    pub attributes: Vec<AttributeDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexContent {
    Sequence(Vec<Particle>),
    /// Simple content extending a simple type or another simple-content type
    SimpleExtension(QName),
    /// Complex content extending another complex type
    Extension { base: QName, particles: Vec<Particle> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    pub term: Term,
    pub min_occurs: u32,
    /// `None` means unbounded
    pub max_occurs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Local element declaration
    Element {
        name: String,
        type_name: QName,
        documentation: Option<String>,
    },
    /// Reference to a global element
    Ref(QName),
}

impl Term {
    fn name(&self) -> &QName {
        match self {
            Self::Element { type_name, .. } => type_name,
            Self::Ref(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub type_name: QName,
    pub required: bool,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDef {
    pub name: String,
    pub type_name: QName,
    pub substitution_group: Option<QName>,
    pub documentation: Option<String>,
}

// =============================================================================
// Documents
// =============================================================================

/// A schema bound to the file it will be written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdDocument {
    /// Path relative to the output directory
    pub path: String,
    pub library: Option<LibraryId>,
    /// Namespaces a chameleon schema is included into
    pub hosts: Vec<String>,
    pub schema: Schema,
    pub service: bool,
}
