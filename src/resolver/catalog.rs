//! Namespace catalog
//!
//! A TOML file mapping namespaces to library locations:
//!
//! ```toml
//! [namespaces]
//! "http://example.com/ns/Base/v01" = ["base/Base_1_0_0.otm"]
//! ```
//!
//! Relative locations resolve against the catalog file's directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    namespaces: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceCatalog {
    entries: BTreeMap<String, Vec<Url>>,
}

impl NamespaceCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let base = std::fs::canonicalize(path)?;
        let base = Url::from_file_path(&base).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "catalog path is not absolute")
        })?;
        Self::parse(&content, &base)
    }

    /// Parse catalog text; relative locations resolve against `base`
    pub fn parse(content: &str, base: &Url) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut entries = BTreeMap::new();
        for (namespace, locations) in file.namespaces {
            let urls = locations
                .iter()
                .map(|l| Url::parse(l).or_else(|_| base.join(l)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            entries.insert(namespace, urls);
        }
        Ok(Self { entries })
    }

    pub fn insert(&mut self, namespace: impl Into<String>, locations: Vec<Url>) {
        self.entries.insert(namespace.into(), locations);
    }

    pub fn locations(&self, namespace: &str) -> Option<&[Url]> {
        self.entries.get(namespace).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_locations_resolve_against_catalog() {
        let base = Url::parse("file:///work/catalog.toml").unwrap();
        let catalog = NamespaceCatalog::parse(
            r#"
            [namespaces]
            "http://example.com/ns/Base/v01" = ["base/Base.otm", "file:///shared/Base.otm"]
            "#,
            &base,
        )
        .unwrap();

        let locations = catalog.locations("http://example.com/ns/Base/v01").unwrap();
        assert_eq!(locations[0].as_str(), "file:///work/base/Base.otm");
        assert_eq!(locations[1].as_str(), "file:///shared/Base.otm");
        assert!(catalog.locations("http://other").is_none());
    }
}
