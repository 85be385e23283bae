//! Project loading
//!
//! Walks imports and includes outward from one or more root libraries.
//! Each wave of newly discovered URLs is loaded in parallel; assembly starts
//! only after every wave has finished.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::config::CompilerConfig;
use crate::diagnostics::Findings;
use crate::error::{CompilerError, Result};
use crate::loader::{LibraryModule, ModuleLoader, ModuleSource};
use crate::model::{Assembly, Model};
use crate::resolver::{NamespaceCatalog, NamespaceResolver};
use crate::version::{OtmVersionScheme, VersionScheme};

/// A loaded and assembled set of libraries
#[derive(Debug)]
pub struct Project {
    pub model: Model,
    pub findings: Findings,
    /// Every URL that was attempted, in load order
    pub urls: Vec<Url>,
}

#[derive(Debug)]
pub struct ProjectLoader {
    loader: ModuleLoader,
    resolver: NamespaceResolver,
    scheme: Arc<dyn VersionScheme>,
    parallel: bool,
}

impl ProjectLoader {
    pub fn new(loader: ModuleLoader, resolver: NamespaceResolver, scheme: Arc<dyn VersionScheme>) -> Self {
        Self {
            loader,
            resolver,
            scheme,
            parallel: true,
        }
    }

    /// Loader and resolver configured from the `[loader]` and `[resolver]` sections
    pub fn from_config(config: &CompilerConfig) -> Result<Self> {
        let scheme: Arc<dyn VersionScheme> = Arc::new(OtmVersionScheme::new());
        let loader = ModuleLoader::new()?.with_fallback_severity(config.loader.fallback_severity);

        let mut resolver = NamespaceResolver::new(Arc::clone(&scheme));
        if let Some(catalog) = &config.resolver.catalog {
            resolver = resolver.with_catalog(NamespaceCatalog::load(catalog)?);
        }
        for repository in config.repositories() {
            resolver = resolver.with_repository(Box::new(repository));
        }

        Ok(Self::new(loader, resolver, scheme).parallel(config.loader.parallel))
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Load root files from disk
    pub fn load_files(&mut self, paths: &[PathBuf]) -> Result<Project> {
        let urls = paths
            .iter()
            .map(|p| file_url(p))
            .collect::<Result<Vec<_>>>()?;
        self.load(urls)
    }

    /// Load roots and everything they import or include
    pub fn load(&mut self, roots: Vec<Url>) -> Result<Project> {
        let mut findings = Findings::new();
        let mut modules: Vec<LibraryModule> = Vec::new();
        let mut seen: HashSet<Url> = HashSet::new();
        let mut attempted = Vec::new();

        let mut wave: Vec<Url> = roots.into_iter().filter(|u| seen.insert(u.clone())).collect();
        while !wave.is_empty() {
            info!(count = wave.len(), "Loading libraries");
            attempted.extend(wave.iter().cloned());

            let sources: Vec<ModuleSource> = wave.drain(..).map(ModuleSource::open).collect();
            let results = if self.parallel {
                self.loader.load_all(sources)
            } else {
                sources.into_iter().map(|s| self.loader.load(s)).collect()
            };

            let mut next = Vec::new();
            for result in results {
                findings.merge(result.findings);
                let Some(module) = result.module else {
                    continue;
                };
                self.resolver
                    .register_loaded(module.header.namespace.as_deref(), module.url.clone());

                for (namespace, hints) in module.dependencies() {
                    for url in self.resolver.resolve(namespace, hints, Some(&module.url)) {
                        if seen.insert(url.clone()) {
                            debug!(url = %url, from = %module.url, "Discovered dependency");
                            next.push(url);
                        }
                    }
                }
                modules.push(module);
            }
            wave = next;
        }

        let assembly = Assembly::from_modules(modules, Arc::clone(&self.scheme))?;
        findings.merge(assembly.findings);

        Ok(Project {
            model: assembly.model,
            findings,
            urls: attempted,
        })
    }
}

fn file_url(path: &Path) -> Result<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| {
        CompilerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", absolute.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::FindingCode;
    use crate::loader::GrammarVersion;
    use serde_json::json;

    fn write(dir: &Path, name: &str, doc: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_follows_imports_in_waves() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Base.otm", json!({
            "$grammar": GrammarVersion::V01_06.namespace(),
            "name": "Base",
            "namespace": "http://example.com/ns/Base/v01",
            "prefix": "b",
            "members": [{ "kind": "simpleType", "name": "Code", "base": "xsd:string" }]
        }));
        let root = write(dir.path(), "Orders.otm", json!({
            "$grammar": GrammarVersion::V01_06.namespace(),
            "name": "Orders",
            "namespace": "http://example.com/ns/Orders/v01",
            "prefix": "o",
            "imports": [{ "namespace": "http://example.com/ns/Base/v01", "prefix": "b", "fileHints": ["Base.otm", "Missing.otm"] }],
            "members": [{ "kind": "valueWithAttributes", "name": "Amount", "valueType": "b:Code" }]
        }));

        let mut loader = ProjectLoader::from_config(&CompilerConfig::default()).unwrap();
        let project = loader.load_files(&[root]).unwrap();

        assert_eq!(project.model.user_libraries().count(), 2);
        assert_eq!(project.findings.count_of(FindingCode::LibraryNotFound), 1);
        assert!(!project.findings.has_errors(), "{}", project.findings);
        assert_eq!(project.urls.len(), 3);
    }
}
