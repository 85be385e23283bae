//! Namespace Resolver
//!
//! Maps a namespace plus file hints to concrete library URLs.
//!
//! A namespace listed in the catalog resolves to its catalog locations.
//! Otherwise each hint is tried against these strategies, stopping at the
//! first success:
//! 1. an already-loaded item with the same namespace and file name
//! 2. an absolute or base-relative local file that exists
//! 3. a repository URI (`otm://{id}/{path}`), cached per (namespace, URI)
//! 4. a best-effort search of every repository by namespace and file name
//!
//! Strategies fail silently. A hint nothing could locate comes back as its
//! base-relative URL, so opening it later reports `LIBRARY_NOT_FOUND`.

pub mod catalog;
pub mod repository;

pub use catalog::NamespaceCatalog;
pub use repository::{parse_repository_uri, FileSystemRepository, Repository};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::version::VersionScheme;

#[derive(Debug)]
pub struct NamespaceResolver {
    scheme: Arc<dyn VersionScheme>,
    catalog: Option<NamespaceCatalog>,
    repositories: Vec<Box<dyn Repository>>,
    /// (namespace, URL) of items already loaded
    loaded: Vec<(Option<String>, Url)>,
    /// (namespace, repository URI) -> result of the repository lookup
    cache: HashMap<(String, String), Option<Url>>,
}

impl NamespaceResolver {
    pub fn new(scheme: Arc<dyn VersionScheme>) -> Self {
        Self {
            scheme,
            catalog: None,
            repositories: Vec::new(),
            loaded: Vec::new(),
            cache: HashMap::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: NamespaceCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_repository(mut self, repository: Box<dyn Repository>) -> Self {
        self.repositories.push(repository);
        self
    }

    /// Record an item that has been loaded
    pub fn register_loaded(&mut self, namespace: Option<&str>, url: Url) {
        let entry = (namespace.map(str::to_string), url);
        if !self.loaded.contains(&entry) {
            self.loaded.push(entry);
        }
    }

    /// Resolve a namespace and its file hints to library URLs
    ///
    /// `base` is the URL of the library declaring the import; relative hints
    /// resolve against it. The result is de-duplicated and in hint order.
    pub fn resolve(&mut self, namespace: Option<&str>, hints: &[String], base: Option<&Url>) -> Vec<Url> {
        if let Some(locations) = namespace.and_then(|ns| self.catalog.as_ref()?.locations(ns)) {
            debug!(namespace = ?namespace, "Resolved through catalog");
            return locations.to_vec();
        }

        let mut urls: Vec<Url> = Vec::new();
        for hint in hints {
            let url = self
                .resolve_hint(namespace, hint, base)
                .or_else(|| fallback_url(hint, base));
            match url {
                Some(url) if !urls.contains(&url) => urls.push(url),
                Some(_) => {}
                None => debug!(hint = %hint, "File hint is not a valid location"),
            }
        }
        urls
    }

    fn resolve_hint(&mut self, namespace: Option<&str>, hint: &str, base: Option<&Url>) -> Option<Url> {
        if let Some(url) = self.from_loaded(namespace, hint) {
            return Some(url);
        }
        if let Some(url) = local_file(hint, base) {
            return Some(url);
        }
        if parse_repository_uri(hint).is_some() {
            if let Some(url) = self.from_repository_uri(namespace, hint) {
                return Some(url);
            }
        }
        self.search_repositories(namespace?, hint)
    }

    fn from_loaded(&self, namespace: Option<&str>, hint: &str) -> Option<Url> {
        let filename = file_name(hint);
        self.loaded
            .iter()
            .find(|(ns, url)| {
                ns.as_deref() == namespace
                    && url.path_segments().and_then(|mut s| s.next_back()) == Some(filename)
            })
            .map(|(_, url)| url.clone())
    }

    fn from_repository_uri(&mut self, namespace: Option<&str>, uri: &str) -> Option<Url> {
        let key = (namespace.unwrap_or_default().to_string(), uri.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let resolved = parse_repository_uri(uri).and_then(|(id, path)| {
            self.repositories
                .iter()
                .find(|r| r.id() == id)
                .and_then(|r| r.resolve_path(path))
        });
        debug!(uri = %uri, found = resolved.is_some(), "Repository URI resolved");
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn search_repositories(&self, namespace: &str, hint: &str) -> Option<Url> {
        let filename = file_name(hint);
        self.repositories
            .iter()
            .find_map(|r| r.lookup(namespace, filename, self.scheme.as_ref()))
    }
}

fn file_name(hint: &str) -> &str {
    hint.rsplit('/').next().unwrap_or(hint)
}

/// An existing local file named by a hint
fn local_file(hint: &str, base: Option<&Url>) -> Option<Url> {
    let path = Path::new(hint);
    if path.is_absolute() {
        return path.is_file().then(|| Url::from_file_path(path).ok()).flatten();
    }

    let url = match Url::parse(hint) {
        Ok(url) => url,
        Err(_) => base?.join(hint).ok()?,
    };
    let exists = url.scheme() == "file"
        && url.to_file_path().map(|p| p.is_file()).unwrap_or(false);
    exists.then_some(url)
}

/// Location reported for a hint no strategy found
fn fallback_url(hint: &str, base: Option<&Url>) -> Option<Url> {
    if Path::new(hint).is_absolute() {
        return Url::from_file_path(hint).ok();
    }
    match base {
        Some(base) => base.join(hint).ok(),
        None => Url::parse(hint).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::OtmVersionScheme;

    const NS: &str = "http://example.com/ns/Base/v01";

    fn resolver() -> NamespaceResolver {
        NamespaceResolver::new(Arc::new(OtmVersionScheme::new()))
    }

    #[test]
    fn test_base_relative_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Base.otm"), "{}").unwrap();
        let base = Url::from_file_path(dir.path().join("Orders.otm")).unwrap();

        let urls = resolver().resolve(Some(NS), &["Base.otm".to_string()], Some(&base));
        assert_eq!(urls, vec![Url::from_file_path(dir.path().join("Base.otm")).unwrap()]);
    }

    #[test]
    fn test_loaded_items_take_priority() {
        let mut resolver = resolver();
        let loaded = Url::parse("file:///elsewhere/Base.otm").unwrap();
        resolver.register_loaded(Some(NS), loaded.clone());

        let urls = resolver.resolve(Some(NS), &["lib/Base.otm".to_string()], None);
        assert_eq!(urls, vec![loaded]);
    }

    #[test]
    fn test_unresolved_hint_returns_base_relative_url() {
        let base = Url::parse("file:///work/Orders.otm").unwrap();
        let urls = resolver().resolve(Some(NS), &["missing/Base.otm".to_string()], Some(&base));
        assert_eq!(urls[0].as_str(), "file:///work/missing/Base.otm");
    }

    #[test]
    fn test_repository_uri_resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("travel")).unwrap();
        std::fs::write(dir.path().join("travel/Base.otm"), "{}").unwrap();

        let mut resolver = resolver()
            .with_repository(Box::new(FileSystemRepository::new("central", dir.path())));
        let hints = vec!["otm://central/travel/Base.otm".to_string()];

        let first = resolver.resolve(Some(NS), &hints, None);
        let second = resolver.resolve(Some(NS), &hints, None);
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert!(first[0].as_str().ends_with("travel/Base.otm"));
    }

    #[test]
    fn test_best_effort_repository_search() {
        let dir = tempfile::tempdir().unwrap();
        let scheme = OtmVersionScheme::new();
        let repo = FileSystemRepository::new("local", dir.path());
        let item_dir = repo.namespace_dir(NS, &scheme).unwrap();
        std::fs::create_dir_all(&item_dir).unwrap();
        std::fs::write(item_dir.join("Base_1_0_0.otm"), "{}").unwrap();

        let mut resolver = resolver().with_repository(Box::new(repo));
        let base = Url::parse("file:///nowhere/Orders.otm").unwrap();
        let urls = resolver.resolve(Some(NS), &["Base_1_0_0.otm".to_string()], Some(&base));
        assert_eq!(urls, vec![Url::from_file_path(item_dir.join("Base_1_0_0.otm")).unwrap()]);
    }

    #[test]
    fn test_missed_repository_uri_falls_back_to_search() {
        let dir = tempfile::tempdir().unwrap();
        let scheme = OtmVersionScheme::new();
        let repo = FileSystemRepository::new("central", dir.path());
        let item_dir = repo.namespace_dir(NS, &scheme).unwrap();
        std::fs::create_dir_all(&item_dir).unwrap();
        std::fs::write(item_dir.join("Base.otm"), "{}").unwrap();

        let mut resolver = resolver().with_repository(Box::new(repo));
        let hints = vec!["otm://central/old/place/Base.otm".to_string()];
        let urls = resolver.resolve(Some(NS), &hints, None);
        assert_eq!(urls, vec![Url::from_file_path(item_dir.join("Base.otm")).unwrap()]);
    }

    #[test]
    fn test_catalog_wins_over_hints() {
        let mut catalog = NamespaceCatalog::default();
        let location = Url::parse("file:///catalog/Base.otm").unwrap();
        catalog.insert(NS, vec![location.clone()]);

        let mut resolver = resolver().with_catalog(catalog);
        let urls = resolver.resolve(Some(NS), &["Base.otm".to_string()], None);
        assert_eq!(urls, vec![location]);
    }

    #[test]
    fn test_duplicate_hints_deduplicated() {
        let base = Url::parse("file:///work/Orders.otm").unwrap();
        let hints = vec!["Base.otm".to_string(), "./Base.otm".to_string()];
        let urls = resolver().resolve(Some(NS), &hints, Some(&base));
        assert_eq!(urls.len(), 1);
    }
}
