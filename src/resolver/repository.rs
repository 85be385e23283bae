//! Library repositories
//!
//! A repository is a store of managed library files addressed either by
//! namespace + file name or by repository URI (`otm://{id}/{path}`).

use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::version::VersionScheme;

/// URI scheme of repository item references
pub const REPOSITORY_SCHEME: &str = "otm";

pub trait Repository: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Locate an item by namespace and file name
    fn lookup(&self, namespace: &str, filename: &str, scheme: &dyn VersionScheme) -> Option<Url>;

    /// Locate an item by its path inside the repository
    fn resolve_path(&self, path: &str) -> Option<Url>;
}

/// Split `otm://{repositoryId}/{path}` into (id, path)
pub fn parse_repository_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix(REPOSITORY_SCHEME)?.strip_prefix("://")?;
    let (id, path) = rest.split_once('/')?;
    (!id.is_empty() && !path.is_empty()).then_some((id, path))
}

/// Repository backed by a directory tree
///
/// Items live at `{root}/{host}/{base path}/{version}/{filename}` where host
/// and base path come from the item's base namespace.
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    id: String,
    root: PathBuf,
}

impl FileSystemRepository {
    pub fn new(id: &str, root: &Path) -> Self {
        Self {
            id: id.to_string(),
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding items of a namespace
    pub fn namespace_dir(&self, namespace: &str, scheme: &dyn VersionScheme) -> Option<PathBuf> {
        let parts = scheme.decompose(namespace).ok()?;
        let base = Url::parse(&parts.base).ok()?;

        let mut dir = self.root.clone();
        if let Some(host) = base.host_str() {
            dir.push(host);
        }
        for segment in base.path_segments().into_iter().flatten() {
            if !segment.is_empty() {
                dir.push(segment);
            }
        }
        dir.push(parts.version.to_string());
        Some(dir)
    }

    fn existing(path: PathBuf) -> Option<Url> {
        if path.is_file() {
            Url::from_file_path(path).ok()
        } else {
            None
        }
    }
}

impl Repository for FileSystemRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn lookup(&self, namespace: &str, filename: &str, scheme: &dyn VersionScheme) -> Option<Url> {
        let dir = self.namespace_dir(namespace, scheme)?;
        Self::existing(dir.join(filename))
    }

    fn resolve_path(&self, path: &str) -> Option<Url> {
        Self::existing(self.root.join(path.trim_start_matches('/')))
    }
}
