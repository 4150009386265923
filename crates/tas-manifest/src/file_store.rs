//! Internal file store boundary
//!
//! Lookups are local and synchronous; a missing path or a folder where a
//! file is expected fails immediately.

use crate::error::{ManifestError, ManifestResult};
use crate::fetch::FetchedFile;

/// Node returned by a file-store lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStoreNode {
    File { path: String, content: String },
    Folder { path: String, children: Vec<String> },
}

/// Read access to the internal file store
#[cfg_attr(test, mockall::automock)]
pub trait FileStore: Send + Sync {
    /// Node at `path`, if any
    fn lookup(&self, path: &str) -> Option<FileStoreNode>;
}

/// Resolve `path` to exactly one file
pub fn read_file(store: &dyn FileStore, path: &str) -> ManifestResult<FetchedFile> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ManifestError::EmptyFileReference);
    }
    match store.lookup(path) {
        Some(FileStoreNode::File { path, content }) => Ok(FetchedFile::new(path, content)),
        Some(FileStoreNode::Folder { path, .. }) => Err(ManifestError::NotAFile(path)),
        None => Err(ManifestError::FileNotFound(path.to_string())),
    }
}

/// Resolve every path, failing on the first bad reference
pub fn read_files(store: &dyn FileStore, paths: &[String]) -> ManifestResult<Vec<FetchedFile>> {
    paths.iter().map(|p| read_file(store, p)).collect()
}

/// Level of the file store a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileScope {
    Account,
    Org,
    Project,
}

impl FileScope {
    const ACCOUNT_PREFIX: &'static str = "account:";
    const ORG_PREFIX: &'static str = "org:";

    /// Scope named by the prefix of `path`
    #[must_use]
    pub fn of(path: &str) -> Self {
        let path = path.trim();
        if path.starts_with(Self::ACCOUNT_PREFIX) {
            Self::Account
        } else if path.starts_with(Self::ORG_PREFIX) {
            Self::Org
        } else {
            Self::Project
        }
    }

    #[inline]
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Account => Self::ACCOUNT_PREFIX,
            Self::Org => Self::ORG_PREFIX,
            Self::Project => "",
        }
    }

    /// `path` re-rooted under this scope
    #[must_use]
    pub fn scoped(self, path: &str) -> String {
        format!("{}/{}", self.prefix(), path.trim().trim_start_matches('/'))
    }

    /// `path` with any scope prefix removed
    #[must_use]
    pub fn unscoped(path: &str) -> &str {
        path.strip_prefix(Self::ACCOUNT_PREFIX)
            .or_else(|| path.strip_prefix(Self::ORG_PREFIX))
            .unwrap_or(path)
    }
}

/// Read `paths` from the scope of `scope_path`, reporting them without the scope prefix
pub fn read_scoped_files(
    store: &dyn FileStore,
    scope_path: &str,
    paths: &[String],
) -> ManifestResult<Vec<FetchedFile>> {
    let scope = FileScope::of(scope_path);
    let scoped: Vec<String> = paths.iter().map(|p| scope.scoped(p)).collect();
    Ok(read_files(store, &scoped)?
        .into_iter()
        .map(|file| FetchedFile::new(FileScope::unscoped(&file.path), file.content))
        .collect())
}
