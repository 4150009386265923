//! Manifest descriptors
//!
//! A descriptor names one declared manifest: its role, its position in the
//! declaration list and the store its bytes live in. Descriptors are built
//! through validated constructors and never mutated afterwards.

use crate::error::{ManifestError, ManifestResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical role of a manifest document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManifestKind {
    /// Primary application descriptor
    Primary,
    /// Variable-override document
    Vars,
    /// Autoscaler policy document
    Autoscaler,
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("tas manifest"),
            Self::Vars => f.write_str("vars manifest"),
            Self::Autoscaler => f.write_str("autoscaler manifest"),
        }
    }
}

/// Git hosting flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GitProvider {
    Git,
    Github,
    GitLab,
    Bitbucket,
}

impl fmt::Display for GitProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Git => "Git",
            Self::Github => "Github",
            Self::GitLab => "GitLab",
            Self::Bitbucket => "Bitbucket",
        };
        f.write_str(name)
    }
}

/// Revision to fetch from a git store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum FetchRef {
    Branch(String),
    Commit(String),
}

/// Git-backed store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStore {
    pub provider: GitProvider,
    pub connector_ref: String,
    /// Repository name for account-level connectors
    pub repo_name: Option<String>,
    pub fetch_ref: FetchRef,
    pub paths: Vec<String>,
}

/// Store whose files are produced by a user script on the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRemoteStore {
    pub script: String,
    pub file_paths: Vec<String>,
    pub delegate_selectors: Vec<String>,
}

/// Reference into the internal file store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStoreRef {
    pub paths: Vec<String>,
}

/// Where a manifest's bytes live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "spec")]
pub enum ManifestStore {
    Git(GitStore),
    CustomRemote(CustomRemoteStore),
    InternalFileStore(FileStoreRef),
    Inline(String),
}

impl ManifestStore {
    /// Short name used in log lines and error messages
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Self::Git(git) => git.provider.to_string(),
            Self::CustomRemote(_) => "CustomRemote".to_string(),
            Self::InternalFileStore(_) => "Harness".to_string(),
            Self::Inline(_) => "Inline".to_string(),
        }
    }

    /// Paths declared by the store (empty for inline content)
    #[must_use]
    pub fn paths(&self) -> &[String] {
        match self {
            Self::Git(git) => &git.paths,
            Self::CustomRemote(custom) => &custom.file_paths,
            Self::InternalFileStore(file_store) => &file_store.paths,
            Self::Inline(_) => &[],
        }
    }

    /// Whether the store is served by a git fetch sub-task
    #[inline]
    #[must_use]
    pub fn is_git(&self) -> bool {
        matches!(self, Self::Git(_))
    }

    fn validate(&self, identifier: &str) -> ManifestResult<()> {
        let invalid = |reason: &str| ManifestError::InvalidDescriptor {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };
        match self {
            Self::Git(git) => {
                if git.connector_ref.trim().is_empty() {
                    return Err(invalid("git store requires a connector reference"));
                }
                if git.paths.is_empty() {
                    return Err(invalid("git store requires at least one path"));
                }
            }
            Self::CustomRemote(custom) => {
                if custom.script.trim().is_empty() {
                    return Err(invalid("custom remote store requires a fetch script"));
                }
                if custom.file_paths.is_empty() {
                    return Err(invalid("custom remote store requires at least one file path"));
                }
            }
            Self::InternalFileStore(file_store) => {
                if file_store.paths.is_empty() {
                    return Err(invalid("file store reference requires at least one path"));
                }
            }
            Self::Inline(content) => {
                if content.trim().is_empty() {
                    return Err(invalid("inline manifest content is empty"));
                }
            }
        }
        Ok(())
    }
}

/// One declared manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    identifier: String,
    kind: ManifestKind,
    order: u32,
    store: ManifestStore,
    vars_paths: Vec<String>,
    autoscaler_path: Option<String>,
}

impl ManifestDescriptor {
    /// Create a vars or autoscaler descriptor, or a primary without side paths
    pub fn new(
        identifier: impl Into<String>,
        kind: ManifestKind,
        order: u32,
        store: ManifestStore,
    ) -> ManifestResult<Self> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(ManifestError::InvalidDescriptor {
                identifier,
                reason: "identifier is empty".to_string(),
            });
        }
        store.validate(&identifier)?;
        Ok(Self {
            identifier,
            kind,
            order,
            store,
            vars_paths: Vec::new(),
            autoscaler_path: None,
        })
    }

    /// Create a primary descriptor carrying vars and autoscaler paths in the same store
    pub fn primary(
        identifier: impl Into<String>,
        order: u32,
        store: ManifestStore,
        vars_paths: Vec<String>,
        autoscaler_path: Option<String>,
    ) -> ManifestResult<Self> {
        let mut descriptor = Self::new(identifier, ManifestKind::Primary, order, store)?;
        if matches!(descriptor.store, ManifestStore::Inline(_))
            && (!vars_paths.is_empty() || autoscaler_path.is_some())
        {
            return Err(ManifestError::InvalidDescriptor {
                identifier: descriptor.identifier,
                reason: "inline manifests cannot reference vars or autoscaler paths".to_string(),
            });
        }
        descriptor.vars_paths = vars_paths
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect();
        descriptor.autoscaler_path = autoscaler_path.filter(|p| !p.trim().is_empty());
        Ok(descriptor)
    }

    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn vars_paths(&self) -> &[String] {
        &self.vars_paths
    }

    #[inline]
    #[must_use]
    pub fn autoscaler_path(&self) -> Option<&str> {
        self.autoscaler_path.as_deref()
    }

    /// Key under which fetched files for this descriptor are stored
    #[inline]
    #[must_use]
    pub fn order_key(&self) -> String {
        self.order.to_string()
    }

    /// Copy of this descriptor without its inline autoscaler path
    #[must_use]
    pub(crate) fn without_autoscaler_path(&self) -> Self {
        Self {
            autoscaler_path: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_store(paths: &[&str]) -> ManifestStore {
        ManifestStore::Git(GitStore {
            provider: GitProvider::Github,
            connector_ref: "account.github".to_string(),
            repo_name: None,
            fetch_ref: FetchRef::Branch("main".to_string()),
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
        })
    }

    #[test]
    fn primary_with_side_paths() {
        let d = ManifestDescriptor::primary(
            "app",
            0,
            git_store(&["deploy/manifest.yml"]),
            vec!["deploy/vars.yml".into(), "  ".into()],
            Some("deploy/autoscaler.yml".into()),
        )
        .unwrap();

        assert_eq!(d.kind(), ManifestKind::Primary);
        assert_eq!(d.vars_paths(), ["deploy/vars.yml".to_string()]);
        assert_eq!(d.autoscaler_path(), Some("deploy/autoscaler.yml"));
        assert_eq!(d.order_key(), "0");
    }

    #[test]
    fn rejects_blank_identifier() {
        let err = ManifestDescriptor::new(" ", ManifestKind::Vars, 1, git_store(&["v.yml"]));
        assert!(matches!(err, Err(ManifestError::InvalidDescriptor { .. })));
    }

    #[test]
    fn rejects_git_store_without_paths() {
        let err = ManifestDescriptor::new("vars", ManifestKind::Vars, 1, git_store(&[]));
        assert!(err.is_err());
    }

    #[test]
    fn rejects_inline_primary_with_vars_paths() {
        let err = ManifestDescriptor::primary(
            "app",
            0,
            ManifestStore::Inline("applications: []".into()),
            vec!["vars.yml".into()],
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn store_kind_names() {
        assert_eq!(git_store(&["a"]).kind_name(), "Github");
        assert_eq!(ManifestStore::Inline("x".into()).kind_name(), "Inline");
        assert!(git_store(&["a"]).is_git());
    }

    #[test]
    fn descriptor_serde_shape() {
        let d = ManifestDescriptor::new(
            "vars",
            ManifestKind::Vars,
            2,
            ManifestStore::InternalFileStore(FileStoreRef {
                paths: vec!["/vars.yml".into()],
            }),
        )
        .unwrap();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "vars");
        assert_eq!(json["store"]["kind"], "internalFileStore");
        let back: ManifestDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }
}
