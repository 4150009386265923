//! Fetch requests and fetched content
//!
//! Request payloads for the git and custom-script fetch sub-tasks, plus the
//! file content that comes back. The payload shapes are this crate's own;
//! the remote wire format is someone else's concern.

use crate::descriptor::{FetchRef, GitProvider, ManifestKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One fetched file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedFile {
    pub path: String,
    pub content: String,
}

impl FetchedFile {
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Fetched files grouped by descriptor order key
pub type FetchedFiles = BTreeMap<String, Vec<FetchedFile>>;

/// Which fetch strategies a manifest set needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFlags {
    /// Custom-script fetch sub-task
    pub custom: bool,
    /// Git fetch sub-task
    pub git: bool,
    /// Synchronous internal file-store lookup
    pub local: bool,
}

impl FetchFlags {
    /// Whether any remote sub-task is needed
    #[inline]
    #[must_use]
    pub fn needs_remote(&self) -> bool {
        self.custom || self.git
    }
}

/// Files to pull from one git location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitFetchFilesConfig {
    /// Order key of the descriptor the files belong to
    pub identifier: String,
    /// Human-readable label used in fetch logs
    pub label: String,
    pub kind: ManifestKind,
    pub provider: GitProvider,
    pub connector_ref: String,
    pub repo_name: Option<String>,
    pub fetch_ref: FetchRef,
    pub paths: Vec<String>,
    pub succeed_if_file_not_found: bool,
}

/// Single batched git fetch sub-task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitFetchRequest {
    pub configs: Vec<GitFetchFilesConfig>,
}

impl GitFetchRequest {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Files produced by one custom fetch script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFetchFileConfig {
    /// Order key of the descriptor the files belong to
    pub key: String,
    pub required: bool,
    /// Read from the primary's default source rather than running a script
    pub default_source: bool,
    pub file_paths: Vec<String>,
    pub script: Option<String>,
    pub account_id: String,
}

/// Primary descriptor fetched from a custom source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomManifestSource {
    pub script: String,
    pub file_paths: Vec<String>,
    pub account_id: String,
}

/// Single custom-script fetch sub-task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFetchRequest {
    pub configs: Vec<CustomFetchFileConfig>,
    pub custom_manifest_source: Option<CustomManifestSource>,
    pub delegate_selectors: Vec<String>,
}

impl CustomFetchRequest {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty() && self.custom_manifest_source.is_none()
    }
}
