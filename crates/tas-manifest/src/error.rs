//! Error types for manifest handling
//!
//! Covers every way a manifest can be rejected before a remote command runs:
//! - Declaration errors (missing, duplicated or unsupported descriptors)
//! - Local file-store lookups
//! - YAML parsing and content classification
//! - Variable resolution in the application name and instance count

use crate::descriptor::ManifestKind;

/// Result alias used throughout the crate
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Manifest error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// No manifest declared for the step
    #[error("no manifests found in stage {0}")]
    NoManifests(String),

    /// A primary application descriptor is required but absent
    #[error("tas manifest is mandatory for tas step")]
    MissingPrimaryDescriptor,

    /// More than one primary application descriptor declared
    #[error("only one tas manifest can be declared, found {}: {}", .0.len(), .0.join(", "))]
    MultiplePrimaryDescriptors(Vec<String>),

    /// Descriptor failed validation
    #[error("invalid manifest descriptor {identifier}: {reason}")]
    InvalidDescriptor { identifier: String, reason: String },

    /// Store kind not supported in this position
    #[error("manifest store type: {0} is not supported yet")]
    UnsupportedStore(String),

    /// Blank path handed to the local file store
    #[error("file reference cannot be null or empty")]
    EmptyFileReference,

    /// Path missing from the local file store
    #[error("file/folder not found in file store with path: [{0}]")]
    FileNotFound(String),

    /// Path resolves to a folder where a file was expected
    #[error("path [{0}] resolves to a folder, expected a file")]
    NotAFile(String),

    /// Primary descriptor references more than one file in the local store
    #[error("only one tas manifest file is supported, found {0}")]
    MultiplePrimaryFiles(usize),

    /// YAML could not be parsed
    #[error("failed to parse {source_name}: {message}")]
    Parse { source_name: String, message: String },

    /// Primary descriptor has no `applications` entry
    #[error("manifest contains no application config")]
    NoApplication,

    /// Primary descriptor has no application name
    #[error("manifest contains no application name")]
    MissingApplicationName,

    /// A `((token))` in the application name could not be resolved
    #[error("unresolved variable(s) in application name `{name}`: {}", .tokens.join(", "))]
    UnresolvedApplicationName { name: String, tokens: Vec<String> },

    /// Tokens present but no variable-override documents supplied
    #[error("no valid variable file found, please verify var file is present and has valid structure")]
    NoVariableFiles,

    /// Variable-override document is not a flat mapping
    #[error("failed while trying to substitute vars yml value: {0}")]
    InvalidVariableFile(String),

    /// `routes` block is not a list of route entries
    #[error("invalid route format in manifest")]
    InvalidRouteFormat,

    /// `instances` does not resolve to a non-negative integer
    #[error("invalid instance count `{0}` in manifest")]
    InvalidInstanceCount(String),

    /// Second document of a single-valued kind during assembly
    #[error("only one {0} is supported")]
    DuplicateDocument(ManifestKind),

    /// Nothing classified as a primary descriptor after assembly
    #[error("no valid tas manifest found")]
    NoValidPrimary,

    /// Command script source not supported
    #[error("only inline and file store supported for tas command scripts")]
    UnsupportedScriptStore,

    /// Command script resolved to nothing
    #[error("script cannot be empty")]
    EmptyScript,

    /// Command script reference did not resolve to exactly one file
    #[error("no or multiple scripts found, expected exactly one file but got {0}")]
    ScriptFileCount(usize),

    /// Command script references manifest paths but no manifest exists
    #[error("tas manifest is mandatory for tas command step if paths are to be substituted in script")]
    ScriptPathsWithoutManifest,
}

impl ManifestError {
    /// Build a parse error for a named source
    #[inline]
    pub fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error stems from the declared configuration rather than fetched content
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoManifests(_)
                | Self::MissingPrimaryDescriptor
                | Self::MultiplePrimaryDescriptors(_)
                | Self::InvalidDescriptor { .. }
                | Self::UnsupportedStore(_)
                | Self::EmptyFileReference
                | Self::FileNotFound(_)
                | Self::NotAFile(_)
                | Self::MultiplePrimaryFiles(_)
                | Self::UnsupportedScriptStore
                | Self::EmptyScript
                | Self::ScriptFileCount(_)
                | Self::ScriptPathsWithoutManifest
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ManifestError::FileNotFound("/manifests/app.yml".to_string());
        assert_eq!(
            err.to_string(),
            "file/folder not found in file store with path: [/manifests/app.yml]"
        );

        let err = ManifestError::MultiplePrimaryDescriptors(vec!["a".into(), "b".into()]);
        assert!(err.to_string().contains("found 2: a, b"));
    }

    #[test]
    fn configuration_classification() {
        assert!(ManifestError::EmptyFileReference.is_configuration());
        assert!(ManifestError::MissingPrimaryDescriptor.is_configuration());
        assert!(!ManifestError::NoValidPrimary.is_configuration());
        assert!(!ManifestError::parse("vars.yml", "bad indent").is_configuration());
    }

    #[test]
    fn duplicate_document_names_kind() {
        let err = ManifestError::DuplicateDocument(ManifestKind::Autoscaler);
        assert_eq!(err.to_string(), "only one autoscaler manifest is supported");
    }
}
