//! Manifest bundle
//!
//! The assembled, typed set of documents handed to a remote command:
//! exactly one primary application descriptor, at most one autoscaler
//! policy and an ordered list of variable-override documents.

use crate::descriptor::ManifestKind;
use crate::error::{ManifestError, ManifestResult};
use serde::{Deserialize, Serialize};

/// Assembled manifest documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestBundle {
    manifest_yml: String,
    autoscaler_yml: Option<String>,
    variable_ymls: Vec<String>,
}

impl ManifestBundle {
    /// Build a bundle from its parts
    pub fn new(
        manifest_yml: impl Into<String>,
        autoscaler_yml: Option<String>,
        variable_ymls: Vec<String>,
    ) -> ManifestResult<Self> {
        let mut builder = ManifestBundleBuilder::new();
        builder.add(ManifestKind::Primary, manifest_yml.into())?;
        if let Some(autoscaler) = autoscaler_yml {
            builder.add(ManifestKind::Autoscaler, autoscaler)?;
        }
        for vars in variable_ymls {
            builder.add(ManifestKind::Vars, vars)?;
        }
        builder.build()
    }

    /// Primary application descriptor
    #[inline]
    #[must_use]
    pub fn manifest_yml(&self) -> &str {
        &self.manifest_yml
    }

    /// Autoscaler policy, if supplied
    #[inline]
    #[must_use]
    pub fn autoscaler_yml(&self) -> Option<&str> {
        self.autoscaler_yml.as_deref()
    }

    /// Variable-override documents, oldest first
    #[inline]
    #[must_use]
    pub fn variable_ymls(&self) -> &[String] {
        &self.variable_ymls
    }

    /// Whether an autoscaler policy is part of the bundle
    #[inline]
    #[must_use]
    pub fn has_autoscaler(&self) -> bool {
        self.autoscaler_yml.is_some()
    }
}

/// Incremental bundle construction enforcing the single-primary rule
#[derive(Debug, Clone, Default)]
pub struct ManifestBundleBuilder {
    manifest_yml: Option<String>,
    autoscaler_yml: Option<String>,
    variable_ymls: Vec<String>,
}

impl ManifestBundleBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a classified document
    pub fn add(&mut self, kind: ManifestKind, content: String) -> ManifestResult<()> {
        match kind {
            ManifestKind::Primary => {
                if self.manifest_yml.is_some() {
                    return Err(ManifestError::DuplicateDocument(kind));
                }
                self.manifest_yml = Some(content);
            }
            ManifestKind::Autoscaler => {
                if self.autoscaler_yml.is_some() {
                    return Err(ManifestError::DuplicateDocument(kind));
                }
                self.autoscaler_yml = Some(content);
            }
            ManifestKind::Vars => self.variable_ymls.push(content),
        }
        Ok(())
    }

    /// Whether a primary descriptor has been added
    #[inline]
    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.manifest_yml.is_some()
    }

    /// Finish; fails when no primary descriptor was added
    pub fn build(self) -> ManifestResult<ManifestBundle> {
        let manifest_yml = self.manifest_yml.ok_or(ManifestError::NoValidPrimary)?;
        Ok(ManifestBundle {
            manifest_yml,
            autoscaler_yml: self.autoscaler_yml,
            variable_ymls: self.variable_ymls,
        })
    }
}
