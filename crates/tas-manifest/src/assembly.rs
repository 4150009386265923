//! Manifest bundle assembly
//!
//! Fetched files carry no reliable role of their own: a custom script may
//! produce anything, and a primary descriptor may pull its vars from the same
//! store. Each file is therefore classified by content and placed into the
//! bundle in declaration order, git results before custom results before
//! local lookups.

use crate::bundle::{ManifestBundle, ManifestBundleBuilder};
use crate::classify::classify;
use crate::error::{ManifestError, ManifestResult};
use crate::fetch::{FetchedFile, FetchedFiles};
use crate::resolver::FetchPlan;
use serde::{Deserialize, Serialize};

/// Files collected so far for one step invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedManifests {
    pub git: FetchedFiles,
    pub custom: FetchedFiles,
    pub local: FetchedFiles,
    pub max_order: u32,
    /// Identifier of the archive holding custom fetch output, when any
    pub zipped_manifest_id: Option<String>,
}

impl FetchedManifests {
    /// Start from the synchronously resolved part of a fetch plan
    #[must_use]
    pub fn from_plan(plan: &FetchPlan) -> Self {
        Self {
            local: plan.local.clone(),
            max_order: plan.max_order,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_git(mut self, files: FetchedFiles) -> Self {
        merge_into(&mut self.git, files);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_custom(mut self, files: FetchedFiles, zipped_manifest_id: Option<String>) -> Self {
        merge_into(&mut self.custom, files);
        if zipped_manifest_id.is_some() {
            self.zipped_manifest_id = zipped_manifest_id;
        }
        self
    }

    /// Every file in assembly order
    pub fn all_files(&self) -> impl Iterator<Item = (String, &FetchedFile)> {
        (0..=self.max_order).flat_map(move |order| {
            let key = order.to_string();
            [&self.git, &self.custom, &self.local]
                .into_iter()
                .filter_map(move |source| source.get(&key))
                .flatten()
                .map(move |file| (order.to_string(), file))
        })
    }

    /// Classify every file and build the bundle
    pub fn assemble(&self) -> ManifestResult<ManifestBundle> {
        let mut builder = ManifestBundleBuilder::new();
        for (order, file) in self.all_files() {
            match classify(&file.path, &file.content) {
                Some(kind) => {
                    tracing::debug!(
                        order = %order,
                        path = %file.path,
                        %kind,
                        "classified manifest"
                    );
                    builder.add(kind, file.content.clone())?;
                }
                None => {
                    tracing::debug!(order = %order, path = %file.path, "skipping unclassified file");
                }
            }
        }
        if !builder.has_primary() {
            return Err(ManifestError::NoValidPrimary);
        }
        builder.build()
    }
}

fn merge_into(target: &mut FetchedFiles, files: FetchedFiles) {
    for (key, mut list) in files {
        target.entry(key).or_default().append(&mut list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ManifestKind;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const PRIMARY: &str = "applications:\n- name: ((app))\n  instances: 2\n";
    const VARS_A: &str = "app: orders\n";
    const VARS_B: &str = "app: payments\n";
    const AUTOSCALER: &str = "instance_limits:\n  min: 1\n  max: 4\nrules: []\n";

    fn files(entries: &[(&str, &str, &str)]) -> FetchedFiles {
        let mut map = BTreeMap::new();
        for (key, path, content) in entries {
            map.entry((*key).to_string())
                .or_insert_with(Vec::new)
                .push(FetchedFile::new(*path, *content));
        }
        map
    }

    #[test]
    fn assembles_in_order_across_sources() {
        let fetched = FetchedManifests {
            max_order: 2,
            ..FetchedManifests::default()
        }
        .with_git(files(&[("2", "vars-b.yml", VARS_B), ("0", "manifest.yml", PRIMARY)]))
        .with_custom(files(&[("1", "autoscaler.yml", AUTOSCALER)]), Some("zip-1".into()));
        let fetched = FetchedManifests {
            local: files(&[("1", "/vars-a.yml", VARS_A)]),
            ..fetched
        };

        let bundle = fetched.assemble().unwrap();
        assert_eq!(bundle.manifest_yml(), PRIMARY);
        assert_eq!(bundle.autoscaler_yml(), Some(AUTOSCALER));
        assert_eq!(bundle.variable_ymls(), [VARS_A.to_string(), VARS_B.to_string()]);
        assert_eq!(fetched.zipped_manifest_id.as_deref(), Some("zip-1"));
    }

    #[test]
    fn unparseable_files_are_skipped() {
        let fetched = FetchedManifests {
            local: files(&[("0", "broken.yml", "a: [b"), ("0", "manifest.yml", PRIMARY)]),
            ..FetchedManifests::default()
        };
        assert!(fetched.assemble().is_ok());
    }

    #[test]
    fn second_primary_is_rejected() {
        let fetched = FetchedManifests {
            git: files(&[("0", "a.yml", PRIMARY), ("0", "b.yml", PRIMARY)]),
            ..FetchedManifests::default()
        };
        assert_eq!(
            fetched.assemble().unwrap_err(),
            ManifestError::DuplicateDocument(ManifestKind::Primary)
        );
    }

    #[test]
    fn missing_primary() {
        let fetched = FetchedManifests {
            git: files(&[("0", "vars.yml", VARS_A)]),
            ..FetchedManifests::default()
        };
        assert_eq!(fetched.assemble().unwrap_err(), ManifestError::NoValidPrimary);
    }

    #[test]
    fn orders_above_max_are_ignored() {
        let fetched = FetchedManifests {
            max_order: 0,
            git: files(&[("0", "m.yml", PRIMARY), ("5", "v.yml", VARS_A)]),
            ..FetchedManifests::default()
        };
        assert_eq!(fetched.all_files().count(), 1);
    }
}
