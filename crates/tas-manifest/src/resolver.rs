//! Manifest source resolver
//!
//! Turns the declared descriptors into a fetch plan:
//! - selects the primary, autoscaler and vars descriptors
//! - decides which fetch strategies are needed (custom, git, local)
//! - batches all git-backed paths into one git request
//! - batches all custom-script sources into one custom request
//! - resolves internal file-store references synchronously
//!
//! Planning never dispatches anything; it only describes what to fetch.

use crate::descriptor::{ManifestDescriptor, ManifestKind, ManifestStore};
use crate::error::{ManifestError, ManifestResult};
use crate::fetch::{
    CustomFetchFileConfig, CustomFetchRequest, CustomManifestSource, FetchFlags, FetchedFile,
    FetchedFiles, GitFetchFilesConfig, GitFetchRequest,
};
use crate::file_store::{read_file, read_files, read_scoped_files, FileStore};
use serde::{Deserialize, Serialize};

/// Descriptors that take part in one step invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedManifests {
    pub primary: ManifestDescriptor,
    pub autoscaler: Option<ManifestDescriptor>,
    /// Ascending by order
    pub vars: Vec<ManifestDescriptor>,
    pub max_order: u32,
}

impl SelectedManifests {
    /// Every selected descriptor, vars first and primary last
    pub fn iter(&self) -> impl Iterator<Item = &ManifestDescriptor> {
        self.vars
            .iter()
            .chain(self.autoscaler.iter())
            .chain(std::iter::once(&self.primary))
    }
}

/// Everything needed to fetch a manifest set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPlan {
    pub flags: FetchFlags,
    pub git: Option<GitFetchRequest>,
    pub custom: Option<CustomFetchRequest>,
    /// Content already available: file-store lookups and inline manifests
    pub local: FetchedFiles,
    pub max_order: u32,
    pub primary_identifier: String,
}

/// Pick the descriptors that take part in the invocation
///
/// Exactly one primary is allowed. The highest-order autoscaler wins and,
/// when present, replaces the primary's own autoscaler path.
pub fn select_manifests(
    stage: &str,
    descriptors: &[ManifestDescriptor],
) -> ManifestResult<SelectedManifests> {
    if descriptors.is_empty() {
        return Err(ManifestError::NoManifests(stage.to_string()));
    }

    let primaries: Vec<&ManifestDescriptor> = descriptors
        .iter()
        .filter(|d| d.kind() == ManifestKind::Primary)
        .collect();
    let primary = match primaries.as_slice() {
        [] => return Err(ManifestError::MissingPrimaryDescriptor),
        [only] => (*only).clone(),
        many => {
            return Err(ManifestError::MultiplePrimaryDescriptors(
                many.iter().map(|d| d.identifier().to_string()).collect(),
            ))
        }
    };

    let autoscaler = descriptors
        .iter()
        .filter(|d| d.kind() == ManifestKind::Autoscaler)
        .max_by_key(|d| d.order())
        .cloned();
    let primary = if autoscaler.is_some() && primary.autoscaler_path().is_some() {
        tracing::debug!(
            manifest = primary.identifier(),
            "separate autoscaler manifest declared, ignoring inline autoscaler path"
        );
        primary.without_autoscaler_path()
    } else {
        primary
    };

    let mut vars: Vec<ManifestDescriptor> = descriptors
        .iter()
        .filter(|d| d.kind() == ManifestKind::Vars)
        .cloned()
        .collect();
    vars.sort_by_key(ManifestDescriptor::order);

    let max_order = descriptors.iter().map(ManifestDescriptor::order).max().unwrap_or(0);

    Ok(SelectedManifests {
        primary,
        autoscaler,
        vars,
        max_order,
    })
}

/// Fetch strategies needed by the selected descriptors
#[must_use]
pub fn fetch_flags(selected: &SelectedManifests) -> FetchFlags {
    selected
        .iter()
        .fold(FetchFlags::default(), |mut flags, d| {
            match d.store() {
                ManifestStore::Git(_) => flags.git = true,
                ManifestStore::CustomRemote(_) => flags.custom = true,
                ManifestStore::InternalFileStore(_) => flags.local = true,
                ManifestStore::Inline(_) => {}
            }
            flags
        })
}

/// Plan the fetch of a deployment step's manifests
pub fn plan_fetch(
    stage: &str,
    descriptors: &[ManifestDescriptor],
    file_store: &dyn FileStore,
    account_id: &str,
) -> ManifestResult<FetchPlan> {
    let selected = select_manifests(stage, descriptors)?;
    let flags = fetch_flags(&selected);

    let git = git_request(&selected)?;
    let custom = custom_request(&selected, account_id);
    let local = local_files(&selected, file_store)?;

    tracing::debug!(
        stage,
        git = flags.git,
        custom = flags.custom,
        local = flags.local,
        max_order = selected.max_order,
        "planned manifest fetch"
    );

    Ok(FetchPlan {
        flags,
        git: (!git.is_empty()).then_some(git),
        custom: (!custom.is_empty()).then_some(custom),
        local,
        max_order: selected.max_order,
        primary_identifier: selected.primary.identifier().to_string(),
    })
}

/// Plan the fetch of files a command script references, from the primary's store
pub fn plan_script_fetch(
    primary: &ManifestDescriptor,
    paths: &[String],
    file_store: &dyn FileStore,
    account_id: &str,
) -> ManifestResult<FetchPlan> {
    let key = primary.order_key();
    let mut plan = FetchPlan {
        flags: FetchFlags::default(),
        git: None,
        custom: None,
        local: FetchedFiles::new(),
        max_order: primary.order(),
        primary_identifier: primary.identifier().to_string(),
    };

    match primary.store() {
        ManifestStore::Git(_) => {
            plan.flags.git = true;
            plan.git = Some(GitFetchRequest {
                configs: vec![git_config(primary, ManifestKind::Primary, paths.to_vec())?],
            });
        }
        ManifestStore::CustomRemote(custom) => {
            plan.flags.custom = true;
            plan.custom = Some(CustomFetchRequest {
                configs: Vec::new(),
                custom_manifest_source: Some(CustomManifestSource {
                    script: custom.script.clone(),
                    file_paths: custom.file_paths.clone(),
                    account_id: account_id.to_string(),
                }),
                delegate_selectors: custom.delegate_selectors.clone(),
            });
        }
        ManifestStore::InternalFileStore(reference) => {
            let scope_path = reference.paths.first().map_or("", String::as_str);
            plan.flags.local = true;
            plan.local.insert(key, read_scoped_files(file_store, scope_path, paths)?);
        }
        ManifestStore::Inline(_) => {
            return Err(ManifestError::UnsupportedStore(primary.store().kind_name()))
        }
    }
    Ok(plan)
}

fn git_config(
    descriptor: &ManifestDescriptor,
    kind: ManifestKind,
    paths: Vec<String>,
) -> ManifestResult<GitFetchFilesConfig> {
    let ManifestStore::Git(git) = descriptor.store() else {
        return Err(ManifestError::UnsupportedStore(descriptor.store().kind_name()));
    };
    Ok(GitFetchFilesConfig {
        identifier: descriptor.order_key(),
        label: format!("{kind} with id [{}]", descriptor.identifier()),
        kind,
        provider: git.provider,
        connector_ref: git.connector_ref.clone(),
        repo_name: git.repo_name.clone(),
        fetch_ref: git.fetch_ref.clone(),
        paths,
        succeed_if_file_not_found: false,
    })
}

fn git_request(selected: &SelectedManifests) -> ManifestResult<GitFetchRequest> {
    let mut configs = Vec::new();
    for d in selected.vars.iter().chain(selected.autoscaler.iter()) {
        if d.store().is_git() {
            configs.push(git_config(d, d.kind(), d.store().paths().to_vec())?);
        }
    }

    let primary = &selected.primary;
    if primary.store().is_git() {
        let main_paths = primary.store().paths();
        if main_paths.len() != 1 {
            return Err(ManifestError::MultiplePrimaryFiles(main_paths.len()));
        }
        if !primary.vars_paths().is_empty() {
            configs.push(git_config(primary, ManifestKind::Vars, primary.vars_paths().to_vec())?);
        }
        if let Some(path) = primary.autoscaler_path() {
            configs.push(git_config(primary, ManifestKind::Autoscaler, vec![path.to_string()])?);
        }
        configs.push(git_config(primary, ManifestKind::Primary, main_paths.to_vec())?);
    }
    Ok(GitFetchRequest { configs })
}

fn custom_request(selected: &SelectedManifests, account_id: &str) -> CustomFetchRequest {
    let mut request = CustomFetchRequest::default();
    let mut push_selectors = |selectors: &[String]| {
        for s in selectors {
            if !request.delegate_selectors.contains(s) {
                request.delegate_selectors.push(s.clone());
            }
        }
    };

    let mut configs = Vec::new();
    for d in selected.vars.iter().chain(selected.autoscaler.iter()) {
        if let ManifestStore::CustomRemote(custom) = d.store() {
            configs.push(CustomFetchFileConfig {
                key: d.order_key(),
                required: true,
                default_source: false,
                file_paths: custom.file_paths.clone(),
                script: Some(custom.script.clone()),
                account_id: account_id.to_string(),
            });
            push_selectors(&custom.delegate_selectors);
        }
    }

    let mut source = None;
    let primary = &selected.primary;
    if let ManifestStore::CustomRemote(custom) = primary.store() {
        source = Some(CustomManifestSource {
            script: custom.script.clone(),
            file_paths: custom.file_paths.clone(),
            account_id: account_id.to_string(),
        });
        push_selectors(&custom.delegate_selectors);

        let side_paths = [
            primary.vars_paths().to_vec(),
            primary.autoscaler_path().map(str::to_string).into_iter().collect(),
        ];
        for paths in side_paths.into_iter().filter(|p| !p.is_empty()) {
            configs.push(CustomFetchFileConfig {
                key: primary.order_key(),
                required: true,
                default_source: true,
                file_paths: paths,
                script: None,
                account_id: account_id.to_string(),
            });
        }
    }

    request.configs = configs;
    request.custom_manifest_source = source;
    request
}

fn local_files(
    selected: &SelectedManifests,
    file_store: &dyn FileStore,
) -> ManifestResult<FetchedFiles> {
    let mut local = FetchedFiles::new();
    for d in selected.vars.iter().chain(selected.autoscaler.iter()) {
        match d.store() {
            ManifestStore::InternalFileStore(reference) => {
                local
                    .entry(d.order_key())
                    .or_default()
                    .extend(read_files(file_store, &reference.paths)?);
            }
            ManifestStore::Inline(content) => {
                local
                    .entry(d.order_key())
                    .or_default()
                    .push(inline_file(d, content));
            }
            ManifestStore::Git(_) | ManifestStore::CustomRemote(_) => {}
        }
    }

    let primary = &selected.primary;
    match primary.store() {
        ManifestStore::InternalFileStore(reference) => {
            if reference.paths.len() != 1 {
                return Err(ManifestError::MultiplePrimaryFiles(reference.paths.len()));
            }
            let mut files = vec![read_file(file_store, &reference.paths[0])?];
            files.extend(read_files(file_store, primary.vars_paths())?);
            if let Some(path) = primary.autoscaler_path() {
                files.push(read_file(file_store, path)?);
            }
            local.entry(primary.order_key()).or_default().extend(files);
        }
        ManifestStore::Inline(content) => {
            local
                .entry(primary.order_key())
                .or_default()
                .push(inline_file(primary, content));
        }
        ManifestStore::Git(_) | ManifestStore::CustomRemote(_) => {}
    }
    Ok(local)
}

fn inline_file(descriptor: &ManifestDescriptor, content: &str) -> FetchedFile {
    FetchedFile::new(format!("inline:{}", descriptor.identifier()), content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CustomRemoteStore, FetchRef, FileStoreRef, GitProvider, GitStore};
    use crate::file_store::{FileStoreNode, MockFileStore};
    use pretty_assertions::assert_eq;

    fn git(paths: &[&str]) -> ManifestStore {
        ManifestStore::Git(GitStore {
            provider: GitProvider::GitLab,
            connector_ref: "gitlab".into(),
            repo_name: Some("ops".into()),
            fetch_ref: FetchRef::Commit("abc123".into()),
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
        })
    }

    fn custom(paths: &[&str], selectors: &[&str]) -> ManifestStore {
        ManifestStore::CustomRemote(CustomRemoteStore {
            script: "./fetch.sh".into(),
            file_paths: paths.iter().map(|p| (*p).to_string()).collect(),
            delegate_selectors: selectors.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    fn harness(paths: &[&str]) -> ManifestStore {
        ManifestStore::InternalFileStore(FileStoreRef {
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
        })
    }

    fn empty_store() -> MockFileStore {
        let mut store = MockFileStore::new();
        store.expect_lookup().returning(|_| None);
        store
    }

    fn serving_store() -> MockFileStore {
        let mut store = MockFileStore::new();
        store.expect_lookup().returning(|p| {
            Some(FileStoreNode::File {
                path: p.to_string(),
                content: format!("content of {p}"),
            })
        });
        store
    }

    #[test]
    fn no_descriptors() {
        let err = select_manifests("deploy", &[]).unwrap_err();
        assert_eq!(err, ManifestError::NoManifests("deploy".into()));
    }

    #[test]
    fn multiple_primaries_rejected() {
        let a = ManifestDescriptor::new("a", ManifestKind::Primary, 0, git(&["a.yml"])).unwrap();
        let b = ManifestDescriptor::new("b", ManifestKind::Primary, 1, git(&["b.yml"])).unwrap();
        assert_eq!(
            select_manifests("s", &[a, b]).unwrap_err(),
            ManifestError::MultiplePrimaryDescriptors(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn missing_primary_rejected() {
        let v = ManifestDescriptor::new("v", ManifestKind::Vars, 0, git(&["v.yml"])).unwrap();
        assert_eq!(
            select_manifests("s", &[v]).unwrap_err(),
            ManifestError::MissingPrimaryDescriptor
        );
    }

    #[test]
    fn highest_order_autoscaler_replaces_inline_path() {
        let primary = ManifestDescriptor::primary(
            "app",
            0,
            git(&["m.yml"]),
            vec![],
            Some("as.yml".into()),
        )
        .unwrap();
        let low = ManifestDescriptor::new("as1", ManifestKind::Autoscaler, 1, git(&["a1.yml"])).unwrap();
        let high = ManifestDescriptor::new("as2", ManifestKind::Autoscaler, 3, git(&["a2.yml"])).unwrap();
        let v2 = ManifestDescriptor::new("v2", ManifestKind::Vars, 2, git(&["v2.yml"])).unwrap();
        let v1 = ManifestDescriptor::new("v1", ManifestKind::Vars, 1, git(&["v1.yml"])).unwrap();

        let selected = select_manifests("s", &[primary, low, high, v2, v1]).unwrap();
        assert_eq!(selected.autoscaler.unwrap().identifier(), "as2");
        assert_eq!(selected.primary.autoscaler_path(), None);
        let orders: Vec<u32> = selected.vars.iter().map(ManifestDescriptor::order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(selected.max_order, 3);
    }

    #[test]
    fn git_primary_batches_side_paths() {
        let primary = ManifestDescriptor::primary(
            "app",
            2,
            git(&["deploy/manifest.yml"]),
            vec!["deploy/vars.yml".into()],
            Some("deploy/autoscaler.yml".into()),
        )
        .unwrap();
        let vars = ManifestDescriptor::new("env", ManifestKind::Vars, 1, git(&["env.yml"])).unwrap();

        let plan = plan_fetch("s", &[primary, vars], &empty_store(), "acct").unwrap();
        assert!(plan.flags.git);
        assert!(!plan.flags.custom);
        assert!(plan.custom.is_none());

        let configs = plan.git.unwrap().configs;
        let kinds: Vec<(String, ManifestKind)> =
            configs.iter().map(|c| (c.identifier.clone(), c.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("1".to_string(), ManifestKind::Vars),
                ("2".to_string(), ManifestKind::Vars),
                ("2".to_string(), ManifestKind::Autoscaler),
                ("2".to_string(), ManifestKind::Primary),
            ]
        );
        assert_eq!(configs[3].repo_name.as_deref(), Some("ops"));
    }

    #[test]
    fn git_primary_must_name_one_file() {
        let primary =
            ManifestDescriptor::new("app", ManifestKind::Primary, 0, git(&["a.yml", "b.yml"])).unwrap();
        assert_eq!(
            plan_fetch("s", &[primary], &empty_store(), "acct").unwrap_err(),
            ManifestError::MultiplePrimaryFiles(2)
        );
    }

    #[test]
    fn custom_primary_adds_source_and_default_configs() {
        let primary = ManifestDescriptor::primary(
            "app",
            0,
            custom(&["out/manifest.yml"], &["east", "shared"]),
            vec!["out/vars.yml".into()],
            Some("out/autoscaler.yml".into()),
        )
        .unwrap();
        let vars = ManifestDescriptor::new(
            "v",
            ManifestKind::Vars,
            1,
            custom(&["v.yml"], &["shared", "west"]),
        )
        .unwrap();

        let plan = plan_fetch("s", &[primary, vars], &empty_store(), "acct").unwrap();
        let request = plan.custom.unwrap();
        assert!(plan.flags.custom);
        assert!(request.custom_manifest_source.is_some());
        assert_eq!(request.delegate_selectors, vec!["shared", "west", "east"]);
        assert_eq!(request.configs.len(), 3);
        assert!(!request.configs[0].default_source);
        assert!(request.configs[1].default_source && request.configs[2].default_source);
        assert!(request.configs[1].script.is_none());
    }

    #[test]
    fn local_primary_reads_synchronously() {
        let primary = ManifestDescriptor::primary(
            "app",
            0,
            harness(&["/m.yml"]),
            vec!["/vars.yml".into()],
            None,
        )
        .unwrap();
        let plan = plan_fetch("s", &[primary], &serving_store(), "acct").unwrap();
        assert!(plan.flags.local && !plan.flags.needs_remote());
        let files = &plan.local["0"];
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].content, "content of /m.yml");
    }

    #[test]
    fn local_lookup_fails_fast() {
        let primary =
            ManifestDescriptor::new("app", ManifestKind::Primary, 0, harness(&["/missing.yml"])).unwrap();
        assert_eq!(
            plan_fetch("s", &[primary], &empty_store(), "acct").unwrap_err(),
            ManifestError::FileNotFound("/missing.yml".into())
        );
    }

    #[test]
    fn inline_documents_need_no_fetch() {
        let primary = ManifestDescriptor::new(
            "app",
            ManifestKind::Primary,
            0,
            ManifestStore::Inline("applications:\n- name: a\n".into()),
        )
        .unwrap();
        let plan = plan_fetch("s", &[primary], &empty_store(), "acct").unwrap();
        assert_eq!(plan.flags, FetchFlags::default());
        assert_eq!(plan.local["0"][0].path, "inline:app");
    }

    #[test]
    fn script_fetch_from_git_primary() {
        let primary = ManifestDescriptor::new("app", ManifestKind::Primary, 4, git(&["deploy/"])).unwrap();
        let plan = plan_script_fetch(&primary, &["/deploy/app.yml".into()], &empty_store(), "acct").unwrap();
        assert!(plan.flags.git);
        let config = &plan.git.unwrap().configs[0];
        assert_eq!(config.identifier, "4");
        assert_eq!(config.paths, vec!["/deploy/app.yml"]);
    }

    #[test]
    fn script_fetch_from_inline_primary_unsupported() {
        let primary = ManifestDescriptor::new(
            "app",
            ManifestKind::Primary,
            0,
            ManifestStore::Inline("applications: []".into()),
        )
        .unwrap();
        assert_eq!(
            plan_script_fetch(&primary, &["/a.yml".into()], &empty_store(), "acct").unwrap_err(),
            ManifestError::UnsupportedStore("Inline".into())
        );
    }
}
