//! Command script preparation
//!
//! Loads the script of an arbitrary-command step, strips comment lines and
//! discovers the manifest paths it references through the
//! `${service.manifest}` and `${service.manifest.repoRoot}` prefixes.

use crate::descriptor::{ManifestDescriptor, ManifestStore};
use crate::error::{ManifestError, ManifestResult};
use crate::file_store::{read_file, FileStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static REPO_ROOT_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\$\{service\.manifest\.repoRoot\}(.*?)(?:\s|,|;|'|"|:|$)"#)
        .expect("repo root pattern is valid")
});

static SERVICE_MANIFEST_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\$\{service\.manifest\}(.*?)(?:\s|,|;|'|"|:|$)"#)
        .expect("service manifest pattern is valid")
});

/// Script ready to send to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedScript {
    /// Script without comment or blank lines
    pub raw: String,
    /// Manifest paths referenced by the script, sorted
    pub paths: Vec<String>,
    /// Repository root the paths are relative to
    pub repo_root: String,
}

impl PreparedScript {
    /// Whether the script references manifest files
    #[inline]
    #[must_use]
    pub fn has_paths(&self) -> bool {
        !self.paths.is_empty()
    }
}

/// Read the script text from an inline or internal file-store source
pub fn load_script(store: &ManifestStore, file_store: &dyn FileStore) -> ManifestResult<String> {
    let text = match store {
        ManifestStore::Inline(content) => content.clone(),
        ManifestStore::InternalFileStore(reference) => {
            if reference.paths.len() != 1 {
                return Err(ManifestError::ScriptFileCount(reference.paths.len()));
            }
            read_file(file_store, &reference.paths[0])?.content
        }
        ManifestStore::Git(_) | ManifestStore::CustomRemote(_) => {
            return Err(ManifestError::UnsupportedScriptStore)
        }
    };
    if text.trim().is_empty() {
        return Err(ManifestError::EmptyScript);
    }
    Ok(text)
}

/// Drop empty lines and lines starting with `#`
#[must_use]
pub fn remove_commented_lines(script: &str) -> String {
    script
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Repository root of the primary descriptor ("/" unless it lives in git)
#[must_use]
pub fn repo_root(primary: Option<&ManifestDescriptor>) -> String {
    match primary.map(ManifestDescriptor::store) {
        Some(ManifestStore::Git(git)) => {
            let first = git.paths.first().map_or("/", |p| p.trim());
            let first = if first.is_empty() { "/" } else { first };
            format!("/{}", to_relative(first))
        }
        _ => "/".to_string(),
    }
}

/// Manifest paths referenced by `script`
#[must_use]
pub fn find_paths(script: &str, repo_root: &str) -> Vec<String> {
    let mut found: BTreeSet<String> = capture_paths(&REPO_ROOT_PATH, script).into_iter().collect();

    let service_paths = capture_paths(&SERVICE_MANIFEST_PATH, script);
    if repo_root.is_empty() || repo_root == "/" {
        found.extend(service_paths);
    } else {
        let root = remove_trailing_slash(repo_root);
        found.extend(
            service_paths
                .into_iter()
                .map(|p| remove_trailing_slash(&format!("{root}/{}", to_relative(&p))).to_string()),
        );
    }

    found
        .into_iter()
        .filter(|p| !p.is_empty() && p != "/")
        .collect()
}

/// Strip comments, resolve the repository root and discover referenced paths
pub fn prepare_script(
    script: &str,
    primary: Option<&ManifestDescriptor>,
) -> ManifestResult<PreparedScript> {
    let raw = remove_commented_lines(script);
    if raw.trim().is_empty() {
        return Err(ManifestError::EmptyScript);
    }
    let root = repo_root(primary);
    let paths = find_paths(&raw, &root);
    if primary.is_none() && !paths.is_empty() {
        return Err(ManifestError::ScriptPathsWithoutManifest);
    }
    let repo_root = if root == "/" {
        root
    } else {
        remove_trailing_slash(&root).to_string()
    };
    Ok(PreparedScript {
        raw,
        paths,
        repo_root,
    })
}

fn capture_paths(pattern: &Regex, script: &str) -> Vec<String> {
    pattern
        .captures_iter(script)
        .map(|caps| {
            let path = caps.get(1).map_or("", |m| m.as_str()).trim();
            if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            }
        })
        .collect()
}

fn to_relative(path: &str) -> &str {
    path.trim().trim_start_matches('/')
}

fn remove_trailing_slash(path: &str) -> &str {
    path.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FetchRef, GitProvider, GitStore, ManifestKind};
    use pretty_assertions::assert_eq;

    fn git_primary(path: &str) -> ManifestDescriptor {
        ManifestDescriptor::new(
            "app",
            ManifestKind::Primary,
            0,
            ManifestStore::Git(GitStore {
                provider: GitProvider::Git,
                connector_ref: "git".into(),
                repo_name: None,
                fetch_ref: FetchRef::Branch("main".into()),
                paths: vec![path.into()],
            }),
        )
        .unwrap()
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        let script = "# login\ncf login\n\n  # indented stays\ncf apps";
        assert_eq!(
            remove_commented_lines(script),
            "cf login\n  # indented stays\ncf apps"
        );
    }

    #[test]
    fn finds_repo_root_and_service_paths() {
        let script = "cf push -f ${service.manifest.repoRoot}/ops/app.yml\ncf create-service-push --vars-file ${service.manifest}/vars.yml";
        let paths = find_paths(script, "/deploy/");
        assert_eq!(paths, vec!["/deploy/vars.yml", "/ops/app.yml"]);
    }

    #[test]
    fn service_paths_at_root_are_kept_verbatim() {
        let script = "cat ${service.manifest}/vars.yml, ${service.manifest}";
        assert_eq!(find_paths(script, "/"), vec!["/vars.yml"]);
    }

    #[test]
    fn repo_root_from_git_primary() {
        assert_eq!(repo_root(Some(&git_primary("/deploy/"))), "/deploy/");
        assert_eq!(repo_root(None), "/");
    }

    #[test]
    fn paths_without_manifest_are_rejected() {
        let err = prepare_script("cat ${service.manifest}/vars.yml", None).unwrap_err();
        assert_eq!(err, ManifestError::ScriptPathsWithoutManifest);
    }

    #[test]
    fn prepared_script_trims_repo_root() {
        let primary = git_primary("deploy/");
        let prepared =
            prepare_script("# c\ncf push -f ${service.manifest}/app.yml", Some(&primary)).unwrap();
        assert_eq!(prepared.repo_root, "/deploy");
        assert_eq!(prepared.paths, vec!["/deploy/app.yml"]);
        assert_eq!(prepared.raw, "cf push -f ${service.manifest}/app.yml");
        assert!(prepared.has_paths());
    }

    #[test]
    fn comment_only_script_is_empty() {
        assert_eq!(
            prepare_script("# nothing\n#\n", None).unwrap_err(),
            ManifestError::EmptyScript
        );
    }
}
