//! TAS Manifest - manifest model and pure manifest functions
//!
//! Everything needed to go from declared manifest descriptors to an
//! assembled bundle, without touching the network:
//! - Descriptor filtering and fetch planning (git, custom script, file store, inline)
//! - Content classification and bundle assembly
//! - `((token))` substitution against layered variable documents
//! - Application name, instance count and route extraction
//! - Command script preparation
//!
//! # Example
//!
//! ```rust,ignore
//! use tas_manifest::prelude::*;
//!
//! let bundle = ManifestBundle::new(
//!     "applications:\n- name: ((app))\n  instances: 3\n",
//!     None,
//!     vec!["app: orders".to_string()],
//! )?;
//! assert_eq!(application_name(&bundle)?, "orders");
//! assert_eq!(desired_instance_count(&bundle)?, 3);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod application;
pub mod assembly;
pub mod bundle;
pub mod classify;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod file_store;
pub mod resolver;
pub mod script;
pub mod substitution;
pub mod yaml;

pub use application::{application_name, desired_instance_count, route_maps, uses_no_route};
pub use assembly::FetchedManifests;
pub use bundle::{ManifestBundle, ManifestBundleBuilder};
pub use classify::classify;
pub use descriptor::{
    CustomRemoteStore, FetchRef, FileStoreRef, GitProvider, GitStore, ManifestDescriptor,
    ManifestKind, ManifestStore,
};
pub use error::{ManifestError, ManifestResult};
pub use fetch::{
    CustomFetchFileConfig, CustomFetchRequest, CustomManifestSource, FetchFlags, FetchedFile,
    FetchedFiles, GitFetchFilesConfig, GitFetchRequest,
};
pub use file_store::{
    read_file, read_files, read_scoped_files, FileScope, FileStore, FileStoreNode,
};
pub use resolver::{
    fetch_flags, plan_fetch, plan_script_fetch, select_manifests, FetchPlan, SelectedManifests,
};
pub use script::{load_script, prepare_script, PreparedScript};
pub use substitution::{has_tokens, substitute, Substitution, VariableOverrides};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with TAS manifests
    pub use crate::{
        application_name, desired_instance_count, plan_fetch, route_maps, FetchPlan,
        FetchedFile, FetchedFiles, FetchedManifests, FileStore, FileStoreNode, ManifestBundle,
        ManifestDescriptor, ManifestError, ManifestKind, ManifestResult, ManifestStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
