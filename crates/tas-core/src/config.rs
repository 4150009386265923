//! Orchestration configuration

use crate::error::{TasError, TasResult};
use crate::types::CfCliVersion;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default sub-task timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default number of previous application versions kept after a deployment
pub const DEFAULT_VERSIONS_TO_KEEP: u32 = 3;

/// Feature flag gating every TAS step
pub const DEFAULT_FEATURE_FLAG: &str = "CDS_TAS_NG";

/// TAS orchestration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TasConfig {
    /// Sub-task timeout in seconds when a step sets none
    pub default_timeout_secs: u64,
    /// CLI version when a step sets none
    pub cli_version: CfCliVersion,
    /// Previous versions kept when a setup step sets none
    pub existing_versions_to_keep: u32,
    /// Flag checked before any step does work
    pub feature_flag: String,
}

impl TasConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With default timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    /// With CLI version
    #[inline]
    #[must_use]
    pub fn with_cli_version(mut self, version: CfCliVersion) -> Self {
        self.cli_version = version;
        self
    }

    /// With versions to keep
    #[inline]
    #[must_use]
    pub fn with_versions_to_keep(mut self, count: u32) -> Self {
        self.existing_versions_to_keep = count;
        self
    }

    /// With feature flag name
    #[inline]
    #[must_use]
    pub fn with_feature_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = flag.into();
        self
    }

    /// Reject values no step can work with
    pub fn validate(&self) -> TasResult<()> {
        if self.default_timeout_secs == 0 {
            return Err(TasError::configuration("default timeout must be greater than zero"));
        }
        if self.existing_versions_to_keep == 0 {
            return Err(TasError::configuration(
                "existing versions to keep must be greater than zero",
            ));
        }
        if self.feature_flag.trim().is_empty() {
            return Err(TasError::configuration("feature flag name cannot be empty"));
        }
        Ok(())
    }

    /// Load and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> TasResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| TasError::configuration(format!("invalid tas configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> TasResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TasError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }
}

impl Default for TasConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            cli_version: CfCliVersion::V7,
            existing_versions_to_keep: DEFAULT_VERSIONS_TO_KEEP,
            feature_flag: DEFAULT_FEATURE_FLAG.to_string(),
        }
    }
}
