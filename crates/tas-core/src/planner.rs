//! Instance-count and resize planning
//!
//! Pure functions turning user targets into concrete instance counts:
//! - percentage targets are rounded against the total desired count
//! - absolute upsize targets are capped by the total desired count
//! - the old version is downsized by whatever the new one took over
//! - rollback inverts the changes a resize recorded

use crate::error::PlanError;
use crate::types::{InstanceCountChange, InstanceCountPolicy, ResizeStrategy, SetupVariant};
use serde::{Deserialize, Serialize};

/// Unit of a requested instance count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceUnit {
    #[default]
    Absolute,
    Percentage,
}

/// Requested instance count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    pub value: i64,
    pub unit: InstanceUnit,
}

impl InstanceRequest {
    #[inline]
    #[must_use]
    pub fn absolute(value: i64) -> Self {
        Self {
            value,
            unit: InstanceUnit::Absolute,
        }
    }

    #[inline]
    #[must_use]
    pub fn percentage(value: i64) -> Self {
        Self {
            value,
            unit: InstanceUnit::Percentage,
        }
    }
}

/// Concrete counts for one resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizePlan {
    /// Total the new application is sized against
    pub total_desired_count: u32,
    /// Instance count of the new application after the resize
    pub upsize_count: u32,
    /// Instance count of the previous application after the resize
    pub downsize_count: u32,
    /// Blue-green keeps the old version serving rather than scale it to zero
    pub skip_old_downsize: bool,
}

/// `round(min(value, 100) * total / 100)`, never negative
#[must_use]
pub fn percentage_of(value: i64, total: u32) -> u32 {
    let pct = value.clamp(0, 100) as f64;
    let count = (pct * f64::from(total) / 100.0).round();
    // pct <= 100 keeps the result within u32
    count as u32
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Instance count of the new application
#[must_use]
pub fn plan_upsize(request: InstanceRequest, total: u32) -> u32 {
    match request.unit {
        InstanceUnit::Percentage => percentage_of(request.value, total),
        InstanceUnit::Absolute => total.min(clamp_count(request.value)),
    }
}

/// Instance count of the previous application
///
/// Without an explicit request the previous application keeps whatever
/// the new one did not take over.
#[must_use]
pub fn plan_downsize(request: Option<InstanceRequest>, total: u32, upsize: u32) -> u32 {
    match request {
        None => total.saturating_sub(upsize),
        Some(InstanceRequest {
            value,
            unit: InstanceUnit::Percentage,
        }) => percentage_of(value, total),
        Some(InstanceRequest {
            value,
            unit: InstanceUnit::Absolute,
        }) => total.min(clamp_count(value)),
    }
}

/// Reject a percentage target combined with ignoring the manifest count
pub fn validate_request(
    request: InstanceRequest,
    ignore_manifest_count: bool,
) -> Result<(), PlanError> {
    if ignore_manifest_count && request.unit == InstanceUnit::Percentage {
        return Err(PlanError::PercentageWithIgnoreManifestCount);
    }
    Ok(())
}

/// Total desired count for a deployment
///
/// Matching running instances reads the previous active application,
/// which is absent on a first deployment.
#[must_use]
pub fn total_desired_count(
    policy: InstanceCountPolicy,
    manifest_count: u32,
    previous_running: Option<u32>,
) -> u32 {
    match policy {
        InstanceCountPolicy::FromManifest => manifest_count,
        InstanceCountPolicy::MatchRunningInstances => previous_running.unwrap_or(0),
    }
}

/// Plan a resize of the new and previous application
pub fn plan_resize(
    upsize: InstanceRequest,
    downsize: Option<InstanceRequest>,
    total: u32,
    ignore_manifest_count: bool,
    variant: SetupVariant,
) -> Result<ResizePlan, PlanError> {
    validate_request(upsize, ignore_manifest_count)?;

    let (total, upsize_count) = if ignore_manifest_count {
        let count = clamp_count(upsize.value);
        (count, count)
    } else {
        (total, plan_upsize(upsize, total))
    };
    let downsize_count = plan_downsize(downsize, total, upsize_count);

    Ok(ResizePlan {
        total_desired_count: total,
        upsize_count,
        downsize_count,
        skip_old_downsize: variant == SetupVariant::BlueGreen && downsize_count == 0,
    })
}

/// Inverse of every recorded change
#[must_use]
pub fn invert_changes(changes: &[InstanceCountChange]) -> Vec<InstanceCountChange> {
    changes.iter().map(InstanceCountChange::inverted).collect()
}

/// Entries a rollback has to scale up
///
/// Takes the already inverted changes. Besides real upsizes, an entry left
/// at zero on both sides is brought back unless it is the new application.
#[must_use]
pub fn rollback_upsize_list(
    inverted: &[InstanceCountChange],
    new_application: Option<&str>,
) -> Vec<InstanceCountChange> {
    inverted
        .iter()
        .filter(|c| {
            c.desired_count > c.previous_count
                || (c.desired_count == c.previous_count
                    && c.desired_count == 0
                    && new_application != Some(c.name.as_str()))
        })
        .cloned()
        .collect()
}

/// Entries a rollback has to scale down
#[must_use]
pub fn rollback_downsize_list(inverted: &[InstanceCountChange]) -> Vec<InstanceCountChange> {
    inverted
        .iter()
        .filter(|c| c.desired_count < c.previous_count)
        .cloned()
        .collect()
}

/// Whether the new application is scaled before the old one
#[inline]
#[must_use]
pub fn upsizes_first(strategy: ResizeStrategy) -> bool {
    strategy == ResizeStrategy::UpsizeNewFirst
}
