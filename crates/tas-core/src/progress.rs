//! Progress units
//!
//! A progress unit is a named, separately reported stage of a step. The
//! remote worker reports unit updates by name; updates from successive
//! sub-task responses are merged with later entries winning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one progress unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Queued,
    Running,
    Success,
    Failure,
    Skipped,
}

impl UnitStatus {
    /// Whether the unit has finished, one way or another
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Skipped)
    }
}

/// Reported state of one progress unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgress {
    pub unit_name: String,
    pub status: UnitStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl UnitProgress {
    /// Unit not started yet
    #[must_use]
    pub fn queued(name: impl Into<String>) -> Self {
        Self {
            unit_name: name.into(),
            status: UnitStatus::Queued,
            started_at: None,
            ended_at: None,
        }
    }

    /// Unit started now
    #[must_use]
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            unit_name: name.into(),
            status: UnitStatus::Running,
            started_at: Some(Utc::now()),
            ended_at: None,
        }
    }

    /// Unit that started and finished successfully now
    #[must_use]
    pub fn succeeded(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            unit_name: name.into(),
            status: UnitStatus::Success,
            started_at: Some(now),
            ended_at: Some(now),
        }
    }

    /// Move the unit to `status`, stamping start and end times as needed
    pub fn set_status(&mut self, status: UnitStatus) {
        let now = Utc::now();
        if self.started_at.is_none() && status != UnitStatus::Queued {
            self.started_at = Some(now);
        }
        if status.is_terminal() {
            self.ended_at = Some(now);
        }
        self.status = status;
    }
}

/// Mark every RUNNING unit as FAILURE
#[must_use]
pub fn complete_unit_progress(mut units: Vec<UnitProgress>) -> Vec<UnitProgress> {
    for unit in units.iter_mut().filter(|u| u.status == UnitStatus::Running) {
        unit.set_status(UnitStatus::Failure);
    }
    units
}

/// Merge unit updates by name; updates win and new names are appended
#[must_use]
pub fn merge_unit_progress(
    mut base: Vec<UnitProgress>,
    updates: Vec<UnitProgress>,
) -> Vec<UnitProgress> {
    for update in updates {
        match base.iter_mut().find(|u| u.unit_name == update.unit_name) {
            Some(existing) => *existing = update,
            None => base.push(update),
        }
    }
    base
}

/// Set the status of the named unit, if present
pub fn mark_unit(units: &mut [UnitProgress], name: &str, status: UnitStatus) {
    if let Some(unit) = units.iter_mut().find(|u| u.unit_name == name) {
        unit.set_status(status);
    }
}
