// Shift views (feed / mine / claimed)

use crate::domain::{Shift, ShiftStatus};
use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Named subsets of the shift list, as seen by one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Everything, unfiltered
    #[default]
    All,
    /// Open shifts offered by other workers
    Feed,
    /// Shifts the worker offers
    Mine,
    /// Shifts the worker has claimed
    Claimed,
}

impl View {
    /// Filter and order (by start time) the shifts visible in this view
    pub fn select(&self, shifts: &[Shift], worker: Option<&str>) -> Vec<Shift> {
        let mut selected: Vec<Shift> = shifts
            .iter()
            .filter(|s| match (self, worker) {
                (View::All, _) => true,
                (View::Feed, Some(me)) => s.status == ShiftStatus::Open && !s.is_owned_by(me),
                (View::Feed, None) => s.status == ShiftStatus::Open,
                (View::Mine, Some(me)) => s.is_owned_by(me),
                (View::Claimed, Some(me)) => s.is_claimed_by(me),
                (View::Mine | View::Claimed, None) => false,
            })
            .cloned()
            .collect();

        selected.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        selected
    }
}

impl std::str::FromStr for View {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(View::All),
            "feed" => Ok(View::Feed),
            "mine" => Ok(View::Mine),
            "claimed" => Ok(View::Claimed),
            other => Err(AppError::Validation(format!("unknown view: {}", other))),
        }
    }
}
