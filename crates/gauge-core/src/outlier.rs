//! Detection of a single transient spike or dip in recent weight history.
//!
//! After a new real-time sample is stored, the three readings before it are
//! inspected. The middle one is an outlier when it sits well away from both
//! of its chronological neighbors in the same direction, the neighbors agree
//! with each other, and the new sample does not confirm the jump.
//!
//! ```text
//!   before      candidate      after       new
//!    11.5          6.0         12.0        11.8     -> candidate removed
//!    12.0         11.5         11.0        10.5     -> trend, kept
//! ```

use serde::{Deserialize, Serialize};

use crate::measurement::FuelMeasurement;
use crate::types::MeasurementId;

/// Thresholds for outlier correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Turns correction off entirely.
    pub enabled: bool,
    /// Minimum distance in kilograms between the candidate and each neighbor.
    pub min_deviation_kg: f64,
    /// Maximum distance in kilograms between the two neighbors.
    pub max_neighbor_gap_kg: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_deviation_kg: 2.0,
            max_neighbor_gap_kg: 1.0,
        }
    }
}

/// Number of stored readings, the new one included, needed for a decision.
pub const OUTLIER_WINDOW: usize = 4;

/// Returns the ID of the measurement to delete, if any.
///
/// `recent` holds the newest stored readings for one cylinder, newest first,
/// with the sample that was just inserted at index 0.
pub fn find_outlier(recent: &[FuelMeasurement], config: &OutlierConfig) -> Option<MeasurementId> {
    if !config.enabled {
        return None;
    }
    let [new, after, candidate, before, ..] = recent else {
        return None;
    };

    let value = candidate.total_weight_kg;
    let to_before = value - before.total_weight_kg;
    let to_after = value - after.total_weight_kg;

    let same_direction = to_before.signum() == to_after.signum();
    let deviates = to_before.abs() >= config.min_deviation_kg
        && to_after.abs() >= config.min_deviation_kg;
    let neighbors_agree =
        (after.total_weight_kg - before.total_weight_kg).abs() <= config.max_neighbor_gap_kg;
    let unconfirmed = (new.total_weight_kg - value).abs() >= config.min_deviation_kg;

    (same_direction && deviates && neighbors_agree && unconfirmed).then_some(candidate.id)
}
