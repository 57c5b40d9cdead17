//! Fuel measurements derived from raw sensor weight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cylinder::Cylinder;
use crate::types::{CylinderId, MeasurementId, ValidationError};

/// A raw weight sample from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSample {
    /// Total weight on the scale (cylinder plus fuel).
    pub total_weight_kg: f64,
    pub timestamp: DateTime<Utc>,
}

impl WeightSample {
    pub const fn new(total_weight_kg: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            total_weight_kg,
            timestamp,
        }
    }

    /// Builds a sample from a sensor timestamp in Unix milliseconds.
    ///
    /// Returns `None` if the timestamp is out of range.
    pub fn from_epoch_millis(total_weight_kg: f64, timestamp_ms: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(timestamp_ms).map(|ts| Self::new(total_weight_kg, ts))
    }
}

/// A raw inclination sample. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InclinationReading {
    pub pitch: f64,
    pub roll: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fuel quantity computed from a weight reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelLevel {
    pub kilograms: f64,
    pub percentage: f64,
}

impl FuelLevel {
    /// Subtracts the tare and expresses the remainder as a share of capacity.
    ///
    /// Readings below the tare yield zero fuel. A non-positive capacity yields
    /// a zero percentage.
    pub fn from_weight(total_weight_kg: f64, tare_kg: f64, capacity_kg: f64) -> Self {
        let kilograms = (total_weight_kg - tare_kg).max(0.0);
        let percentage = if capacity_kg > 0.0 {
            kilograms / capacity_kg * 100.0
        } else {
            0.0
        };
        Self {
            kilograms,
            percentage,
        }
    }

    /// Both values are finite, kilograms is non-negative and the percentage
    /// lies within `[0, 100]`.
    pub fn is_valid(&self) -> bool {
        self.kilograms.is_finite()
            && self.percentage.is_finite()
            && self.kilograms >= 0.0
            && (0.0..=100.0).contains(&self.percentage)
    }

    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(ValidationError::InvalidMeasurement {
                kilograms: self.kilograms,
                percentage: self.percentage,
            })
        }
    }
}

/// A measurement ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeasurement {
    pub cylinder_id: CylinderId,
    /// Cylinder name at write time.
    pub cylinder_name: String,
    pub timestamp: DateTime<Utc>,
    pub fuel_kilograms: f64,
    pub fuel_percentage: f64,
    pub total_weight_kg: f64,
    pub is_calibrated: bool,
    /// Backfilled from the sensor's offline buffer rather than read live.
    pub is_historical: bool,
}

impl NewMeasurement {
    /// Converts a weight sample against the given cylinder.
    pub fn from_sample(cylinder: &Cylinder, sample: WeightSample, is_historical: bool) -> Self {
        let level = cylinder.fuel_level(sample.total_weight_kg);
        Self {
            cylinder_id: cylinder.id,
            cylinder_name: cylinder.name.clone(),
            timestamp: sample.timestamp,
            fuel_kilograms: level.kilograms,
            fuel_percentage: level.percentage,
            total_weight_kg: sample.total_weight_kg,
            is_calibrated: true,
            is_historical,
        }
    }

    pub const fn level(&self) -> FuelLevel {
        FuelLevel {
            kilograms: self.fuel_kilograms,
            percentage: self.fuel_percentage,
        }
    }

    /// A NaN weight collapses to zero fuel, so the raw weight is checked too.
    pub fn is_valid(&self) -> bool {
        self.total_weight_kg.is_finite() && self.level().is_valid()
    }
}

/// A stored fuel measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelMeasurement {
    pub id: MeasurementId,
    pub cylinder_id: CylinderId,
    pub cylinder_name: String,
    pub timestamp: DateTime<Utc>,
    pub fuel_kilograms: f64,
    pub fuel_percentage: f64,
    pub total_weight_kg: f64,
    pub is_calibrated: bool,
    pub is_historical: bool,
}

impl FuelMeasurement {
    pub fn from_new(id: MeasurementId, measurement: NewMeasurement) -> Self {
        Self {
            id,
            cylinder_id: measurement.cylinder_id,
            cylinder_name: measurement.cylinder_name,
            timestamp: measurement.timestamp,
            fuel_kilograms: measurement.fuel_kilograms,
            fuel_percentage: measurement.fuel_percentage,
            total_weight_kg: measurement.total_weight_kg,
            is_calibrated: measurement.is_calibrated,
            is_historical: measurement.is_historical,
        }
    }
}
