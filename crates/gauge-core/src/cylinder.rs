//! Gas cylinders and their validated definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measurement::FuelLevel;
use crate::types::{CylinderId, ValidationError};

/// A cylinder as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub id: CylinderId,
    pub name: String,
    /// Empty weight of the cylinder in kilograms.
    pub tare_kg: f64,
    /// Fuel capacity in kilograms.
    pub capacity_kg: f64,
    /// At most one cylinder is active at a time.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Cylinder {
    /// Converts a total weight reading into a fuel level for this cylinder.
    pub fn fuel_level(&self, total_weight_kg: f64) -> FuelLevel {
        FuelLevel::from_weight(total_weight_kg, self.tare_kg, self.capacity_kg)
    }
}

/// User-supplied cylinder fields, validated.
///
/// The name is trimmed. Tare must be non-negative and capacity strictly
/// positive; non-finite values are rejected with the same errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylinderSpec {
    name: String,
    tare_kg: f64,
    capacity_kg: f64,
}

impl CylinderSpec {
    pub fn new(name: &str, tare_kg: f64, capacity_kg: f64) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !tare_kg.is_finite() || tare_kg < 0.0 {
            return Err(ValidationError::NegativeTare { value: tare_kg });
        }
        if !capacity_kg.is_finite() || capacity_kg <= 0.0 {
            return Err(ValidationError::NonPositiveCapacity { value: capacity_kg });
        }
        Ok(Self {
            name: name.to_string(),
            tare_kg,
            capacity_kg,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn tare_kg(&self) -> f64 {
        self.tare_kg
    }

    pub const fn capacity_kg(&self) -> f64 {
        self.capacity_kg
    }
}
