//! Core domain logic for the gas cylinder level tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Cylinders: validated cylinder definitions (tare and capacity)
//! - Measurements: weight-to-fuel conversion and the validity predicate
//! - Outliers: detecting a single transient spike or dip in recent history
//! - Consumption: refill-aware totals and per-day chart series
//! - Discovery: deduplicating and filtering sensors seen during a scan

pub mod consumption;
pub mod cylinder;
pub mod discovery;
pub mod measurement;
pub mod outlier;
pub mod types;

pub use consumption::{
    ConsumptionSummary, DailyConsumption, chart_series, estimated_days_remaining, per_cylinder,
    summarize, total_consumed,
};
pub use cylinder::{Cylinder, CylinderSpec};
pub use discovery::{DEFAULT_SENSOR_SERVICE, DiscoveredDevice, DiscoveryFilter};
pub use measurement::{FuelLevel, FuelMeasurement, InclinationReading, NewMeasurement, WeightSample};
pub use outlier::{OutlierConfig, find_outlier};
pub use types::{CylinderId, MeasurementId, ValidationError};
