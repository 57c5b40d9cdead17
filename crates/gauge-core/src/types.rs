//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for caller input and derived measurements.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The cylinder name was empty after trimming.
    #[error("name cannot be empty")]
    EmptyName,

    /// The tare weight was negative or not a number.
    #[error("tare cannot be negative, got {value}")]
    NegativeTare { value: f64 },

    /// The capacity was zero, negative or not a number.
    #[error("capacity must be positive, got {value}")]
    NonPositiveCapacity { value: f64 },

    /// A computed measurement fell outside the valid range.
    #[error("invalid measurement: {kilograms} kg, {percentage}%")]
    InvalidMeasurement { kilograms: f64, percentage: f64 },
}

/// Generates an integer row ID newtype with common trait implementations.
macro_rules! define_row_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row ID.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row ID.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_row_id!(
    /// Identifier assigned to a cylinder by the storage layer.
    CylinderId
);

define_row_id!(
    /// Identifier assigned to a fuel measurement by the storage layer.
    MeasurementId
);
