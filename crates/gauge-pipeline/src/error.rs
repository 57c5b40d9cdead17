use gauge_core::{CylinderId, ValidationError};
use gauge_db::DbError;
use thiserror::Error;

/// Errors returned by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller input or a derived measurement failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The referenced cylinder does not exist.
    #[error("Cylinder not found: {id}")]
    NotFound { id: CylinderId },
    /// A live sample arrived with no active cylinder.
    #[error("No active cylinder configured")]
    NoActiveCylinder,
    /// The storage layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}
