//! Measurement pipeline services for the gas cylinder level tracker.
//!
//! - [`CylinderRegistry`]: owns the single-active-cylinder invariant and
//!   publishes the active cylinder on a `watch` channel
//! - [`IngestionService`]: converts weight samples into stored measurements,
//!   with outlier correction for live readings
//! - [`SensorSession`]: drains a [`SensorTransport`]'s sample streams into
//!   ingestion in arrival order
//!
//! All services share one [`Database`] behind an async mutex. Each operation
//! holds the lock only for its storage steps.

use std::sync::Arc;

use gauge_db::Database;
use tokio::sync::Mutex;

mod error;
pub mod ingestion;
pub mod registry;
pub mod session;

pub use error::PipelineError;
pub use ingestion::{IngestionService, RecordOutcome};
pub use registry::CylinderRegistry;
pub use session::{
    ChannelTransport, SensorSession, SensorTransport, SessionReport, TransportError, TransportFeed,
};

/// Database handle shared between services.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Wraps a database for use by the pipeline services.
pub fn share(db: Database) -> SharedDatabase {
    Arc::new(Mutex::new(db))
}
