//! Measurement ingestion.
//!
//! Live samples are converted against the active cylinder, stored, and then
//! screened for a transient spike or dip among the readings before them.
//! The screening step runs after the insert has committed and its failures
//! are logged, never returned.
//!
//! Historical samples from the sensor's offline buffer are converted against
//! an explicit cylinder, invalid ones are dropped, and the rest are stored in
//! one transaction without screening.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gauge_core::outlier::OUTLIER_WINDOW;
use gauge_core::{
    Cylinder, CylinderId, FuelMeasurement, MeasurementId, NewMeasurement, OutlierConfig,
    ValidationError, WeightSample, find_outlier,
};
use gauge_db::{Database, DbError};
use tokio::sync::watch;

use crate::{CylinderRegistry, PipelineError, SharedDatabase};

/// Result of recording a live sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub measurement_id: MeasurementId,
    pub processed: bool,
    pub reason: String,
    /// Earlier reading removed as an outlier, if any.
    pub removed_outlier: Option<MeasurementId>,
    pub measurement: FuelMeasurement,
}

/// Turns weight samples into stored fuel measurements.
pub struct IngestionService {
    db: SharedDatabase,
    registry: Arc<CylinderRegistry>,
    outliers: OutlierConfig,
    revision: watch::Sender<u64>,
}

impl IngestionService {
    pub fn new(db: SharedDatabase, registry: Arc<CylinderRegistry>, outliers: OutlierConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            db,
            registry,
            outliers,
            revision,
        }
    }

    /// Subscribes to a counter bumped after every change to stored
    /// measurements. Readers re-query when it moves.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn registry(&self) -> &Arc<CylinderRegistry> {
        &self.registry
    }

    /// Records a live sample against the active cylinder.
    pub async fn record_real_time(&self, sample: WeightSample) -> Result<RecordOutcome, PipelineError> {
        // Activation publishes under this lock, so the signal matches storage here.
        let mut db = self.db.lock().await;
        let Some(cylinder) = self.registry.active() else {
            tracing::debug!(weight = sample.total_weight_kg, "sample without active cylinder");
            return Err(PipelineError::NoActiveCylinder);
        };

        let new = NewMeasurement::from_sample(&cylinder, sample, false);
        if !new.is_valid() {
            return Err(invalid(&new).into());
        }

        let measurement_id = db.insert_measurement(&new)?;
        let measurement = FuelMeasurement::from_new(measurement_id, new);

        let removed_outlier = match correct_outlier(&mut db, &measurement, &self.outliers) {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    measurement = %measurement_id,
                    "outlier correction failed"
                );
                None
            }
        };
        self.bump_revision();
        drop(db);

        tracing::debug!(
            measurement = %measurement_id,
            cylinder = %cylinder.id,
            fuel_kg = measurement.fuel_kilograms,
            fuel_pct = measurement.fuel_percentage,
            "measurement recorded"
        );

        let reason = removed_outlier.map_or_else(
            || "measurement recorded".to_string(),
            |removed| format!("measurement recorded; removed outlier {removed}"),
        );
        Ok(RecordOutcome {
            measurement_id,
            processed: true,
            reason,
            removed_outlier,
            measurement,
        })
    }

    /// Records samples from the sensor's offline buffer for one cylinder.
    ///
    /// Samples that produce an invalid measurement are skipped. Returns the
    /// number of measurements stored.
    pub async fn record_historical(
        &self,
        cylinder_id: CylinderId,
        samples: &[WeightSample],
    ) -> Result<usize, PipelineError> {
        let mut db = self.db.lock().await;
        let cylinder: Cylinder = db
            .get_cylinder(cylinder_id)?
            .ok_or(PipelineError::NotFound { id: cylinder_id })?;

        let measurements: Vec<NewMeasurement> = samples
            .iter()
            .map(|sample| NewMeasurement::from_sample(&cylinder, *sample, true))
            .filter(|measurement| {
                let valid = measurement.is_valid();
                if !valid {
                    tracing::debug!(
                        weight = measurement.total_weight_kg,
                        timestamp = %measurement.timestamp,
                        "dropping invalid historical sample"
                    );
                }
                valid
            })
            .collect();

        let inserted = db.insert_measurements(&measurements)?;
        if inserted > 0 {
            self.bump_revision();
        }
        drop(db);

        tracing::info!(
            cylinder = %cylinder_id,
            received = samples.len(),
            inserted,
            "historical samples imported"
        );
        Ok(inserted)
    }

    /// Measurements in `[start, end)`, oldest first.
    pub async fn measurements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FuelMeasurement>, PipelineError> {
        Ok(self.db.lock().await.list_measurements_in_range(start, end)?)
    }

    /// Every measurement of one cylinder, oldest first.
    pub async fn measurements_for(
        &self,
        cylinder_id: CylinderId,
    ) -> Result<Vec<FuelMeasurement>, PipelineError> {
        Ok(self
            .db
            .lock()
            .await
            .list_measurements_for_cylinder(cylinder_id)?)
    }

    /// The newest measurement of one cylinder.
    pub async fn latest_for(
        &self,
        cylinder_id: CylinderId,
    ) -> Result<Option<FuelMeasurement>, PipelineError> {
        let mut recent = self.db.lock().await.recent_measurements(cylinder_id, 1)?;
        Ok(recent.pop())
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

fn invalid(measurement: &NewMeasurement) -> ValidationError {
    ValidationError::InvalidMeasurement {
        kilograms: measurement.fuel_kilograms,
        percentage: measurement.fuel_percentage,
    }
}

/// Deletes at most one outlier among the readings before `inserted`.
fn correct_outlier(
    db: &mut Database,
    inserted: &FuelMeasurement,
    config: &OutlierConfig,
) -> Result<Option<MeasurementId>, DbError> {
    if !config.enabled {
        return Ok(None);
    }
    let recent = db.recent_measurements(inserted.cylinder_id, OUTLIER_WINDOW)?;
    if recent.first().map(|newest| newest.id) != Some(inserted.id) {
        // An older timestamp than stored history; neighbors are not well defined.
        tracing::debug!(measurement = %inserted.id, "sample is not the newest, skipping outlier check");
        return Ok(None);
    }
    let Some(outlier) = find_outlier(&recent, config) else {
        return Ok(None);
    };
    if db.delete_measurement(outlier)? {
        tracing::info!(
            outlier = %outlier,
            cylinder = %inserted.cylinder_id,
            "removed outlier measurement"
        );
        Ok(Some(outlier))
    } else {
        Ok(None)
    }
}
