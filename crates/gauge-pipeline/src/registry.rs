//! The cylinder registry.
//!
//! Activation is committed in one storage transaction and published on a
//! `watch` channel while the storage lock is still held, so subscribers see
//! activation changes in commit order and never an intermediate state.

use chrono::Utc;
use gauge_core::{Cylinder, CylinderId, CylinderSpec};
use tokio::sync::watch;

use crate::{PipelineError, SharedDatabase};

/// Owns the single-active-cylinder invariant.
pub struct CylinderRegistry {
    db: SharedDatabase,
    active: watch::Sender<Option<Cylinder>>,
}

impl CylinderRegistry {
    /// Loads the currently active cylinder and starts publishing it.
    pub async fn load(db: SharedDatabase) -> Result<Self, PipelineError> {
        let active = db.lock().await.active_cylinder()?;
        let (sender, _) = watch::channel(active);
        Ok(Self { db, active: sender })
    }

    /// The last committed active cylinder.
    pub fn active(&self) -> Option<Cylinder> {
        self.active.borrow().clone()
    }

    /// Subscribes to active-cylinder changes.
    ///
    /// The receiver starts with the current value marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Option<Cylinder>> {
        self.active.subscribe()
    }

    pub async fn get(&self, id: CylinderId) -> Result<Cylinder, PipelineError> {
        self.db
            .lock()
            .await
            .get_cylinder(id)?
            .ok_or(PipelineError::NotFound { id })
    }

    pub async fn list(&self) -> Result<Vec<Cylinder>, PipelineError> {
        Ok(self.db.lock().await.list_cylinders()?)
    }

    /// Adds a cylinder, optionally making it the active one.
    pub async fn add(
        &self,
        name: &str,
        tare_kg: f64,
        capacity_kg: f64,
        make_active: bool,
    ) -> Result<CylinderId, PipelineError> {
        let spec = CylinderSpec::new(name, tare_kg, capacity_kg)?;
        let id = self.db.lock().await.insert_cylinder(&spec, Utc::now())?;
        tracing::info!(%id, name = spec.name(), "cylinder added");
        if make_active {
            self.set_active(id).await?;
        }
        Ok(id)
    }

    /// Makes `id` the only active cylinder.
    pub async fn set_active(&self, id: CylinderId) -> Result<Cylinder, PipelineError> {
        let mut db = self.db.lock().await;
        let Some(cylinder) = db.set_active_cylinder(id)? else {
            return Err(PipelineError::NotFound { id });
        };
        self.active.send_replace(Some(cylinder.clone()));
        drop(db);
        tracing::info!(%id, name = %cylinder.name, "cylinder activated");
        Ok(cylinder)
    }

    /// Changes a cylinder's name, tare and capacity.
    ///
    /// Activation is left alone. If the cylinder is active, the new values
    /// are published.
    pub async fn update(
        &self,
        id: CylinderId,
        name: &str,
        tare_kg: f64,
        capacity_kg: f64,
    ) -> Result<Cylinder, PipelineError> {
        let spec = CylinderSpec::new(name, tare_kg, capacity_kg)?;
        let mut db = self.db.lock().await;
        if !db.update_cylinder(id, &spec)? {
            return Err(PipelineError::NotFound { id });
        }
        let cylinder = db.get_cylinder(id)?.ok_or(PipelineError::NotFound { id })?;
        if cylinder.is_active {
            self.active.send_replace(Some(cylinder.clone()));
        }
        drop(db);
        tracing::info!(%id, "cylinder updated");
        Ok(cylinder)
    }

    /// Deletes every inactive cylinder and its measurement history.
    pub async fn delete_inactive(&self) -> Result<usize, PipelineError> {
        let deleted = self.db.lock().await.delete_inactive_cylinders()?;
        tracing::info!(deleted, "inactive cylinders deleted");
        Ok(deleted)
    }
}
