//! Storage layer for the gas cylinder level tracker.
//!
//! Provides persistence for cylinders and fuel measurements using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. The pipeline services share one
//! instance behind an async mutex.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). This ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Active Cylinder
//!
//! A partial unique index on `cylinders(is_active) WHERE is_active = 1` rejects any
//! write that would leave two cylinders active. Activation runs as a single
//! transaction (see [`Database::set_active_cylinder`]).
//!
//! ## Measurement History
//!
//! `measurements.cylinder_id` references `cylinders(id) ON DELETE CASCADE`, so deleting
//! a cylinder removes its history in the same statement.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use gauge_core::{Cylinder, CylinderId, CylinderSpec, FuelMeasurement, MeasurementId, NewMeasurement};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {table} row {id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const CYLINDER_COLUMNS: &str = "id, name, tare_kg, capacity_kg, is_active, created_at";

const MEASUREMENT_COLUMNS: &str = "id, cylinder_id, cylinder_name, timestamp, fuel_kilograms, \
     fuel_percentage, total_weight_kg, is_calibrated, is_historical";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cylinders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                tare_kg REAL NOT NULL,
                capacity_kg REAL NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_cylinders_single_active
                ON cylinders(is_active) WHERE is_active = 1;

            -- Measurements table: fuel readings derived from sensor weight
            -- timestamp: ISO 8601 format (e.g., '2024-01-15T10:30:00.000Z')
            -- cylinder_name: denormalized at write time
            CREATE TABLE IF NOT EXISTS measurements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cylinder_id INTEGER NOT NULL,
                cylinder_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                fuel_kilograms REAL NOT NULL,
                fuel_percentage REAL NOT NULL,
                total_weight_kg REAL NOT NULL,
                is_calibrated INTEGER NOT NULL DEFAULT 1,
                is_historical INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (cylinder_id) REFERENCES cylinders(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_measurements_timestamp ON measurements(timestamp);
            CREATE INDEX IF NOT EXISTS idx_measurements_cylinder
                ON measurements(cylinder_id, timestamp);
            ",
        )?;
        Ok(())
    }

    // ========== Cylinders ==========

    /// Inserts an inactive cylinder and returns its ID.
    pub fn insert_cylinder(
        &mut self,
        spec: &CylinderSpec,
        created_at: DateTime<Utc>,
    ) -> Result<CylinderId, DbError> {
        self.conn.execute(
            "
            INSERT INTO cylinders (name, tare_kg, capacity_kg, is_active, created_at)
            VALUES (?, ?, ?, 0, ?)
            ",
            params![
                spec.name(),
                spec.tare_kg(),
                spec.capacity_kg(),
                format_timestamp(created_at)
            ],
        )?;
        Ok(CylinderId::new(self.conn.last_insert_rowid()))
    }

    /// Replaces a cylinder's name, tare and capacity. Never touches `is_active`.
    ///
    /// Returns `false` if no cylinder has the given ID.
    pub fn update_cylinder(&mut self, id: CylinderId, spec: &CylinderSpec) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE cylinders SET name = ?, tare_kg = ?, capacity_kg = ? WHERE id = ?",
            params![spec.name(), spec.tare_kg(), spec.capacity_kg(), id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Fetches a cylinder by ID.
    pub fn get_cylinder(&self, id: CylinderId) -> Result<Option<Cylinder>, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {CYLINDER_COLUMNS} FROM cylinders WHERE id = ?"),
                [id.get()],
                CylinderRow::from_row,
            )
            .optional()?;
        raw.map(CylinderRow::into_cylinder).transpose()
    }

    /// Fetches the active cylinder, if any.
    pub fn active_cylinder(&self) -> Result<Option<Cylinder>, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {CYLINDER_COLUMNS} FROM cylinders WHERE is_active = 1"),
                [],
                CylinderRow::from_row,
            )
            .optional()?;
        raw.map(CylinderRow::into_cylinder).transpose()
    }

    /// Lists cylinders ordered by creation.
    pub fn list_cylinders(&self) -> Result<Vec<Cylinder>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CYLINDER_COLUMNS} FROM cylinders ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], CylinderRow::from_row)?;
        let mut cylinders = Vec::new();
        for row in rows {
            cylinders.push(row?.into_cylinder()?);
        }
        Ok(cylinders)
    }

    /// Makes `id` the only active cylinder.
    ///
    /// Deactivation and activation commit together. If no cylinder has the
    /// given ID the transaction is rolled back, the previously active cylinder
    /// stays active, and `None` is returned.
    pub fn set_active_cylinder(&mut self, id: CylinderId) -> Result<Option<Cylinder>, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("UPDATE cylinders SET is_active = 0 WHERE is_active = 1", [])?;
        let activated = tx.execute(
            "UPDATE cylinders SET is_active = 1 WHERE id = ?",
            [id.get()],
        )?;
        if activated == 0 {
            // Dropping the transaction rolls back the deactivation.
            return Ok(None);
        }
        tx.commit()?;
        self.get_cylinder(id)
    }

    /// Deletes every inactive cylinder together with its measurements.
    pub fn delete_inactive_cylinders(&mut self) -> Result<usize, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM cylinders WHERE is_active = 0", [])?;
        Ok(deleted)
    }

    // ========== Measurements ==========

    /// Inserts one measurement and returns its ID.
    pub fn insert_measurement(
        &mut self,
        measurement: &NewMeasurement,
    ) -> Result<MeasurementId, DbError> {
        insert_measurement_row(&self.conn, measurement)?;
        Ok(MeasurementId::new(self.conn.last_insert_rowid()))
    }

    /// Inserts a batch of measurements in one transaction.
    pub fn insert_measurements(&mut self, measurements: &[NewMeasurement]) -> Result<usize, DbError> {
        if measurements.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for measurement in measurements {
            inserted += insert_measurement_row(&tx, measurement)?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Deletes one measurement. Returns `false` if it did not exist.
    pub fn delete_measurement(&mut self, id: MeasurementId) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM measurements WHERE id = ?", [id.get()])?;
        Ok(deleted > 0)
    }

    /// Returns the newest `limit` measurements of a cylinder, newest first.
    pub fn recent_measurements(
        &self,
        cylinder_id: CylinderId,
        limit: usize,
    ) -> Result<Vec<FuelMeasurement>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_measurements(
            &format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM measurements
                WHERE cylinder_id = ?
                ORDER BY timestamp DESC, id DESC
                LIMIT ?"
            ),
            params![cylinder_id.get(), limit],
        )
    }

    /// Lists all measurements ordered by timestamp then ID.
    pub fn list_measurements(&self) -> Result<Vec<FuelMeasurement>, DbError> {
        self.query_measurements(
            &format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM measurements ORDER BY timestamp ASC, id ASC"
            ),
            [],
        )
    }

    /// Lists measurements of one cylinder ordered by timestamp.
    pub fn list_measurements_for_cylinder(
        &self,
        cylinder_id: CylinderId,
    ) -> Result<Vec<FuelMeasurement>, DbError> {
        self.query_measurements(
            &format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM measurements
                WHERE cylinder_id = ?
                ORDER BY timestamp ASC, id ASC"
            ),
            [cylinder_id.get()],
        )
    }

    /// Lists measurements within a time range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn list_measurements_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FuelMeasurement>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        self.query_measurements(
            &format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM measurements
                WHERE timestamp >= ? AND timestamp < ?
                ORDER BY timestamp ASC, id ASC"
            ),
            [format_timestamp(start), format_timestamp(end)],
        )
    }

    /// Counts stored measurements per cylinder.
    pub fn measurement_counts(&self) -> Result<Vec<(CylinderId, usize)>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT cylinder_id, COUNT(*)
            FROM measurements
            GROUP BY cylinder_id
            ORDER BY cylinder_id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((CylinderId::new(id), usize::try_from(count).unwrap_or(0)))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn query_measurements<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<FuelMeasurement>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, MeasurementRow::from_row)?;
        let mut measurements = Vec::new();
        for row in rows {
            measurements.push(row?.into_measurement()?);
        }
        Ok(measurements)
    }
}

fn insert_measurement_row(conn: &Connection, measurement: &NewMeasurement) -> Result<usize, DbError> {
    let inserted = conn.execute(
        "
        INSERT INTO measurements
        (cylinder_id, cylinder_name, timestamp, fuel_kilograms, fuel_percentage,
         total_weight_kg, is_calibrated, is_historical)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            measurement.cylinder_id.get(),
            measurement.cylinder_name,
            format_timestamp(measurement.timestamp),
            measurement.fuel_kilograms,
            measurement.fuel_percentage,
            measurement.total_weight_kg,
            measurement.is_calibrated,
            measurement.is_historical,
        ],
    )?;
    Ok(inserted)
}

#[derive(Debug)]
struct CylinderRow {
    id: i64,
    name: String,
    tare_kg: f64,
    capacity_kg: f64,
    is_active: bool,
    created_at: String,
}

impl CylinderRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            tare_kg: row.get(2)?,
            capacity_kg: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_cylinder(self) -> Result<Cylinder, DbError> {
        let created_at = parse_timestamp(&self.created_at, "cylinders", self.id)?;
        Ok(Cylinder {
            id: CylinderId::new(self.id),
            name: self.name,
            tare_kg: self.tare_kg,
            capacity_kg: self.capacity_kg,
            is_active: self.is_active,
            created_at,
        })
    }
}

#[derive(Debug)]
struct MeasurementRow {
    id: i64,
    cylinder_id: i64,
    cylinder_name: String,
    timestamp: String,
    fuel_kilograms: f64,
    fuel_percentage: f64,
    total_weight_kg: f64,
    is_calibrated: bool,
    is_historical: bool,
}

impl MeasurementRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            cylinder_id: row.get(1)?,
            cylinder_name: row.get(2)?,
            timestamp: row.get(3)?,
            fuel_kilograms: row.get(4)?,
            fuel_percentage: row.get(5)?,
            total_weight_kg: row.get(6)?,
            is_calibrated: row.get(7)?,
            is_historical: row.get(8)?,
        })
    }

    fn into_measurement(self) -> Result<FuelMeasurement, DbError> {
        let timestamp = parse_timestamp(&self.timestamp, "measurements", self.id)?;
        Ok(FuelMeasurement {
            id: MeasurementId::new(self.id),
            cylinder_id: CylinderId::new(self.cylinder_id),
            cylinder_name: self.cylinder_name,
            timestamp,
            fuel_kilograms: self.fuel_kilograms,
            fuel_percentage: self.fuel_percentage,
            total_weight_kg: self.total_weight_kg,
            is_calibrated: self.is_calibrated,
            is_historical: self.is_historical,
        })
    }
}

fn parse_timestamp(timestamp: &str, table: &'static str, id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
