//! Status command for showing the active cylinder and latest reading.

use std::io::Write;

use anyhow::Result;

use crate::{Config, Services};

pub async fn run<W: Write>(writer: &mut W, services: &Services, config: &Config) -> Result<()> {
    let counts = services.db.lock().await.measurement_counts()?;
    let total: usize = counts.iter().map(|(_, count)| count).sum();

    writeln!(writer, "Gauge status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    let Some(active) = services.registry.active() else {
        writeln!(writer, "No active cylinder configured.")?;
        writeln!(writer, "Measurements: {total} across {} cylinder(s)", counts.len())?;
        return Ok(());
    };

    writeln!(writer, "Active cylinder: {} (#{})", active.name, active.id)?;
    match services.ingestion.latest_for(active.id).await? {
        Some(latest) => writeln!(
            writer,
            "Latest reading: {:.2} kg ({:.1}%) at {}",
            latest.fuel_kilograms,
            latest.fuel_percentage,
            latest.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )?,
        None => writeln!(writer, "Latest reading: none")?,
    }
    writeln!(writer, "Measurements: {total} across {} cylinder(s)", counts.len())?;
    Ok(())
}
