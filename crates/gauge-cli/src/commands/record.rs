//! Record command for a single live weight reading.

use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use gauge_core::WeightSample;

use super::util::parse_timestamp;
use crate::Services;

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Total weight on the scale in kilograms.
    pub weight_kg: f64,

    /// Reading time as RFC 3339 or Unix milliseconds (default: now).
    #[arg(long)]
    pub at: Option<String>,
}

pub async fn run<W: Write>(writer: &mut W, services: &Services, args: &RecordArgs) -> Result<()> {
    let timestamp = match &args.at {
        Some(at) => parse_timestamp(at)?,
        None => Utc::now(),
    };
    let outcome = services
        .ingestion
        .record_real_time(WeightSample::new(args.weight_kg, timestamp))
        .await?;

    let measurement = &outcome.measurement;
    writeln!(
        writer,
        "Recorded {:.2} kg ({:.1}%) for {}",
        measurement.fuel_kilograms, measurement.fuel_percentage, measurement.cylinder_name
    )?;
    if let Some(outlier) = outcome.removed_outlier {
        writeln!(writer, "Removed outlier measurement {outlier}")?;
    }
    Ok(())
}
