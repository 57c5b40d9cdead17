//! Summary command for consumption totals over a recent window.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Args;
use gauge_core::{ConsumptionSummary, CylinderId, estimated_days_remaining, per_cylinder, summarize};
use serde::Serialize;

use super::util::window;
use crate::Services;

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Number of days to include.
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Consumption for one cylinder within the window.
#[derive(Debug, Serialize)]
pub struct CylinderConsumption {
    pub id: CylinderId,
    pub name: String,
    pub kilograms: f64,
}

/// Latest reading of the active cylinder.
#[derive(Debug, Serialize)]
pub struct ActiveLevel {
    pub name: String,
    /// `None` until the cylinder has a reading.
    pub fuel_kg: Option<f64>,
    pub percentage: Option<f64>,
    pub estimated_days_remaining: Option<f64>,
}

/// Computed summary data.
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub days: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(flatten)]
    pub consumption: ConsumptionSummary,
    pub cylinders: Vec<CylinderConsumption>,
    pub active: Option<ActiveLevel>,
}

pub async fn run<W: Write>(writer: &mut W, services: &Services, args: &SummaryArgs) -> Result<()> {
    let report = build_report(services, args.days, Utc::now(), &Local).await?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_summary(&report))?;
    }
    Ok(())
}

pub async fn build_report<Tz: TimeZone>(
    services: &Services,
    days: u32,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<SummaryReport> {
    let (start, end) = window(days, now)?;
    let measurements = services.ingestion.measurements_between(start, end).await?;
    let consumption = summarize(&measurements, tz);

    let names: BTreeMap<CylinderId, &str> = measurements
        .iter()
        .map(|m| (m.cylinder_id, m.cylinder_name.as_str()))
        .collect();
    let cylinders = per_cylinder(&measurements)
        .into_iter()
        .map(|(id, kilograms)| CylinderConsumption {
            id,
            name: names.get(&id).copied().unwrap_or_default().to_string(),
            kilograms,
        })
        .collect();

    let active = match services.registry.active() {
        Some(cylinder) => {
            let latest = services.ingestion.latest_for(cylinder.id).await?;
            Some(ActiveLevel {
                name: cylinder.name,
                fuel_kg: latest.as_ref().map(|m| m.fuel_kilograms),
                percentage: latest.as_ref().map(|m| m.fuel_percentage),
                estimated_days_remaining: latest.as_ref().and_then(|m| {
                    estimated_days_remaining(m.fuel_kilograms, consumption.average_daily_kg)
                }),
            })
        }
        None => None,
    };

    Ok(SummaryReport {
        days,
        start,
        end,
        consumption,
        cylinders,
        active,
    })
}

pub fn format_summary(report: &SummaryReport) -> String {
    let mut output = String::new();
    let consumption = &report.consumption;
    writeln!(output, "Consumption, last {} days", report.days).unwrap();
    writeln!(output, "Total consumed: {:.2} kg", consumption.total_kg).unwrap();
    writeln!(output, "Days with data: {}", consumption.days_with_data).unwrap();
    writeln!(output, "Average per day: {:.2} kg", consumption.average_daily_kg).unwrap();
    writeln!(output, "Refills: {}", consumption.refills).unwrap();

    if !report.cylinders.is_empty() {
        output.push_str("By cylinder:\n");
        for cylinder in &report.cylinders {
            writeln!(output, "- {}: {:.2} kg", cylinder.name, cylinder.kilograms).unwrap();
        }
    }

    match &report.active {
        None => output.push_str("Active cylinder: none\n"),
        Some(ActiveLevel {
            name,
            fuel_kg: Some(fuel_kg),
            percentage: Some(percentage),
            estimated_days_remaining: remaining,
        }) => {
            writeln!(
                output,
                "Active cylinder: {name}, {fuel_kg:.2} kg ({percentage:.1}%)"
            )
            .unwrap();
            match remaining {
                Some(days) => {
                    writeln!(output, "Estimated days remaining: {days:.1}").unwrap();
                }
                None => output.push_str("Estimated days remaining: unknown\n"),
            }
        }
        Some(active) => {
            writeln!(output, "Active cylinder: {}, no readings", active.name).unwrap();
        }
    }
    output
}
