//! Chart command for per-day consumption.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Args;
use gauge_core::{DailyConsumption, chart_series};

use super::util::window;
use crate::Services;

/// Width in characters of the longest bar.
const BAR_WIDTH: f64 = 30.0;

#[derive(Debug, Args)]
pub struct ChartArgs {
    /// Number of days to include.
    #[arg(long, default_value_t = 14)]
    pub days: u32,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run<W: Write>(writer: &mut W, services: &Services, args: &ChartArgs) -> Result<()> {
    let series = daily_series(services, args.days, Utc::now(), &Local).await?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&series)?)?;
    } else {
        write!(writer, "{}", format_chart(&series))?;
    }
    Ok(())
}

pub async fn daily_series<Tz: TimeZone>(
    services: &Services,
    days: u32,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Vec<DailyConsumption>> {
    let (start, end) = window(days, now)?;
    let measurements = services.ingestion.measurements_between(start, end).await?;
    Ok(chart_series(&measurements, tz))
}

/// Renders one bar per day, scaled to the busiest day.
pub fn format_chart(series: &[DailyConsumption]) -> String {
    let mut output = String::new();
    if series.is_empty() {
        output.push_str("No consumption recorded.\n");
        return output;
    }
    let max = series.iter().map(|day| day.kilograms).fold(0.0, f64::max);
    for day in series {
        let line = format!(
            "{}  {:>6.2} kg  {}",
            day.day,
            day.kilograms,
            "#".repeat(bar_len(day.kilograms, max))
        );
        writeln!(output, "{}", line.trim_end()).unwrap();
    }
    output
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "ratio is clamped to [0, BAR_WIDTH] before the cast"
)]
fn bar_len(kilograms: f64, max: f64) -> usize {
    if max <= 0.0 {
        return 0;
    }
    (kilograms / max * BAR_WIDTH).round().clamp(0.0, BAR_WIDTH) as usize
}
