//! Scan command: runs captured advertisements through a discovery session.
//!
//! Each stdin line is one advertisement as JSON, for example
//! `{"name":"GasScale","address":"aa:bb:cc:dd:ee:ff","rssi":-60,
//! "advertised_services":["4fafc201-1fb5-459e-8fcc-c5c9c331914b"],"is_connectable":true}`.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;
use gauge_core::{DiscoveredDevice, DiscoveryFilter};
use uuid::Uuid;

use crate::Config;

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Show devices that do not advertise the sensor service.
    #[arg(long)]
    pub all: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, config: &Config, args: &ScanArgs) -> Result<()> {
    let stdin = io::stdin();
    let filter = scan(stdin.lock(), config.sensor_service, args.all)?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(filter.visible())?)?;
    } else {
        write!(writer, "{}", format_devices(&filter))?;
    }
    Ok(())
}

fn scan<R: BufRead>(reader: R, service: Uuid, show_all: bool) -> Result<DiscoveryFilter> {
    let mut filter = DiscoveryFilter::new(service);
    filter.set_filter(!show_all);
    filter.start();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let device: DiscoveredDevice = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid advertisement on line {}", idx + 1))?;
        filter.on_discovered(device);
    }
    filter.stop();
    Ok(filter)
}

fn format_devices(filter: &DiscoveryFilter) -> String {
    let mut output = String::new();
    let visible = filter.visible();
    if visible.is_empty() {
        writeln!(output, "No sensors found ({} device(s) seen).", filter.all().len()).unwrap();
        return output;
    }
    for device in visible {
        let marker = if filter.is_compatible(device) { '*' } else { ' ' };
        writeln!(
            output,
            "{marker} {}  {:>4} dBm  {}",
            device.address,
            device.rssi,
            device.name.as_deref().unwrap_or("(unnamed)")
        )
        .unwrap();
    }
    output
}
