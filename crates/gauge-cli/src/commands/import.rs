//! Import command for backfilling offline weight samples.
//!
//! Samples are read as JSONL from stdin, one `{"weight_kg": .., "timestamp": ..}`
//! object per line. Samples that convert to an invalid fuel level are dropped.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Args;
use gauge_core::CylinderId;

use super::util::parse_samples;
use crate::Services;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Cylinder the samples were taken on.
    #[arg(long)]
    pub cylinder: i64,
}

pub async fn run<W: Write>(writer: &mut W, services: &Services, args: &ImportArgs) -> Result<()> {
    let stdin = io::stdin();
    import_from(stdin.lock(), writer, services, args).await
}

async fn import_from<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    services: &Services,
    args: &ImportArgs,
) -> Result<()> {
    let samples = parse_samples(reader)?;
    let cylinder_id = CylinderId::new(args.cylinder);
    let inserted = services
        .ingestion
        .record_historical(cylinder_id, &samples)
        .await?;
    writeln!(
        writer,
        "Imported {inserted} of {} samples into cylinder {cylinder_id}",
        samples.len()
    )?;
    Ok(())
}
