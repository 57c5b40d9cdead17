//! Replay command: feeds recorded samples through a sensor session.
//!
//! Each sample takes the same path as a live reading, including outlier
//! correction, in file order.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use gauge_core::WeightSample;
use gauge_pipeline::{ChannelTransport, SensorSession, SensorTransport, SessionReport};
use tokio::sync::watch;

use super::util::parse_samples;
use crate::Services;

const REPLAY_ADDRESS: &str = "replay";

pub async fn run<W: Write>(writer: &mut W, services: &Services) -> Result<()> {
    let stdin = io::stdin();
    let report = replay_from(stdin.lock(), services).await?;
    write_report(writer, &report)
}

async fn replay_from<R: BufRead>(reader: R, services: &Services) -> Result<SessionReport> {
    replay(services, parse_samples(reader)?).await
}

async fn replay(services: &Services, samples: Vec<WeightSample>) -> Result<SessionReport> {
    let (mut transport, feed) = ChannelTransport::new();
    transport
        .connect(REPLAY_ADDRESS)
        .await
        .context("failed to connect replay transport")?;
    let session = SensorSession::attach(&mut transport, services.ingestion.clone())
        .context("failed to attach sensor session")?;

    let producer = tokio::spawn(async move {
        for sample in samples {
            if feed.weights.send(sample).await.is_err() {
                break;
            }
        }
    });

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let report = session.run(shutdown_rx).await;
    producer.await.context("sample producer failed")?;
    transport
        .disconnect()
        .await
        .context("failed to disconnect replay transport")?;
    Ok(report)
}

fn write_report<W: Write>(writer: &mut W, report: &SessionReport) -> Result<()> {
    writeln!(
        writer,
        "Replayed {} samples: {} recorded, {} rejected, {} outlier(s) removed",
        report.recorded + report.rejected,
        report.recorded,
        report.rejected,
        report.outliers_removed
    )?;
    Ok(())
}
