//! Sensor sessions.
//!
//! A [`SensorTransport`] delivers raw weight and inclination samples over
//! channels. A [`SensorSession`] drains them in arrival order: weight samples
//! go through real-time ingestion one at a time, inclination samples are
//! published on a `watch` channel for whoever needs the latest one.
//!
//! Device discovery and the wire protocol live behind the transport.
//! [`ChannelTransport`] is an in-process implementation driven by a
//! [`TransportFeed`], used for replaying recorded samples.

use std::future::{Future, ready};
use std::sync::Arc;

use gauge_core::{InclinationReading, WeightSample};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::{IngestionService, PipelineError};

/// Channel capacity for sample streams.
const SAMPLE_BUFFER: usize = 64;

/// Errors raised by a sensor transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The command needs a connected sensor.
    #[error("sensor is not connected")]
    NotConnected,
    /// The sensor rejected or failed a command.
    #[error("sensor command {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
    /// The sample stream was already handed out.
    #[error("{0} samples were already taken")]
    StreamTaken(&'static str),
}

/// Connection to one physical sensor.
pub trait SensorTransport: Send {
    /// Whether the sensor is connected.
    fn connection_state(&self) -> watch::Receiver<bool>;

    /// Takes the weight sample stream. Returns `None` after the first call.
    fn take_weight_samples(&mut self) -> Option<mpsc::Receiver<WeightSample>>;

    /// Takes the inclination sample stream. Returns `None` after the first call.
    fn take_inclination_samples(&mut self) -> Option<mpsc::Receiver<InclinationReading>>;

    fn connect(&mut self, address: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn request_weight_read(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn request_inclination_read(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Zeroes the scale with nothing on it.
    fn tare(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Calibrates the scale against a known weight.
    fn calibrate(
        &mut self,
        known_weight_kg: f64,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Sending half of a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct TransportFeed {
    pub weights: mpsc::Sender<WeightSample>,
    pub inclinations: mpsc::Sender<InclinationReading>,
}

/// In-process transport whose samples come from a [`TransportFeed`].
#[derive(Debug)]
pub struct ChannelTransport {
    connected: watch::Sender<bool>,
    weights: Option<mpsc::Receiver<WeightSample>>,
    inclinations: Option<mpsc::Receiver<InclinationReading>>,
    address: Option<String>,
}

impl ChannelTransport {
    pub fn new() -> (Self, TransportFeed) {
        let (weight_tx, weight_rx) = mpsc::channel(SAMPLE_BUFFER);
        let (inclination_tx, inclination_rx) = mpsc::channel(SAMPLE_BUFFER);
        let (connected, _) = watch::channel(false);
        let transport = Self {
            connected,
            weights: Some(weight_rx),
            inclinations: Some(inclination_rx),
            address: None,
        };
        let feed = TransportFeed {
            weights: weight_tx,
            inclinations: inclination_tx,
        };
        (transport, feed)
    }

    /// Address of the connected sensor.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn ensure_connected(&self, command: &'static str) -> Result<(), TransportError> {
        if *self.connected.borrow() {
            tracing::debug!(command, "sensor command");
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl SensorTransport for ChannelTransport {
    fn connection_state(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    fn take_weight_samples(&mut self) -> Option<mpsc::Receiver<WeightSample>> {
        self.weights.take()
    }

    fn take_inclination_samples(&mut self) -> Option<mpsc::Receiver<InclinationReading>> {
        self.inclinations.take()
    }

    fn connect(&mut self, address: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.address = Some(address.to_string());
        self.connected.send_replace(true);
        tracing::info!(address, "sensor connected");
        ready(Ok(()))
    }

    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.address = None;
        self.connected.send_replace(false);
        tracing::info!("sensor disconnected");
        ready(Ok(()))
    }

    fn request_weight_read(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        ready(self.ensure_connected("read_weight"))
    }

    fn request_inclination_read(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        ready(self.ensure_connected("read_inclination"))
    }

    fn tare(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        ready(self.ensure_connected("tare"))
    }

    fn calibrate(
        &mut self,
        known_weight_kg: f64,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if !known_weight_kg.is_finite() || known_weight_kg <= 0.0 {
            Err(TransportError::Command {
                command: "calibrate",
                message: format!("known weight must be positive, got {known_weight_kg}"),
            })
        } else {
            self.ensure_connected("calibrate")
        };
        ready(result)
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub recorded: usize,
    pub rejected: usize,
    pub outliers_removed: usize,
    pub inclinations: usize,
}

/// Feeds a transport's samples into ingestion.
pub struct SensorSession {
    ingestion: Arc<IngestionService>,
    weights: mpsc::Receiver<WeightSample>,
    inclinations: Option<mpsc::Receiver<InclinationReading>>,
    latest_inclination: watch::Sender<Option<InclinationReading>>,
}

impl SensorSession {
    /// Takes the sample streams from `transport`.
    pub fn attach<T: SensorTransport>(
        transport: &mut T,
        ingestion: Arc<IngestionService>,
    ) -> Result<Self, TransportError> {
        let weights = transport
            .take_weight_samples()
            .ok_or(TransportError::StreamTaken("weight"))?;
        let inclinations = transport.take_inclination_samples();
        let (latest_inclination, _) = watch::channel(None);
        Ok(Self {
            ingestion,
            weights,
            inclinations,
            latest_inclination,
        })
    }

    /// The most recent inclination reading.
    pub fn inclination(&self) -> watch::Receiver<Option<InclinationReading>> {
        self.latest_inclination.subscribe()
    }

    /// Processes samples until the weight stream closes, `shutdown` turns
    /// true, or the shutdown sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionReport {
        let mut report = SessionReport::default();
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("session shutdown requested");
                        break;
                    }
                }
                sample = self.weights.recv() => {
                    let Some(sample) = sample else {
                        tracing::debug!("weight stream closed");
                        break;
                    };
                    self.ingest(sample, &mut report).await;
                }
                Some(reading) = recv_optional(&mut self.inclinations) => {
                    report.inclinations += 1;
                    self.latest_inclination.send_replace(Some(reading));
                }
            }
        }
        tracing::info!(
            recorded = report.recorded,
            rejected = report.rejected,
            outliers_removed = report.outliers_removed,
            "sensor session ended"
        );
        report
    }

    async fn ingest(&self, sample: WeightSample, report: &mut SessionReport) {
        match self.ingestion.record_real_time(sample).await {
            Ok(outcome) => {
                report.recorded += 1;
                if outcome.removed_outlier.is_some() {
                    report.outliers_removed += 1;
                }
            }
            Err(err @ (PipelineError::NoActiveCylinder | PipelineError::Validation(_))) => {
                report.rejected += 1;
                tracing::warn!(error = %err, weight = sample.total_weight_kg, "sample rejected");
            }
            Err(err) => {
                report.rejected += 1;
                tracing::error!(error = %err, "failed to record sample");
            }
        }
    }
}

/// Receives from an optional stream, pending forever once it is gone.
async fn recv_optional<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(inner) => {
            let value = inner.recv().await;
            if value.is_none() {
                *rx = None;
            }
            value
        }
        None => std::future::pending().await,
    }
}
