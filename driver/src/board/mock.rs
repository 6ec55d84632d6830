use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use super::types::{AdcBurst, AdcConfig, AdcDriver, DriverEvent, DriverStatus};
use crate::error::DeviceError;

const SAMPLE_RATE_HZ: f64 = 250.0;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A synthetic driver standing in for the acquisition board SDK. Generates
/// per-channel sine waves plus noise, delivered in irregular-size bursts to
/// exercise the Sample Ring's burst-absorption contract.
pub struct MockDriver {
    config: Option<AdcConfig>,
    session_open: bool,
    running: Arc<AtomicBool>,
    status: DriverStatus,
    task: Option<JoinHandle<()>>,
    sd_recording: bool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            config: None,
            session_open: false,
            running: Arc::new(AtomicBool::new(false)),
            status: DriverStatus::NotInitialized,
            task: None,
            sd_recording: false,
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdcDriver for MockDriver {
    async fn open_session(&mut self, config: AdcConfig) -> Result<(), DeviceError> {
        if self.session_open {
            // Force-release any stale prior session before opening a new one,
            // matching the upstream SDK's "release all sessions" recovery behavior.
            warn!("opening session while one was already open, releasing it first");
            self.release_session().await?;
        }
        if config.channels.is_empty() {
            return Err(DeviceError::Configuration("no channels enabled".into()));
        }
        self.config = Some(config);
        self.session_open = true;
        self.status = DriverStatus::Ok;
        info!(board_id = self.config.as_ref().unwrap().board_id, "mock session opened");
        Ok(())
    }

    async fn release_session(&mut self) -> Result<(), DeviceError> {
        if self.sd_recording {
            self.stop_sd_recording().await?;
        }
        if self.running.load(Ordering::SeqCst) {
            self.stop_acquisition().await?;
        }
        self.session_open = false;
        self.config = None;
        self.status = DriverStatus::NotInitialized;
        debug!("mock session released");
        Ok(())
    }

    async fn start_acquisition(&mut self) -> Result<mpsc::Receiver<DriverEvent>, DeviceError> {
        let config = self
            .config
            .clone()
            .ok_or(DeviceError::NotInitialized)?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::StreamStart("already running".into()));
        }
        let (tx, rx) = mpsc::channel(64);
        let running = self.running.clone();
        let channels = config.channels.clone();

        self.task = Some(tokio::spawn(async move {
            let start = now_ms();
            let mut rng = StdRng::from_entropy();
            let mut sample_count: u64 = 0;
            if tx
                .send(DriverEvent::StatusChange(DriverStatus::Running))
                .await
                .is_err()
            {
                return;
            }
            while running.load(Ordering::SeqCst) {
                // Irregular burst size: simulates SPI/serial jitter.
                let burst_len = rng.gen_range(20..=140);
                let mut burst_channels = Vec::with_capacity(channels.len());
                for ch in &channels {
                    let mut samples = Vec::with_capacity(burst_len);
                    let freq_hz = 8.0 + (ch.index as f64) * 1.5; // alpha-dominant synthetic signal
                    for i in 0..burst_len {
                        let t = (sample_count + i as u64) as f64 / SAMPLE_RATE_HZ;
                        let clean = 50.0 * (2.0 * std::f64::consts::PI * freq_hz * t).sin();
                        let noise: f64 = rng.gen_range(-2.0..2.0);
                        samples.push(clean + noise);
                    }
                    burst_channels.push((ch.index, samples));
                }
                sample_count += burst_len as u64;
                let burst = AdcBurst {
                    timestamp_ms: now_ms().saturating_sub(start),
                    channels: burst_channels,
                };
                if tx.send(DriverEvent::Data(burst)).await.is_err() {
                    break;
                }
                let sleep_ms = (1000.0 * burst_len as f64 / SAMPLE_RATE_HZ) as u64;
                sleep(Duration::from_millis(sleep_ms.max(1))).await;
            }
        }));
        self.status = DriverStatus::Running;
        Ok(rx)
    }

    async fn stop_acquisition(&mut self) -> Result<(), DeviceError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }
        self.status = DriverStatus::Stopped;
        Ok(())
    }

    fn sample_rate_hz(&self) -> f64 {
        SAMPLE_RATE_HZ
    }

    fn status(&self) -> DriverStatus {
        self.status.clone()
    }

    async fn start_sd_recording(&mut self) -> Result<(), DeviceError> {
        if !self.session_open {
            return Err(DeviceError::NotInitialized);
        }
        self.sd_recording = true;
        info!("mock on-board SD recording started (pre-allocated ~12h file)");
        Ok(())
    }

    async fn stop_sd_recording(&mut self) -> Result<(), DeviceError> {
        if self.sd_recording {
            self.sd_recording = false;
            info!("mock on-board SD recording stopped");
        }
        Ok(())
    }
}
