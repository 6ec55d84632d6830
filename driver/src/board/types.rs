use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DeviceError;
use crate::types::ChannelSpec;

/// Parameters the Lifecycle Controller hands the driver when opening a session.
/// Fixed for the lifetime of that session.
#[derive(Clone, Debug)]
pub struct AdcConfig {
    pub board_id: i32,
    pub serial_port: Option<String>,
    pub channels: Vec<ChannelSpec>,
    pub samples_per_epoch: usize,
}

/// One delivery from the driver: a burst of raw microvolt samples per channel,
/// arriving at irregular intervals and irregular sizes.
#[derive(Clone, Debug)]
pub struct AdcBurst {
    pub timestamp_ms: u64,
    /// `(channel_index, samples)`, one entry per enabled channel present in this burst.
    pub channels: Vec<(usize, Vec<f64>)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DriverStatus {
    NotInitialized,
    Ok,
    Running,
    Stopped,
    Error(String),
}

#[derive(Clone, Debug)]
pub enum DriverEvent {
    Data(AdcBurst),
    StatusChange(DriverStatus),
}

/// The acquisition board SDK, specified only at this interface: open/close a
/// session, start/stop streaming, and optionally register a driver-owned
/// sideband raw-sample stream. Every `open_session` must be paired with a
/// `release_session` on every exit path, including errors.
#[async_trait]
pub trait AdcDriver: Send + Sync {
    async fn open_session(&mut self, config: AdcConfig) -> Result<(), DeviceError>;
    async fn release_session(&mut self) -> Result<(), DeviceError>;
    async fn start_acquisition(&mut self) -> Result<mpsc::Receiver<DriverEvent>, DeviceError>;
    async fn stop_acquisition(&mut self) -> Result<(), DeviceError>;
    fn sample_rate_hz(&self) -> f64;
    fn status(&self) -> DriverStatus;
    /// Registers a sideband raw-sample streamer. A no-op for drivers that don't
    /// support one; the daemon treats failure here as a non-fatal `SinkError`.
    async fn register_sideband(&mut self, _uri: &str) -> Result<(), DeviceError> {
        Ok(())
    }
    /// Issues the on-board SD-recording command: a vendor-specific,
    /// pre-allocated fixed-duration file capture independent of the streamed
    /// epochs. Called during `IDLE -> CONNECTING`, after `open_session` and
    /// before `start_acquisition`. Default no-op for drivers without
    /// on-device storage.
    async fn start_sd_recording(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
    /// Stops on-device SD recording started by `start_sd_recording`. Called
    /// during `STREAMING -> IDLE`, before `stop_acquisition`. Default no-op.
    async fn stop_sd_recording(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
