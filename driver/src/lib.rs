pub mod board;
pub mod dsp;
pub mod error;
pub mod ring;
pub mod scheduler;
pub mod types;

pub use board::{create_driver, AdcBurst, AdcConfig, AdcDriver, DriverEvent, DriverStatus};
pub use error::{DeviceError, DspError, RingError};
pub use ring::SampleRing;
pub use scheduler::{run as run_scheduler, CompletedEpoch};
pub use types::{
    BandPowers, ChannelSpec, ComplexityMetrics, EpochConfig, PerChannel, Psd, BANDS,
};
