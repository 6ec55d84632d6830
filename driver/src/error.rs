use thiserror::Error;

/// Faults raised by the acquisition driver or its session lifecycle.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("acquisition session configuration invalid: {0}")]
    Configuration(String),
    #[error("failed to open acquisition session: {0}")]
    SessionOpen(String),
    #[error("failed to start streaming: {0}")]
    StreamStart(String),
    #[error("failed to stop streaming: {0}")]
    StreamStop(String),
    #[error("driver session was not initialized")]
    NotInitialized,
}

/// Faults isolated to a single channel or a single DSP stage within one epoch.
/// Never propagated past the channel that raised them.
#[derive(Debug, Error)]
pub enum DspError {
    #[error("filter design failed for {stage}: {reason}")]
    FilterDesign { stage: &'static str, reason: String },
    #[error("complexity metric '{metric}' failed on channel {channel}: {reason}")]
    Complexity {
        metric: &'static str,
        channel: usize,
        reason: String,
    },
    #[error("spectral estimate failed: {0}")]
    Spectral(String),
}

/// Ring-buffer contract violation.
#[derive(Debug, Error)]
pub enum RingError {
    #[error("ring not ready: fewer than the required samples buffered for at least one channel")]
    NotReady,
}
