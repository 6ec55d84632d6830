use serde::{Deserialize, Serialize};

/// A single frequency band, closed on the left and open on the right, in Hz.
#[derive(Clone, Copy, Debug)]
pub struct Band {
    pub name: &'static str,
    pub low_hz: f64,
    pub high_hz: f64,
}

/// Compile-time band table. Order matches `BandPowers`' field order and must not change
/// without a corresponding change there.
pub const BANDS: [Band; 6] = [
    Band { name: "sdelta", low_hz: 0.4, high_hz: 1.0 },
    Band { name: "fdelta", low_hz: 1.0, high_hz: 4.0 },
    Band { name: "theta", low_hz: 4.0, high_hz: 8.0 },
    Band { name: "alpha", low_hz: 8.0, high_hz: 12.0 },
    Band { name: "sigma", low_hz: 12.0, high_hz: 16.0 },
    Band { name: "beta", low_hz: 16.0, high_hz: 30.0 },
];

/// Integrated spectral power per canonical band, in microvolts squared.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BandPowers {
    pub sdelta: f64,
    pub fdelta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub sigma: f64,
    pub beta: f64,
}

impl BandPowers {
    pub fn as_array_mut(&mut self) -> [&mut f64; 6] {
        [
            &mut self.sdelta,
            &mut self.fdelta,
            &mut self.theta,
            &mut self.alpha,
            &mut self.sigma,
            &mut self.beta,
        ]
    }
}

/// Closed set of entropy / fractal-dimension complexity metrics. Fixed field order,
/// serialized with lowerCamelCase keys on the wire.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityMetrics {
    pub permutation_entropy: f64,
    pub spectral_entropy: f64,
    pub svd_entropy: f64,
    pub approximate_entropy: f64,
    pub sample_entropy: f64,
    pub hjorth_mobility: f64,
    pub hjorth_complexity: f64,
    pub num_zero_crossings: f64,
    pub petrosian_fd: f64,
    pub katz_fd: f64,
    pub higuchi_fd: f64,
    pub detrended_fluctuation_analysis: f64,
}

/// Power spectral density as parallel frequency/power arrays.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Psd {
    pub freq: Vec<f64>,
    pub power: Vec<f64>,
}

/// Fully processed per-channel feature record for one epoch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerChannel {
    pub channel_idx: usize,
    pub channel_name: String,
    pub raw: Vec<f64>,
    pub filtered: Vec<f64>,
    pub fft_raw: Psd,
    pub fft_filtered: Psd,
    pub band_powers: BandPowers,
    pub over_threshold_indices: Vec<usize>,
    /// Empty when the complexity block failed for this channel (see DspError).
    pub complexity: Option<ComplexityMetrics>,
}

/// Static description of one enabled acquisition channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub index: usize,
    pub name: String,
}

/// Epoch sizing, fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug)]
pub struct EpochConfig {
    /// Samples per channel per epoch (`N`).
    pub samples_per_epoch: usize,
    /// Sampling rate in Hz, as reported by the driver (`F`).
    pub sample_rate_hz: f64,
}

impl EpochConfig {
    pub fn epoch_duration_secs(&self) -> f64 {
        self.samples_per_epoch as f64 / self.sample_rate_hz
    }
}

/// Magnitude threshold (microvolts) beyond which a filtered sample is flagged.
pub const ARTIFACT_THRESHOLD_UV: f64 = 30.0;

/// Raw-PSD and filtered-PSD cutoff; frequencies above this are not reported.
pub const PSD_MAX_HZ: f64 = 120.0;
