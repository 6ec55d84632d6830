use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::DspError;

/// Standard per-stage Q values for a 4th-order Butterworth low/high-pass
/// response built from two cascaded 2nd-order sections (Butterworth
/// polynomial pole pairs). These are specific to `biquad`'s `LowPass`/
/// `HighPass` parameterization, where `Q` sets the pole angle; they do not
/// apply to `BandPass`/`Notch`, whose `Q` instead sets `center / bandwidth`.
const LOWHIGH_CASCADE_Q: [f64; 2] = [0.541_196, 1.306_563];

/// A 4th-order filter (bandpass, bandstop, or highpass) built from two
/// cascaded biquad sections, applied forward-then-backward to cancel phase
/// distortion across the epoch window.
pub struct ButterworthCascade {
    kind: Type<f64>,
    fs_hz: f64,
    center_hz: f64,
    stage_qs: [f64; 2],
}

impl ButterworthCascade {
    pub fn bandpass(fs_hz: f64, low_hz: f64, high_hz: f64) -> Self {
        let center = (low_hz * high_hz).sqrt();
        let q = center / (high_hz - low_hz);
        Self {
            kind: Type::BandPass,
            fs_hz,
            center_hz: center,
            stage_qs: [q, q],
        }
    }

    pub fn bandstop(fs_hz: f64, low_hz: f64, high_hz: f64) -> Self {
        let center = (low_hz * high_hz).sqrt();
        let q = center / (high_hz - low_hz);
        Self {
            kind: Type::Notch,
            fs_hz,
            center_hz: center,
            stage_qs: [q, q],
        }
    }

    pub fn highpass_stopband(fs_hz: f64, cutoff_hz: f64) -> Self {
        Self {
            kind: Type::HighPass,
            fs_hz,
            center_hz: cutoff_hz,
            stage_qs: LOWHIGH_CASCADE_Q,
        }
    }

    fn build_stage(&self, q: f64) -> Result<DirectForm2Transposed<f64>, DspError> {
        let coeffs = Coefficients::<f64>::from_params(
            self.kind,
            self.fs_hz.hz(),
            self.center_hz.hz(),
            q,
        )
        .map_err(|e| DspError::FilterDesign {
            stage: "butterworth_cascade",
            reason: format!("{:?}", e),
        })?;
        Ok(DirectForm2Transposed::<f64>::new(coeffs))
    }

    fn run_once(&self, samples: &[f64]) -> Result<Vec<f64>, DspError> {
        let mut stage_a = self.build_stage(self.stage_qs[0])?;
        let mut stage_b = self.build_stage(self.stage_qs[1])?;
        Ok(samples
            .iter()
            .map(|&x| stage_b.run(stage_a.run(x)))
            .collect())
    }

    /// Applies the cascade forward then backward over the window, canceling
    /// the phase shift a single-direction pass would introduce.
    pub fn apply(&self, samples: &[f64]) -> Result<Vec<f64>, DspError> {
        let forward = self.run_once(samples)?;
        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.run_once(&reversed)?;
        Ok(backward.into_iter().rev().collect())
    }
}

/// Subtracts the best-fit line from the window in place.
pub fn detrend(samples: &mut [f64]) {
    let n = samples.len();
    if n < 2 {
        return;
    }
    let n_f = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = samples.iter().sum();
    let sum_xx: f64 = (0..n).map(|i| (i as f64).powi(2)).sum();
    let sum_xy: f64 = samples.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();

    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return;
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;

    for (i, y) in samples.iter_mut().enumerate() {
        *y -= slope * i as f64 + intercept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detrend_removes_linear_ramp() {
        let mut samples: Vec<f64> = (0..100).map(|i| i as f64 * 2.0 + 5.0).collect();
        detrend(&mut samples);
        let max_abs = samples.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        approx::assert_relative_eq!(max_abs, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn detrend_preserves_length() {
        let mut samples = vec![1.0, 3.0, 2.0, 5.0, 4.0];
        let len_before = samples.len();
        detrend(&mut samples);
        assert_eq!(samples.len(), len_before);
    }

    #[test]
    fn bandpass_attenuates_out_of_band_dc_offset() {
        let fs = 250.0;
        let n = 250;
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                10.0 + 50.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin()
            })
            .collect();
        let cascade = ButterworthCascade::bandpass(fs, 4.0, 40.0);
        let out = cascade.apply(&samples).unwrap();
        let mean: f64 = out.iter().sum::<f64>() / out.len() as f64;
        assert!(mean.abs() < 3.0, "DC offset not attenuated: mean={mean}");
    }

    fn tone_rms(cascade: &ButterworthCascade, fs: f64, n: usize, tone_hz: f64) -> f64 {
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                (2.0 * std::f64::consts::PI * tone_hz * t).sin()
            })
            .collect();
        let out = cascade.apply(&samples).unwrap();
        // Trim edge transients before measuring steady-state amplitude.
        let steady = &out[n / 4..3 * n / 4];
        (steady.iter().map(|v| v * v).sum::<f64>() / steady.len() as f64).sqrt()
    }

    #[test]
    fn bandpass_passes_in_band_tone_and_attenuates_out_of_band_tones() {
        let fs = 250.0;
        let n = 1000;
        let cascade = ButterworthCascade::bandpass(fs, 4.0, 40.0);

        let in_band = tone_rms(&cascade, fs, n, 10.0);
        let below_band = tone_rms(&cascade, fs, n, 2.0);
        let above_band = tone_rms(&cascade, fs, n, 45.0);

        assert!(in_band > 0.3, "in-band 10 Hz tone over-attenuated: rms={in_band}");
        assert!(
            below_band < in_band * 0.5,
            "2 Hz tone not attenuated relative to passband: below={below_band} in_band={in_band}"
        );
        assert!(
            above_band < in_band * 0.5,
            "45 Hz tone not attenuated relative to passband: above={above_band} in_band={in_band}"
        );
    }
}
