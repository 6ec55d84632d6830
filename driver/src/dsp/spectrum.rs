use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::DspError;
use crate::types::{Band, Psd, BANDS, PSD_MAX_HZ};

/// Periodogram power spectral density of a single window, Hann-windowed, in
/// microvolts squared per Hz, truncated to frequencies up to `PSD_MAX_HZ`.
pub fn compute_psd(samples: &[f64], sample_rate_hz: f64) -> Result<Psd, DspError> {
    let n = samples.len();
    if n == 0 {
        return Err(DspError::Spectral("empty window".into()));
    }

    let window = apodize::hanning_iter(n).collect::<Vec<f64>>();
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    if window_power == 0.0 {
        return Err(DspError::Spectral("degenerate window".into()));
    }

    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| Complex::new(s * w, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft: Arc<dyn Fft<f64>> = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    // Scaling so that the PSD integrates (in the continuous-frequency sense) to
    // the windowed signal's power: 2 / (Fs * sum(window^2)) for one-sided spectra,
    // with the Nyquist/DC bins counted once.
    let scale = 2.0 / (sample_rate_hz * window_power);
    let half = n / 2 + 1;
    let freq_resolution = sample_rate_hz / n as f64;

    let mut freq = Vec::with_capacity(half);
    let mut power = Vec::with_capacity(half);
    for k in 0..half {
        let f = k as f64 * freq_resolution;
        if f > PSD_MAX_HZ {
            break;
        }
        let mag_sq = buffer[k].norm_sqr();
        let p = if k == 0 || (n % 2 == 0 && k == n / 2) {
            mag_sq * scale / 2.0
        } else {
            mag_sq * scale
        };
        freq.push(f);
        power.push(p);
    }

    Ok(Psd { freq, power })
}

/// Integrates a PSD over one band, left-closed/right-open, trapezoidal rule.
fn integrate_band(psd: &Psd, band: &Band, is_last: bool) -> f64 {
    let mut total = 0.0;
    for (i0, w) in psd.freq.windows(2).enumerate() {
        let (f0, f1) = (w[0], w[1]);
        let i1 = i0 + 1;
        let in_band = |f: f64| -> bool {
            if is_last {
                f >= band.low_hz && f <= band.high_hz
            } else {
                f >= band.low_hz && f < band.high_hz
            }
        };
        if !in_band(f0) && !in_band(f1) {
            continue;
        }
        // Trapezoid between f0 and f1, clipped to the band edges.
        let lo = f0.max(band.low_hz);
        let hi = f1.min(band.high_hz);
        if hi <= lo {
            continue;
        }
        let p0 = psd.power[i0];
        let p1 = psd.power[i1];
        // Linear interpolation of power at lo/hi within [f0,f1].
        let interp = |f: f64| -> f64 {
            if f1 == f0 {
                p0
            } else {
                p0 + (p1 - p0) * (f - f0) / (f1 - f0)
            }
        };
        let plo = interp(lo);
        let phi = interp(hi);
        total += (plo + phi) * (hi - lo) / 2.0;
    }
    total
}

/// Integrates the PSD into the six canonical band powers.
pub fn band_powers(psd: &Psd) -> crate::types::BandPowers {
    let mut out = crate::types::BandPowers::default();
    let slots = out.as_array_mut();
    for (i, band) in BANDS.iter().enumerate() {
        let is_last = i == BANDS.len() - 1;
        *slots[i] = integrate_band(psd, band, is_last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_sine_alpha_dominant() {
        let fs = 250.0;
        let n = 250;
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                50.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin()
            })
            .collect();
        let psd = compute_psd(&samples, fs).unwrap();
        let bp = band_powers(&psd);
        assert!(bp.alpha > bp.sdelta * 10.0);
        assert!(bp.alpha > bp.fdelta * 10.0);
        assert!(bp.alpha > bp.theta * 10.0);
        assert!(bp.alpha > bp.sigma * 10.0);
        assert!(bp.alpha > bp.beta * 10.0);
    }

    #[test]
    fn psd_frequencies_capped_and_increasing() {
        let fs = 500.0;
        let n = 512;
        let samples: Vec<f64> = (0..n).map(|i| (i as f64 * 0.01).sin()).collect();
        let psd = compute_psd(&samples, fs).unwrap();
        assert!(psd.freq.iter().all(|&f| f <= PSD_MAX_HZ));
        for w in psd.freq.windows(2) {
            assert!(w[1] > w[0]);
        }
    }
}
