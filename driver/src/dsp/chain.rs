use tracing::warn;

use crate::types::{ChannelSpec, PerChannel, ARTIFACT_THRESHOLD_UV};

use super::complexity::compute_complexity;
use super::filters::{detrend, ButterworthCascade};
use super::spectrum::{band_powers, compute_psd};

/// Runs the nine-step DSP chain for one channel's raw epoch window and
/// produces the channel's feature record. Complexity-metric failures are
/// isolated: the whole complexity block is left empty and a warning logged,
/// while the rest of the record is still returned.
pub fn process_channel(
    channel: &ChannelSpec,
    raw: Vec<f64>,
    sample_rate_hz: f64,
) -> PerChannel {
    // Step 1: raw PSD, before any filtering.
    let fft_raw = compute_psd(&raw, sample_rate_hz).unwrap_or_default();

    // Step 2: linear detrend.
    let mut working = raw.clone();
    detrend(&mut working);

    // Step 3: bandpass 4-40 Hz.
    let bandpass = ButterworthCascade::bandpass(sample_rate_hz, 4.0, 40.0);
    let working = match bandpass.apply(&working) {
        Ok(v) => v,
        Err(e) => {
            warn!(channel = channel.index, error = %e, "bandpass filter failed, using detrended signal");
            working
        }
    };

    // Step 4: notch/bandstop 40-62 Hz.
    let bandstop = ButterworthCascade::bandstop(sample_rate_hz, 40.0, 62.0);
    let working = match bandstop.apply(&working) {
        Ok(v) => v,
        Err(e) => {
            warn!(channel = channel.index, error = %e, "notch filter failed, using bandpassed signal");
            working
        }
    };

    // Step 5: sub-4 Hz stopband cleanup.
    let stopband_low = ButterworthCascade::highpass_stopband(sample_rate_hz, 4.0);
    let filtered = match stopband_low.apply(&working) {
        Ok(v) => v,
        Err(e) => {
            warn!(channel = channel.index, error = %e, "low-frequency cleanup filter failed, using notched signal");
            working
        }
    };

    // Step 6: filtered PSD.
    let fft_filtered = compute_psd(&filtered, sample_rate_hz).unwrap_or_default();

    // Step 7: band powers from the filtered PSD.
    let powers = band_powers(&fft_filtered);

    // Step 8: threshold scan.
    let over_threshold_indices: Vec<usize> = filtered
        .iter()
        .enumerate()
        .filter(|(_, &v)| v.abs() > ARTIFACT_THRESHOLD_UV)
        .map(|(i, _)| i)
        .collect();

    // Step 9: complexity block, isolated failure.
    let complexity = match compute_complexity(&filtered, sample_rate_hz, channel.index) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(channel = channel.index, error = %e, "complexity metrics failed, leaving block empty");
            None
        }
    };

    PerChannel {
        channel_idx: channel.index,
        channel_name: channel.name.clone(),
        raw,
        filtered,
        fft_raw,
        fft_filtered,
        band_powers: powers,
        over_threshold_indices,
        complexity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_and_filtered_lengths_match_input() {
        let ch = ChannelSpec { index: 0, name: "Fp1".into() };
        let raw: Vec<f64> = (0..250).map(|i| (i as f64 * 0.1).sin() * 40.0).collect();
        let n = raw.len();
        let rec = process_channel(&ch, raw, 250.0);
        assert_eq!(rec.raw.len(), n);
        assert_eq!(rec.filtered.len(), n);
    }

    #[test]
    fn threshold_indices_match_magnitude_rule() {
        let ch = ChannelSpec { index: 0, name: "Cz".into() };
        let mut raw = vec![0.0; 250];
        raw[100] = 80.0;
        raw[200] = -80.0;
        let rec = process_channel(&ch, raw, 250.0);
        for &i in &rec.over_threshold_indices {
            assert!(rec.filtered[i].abs() > ARTIFACT_THRESHOLD_UV);
        }
        for i in 0..rec.filtered.len() {
            if !rec.over_threshold_indices.contains(&i) {
                assert!(rec.filtered[i].abs() <= ARTIFACT_THRESHOLD_UV);
            }
        }
    }
}
