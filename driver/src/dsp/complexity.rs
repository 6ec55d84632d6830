//! Entropy and fractal-dimension complexity metrics. No crate in this
//! workspace's dependency stack implements these, so they are hand-written
//! against their standard definitions.

use crate::error::DspError;
use crate::types::ComplexityMetrics;

use super::spectrum::compute_psd;

/// Computes the full closed set of complexity metrics for one channel's
/// filtered window. Per the Design Notes, a failure in any single metric
/// discards the whole block for this channel rather than a partial result.
/// `channel` is carried only so that a failing metric's [`DspError`]
/// reports the channel that actually failed.
pub fn compute_complexity(
    filtered: &[f64],
    sample_rate_hz: f64,
    channel: usize,
) -> Result<ComplexityMetrics, DspError> {
    Ok(ComplexityMetrics {
        permutation_entropy: permutation_entropy(filtered, 3, 1, channel)?,
        spectral_entropy: spectral_entropy(filtered, sample_rate_hz)?,
        svd_entropy: svd_entropy(filtered, 10, channel)?,
        approximate_entropy: approximate_entropy(filtered, 2, 0.2 * stddev(filtered), channel)?,
        sample_entropy: sample_entropy(filtered, 2, 0.2 * stddev(filtered), channel)?,
        hjorth_mobility: hjorth_mobility(filtered),
        hjorth_complexity: hjorth_complexity(filtered),
        num_zero_crossings: num_zero_crossings(filtered) as f64,
        petrosian_fd: petrosian_fd(filtered),
        katz_fd: katz_fd(filtered),
        higuchi_fd: higuchi_fd(filtered, 8, channel)?,
        detrended_fluctuation_analysis: dfa(filtered, channel)?,
    })
}

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

fn stddev(x: &[f64]) -> f64 {
    let m = mean(x);
    (x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / x.len() as f64).sqrt()
}

fn diff(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Variance of a series; 0 for a constant series.
fn variance(x: &[f64]) -> f64 {
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / x.len() as f64
}

fn hjorth_mobility(x: &[f64]) -> f64 {
    let v0 = variance(x);
    if v0 == 0.0 {
        return 0.0;
    }
    let d1 = diff(x);
    (variance(&d1) / v0).sqrt()
}

fn hjorth_complexity(x: &[f64]) -> f64 {
    let d1 = diff(x);
    if d1.len() < 2 {
        return 0.0;
    }
    let m0 = hjorth_mobility(x);
    if m0 == 0.0 {
        return 0.0;
    }
    hjorth_mobility(&d1) / m0
}

fn num_zero_crossings(x: &[f64]) -> usize {
    x.windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count()
}

/// Petrosian fractal dimension, based on sign changes in the first derivative.
fn petrosian_fd(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.len() < 3 {
        return 0.0;
    }
    let d = diff(x);
    let n_delta = d.windows(2).filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0)).count() as f64;
    if n_delta == 0.0 {
        return 0.0;
    }
    n.log10() / (n.log10() + (n / (n + 0.4 * n_delta)).log10())
}

/// Katz fractal dimension.
fn katz_fd(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let l: f64 = x.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    let d = x
        .iter()
        .skip(1)
        .map(|&v| (v - x[0]).abs())
        .fold(0.0_f64, f64::max);
    if l == 0.0 || d == 0.0 {
        return 0.0;
    }
    let n_f = (n - 1) as f64;
    let a = n_f.log10();
    a / (a + (d / l).log10())
}

/// Higuchi fractal dimension, average curve length across `k_max` scales.
fn higuchi_fd(x: &[f64], k_max: usize, channel: usize) -> Result<f64, DspError> {
    let n = x.len();
    if n < k_max * 2 {
        return Err(DspError::Complexity {
            metric: "higuchi_fd",
            channel,
            reason: "window too short for k_max".into(),
        });
    }
    let mut log_lk = Vec::with_capacity(k_max);
    let mut log_k = Vec::with_capacity(k_max);
    for k in 1..=k_max {
        let mut lk_sum = 0.0;
        for m in 0..k {
            let count = (n - m - 1) / k;
            if count == 0 {
                continue;
            }
            let mut length = 0.0;
            for i in 1..=count {
                length += (x[m + i * k] - x[m + (i - 1) * k]).abs();
            }
            let norm = (n as f64 - 1.0) / (count as f64 * k as f64);
            lk_sum += length * norm / k as f64;
        }
        let lk = lk_sum / k as f64;
        if lk > 0.0 {
            log_lk.push(lk.ln());
            log_k.push((1.0 / k as f64).ln());
        }
    }
    Ok(linear_regression_slope(&log_k, &log_lk))
}

fn linear_regression_slope(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let n = x.len() as f64;
    let mx = mean(x);
    let my = mean(y);
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..x.len() {
        num += (x[i] - mx) * (y[i] - my);
        den += (x[i] - mx).powi(2);
    }
    if den.abs() < f64::EPSILON {
        return 0.0;
    }
    let _ = n;
    num / den
}

/// Detrended fluctuation analysis exponent.
fn dfa(x: &[f64], channel: usize) -> Result<f64, DspError> {
    let n = x.len();
    if n < 16 {
        return Err(DspError::Complexity {
            metric: "detrended_fluctuation_analysis",
            channel,
            reason: "window too short".into(),
        });
    }
    let m = mean(x);
    let mut profile = Vec::with_capacity(n);
    let mut acc = 0.0;
    for &v in x {
        acc += v - m;
        profile.push(acc);
    }

    let min_box = 4usize;
    let max_box = n / 4;
    if max_box < min_box {
        return Err(DspError::Complexity {
            metric: "detrended_fluctuation_analysis",
            channel,
            reason: "window too short for box range".into(),
        });
    }

    let mut log_n = Vec::new();
    let mut log_f = Vec::new();
    let mut box_size = min_box;
    while box_size <= max_box {
        let num_boxes = n / box_size;
        if num_boxes == 0 {
            box_size += 1;
            continue;
        }
        let mut total_sq = 0.0;
        for b in 0..num_boxes {
            let start = b * box_size;
            let segment = &profile[start..start + box_size];
            let mut seg_x = Vec::with_capacity(box_size);
            for i in 0..box_size {
                seg_x.push(i as f64);
            }
            let slope = linear_regression_slope(&seg_x, segment);
            let intercept = mean(segment) - slope * mean(&seg_x);
            for (i, &v) in segment.iter().enumerate() {
                let fit = slope * i as f64 + intercept;
                total_sq += (v - fit).powi(2);
            }
        }
        let rms = (total_sq / (num_boxes * box_size) as f64).sqrt();
        if rms > 0.0 {
            log_n.push((box_size as f64).ln());
            log_f.push(rms.ln());
        }
        box_size += (box_size / 4).max(1);
    }

    Ok(linear_regression_slope(&log_n, &log_f))
}

/// Shannon entropy of the distribution of ordinal patterns of length `order`.
fn permutation_entropy(x: &[f64], order: usize, delay: usize, channel: usize) -> Result<f64, DspError> {
    if x.len() < order * delay {
        return Err(DspError::Complexity {
            metric: "permutation_entropy",
            channel,
            reason: "window too short for embedding order".into(),
        });
    }
    use std::collections::HashMap;
    let mut counts: HashMap<Vec<usize>, u64> = HashMap::new();
    let n_vectors = x.len() - (order - 1) * delay;
    for i in 0..n_vectors {
        let mut window: Vec<(f64, usize)> = (0..order)
            .map(|j| (x[i + j * delay], j))
            .collect();
        window.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let pattern: Vec<usize> = window.iter().map(|&(_, idx)| idx).collect();
        *counts.entry(pattern).or_insert(0) += 1;
    }
    let total = n_vectors as f64;
    let mut h = 0.0;
    for &count in counts.values() {
        let p = count as f64 / total;
        h -= p * p.ln();
    }
    let max_h = factorial(order).ln();
    Ok(if max_h > 0.0 { h / max_h } else { 0.0 })
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, v| acc * v as f64)
}

/// Shannon entropy of the normalized power spectral density (Welch-based).
fn spectral_entropy(x: &[f64], sample_rate_hz: f64) -> Result<f64, DspError> {
    let psd = compute_psd(x, sample_rate_hz)?;
    let total: f64 = psd.power.iter().sum();
    if total <= 0.0 {
        return Ok(0.0);
    }
    let mut h = 0.0;
    for &p in &psd.power {
        if p > 0.0 {
            let pn = p / total;
            h -= pn * pn.ln();
        }
    }
    let max_h = (psd.power.len() as f64).ln();
    Ok(if max_h > 0.0 { h / max_h } else { 0.0 })
}

/// Normalized singular value decomposition entropy of the time-delay
/// embedding matrix, via the embedding's Gram matrix eigenvalues.
fn svd_entropy(x: &[f64], order: usize, channel: usize) -> Result<f64, DspError> {
    if x.len() <= order {
        return Err(DspError::Complexity {
            metric: "svd_entropy",
            channel,
            reason: "window too short for embedding order".into(),
        });
    }
    let rows = x.len() - order + 1;
    let mut embedding = vec![vec![0.0; order]; rows];
    for i in 0..rows {
        for j in 0..order {
            embedding[i][j] = x[i + j];
        }
    }
    // order x order Gram matrix (columns-wise inner products).
    let mut gram = vec![vec![0.0; order]; order];
    for a in 0..order {
        for b in 0..order {
            let mut s = 0.0;
            for row in &embedding {
                s += row[a] * row[b];
            }
            gram[a][b] = s;
        }
    }
    let eigenvalues = symmetric_eigenvalues_jacobi(gram);
    let total: f64 = eigenvalues.iter().map(|v| v.abs()).sum();
    if total <= 0.0 {
        return Ok(0.0);
    }
    let mut h = 0.0;
    for &lambda in &eigenvalues {
        let p = lambda.abs() / total;
        if p > 0.0 {
            h -= p * p.ln();
        }
    }
    let max_h = (eigenvalues.len() as f64).ln();
    Ok(if max_h > 0.0 { h / max_h } else { 0.0 })
}

/// Jacobi eigenvalue algorithm for small symmetric matrices (order <= ~16).
fn symmetric_eigenvalues_jacobi(mut a: Vec<Vec<f64>>) -> Vec<f64> {
    let n = a.len();
    for _ in 0..100 {
        let mut off_max = 0.0;
        let (mut p, mut q) = (0, 1);
        for i in 0..n {
            for j in (i + 1)..n {
                if a[i][j].abs() > off_max {
                    off_max = a[i][j].abs();
                    p = i;
                    q = j;
                }
            }
        }
        if off_max < 1e-10 {
            break;
        }
        let theta = if (a[p][p] - a[q][q]).abs() < f64::EPSILON {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * ((2.0 * a[p][q]) / (a[p][p] - a[q][q])).atan()
        };
        let (c, s) = (theta.cos(), theta.sin());
        let mut new_a = a.clone();
        for i in 0..n {
            new_a[i][p] = c * a[i][p] + s * a[i][q];
            new_a[i][q] = -s * a[i][p] + c * a[i][q];
        }
        let temp = new_a.clone();
        for j in 0..n {
            new_a[p][j] = c * temp[p][j] + s * temp[q][j];
            new_a[q][j] = -s * temp[p][j] + c * temp[q][j];
        }
        a = new_a;
    }
    (0..n).map(|i| a[i][i]).collect()
}

/// Approximate entropy (ApEn) with embedding dimension `m` and tolerance `r`.
fn approximate_entropy(x: &[f64], m: usize, r: f64, channel: usize) -> Result<f64, DspError> {
    if r <= 0.0 || x.len() < m + 2 {
        return Err(DspError::Complexity {
            metric: "approximate_entropy",
            channel,
            reason: "degenerate tolerance or window too short".into(),
        });
    }
    Ok((phi(x, m, r) - phi(x, m + 1, r)).abs())
}

fn phi(x: &[f64], m: usize, r: f64) -> f64 {
    let n = x.len();
    let count = n - m + 1;
    if count == 0 {
        return 0.0;
    }
    let templates: Vec<&[f64]> = (0..count).map(|i| &x[i..i + m]).collect();
    let mut sum = 0.0;
    for t_i in &templates {
        let matches = templates
            .iter()
            .filter(|t_j| chebyshev_distance(t_i, t_j) <= r)
            .count();
        sum += (matches as f64 / count as f64).ln();
    }
    sum / count as f64
}

fn chebyshev_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max)
}

/// Sample entropy (SampEn), a bias-corrected variant of approximate entropy.
fn sample_entropy(x: &[f64], m: usize, r: f64, channel: usize) -> Result<f64, DspError> {
    if r <= 0.0 || x.len() < m + 2 {
        return Err(DspError::Complexity {
            metric: "sample_entropy",
            channel,
            reason: "degenerate tolerance or window too short".into(),
        });
    }
    let count_matches = |len: usize| -> u64 {
        let n = x.len();
        let templates: Vec<&[f64]> = (0..=n - len).map(|i| &x[i..i + len]).collect();
        let mut total = 0u64;
        for i in 0..templates.len() {
            for j in 0..templates.len() {
                if i != j && chebyshev_distance(templates[i], templates[j]) <= r {
                    total += 1;
                }
            }
        }
        total
    };
    let b = count_matches(m) as f64;
    let a = count_matches(m + 1) as f64;
    if b == 0.0 || a == 0.0 {
        return Err(DspError::Complexity {
            metric: "sample_entropy",
            channel,
            reason: "no template matches found".into(),
        });
    }
    Ok(-(a / b).ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_zero_signal_has_zero_permutation_entropy() {
        let x = vec![0.0; 100];
        // A constant series has only one ordinal pattern -> zero entropy,
        // but the tie-breaking sort still needs at least `order*delay` points.
        let h = permutation_entropy(&x, 3, 1, 0).unwrap();
        assert!(h.abs() < 1e-9);
    }

    #[test]
    fn flat_zero_signal_has_no_zero_crossings_past_first() {
        let x = vec![0.0; 50];
        // every sample is >= 0.0 so no sign flips are observed
        assert_eq!(num_zero_crossings(&x), 0);
    }

    #[test]
    fn hjorth_mobility_zero_for_constant_signal() {
        let x = vec![3.0; 50];
        assert_eq!(hjorth_mobility(&x), 0.0);
    }

    #[test]
    fn katz_fd_positive_for_noisy_signal() {
        let x: Vec<f64> = (0..200)
            .map(|i| (i as f64 * 0.3).sin() + (i as f64 * 1.7).sin() * 0.3)
            .collect();
        let fd = katz_fd(&x);
        assert!(fd > 0.0);
    }

    #[test]
    fn higuchi_fd_runs_on_sine() {
        let x: Vec<f64> = (0..200).map(|i| (i as f64 * 0.1).sin()).collect();
        let fd = higuchi_fd(&x, 8, 0).unwrap();
        assert!(fd.is_finite());
    }

    #[test]
    fn dfa_runs_on_noisy_signal() {
        let x: Vec<f64> = (0..300)
            .map(|i| (i as f64 * 0.05).sin() + (i as f64 * 0.01))
            .collect();
        let exponent = dfa(&x, 0).unwrap();
        assert!(exponent.is_finite());
    }

    #[test]
    fn complexity_error_reports_the_failing_channel() {
        let x = vec![0.0; 2]; // too short for any embedding order
        let err = higuchi_fd(&x, 8, 3).unwrap_err();
        assert!(err.to_string().contains("channel 3"), "got: {err}");
    }

    #[test]
    fn compute_complexity_succeeds_on_realistic_window() {
        let fs = 250.0;
        let x: Vec<f64> = (0..250)
            .map(|i| {
                let t = i as f64 / fs;
                20.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin()
            })
            .collect();
        let metrics = compute_complexity(&x, fs, 0).unwrap();
        assert!(metrics.permutation_entropy >= 0.0);
        assert!(metrics.spectral_entropy >= 0.0);
    }
}
