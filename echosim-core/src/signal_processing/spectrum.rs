//! Power spectral density estimation using FFT
//!
//! Welch-style averaged periodogram with a Hann window and 50% overlap.
//! The spectral validation tests (colored-noise slope, resampler imaging)
//! are built on this estimator.

use num_complex::Complex64;
use rustfft::{num_complex::Complex, FftPlanner};

/// Averaged one-sided periodogram of a real-valued sequence.
///
/// Returns `segment_len / 2` linear-power bins; bin k is centered at
/// frequency `k * sample_rate / segment_len`. Relative calibration only:
/// slope fitting and peak finding do not need absolute units.
pub fn psd_real(samples: &[f64], segment_len: usize) -> Vec<f64> {
    let buffer: Vec<Complex64> = samples.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let full = psd_complex(&buffer, segment_len);
    full[..segment_len / 2].to_vec()
}

/// Averaged periodogram of a complex sequence, full `segment_len` bins in
/// FFT order (DC first, negative frequencies in the upper half)
pub fn psd_complex(samples: &[Complex64], segment_len: usize) -> Vec<f64> {
    assert!(segment_len.is_power_of_two(), "segment length must be a power of two");
    if samples.len() < segment_len {
        return vec![0.0; segment_len];
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(segment_len);

    let window: Vec<f64> = (0..segment_len)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / segment_len as f64).cos())
        })
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum::<f64>() / segment_len as f64;

    let hop = segment_len / 2;
    let mut accum = vec![0.0f64; segment_len];
    let mut segments = 0usize;
    let mut start = 0usize;
    while start + segment_len <= samples.len() {
        let mut buffer: Vec<Complex<f64>> = (0..segment_len)
            .map(|i| {
                let s = samples[start + i];
                Complex::new(s.re * window[i], s.im * window[i])
            })
            .collect();
        fft.process(&mut buffer);
        for (acc, c) in accum.iter_mut().zip(buffer.iter()) {
            *acc += c.norm_sqr();
        }
        segments += 1;
        start += hop;
    }

    let scale = 1.0 / (segments as f64 * segment_len as f64 * window_power);
    accum.iter().map(|p| p * scale).collect()
}

/// Least-squares slope of log10(psd) against log10(frequency) over the bin
/// range [lo, hi). The result is the spectral exponent: -2 for 1/f^2 noise.
pub fn log_log_slope(psd: &[f64], lo: usize, hi: usize) -> f64 {
    let points: Vec<(f64, f64)> = (lo..hi.min(psd.len()))
        .filter(|&i| i > 0 && psd[i] > 0.0)
        .map(|i| ((i as f64).log10(), psd[i].log10()))
        .collect();
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();
    (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x)
}
