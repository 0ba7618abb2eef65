//! Integer-ratio rate conversion
//!
//! The upsampler is a polyphase interpolator: a single Hamming-windowed sinc
//! prototype evaluated one branch per output sample, with an input history
//! buffer so consecutive blocks splice seamlessly. The decimator applies a
//! Blackman anti-alias lowpass to a zero-padded copy of its input and keeps
//! every R-th sample.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::filters::{blackman_fir, sinc, FirFilter};

/// Polyphase upsampler for an integer ratio
#[derive(Debug, Clone)]
pub struct Upsampler {
    ratio: usize,
    filter_bank: Vec<f64>,
    history: Vec<Complex64>,
}

impl Upsampler {
    pub fn new(ratio: usize) -> Self {
        assert!(ratio >= 1, "upsample ratio must be at least 1");
        // 8 taps per branch gives adequate image rejection.
        let filter_size = 8 * ratio + 1;
        let filter_bank: Vec<f64> = (0..filter_size)
            .map(|i| {
                let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / filter_size as f64).cos();
                let filt = sinc((i as f64 - (filter_size / 2) as f64) / ratio as f64);
                filt * window
            })
            .collect();
        let history_len = filter_size / ratio + 1;
        Self {
            ratio,
            filter_bank,
            history: vec![Complex64::new(0.0, 0.0); history_len],
        }
    }

    pub fn ratio(&self) -> usize {
        self.ratio
    }

    fn input_sample(&self, samples: &[Complex64], n: isize) -> Complex64 {
        if n >= 0 {
            samples[n as usize]
        } else {
            self.history[(self.history.len() as isize + n) as usize]
        }
    }

    /// Upsample one block. Output length is ratio * input length; successive
    /// calls continue from the retained input history.
    pub fn upsample(&mut self, samples: &[Complex64]) -> Vec<Complex64> {
        let out_len = samples.len() * self.ratio;
        let mut out = vec![Complex64::new(0.0, 0.0); out_len];
        for (i, slot) in out.iter_mut().enumerate() {
            let branch = i % self.ratio;
            let mut acc = Complex64::new(0.0, 0.0);
            let mut j = branch;
            while j < self.filter_bank.len() {
                let idx = i as isize / self.ratio as isize - (j / self.ratio) as isize;
                acc += self.input_sample(samples, idx) * self.filter_bank[j];
                j += self.ratio;
            }
            *slot = acc;
        }
        // Carry the tail of this block into the history for the next call.
        let transfer = self.history.len();
        if samples.len() >= transfer {
            self.history.copy_from_slice(&samples[samples.len() - transfer..]);
        } else {
            self.history.rotate_left(samples.len());
            let keep = transfer - samples.len();
            self.history[keep..].copy_from_slice(samples);
        }
        out
    }
}

/// Anti-alias lowpass and decimate by an integer ratio, scaling by 1/ratio.
/// Used to bring an oversampled receive window back to the output rate.
pub fn downsample(samples: &[Complex64], ratio: usize, filter_length: usize) -> Vec<Complex64> {
    assert!(ratio >= 1);
    if ratio == 1 {
        return samples.to_vec();
    }
    // Double the render filter length for a faster rolloff than the
    // interpolation kernel.
    let filt_length = filter_length * 2;
    let coeffs = blackman_fir(1.0 / ratio as f64, filt_length);
    let filt = FirFilter::new(&coeffs);

    let mut padded = samples.to_vec();
    padded.resize(samples.len() + filt_length, Complex64::new(0.0, 0.0));
    filt.filter_complex_in_place(&mut padded);

    (0..samples.len() / ratio)
        .map(|i| padded[i * ratio + filt_length / 2] / ratio as f64)
        .collect()
}
