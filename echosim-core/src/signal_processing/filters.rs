//! Shared filter implementations for signal processing
//!
//! IIR (Direct Form II), FIR tapped-delay-line, and all-pole AR filters, plus
//! the windowed-sinc design helpers used by the resamplers.

use std::f64::consts::PI;

use num_complex::Complex64;

/// sin(pi x) / (pi x)
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    (x * PI).sin() / (x * PI)
}

/// Design a lowpass FIR with the Blackman window at the given normalized
/// cutoff. Blackman trades rolloff for deep stopband attenuation
/// (equivalent Kaiser beta of roughly 7).
pub fn blackman_fir(cutoff: f64, length: usize) -> Vec<f64> {
    let n = length as f64 / 2.0;
    (0..length)
        .map(|i| {
            let filt = sinc(cutoff * (i as f64 - n));
            let window = 0.42 - 0.5 * (PI * i as f64 / n).cos() + 0.08 * (2.0 * PI * i as f64 / n).cos();
            filt * window
        })
        .collect()
}

/// Infinite impulse response filter in Direct Form II
#[derive(Debug, Clone)]
pub struct IirFilter {
    a: Vec<f64>,
    b: Vec<f64>,
    w: Vec<f64>,
}

impl IirFilter {
    /// Denominator and numerator must have the same length; mixed-order
    /// filters are not supported.
    pub fn new(den: &[f64], num: &[f64]) -> Self {
        assert_eq!(den.len(), num.len(), "IirFilter requires equal-order coefficients");
        Self {
            a: den.to_vec(),
            b: num.to_vec(),
            w: vec![0.0; den.len()],
        }
    }

    pub fn filter(&mut self, sample: f64) -> f64 {
        let order = self.a.len();
        for j in (1..order).rev() {
            self.w[j] = self.w[j - 1];
        }
        self.w[0] = sample;
        for j in 1..order {
            self.w[0] -= self.a[j] * self.w[j];
        }
        let mut out = 0.0;
        for j in 0..order {
            out += self.b[j] * self.w[j];
        }
        out
    }

    pub fn filter_in_place(&mut self, samples: &mut [f64]) {
        for sample in samples.iter_mut() {
            *sample = self.filter(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.w.fill(0.0);
    }
}

/// All-pole autoregressive filter: the denominator-only special case used by
/// the colored-noise shaping generator
#[derive(Debug, Clone)]
pub struct ArFilter {
    coeffs: Vec<f64>,
    w: Vec<f64>,
}

impl ArFilter {
    pub fn new(coeffs: &[f64]) -> Self {
        Self {
            coeffs: coeffs.to_vec(),
            w: vec![0.0; coeffs.len()],
        }
    }

    pub fn filter(&mut self, sample: f64) -> f64 {
        let order = self.coeffs.len();
        for j in (1..order).rev() {
            self.w[j] = self.w[j - 1];
        }
        self.w[0] = sample;
        for j in 1..order {
            self.w[0] -= self.coeffs[j] * self.w[j];
        }
        self.w[0]
    }

    pub fn reset(&mut self) {
        self.w.fill(0.0);
    }
}

/// Finite impulse response filter with real coefficients
#[derive(Debug, Clone)]
pub struct FirFilter {
    coeffs: Vec<f64>,
}

impl FirFilter {
    pub fn new(coeffs: &[f64]) -> Self {
        Self {
            coeffs: coeffs.to_vec(),
        }
    }

    pub fn order(&self) -> usize {
        self.coeffs.len()
    }

    /// Convolve real samples in place through a tapped delay line
    pub fn filter_in_place(&self, samples: &mut [f64]) {
        let order = self.coeffs.len();
        let mut line = vec![0.0f64; order];
        for sample in samples.iter_mut() {
            line[0] = *sample;
            let mut acc = 0.0;
            for (j, &c) in self.coeffs.iter().enumerate() {
                acc += line[order - j - 1] * c;
            }
            *sample = acc;
            for j in (1..order).rev() {
                line[j] = line[j - 1];
            }
        }
    }

    /// Complex-sample variant of the delay line
    pub fn filter_complex_in_place(&self, samples: &mut [Complex64]) {
        let order = self.coeffs.len();
        let mut line = vec![Complex64::new(0.0, 0.0); order];
        for sample in samples.iter_mut() {
            line[0] = *sample;
            let mut acc = Complex64::new(0.0, 0.0);
            for (j, &c) in self.coeffs.iter().enumerate() {
                acc += line[order - j - 1] * c;
            }
            *sample = acc;
            for j in (1..order).rev() {
                line[j] = line[j - 1];
            }
        }
    }
}
