//! Noise generation for thermal and clock-phase modeling
//!
//! White Gaussian noise, 1/f^alpha colored noise shaped by an all-pole
//! filter, and the weighted-sum clock model that produces oscillator phase
//! noise sample streams.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rand_distr::StandardNormal;

use crate::signal_processing::ArFilter;

/// Boltzmann's constant in J/K
pub const BOLTZMANN_K: f64 = 1.3806503e-23;

/// Noise power from temperature and bandwidth: k_B * T * B
pub fn noise_temperature_to_power(temperature: f64, bandwidth: f64) -> f64 {
    BOLTZMANN_K * temperature * bandwidth
}

/// White Gaussian noise with a fixed standard deviation.
/// A zero deviation yields a deterministic zero without consuming
/// generator state.
#[derive(Debug, Clone, Copy)]
pub struct WgnGenerator {
    stddev: f64,
}

impl WgnGenerator {
    pub fn new(stddev: f64) -> Self {
        Self { stddev }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.stddev <= f64::EPSILON {
            return 0.0;
        }
        let normal: f64 = rng.sample(StandardNormal);
        normal * self.stddev
    }
}

/// Kasdin's recursion for the AR coefficients that shape white noise to a
/// 1/f^alpha spectrum: a[0] = 1, a[k] = a[k-1] * (k - 1 - alpha/2) / k
fn kasdin_coefficients(alpha: f64, order: usize) -> Vec<f64> {
    let mut coeffs = Vec::with_capacity(order);
    coeffs.push(1.0);
    for k in 1..order {
        let prev = coeffs[k - 1];
        coeffs.push(prev * (k as f64 - 1.0 - alpha / 2.0) / k as f64);
    }
    coeffs
}

const FALPHA_BLOCK_SIZE: usize = 1024;

/// Lazy infinite stream of 1/f^alpha noise.
///
/// White Gaussian samples drive an all-pole filter whose coefficients come
/// from Kasdin's recursion. Samples are produced in blocks to amortize the
/// filter cost. The filter is pre-run for one full memory length at
/// construction so the startup transient never reaches a consumer.
#[derive(Debug, Clone)]
pub struct FAlphaGenerator {
    filter: ArFilter,
    weight: f64,
    order: usize,
    rng: ChaCha12Rng,
    buffer: Vec<f64>,
    offset: usize,
}

impl FAlphaGenerator {
    pub fn new(alpha: f64, weight: f64, order: usize, seed: u64) -> Self {
        let mut generator = Self {
            filter: ArFilter::new(&kasdin_coefficients(alpha, order)),
            weight,
            order,
            rng: ChaCha12Rng::seed_from_u64(seed),
            buffer: Vec::new(),
            offset: 0,
        };
        generator.settle();
        generator
    }

    /// Run the filter to steady state, discarding the output
    fn settle(&mut self) {
        for _ in 0..self.order {
            let white: f64 = self.rng.sample(StandardNormal);
            self.filter.filter(white);
        }
    }

    fn refill(&mut self) {
        self.buffer.clear();
        for _ in 0..FALPHA_BLOCK_SIZE {
            let white: f64 = self.rng.sample(StandardNormal);
            self.buffer.push(self.filter.filter(white) * self.weight);
        }
        self.offset = 0;
    }

    pub fn next_sample(&mut self) -> f64 {
        if self.offset >= self.buffer.len() {
            self.refill();
        }
        let sample = self.buffer[self.offset];
        self.offset += 1;
        sample
    }

    /// Clear the filter state and re-settle; the random stream continues
    pub fn reset(&mut self) {
        self.filter.reset();
        self.buffer.clear();
        self.offset = 0;
        self.settle();
    }
}

/// One (alpha, weight) entry of a clock model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseEntry {
    pub alpha: f64,
    pub weight: f64,
}

/// Linear trend superimposed on the noise sum, bridging inter-pulse phase
/// drift for pulsed clock models
#[derive(Debug, Clone, Copy)]
pub struct Trend {
    pub start: f64,
    pub end: f64,
    pub length: usize,
}

const CLOCK_MODEL_ORDER: usize = 1024;

/// Weighted sum of 1/f^alpha generators modeling oscillator phase noise
#[derive(Debug, Clone)]
pub struct ClockModelGenerator {
    generators: Vec<FAlphaGenerator>,
    trend: Option<Trend>,
    pregenerated: Option<Vec<f64>>,
    count: usize,
}

impl ClockModelGenerator {
    /// Build a generator from clock-model entries. Each component generator
    /// draws a seed from the provided engine, in entry order.
    pub fn new(
        entries: &[NoiseEntry],
        rng: &mut ChaCha12Rng,
        trend: Option<Trend>,
        trend_remove: bool,
    ) -> Self {
        let generators: Vec<FAlphaGenerator> = entries
            .iter()
            .map(|entry| FAlphaGenerator::new(entry.alpha, entry.weight, CLOCK_MODEL_ORDER, rng.gen()))
            .collect();
        let mut model = Self {
            generators,
            trend,
            pregenerated: None,
            count: 0,
        };
        if trend_remove {
            if let Some(trend) = trend {
                // Removing the cumulative trend needs the whole pulse up
                // front: generate it, then subtract the line through the
                // endpoints.
                let mut block: Vec<f64> = (0..trend.length).map(|_| model.raw_sample()).collect();
                if block.len() > 1 {
                    let first = block[0];
                    let last = block[block.len() - 1];
                    let span = (block.len() - 1) as f64;
                    for (i, sample) in block.iter_mut().enumerate() {
                        *sample -= first + (last - first) * i as f64 / span;
                    }
                }
                model.pregenerated = Some(block);
                model.count = 0;
            }
        }
        model
    }

    fn raw_sample(&mut self) -> f64 {
        let mut sample: f64 = self.generators.iter_mut().map(|g| g.next_sample()).sum();
        if let Some(trend) = self.trend {
            if trend.length > 0 {
                let frac = self.count as f64 / trend.length as f64;
                sample += trend.start + (trend.end - trend.start) * frac;
            }
        }
        self.count += 1;
        sample
    }

    pub fn next_sample(&mut self) -> f64 {
        if let Some(block) = &self.pregenerated {
            let sample = block.get(self.count).copied().unwrap_or(0.0);
            self.count += 1;
            return sample;
        }
        self.raw_sample()
    }

    pub fn skip_samples(&mut self, count: usize) {
        for _ in 0..count {
            self.next_sample();
        }
    }

    /// Reset the phase state of every component generator. Random streams
    /// continue; only the filter memory is cleared.
    pub fn reset(&mut self) {
        for generator in &mut self.generators {
            generator.reset();
        }
        self.count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty() && self.pregenerated.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_processing::spectrum::{log_log_slope, psd_real};
    use rand::SeedableRng;

    #[test]
    fn wgn_zero_stddev_is_deterministic_zero() {
        let gen = WgnGenerator::new(0.0);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(gen.sample(&mut rng), 0.0);
        }
    }

    #[test]
    fn wgn_sample_statistics() {
        let gen = WgnGenerator::new(2.0);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let n = 100_000;
        let samples: Vec<f64> = (0..n).map(|_| gen.sample(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 4.0).abs() < 0.1);
    }

    #[test]
    fn kasdin_coefficients_recursion() {
        let coeffs = kasdin_coefficients(2.0, 4);
        assert_eq!(coeffs[0], 1.0);
        assert_eq!(coeffs[1], -1.0);
        assert_eq!(coeffs[2], 0.0);
        assert_eq!(coeffs[3], 0.0);
    }

    #[test]
    fn falpha_spectrum_has_expected_slope() {
        // alpha = 2 (random walk): spectral exponent -2.
        let mut gen = FAlphaGenerator::new(2.0, 1.0, 512, 42);
        let samples: Vec<f64> = (0..1 << 16).map(|_| gen.next_sample()).collect();
        let psd = psd_real(&samples, 4096);
        let slope = log_log_slope(&psd, 8, 800);
        assert!(
            (slope + 2.0).abs() < 0.3,
            "spectral exponent {slope}, expected -2"
        );
    }

    #[test]
    fn falpha_streams_reproducible_for_seed() {
        let mut a = FAlphaGenerator::new(1.0, 1.0, 128, 9);
        let mut b = FAlphaGenerator::new(1.0, 1.0, 128, 9);
        for _ in 0..3000 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn clock_model_trend_removal_zeroes_endpoints() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let entries = [NoiseEntry {
            alpha: 2.0,
            weight: 1.0,
        }];
        let trend = Trend {
            start: 0.5,
            end: 2.5,
            length: 512,
        };
        let mut model = ClockModelGenerator::new(&entries, &mut rng, Some(trend), true);
        let samples: Vec<f64> = (0..512).map(|_| model.next_sample()).collect();
        assert!(samples[0].abs() < 1e-12);
        assert!(samples[511].abs() < 1e-12);
    }

    #[test]
    fn clock_model_sums_component_weights() {
        let mut rng_pair = ChaCha12Rng::seed_from_u64(11);
        let entries = [
            NoiseEntry {
                alpha: 0.0,
                weight: 1.0,
            },
            NoiseEntry {
                alpha: 0.0,
                weight: 2.0,
            },
        ];
        let mut model = ClockModelGenerator::new(&entries, &mut rng_pair, None, false);

        let mut rng_same = ChaCha12Rng::seed_from_u64(11);
        let mut g1 = FAlphaGenerator::new(0.0, 1.0, CLOCK_MODEL_ORDER, rng_same.gen());
        let mut g2 = FAlphaGenerator::new(0.0, 2.0, CLOCK_MODEL_ORDER, rng_same.gen());
        for _ in 0..100 {
            let expected = g1.next_sample() + g2.next_sample();
            assert_eq!(model.next_sample(), expected);
        }
    }

    #[test]
    fn skip_samples_advances_stream() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let entries = [NoiseEntry {
            alpha: 1.0,
            weight: 1.0,
        }];
        let mut a = ClockModelGenerator::new(&entries, &mut rng, None, false);
        let mut rng2 = ChaCha12Rng::seed_from_u64(5);
        let mut b = ClockModelGenerator::new(&entries, &mut rng2, None, false);
        b.skip_samples(10);
        for _ in 0..10 {
            a.next_sample();
        }
        assert_eq!(a.next_sample(), b.next_sample());
    }
}
