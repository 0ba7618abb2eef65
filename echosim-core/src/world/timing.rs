//! Clock models for radar timing sources
//!
//! A `PrototypeTiming` is a named, shareable description of a clock: nominal
//! frequency, deterministic or randomly-drawn frequency/phase offsets, and a
//! set of 1/f^alpha noise entries. Each radar materializes its own `Timing`
//! instance from a prototype; the instance owns its random engine and a
//! stateful phase-noise generator, so instances never share mutable state.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Normal};

use crate::noise::{ClockModelGenerator, NoiseEntry};

#[derive(Debug, Clone, Default)]
pub struct PrototypeTiming {
    name: String,
    frequency: f64,
    sync_on_pulse: bool,
    freq_offset: Option<f64>,
    phase_offset: Option<f64>,
    random_freq_offset_stdev: Option<f64>,
    random_phase_offset_stdev: Option<f64>,
    entries: Vec<NoiseEntry>,
}

impl PrototypeTiming {
    pub fn new(name: impl Into<String>, frequency: f64) -> Self {
        Self {
            name: name.into(),
            frequency,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_sync_on_pulse(&mut self, sync: bool) {
        self.sync_on_pulse = sync;
    }

    pub fn set_freq_offset(&mut self, offset: f64) {
        self.freq_offset = Some(offset);
    }

    pub fn set_phase_offset(&mut self, offset: f64) {
        self.phase_offset = Some(offset);
    }

    pub fn set_random_freq_offset(&mut self, stdev: f64) {
        self.random_freq_offset_stdev = Some(stdev);
    }

    pub fn set_random_phase_offset(&mut self, stdev: f64) {
        self.random_phase_offset_stdev = Some(stdev);
    }

    /// Add one (alpha, weight) colored-noise entry to the clock model
    pub fn add_noise_entry(&mut self, alpha: f64, weight: f64) {
        self.entries.push(NoiseEntry { alpha, weight });
    }

    pub fn entries(&self) -> &[NoiseEntry] {
        &self.entries
    }
}

/// Per-radar clock instance materialized from a prototype
#[derive(Debug)]
pub struct Timing {
    name: String,
    frequency: f64,
    sync_on_pulse: bool,
    freq_offset: f64,
    phase_offset: f64,
    entries: Vec<NoiseEntry>,
    model: Option<ClockModelGenerator>,
    clone_seed: u64,
}

impl Timing {
    /// Materialize an instance. Deterministic offsets are copied; random
    /// offsets are drawn once from the prototype's distributions. The
    /// engine driving the phase-noise generators and the seed reserved for
    /// thread-local clones both come from `seeder`, in a fixed order, so a
    /// given master seed reproduces every stream.
    pub fn from_prototype(proto: &PrototypeTiming, seeder: &mut ChaCha12Rng) -> Self {
        let mut rng = ChaCha12Rng::seed_from_u64(seeder.gen());
        let clone_seed = seeder.gen();

        let mut freq_offset = proto.freq_offset.unwrap_or(0.0);
        if let Some(stdev) = proto.random_freq_offset_stdev {
            freq_offset += Normal::new(0.0, stdev).expect("stdev must be finite").sample(&mut rng);
        }
        let mut phase_offset = proto.phase_offset.unwrap_or(0.0);
        if let Some(stdev) = proto.random_phase_offset_stdev {
            phase_offset += Normal::new(0.0, stdev).expect("stdev must be finite").sample(&mut rng);
        }

        let model = if proto.entries.is_empty() {
            None
        } else {
            Some(ClockModelGenerator::new(&proto.entries, &mut rng, None, false))
        };

        Self {
            name: proto.name.clone(),
            frequency: proto.frequency,
            sync_on_pulse: proto.sync_on_pulse,
            freq_offset,
            phase_offset,
            entries: proto.entries.clone(),
            model,
            clone_seed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn sync_on_pulse(&self) -> bool {
        self.sync_on_pulse
    }

    pub fn freq_offset(&self) -> f64 {
        self.freq_offset
    }

    pub fn phase_offset(&self) -> f64 {
        self.phase_offset
    }

    /// Whether a phase-noise model is attached
    pub fn enabled(&self) -> bool {
        self.model.is_some()
    }

    /// Next phase-noise sample in radians; 0 when the model is disabled
    pub fn next_sample(&mut self) -> f64 {
        self.model.as_mut().map_or(0.0, |m| m.next_sample())
    }

    pub fn skip_samples(&mut self, count: usize) {
        if let Some(model) = self.model.as_mut() {
            model.skip_samples(count);
        }
    }

    /// Reset the phase-noise state, as sync-on-pulse models do at every
    /// receive window
    pub fn reset(&mut self) {
        if let Some(model) = self.model.as_mut() {
            model.reset();
        }
    }

    /// Independent copy with identical statistical configuration and a
    /// fresh random stream, for use by a finalizer thread
    pub fn clone_for_thread(&self) -> Timing {
        let mut rng = ChaCha12Rng::seed_from_u64(self.clone_seed);
        let model = if self.entries.is_empty() {
            None
        } else {
            Some(ClockModelGenerator::new(&self.entries, &mut rng, None, false))
        };
        Timing {
            name: self.name.clone(),
            frequency: self.frequency,
            sync_on_pulse: self.sync_on_pulse,
            freq_offset: self.freq_offset,
            phase_offset: self.phase_offset,
            entries: self.entries.clone(),
            model,
            clone_seed: rng.gen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeder(seed: u64) -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(seed)
    }

    #[test]
    fn disabled_model_yields_zero_noise() {
        let proto = PrototypeTiming::new("clock", 10e6);
        let mut timing = Timing::from_prototype(&proto, &mut seeder(1));
        assert!(!timing.enabled());
        assert_eq!(timing.next_sample(), 0.0);
    }

    #[test]
    fn deterministic_offsets_are_copied() {
        let mut proto = PrototypeTiming::new("clock", 10e6);
        proto.set_freq_offset(12.5);
        proto.set_phase_offset(-0.25);
        let timing = Timing::from_prototype(&proto, &mut seeder(1));
        assert_eq!(timing.freq_offset(), 12.5);
        assert_eq!(timing.phase_offset(), -0.25);
    }

    #[test]
    fn random_offsets_are_reproducible_for_seed() {
        let mut proto = PrototypeTiming::new("clock", 10e6);
        proto.set_random_freq_offset(5.0);
        proto.set_random_phase_offset(0.1);
        let a = Timing::from_prototype(&proto, &mut seeder(7));
        let b = Timing::from_prototype(&proto, &mut seeder(7));
        assert_eq!(a.freq_offset(), b.freq_offset());
        assert_eq!(a.phase_offset(), b.phase_offset());
        assert_ne!(a.freq_offset(), 0.0);
    }

    #[test]
    fn instances_from_one_seeder_differ() {
        let mut proto = PrototypeTiming::new("clock", 10e6);
        proto.set_random_phase_offset(1.0);
        let mut s = seeder(3);
        let a = Timing::from_prototype(&proto, &mut s);
        let b = Timing::from_prototype(&proto, &mut s);
        assert_ne!(a.phase_offset(), b.phase_offset());
    }

    #[test]
    fn clone_keeps_config_with_fresh_stream() {
        let mut proto = PrototypeTiming::new("clock", 10e6);
        proto.add_noise_entry(2.0, 1e-9);
        let mut original = Timing::from_prototype(&proto, &mut seeder(5));
        let mut cloned = original.clone_for_thread();
        assert!(cloned.enabled());
        assert_eq!(cloned.freq_offset(), original.freq_offset());
        // Same statistics, different stream.
        let a: Vec<f64> = (0..32).map(|_| original.next_sample()).collect();
        let b: Vec<f64> = (0..32).map(|_| cloned.next_sample()).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn clone_moments_match_original() {
        let mut proto = PrototypeTiming::new("clock", 10e6);
        proto.add_noise_entry(0.0, 1.0);
        let mut original = Timing::from_prototype(&proto, &mut seeder(9));
        let mut cloned = original.clone_for_thread();
        let n = 100_000;
        let stats = |t: &mut Timing| {
            let samples: Vec<f64> = (0..n).map(|_| t.next_sample()).collect();
            let mean = samples.iter().sum::<f64>() / n as f64;
            let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n as f64;
            (mean, var)
        };
        let (mean_a, var_a) = stats(&mut original);
        let (mean_b, var_b) = stats(&mut cloned);
        // White entries: mean 0, variance 1; allow Monte Carlo tolerance.
        assert!((mean_a - mean_b).abs() < 0.02, "means {mean_a} vs {mean_b}");
        assert!((var_a - var_b).abs() / var_a < 0.05, "vars {var_a} vs {var_b}");
    }
}
