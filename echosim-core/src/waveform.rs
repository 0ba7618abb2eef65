//! Radar waveform representation and pulse rendering
//!
//! A `RadarSignal` is either a loaded baseband I/Q pulse at a native sample
//! rate or a constant-amplitude continuous-wave carrier. Pulses are rendered
//! into receive windows through a fractional-delay Kaiser-sinc interpolator
//! driven by the channel model's interpolation points.

use std::f64::consts::TAU;

use num_complex::Complex64;

use crate::errors::{ConfigError, InternalError, Result};
use crate::response::InterpPoint;
use crate::signal_processing::{InterpFilter, Upsampler};

/// Baseband content of a radar signal
#[derive(Debug, Clone)]
pub enum SignalPayload {
    /// Loaded I/Q samples at the stored rate (oversampling already applied)
    Samples { data: Vec<Complex64>, rate: f64 },
    /// Constant-amplitude carrier; samples are synthesized per-instant by
    /// the CW channel model instead of rendered from a buffer
    Cw,
}

#[derive(Debug, Clone)]
pub struct RadarSignal {
    name: String,
    power: f64,
    carrier: f64,
    length: f64,
    payload: SignalPayload,
}

impl RadarSignal {
    /// Build a pulse signal from baseband samples at `native_rate`. The
    /// samples are upsampled by `oversample_ratio` at load time so every
    /// later render runs at the oversampled rate.
    pub fn pulse(
        name: impl Into<String>,
        power: f64,
        carrier: f64,
        length: f64,
        samples: &[Complex64],
        native_rate: f64,
        oversample_ratio: u32,
    ) -> Result<Self> {
        let name = name.into();
        if samples.is_empty() || native_rate <= 0.0 {
            return Err(ConfigError::BadPulseSignal {
                name,
                reason: "empty sample data or non-positive rate".into(),
            }
            .into());
        }
        let (data, rate) = if oversample_ratio > 1 {
            let mut upsampler = Upsampler::new(oversample_ratio as usize);
            (
                upsampler.upsample(samples),
                native_rate * oversample_ratio as f64,
            )
        } else {
            (samples.to_vec(), native_rate)
        };
        Ok(Self {
            name,
            power,
            carrier,
            length,
            payload: SignalPayload::Samples { data, rate },
        })
    }

    /// Constant-amplitude continuous-wave carrier
    pub fn cw(name: impl Into<String>, power: f64, carrier: f64) -> Self {
        Self {
            name: name.into(),
            power,
            carrier,
            length: 0.0,
            payload: SignalPayload::Cw,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn carrier(&self) -> f64 {
        self.carrier
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_cw(&self) -> bool {
        matches!(self.payload, SignalPayload::Cw)
    }

    /// Sample rate of the rendered signal. CW carriers report the Nyquist
    /// rate for their carrier.
    pub fn rate(&self) -> f64 {
        match &self.payload {
            SignalPayload::Samples { rate, .. } => *rate,
            SignalPayload::Cw => 2.0 * self.carrier,
        }
    }

    /// Render the pulse with the time-varying delay, amplitude, and phase
    /// described by `points`, shifted by the window's fractional delay.
    ///
    /// Each output sample interpolates (power, delay, phase) between its two
    /// neighboring points, then convolves the source samples with the
    /// interpolation kernel centered at the fractionally-delayed position.
    /// The kernel taps are reused while the fractional delay stays constant.
    pub fn render(
        &self,
        points: &[InterpPoint],
        frac_window_delay: f64,
        interp: &InterpFilter,
    ) -> Result<Vec<Complex64>> {
        let (data, rate) = match &self.payload {
            SignalPayload::Samples { data, rate } => (data, *rate),
            SignalPayload::Cw => return Err(InternalError::RenderOnCwSignal.into()),
        };
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let size = data.len();
        let filter_length = interp.filter_length();
        let timestep = 1.0 / rate;
        let mut out = vec![Complex64::new(0.0, 0.0); size];

        let mut left = 0usize;
        let mut right = usize::from(points.len() > 1);
        let idelay = (rate * points[0].delay).floor();
        let mut last_delay = f64::NAN;
        let mut taps = vec![0.0f64; filter_length + 1];

        let mut sample_time = points[0].time;
        for (i, slot) in out.iter_mut().enumerate() {
            if sample_time > points[right].time {
                left = right;
                if right + 1 < points.len() {
                    right += 1;
                }
            }
            let (aw, bw) = if left < right {
                let bw = (sample_time - points[left].time) / (points[right].time - points[left].time);
                (1.0 - bw, bw)
            } else {
                (1.0, 0.0)
            };

            let amplitude = points[left].power.sqrt() * aw + points[right].power.sqrt() * bw;
            let fdelay =
                (points[left].delay * aw + points[right].delay * bw) * rate - idelay + frac_window_delay;
            let phase = (points[left].phase * aw + points[right].phase * bw) % TAU;

            let center = i as f64 - fdelay;
            let half = filter_length as f64 / 2.0;
            let start = ((center - half).max(0.0).floor() as usize).min(size);
            let end = ((center + half).max(0.0).floor() as usize).min(size);

            if fdelay != last_delay || i <= filter_length / 2 {
                for (j, tap) in taps[..end - start].iter_mut().enumerate() {
                    *tap = interp.value(center - (start + j) as f64);
                }
            }

            let mut accum = Complex64::new(0.0, 0.0);
            for (sample, tap) in data[start..end].iter().zip(&taps[..end - start]) {
                accum += *sample * *tap;
            }
            accum *= amplitude;

            // Rotate by -phase to demodulate the propagation phase into I/Q.
            let (sin, cos) = phase.sin_cos();
            *slot = Complex64::new(
                cos * accum.re + sin * accum.im,
                -sin * accum.re + cos * accum.im,
            );

            last_delay = fdelay;
            sample_time += timestep;
        }
        Ok(out)
    }
}
