//! Per-pulse response records produced by the channel model

use std::sync::Arc;

use num_complex::Complex64;

use crate::errors::Result;
use crate::signal_processing::InterpFilter;
use crate::waveform::RadarSignal;

/// One sample of a received signal's instantaneous properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpPoint {
    /// Power scaling factor relative to transmitted power
    pub power: f64,
    /// Absolute arrival time of this sample in seconds
    pub time: f64,
    /// Propagation delay in seconds
    pub delay: f64,
    /// Relativistic Doppler factor f_recv / f_trans
    pub doppler_factor: f64,
    /// Propagation phase in radians
    pub phase: f64,
    /// Receiver noise temperature looking toward the arrival direction
    pub noise_temperature: f64,
}

/// Ordered list of interpolation points describing how one transmitted
/// pulse's energy arrived at one receiver, for one propagation path
#[derive(Debug, Clone)]
pub struct Response {
    transmitter: String,
    signal: Arc<RadarSignal>,
    points: Vec<InterpPoint>,
}

impl Response {
    pub fn new(transmitter: impl Into<String>, signal: Arc<RadarSignal>) -> Self {
        Self {
            transmitter: transmitter.into(),
            signal,
            points: Vec::new(),
        }
    }

    pub fn transmitter_name(&self) -> &str {
        &self.transmitter
    }

    pub fn signal(&self) -> &Arc<RadarSignal> {
        &self.signal
    }

    pub fn points(&self) -> &[InterpPoint] {
        &self.points
    }

    pub fn add_point(&mut self, point: InterpPoint) {
        self.points.push(point);
    }

    /// Arrival time of the first sample
    pub fn start_time(&self) -> f64 {
        self.points.first().map_or(0.0, |p| p.time)
    }

    /// Arrival time of the last sample
    pub fn end_time(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time)
    }

    /// Synthesize this response's baseband samples. Returns the sample rate
    /// and the rendered I/Q block.
    pub fn render(
        &self,
        frac_window_delay: f64,
        interp: &InterpFilter,
    ) -> Result<(f64, Vec<Complex64>)> {
        let samples = self.signal.render(&self.points, frac_window_delay, interp)?;
        Ok((self.signal.rate(), samples))
    }
}
