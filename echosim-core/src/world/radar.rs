//! Transmitter and receiver radar entities

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crossbeam::channel::{self, Receiver as ChannelReceiver, Sender};
use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

use crate::antenna::Antenna;
use crate::errors::{ConfigError, Result};
use crate::finalizer::RenderingJob;
use crate::geometry::{SVec3, Vec3};
use crate::response::Response;
use crate::waveform::RadarSignal;
use crate::world::platform::Platform;
use crate::world::timing::Timing;

/// Pulsed or continuous-wave operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Pulsed,
    Cw,
}

/// A radar transmitter attached to a platform
#[derive(Debug)]
pub struct Transmitter {
    name: String,
    platform: Arc<Platform>,
    antenna: Arc<Antenna>,
    timing: Timing,
    mode: OperationMode,
    prf: f64,
    signal: Arc<RadarSignal>,
    /// Receiver arena index of the monostatic partner, if any
    attached: OnceLock<usize>,
}

impl Transmitter {
    pub fn new(
        name: impl Into<String>,
        platform: Arc<Platform>,
        antenna: Arc<Antenna>,
        timing: Timing,
        mode: OperationMode,
        prf: f64,
        signal: Arc<RadarSignal>,
    ) -> Result<Self> {
        let name = name.into();
        if mode == OperationMode::Pulsed && prf <= 0.0 {
            return Err(ConfigError::InvalidPrf { name, prf }.into());
        }
        Ok(Self {
            name,
            platform,
            antenna,
            timing,
            mode,
            prf,
            signal,
            attached: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn prf(&self) -> f64 {
        self.prf
    }

    pub fn signal(&self) -> &Arc<RadarSignal> {
        &self.signal
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn position(&self, t: f64) -> Result<Vec3> {
        self.platform.position(t)
    }

    pub fn rotation(&self, t: f64) -> Result<SVec3> {
        self.platform.rotation(t)
    }

    pub fn gain(&self, direction: &SVec3, boresight: &SVec3, wavelength: f64) -> f64 {
        self.antenna.gain(direction, boresight, wavelength)
    }

    pub fn set_attached(&self, receiver_index: usize) {
        let _ = self.attached.set(receiver_index);
    }

    pub fn attached(&self) -> Option<usize> {
        self.attached.get().copied()
    }
}

/// Receiver configuration flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecvFlags {
    /// Suppress the direct Tx -> Rx path
    pub no_direct: bool,
    /// Skip free-space propagation loss in the radar equation
    pub no_propagation_loss: bool,
}

/// A radar receiver attached to a platform.
///
/// Mutable run-time state (inbox, CW buffer, RNG, active flag) sits behind
/// interior mutability so the driver and finalizer threads can share the
/// receiver through an `Arc`.
#[derive(Debug)]
pub struct Receiver {
    name: String,
    platform: Arc<Platform>,
    antenna: Arc<Antenna>,
    timing: Timing,
    mode: OperationMode,
    flags: RecvFlags,
    window_length: f64,
    window_prf: f64,
    window_skip: f64,
    noise_temperature: f64,
    attached: OnceLock<usize>,
    active: AtomicBool,
    inbox: Mutex<Vec<Response>>,
    interference_log: Mutex<Vec<Response>>,
    cw_buffer: Mutex<Vec<Complex64>>,
    job_tx: Sender<RenderingJob>,
    job_rx: Mutex<Option<ChannelReceiver<RenderingJob>>>,
    rng: Mutex<ChaCha12Rng>,
}

impl Receiver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        platform: Arc<Platform>,
        antenna: Arc<Antenna>,
        timing: Timing,
        mode: OperationMode,
        flags: RecvFlags,
        noise_temperature: f64,
        seed: u64,
    ) -> Result<Self> {
        if noise_temperature < 0.0 {
            return Err(ConfigError::InvalidNoiseTemperature {
                temperature: noise_temperature,
            }
            .into());
        }
        let (job_tx, job_rx) = channel::unbounded();
        Ok(Self {
            name: name.into(),
            platform,
            antenna,
            timing,
            mode,
            flags,
            window_length: 0.0,
            window_prf: 0.0,
            window_skip: 0.0,
            noise_temperature,
            attached: OnceLock::new(),
            active: AtomicBool::new(false),
            inbox: Mutex::new(Vec::new()),
            interference_log: Mutex::new(Vec::new()),
            cw_buffer: Mutex::new(Vec::new()),
            job_tx,
            job_rx: Mutex::new(Some(job_rx)),
            rng: Mutex::new(ChaCha12Rng::seed_from_u64(seed)),
        })
    }

    /// Configure the receive-window grid. Required for pulsed receivers.
    pub fn set_window_properties(&mut self, length: f64, prf: f64, skip: f64) -> Result<()> {
        if length <= 0.0 || prf <= 0.0 || skip < 0.0 {
            return Err(ConfigError::InvalidWindow {
                name: self.name.clone(),
                length,
                prf,
                skip,
            }
            .into());
        }
        self.window_length = length;
        self.window_prf = prf;
        self.window_skip = skip;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn flags(&self) -> RecvFlags {
        self.flags
    }

    pub fn window_length(&self) -> f64 {
        self.window_length
    }

    pub fn window_prf(&self) -> f64 {
        self.window_prf
    }

    pub fn window_skip(&self) -> f64 {
        self.window_skip
    }

    /// Ideal start time of the n-th receive window
    pub fn window_start(&self, window: u32) -> f64 {
        self.window_skip + window as f64 / self.window_prf
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn position(&self, t: f64) -> Result<Vec3> {
        self.platform.position(t)
    }

    pub fn rotation(&self, t: f64) -> Result<SVec3> {
        self.platform.rotation(t)
    }

    pub fn gain(&self, direction: &SVec3, boresight: &SVec3, wavelength: f64) -> f64 {
        self.antenna.gain(direction, boresight, wavelength)
    }

    /// System noise temperature of the receiver itself
    pub fn noise_temperature(&self) -> f64 {
        self.noise_temperature
    }

    /// Noise temperature looking toward a direction of arrival: the antenna
    /// contribution plus the receiver system temperature
    pub fn noise_temperature_toward(&self, direction: &SVec3) -> f64 {
        self.antenna.noise_temperature(direction) + self.noise_temperature
    }

    pub fn set_attached(&self, transmitter_index: usize) {
        let _ = self.attached.set(transmitter_index);
    }

    pub fn attached(&self) -> Option<usize> {
        self.attached.get().copied()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn add_response_to_inbox(&self, response: Response) {
        self.inbox.lock().expect("inbox poisoned").push(response);
    }

    /// Atomically empty the inbox, leaving a fresh container behind
    pub fn drain_inbox(&self) -> Vec<Response> {
        std::mem::take(&mut *self.inbox.lock().expect("inbox poisoned"))
    }

    pub fn add_interference_to_log(&self, response: Response) {
        self.interference_log
            .lock()
            .expect("interference log poisoned")
            .push(response);
    }

    pub fn take_interference_log(&self) -> Vec<Response> {
        std::mem::take(
            &mut *self
                .interference_log
                .lock()
                .expect("interference log poisoned"),
        )
    }

    /// Allocate the simulation-long CW I/Q buffer
    pub fn prepare_cw_buffer(&self, samples: usize) {
        let mut buffer = self.cw_buffer.lock().expect("cw buffer poisoned");
        buffer.clear();
        buffer.resize(samples, Complex64::new(0.0, 0.0));
    }

    pub fn set_cw_sample(&self, index: usize, sample: Complex64) {
        let mut buffer = self.cw_buffer.lock().expect("cw buffer poisoned");
        if index < buffer.len() {
            buffer[index] = sample;
        }
    }

    pub fn take_cw_buffer(&self) -> Vec<Complex64> {
        std::mem::take(&mut *self.cw_buffer.lock().expect("cw buffer poisoned"))
    }

    pub fn enqueue_finalizer_job(&self, job: RenderingJob) {
        // A send can only fail once the finalizer has exited, at which
        // point the job has nowhere to go anyway.
        let _ = self.job_tx.send(job);
    }

    /// Hand the job-queue consumer end to the finalizer thread. Each
    /// receiver has exactly one finalizer, so this can be taken once.
    pub fn take_job_queue(&self) -> Option<ChannelReceiver<RenderingJob>> {
        self.job_rx.lock().expect("job queue poisoned").take()
    }

    /// Run a closure with the receiver's random engine
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha12Rng) -> T) -> T {
        let mut rng = self.rng.lock().expect("receiver rng poisoned");
        f(&mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antenna::GainPattern;
    use crate::world::timing::{PrototypeTiming, Timing};

    fn parts() -> (Arc<Platform>, Arc<Antenna>, Timing) {
        let platform = Arc::new(Platform::stationary("p", Vec3::ZERO));
        let antenna = Arc::new(Antenna::new("a", GainPattern::Isotropic));
        let proto = PrototypeTiming::new("clock", 10e6);
        let mut seeder = ChaCha12Rng::seed_from_u64(1);
        let timing = Timing::from_prototype(&proto, &mut seeder);
        (platform, antenna, timing)
    }

    #[test]
    fn pulsed_transmitter_requires_positive_prf() {
        let (platform, antenna, timing) = parts();
        let signal = Arc::new(RadarSignal::cw("s", 1.0, 1e9));
        let result = Transmitter::new(
            "tx",
            platform,
            antenna,
            timing,
            OperationMode::Pulsed,
            0.0,
            signal,
        );
        assert!(result.is_err());
    }

    #[test]
    fn receiver_window_validation() {
        let (platform, antenna, timing) = parts();
        let mut rx = Receiver::new(
            "rx",
            platform,
            antenna,
            timing,
            OperationMode::Pulsed,
            RecvFlags::default(),
            290.0,
            7,
        )
        .unwrap();
        assert!(rx.set_window_properties(0.0, 1000.0, 0.0).is_err());
        assert!(rx.set_window_properties(1e-3, 0.0, 0.0).is_err());
        assert!(rx.set_window_properties(1e-3, 1000.0, -1.0).is_err());
        rx.set_window_properties(1e-3, 500.0, 1e-4).unwrap();
        assert_eq!(rx.window_start(0), 1e-4);
        assert_eq!(rx.window_start(2), 1e-4 + 2.0 / 500.0);
    }

    #[test]
    fn negative_noise_temperature_rejected() {
        let (platform, antenna, timing) = parts();
        let result = Receiver::new(
            "rx",
            platform,
            antenna,
            timing,
            OperationMode::Pulsed,
            RecvFlags::default(),
            -1.0,
            7,
        );
        assert!(result.is_err());
    }

    #[test]
    fn inbox_drain_leaves_empty_container() {
        let (platform, antenna, timing) = parts();
        let rx = Receiver::new(
            "rx",
            platform,
            antenna,
            timing,
            OperationMode::Pulsed,
            RecvFlags::default(),
            0.0,
            7,
        )
        .unwrap();
        let signal = Arc::new(RadarSignal::cw("s", 1.0, 1e9));
        rx.add_response_to_inbox(Response::new("tx", signal));
        assert_eq!(rx.drain_inbox().len(), 1);
        assert!(rx.drain_inbox().is_empty());
    }

    #[test]
    fn job_queue_taken_once() {
        let (platform, antenna, timing) = parts();
        let rx = Receiver::new(
            "rx",
            platform,
            antenna,
            timing,
            OperationMode::Pulsed,
            RecvFlags::default(),
            0.0,
            7,
        )
        .unwrap();
        assert!(rx.take_job_queue().is_some());
        assert!(rx.take_job_queue().is_none());
    }
}
