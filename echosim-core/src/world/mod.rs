//! The simulation world: entity arenas, asset registries, and scheduling
//!
//! The world owns every platform, radar, and target, plus keyed registries
//! of shared antenna / signal / timing assets. Cross-references between
//! entities are arena indices, so ownership stays acyclic.

pub mod platform;
pub mod radar;
pub mod target;
pub mod timing;

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::antenna::Antenna;
use crate::errors::{ConfigError, Result};
use crate::events::{EventKind, EventQueue};
use crate::params::Parameters;
use crate::waveform::RadarSignal;
use platform::Platform;
use radar::{OperationMode, Receiver, RecvFlags, Transmitter};
use target::{FluctuationModel, Target};
use timing::{PrototypeTiming, Timing};

/// Mutable state of a running simulation
#[derive(Debug, Default)]
pub struct SimulationState {
    /// Current simulation time
    pub t_current: f64,
    /// Arena indices of transmitters whose TxCwStart has fired but whose
    /// TxCwEnd has not
    pub active_cw_transmitters: Vec<usize>,
}

/// Description of a transmitter to add to the world
pub struct TransmitterDef<'a> {
    pub name: &'a str,
    pub platform: usize,
    pub antenna: &'a str,
    pub timing: &'a str,
    pub mode: OperationMode,
    pub prf: f64,
    pub signal: &'a str,
}

/// Description of a receiver to add to the world
pub struct ReceiverDef<'a> {
    pub name: &'a str,
    pub platform: usize,
    pub antenna: &'a str,
    pub timing: &'a str,
    pub mode: OperationMode,
    pub flags: RecvFlags,
    pub noise_temperature: f64,
    /// (length, prf, skip); required for pulsed receivers
    pub window: Option<(f64, f64, f64)>,
}

/// Description of a target to add to the world
pub struct TargetDef<'a> {
    pub name: &'a str,
    pub platform: usize,
    pub model: target::RcsModel,
    pub fluctuation: FluctuationModel,
}

pub struct World {
    params: Parameters,
    seeder: ChaCha12Rng,
    platforms: Vec<Arc<Platform>>,
    transmitters: Vec<Arc<Transmitter>>,
    receivers: Vec<Arc<Receiver>>,
    targets: Vec<Arc<Target>>,
    antennas: HashMap<String, Arc<Antenna>>,
    signals: HashMap<String, Arc<RadarSignal>>,
    timings: HashMap<String, Arc<PrototypeTiming>>,
    event_queue: EventQueue,
    state: SimulationState,
    scheduled: bool,
}

impl World {
    pub fn new(params: Parameters) -> Result<Self> {
        params.validate()?;
        let seed = params.random_seed.unwrap_or_else(rand::random);
        Ok(Self {
            event_queue: EventQueue::new(params.end_time),
            params,
            seeder: ChaCha12Rng::seed_from_u64(seed),
            platforms: Vec::new(),
            transmitters: Vec::new(),
            receivers: Vec::new(),
            targets: Vec::new(),
            antennas: HashMap::new(),
            signals: HashMap::new(),
            timings: HashMap::new(),
            state: SimulationState::default(),
            scheduled: false,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Remove every entity, asset, and scheduled event, keeping the
    /// parameter set. The master seeder restarts so a reloaded scenario
    /// reproduces the same streams.
    pub fn clear(&mut self) {
        let seed = self.params.random_seed.unwrap_or_else(rand::random);
        self.seeder = ChaCha12Rng::seed_from_u64(seed);
        self.platforms.clear();
        self.transmitters.clear();
        self.receivers.clear();
        self.targets.clear();
        self.antennas.clear();
        self.signals.clear();
        self.timings.clear();
        self.event_queue.clear(self.params.end_time);
        self.state = SimulationState::default();
        self.scheduled = false;
    }

    // --- Asset registries ---

    pub fn add_antenna(&mut self, antenna: Antenna) -> Result<Arc<Antenna>> {
        let name = antenna.name().to_string();
        if self.antennas.contains_key(&name) {
            return Err(ConfigError::DuplicateAssetName { name }.into());
        }
        let antenna = Arc::new(antenna);
        self.antennas.insert(name, Arc::clone(&antenna));
        Ok(antenna)
    }

    pub fn add_signal(&mut self, signal: RadarSignal) -> Result<Arc<RadarSignal>> {
        let name = signal.name().to_string();
        if self.signals.contains_key(&name) {
            return Err(ConfigError::DuplicateAssetName { name }.into());
        }
        let signal = Arc::new(signal);
        self.signals.insert(name, Arc::clone(&signal));
        Ok(signal)
    }

    pub fn add_timing_prototype(&mut self, timing: PrototypeTiming) -> Result<Arc<PrototypeTiming>> {
        let name = timing.name().to_string();
        if self.timings.contains_key(&name) {
            return Err(ConfigError::DuplicateAssetName { name }.into());
        }
        let timing = Arc::new(timing);
        self.timings.insert(name, Arc::clone(&timing));
        Ok(timing)
    }

    pub fn find_antenna(&self, name: &str) -> Option<Arc<Antenna>> {
        self.antennas.get(name).cloned()
    }

    pub fn find_signal(&self, name: &str) -> Option<Arc<RadarSignal>> {
        self.signals.get(name).cloned()
    }

    pub fn find_timing(&self, name: &str) -> Option<Arc<PrototypeTiming>> {
        self.timings.get(name).cloned()
    }

    fn lookup_antenna(&self, name: &str) -> Result<Arc<Antenna>> {
        self.find_antenna(name).ok_or_else(|| {
            ConfigError::MissingAsset {
                kind: "antenna",
                name: name.to_string(),
            }
            .into()
        })
    }

    fn lookup_signal(&self, name: &str) -> Result<Arc<RadarSignal>> {
        self.find_signal(name).ok_or_else(|| {
            ConfigError::MissingAsset {
                kind: "signal",
                name: name.to_string(),
            }
            .into()
        })
    }

    fn lookup_timing(&self, name: &str) -> Result<Arc<PrototypeTiming>> {
        self.find_timing(name).ok_or_else(|| {
            ConfigError::MissingAsset {
                kind: "timing",
                name: name.to_string(),
            }
            .into()
        })
    }

    fn lookup_platform(&self, index: usize) -> Result<Arc<Platform>> {
        self.platforms.get(index).cloned().ok_or_else(|| {
            ConfigError::MissingAsset {
                kind: "platform",
                name: index.to_string(),
            }
            .into()
        })
    }

    // --- Entities ---

    pub fn add_platform(&mut self, platform: Platform) -> Result<usize> {
        if !platform.is_finalized() {
            return Err(ConfigError::InvalidParameter {
                reason: format!("platform '{}' has non-finalized paths", platform.name()),
            }
            .into());
        }
        self.platforms.push(Arc::new(platform));
        Ok(self.platforms.len() - 1)
    }

    pub fn add_transmitter(&mut self, def: TransmitterDef<'_>) -> Result<usize> {
        if let Some(first) = self.transmitters.first() {
            if first.mode() != def.mode {
                return Err(ConfigError::MixedTransmitterModes.into());
            }
        }
        let platform = self.lookup_platform(def.platform)?;
        let antenna = self.lookup_antenna(def.antenna)?;
        let proto = self.lookup_timing(def.timing)?;
        let signal = self.lookup_signal(def.signal)?;
        let timing = Timing::from_prototype(&proto, &mut self.seeder);
        let transmitter =
            Transmitter::new(def.name, platform, antenna, timing, def.mode, def.prf, signal)?;
        self.transmitters.push(Arc::new(transmitter));
        Ok(self.transmitters.len() - 1)
    }

    pub fn add_receiver(&mut self, def: ReceiverDef<'_>) -> Result<usize> {
        let platform = self.lookup_platform(def.platform)?;
        let antenna = self.lookup_antenna(def.antenna)?;
        let proto = self.lookup_timing(def.timing)?;
        let timing = Timing::from_prototype(&proto, &mut self.seeder);
        let seed = self.seeder.gen();
        let mut receiver = Receiver::new(
            def.name,
            platform,
            antenna,
            timing,
            def.mode,
            def.flags,
            def.noise_temperature,
            seed,
        )?;
        match (def.mode, def.window) {
            (_, Some((length, prf, skip))) => receiver.set_window_properties(length, prf, skip)?,
            (OperationMode::Pulsed, None) => {
                return Err(ConfigError::InvalidWindow {
                    name: def.name.to_string(),
                    length: 0.0,
                    prf: 0.0,
                    skip: 0.0,
                }
                .into())
            }
            (OperationMode::Cw, None) => {}
        }
        self.receivers.push(Arc::new(receiver));
        Ok(self.receivers.len() - 1)
    }

    pub fn add_target(&mut self, def: TargetDef<'_>) -> Result<usize> {
        let platform = self.lookup_platform(def.platform)?;
        let seed = self.seeder.gen();
        let target = Target::new(def.name, platform, def.model, def.fluctuation, seed);
        self.targets.push(Arc::new(target));
        Ok(self.targets.len() - 1)
    }

    /// Link a monostatic transmitter/receiver pair. Both radars must sit on
    /// the same platform; the pair's direct path is suppressed.
    pub fn attach_monostatic(&mut self, tx: usize, rx: usize) -> Result<()> {
        let transmitter = self.transmitters.get(tx).ok_or(ConfigError::MissingAsset {
            kind: "transmitter",
            name: tx.to_string(),
        })?;
        let receiver = self.receivers.get(rx).ok_or(ConfigError::MissingAsset {
            kind: "receiver",
            name: rx.to_string(),
        })?;
        if !Arc::ptr_eq(transmitter.platform(), receiver.platform()) {
            return Err(ConfigError::MonostaticPlatformMismatch {
                transmitter: transmitter.name().to_string(),
                receiver: receiver.name().to_string(),
            }
            .into());
        }
        transmitter.set_attached(rx);
        receiver.set_attached(tx);
        Ok(())
    }

    // --- Accessors for the engine ---

    pub fn platforms(&self) -> &[Arc<Platform>] {
        &self.platforms
    }

    pub fn transmitters(&self) -> &[Arc<Transmitter>] {
        &self.transmitters
    }

    pub fn receivers(&self) -> &[Arc<Receiver>] {
        &self.receivers
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn is_cw_simulation(&self) -> bool {
        self.transmitters
            .first()
            .is_some_and(|tx| tx.mode() == OperationMode::Cw)
    }

    pub fn event_queue_mut(&mut self) -> &mut EventQueue {
        &mut self.event_queue
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub(crate) fn split_queue_and_state(
        &mut self,
    ) -> (&mut EventQueue, &mut SimulationState, &Parameters) {
        (&mut self.event_queue, &mut self.state, &self.params)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Populate the queue with the first event per transmitter and
    /// receiver. Idempotent: a second call does nothing.
    pub fn schedule_initial_events(&mut self) {
        if self.scheduled {
            return;
        }
        let start = self.params.start_time;
        let end = self.params.end_time;

        for (index, transmitter) in self.transmitters.iter().enumerate() {
            match transmitter.mode() {
                OperationMode::Pulsed => {
                    self.event_queue.push(0.0, EventKind::TxPulsedStart(index));
                }
                OperationMode::Cw => {
                    self.event_queue.push(start, EventKind::TxCwStart(index));
                    self.event_queue.push(end, EventKind::TxCwEnd(index));
                }
            }
        }

        for (index, receiver) in self.receivers.iter().enumerate() {
            match receiver.mode() {
                OperationMode::Pulsed => {
                    let first_window_start = receiver.window_start(0);
                    if first_window_start < end {
                        self.event_queue
                            .push(first_window_start, EventKind::RxPulsedWindowStart(index));
                    }
                }
                OperationMode::Cw => {
                    self.event_queue.push(start, EventKind::RxCwStart(index));
                    self.event_queue.push(end, EventKind::RxCwEnd(index));
                }
            }
        }

        self.state.t_current = start;
        self.scheduled = true;
        info!(
            "scheduled {} initial events over [{start}, {end}]",
            self.event_queue.len()
        );
    }
}
