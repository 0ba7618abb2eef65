//! The event-driven simulation engine
//!
//! One driver thread advances simulation time by popping events from the
//! world's queue. Between discrete events it runs a time-stepped inner loop
//! that integrates continuous-wave physics straight into receiver buffers;
//! at each event it builds pulse responses, opens and closes receive
//! windows, and tracks the set of active CW transmitters. Expensive window
//! synthesis is offloaded to per-receiver finalizer threads, and CW
//! finalization to a shared worker pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{info, warn};
use num_complex::Complex64;

use crate::channel::{calculate_response, direct_cw, is_range_error, reflected_cw};
use crate::errors::{InternalError, Result, SimError};
use crate::events::{EventKind, EventQueue};
use crate::finalizer::{finalize_cw_receiver, run_pulsed_finalizer, RenderingJob};
use crate::output::SinkFactory;
use crate::params::Parameters;
use crate::pool::ThreadPool;
use crate::response::Response;
use crate::world::radar::{OperationMode, Receiver, Transmitter};
use crate::world::target::Target;
use crate::world::{SimulationState, World};

/// Callback invoked with (message, done, total) as the run progresses
pub type ProgressCallback<'a> = &'a dyn Fn(&str, usize, usize);

/// Outcome of a completed run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub events_dispatched: u64,
    /// Output samples emitted per receiver name
    pub samples_emitted: HashMap<String, u64>,
}

type CwResults = Arc<Mutex<Vec<(String, Result<u64>)>>>;

struct Entities {
    transmitters: Vec<Arc<Transmitter>>,
    receivers: Vec<Arc<Receiver>>,
    targets: Vec<Arc<Target>>,
}

fn report_progress(
    progress: Option<ProgressCallback<'_>>,
    message: &str,
    t_current: f64,
    end_time: f64,
) {
    if let Some(callback) = progress {
        let done = if end_time > 0.0 {
            ((t_current / end_time) * 100.0).floor().clamp(0.0, 100.0) as usize
        } else {
            100
        };
        callback(message, done, 100);
    }
}

/// Sum CW path contributions into one receiver sample. Degenerate geometry
/// contributes zero with a warning; other failures abort the run.
fn integrate_cw_sample(
    receiver: &Receiver,
    entities: &Entities,
    state: &SimulationState,
    t_step: f64,
    params: &Parameters,
) -> Result<Complex64> {
    let mut acc = Complex64::new(0.0, 0.0);
    for &tx_index in &state.active_cw_transmitters {
        let source = &entities.transmitters[tx_index];
        let monostatic_partner = receiver.attached() == Some(tx_index);
        if !receiver.flags().no_direct && !monostatic_partner {
            match direct_cw(source, receiver, t_step, params) {
                Ok(sample) => acc += sample,
                Err(error) if is_range_error(&error) => {
                    warn!("direct CW sample degenerate at t={t_step}: {error}");
                }
                Err(error) => return Err(error),
            }
        }
        for target in &entities.targets {
            match reflected_cw(source, receiver, target, t_step, params) {
                Ok(sample) => acc += sample,
                Err(error) if is_range_error(&error) => {
                    warn!("reflected CW sample degenerate at t={t_step}: {error}");
                }
                Err(error) => return Err(error),
            }
        }
    }
    Ok(acc)
}

/// Route a freshly built response to the receiver's pulsed inbox or CW
/// interference log
fn route_response(receiver: &Receiver, response: Response) {
    match receiver.mode() {
        OperationMode::Pulsed => receiver.add_response_to_inbox(response),
        OperationMode::Cw => receiver.add_interference_to_log(response),
    }
}

#[allow(clippy::too_many_arguments)]
fn drive_loop(
    queue: &mut EventQueue,
    state: &mut SimulationState,
    entities: &Entities,
    params: &Parameters,
    pool: &ThreadPool,
    sink_factory: &SinkFactory,
    cw_results: &CwResults,
    progress: Option<ProgressCallback<'_>>,
) -> Result<u64> {
    let end_time = params.end_time;
    let dt_sim = 1.0 / params.oversampled_rate();
    let mut events_dispatched = 0u64;

    while state.t_current <= end_time {
        let Some(event) = queue.pop() else {
            break;
        };
        let t_event = event.time;

        // Time-stepped CW integration over [t_current, t_event).
        if t_event > state.t_current {
            let start_index =
                ((state.t_current - params.start_time) / dt_sim).ceil() as usize;
            let end_index = ((t_event - params.start_time) / dt_sim).ceil() as usize;
            for sample_index in start_index..end_index {
                let t_step = params.start_time + sample_index as f64 * dt_sim;
                for receiver in &entities.receivers {
                    if receiver.mode() == OperationMode::Cw && receiver.is_active() {
                        let sample =
                            integrate_cw_sample(receiver, entities, state, t_step, params)?;
                        receiver.set_cw_sample(sample_index, sample);
                    }
                }
            }
        }

        state.t_current = t_event;
        events_dispatched += 1;

        match event.kind {
            EventKind::TxPulsedStart(tx_index) => {
                let transmitter = &entities.transmitters[tx_index];
                for (rx_index, receiver) in entities.receivers.iter().enumerate() {
                    let monostatic_partner = transmitter.attached() == Some(rx_index);
                    if !receiver.flags().no_direct && !monostatic_partner {
                        let response = calculate_response(
                            transmitter,
                            receiver,
                            transmitter.signal(),
                            t_event,
                            None,
                            params,
                        )?;
                        route_response(receiver, response);
                    }
                    for target in &entities.targets {
                        let response = calculate_response(
                            transmitter,
                            receiver,
                            transmitter.signal(),
                            t_event,
                            Some(target),
                            params,
                        )?;
                        route_response(receiver, response);
                    }
                }
                queue.push(
                    t_event + 1.0 / transmitter.prf(),
                    EventKind::TxPulsedStart(tx_index),
                );
            }
            EventKind::RxPulsedWindowStart(rx_index) => {
                let receiver = &entities.receivers[rx_index];
                receiver.set_active(true);
                queue.push(
                    t_event + receiver.window_length(),
                    EventKind::RxPulsedWindowEnd(rx_index),
                );
            }
            EventKind::RxPulsedWindowEnd(rx_index) => {
                let receiver = &entities.receivers[rx_index];
                receiver.set_active(false);
                let job = RenderingJob {
                    ideal_start_time: t_event - receiver.window_length(),
                    duration: receiver.window_length(),
                    responses: receiver.drain_inbox(),
                    active_cw_sources: state
                        .active_cw_transmitters
                        .iter()
                        .map(|&i| (i, Arc::clone(&entities.transmitters[i])))
                        .collect(),
                };
                receiver.enqueue_finalizer_job(job);
                queue.push(
                    t_event - receiver.window_length() + 1.0 / receiver.window_prf(),
                    EventKind::RxPulsedWindowStart(rx_index),
                );
            }
            EventKind::TxCwStart(tx_index) => {
                state.active_cw_transmitters.push(tx_index);
            }
            EventKind::TxCwEnd(tx_index) => {
                state.active_cw_transmitters.retain(|&i| i != tx_index);
            }
            EventKind::RxCwStart(rx_index) => {
                entities.receivers[rx_index].set_active(true);
            }
            EventKind::RxCwEnd(rx_index) => {
                let receiver = &entities.receivers[rx_index];
                receiver.set_active(false);
                let sink = sink_factory(receiver.name())?;
                let task_receiver = Arc::clone(receiver);
                let task_params = params.clone();
                let task_results = Arc::clone(cw_results);
                let name = receiver.name().to_string();
                pool.execute(move || {
                    let outcome = finalize_cw_receiver(task_receiver, task_params, sink);
                    task_results
                        .lock()
                        .expect("cw results poisoned")
                        .push((name, outcome));
                })?;
            }
        }

        report_progress(
            progress,
            &format!(
                "Simulating... {:.2}s / {:.2}s ({})",
                state.t_current,
                end_time,
                event.kind.name()
            ),
            state.t_current,
            end_time,
        );
    }

    Ok(events_dispatched)
}

/// Run the unified event-driven simulation to completion.
///
/// Schedules initial events if the world has not done so, executes the main
/// loop, and joins every finalizer before returning. The summary reports
/// events dispatched and samples emitted per receiver; the first failure
/// from the driver, a finalizer, or a CW task aborts the run.
pub fn run_event_driven_sim(
    world: &mut World,
    pool: &ThreadPool,
    sink_factory: &SinkFactory,
    progress: Option<ProgressCallback<'_>>,
) -> Result<RunSummary> {
    if !world.is_scheduled() {
        world.schedule_initial_events();
    }

    let params = world.params().clone();
    let entities = Entities {
        transmitters: world.transmitters().to_vec(),
        receivers: world.receivers().to_vec(),
        targets: world.targets().to_vec(),
    };

    report_progress(
        progress,
        "Initializing event-driven simulation...",
        0.0,
        params.end_time,
    );

    // Size the CW capture buffers for the whole run.
    let total_samples =
        ((params.end_time - params.start_time) * params.oversampled_rate()).ceil() as usize;
    for receiver in &entities.receivers {
        if receiver.mode() == OperationMode::Cw {
            receiver.prepare_cw_buffer(total_samples);
        }
    }

    // One dedicated finalizer thread per pulsed receiver. A setup failure
    // still falls through to the shutdown phase so threads spawned before
    // the failure are not left blocked on their queues.
    let mut finalizers: Vec<(String, JoinHandle<Result<u64>>)> = Vec::new();
    let mut setup_error: Option<SimError> = None;
    for receiver in &entities.receivers {
        if receiver.mode() != OperationMode::Pulsed {
            continue;
        }
        let setup = receiver
            .take_job_queue()
            .ok_or_else(|| {
                SimError::from(InternalError::JobQueueClaimed {
                    receiver: receiver.name().to_string(),
                })
            })
            .and_then(|jobs| Ok((jobs, sink_factory(receiver.name())?)));
        let (jobs, sink) = match setup {
            Ok(setup) => setup,
            Err(error) => {
                setup_error = Some(error);
                break;
            }
        };
        let task_receiver = Arc::clone(receiver);
        let task_targets = entities.targets.clone();
        let task_params = params.clone();
        let name = receiver.name().to_string();
        let handle = std::thread::Builder::new()
            .name(format!("echosim-finalizer-{name}"))
            .spawn(move || run_pulsed_finalizer(task_receiver, jobs, task_targets, task_params, sink))
            .expect("failed to spawn finalizer thread");
        finalizers.push((name, handle));
    }

    info!("starting unified event-driven simulation loop");
    let cw_results: CwResults = Arc::new(Mutex::new(Vec::new()));

    let loop_result = match setup_error {
        Some(error) => Err(error),
        None => {
            let (queue, state, _) = world.split_queue_and_state();
            drive_loop(
                queue,
                state,
                &entities,
                &params,
                pool,
                sink_factory,
                &cw_results,
                progress,
            )
        }
    };

    // Shutdown phase: poison-pill every pulsed finalizer, drain the pool,
    // join everything. This runs whether or not the loop succeeded so no
    // thread is left blocked on its queue.
    info!("main simulation loop finished; waiting for finalization tasks");
    for receiver in &entities.receivers {
        if receiver.mode() == OperationMode::Pulsed {
            receiver.enqueue_finalizer_job(RenderingJob::shutdown());
        }
    }
    pool.wait();

    let mut summary = RunSummary::default();
    let mut first_error: Option<SimError> = None;

    for (name, handle) in finalizers {
        match handle.join() {
            Ok(Ok(samples)) => {
                summary.samples_emitted.insert(name, samples);
            }
            Ok(Err(error)) => {
                first_error.get_or_insert(error);
            }
            Err(_) => {
                first_error.get_or_insert(InternalError::FinalizerPanicked { receiver: name }.into());
            }
        }
    }
    for (name, outcome) in cw_results.lock().expect("cw results poisoned").drain(..) {
        match outcome {
            Ok(samples) => {
                summary.samples_emitted.insert(name, samples);
            }
            Err(error) => {
                first_error.get_or_insert(error);
            }
        }
    }

    match loop_result {
        Ok(events) => summary.events_dispatched = events,
        Err(error) => return Err(error),
    }
    if let Some(error) = first_error {
        return Err(error);
    }

    report_progress(progress, "Simulation complete", params.end_time, params.end_time);
    info!("event-driven simulation finished");
    Ok(summary)
}
