//! Asynchronous receiver finalization pipelines
//!
//! One dedicated finalizer per pulsed receiver consumes rendering jobs and
//! turns each receive window into an output chunk: thermal noise, CW
//! interference, pulse rendering, clock phase noise, decimation, and ADC
//! quantization. CW receivers get a single one-shot finalization pass over
//! their simulation-long buffer.

use std::f64::consts::TAU;
use std::sync::Arc;

use crossbeam::channel::Receiver as ChannelReceiver;
use log::{debug, info, warn};
use num_complex::Complex64;
use rayon::prelude::*;

use crate::channel::{direct_cw, is_range_error, reflected_cw};
use crate::errors::Result;
use crate::noise::{noise_temperature_to_power, WgnGenerator};
use crate::output::{CwAttributes, OutputSink};
use crate::params::Parameters;
use crate::response::Response;
use crate::signal_processing::{downsample, InterpFilter};
use crate::world::radar::{Receiver, Transmitter};
use crate::world::target::Target;

/// Everything a finalizer needs to synthesize one receive window
pub struct RenderingJob {
    pub ideal_start_time: f64,
    pub duration: f64,
    pub responses: Vec<Response>,
    /// Snapshot of the CW transmitters active when the window closed, with
    /// their arena indices
    pub active_cw_sources: Vec<(usize, Arc<Transmitter>)>,
}

impl RenderingJob {
    /// Sentinel job telling the finalizer to exit
    pub fn shutdown() -> Self {
        Self {
            ideal_start_time: 0.0,
            duration: -1.0,
            responses: Vec::new(),
            active_cw_sources: Vec::new(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.duration < 0.0
    }
}

/// Add complex white Gaussian noise for the given temperature. Noise power
/// is k_B * T * B over the output bandwidth, split evenly between I and Q.
/// The window is synthesized at the oversampled rate, so the bandwidth
/// carries the oversample ratio in its denominator.
fn apply_thermal_noise(
    window: &mut [Complex64],
    noise_temperature: f64,
    receiver: &Receiver,
    params: &Parameters,
) {
    if noise_temperature == 0.0 {
        return;
    }
    let bandwidth = params.rate / (2.0 * params.oversample_ratio as f64);
    let total_power = noise_temperature_to_power(noise_temperature, bandwidth);
    let generator = WgnGenerator::new((total_power / 2.0).sqrt());
    receiver.with_rng(|rng| {
        for sample in window.iter_mut() {
            *sample += Complex64::new(generator.sample(rng), generator.sample(rng));
        }
    });
}

/// Multiply each window sample by e^{j * noise} to impose clock phase noise
fn apply_phase_noise(noise: &[f64], window: &mut [Complex64]) {
    for (sample, &phi) in window.iter_mut().zip(noise.iter()) {
        *sample *= Complex64::from_polar(1.0, phi);
    }
}

/// ADC quantization: mid-tread uniform quantizer over +-fullscale with
/// 2^(bits-1) levels, clamped to [-1, 1]
fn adc_simulate(window: &mut [Complex64], bits: u32, fullscale: f64) {
    if fullscale == 0.0 {
        return;
    }
    let levels = 2f64.powi(bits as i32 - 1);
    for sample in window.iter_mut() {
        let i = ((levels * sample.re / fullscale).floor() / levels).clamp(-1.0, 1.0);
        let q = ((levels * sample.im / fullscale).floor() / levels).clamp(-1.0, 1.0);
        *sample = Complex64::new(i, q);
    }
}

/// Quantize (or amplitude-normalize when adc_bits is 0) and return the
/// full-scale value of the window before scaling
pub(crate) fn quantize_and_scale(window: &mut [Complex64], params: &Parameters) -> f64 {
    let mut max_value = 0.0f64;
    for sample in window.iter() {
        max_value = max_value.max(sample.re.abs()).max(sample.im.abs());
    }
    if params.adc_bits > 0 {
        adc_simulate(window, params.adc_bits, max_value);
    } else if max_value != 0.0 {
        for sample in window.iter_mut() {
            *sample /= max_value;
        }
    }
    max_value
}

/// Render every response overlapping the window and accumulate the results
/// at their sample-aligned offsets, clipping at the window boundaries.
/// Responses render in parallel; accumulation is sequential.
fn render_window(
    window: &mut [Complex64],
    duration: f64,
    start: f64,
    frac_delay: f64,
    responses: &[Response],
    rate: f64,
    interp: &InterpFilter,
) -> Result<()> {
    let end = start + duration;
    let rendered: Vec<(f64, Vec<Complex64>)> = responses
        .par_iter()
        .filter(|r| r.start_time() <= end && r.end_time() >= start)
        .map(|r| {
            r.render(frac_delay, interp)
                .map(|(_, samples)| (r.start_time(), samples))
        })
        .collect::<Result<Vec<_>>>()?;

    for (response_start, samples) in rendered {
        let mut start_sample = (rate * (response_start - start)).round() as isize;
        let mut offset = 0usize;
        if start_sample < 0 {
            offset = (-start_sample) as usize;
            start_sample = 0;
        }
        for (i, sample) in samples.iter().enumerate().skip(offset) {
            let index = start_sample as usize + i - offset;
            if index >= window.len() {
                break;
            }
            window[index] += *sample;
        }
    }
    Ok(())
}

/// Sum the CW interference from the given sources into one sample time.
/// Degenerate geometry contributes zero and logs a warning.
fn cw_interference_sample(
    receiver: &Receiver,
    sources: &[(usize, Arc<Transmitter>)],
    targets: &[Arc<Target>],
    t_sample: f64,
    params: &Parameters,
) -> Result<Complex64> {
    let mut acc = Complex64::new(0.0, 0.0);
    for (index, source) in sources {
        let monostatic_partner = receiver.attached() == Some(*index);
        if !receiver.flags().no_direct && !monostatic_partner {
            match direct_cw(source, receiver, t_sample, params) {
                Ok(sample) => acc += sample,
                Err(error) if is_range_error(&error) => {
                    warn!("direct CW interference degenerate at t={t_sample}: {error}");
                }
                Err(error) => return Err(error),
            }
        }
        for target in targets {
            match reflected_cw(source, receiver, target, t_sample, params) {
                Ok(sample) => acc += sample,
                Err(error) if is_range_error(&error) => {
                    warn!("reflected CW interference degenerate at t={t_sample}: {error}");
                }
                Err(error) => return Err(error),
            }
        }
    }
    Ok(acc)
}

/// Dedicated finalizer loop for one pulsed receiver. Runs until a shutdown
/// job arrives; returns the number of samples emitted to the sink.
pub(crate) fn run_pulsed_finalizer(
    receiver: Arc<Receiver>,
    jobs: ChannelReceiver<RenderingJob>,
    targets: Vec<Arc<Target>>,
    params: Parameters,
    mut sink: Box<dyn OutputSink>,
) -> Result<u64> {
    // Private clock state: never shared with the driver thread.
    let mut timing = receiver.timing().clone_for_thread();
    let interp = InterpFilter::new(params.render_filter_length);
    let rate = params.oversampled_rate();
    let dt = 1.0 / rate;

    let mut chunk_index = 0u32;
    let mut samples_emitted = 0u64;
    info!("finalizer started for receiver '{}'", receiver.name());

    while let Ok(job) = jobs.recv() {
        if job.is_shutdown() {
            break;
        }

        let window_samples = (job.duration * rate).ceil() as usize;
        let mut pnoise = vec![0.0f64; window_samples];
        let mut actual_start = job.ideal_start_time;

        if timing.enabled() {
            // Advance the private clock model to this window.
            if timing.sync_on_pulse() {
                timing.reset();
                timing.skip_samples((rate * receiver.window_skip()).floor() as usize);
            } else {
                let inter_pulse_gap = 1.0 / receiver.window_prf() - receiver.window_length();
                timing.skip_samples((rate * inter_pulse_gap).floor().max(0.0) as usize);
            }
            for slot in pnoise.iter_mut() {
                *slot = timing.next_sample();
            }
            // The first noise sample displaces the window start.
            actual_start += pnoise[0] / (TAU * timing.frequency());
        }

        // Split the jittered start into a sample-aligned time and the
        // residual fractional delay.
        let frac_delay = actual_start * rate - (actual_start * rate).round();
        actual_start = (actual_start * rate).round() / rate;

        let mut window = vec![Complex64::new(0.0, 0.0); window_samples];

        let boresight = receiver.rotation(actual_start)?;
        apply_thermal_noise(
            &mut window,
            receiver.noise_temperature_toward(&boresight),
            &receiver,
            &params,
        );

        if !job.active_cw_sources.is_empty() {
            for (i, slot) in window.iter_mut().enumerate() {
                let t_sample = actual_start + i as f64 * dt;
                *slot += cw_interference_sample(
                    &receiver,
                    &job.active_cw_sources,
                    &targets,
                    t_sample,
                    &params,
                )?;
            }
        }

        render_window(
            &mut window,
            job.duration,
            actual_start,
            frac_delay,
            &job.responses,
            rate,
            &interp,
        )?;

        if timing.enabled() {
            apply_phase_noise(&pnoise, &mut window);
        }

        if params.oversample_ratio > 1 {
            window = downsample(
                &window,
                params.oversample_ratio as usize,
                params.render_filter_length,
            );
        }

        let fullscale = quantize_and_scale(&mut window, &params);

        sink.add_chunk(&window, actual_start, fullscale, chunk_index)?;
        samples_emitted += window.len() as u64;
        chunk_index += 1;
        debug!(
            "receiver '{}' emitted chunk {} ({} samples)",
            receiver.name(),
            chunk_index,
            window.len()
        );
    }

    sink.close()?;
    info!("finalizer finished for receiver '{}'", receiver.name());
    Ok(samples_emitted)
}

/// One-shot finalization of a CW receiver's simulation-long buffer:
/// overlay logged pulsed interference, add thermal noise and phase noise,
/// decimate, quantize, and write a single dataset.
pub(crate) fn finalize_cw_receiver(
    receiver: Arc<Receiver>,
    params: Parameters,
    mut sink: Box<dyn OutputSink>,
) -> Result<u64> {
    let mut iq_buffer = receiver.take_cw_buffer();
    if iq_buffer.is_empty() {
        info!("no CW data to finalize for receiver '{}'", receiver.name());
        return Ok(0);
    }

    let interp = InterpFilter::new(params.render_filter_length);

    // Render pulsed interference into the main buffer at its sample
    // positions.
    for response in receiver.take_interference_log() {
        let (pulse_rate, rendered) = response.render(0.0, &interp)?;
        let start_index = ((response.start_time() - params.start_time) * pulse_rate) as usize;
        for (i, sample) in rendered.iter().enumerate() {
            if let Some(slot) = iq_buffer.get_mut(start_index + i) {
                *slot += *sample;
            }
        }
    }

    let mut timing = receiver.timing().clone_for_thread();

    apply_thermal_noise(
        &mut iq_buffer,
        receiver.noise_temperature(),
        &receiver,
        &params,
    );

    if timing.enabled() {
        let pnoise: Vec<f64> = (0..iq_buffer.len()).map(|_| timing.next_sample()).collect();
        apply_phase_noise(&pnoise, &mut iq_buffer);
    }

    if params.oversample_ratio > 1 {
        iq_buffer = downsample(
            &iq_buffer,
            params.oversample_ratio as usize,
            params.render_filter_length,
        );
    }

    quantize_and_scale(&mut iq_buffer, &params);

    let attributes = CwAttributes {
        sampling_rate: params.rate,
        start_time: params.start_time,
        reference_carrier_frequency: timing.frequency(),
    };
    sink.write_cw(&iq_buffer, &attributes)?;
    sink.close()?;
    info!("CW data finalized for receiver '{}'", receiver.name());
    Ok(iq_buffer.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_job_is_flagged() {
        assert!(RenderingJob::shutdown().is_shutdown());
    }

    #[test]
    fn adc_one_bit_produces_signed_levels() {
        let mut window = vec![
            Complex64::new(1.0, -1.0),
            Complex64::new(0.4, -0.4),
            Complex64::new(-1.0, 0.99),
        ];
        adc_simulate(&mut window, 1, 1.0);
        for sample in &window {
            for value in [sample.re, sample.im] {
                assert!(
                    value == -1.0 || value == 0.0 || value == 1.0,
                    "unexpected level {value}"
                );
            }
        }
        assert_eq!(window[0], Complex64::new(1.0, -1.0));
    }

    #[test]
    fn zero_bits_normalizes_to_unit_peak() {
        let params = Parameters::default();
        let mut window = vec![Complex64::new(0.5, 0.0), Complex64::new(-2.0, 1.0)];
        let fullscale = quantize_and_scale(&mut window, &params);
        assert_eq!(fullscale, 2.0);
        let peak = window
            .iter()
            .map(|s| s.re.abs().max(s.im.abs()))
            .fold(0.0f64, f64::max);
        assert!((peak - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quantizer_clamps_to_unit_range() {
        let mut window = vec![Complex64::new(3.0, -3.0)];
        adc_simulate(&mut window, 4, 1.0);
        assert_eq!(window[0], Complex64::new(1.0, -1.0));
    }

    #[test]
    fn phase_noise_rotates_samples() {
        let mut window = vec![Complex64::new(1.0, 0.0)];
        apply_phase_noise(&[std::f64::consts::FRAC_PI_2], &mut window);
        assert!((window[0].re).abs() < 1e-12);
        assert!((window[0].im - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_window_quantizes_to_zero_fullscale() {
        let params = Parameters::default();
        let mut window = vec![Complex64::new(0.0, 0.0); 4];
        let fullscale = quantize_and_scale(&mut window, &params);
        assert_eq!(fullscale, 0.0);
        assert!(window.iter().all(|s| s.re == 0.0 && s.im == 0.0));
    }
}
