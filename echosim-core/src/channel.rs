//! Radar channel propagation and interaction models
//!
//! The core physics: given geometry, velocity, and object characteristics,
//! solve the (bistatic) radar equation and relativistic Doppler for pulsed
//! responses, and produce per-sample complex-envelope contributions for
//! continuous-wave operation.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;

use crate::errors::{RangeError, Result, SimError};
use crate::geometry::{SVec3, Vec3};
use crate::params::{Parameters, EPSILON};
use crate::response::{InterpPoint, Response};
use crate::waveform::RadarSignal;
use crate::world::radar::{Receiver, Transmitter};
use crate::world::target::Target;

/// Intermediate results of one radar-equation solve at one time point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSolution {
    /// Power scaling factor relative to transmitted power
    pub power: f64,
    /// Propagation delay in seconds
    pub delay: f64,
    /// Relativistic Doppler factor f_recv / f_trans
    pub doppler_factor: f64,
    /// Phase shift in radians due to propagation delay
    pub phase: f64,
    /// Receiver noise temperature at arrival time
    pub noise_temperature: f64,
}

fn lorentz_gamma(beta: &Vec3) -> f64 {
    1.0 / (1.0 - beta.dot(beta)).sqrt()
}

/// Reduce x*2*pi to a numerically safe phase even when x is enormous
fn phase_2pi(x: f64) -> f64 {
    2.0 * PI * x.fract()
}

/// Solve the bistatic radar equation for a reflected path Tx -> Tgt -> Rx.
///
/// `length` is the duration used for the finite-difference velocity
/// estimate. Receiver gain and noise temperature are evaluated at the
/// arrival time `time + delay`.
pub fn solve_reflected(
    tx: &Transmitter,
    rx: &Receiver,
    target: &Target,
    time: f64,
    length: f64,
    signal: &RadarSignal,
    params: &Parameters,
) -> Result<PathSolution> {
    let tx_position = tx.position(time)?;
    let rx_position = rx.position(time)?;
    let tgt_position = target.platform().position(time)?;

    let tx_to_tgt = SVec3::from(tgt_position - tx_position);
    let rx_to_tgt = SVec3::from(tgt_position - rx_position);
    let tx_to_tgt_distance = tx_to_tgt.length;
    let rx_to_tgt_distance = rx_to_tgt.length;

    if tx_to_tgt_distance <= EPSILON || rx_to_tgt_distance <= EPSILON {
        return Err(RangeError {
            object: "target",
            time,
        }
        .into());
    }

    let delay = (tx_to_tgt_distance + rx_to_tgt_distance) / params.c;

    let rcs = target.rcs(&tx_to_tgt.direction(), &rx_to_tgt.direction());
    let wavelength = params.c / signal.carrier();

    let tx_gain = tx.gain(&tx_to_tgt.direction(), &tx.rotation(time)?, wavelength);
    let rx_gain = rx.gain(
        &rx_to_tgt.direction(),
        &rx.rotation(time + delay)?,
        wavelength,
    );

    let mut power = tx_gain * rx_gain * rcs / (4.0 * PI);
    if !rx.flags().no_propagation_loss {
        let distance_product = tx_to_tgt_distance * rx_to_tgt_distance;
        power *= wavelength * wavelength / ((4.0 * PI).powi(2) * distance_product.powi(2));
    }

    let phase = -delay * 2.0 * PI * signal.carrier();

    // Relativistic Doppler from finite-difference velocities.
    let c = params.c;
    let tx_vel = (tx.position(time + length)? - tx_position) / length;
    let rx_vel = (rx.position(time + length)? - rx_position) / length;
    let tgt_vel = (target.platform().position(time + length)? - tgt_position) / length;

    let u_ttgt = (tgt_position - tx_position).normalized();
    let u_tgtr = (rx_position - tgt_position).normalized();

    let beta_t = tx_vel / c;
    let beta_r = rx_vel / c;
    let beta_tgt = tgt_vel / c;

    let gamma_t = lorentz_gamma(&beta_t);
    let gamma_r = lorentz_gamma(&beta_r);

    let term1 = (1.0 - beta_tgt.dot(&u_ttgt)) / (1.0 - beta_t.dot(&u_ttgt));
    let term2 = (1.0 - beta_r.dot(&u_tgtr)) / (1.0 - beta_tgt.dot(&u_tgtr));
    let doppler_factor = term1 * term2 * (gamma_r / gamma_t);

    let noise_temperature = rx.noise_temperature_toward(&rx.rotation(time + delay)?);

    Ok(PathSolution {
        power,
        delay,
        doppler_factor,
        phase,
        noise_temperature,
    })
}

/// Solve the radar equation for the direct path Tx -> Rx
pub fn solve_direct(
    tx: &Transmitter,
    rx: &Receiver,
    time: f64,
    length: f64,
    signal: &RadarSignal,
    params: &Parameters,
) -> Result<PathSolution> {
    let tx_position = tx.position(time)?;
    let rx_position = rx.position(time)?;

    let transvec = SVec3::from(tx_position - rx_position);
    let distance = transvec.length;

    if distance <= EPSILON {
        return Err(RangeError {
            object: "receiver",
            time,
        }
        .into());
    }

    let delay = distance / params.c;

    let wavelength = params.c / signal.carrier();
    let tx_gain = tx.gain(&transvec.direction(), &tx.rotation(time)?, wavelength);
    let rx_gain = rx.gain(
        &SVec3::from(rx_position - tx_position).direction(),
        &rx.rotation(time + delay)?,
        wavelength,
    );

    let mut power = tx_gain * rx_gain * wavelength * wavelength / (4.0 * PI);
    if !rx.flags().no_propagation_loss {
        power /= 4.0 * PI * distance * distance;
    }

    let c = params.c;
    let tx_vel = (tx.position(time + length)? - tx_position) / length;
    let rx_vel = (rx.position(time + length)? - rx_position) / length;

    let u_tr = (rx_position - tx_position) / distance;

    let beta_t = tx_vel / c;
    let beta_r = rx_vel / c;

    let gamma_t = lorentz_gamma(&beta_t);
    let gamma_r = lorentz_gamma(&beta_r);

    let doppler_factor =
        ((1.0 - beta_r.dot(&u_tr)) / (1.0 - beta_t.dot(&u_tr))) * (gamma_r / gamma_t);

    let phase = -delay * 2.0 * PI * signal.carrier();
    let noise_temperature = rx.noise_temperature_toward(&rx.rotation(time + delay)?);

    Ok(PathSolution {
        power,
        delay,
        doppler_factor,
        phase,
        noise_temperature,
    })
}

/// Build a Response by sampling a pulse's interaction over its duration.
///
/// Steps through the pulse at the channel-model sample rate, solving the
/// direct path (no target) or reflected path (with target) at each point,
/// and collects the results as interpolation points.
pub fn calculate_response(
    tx: &Transmitter,
    rx: &Receiver,
    signal: &Arc<RadarSignal>,
    start_time: f64,
    target: Option<&Target>,
    params: &Parameters,
) -> Result<Response> {
    let length = signal.length();
    let sample_time = 1.0 / params.sim_sample_rate;
    let point_count = (length / sample_time).ceil() as usize;

    let mut response = Response::new(tx.name(), Arc::clone(signal));
    for i in 0..=point_count {
        let current = if i < point_count {
            start_time + i as f64 * sample_time
        } else {
            start_time + length
        };
        let solution = match target {
            Some(target) => solve_reflected(tx, rx, target, current, sample_time, signal, params)?,
            None => solve_direct(tx, rx, current, sample_time, signal, params)?,
        };
        response.add_point(InterpPoint {
            power: solution.power,
            time: current + solution.delay,
            delay: solution.delay,
            doppler_factor: solution.doppler_factor,
            phase: solution.phase,
            noise_temperature: solution.noise_temperature,
        });
    }
    Ok(response)
}

/// Complex-envelope contribution of the direct path at one instant, for CW
/// reception. Includes the non-coherent local-oscillator phase from the
/// transmitter/receiver clock offset difference.
pub fn direct_cw(
    tx: &Transmitter,
    rx: &Receiver,
    time: f64,
    params: &Parameters,
) -> Result<Complex64> {
    let tx_position = tx.position(time)?;
    let rx_position = rx.position(time)?;

    let tx_to_rx = rx_position - tx_position;
    let range = tx_to_rx.length();
    if range <= EPSILON {
        return Err(RangeError {
            object: "receiver",
            time,
        }
        .into());
    }

    let u = tx_to_rx / range;
    let tau = range / params.c;
    let signal = tx.signal();
    let carrier = signal.carrier();
    let wavelength = params.c / carrier;

    let tx_gain = tx.gain(&SVec3::from(u).direction(), &tx.rotation(time)?, wavelength);
    let rx_gain = rx.gain(
        &SVec3::from(-u).direction(),
        &rx.rotation(time + tau)?,
        wavelength,
    );

    let mut power_scaling =
        signal.power() * tx_gain * rx_gain * wavelength * wavelength / (4.0 * PI).powi(2);
    if !rx.flags().no_propagation_loss {
        power_scaling /= range * range;
    }
    let amplitude = power_scaling.sqrt();

    let phase = -phase_2pi(carrier * tau);
    let mut contribution = Complex64::from_polar(amplitude, phase);

    let delta_f = tx.timing().freq_offset() - rx.timing().freq_offset();
    let delta_phi = tx.timing().phase_offset() - rx.timing().phase_offset();
    let non_coherent_phase = phase_2pi(delta_f * time) + delta_phi;
    contribution *= Complex64::from_polar(1.0, non_coherent_phase);

    Ok(contribution)
}

/// Complex-envelope contribution of a reflected path at one instant, for CW
/// reception
pub fn reflected_cw(
    tx: &Transmitter,
    rx: &Receiver,
    target: &Target,
    time: f64,
    params: &Parameters,
) -> Result<Complex64> {
    let tx_position = tx.position(time)?;
    let rx_position = rx.position(time)?;
    let tgt_position = target.platform().position(time)?;

    let tx_to_tgt = tgt_position - tx_position;
    let tgt_to_rx = rx_position - tgt_position;
    let r_tx = tx_to_tgt.length();
    let r_rx = tgt_to_rx.length();
    if r_tx <= EPSILON || r_rx <= EPSILON {
        return Err(RangeError {
            object: "target",
            time,
        }
        .into());
    }

    let u_in = tx_to_tgt / r_tx;
    let u_out = tgt_to_rx / r_rx;

    let tau = (r_tx + r_rx) / params.c;
    let signal = tx.signal();
    let carrier = signal.carrier();
    let wavelength = params.c / carrier;

    let rcs = target.rcs(
        &SVec3::from(u_in).direction(),
        &SVec3::from(-u_out).direction(),
    );
    let tx_gain = tx.gain(&SVec3::from(u_in).direction(), &tx.rotation(time)?, wavelength);
    let rx_gain = rx.gain(
        &SVec3::from(-u_out).direction(),
        &rx.rotation(time + tau)?,
        wavelength,
    );

    let mut power_scaling = signal.power() * tx_gain * rx_gain * rcs * wavelength * wavelength
        / (4.0 * PI).powi(3);
    if !rx.flags().no_propagation_loss {
        power_scaling /= r_tx * r_tx * r_rx * r_rx;
    }
    let amplitude = power_scaling.sqrt();

    let phase = -phase_2pi(carrier * tau);
    let mut contribution = Complex64::from_polar(amplitude, phase);

    let delta_f = tx.timing().freq_offset() - rx.timing().freq_offset();
    let delta_phi = tx.timing().phase_offset() - rx.timing().phase_offset();
    let non_coherent_phase = phase_2pi(delta_f * time) + delta_phi;
    contribution *= Complex64::from_polar(1.0, non_coherent_phase);

    Ok(contribution)
}

/// True if the error is a degenerate-geometry range error
pub fn is_range_error(error: &SimError) -> bool {
    matches!(error, SimError::Range(_))
}
