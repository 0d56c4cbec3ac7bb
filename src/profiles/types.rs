//! Provider contracts and shared helpers for exogenous input series.

use rand::{Rng, rngs::StdRng};

/// Per-agent, per-step values indexed as `matrix[agent][step]`.
pub type Matrix = Vec<Vec<f64>>;

/// Source of household consumption.
pub trait LoadProvider {
    /// Returns a non-negative consumption matrix in kWh per step.
    fn load_kwh(&mut self, agents: usize, steps: usize) -> Matrix;
}

/// Source of photovoltaic production.
pub trait ProductionProvider {
    /// Returns a non-negative production matrix in kWh per step together with
    /// the installed capacity of every agent in kW.
    ///
    /// A capacity of `0.0` marks a pure consumer whose production row is all zeros.
    fn production_kwh(&mut self, agents: usize, steps: usize) -> (Matrix, Vec<f64>);
}

/// Source of grid tariffs.
pub trait PriceProvider {
    /// Returns the per-step grid price series and the constant feed-in tariff
    /// (both in currency per kWh).
    fn prices(&mut self, steps: usize) -> (Vec<f64>, f64);
}

/// Generates Gaussian noise using the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given
/// standard deviation, or `0.0` when `std_dev <= 0`.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Hour of day in `[0, 24)` for step `t`, repeating every `steps_per_day` steps.
pub fn hour_of_day(t: usize, steps_per_day: usize) -> f64 {
    let spd = steps_per_day.max(1);
    (t % spd) as f64 * 24.0 / spd as f64
}

/// Unnormalized Gaussian bump centred on `centre_hr` with width `width_hr`.
pub fn gaussian_bump(hour: f64, centre_hr: f64, width_hr: f64) -> f64 {
    if width_hr <= 0.0 {
        return 0.0;
    }
    let z = (hour - centre_hr) / width_hr;
    (-0.5 * z * z).exp()
}
