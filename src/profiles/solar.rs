use rand::{Rng, SeedableRng, rngs::StdRng};

use super::types::{Matrix, ProductionProvider, gaussian_bump, gaussian_noise, hour_of_day};

/// Lower clip of the per-step PV multiplier.
const NOISE_MIN: f64 = 0.7;
/// Upper clip of the per-step PV multiplier.
const NOISE_MAX: f64 = 1.3;

/// A photovoltaic production generator with a bell-shaped daily profile.
///
/// The first `pv_share` fraction of agents receive a random installed
/// capacity in `[0, capacity_max_kw]`; the remaining agents are pure consumers
/// with zero capacity. Each simulated day draws one weather factor shared by
/// the whole community (sunny vs. cloudy), and each agent gets clipped
/// multiplicative noise per step.
///
/// Output is energy per step (kWh), i.e. power scaled by the step length
/// `24 / steps_per_day` hours.
#[derive(Debug, Clone)]
pub struct BellCurvePv {
    /// Upper bound of the installed capacity of a generating agent (kW).
    pub capacity_max_kw: f64,

    /// Fraction of agents (by id order) that own a PV installation.
    pub pv_share: f64,

    /// Hour of peak irradiance.
    pub peak_hour: f64,

    /// Width (standard deviation) of the bell in hours.
    pub width_hours: f64,

    /// Standard deviation of the per-step multiplicative noise.
    pub noise_std: f64,

    /// Range of the per-day weather factor.
    pub day_factor: (f64, f64),

    steps_per_day: usize,

    rng: StdRng,
}

impl BellCurvePv {
    /// Creates a new PV generator.
    ///
    /// # Arguments
    ///
    /// * `capacity_max_kw` - Upper bound of installed capacity
    /// * `pv_share` - Fraction of agents with generation capacity (clamped to `[0, 1]`)
    /// * `peak_hour` - Hour of peak production (typically 12)
    /// * `width_hours` - Bell width in hours (typically 3)
    /// * `noise_std` - Per-step noise standard deviation (e.g. 0.05)
    /// * `day_factor` - `(min, max)` of the daily weather multiplier
    /// * `steps_per_day` - Resolution of one simulated day
    /// * `seed` - Random seed for reproducible profiles
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        capacity_max_kw: f64,
        pv_share: f64,
        peak_hour: f64,
        width_hours: f64,
        noise_std: f64,
        day_factor: (f64, f64),
        steps_per_day: usize,
        seed: u64,
    ) -> Self {
        let lo = day_factor.0.max(0.0);
        Self {
            capacity_max_kw: capacity_max_kw.max(0.0),
            pv_share: pv_share.clamp(0.0, 1.0),
            peak_hour,
            width_hours,
            noise_std: noise_std.max(0.0),
            day_factor: (lo, day_factor.1.max(lo)),
            steps_per_day: steps_per_day.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Daily production shape normalized to a peak of 1.
    pub fn daily_shape(&self) -> Vec<f64> {
        let raw: Vec<f64> = (0..self.steps_per_day)
            .map(|t| {
                gaussian_bump(
                    hour_of_day(t, self.steps_per_day),
                    self.peak_hour,
                    self.width_hours,
                )
            })
            .collect();
        let peak = raw.iter().copied().fold(0.0_f64, f64::max);
        if peak <= 0.0 {
            return raw;
        }
        raw.into_iter().map(|v| v / peak).collect()
    }

    /// Number of agents that own generation capacity out of `agents`.
    pub fn generating_agents(&self, agents: usize) -> usize {
        (self.pv_share * agents as f64).floor() as usize
    }
}

impl ProductionProvider for BellCurvePv {
    fn production_kwh(&mut self, agents: usize, steps: usize) -> (Matrix, Vec<f64>) {
        let shape = self.daily_shape();
        let dt_hours = 24.0 / self.steps_per_day as f64;
        let generating = self.generating_agents(agents);

        let capacities: Vec<f64> = (0..agents)
            .map(|i| {
                if i < generating {
                    self.rng.random_range(0.0..=self.capacity_max_kw)
                } else {
                    0.0
                }
            })
            .collect();

        let days = steps.div_ceil(self.steps_per_day);
        let (lo, hi) = self.day_factor;
        let day_factors: Vec<f64> = (0..days)
            .map(|_| self.rng.random_range(lo..=hi))
            .collect();

        let mut production = Vec::with_capacity(agents);
        for &capacity in &capacities {
            let mut row = Vec::with_capacity(steps);
            for t in 0..steps {
                if capacity <= 0.0 {
                    row.push(0.0);
                    continue;
                }
                let noise = (1.0 + gaussian_noise(&mut self.rng, self.noise_std))
                    .clamp(NOISE_MIN, NOISE_MAX);
                let kw = capacity
                    * shape[t % self.steps_per_day]
                    * day_factors[t / self.steps_per_day]
                    * noise;
                row.push(kw * dt_hours);
            }
            production.push(row);
        }

        (production, capacities)
    }
}
