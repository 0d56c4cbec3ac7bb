use rand::{Rng, SeedableRng, rngs::StdRng};

use super::types::{LoadProvider, Matrix, gaussian_bump, gaussian_noise, hour_of_day};

/// Lower clip of the per-step load multiplier.
const NOISE_MIN: f64 = 0.6;
/// Upper clip of the per-step load multiplier.
const NOISE_MAX: f64 = 1.5;
/// Day-to-day variation of a household's consumption around its average.
const DAILY_SPREAD: f64 = 0.1;

/// A household consumption generator with a morning and an evening peak.
///
/// The daily shape is a constant always-on floor plus two Gaussian peaks
/// (around 07:30 and 19:30), normalized so one day sums to 1. Each agent draws
/// an average daily energy, varies it by up to ±10% per day and applies
/// clipped multiplicative noise per step.
///
/// # Examples
///
/// ```
/// use prosumer_sim::profiles::{DoublePeakLoad, LoadProvider};
///
/// let mut load = DoublePeakLoad::new(8.0, 25.0, 0.15, 24, 42);
/// let matrix = load.load_kwh(3, 24);
/// assert_eq!(matrix.len(), 3);
/// assert!(matrix.iter().flatten().all(|&kwh| kwh >= 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct DoublePeakLoad {
    /// Lower bound of an agent's average daily consumption (kWh).
    pub daily_energy_min_kwh: f64,

    /// Upper bound of an agent's average daily consumption (kWh).
    pub daily_energy_max_kwh: f64,

    /// Standard deviation of the per-step multiplicative noise.
    pub noise_std: f64,

    /// Number of time steps per simulated day.
    steps_per_day: usize,

    rng: StdRng,
}

impl DoublePeakLoad {
    /// Creates a new load generator.
    ///
    /// # Arguments
    ///
    /// * `daily_energy_min_kwh` - Lower bound of the average daily energy
    /// * `daily_energy_max_kwh` - Upper bound of the average daily energy
    /// * `noise_std` - Standard deviation of the per-step noise (e.g. 0.15)
    /// * `steps_per_day` - Resolution of one simulated day
    /// * `seed` - Random seed for reproducible profiles
    pub fn new(
        daily_energy_min_kwh: f64,
        daily_energy_max_kwh: f64,
        noise_std: f64,
        steps_per_day: usize,
        seed: u64,
    ) -> Self {
        let lo = daily_energy_min_kwh.max(0.0);
        Self {
            daily_energy_min_kwh: lo,
            daily_energy_max_kwh: daily_energy_max_kwh.max(lo),
            noise_std: noise_std.max(0.0),
            steps_per_day: steps_per_day.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Normalized daily shape, one entry per step of the day, summing to 1.
    pub fn daily_shape(&self) -> Vec<f64> {
        let raw: Vec<f64> = (0..self.steps_per_day)
            .map(|t| {
                let h = hour_of_day(t, self.steps_per_day);
                0.4 + 1.2 * gaussian_bump(h, 7.5, 1.5) + 1.6 * gaussian_bump(h, 19.5, 2.0)
            })
            .collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|v| v / total).collect()
    }
}

impl LoadProvider for DoublePeakLoad {
    fn load_kwh(&mut self, agents: usize, steps: usize) -> Matrix {
        let shape = self.daily_shape();
        let mut loads = Vec::with_capacity(agents);

        for _ in 0..agents {
            let average_kwh = self
                .rng
                .random_range(self.daily_energy_min_kwh..=self.daily_energy_max_kwh);
            let mut daily_kwh = average_kwh;
            let mut row = Vec::with_capacity(steps);

            for t in 0..steps {
                if t % self.steps_per_day == 0 {
                    let spread = self.rng.random_range(-DAILY_SPREAD..=DAILY_SPREAD);
                    daily_kwh = average_kwh * (1.0 + spread);
                }
                let noise = (1.0 + gaussian_noise(&mut self.rng, self.noise_std))
                    .clamp(NOISE_MIN, NOISE_MAX);
                row.push(daily_kwh * shape[t % self.steps_per_day] * noise);
            }
            loads.push(row);
        }

        loads
    }
}
