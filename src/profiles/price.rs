use rand::{SeedableRng, rngs::StdRng};

use super::types::{PriceProvider, gaussian_noise, hour_of_day};

/// A retail grid tariff with a daily peak and a constant feed-in tariff.
///
/// ```text
/// price(h) = clamp(base + amplitude * cos²(π (h - peak_hour) / 24) + noise, floor, cap)
/// ```
///
/// The wave reaches `base + amplitude` at `peak_hour` and `base` twelve hours
/// later. All prices are in currency per kWh.
#[derive(Debug, Clone)]
pub struct RetailTariff {
    /// Off-peak price level.
    pub base: f64,
    /// Peak surcharge on top of `base`.
    pub amplitude: f64,
    /// Hour of the most expensive tariff.
    pub peak_hour: f64,
    /// Standard deviation of additive per-step noise.
    pub noise_std: f64,
    /// Lowest admissible grid price.
    pub floor: f64,
    /// Highest admissible grid price.
    pub cap: f64,
    /// Constant price paid for exported surplus.
    pub feed_in: f64,
    steps_per_day: usize,
    rng: StdRng,
}

impl RetailTariff {
    /// Creates a new tariff generator.
    ///
    /// Swapped bounds are reordered so that `floor <= cap`.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        base: f64,
        amplitude: f64,
        peak_hour: f64,
        noise_std: f64,
        floor: f64,
        cap: f64,
        feed_in: f64,
        steps_per_day: usize,
        seed: u64,
    ) -> Self {
        let (floor, cap) = if floor <= cap { (floor, cap) } else { (cap, floor) };
        Self {
            base,
            amplitude,
            peak_hour,
            noise_std: noise_std.max(0.0),
            floor,
            cap,
            feed_in: feed_in.max(0.0),
            steps_per_day: steps_per_day.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Noise-free tariff at hour `h`.
    pub fn shape_at(&self, hour: f64) -> f64 {
        let phase = std::f64::consts::PI * (hour - self.peak_hour) / 24.0;
        self.base + self.amplitude * phase.cos().powi(2)
    }
}

impl PriceProvider for RetailTariff {
    fn prices(&mut self, steps: usize) -> (Vec<f64>, f64) {
        let series = (0..steps)
            .map(|t| {
                let h = hour_of_day(t, self.steps_per_day);
                let noisy = self.shape_at(h) + gaussian_noise(&mut self.rng, self.noise_std);
                noisy.clamp(self.floor, self.cap)
            })
            .collect();
        (series, self.feed_in)
    }
}
