//! Synthetic sensor readings with injected spikes.
//!
//! Each tick draws a baseline temperature and humidity uniformly from the
//! configured bands, then adds a ramp offset: temperature rises and humidity
//! falls linearly over `spike_countdown` ticks, plus up to [`JITTER`] of noise.
//! A ramp starts at random with probability
//! [`GeneratorConfig::trigger_probability`] and, once started, runs to
//! completion unless `spike_interval` seconds pass since the last reset.
//!
//! All ramp bookkeeping lives in a [`SpikeState`] owned by exactly one
//! [`SpikeGenerator`]. Independent simulated devices use independent
//! generators.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GeneratorConfig;
use crate::error::ConfigError;
use crate::telemetry::TelemetrySample;

/// Upper bound of the noise added to a ramp offset.
pub const JITTER: f64 = 0.3;

/// Ramp bookkeeping, mutated once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeState {
    /// Last time the ramp was reset by the interval check.
    pub last_spike_time: Instant,
    /// Position within the current ramp, always below `spike_countdown`
    /// between ticks.
    pub spike_count: u32,
    pub temperature_increase: f64,
    pub humidity_decrease: f64,
}

impl SpikeState {
    pub fn new(now: Instant) -> Self {
        Self {
            last_spike_time: now,
            spike_count: 0,
            temperature_increase: 0.0,
            humidity_decrease: 0.0,
        }
    }

    fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}

/// Spike-injecting telemetry generator for one device.
pub struct SpikeGenerator<R = StdRng> {
    sn: String,
    config: GeneratorConfig,
    state: SpikeState,
    rng: R,
}

impl SpikeGenerator<StdRng> {
    /// Create a generator seeded from the OS.
    pub fn new(sn: impl Into<String>, config: GeneratorConfig) -> Result<Self, ConfigError> {
        Self::with_rng(sn, config, StdRng::from_os_rng())
    }

    /// Create a generator with a fixed seed (reproducible sequences).
    pub fn seeded(
        sn: impl Into<String>,
        config: GeneratorConfig,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(sn, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SpikeGenerator<R> {
    /// Create a generator drawing from `rng`. Fails if `config` does not
    /// validate; sampling itself never fails.
    pub fn with_rng(
        sn: impl Into<String>,
        config: GeneratorConfig,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            sn: sn.into(),
            config,
            state: SpikeState::new(Instant::now()),
            rng,
        })
    }

    /// Produce the next sample using the current time.
    pub fn generate_sample(&mut self) -> TelemetrySample {
        self.generate_sample_at(Instant::now())
    }

    /// Produce the next sample as if the clock read `now`.
    pub fn generate_sample_at(&mut self, now: Instant) -> TelemetrySample {
        let cfg = &self.config;
        let is_normal = self.rng.random::<f64>() > cfg.trigger_probability();

        let state = &mut self.state;
        let elapsed = now.saturating_duration_since(state.last_spike_time);
        if elapsed.as_secs_f64() > cfg.spike_interval {
            state.reset(now);
        }

        if state.spike_count < cfg.spike_countdown || !is_normal {
            let steps = f64::from(cfg.spike_countdown - 1);
            let count = f64::from(state.spike_count);
            state.temperature_increase =
                cfg.temperature_spike / steps * count + self.rng.random::<f64>() * JITTER;
            state.humidity_decrease =
                cfg.humidity_drop / steps * count + self.rng.random::<f64>() * JITTER;
        } else {
            state.temperature_increase = 0.0;
            state.humidity_decrease = 0.0;
        }

        let t = &cfg.temperature_range;
        let h = &cfg.humidity_range;
        let temperature = self.rng.random_range(t.min..=t.max) + state.temperature_increase;
        let humidity = self.rng.random_range(h.min..=h.max) - state.humidity_decrease;

        if !is_normal || state.spike_count > 0 {
            state.spike_count += 1;
        }
        if state.spike_count >= cfg.spike_countdown {
            state.spike_count = 0;
        }

        TelemetrySample {
            sn: self.sn.clone(),
            temperature,
            humidity,
        }
    }

    pub fn sn(&self) -> &str {
        &self.sn
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn state(&self) -> &SpikeState {
        &self.state
    }
}

impl<R: Rng> Iterator for SpikeGenerator<R> {
    type Item = TelemetrySample;

    fn next(&mut self) -> Option<TelemetrySample> {
        Some(self.generate_sample())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ValueRange;

    fn scenario_config() -> GeneratorConfig {
        GeneratorConfig {
            temperature_range: ValueRange::new(20.0, 30.0),
            humidity_range: ValueRange::new(40.0, 60.0),
            temperature_spike: 8.0,
            humidity_drop: 16.0,
            spike_interval: 60.0,
            spike_countdown: 5,
            spike_timeout: 2.0,
        }
    }

    /// Flat baseline so the ramp offset can be read straight off a sample.
    fn flat_config() -> GeneratorConfig {
        GeneratorConfig {
            temperature_range: ValueRange::new(25.0, 25.0),
            humidity_range: ValueRange::new(50.0, 50.0),
            ..scenario_config()
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_rejects_countdown_of_one() {
        let cfg = GeneratorConfig {
            spike_countdown: 1,
            ..scenario_config()
        };
        assert!(matches!(
            SpikeGenerator::new("DEV001", cfg),
            Err(ConfigError::SpikeCountdown(1))
        ));
    }

    #[test]
    fn test_initial_state() {
        let g = SpikeGenerator::seeded("DEV001", scenario_config(), 1).unwrap();
        assert_eq!(g.sn(), "DEV001");
        assert_eq!(g.state().spike_count, 0);
        assert_eq!(g.state().temperature_increase, 0.0);
        assert_eq!(g.state().humidity_decrease, 0.0);
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    #[test]
    fn test_samples_stay_within_bounds() {
        let cfg = scenario_config();
        let mut g = SpikeGenerator::seeded("DEV001", cfg.clone(), 7).unwrap();
        let start = Instant::now();
        for i in 0..5_000u64 {
            let s = g.generate_sample_at(start + Duration::from_millis(i * 10));
            assert_eq!(s.sn, "DEV001");
            assert!(s.temperature >= cfg.temperature_range.min - JITTER);
            assert!(s.temperature <= cfg.temperature_range.max + cfg.temperature_spike + JITTER);
            assert!(s.humidity <= cfg.humidity_range.max + JITTER);
            assert!(s.humidity >= cfg.humidity_range.min - cfg.humidity_drop - JITTER);
        }
    }

    #[test]
    fn test_spike_count_never_reaches_countdown() {
        // Probability above 1: every tick triggers.
        let cfg = GeneratorConfig {
            spike_interval: 4.0,
            spike_countdown: 3,
            spike_timeout: 2.0,
            ..scenario_config()
        };
        let mut g = SpikeGenerator::seeded("DEV001", cfg, 3).unwrap();
        let now = Instant::now();
        for _ in 0..1_000 {
            g.generate_sample_at(now);
            assert!(g.state().spike_count < 3);
        }
    }

    #[test]
    fn test_offsets_never_negative() {
        let mut g = SpikeGenerator::seeded("DEV001", scenario_config(), 11).unwrap();
        let now = Instant::now();
        for _ in 0..1_000 {
            g.generate_sample_at(now);
            assert!(g.state().temperature_increase >= 0.0);
            assert!(g.state().humidity_decrease >= 0.0);
        }
    }

    // -----------------------------------------------------------------------
    // Ramp shape
    // -----------------------------------------------------------------------

    #[test]
    fn test_ramp_is_linear_then_resets() {
        let cfg = flat_config();
        let spike = cfg.temperature_spike;
        let drop = cfg.humidity_drop;
        let mut g = SpikeGenerator::seeded("DEV001", cfg, 42).unwrap();
        let now = Instant::now();

        // Start a ramp as a trigger would have left it after its first tick.
        g.state.last_spike_time = now;
        g.state.spike_count = 1;

        let expected = [spike / 4.0, spike / 2.0, 3.0 * spike / 4.0, spike];
        let eps = 1e-9;
        let mut previous_increase = f64::MIN;
        for (i, want) in expected.iter().enumerate() {
            let s = g.generate_sample_at(now);
            let increase = s.temperature - 25.0;
            assert!(
                increase >= want - eps && increase <= want + JITTER + eps,
                "tick {}: increase {increase} not within [{want}, {}]",
                i + 2,
                want + JITTER
            );
            let decrease = 50.0 - s.humidity;
            let want_drop = drop * (i + 1) as f64 / 4.0;
            assert!(decrease >= want_drop - eps && decrease <= want_drop + JITTER + eps);

            // Slope (2.0) dominates jitter, so the ramp is strictly rising.
            assert!(increase > previous_increase);
            previous_increase = increase;
        }

        // Ramp complete: count wrapped, next tick carries jitter only.
        assert_eq!(g.state().spike_count, 0);
        let s = g.generate_sample_at(now);
        assert!(s.temperature - 25.0 <= JITTER);
        assert!(50.0 - s.humidity <= JITTER);
    }

    #[test]
    fn test_ramp_continues_regardless_of_trigger() {
        // With a probability near zero the ramp still advances once started.
        let cfg = GeneratorConfig {
            spike_interval: 1_000_000.0,
            spike_timeout: 0.001,
            ..flat_config()
        };
        let mut g = SpikeGenerator::seeded("DEV001", cfg, 5).unwrap();
        let now = Instant::now();
        g.state.last_spike_time = now;
        g.state.spike_count = 2;
        g.generate_sample_at(now);
        assert_eq!(g.state().spike_count, 3);
        g.generate_sample_at(now);
        assert_eq!(g.state().spike_count, 4);
        g.generate_sample_at(now);
        assert_eq!(g.state().spike_count, 0);
    }

    #[test]
    fn test_interval_elapsed_resets_ramp() {
        let mut g = SpikeGenerator::seeded("DEV001", flat_config(), 9).unwrap();
        let start = Instant::now();
        g.state.last_spike_time = start;
        g.state.spike_count = 3;
        g.state.temperature_increase = 6.0;
        g.state.humidity_decrease = 12.0;

        let later = start + Duration::from_secs(61);
        let s = g.generate_sample_at(later);

        assert_eq!(g.state().last_spike_time, later);
        assert!(g.state().spike_count <= 1);
        assert!(g.state().temperature_increase <= JITTER);
        assert!(g.state().humidity_decrease <= JITTER);
        assert!(s.temperature - 25.0 <= JITTER);
    }

    #[test]
    fn test_interval_not_elapsed_keeps_ramp() {
        let mut g = SpikeGenerator::seeded("DEV001", flat_config(), 9).unwrap();
        let start = Instant::now();
        g.state.last_spike_time = start;
        g.state.spike_count = 2;

        g.generate_sample_at(start + Duration::from_secs(60));
        assert_eq!(g.state().last_spike_time, start);
        assert_eq!(g.state().spike_count, 3);
    }

    #[test]
    fn test_trigger_rate_matches_probability() {
        // p = 2/60 * 5 = 1/6. Ramp starts are the 0 -> 1 transitions.
        let mut g = SpikeGenerator::seeded("DEV001", scenario_config(), 2024).unwrap();
        let now = Instant::now();
        let mut idle_ticks = 0u32;
        let mut starts = 0u32;
        for _ in 0..60_000 {
            let before = g.state().spike_count;
            g.generate_sample_at(now);
            if before == 0 {
                idle_ticks += 1;
                if g.state().spike_count == 1 {
                    starts += 1;
                }
            }
        }
        let rate = f64::from(starts) / f64::from(idle_ticks);
        assert!((rate - 1.0 / 6.0).abs() < 0.02, "trigger rate {rate}");
    }

    #[test]
    fn test_seeded_generators_are_reproducible() {
        let now = Instant::now();
        let mut a = SpikeGenerator::seeded("X", scenario_config(), 77).unwrap();
        let mut b = SpikeGenerator::seeded("X", scenario_config(), 77).unwrap();
        for _ in 0..100 {
            assert_eq!(a.generate_sample_at(now), b.generate_sample_at(now));
        }
    }

    #[test]
    fn test_iterator_is_infinite() {
        let g = SpikeGenerator::seeded("DEV002", scenario_config(), 1).unwrap();
        let samples: Vec<_> = g.take(25).collect();
        assert_eq!(samples.len(), 25);
        assert!(samples.iter().all(|s| s.sn == "DEV002"));
    }
}
