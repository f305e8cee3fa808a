//! # Signal Simulator Module
//!
//! Synthetic wearable source used by the streaming front end and tests.
//!
//! Each channel is generated as baseline + slow sinusoid + Gaussian noise and
//! clamped to a plausible device range. Scenario presets move the baselines;
//! anomalies scale a single channel's baseline until the scenario is reset.

use chrono::{DateTime, Duration, FixedOffset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::SimulatorConfig;
use crate::vitals::{Channel, RawSample, VitalSigns};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Normal,
    Exercise,
    Rest,
    Sleep,
    Hypoxia,
}

impl Scenario {
    /// Channel baselines for this scenario, derived from the configured normal baseline.
    pub fn baseline(&self, normal: &VitalSigns) -> VitalSigns {
        let mut vitals = *normal;
        match self {
            Scenario::Normal => {}
            Scenario::Exercise => {
                vitals.heart_rate = 140.0;
                vitals.activity = 120.0;
                vitals.temperature = 37.5;
            }
            Scenario::Rest => {
                vitals.heart_rate = 60.0;
                vitals.activity = 5.0;
                vitals.temperature = 36.5;
            }
            Scenario::Sleep => {
                vitals.heart_rate = 55.0;
                vitals.activity = 0.0;
                vitals.temperature = 36.3;
                vitals.spo2 = 97.0;
            }
            Scenario::Hypoxia => {
                vitals.spo2 = 86.0;
            }
        }
        vitals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    Spike,
    Drop,
}

/// Oscillation shape of one channel.
struct Waveform {
    frequency: f64,
    amplitude: f64,
    bounds: (f64, f64),
}

fn waveform(channel: Channel) -> Waveform {
    match channel {
        Channel::HeartRate => Waveform {
            frequency: 0.1,
            amplitude: 10.0,
            bounds: (45.0, 180.0),
        },
        Channel::Spo2 => Waveform {
            frequency: 0.05,
            amplitude: 2.0,
            bounds: (90.0, 100.0),
        },
        Channel::Temperature => Waveform {
            frequency: 0.02,
            amplitude: 0.3,
            bounds: (35.5, 38.5),
        },
        Channel::Activity => Waveform {
            frequency: 0.15,
            amplitude: 40.0,
            bounds: (0.0, 150.0),
        },
    }
}

/// Phase advance per generated sample.
const TIME_STEP: f64 = 0.01;
/// Noise standard deviation as a fraction of the waveform amplitude.
const NOISE_FRACTION: f64 = 0.2;

pub struct SignalSimulator {
    rng: StdRng,
    normal: VitalSigns,
    baseline: VitalSigns,
    scenario: Scenario,
    time_offset: f64,
    timestamp: DateTime<FixedOffset>,
    period: Duration,
}

impl SignalSimulator {
    pub fn new(config: &SimulatorConfig, scenario: Scenario, cadence_hz: f64, start: DateTime<FixedOffset>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let period_ms = if cadence_hz > 0.0 { (1000.0 / cadence_hz).round() as i64 } else { 100 };

        Self {
            rng,
            normal: config.baseline,
            baseline: scenario.baseline(&config.baseline),
            scenario,
            time_offset: 0.0,
            timestamp: start,
            period: Duration::milliseconds(period_ms.max(1)),
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Switch scenario; clears any injected anomaly.
    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
        self.baseline = scenario.baseline(&self.normal);
    }

    pub fn baseline(&self) -> VitalSigns {
        self.baseline
    }

    /// Scale one channel's baseline up (spike) or down (drop) by a random factor.
    pub fn inject_anomaly(&mut self, channel: Channel, anomaly: Anomaly) {
        let factor = match anomaly {
            Anomaly::Spike => self.rng.random_range(1.3..1.5),
            Anomaly::Drop => self.rng.random_range(0.6..0.8),
        };
        let value = self.baseline.get(channel) * factor;
        self.baseline.set(channel, value);
        log::debug!("Injected {:?} on {}: baseline now {:.2}", anomaly, channel.name(), value);
    }

    /// Standard normal variate via Box–Muller.
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = 1.0 - self.rng.random::<f64>();
        let u2: f64 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn channel_value(&mut self, channel: Channel) -> f64 {
        let shape = waveform(channel);
        let base = self.baseline.get(channel);
        let wave = shape.amplitude * (2.0 * PI * shape.frequency * self.time_offset).sin();
        let noise = self.gaussian() * shape.amplitude * NOISE_FRACTION;

        // Bounds stretch to cover baselines outside the device range
        let span = shape.amplitude * (1.0 + 3.0 * NOISE_FRACTION);
        let (mut lo, mut hi) = shape.bounds;
        if base < lo {
            lo = (base - span).max(0.0);
        }
        if base > hi {
            hi = base + span;
        }
        let value = (base + wave + noise).clamp(lo, hi);
        (value * 100.0).round() / 100.0
    }

    pub fn next_sample(&mut self) -> RawSample {
        let mut vitals = self.baseline;
        for channel in Channel::ALL {
            let value = self.channel_value(channel);
            vitals.set(channel, value);
        }

        let sample = RawSample::new(self.timestamp, vitals);
        self.time_offset += TIME_STEP;
        self.timestamp += self.period;
        sample
    }
}

impl Iterator for SignalSimulator {
    type Item = RawSample;

    fn next(&mut self) -> Option<RawSample> {
        Some(self.next_sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600).unwrap().with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn seeded(seed: u64, scenario: Scenario) -> SignalSimulator {
        let config = SimulatorConfig {
            seed: Some(seed),
            ..SimulatorConfig::default()
        };
        SignalSimulator::new(&config, scenario, 10.0, start())
    }

    fn mean(samples: &[RawSample], channel: Channel) -> f64 {
        samples.iter().map(|s| s.signals().get(channel)).sum::<f64>() / samples.len() as f64
    }

    #[test]
    fn test_seeded_generators_are_reproducible() {
        let a: Vec<RawSample> = seeded(7, Scenario::Normal).take(50).collect();
        let b: Vec<RawSample> = seeded(7, Scenario::Normal).take(50).collect();
        let c: Vec<RawSample> = seeded(8, Scenario::Normal).take(50).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_normal_values_stay_in_device_range() {
        for sample in seeded(1, Scenario::Normal).take(500) {
            assert!((45.0..=180.0).contains(&sample.heart_rate));
            assert!((90.0..=100.0).contains(&sample.spo2));
            assert!((35.5..=38.5).contains(&sample.temperature));
            assert!((0.0..=150.0).contains(&sample.activity));
        }
    }

    #[test]
    fn test_timestamps_follow_cadence() {
        let samples: Vec<RawSample> = seeded(1, Scenario::Rest).take(3).collect();
        assert_eq!(samples[0].timestamp, start());
        assert_eq!(samples[2].timestamp - samples[0].timestamp, Duration::milliseconds(200));
        assert_eq!(samples[0].timestamp.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_scenario_presets_shift_baselines() {
        let exercise: Vec<RawSample> = seeded(3, Scenario::Exercise).take(200).collect();
        let sleep: Vec<RawSample> = seeded(3, Scenario::Sleep).take(200).collect();
        assert!(mean(&exercise, Channel::HeartRate) > 120.0);
        assert!(mean(&sleep, Channel::HeartRate) < 75.0);
        assert!(mean(&exercise, Channel::Activity) > mean(&sleep, Channel::Activity));
    }

    #[test]
    fn test_hypoxia_lowers_oxygen_below_device_floor() {
        let samples: Vec<RawSample> = seeded(5, Scenario::Hypoxia).take(200).collect();
        let spo2 = mean(&samples, Channel::Spo2);
        assert!(spo2 < 90.0, "mean SpO2 {}", spo2);
        assert!(spo2 > 80.0, "mean SpO2 {}", spo2);
    }

    #[test]
    fn test_anomaly_scales_baseline_until_reset() {
        let mut sim = seeded(9, Scenario::Normal);
        sim.inject_anomaly(Channel::HeartRate, Anomaly::Spike);
        let spiked = sim.baseline().heart_rate;
        assert!((75.0 * 1.3..=75.0 * 1.5).contains(&spiked));

        sim.inject_anomaly(Channel::Activity, Anomaly::Drop);
        assert!((30.0 * 0.6..=30.0 * 0.8).contains(&sim.baseline().activity));

        sim.set_scenario(Scenario::Sleep);
        assert_eq!(sim.scenario(), Scenario::Sleep);
        assert_eq!(sim.baseline().heart_rate, 55.0);

        sim.set_scenario(Scenario::Normal);
        assert_eq!(sim.baseline(), SimulatorConfig::default().baseline);
    }
}
