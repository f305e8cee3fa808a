//! # Signal Quality Module
//!
//! First pipeline stage. Conditions raw samples, scores the quality of each
//! channel, applies adaptive smoothing when quality is low and flags
//! artifacts.
//!
//! ## Per-channel Quality
//! Three factors are combined with fixed weights:
//! - stability: inverse coefficient of variation over the recent window
//! - plausibility: distance of the value from the normal physiological range
//! - rate of change: jump from the previous sample relative to the channel's maximum step
//!
//! The overall quality is the channel-weighted mean, heart rate weighted
//! highest. Below `smoothing_threshold` the output leans on the history mean
//! with `alpha` growing as quality rises.
//!
//! ## SNR
//! `10·log10(signal variance / residual²)` per channel, where the residual is
//! the conditioned value minus the enhanced one. Unsmoothed ticks have no
//! residual and report the ceiling.
//!
//! ## Conditioning
//! Non-finite or zero readings are replaced by the history mean (dropout);
//! values beyond the hard bounds are clamped (saturation). The conditioned
//! sample, not the smoothed one, is what the session history records.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::{ChannelLimits, QualityConfig};
use crate::error::Notice;
use crate::timeseries::{HistoryBuffer, SeriesExt};
use crate::vitals::{Channel, ChannelHistory, RawSample, VitalSigns};

/// Readings closer to zero than this count as a sensor dropout
const ZERO_LIKE: f64 = 1e-6;

/// Power below which a window is treated as flat
const DEGENERATE_POWER: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Motion,
    ElectrodeNoise,
    Saturation,
    Dropout,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Motion => "motion",
            Artifact::ElectrodeNoise => "electrode_noise",
            Artifact::Saturation => "saturation",
            Artifact::Dropout => "dropout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Assessment {
    pub fn from_quality(quality: f64, config: &QualityConfig) -> Self {
        if quality >= config.excellent_threshold {
            Assessment::Excellent
        } else if quality >= config.good_threshold {
            Assessment::Good
        } else if quality >= config.fair_threshold {
            Assessment::Fair
        } else {
            Assessment::Poor
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Assessment::Excellent => "excellent",
            Assessment::Good => "good",
            Assessment::Fair => "fair",
            Assessment::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// Factor breakdown for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelMetrics {
    pub quality: f64,
    pub stability: f64,
    pub plausibility: f64,
    pub rate_of_change: f64,
    pub snr_db: f64,
}

/// Output of the quality stage (`clarity_layer`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub enhanced_signals: VitalSigns,
    pub channel_quality: BTreeMap<Channel, f64>,
    pub overall_quality: f64,
    pub snr_db: f64,
    pub assessment: Assessment,
    pub artifacts: BTreeSet<Artifact>,
    pub noise_reduction_applied: bool,
    pub quality_metrics: BTreeMap<Channel, ChannelMetrics>,
    /// True while the history is shorter than the warm-up length
    pub degraded: bool,
    pub notices: Vec<Notice>,
    pub processing_notes: String,
}

/// Stage result: the report plus the conditioned sample to commit.
#[derive(Debug, Clone)]
pub struct QualityOutcome {
    pub report: QualityReport,
    pub conditioned: VitalSigns,
}

/// Signal-to-noise estimate in dB.
///
/// Signal power is the variance of `window`; noise power is the square of
/// `residual`, the part of the current value removed by enhancement. No
/// residual reports `ceiling`. Returns `None` for windows shorter than two
/// samples.
pub fn signal_to_noise_db(window: &[f64], residual: f64, floor: f64, ceiling: f64) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let signal_power = window.variance()?;
    let noise_power = residual * residual;

    if noise_power <= DEGENERATE_POWER {
        return Some(ceiling);
    }
    if signal_power <= DEGENERATE_POWER {
        return Some(floor);
    }
    Some((10.0 * (signal_power / noise_power).log10()).clamp(floor, ceiling))
}

struct ChannelOutcome {
    conditioned: f64,
    metrics: ChannelMetrics,
    artifacts: Vec<Artifact>,
    invalid: bool,
    history_mean: Option<f64>,
}

pub struct QualityAssessor {
    config: QualityConfig,
}

impl QualityAssessor {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Assess one sample against the channel history without mutating it.
    pub fn assess(&self, history: &ChannelHistory, sample: &RawSample) -> QualityOutcome {
        let raw = sample.signals();
        let warm = history.len() >= self.config.warmup_samples;

        let mut notices = Vec::new();
        let mut artifacts = BTreeSet::new();
        let mut conditioned = raw;
        let mut channel_quality = BTreeMap::new();
        let mut quality_metrics = BTreeMap::new();
        let mut history_means = BTreeMap::new();

        for channel in Channel::ALL {
            let outcome = self.assess_channel(channel, history.get(channel), raw.get(channel), warm);
            if outcome.invalid {
                log::warn!(
                    "Invalid {} value {} replaced with {:.2}",
                    channel.name(),
                    raw.get(channel),
                    outcome.conditioned
                );
                notices.push(Notice::InvalidSample { channel });
            }
            artifacts.extend(outcome.artifacts.iter().copied());
            conditioned.set(channel, outcome.conditioned);
            channel_quality.insert(channel, outcome.metrics.quality);
            quality_metrics.insert(channel, outcome.metrics);
            if let Some(mean) = outcome.history_mean {
                history_means.insert(channel, mean);
            }
        }

        let overall_quality = self.weighted(|c| channel_quality[&c]).clamp(0.0, 1.0);

        let noise_reduction_applied = warm && overall_quality < self.config.smoothing_threshold;
        let enhanced_signals = if noise_reduction_applied {
            self.smooth(&conditioned, &history_means, overall_quality)
        } else {
            conditioned
        };

        let snr_db = if warm {
            for channel in Channel::ALL {
                let snr = self.channel_snr(
                    history.get(channel),
                    conditioned.get(channel),
                    enhanced_signals.get(channel),
                );
                if let Some(metrics) = quality_metrics.get_mut(&channel) {
                    metrics.snr_db = snr;
                }
            }
            self.weighted(|c| quality_metrics[&c].snr_db)
                .clamp(self.config.snr_floor_db, self.config.snr_ceiling_db)
        } else {
            self.config.snr_neutral_db
        };

        if !warm {
            notices.push(Notice::InsufficientHistory {
                required: self.config.warmup_samples,
                available: history.len(),
            });
        }

        let assessment = Assessment::from_quality(overall_quality, &self.config);
        let processing_notes = format!(
            "Quality Score: {:.2}/1.00 | SNR: {:.1} dB | Assessment: {} | Artifacts: {} | Noise reduction: {}",
            overall_quality,
            snr_db,
            assessment,
            describe_artifacts(&artifacts),
            if noise_reduction_applied { "applied" } else { "not needed" }
        );

        log::debug!(
            "quality={:.3} snr={:.1}dB assessment={} artifacts={}",
            overall_quality,
            snr_db,
            assessment,
            artifacts.len()
        );

        QualityOutcome {
            report: QualityReport {
                enhanced_signals,
                channel_quality,
                overall_quality,
                snr_db,
                assessment,
                artifacts,
                noise_reduction_applied,
                quality_metrics,
                degraded: !warm,
                notices,
                processing_notes,
            },
            conditioned,
        }
    }

    fn assess_channel(
        &self,
        channel: Channel,
        buffer: &HistoryBuffer<f64>,
        raw: f64,
        warm: bool,
    ) -> ChannelOutcome {
        let limits = self.config.limits.get(channel);
        let values: Vec<f64> = buffer.iter().copied().collect();
        let history_mean = values.mean();

        let mut artifacts = Vec::new();
        let (value, invalid) = if !raw.is_finite() || (limits.zero_is_dropout && raw.abs() < ZERO_LIKE) {
            artifacts.push(Artifact::Dropout);
            (history_mean.unwrap_or((limits.normal.min + limits.normal.max) / 2.0), true)
        } else if raw > limits.hard.max {
            artifacts.push(Artifact::Saturation);
            (limits.hard.max, true)
        } else if raw < limits.hard.min {
            artifacts.push(Artifact::Saturation);
            (limits.hard.min, true)
        } else {
            (raw, false)
        };

        let previous = buffer.last().copied();
        if let Some(prev) = previous {
            if (value - prev).abs() > limits.motion_step {
                artifacts.push(Artifact::Motion);
            }
        }
        if self.electrode_noise(limits, buffer, value) {
            artifacts.push(Artifact::ElectrodeNoise);
        }

        let stability = self.stability(limits, buffer, value);
        let plausibility = plausibility(limits, value);
        let rate_of_change = previous.map_or(1.0, |prev| {
            1.0 - ((value - prev).abs() / limits.max_step.max(f64::EPSILON)).min(1.0)
        });

        let quality = if warm {
            let quality = self.config.stability_weight * stability
                + self.config.plausibility_weight * plausibility
                + self.config.rate_weight * rate_of_change;
            quality.clamp(0.0, 1.0)
        } else {
            self.config.neutral_quality
        };

        ChannelOutcome {
            conditioned: value,
            metrics: ChannelMetrics {
                quality,
                stability,
                plausibility,
                rate_of_change,
                snr_db: self.config.snr_neutral_db,
            },
            artifacts,
            invalid,
            history_mean,
        }
    }

    /// SNR of one channel; the residual is what enhancement removed from the current value.
    fn channel_snr(&self, buffer: &HistoryBuffer<f64>, conditioned: f64, enhanced: f64) -> f64 {
        let window = buffer.window_with(conditioned, buffer.capacity() + 1);
        signal_to_noise_db(
            &window,
            conditioned - enhanced,
            self.config.snr_floor_db,
            self.config.snr_ceiling_db,
        )
        .unwrap_or(self.config.snr_neutral_db)
    }

    fn stability(&self, limits: &ChannelLimits, buffer: &HistoryBuffer<f64>, value: f64) -> f64 {
        let window = buffer.window_with(value, self.config.stability_window);
        let (Some(mean), Some(std)) = (window.mean(), window.std_dev()) else {
            return 1.0;
        };
        let cv = std / mean.abs().max(limits.mean_floor);
        1.0 / (1.0 + self.config.stability_cv_gain * cv)
    }

    /// Short-window variance well above the long-window variance, with no
    /// trend that would explain it.
    fn electrode_noise(&self, limits: &ChannelLimits, buffer: &HistoryBuffer<f64>, value: f64) -> bool {
        if buffer.len() < self.config.noise_min_history {
            return false;
        }
        let long: Vec<f64> = buffer.iter().copied().collect();
        let short = buffer.window_with(value, self.config.noise_window);
        let (Some(long_var), Some(short_var)) = (long.variance(), short.variance()) else {
            return false;
        };

        if short_var <= self.config.noise_variance_ratio * long_var.max(limits.noise_floor) {
            return false;
        }
        let trend = short
            .linear_fit()
            .map_or(0.0, |fit| fit.slope.abs() * (short.len() - 1) as f64);
        trend < short_var.sqrt()
    }

    fn smooth(&self, conditioned: &VitalSigns, means: &BTreeMap<Channel, f64>, quality: f64) -> VitalSigns {
        let threshold = self.config.smoothing_threshold.max(f64::EPSILON);
        let min_alpha = self.config.min_smoothing_alpha;
        let alpha = (min_alpha + (1.0 - min_alpha) * (quality / threshold)).clamp(min_alpha, 1.0);

        let mut enhanced = *conditioned;
        for channel in Channel::ALL {
            if let Some(&mean) = means.get(&channel) {
                let value = conditioned.get(channel);
                enhanced.set(channel, alpha * value + (1.0 - alpha) * mean);
            }
        }
        enhanced
    }

    fn weighted(&self, value: impl Fn(Channel) -> f64) -> f64 {
        let weights = &self.config.channel_weights;
        let total: f64 = Channel::ALL.iter().map(|&c| weights.get(c)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        Channel::ALL.iter().map(|&c| weights.get(c) * value(c)).sum::<f64>() / total
    }
}

fn plausibility(limits: &ChannelLimits, value: f64) -> f64 {
    let (edge, bound) = if value < limits.normal.min {
        (limits.normal.min, limits.hard.min)
    } else if value > limits.normal.max {
        (limits.normal.max, limits.hard.max)
    } else {
        return 1.0;
    };
    let span = (edge - bound).abs();
    if span <= 0.0 {
        return 0.0;
    }
    (1.0 - (value - edge).abs() / span).clamp(0.0, 1.0)
}

fn describe_artifacts(artifacts: &BTreeSet<Artifact>) -> String {
    if artifacts.is_empty() {
        return "none".to_string();
    }
    artifacts.iter().map(Artifact::as_str).collect::<Vec<_>>().join(", ")
}
