//! # Configuration Management Module
//!
//! Persistent settings stored in platform-appropriate locations, plus the
//! single structure holding every calibration constant of the analysis
//! pipeline.
//!
//! ## Sections
//! - `pipeline`: thresholds, weights, band boundaries and sentinels for all four stages
//! - `sessions`: session registry limits
//! - `stream`: simulated streaming cadence and output channel bound
//! - `simulator`: synthetic source baselines and seed
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/zen-vitals/config.toml
//! - Linux: ~/.config/zen-vitals/config.toml
//! - Windows: %APPDATA%\zen-vitals\config.toml
//!
//! ## Why TOML
//! Human-readable format allows calibrating thresholds by hand without
//! touching algorithm code. Every field has a serde default, so a file only
//! needs the values it overrides.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::vitals::{Channel, VitalSigns};

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Distance from `value` to the nearest edge, zero inside.
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }

    /// Half-open membership `[min, max)`, used for spectral bands.
    pub fn contains_half_open(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub sessions: SessionConfig,
    pub stream: StreamConfig,
    pub simulator: SimulatorConfig,
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zen-vitals")
            .join("config.toml")
    }

    /// Load config from the platform location, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Load config from `path`, writing the defaults there if the file is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to the platform location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_path())
    }

    /// Save config to `path`
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }
}

/// Every calibration constant of the four analysis stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub quality: QualityConfig,
    pub frequency: FrequencyConfig,
    pub temporal: TemporalConfig,
    pub insight: InsightConfig,
}

// ---------------------------------------------------------------------------
// Quality stage
// ---------------------------------------------------------------------------

/// Physiological limits of one channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelLimits {
    /// Values outside are clamped and flagged
    pub hard: Span,
    /// Values inside get full plausibility
    pub normal: Span,
    /// Step between consecutive samples that drives the rate factor to zero
    pub max_step: f64,
    /// Step that flags a motion artifact
    pub motion_step: f64,
    /// Lower bound for the mean in the coefficient of variation
    pub mean_floor: f64,
    /// Variance floor for the electrode-noise test
    pub noise_floor: f64,
    /// Whether a zero reading means the sensor dropped out
    pub zero_is_dropout: bool,
}

/// Limits of all four channels.
///
/// A file may override single fields of one channel; everything it leaves
/// out keeps that channel's own default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "ChannelLimitsSetOverride")]
pub struct ChannelLimitsSet {
    pub heart_rate: ChannelLimits,
    pub spo2: ChannelLimits,
    pub temperature: ChannelLimits,
    pub activity: ChannelLimits,
}

impl ChannelLimitsSet {
    pub fn get(&self, channel: Channel) -> &ChannelLimits {
        match channel {
            Channel::HeartRate => &self.heart_rate,
            Channel::Spo2 => &self.spo2,
            Channel::Temperature => &self.temperature,
            Channel::Activity => &self.activity,
        }
    }
}

impl Default for ChannelLimitsSet {
    fn default() -> Self {
        Self {
            heart_rate: ChannelLimits {
                hard: Span::new(25.0, 230.0),
                normal: Span::new(40.0, 180.0),
                max_step: 25.0,
                motion_step: 30.0,
                mean_floor: 1.0,
                noise_floor: 1.0,
                zero_is_dropout: true,
            },
            spo2: ChannelLimits {
                hard: Span::new(50.0, 100.0),
                normal: Span::new(90.0, 100.0),
                max_step: 4.0,
                motion_step: 6.0,
                mean_floor: 1.0,
                noise_floor: 0.25,
                zero_is_dropout: true,
            },
            temperature: ChannelLimits {
                hard: Span::new(30.0, 43.0),
                normal: Span::new(35.5, 38.5),
                max_step: 0.5,
                motion_step: 1.0,
                mean_floor: 1.0,
                noise_floor: 0.01,
                zero_is_dropout: true,
            },
            activity: ChannelLimits {
                hard: Span::new(0.0, 300.0),
                normal: Span::new(0.0, 200.0),
                max_step: 60.0,
                motion_step: 80.0,
                mean_floor: 10.0,
                noise_floor: 25.0,
                zero_is_dropout: false,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelLimitsOverride {
    hard: Option<Span>,
    normal: Option<Span>,
    max_step: Option<f64>,
    motion_step: Option<f64>,
    mean_floor: Option<f64>,
    noise_floor: Option<f64>,
    zero_is_dropout: Option<bool>,
}

impl ChannelLimitsOverride {
    fn apply(self, base: ChannelLimits) -> ChannelLimits {
        ChannelLimits {
            hard: self.hard.unwrap_or(base.hard),
            normal: self.normal.unwrap_or(base.normal),
            max_step: self.max_step.unwrap_or(base.max_step),
            motion_step: self.motion_step.unwrap_or(base.motion_step),
            mean_floor: self.mean_floor.unwrap_or(base.mean_floor),
            noise_floor: self.noise_floor.unwrap_or(base.noise_floor),
            zero_is_dropout: self.zero_is_dropout.unwrap_or(base.zero_is_dropout),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelLimitsSetOverride {
    heart_rate: ChannelLimitsOverride,
    spo2: ChannelLimitsOverride,
    temperature: ChannelLimitsOverride,
    activity: ChannelLimitsOverride,
}

impl From<ChannelLimitsSetOverride> for ChannelLimitsSet {
    fn from(patch: ChannelLimitsSetOverride) -> Self {
        let base = Self::default();
        Self {
            heart_rate: patch.heart_rate.apply(base.heart_rate),
            spo2: patch.spo2.apply(base.spo2),
            temperature: patch.temperature.apply(base.temperature),
            activity: patch.activity.apply(base.activity),
        }
    }
}

/// Per-channel weights; heart rate carries the most.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelWeights {
    pub heart_rate: f64,
    pub spo2: f64,
    pub temperature: f64,
    pub activity: f64,
}

impl ChannelWeights {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::Spo2 => self.spo2,
            Channel::Temperature => self.temperature,
            Channel::Activity => self.activity,
        }
    }
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            heart_rate: 0.4,
            spo2: 0.3,
            temperature: 0.2,
            activity: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Capacity K of each channel history
    pub history_capacity: usize,
    /// History length below which quality is neutral and nothing is smoothed
    pub warmup_samples: usize,
    /// Quality reported during warm-up
    pub neutral_quality: f64,
    /// Recent samples used for the stability factor
    pub stability_window: usize,
    /// stability = 1 / (1 + gain * cv)
    pub stability_cv_gain: f64,
    pub stability_weight: f64,
    pub plausibility_weight: f64,
    pub rate_weight: f64,
    pub channel_weights: ChannelWeights,
    /// Overall quality below which adaptive smoothing is applied
    pub smoothing_threshold: f64,
    /// Blend factor applied at zero quality
    pub min_smoothing_alpha: f64,
    /// Short window for the electrode-noise variance test
    pub noise_window: usize,
    /// History needed before electrode noise is evaluated
    pub noise_min_history: usize,
    /// Short-window variance must exceed this multiple of the long-window variance
    pub noise_variance_ratio: f64,
    pub snr_floor_db: f64,
    pub snr_ceiling_db: f64,
    /// SNR reported during warm-up
    pub snr_neutral_db: f64,
    pub excellent_threshold: f64,
    pub good_threshold: f64,
    pub fair_threshold: f64,
    pub limits: ChannelLimitsSet,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            warmup_samples: 5,
            neutral_quality: 0.5,
            stability_window: 10,
            stability_cv_gain: 10.0,
            stability_weight: 0.4,
            plausibility_weight: 0.4,
            rate_weight: 0.2,
            channel_weights: ChannelWeights::default(),
            smoothing_threshold: 0.7,
            min_smoothing_alpha: 0.2,
            noise_window: 5,
            noise_min_history: 10,
            noise_variance_ratio: 4.0,
            snr_floor_db: 0.0,
            snr_ceiling_db: 60.0,
            snr_neutral_db: 30.0,
            excellent_threshold: 0.9,
            good_threshold: 0.75,
            fair_threshold: 0.5,
            limits: ChannelLimitsSet::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Frequency stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    /// Capacity of the enhanced heart-rate history
    pub history_capacity: usize,
    /// Minimum window M for spectral analysis
    pub min_window: usize,
    /// Recent values averaged into the heart rate handed to the temporal stage
    pub enhancement_window: usize,
    pub vlf_band: Span,
    pub lf_band: Span,
    pub hf_band: Span,
    /// RMSSD that maps to a full score
    pub rmssd_reference_ms: f64,
    /// SDNN that maps to a full score
    pub sdnn_reference_ms: f64,
    pub rmssd_weight: f64,
    pub sdnn_weight: f64,
    pub pnn50_weight: f64,
    /// Successive-difference threshold for pNN50
    pub nn50_threshold_ms: f64,
    /// LF/HF reported when HF power is zero
    pub lf_hf_sentinel: f64,
    /// LF/HF reported when the spectrum is degenerate or unavailable
    pub lf_hf_neutral: f64,
    /// Window variance (bpm²) below which the spectrum is degenerate
    pub degenerate_variance: f64,
    /// Breaths per minute reported without a usable HF peak
    pub neutral_respiratory_rate: f64,
    pub normal_heart_rate: Span,
    /// hrv_score at or above which variability counts as high
    pub high_hrv_score: f64,
    /// Detrended R-R variance (ms²) above which the rhythm is irregular
    pub irregular_rr_variance: f64,
    /// LF/HF above which the rhythm is irregular
    pub irregular_lf_hf: f64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            history_capacity: 64,
            min_window: 32,
            enhancement_window: 3,
            vlf_band: Span::new(0.003, 0.04),
            lf_band: Span::new(0.04, 0.15),
            hf_band: Span::new(0.15, 0.4),
            rmssd_reference_ms: 80.0,
            sdnn_reference_ms: 100.0,
            rmssd_weight: 0.4,
            sdnn_weight: 0.4,
            pnn50_weight: 0.2,
            nn50_threshold_ms: 50.0,
            lf_hf_sentinel: 10.0,
            lf_hf_neutral: 1.0,
            degenerate_variance: 1e-6,
            neutral_respiratory_rate: 15.0,
            normal_heart_rate: Span::new(60.0, 100.0),
            high_hrv_score: 60.0,
            irregular_rr_variance: 2500.0,
            irregular_lf_hf: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Temporal stage
// ---------------------------------------------------------------------------

/// Reference physiology for one circadian phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseProfile {
    /// First local hour of the phase
    pub start_hour: u32,
    pub expected_heart_rate: f64,
    pub heart_rate_range: Span,
    pub expected_activity: f64,
    /// Local minute of day at which HR/activity are expected to peak
    pub peak_minute: f64,
}

/// Reference profiles of the four phases; partial overrides keep each
/// phase's own defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "CircadianProfilesOverride")]
pub struct CircadianProfiles {
    pub morning: PhaseProfile,
    pub afternoon: PhaseProfile,
    pub evening: PhaseProfile,
    pub night: PhaseProfile,
}

impl Default for CircadianProfiles {
    fn default() -> Self {
        Self {
            morning: PhaseProfile {
                start_hour: 6,
                expected_heart_rate: 70.0,
                heart_rate_range: Span::new(65.0, 80.0),
                expected_activity: 30.0,
                peak_minute: 10.0 * 60.0,
            },
            afternoon: PhaseProfile {
                start_hour: 12,
                expected_heart_rate: 75.0,
                heart_rate_range: Span::new(70.0, 85.0),
                expected_activity: 40.0,
                peak_minute: 15.0 * 60.0,
            },
            evening: PhaseProfile {
                start_hour: 18,
                expected_heart_rate: 72.0,
                heart_rate_range: Span::new(65.0, 80.0),
                expected_activity: 20.0,
                peak_minute: 19.5 * 60.0,
            },
            night: PhaseProfile {
                start_hour: 22,
                expected_heart_rate: 62.0,
                heart_rate_range: Span::new(55.0, 70.0),
                expected_activity: 2.0,
                peak_minute: 2.0 * 60.0,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhaseProfileOverride {
    start_hour: Option<u32>,
    expected_heart_rate: Option<f64>,
    heart_rate_range: Option<Span>,
    expected_activity: Option<f64>,
    peak_minute: Option<f64>,
}

impl PhaseProfileOverride {
    fn apply(self, base: PhaseProfile) -> PhaseProfile {
        PhaseProfile {
            start_hour: self.start_hour.unwrap_or(base.start_hour),
            expected_heart_rate: self.expected_heart_rate.unwrap_or(base.expected_heart_rate),
            heart_rate_range: self.heart_rate_range.unwrap_or(base.heart_rate_range),
            expected_activity: self.expected_activity.unwrap_or(base.expected_activity),
            peak_minute: self.peak_minute.unwrap_or(base.peak_minute),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CircadianProfilesOverride {
    morning: PhaseProfileOverride,
    afternoon: PhaseProfileOverride,
    evening: PhaseProfileOverride,
    night: PhaseProfileOverride,
}

impl From<CircadianProfilesOverride> for CircadianProfiles {
    fn from(patch: CircadianProfilesOverride) -> Self {
        let base = Self::default();
        Self {
            morning: patch.morning.apply(base.morning),
            afternoon: patch.afternoon.apply(base.afternoon),
            evening: patch.evening.apply(base.evening),
            night: patch.night.apply(base.night),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Capacity P of the timestamped history
    pub history_capacity: usize,
    /// Minimum window for trend analysis
    pub min_window: usize,
    /// |slope| (bpm per sample) at or below which the trend is flat
    pub stable_slope: f64,
    /// Residual variance (bpm²) at or below which the window is stable
    pub stable_variance: f64,
    /// |slope| beyond which the window is increasing / decreasing
    pub trend_slope: f64,
    /// Residual variance beyond which the window is irregular
    pub irregular_variance: f64,
    /// Fraction of residual sign changes that marks oscillation
    pub oscillation_rate: f64,
    /// Residual variance that drives temporal consistency to zero
    pub consistency_variance_scale: f64,
    pub alignment_heart_rate_tolerance: f64,
    pub alignment_activity_tolerance: f64,
    /// Weight of HR in the alignment; activity gets the remainder
    pub alignment_heart_rate_weight: f64,
    pub consistency_weight: f64,
    pub alignment_weight: f64,
    pub phases: CircadianProfiles,
    pub short_trend_window: usize,
    /// Samples needed before a long-term trend is reported
    pub long_trend_min_samples: usize,
    /// |slope| beyond which a trend description is rising / declining
    pub trend_description_slope: f64,
    pub periodicity_min_samples: usize,
    pub periodicity_threshold: f64,
    /// Sample spacing assumed when timestamps do not advance
    pub nominal_sample_period_secs: f64,
    /// Activity above which night-time activity is unusual
    pub night_activity_limit: f64,
    pub temperature_rhythm: TemperatureRhythmConfig,
}

/// Local hour bands (half-open) and temperatures of the skin-temperature rhythm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureRhythmConfig {
    pub peak_hours: Span,
    /// Temperature above which the afternoon reading is a circadian peak
    pub peak_temperature: f64,
    pub trough_hours: Span,
    pub morning_low_hours: Span,
    /// Temperature below which a night or morning reading is low
    pub low_temperature: f64,
}

impl Default for TemperatureRhythmConfig {
    fn default() -> Self {
        Self {
            peak_hours: Span::new(14.0, 18.0),
            peak_temperature: 37.0,
            trough_hours: Span::new(2.0, 6.0),
            morning_low_hours: Span::new(6.0, 10.0),
            low_temperature: 36.5,
        }
    }
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            history_capacity: 120,
            min_window: 20,
            stable_slope: 0.05,
            stable_variance: 4.0,
            trend_slope: 0.1,
            irregular_variance: 100.0,
            oscillation_rate: 0.3,
            consistency_variance_scale: 100.0,
            alignment_heart_rate_tolerance: 20.0,
            alignment_activity_tolerance: 60.0,
            alignment_heart_rate_weight: 0.7,
            consistency_weight: 0.6,
            alignment_weight: 0.4,
            phases: CircadianProfiles::default(),
            short_trend_window: 30,
            long_trend_min_samples: 60,
            trend_description_slope: 0.2,
            periodicity_min_samples: 50,
            periodicity_threshold: 0.5,
            nominal_sample_period_secs: 0.1,
            night_activity_limit: 50.0,
            temperature_rhythm: TemperatureRhythmConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Insight stage
// ---------------------------------------------------------------------------

/// Normalization scale of each classifier feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureScales {
    pub heart_rate: f64,
    pub hrv_score: f64,
    pub activity: f64,
    pub rhythm_score: f64,
    pub quality: f64,
}

impl Default for FeatureScales {
    fn default() -> Self {
        Self {
            heart_rate: 10.0,
            hrv_score: 20.0,
            activity: 20.0,
            rhythm_score: 25.0,
            quality: 0.25,
        }
    }
}

/// Constants of the wellness sub-score formulas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WellnessConfig {
    pub resting_heart_rate: Span,
    /// HR distance outside the resting range that zeroes the HR fit
    pub heart_rate_fit_span: f64,
    pub cardio_heart_rate_weight: f64,
    pub cardio_hrv_weight: f64,
    pub cardio_rhythm_weight: f64,
    pub normal_respiratory_rate: Span,
    pub respiratory_rate_fit_span: f64,
    /// SpO2 mapped to a zero fit
    pub spo2_floor: f64,
    /// SpO2 mapped to a full fit
    pub spo2_full: f64,
    pub respiratory_rate_weight: f64,
    pub respiratory_spo2_weight: f64,
    pub target_activity: Span,
    /// Activity above the target range that costs half the activity fit
    pub activity_excess_span: f64,
    pub activity_level_weight: f64,
    pub activity_pattern_weight: f64,
    pub stress_hrv_weight: f64,
    pub stress_balance_weight: f64,
    pub overall_cardiovascular_weight: f64,
    pub overall_respiratory_weight: f64,
    pub overall_activity_weight: f64,
    pub overall_stress_weight: f64,
    /// Share of the overall score independent of signal quality
    pub quality_floor_factor: f64,
}

impl Default for WellnessConfig {
    fn default() -> Self {
        Self {
            resting_heart_rate: Span::new(60.0, 80.0),
            heart_rate_fit_span: 40.0,
            cardio_heart_rate_weight: 0.4,
            cardio_hrv_weight: 0.35,
            cardio_rhythm_weight: 0.25,
            normal_respiratory_rate: Span::new(12.0, 20.0),
            respiratory_rate_fit_span: 10.0,
            spo2_floor: 80.0,
            spo2_full: 96.0,
            respiratory_rate_weight: 0.4,
            respiratory_spo2_weight: 0.6,
            target_activity: Span::new(20.0, 80.0),
            activity_excess_span: 200.0,
            activity_level_weight: 0.7,
            activity_pattern_weight: 0.3,
            stress_hrv_weight: 0.6,
            stress_balance_weight: 0.4,
            overall_cardiovascular_weight: 0.35,
            overall_respiratory_weight: 0.25,
            overall_activity_weight: 0.2,
            overall_stress_weight: 0.2,
            quality_floor_factor: 0.8,
        }
    }
}

/// Thresholds of the risk-factor and positive-indicator rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorThresholds {
    pub high_heart_rate: f64,
    pub low_heart_rate: f64,
    pub low_hrv_score: f64,
    pub low_spo2: f64,
    pub high_temperature: f64,
    pub low_temperature: f64,
    pub low_quality: f64,
    pub low_alignment: f64,
    pub artifact_count: usize,
    pub high_lf_hf: f64,
    pub excellent_hrv_score: f64,
    pub good_hrv_score: f64,
    pub optimal_spo2: f64,
    pub excellent_quality: f64,
    pub strong_alignment: f64,
    pub normal_temperature: Span,
    pub optimal_heart_rate: Span,
}

impl Default for IndicatorThresholds {
    fn default() -> Self {
        Self {
            high_heart_rate: 100.0,
            low_heart_rate: 50.0,
            low_hrv_score: 30.0,
            low_spo2: 92.0,
            high_temperature: 38.0,
            low_temperature: 35.5,
            low_quality: 0.6,
            low_alignment: 0.5,
            artifact_count: 2,
            high_lf_hf: 3.0,
            excellent_hrv_score: 70.0,
            good_hrv_score: 50.0,
            optimal_spo2: 97.0,
            excellent_quality: 0.85,
            strong_alignment: 0.85,
            normal_temperature: Span::new(36.1, 37.2),
            optimal_heart_rate: Span::new(55.0, 75.0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub feature_scales: FeatureScales,
    pub wellness: WellnessConfig,
    pub indicators: IndicatorThresholds,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions retained before the least recently used is evicted
    pub max_sessions: usize,
    /// Entries kept by the processing log
    pub processing_log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            processing_log_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Samples per second produced by the simulated source
    pub cadence_hz: f64,
    /// Records buffered for the consumer before new ones are dropped
    pub record_channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cadence_hz: 10.0,
            record_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Fixed seed for reproducible runs; random when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(deserialize_with = "deserialize_baseline")]
    pub baseline: VitalSigns,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BaselineOverride {
    heart_rate: Option<f64>,
    spo2: Option<f64>,
    temperature: Option<f64>,
    activity: Option<f64>,
}

/// Baseline channels missing from the file keep their default values.
fn deserialize_baseline<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VitalSigns, D::Error> {
    let patch = BaselineOverride::deserialize(deserializer)?;
    let base = SimulatorConfig::default().baseline;
    Ok(VitalSigns {
        heart_rate: patch.heart_rate.unwrap_or(base.heart_rate),
        spo2: patch.spo2.unwrap_or(base.spo2),
        temperature: patch.temperature.unwrap_or(base.temperature),
        activity: patch.activity.unwrap_or(base.activity),
    })
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            baseline: VitalSigns {
                heart_rate: 75.0,
                spo2: 98.0,
                temperature: 36.8,
                activity: 30.0,
            },
        }
    }
}
