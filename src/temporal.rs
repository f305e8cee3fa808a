//! # Temporal Pattern Module
//!
//! Third pipeline stage. Looks at a longer, timestamped window of heart rate,
//! activity and temperature to classify the trend shape and compare the
//! observed state with what is expected for the local time of day.
//!
//! ## Key Types
//! - `TemporalPoint`: one history entry (timestamp plus derived features)
//! - `TemporalFeatures`: pattern, consistency, circadian phase/alignment, rhythm score
//!
//! The circadian phase depends only on the sample's own timestamp and its
//! UTC offset, never on the host clock.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::Serialize;
use std::fmt;

use crate::config::{PhaseProfile, Span, TemporalConfig};
use crate::error::Notice;
use crate::timeseries::{HistoryBuffer, SeriesExt};

/// One entry of the temporal history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemporalPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub heart_rate: f64,
    pub activity: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Stable,
    Increasing,
    Decreasing,
    Oscillating,
    Irregular,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PatternType::Stable => "stable",
            PatternType::Increasing => "increasing",
            PatternType::Decreasing => "decreasing",
            PatternType::Oscillating => "oscillating",
            PatternType::Irregular => "irregular",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircadianPhase {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl CircadianPhase {
    /// Bucket a local hour using the phase start hours.
    pub fn from_hour(hour: u32, config: &TemporalConfig) -> Self {
        let phases = &config.phases;
        if hour >= phases.morning.start_hour && hour < phases.afternoon.start_hour {
            CircadianPhase::Morning
        } else if hour >= phases.afternoon.start_hour && hour < phases.evening.start_hour {
            CircadianPhase::Afternoon
        } else if hour >= phases.evening.start_hour && hour < phases.night.start_hour {
            CircadianPhase::Evening
        } else {
            CircadianPhase::Night
        }
    }

    pub fn profile<'a>(&self, config: &'a TemporalConfig) -> &'a PhaseProfile {
        match self {
            CircadianPhase::Morning => &config.phases.morning,
            CircadianPhase::Afternoon => &config.phases.afternoon,
            CircadianPhase::Evening => &config.phases.evening,
            CircadianPhase::Night => &config.phases.night,
        }
    }
}

impl fmt::Display for CircadianPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CircadianPhase::Morning => "morning",
            CircadianPhase::Afternoon => "afternoon",
            CircadianPhase::Evening => "evening",
            CircadianPhase::Night => "night",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureRhythm {
    CircadianPeak,
    CircadianTrough,
    MorningLow,
    NormalVariation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternRecognition {
    pub short_term_trend: TrendDirection,
    pub long_term_trend: TrendDirection,
    pub periodicity_detected: bool,
    pub period_seconds: Option<f64>,
    pub pattern_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub expected_heart_rate_range: Span,
    /// Current heart rate minus the phase's expected heart rate
    pub heart_rate_deviation: f64,
    pub activity_appropriate: bool,
    pub temperature_rhythm: TemperatureRhythm,
}

/// Output of the temporal stage (`timesystems_layer`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalFeatures {
    pub pattern_type: PatternType,
    pub temporal_consistency: f64,
    pub circadian_phase: CircadianPhase,
    pub circadian_alignment: f64,
    pub rhythm_score: f64,
    pub phase_shift_minutes: f64,
    /// Heart-rate slope in bpm per sample
    pub trend_slope: f64,
    pub pattern_recognition: PatternRecognition,
    pub time_of_day: TimeOfDay,
    pub expected_heart_rate: f64,
    pub degraded: bool,
    pub notices: Vec<Notice>,
    pub processing_notes: String,
}

/// Local minute of day, seconds included as a fraction.
fn minute_of_day(timestamp: &DateTime<FixedOffset>) -> f64 {
    timestamp.hour() as f64 * 60.0 + timestamp.minute() as f64 + timestamp.second() as f64 / 60.0
}

/// Wrap a minute offset into `(-720, 720]`.
fn wrap_minutes(minutes: f64) -> f64 {
    let wrapped = minutes.rem_euclid(1440.0);
    if wrapped > 720.0 {
        wrapped - 1440.0
    } else {
        wrapped
    }
}

/// Standard scores of `values`; all zeros for a flat series.
fn z_scores(values: &[f64]) -> Vec<f64> {
    match (values.mean(), values.std_dev()) {
        (Some(mean), Some(std)) if std > f64::EPSILON => values.iter().map(|v| (v - mean) / std).collect(),
        _ => vec![0.0; values.len()],
    }
}

/// Normalized autocorrelation of `values` at lags `0..=max_lag`.
fn autocorrelation(values: &[f64], max_lag: usize) -> Option<Vec<f64>> {
    let energy: f64 = values.iter().map(|v| v * v).sum();
    if energy <= f64::EPSILON {
        return None;
    }
    Some(
        (0..=max_lag.min(values.len().saturating_sub(1)))
            .map(|lag| values.iter().zip(&values[lag..]).map(|(a, b)| a * b).sum::<f64>() / energy)
            .collect(),
    )
}

pub struct TemporalAnalyzer {
    config: TemporalConfig,
}

impl TemporalAnalyzer {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemporalConfig {
        &self.config
    }

    /// Analyze the temporal history plus the current point without mutating it.
    pub fn analyze(&self, history: &HistoryBuffer<TemporalPoint>, current: TemporalPoint) -> TemporalFeatures {
        let window = history.window_with(current, self.config.history_capacity);
        let heart_rate: Vec<f64> = window.iter().map(|p| p.heart_rate).collect();
        let activity: Vec<f64> = window.iter().map(|p| p.activity).collect();

        let mut notices = Vec::new();
        let degraded = window.len() < self.config.min_window;

        let fit_slope = heart_rate.linear_fit().map_or(0.0, |fit| fit.slope);
        let residuals = heart_rate.detrended();
        let residual_variance = residuals.variance().unwrap_or(0.0);

        let (pattern_type, temporal_consistency) = if degraded {
            notices.push(Notice::InsufficientHistory {
                required: self.config.min_window,
                available: window.len(),
            });
            (PatternType::Stable, 0.5)
        } else {
            let consistency =
                (1.0 - residual_variance / self.config.consistency_variance_scale.max(f64::EPSILON)).clamp(0.0, 1.0);
            (self.classify_pattern(fit_slope, residual_variance, &residuals), consistency)
        };

        let circadian_phase = CircadianPhase::from_hour(current.timestamp.hour(), &self.config);
        let profile = circadian_phase.profile(&self.config);
        let circadian_alignment = self.alignment(
            heart_rate.mean().unwrap_or(current.heart_rate),
            activity.mean().unwrap_or(current.activity),
            profile,
        );

        let weight_total = self.config.consistency_weight + self.config.alignment_weight;
        let rhythm_score = if weight_total > 0.0 {
            100.0
                * (self.config.consistency_weight * temporal_consistency
                    + self.config.alignment_weight * circadian_alignment)
                / weight_total
        } else {
            0.0
        };

        let phase_shift_minutes = if degraded {
            0.0
        } else {
            match self.phase_shift(&window, &heart_rate, &activity, profile) {
                Some(shift) => shift,
                None => {
                    notices.push(Notice::DegenerateComputation {
                        computation: "phase_shift",
                    });
                    0.0
                }
            }
        };

        let pattern_recognition = self.pattern_recognition(&window, &heart_rate, &residuals, temporal_consistency);
        let time_of_day = self.time_of_day(&current, circadian_phase, profile);

        let processing_notes = format!(
            "Pattern: {} | Phase: {} | Alignment: {:.2} | Rhythm score: {:.1} | Phase shift: {:.0} min{}",
            pattern_type,
            circadian_phase,
            circadian_alignment,
            rhythm_score,
            phase_shift_minutes,
            if degraded { " | low confidence" } else { "" }
        );

        log::debug!(
            "pattern={} phase={} alignment={:.2} rhythm={:.1} window={}",
            pattern_type,
            circadian_phase,
            circadian_alignment,
            rhythm_score,
            window.len()
        );

        TemporalFeatures {
            pattern_type,
            temporal_consistency,
            circadian_phase,
            circadian_alignment,
            rhythm_score: rhythm_score.clamp(0.0, 100.0),
            phase_shift_minutes,
            trend_slope: fit_slope,
            pattern_recognition,
            time_of_day,
            expected_heart_rate: profile.expected_heart_rate,
            degraded,
            notices,
            processing_notes,
        }
    }

    /// First matching rule wins.
    fn classify_pattern(&self, slope: f64, residual_variance: f64, residuals: &[f64]) -> PatternType {
        let config = &self.config;
        if slope.abs() <= config.stable_slope && residual_variance <= config.stable_variance {
            return PatternType::Stable;
        }
        if slope > config.trend_slope {
            return PatternType::Increasing;
        }
        if slope < -config.trend_slope {
            return PatternType::Decreasing;
        }
        if residual_variance > config.irregular_variance {
            return PatternType::Irregular;
        }

        let sign_changes = residuals.windows(2).filter(|w| w[0] * w[1] < 0.0).count();
        let rate = sign_changes as f64 / residuals.len().saturating_sub(1).max(1) as f64;
        if rate > config.oscillation_rate {
            PatternType::Oscillating
        } else {
            PatternType::Stable
        }
    }

    fn alignment(&self, heart_rate: f64, activity: f64, profile: &PhaseProfile) -> f64 {
        let config = &self.config;
        let hr_dev = ((heart_rate - profile.expected_heart_rate).abs()
            / config.alignment_heart_rate_tolerance.max(f64::EPSILON))
        .min(1.0);
        let activity_dev = ((activity - profile.expected_activity).abs()
            / config.alignment_activity_tolerance.max(f64::EPSILON))
        .min(1.0);
        let hr_weight = config.alignment_heart_rate_weight.clamp(0.0, 1.0);
        (1.0 - (hr_weight * hr_dev + (1.0 - hr_weight) * activity_dev)).clamp(0.0, 1.0)
    }

    /// Offset of the observed HR/activity peak from the phase's reference peak.
    fn phase_shift(
        &self,
        window: &[TemporalPoint],
        heart_rate: &[f64],
        activity: &[f64],
        profile: &PhaseProfile,
    ) -> Option<f64> {
        let combined: Vec<f64> = z_scores(heart_rate)
            .iter()
            .zip(z_scores(activity))
            .map(|(h, a)| h + a)
            .collect();
        if combined.iter().all(|v| v.abs() <= f64::EPSILON) {
            return None;
        }

        let peak = combined
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        Some(wrap_minutes(minute_of_day(&window[peak].timestamp) - profile.peak_minute))
    }

    fn trend_direction(&self, values: &[f64]) -> TrendDirection {
        match values.linear_fit() {
            Some(fit) if fit.slope > self.config.trend_description_slope => TrendDirection::Rising,
            Some(fit) if fit.slope < -self.config.trend_description_slope => TrendDirection::Declining,
            Some(_) => TrendDirection::Stable,
            None => TrendDirection::InsufficientData,
        }
    }

    fn pattern_recognition(
        &self,
        window: &[TemporalPoint],
        heart_rate: &[f64],
        residuals: &[f64],
        consistency: f64,
    ) -> PatternRecognition {
        let config = &self.config;

        let short_term_trend = if heart_rate.len() >= config.short_trend_window {
            self.trend_direction(&heart_rate[heart_rate.len() - config.short_trend_window..])
        } else {
            TrendDirection::InsufficientData
        };
        let long_term_trend = if heart_rate.len() >= config.long_trend_min_samples {
            self.trend_direction(heart_rate)
        } else {
            TrendDirection::InsufficientData
        };

        let periodic_peak = if residuals.len() >= config.periodicity_min_samples {
            autocorrelation(residuals, residuals.len() / 2).and_then(|ac| {
                (2..ac.len().saturating_sub(1))
                    .find(|&lag| ac[lag] > config.periodicity_threshold && ac[lag] > ac[lag - 1] && ac[lag] >= ac[lag + 1])
                    .map(|lag| (lag, ac[lag]))
            })
        } else {
            None
        };

        let period_seconds = periodic_peak.map(|(lag, _)| lag as f64 * self.sample_period(window));
        let coverage = (window.len() as f64 / config.history_capacity.max(1) as f64).min(1.0);
        let pattern_confidence = match periodic_peak {
            Some((_, strength)) => coverage * strength,
            None => coverage * consistency,
        };

        PatternRecognition {
            short_term_trend,
            long_term_trend,
            periodicity_detected: periodic_peak.is_some(),
            period_seconds,
            pattern_confidence: pattern_confidence.clamp(0.0, 1.0),
        }
    }

    /// Mean spacing of the window's timestamps in seconds.
    fn sample_period(&self, window: &[TemporalPoint]) -> f64 {
        match (window.first(), window.last()) {
            (Some(first), Some(last)) if window.len() > 1 => {
                let span = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
                let period = span / (window.len() - 1) as f64;
                if period > 0.0 {
                    period
                } else {
                    self.config.nominal_sample_period_secs
                }
            }
            _ => self.config.nominal_sample_period_secs,
        }
    }

    fn time_of_day(&self, current: &TemporalPoint, phase: CircadianPhase, profile: &PhaseProfile) -> TimeOfDay {
        let hour = current.timestamp.hour();
        let rhythm = &self.config.temperature_rhythm;
        let hour_f = hour as f64;

        let temperature_rhythm = if rhythm.peak_hours.contains_half_open(hour_f)
            && current.temperature > rhythm.peak_temperature
        {
            TemperatureRhythm::CircadianPeak
        } else if rhythm.trough_hours.contains_half_open(hour_f) && current.temperature < rhythm.low_temperature {
            TemperatureRhythm::CircadianTrough
        } else if rhythm.morning_low_hours.contains_half_open(hour_f)
            && current.temperature < rhythm.low_temperature
        {
            TemperatureRhythm::MorningLow
        } else {
            TemperatureRhythm::NormalVariation
        };

        TimeOfDay {
            hour,
            expected_heart_rate_range: profile.heart_rate_range,
            heart_rate_deviation: current.heart_rate - profile.expected_heart_rate,
            activity_appropriate: phase != CircadianPhase::Night
                || current.activity <= self.config.night_activity_limit,
            temperature_rhythm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn point(ts: DateTime<FixedOffset>, hr: f64, activity: f64) -> TemporalPoint {
        TemporalPoint {
            timestamp: ts,
            heart_rate: hr,
            activity,
            temperature: 36.8,
        }
    }

    /// History of `hr(i)` sampled at 10 Hz from `hour`, last point returned separately.
    fn series(hour: u32, n: usize, hr: impl Fn(usize) -> f64) -> (HistoryBuffer<TemporalPoint>, TemporalPoint) {
        let mut history = HistoryBuffer::new(TemporalConfig::default().history_capacity);
        let base = start(hour);
        for i in 0..n - 1 {
            history.push(point(base + Duration::milliseconds(100 * i as i64), hr(i), 10.0));
        }
        let current = point(base + Duration::milliseconds(100 * (n - 1) as i64), hr(n - 1), 10.0);
        (history, current)
    }

    #[test]
    fn test_phase_buckets() {
        let config = TemporalConfig::default();
        assert_eq!(CircadianPhase::from_hour(6, &config), CircadianPhase::Morning);
        assert_eq!(CircadianPhase::from_hour(11, &config), CircadianPhase::Morning);
        assert_eq!(CircadianPhase::from_hour(12, &config), CircadianPhase::Afternoon);
        assert_eq!(CircadianPhase::from_hour(18, &config), CircadianPhase::Evening);
        assert_eq!(CircadianPhase::from_hour(22, &config), CircadianPhase::Night);
        assert_eq!(CircadianPhase::from_hour(3, &config), CircadianPhase::Night);
    }

    #[test]
    fn test_phase_uses_sample_offset() {
        // 23:30 UTC is 09:30 in UTC+10
        let ts = FixedOffset::east_opt(10 * 3600)
            .unwrap()
            .from_utc_datetime(&chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(23, 30, 0).unwrap());
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let features = analyzer.analyze(&HistoryBuffer::new(120), point(ts, 70.0, 30.0));
        assert_eq!(features.circadian_phase, CircadianPhase::Morning);
        assert_eq!(features.time_of_day.hour, 9);
    }

    #[test]
    fn test_short_window_is_degraded() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let (history, current) = series(9, 5, |_| 72.0);
        let features = analyzer.analyze(&history, current);

        assert!(features.degraded);
        assert_eq!(features.pattern_type, PatternType::Stable);
        assert_eq!(features.temporal_consistency, 0.5);
        assert_eq!(features.phase_shift_minutes, 0.0);
        assert_eq!(features.pattern_recognition.short_term_trend, TrendDirection::InsufficientData);
    }

    #[test]
    fn test_constant_window_is_stable() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let (history, current) = series(9, 60, |_| 72.0);
        let features = analyzer.analyze(&history, current);

        assert!(!features.degraded);
        assert_eq!(features.pattern_type, PatternType::Stable);
        assert_eq!(features.temporal_consistency, 1.0);
        // HR 72 vs 70 and activity 10 vs 30
        let expected_alignment = 1.0 - (0.7 * 0.1 + 0.3 * (20.0 / 60.0));
        assert!((features.circadian_alignment - expected_alignment).abs() < 1e-9);
        assert!((features.rhythm_score - 100.0 * (0.6 + 0.4 * expected_alignment)).abs() < 1e-9);
        assert!(features
            .notices
            .contains(&Notice::DegenerateComputation { computation: "phase_shift" }));
        assert_eq!(features.pattern_recognition.short_term_trend, TrendDirection::Stable);
        assert_eq!(features.pattern_recognition.long_term_trend, TrendDirection::Stable);
        assert!(!features.pattern_recognition.periodicity_detected);
    }

    #[test]
    fn test_rising_window_is_increasing() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let (history, current) = series(14, 40, |i| 70.0 + 0.5 * i as f64);
        let features = analyzer.analyze(&history, current);

        assert_eq!(features.pattern_type, PatternType::Increasing);
        assert!((features.trend_slope - 0.5).abs() < 1e-9);
        assert_eq!(features.pattern_recognition.short_term_trend, TrendDirection::Rising);
        assert_eq!(features.circadian_phase, CircadianPhase::Afternoon);
    }

    #[test]
    fn test_falling_window_is_decreasing() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let (history, current) = series(9, 40, |i| 120.0 - 0.5 * i as f64);
        let features = analyzer.analyze(&history, current);
        assert_eq!(features.pattern_type, PatternType::Decreasing);
    }

    #[test]
    fn test_alternating_window_oscillates() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let (history, current) = series(9, 40, |i| if i % 2 == 0 { 66.0 } else { 74.0 });
        let features = analyzer.analyze(&history, current);

        assert_eq!(features.pattern_type, PatternType::Oscillating);
        // Residual variance of 16 bpm²
        assert!((features.temporal_consistency - 0.84).abs() < 0.01);
    }

    #[test]
    fn test_wide_alternation_is_irregular() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        let (history, current) = series(9, 40, |i| if i % 2 == 0 { 50.0 } else { 90.0 });
        let features = analyzer.analyze(&history, current);

        assert_eq!(features.pattern_type, PatternType::Irregular);
        assert_eq!(features.temporal_consistency, 0.0);
    }

    #[test]
    fn test_periodicity_detected() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        // 2 s period at 10 Hz
        let (history, current) = series(9, 100, |i| 72.0 + 3.0 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin());
        let features = analyzer.analyze(&history, current);

        let recognition = features.pattern_recognition;
        assert!(recognition.periodicity_detected);
        let period = recognition.period_seconds.unwrap();
        assert!((period - 2.0).abs() < 0.15, "period was {}", period);
        assert!(recognition.pattern_confidence > 0.0);
    }

    #[test]
    fn test_phase_shift_from_peak() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());
        // Peak at the last sample, 10:00 local: matches the morning reference
        let base = start(10) - Duration::milliseconds(100 * 29);
        let mut history = HistoryBuffer::new(120);
        for i in 0..29 {
            history.push(point(base + Duration::milliseconds(100 * i), 70.0, 10.0));
        }
        let current = point(start(10), 90.0, 60.0);
        let features = analyzer.analyze(&history, current);
        assert!(features.phase_shift_minutes.abs() < 1e-9);

        assert_eq!(wrap_minutes(-800.0), 640.0);
        assert_eq!(wrap_minutes(800.0), -640.0);
        assert_eq!(wrap_minutes(720.0), 720.0);
    }

    #[test]
    fn test_time_of_day_context() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig::default());

        let mut night = point(start(3), 80.0, 90.0);
        night.temperature = 36.2;
        let features = analyzer.analyze(&HistoryBuffer::new(120), night);
        assert_eq!(features.circadian_phase, CircadianPhase::Night);
        assert!(!features.time_of_day.activity_appropriate);
        assert_eq!(features.time_of_day.temperature_rhythm, TemperatureRhythm::CircadianTrough);
        assert_eq!(features.time_of_day.heart_rate_deviation, 18.0);
        assert_eq!(features.expected_heart_rate, 62.0);

        let mut afternoon = point(start(15), 75.0, 40.0);
        afternoon.temperature = 37.3;
        let features = analyzer.analyze(&HistoryBuffer::new(120), afternoon);
        assert_eq!(features.time_of_day.temperature_rhythm, TemperatureRhythm::CircadianPeak);
        assert!(features.time_of_day.activity_appropriate);
    }
}
