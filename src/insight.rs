//! # Insight Module
//!
//! Final pipeline stage. Fuses the quality, frequency and temporal outputs
//! into a condition classification, wellness sub-scores, risk and positive
//! indicators and a recommendation.
//!
//! ## Classification
//! `PROFILES` is a fixed table of ten immutable condition profiles, each a
//! set of expected feature ranges with weights. Every profile is scored by
//! the same weighted-distance function; similarities `exp(-d)` are
//! normalized into the probability map.
//!
//! ## Indicators
//! Risk factors and positive indicators are independent threshold rules.
//! `RiskFactor` declaration order is its priority: the first active risk
//! keys the recommendation lookup.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::{FeatureScales, IndicatorThresholds, InsightConfig, Span, WellnessConfig};
use crate::frequency::FrequencyFeatures;
use crate::quality::QualityReport;
use crate::temporal::{PatternType, TemporalFeatures};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Condition {
    #[serde(rename = "Normal Resting")]
    NormalResting,
    #[serde(rename = "Light Activity")]
    LightActivity,
    #[serde(rename = "Moderate Exercise")]
    ModerateExercise,
    #[serde(rename = "Intense Exercise")]
    IntenseExercise,
    #[serde(rename = "Deep Rest")]
    DeepRest,
    #[serde(rename = "Sleep State")]
    SleepState,
    #[serde(rename = "Elevated Stress")]
    ElevatedStress,
    #[serde(rename = "Relaxation")]
    Relaxation,
    #[serde(rename = "Recovery Mode")]
    RecoveryMode,
    #[serde(rename = "Optimal Wellness")]
    OptimalWellness,
}

impl Condition {
    pub fn label(&self) -> &'static str {
        match self {
            Condition::NormalResting => "Normal Resting",
            Condition::LightActivity => "Light Activity",
            Condition::ModerateExercise => "Moderate Exercise",
            Condition::IntenseExercise => "Intense Exercise",
            Condition::DeepRest => "Deep Rest",
            Condition::SleepState => "Sleep State",
            Condition::ElevatedStress => "Elevated Stress",
            Condition::Relaxation => "Relaxation",
            Condition::RecoveryMode => "Recovery Mode",
            Condition::OptimalWellness => "Optimal Wellness",
        }
    }

    fn maintenance_message(&self) -> &'static str {
        match self {
            Condition::NormalResting => "Vitals are in a healthy resting range. Keep up your current routine.",
            Condition::LightActivity => "Light activity looks well tolerated. Keep moving at a comfortable pace.",
            Condition::ModerateExercise => "Good aerobic effort. Stay hydrated and keep a steady pace.",
            Condition::IntenseExercise => "High-intensity effort detected. Plan a cool-down and recovery period.",
            Condition::DeepRest => "Deep rest detected. Your body is recovering well.",
            Condition::SleepState => "Sleep patterns look steady. Maintain a consistent sleep schedule.",
            Condition::ElevatedStress => "Signs of stress are present. A few minutes of slow breathing can help.",
            Condition::Relaxation => "You are relaxed. This is a good state for focus or recovery.",
            Condition::RecoveryMode => "Recovery is progressing well. Favor light movement and hydration.",
            Condition::OptimalWellness => "All indicators look excellent. Keep doing what you are doing.",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Risk indicators, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskFactor {
    #[serde(rename = "low blood oxygen")]
    LowBloodOxygen,
    #[serde(rename = "elevated heart rate")]
    ElevatedHeartRate,
    #[serde(rename = "low heart rate")]
    LowHeartRate,
    #[serde(rename = "elevated body temperature")]
    ElevatedTemperature,
    #[serde(rename = "low body temperature")]
    LowTemperature,
    #[serde(rename = "low heart rate variability")]
    LowHeartRateVariability,
    #[serde(rename = "sympathetic dominance")]
    SympatheticDominance,
    #[serde(rename = "circadian misalignment")]
    CircadianMisalignment,
    #[serde(rename = "poor signal quality")]
    PoorSignalQuality,
    #[serde(rename = "multiple signal artifacts")]
    MultipleArtifacts,
}

impl RiskFactor {
    pub fn label(&self) -> &'static str {
        match self {
            RiskFactor::LowBloodOxygen => "low blood oxygen",
            RiskFactor::ElevatedHeartRate => "elevated heart rate",
            RiskFactor::LowHeartRate => "low heart rate",
            RiskFactor::ElevatedTemperature => "elevated body temperature",
            RiskFactor::LowTemperature => "low body temperature",
            RiskFactor::LowHeartRateVariability => "low heart rate variability",
            RiskFactor::SympatheticDominance => "sympathetic dominance",
            RiskFactor::CircadianMisalignment => "circadian misalignment",
            RiskFactor::PoorSignalQuality => "poor signal quality",
            RiskFactor::MultipleArtifacts => "multiple signal artifacts",
        }
    }

    fn advice(&self) -> &'static str {
        match self {
            RiskFactor::LowBloodOxygen => {
                "Blood oxygen is low. Rest, breathe deeply and seek medical advice if it persists."
            }
            RiskFactor::ElevatedHeartRate => "Heart rate is elevated. Slow down and take a few minutes to rest.",
            RiskFactor::LowHeartRate => "Heart rate is unusually low. Check in with a clinician if you feel unwell.",
            RiskFactor::ElevatedTemperature => "Body temperature is elevated. Hydrate and monitor for fever.",
            RiskFactor::LowTemperature => "Body temperature is low. Warm up and check the sensor fit.",
            RiskFactor::LowHeartRateVariability => {
                "Heart rate variability is low. Prioritize rest, sleep and stress management."
            }
            RiskFactor::SympatheticDominance => "Your nervous system is in a high-alert state. Try slow, paced breathing.",
            RiskFactor::CircadianMisalignment => {
                "Your rhythm is out of step with the time of day. Keep regular sleep and activity times."
            }
            RiskFactor::PoorSignalQuality => "Signal quality is poor. Adjust the sensor for a better reading.",
            RiskFactor::MultipleArtifacts => "Several signal artifacts detected. Hold still and check sensor contact.",
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PositiveIndicator {
    #[serde(rename = "excellent heart rate variability")]
    ExcellentHeartRateVariability,
    #[serde(rename = "good heart rate variability")]
    GoodHeartRateVariability,
    #[serde(rename = "optimal blood oxygen")]
    OptimalBloodOxygen,
    #[serde(rename = "excellent signal quality")]
    ExcellentSignalQuality,
    #[serde(rename = "strong circadian alignment")]
    StrongCircadianAlignment,
    #[serde(rename = "normal body temperature")]
    NormalTemperature,
    #[serde(rename = "optimal resting heart rate")]
    OptimalRestingHeartRate,
}

/// Expected range of one feature and its weight in the distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBand {
    pub range: Span,
    pub weight: f64,
}

const fn heart_rate(min: f64, max: f64) -> FeatureBand {
    FeatureBand {
        range: Span::new(min, max),
        weight: 1.0,
    }
}

const fn hrv(min: f64, max: f64) -> FeatureBand {
    FeatureBand {
        range: Span::new(min, max),
        weight: 0.6,
    }
}

const fn activity(min: f64, max: f64) -> FeatureBand {
    FeatureBand {
        range: Span::new(min, max),
        weight: 0.8,
    }
}

const fn rhythm(min: f64, max: f64) -> FeatureBand {
    FeatureBand {
        range: Span::new(min, max),
        weight: 0.3,
    }
}

const fn quality(min: f64, max: f64) -> FeatureBand {
    FeatureBand {
        range: Span::new(min, max),
        weight: 0.2,
    }
}

const ANY_RHYTHM: FeatureBand = rhythm(0.0, 100.0);
const ANY_QUALITY: FeatureBand = quality(0.0, 1.0);

/// Features the classifier compares against each profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub heart_rate: f64,
    pub hrv_score: f64,
    pub activity: f64,
    pub rhythm_score: f64,
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionProfile {
    pub condition: Condition,
    pub heart_rate: FeatureBand,
    pub hrv_score: FeatureBand,
    pub activity: FeatureBand,
    pub rhythm_score: FeatureBand,
    pub quality: FeatureBand,
}

impl ConditionProfile {
    /// Weighted mean of squared, scale-normalized distances outside each range.
    pub fn distance(&self, features: &FeatureVector, scales: &FeatureScales) -> f64 {
        let terms = [
            (&self.heart_rate, features.heart_rate, scales.heart_rate),
            (&self.hrv_score, features.hrv_score, scales.hrv_score),
            (&self.activity, features.activity, scales.activity),
            (&self.rhythm_score, features.rhythm_score, scales.rhythm_score),
            (&self.quality, features.quality, scales.quality),
        ];
        let (sum, weight) = terms.iter().fold((0.0, 0.0), |(sum, weight), (band, value, scale)| {
            let d = band.range.distance(*value) / scale.max(f64::EPSILON);
            (sum + band.weight * d * d, weight + band.weight)
        });
        if weight > 0.0 {
            sum / weight
        } else {
            0.0
        }
    }
}

pub const PROFILES: [ConditionProfile; 10] = [
    ConditionProfile {
        condition: Condition::NormalResting,
        heart_rate: heart_rate(60.0, 85.0),
        hrv_score: hrv(0.0, 100.0),
        activity: activity(0.0, 25.0),
        rhythm_score: rhythm(40.0, 100.0),
        quality: quality(0.5, 1.0),
    },
    ConditionProfile {
        condition: Condition::LightActivity,
        heart_rate: heart_rate(85.0, 110.0),
        hrv_score: hrv(20.0, 70.0),
        activity: activity(25.0, 70.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::ModerateExercise,
        heart_rate: heart_rate(110.0, 140.0),
        hrv_score: hrv(10.0, 50.0),
        activity: activity(60.0, 110.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::IntenseExercise,
        heart_rate: heart_rate(140.0, 220.0),
        hrv_score: hrv(0.0, 40.0),
        activity: activity(90.0, 300.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::DeepRest,
        heart_rate: heart_rate(45.0, 65.0),
        hrv_score: hrv(60.0, 100.0),
        activity: activity(0.0, 10.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::SleepState,
        heart_rate: heart_rate(40.0, 60.0),
        hrv_score: hrv(40.0, 100.0),
        activity: activity(0.0, 5.0),
        rhythm_score: rhythm(50.0, 100.0),
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::ElevatedStress,
        heart_rate: heart_rate(85.0, 120.0),
        hrv_score: hrv(0.0, 40.0),
        activity: activity(0.0, 20.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::Relaxation,
        heart_rate: heart_rate(60.0, 75.0),
        hrv_score: hrv(60.0, 100.0),
        activity: activity(0.0, 20.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::RecoveryMode,
        heart_rate: heart_rate(50.0, 70.0),
        hrv_score: hrv(70.0, 100.0),
        activity: activity(0.0, 30.0),
        rhythm_score: ANY_RHYTHM,
        quality: ANY_QUALITY,
    },
    ConditionProfile {
        condition: Condition::OptimalWellness,
        heart_rate: heart_rate(60.0, 75.0),
        hrv_score: hrv(70.0, 100.0),
        activity: activity(10.0, 60.0),
        rhythm_score: rhythm(70.0, 100.0),
        quality: quality(0.8, 1.0),
    },
];

/// (condition, top risk) pairs with advice more specific than the risk alone.
const RECOMMENDATIONS: &[(Condition, RiskFactor, &str)] = &[
    (
        Condition::IntenseExercise,
        RiskFactor::LowBloodOxygen,
        "Oxygen saturation is dropping under heavy effort. Stop, recover and breathe deeply.",
    ),
    (
        Condition::ModerateExercise,
        RiskFactor::LowBloodOxygen,
        "Oxygen saturation is low for this effort. Reduce intensity until it recovers.",
    ),
    (
        Condition::SleepState,
        RiskFactor::LowBloodOxygen,
        "Oxygen dips during sleep. Consider discussing a sleep-apnea screening with a clinician.",
    ),
    (
        Condition::IntenseExercise,
        RiskFactor::ElevatedHeartRate,
        "Heart rate is very high under sustained effort. Ease off, cool down and hydrate.",
    ),
    (
        Condition::ModerateExercise,
        RiskFactor::ElevatedHeartRate,
        "Heart rate is climbing. Keep the effort conversational and hydrate.",
    ),
    (
        Condition::ElevatedStress,
        RiskFactor::ElevatedHeartRate,
        "Heart rate is elevated without activity. Pause and try five minutes of slow breathing.",
    ),
    (
        Condition::ElevatedStress,
        RiskFactor::LowHeartRateVariability,
        "Stress markers are high and variability is low. Step away for a short break.",
    ),
    (
        Condition::ElevatedStress,
        RiskFactor::SympatheticDominance,
        "Your stress response is active. Paced breathing at six breaths per minute can help.",
    ),
    (
        Condition::NormalResting,
        RiskFactor::LowHeartRateVariability,
        "Resting vitals are normal but variability is low. Prioritize sleep and recovery today.",
    ),
    (
        Condition::IntenseExercise,
        RiskFactor::LowHeartRateVariability,
        "Variability is suppressed by hard effort. Schedule an easy day to recover.",
    ),
    (
        Condition::RecoveryMode,
        RiskFactor::ElevatedTemperature,
        "Temperature is elevated during recovery. Rest and monitor for signs of illness.",
    ),
    (
        Condition::SleepState,
        RiskFactor::CircadianMisalignment,
        "Sleep is happening outside your usual rhythm. Aim for consistent bed and wake times.",
    ),
];

fn recommendation(condition: Condition, top_risk: Option<RiskFactor>) -> &'static str {
    let Some(risk) = top_risk else {
        return condition.maintenance_message();
    };
    RECOMMENDATIONS
        .iter()
        .find(|(c, r, _)| *c == condition && *r == risk)
        .map_or(risk.advice(), |&(_, _, text)| text)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WellnessScores {
    pub cardiovascular: f64,
    pub respiratory: f64,
    pub activity: f64,
    pub stress: f64,
    pub overall: f64,
}

/// Output of the insight stage (`lia_insights`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub condition: Condition,
    pub confidence: f64,
    pub probabilities: BTreeMap<Condition, f64>,
    pub wellness: WellnessScores,
    pub risk_factors: BTreeSet<RiskFactor>,
    pub positive_indicators: BTreeSet<PositiveIndicator>,
    pub recommendation: String,
    /// True when any upstream stage reported a degraded result
    pub degraded: bool,
    pub processing_notes: String,
}

/// Inputs of the indicator rules.
#[derive(Debug, Clone, Copy)]
struct IndicatorInputs {
    heart_rate: f64,
    hrv_score: f64,
    spo2: f64,
    temperature: f64,
    quality: f64,
    alignment: f64,
    artifact_count: usize,
    /// LF/HF of a valid spectrum only
    lf_hf_ratio: Option<f64>,
}

fn risk_factors(inputs: &IndicatorInputs, t: &IndicatorThresholds) -> BTreeSet<RiskFactor> {
    let rules = [
        (RiskFactor::LowBloodOxygen, inputs.spo2 < t.low_spo2),
        (RiskFactor::ElevatedHeartRate, inputs.heart_rate > t.high_heart_rate),
        (RiskFactor::LowHeartRate, inputs.heart_rate < t.low_heart_rate),
        (RiskFactor::ElevatedTemperature, inputs.temperature > t.high_temperature),
        (RiskFactor::LowTemperature, inputs.temperature < t.low_temperature),
        (RiskFactor::LowHeartRateVariability, inputs.hrv_score < t.low_hrv_score),
        (
            RiskFactor::SympatheticDominance,
            inputs.lf_hf_ratio.is_some_and(|ratio| ratio > t.high_lf_hf),
        ),
        (RiskFactor::CircadianMisalignment, inputs.alignment < t.low_alignment),
        (RiskFactor::PoorSignalQuality, inputs.quality < t.low_quality),
        (RiskFactor::MultipleArtifacts, inputs.artifact_count >= t.artifact_count),
    ];
    rules.into_iter().filter_map(|(factor, active)| active.then_some(factor)).collect()
}

fn positive_indicators(inputs: &IndicatorInputs, t: &IndicatorThresholds) -> BTreeSet<PositiveIndicator> {
    let rules = [
        (
            PositiveIndicator::ExcellentHeartRateVariability,
            inputs.hrv_score > t.excellent_hrv_score,
        ),
        (
            PositiveIndicator::GoodHeartRateVariability,
            inputs.hrv_score >= t.good_hrv_score && inputs.hrv_score <= t.excellent_hrv_score,
        ),
        (PositiveIndicator::OptimalBloodOxygen, inputs.spo2 >= t.optimal_spo2),
        (PositiveIndicator::ExcellentSignalQuality, inputs.quality > t.excellent_quality),
        (PositiveIndicator::StrongCircadianAlignment, inputs.alignment > t.strong_alignment),
        (PositiveIndicator::NormalTemperature, t.normal_temperature.contains(inputs.temperature)),
        (
            PositiveIndicator::OptimalRestingHeartRate,
            t.optimal_heart_rate.contains(inputs.heart_rate),
        ),
    ];
    rules.into_iter().filter_map(|(indicator, active)| active.then_some(indicator)).collect()
}

/// 1 inside `span`, falling linearly to 0 at `falloff` outside it.
fn range_fit(value: f64, span: &Span, falloff: f64) -> f64 {
    1.0 - (span.distance(value) / falloff.max(f64::EPSILON)).min(1.0)
}

fn weighted_mean(terms: &[(f64, f64)]) -> f64 {
    let total: f64 = terms.iter().map(|(w, _)| w).sum();
    if total <= 0.0 {
        return 0.0;
    }
    terms.iter().map(|(w, v)| w * v).sum::<f64>() / total
}

fn pattern_fit(pattern: PatternType) -> f64 {
    match pattern {
        PatternType::Stable => 1.0,
        PatternType::Increasing | PatternType::Decreasing => 0.8,
        PatternType::Oscillating => 0.7,
        PatternType::Irregular => 0.4,
    }
}

fn activity_fit(activity: f64, config: &WellnessConfig) -> f64 {
    let target = &config.target_activity;
    if activity < target.min {
        0.5 + 0.5 * (activity / target.min.max(f64::EPSILON)).max(0.0)
    } else if activity > target.max {
        1.0 - ((activity - target.max) / config.activity_excess_span.max(f64::EPSILON)).min(0.5)
    } else {
        1.0
    }
}

pub struct InsightEngine {
    config: InsightConfig,
}

impl InsightEngine {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Condition probabilities over all profiles; sums to 1.
    pub fn classify(&self, features: &FeatureVector) -> BTreeMap<Condition, f64> {
        let distances: Vec<(Condition, f64)> = PROFILES
            .iter()
            .map(|p| (p.condition, p.distance(features, &self.config.feature_scales)))
            .collect();

        // Shift by the smallest distance so the best match has similarity 1
        let nearest = distances.iter().map(|(_, d)| *d).fold(f64::INFINITY, f64::min);
        let similarities: Vec<(Condition, f64)> =
            distances.into_iter().map(|(c, d)| (c, (-(d - nearest)).exp())).collect();
        let total: f64 = similarities.iter().map(|(_, s)| s).sum();

        similarities.into_iter().map(|(c, s)| (c, s / total)).collect()
    }

    pub fn wellness(
        &self,
        quality: &QualityReport,
        frequency: &FrequencyFeatures,
        temporal: &TemporalFeatures,
    ) -> WellnessScores {
        let w = &self.config.wellness;
        let signals = &quality.enhanced_signals;
        let hrv = frequency.hrv.hrv_score / 100.0;

        let cardiovascular = 100.0
            * weighted_mean(&[
                (
                    w.cardio_heart_rate_weight,
                    range_fit(signals.heart_rate, &w.resting_heart_rate, w.heart_rate_fit_span),
                ),
                (w.cardio_hrv_weight, hrv),
                (w.cardio_rhythm_weight, temporal.rhythm_score / 100.0),
            ]);

        let spo2_span = (w.spo2_full - w.spo2_floor).max(f64::EPSILON);
        let respiratory = 100.0
            * weighted_mean(&[
                (
                    w.respiratory_rate_weight,
                    range_fit(
                        frequency.respiratory_rate_bpm,
                        &w.normal_respiratory_rate,
                        w.respiratory_rate_fit_span,
                    ),
                ),
                (
                    w.respiratory_spo2_weight,
                    ((signals.spo2 - w.spo2_floor) / spo2_span).clamp(0.0, 1.0),
                ),
            ]);

        let activity = 100.0
            * weighted_mean(&[
                (w.activity_level_weight, activity_fit(signals.activity, w)),
                (w.activity_pattern_weight, pattern_fit(temporal.pattern_type)),
            ]);

        let balance = 1.0 / (1.0 + (frequency.lf_hf_ratio - 1.0).max(0.0) / 2.0);
        let stress = 100.0 * weighted_mean(&[(w.stress_hrv_weight, hrv), (w.stress_balance_weight, balance)]);

        let quality_factor =
            w.quality_floor_factor + (1.0 - w.quality_floor_factor) * quality.overall_quality.clamp(0.0, 1.0);
        let overall = quality_factor
            * weighted_mean(&[
                (w.overall_cardiovascular_weight, cardiovascular),
                (w.overall_respiratory_weight, respiratory),
                (w.overall_activity_weight, activity),
                (w.overall_stress_weight, stress),
            ]);

        WellnessScores {
            cardiovascular: cardiovascular.clamp(0.0, 100.0),
            respiratory: respiratory.clamp(0.0, 100.0),
            activity: activity.clamp(0.0, 100.0),
            stress: stress.clamp(0.0, 100.0),
            overall: overall.clamp(0.0, 100.0),
        }
    }

    pub fn infer(&self, quality: &QualityReport, frequency: &FrequencyFeatures, temporal: &TemporalFeatures) -> Insight {
        let signals = &quality.enhanced_signals;
        let features = FeatureVector {
            heart_rate: signals.heart_rate,
            hrv_score: frequency.hrv.hrv_score,
            activity: signals.activity,
            rhythm_score: temporal.rhythm_score,
            quality: quality.overall_quality,
        };

        let probabilities = self.classify(&features);
        // Ties resolve to the earlier profile
        let (condition, confidence) = probabilities
            .iter()
            .fold((Condition::NormalResting, f64::NEG_INFINITY), |best, (&c, &p)| {
                if p > best.1 {
                    (c, p)
                } else {
                    best
                }
            });

        let inputs = IndicatorInputs {
            heart_rate: signals.heart_rate,
            hrv_score: frequency.hrv.hrv_score,
            spo2: signals.spo2,
            temperature: signals.temperature,
            quality: quality.overall_quality,
            alignment: temporal.circadian_alignment,
            artifact_count: quality.artifacts.len(),
            lf_hf_ratio: frequency.spectrum_valid.then_some(frequency.lf_hf_ratio),
        };
        let risk_factors = risk_factors(&inputs, &self.config.indicators);
        let positive_indicators = positive_indicators(&inputs, &self.config.indicators);
        let top_risk = risk_factors.iter().next().copied();
        let recommendation = recommendation(condition, top_risk).to_string();

        let wellness = self.wellness(quality, frequency, temporal);
        let degraded = quality.degraded || frequency.degraded || temporal.degraded;

        let processing_notes = format!(
            "Condition: {} ({:.0}% confidence) | Wellness: {:.1}/100 | Risks: {} | Positives: {}",
            condition,
            confidence * 100.0,
            wellness.overall,
            risk_factors.len(),
            positive_indicators.len()
        );

        log::debug!(
            "condition={} confidence={:.2} wellness={:.1} risks={}",
            condition,
            confidence,
            wellness.overall,
            risk_factors.len()
        );

        Insight {
            condition,
            confidence,
            probabilities,
            wellness,
            risk_factors,
            positive_indicators,
            recommendation,
            degraded,
            processing_notes,
        }
    }
}
