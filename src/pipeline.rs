//! # Analysis Pipeline Module
//!
//! Runs one sample through the four stages in order:
//! quality → frequency → temporal → insight.
//!
//! ## Key Types
//! - `SessionState`: the three rolling histories owned by one session
//! - `Pipeline`: the configured stages; immutable and shareable across threads
//! - `CompositeRecord`: everything produced for one tick
//!
//! ## Why Commit Last
//! Every stage reads the histories through a window that already contains the
//! current sample, without mutating them. The histories are appended only
//! after all four stages have produced their output, so an abandoned or
//! failed invocation leaves the session exactly as it was.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::frequency::{FrequencyAnalyzer, FrequencyFeatures};
use crate::insight::{Insight, InsightEngine};
use crate::quality::{QualityAssessor, QualityReport};
use crate::temporal::{TemporalAnalyzer, TemporalFeatures, TemporalPoint};
use crate::timeseries::HistoryBuffer;
use crate::vitals::{ChannelHistory, RawSample, VitalSigns};

/// Output of one pipeline pass.
///
/// Field names and nesting are part of the serialization contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub raw_signals: VitalSigns,
    pub clarity_layer: QualityReport,
    pub ifrs_layer: FrequencyFeatures,
    pub timesystems_layer: TemporalFeatures,
    pub lia_insights: Insight,
}

/// Rolling histories of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    quality: ChannelHistory,
    frequency: HistoryBuffer<f64>,
    temporal: HistoryBuffer<TemporalPoint>,
}

impl SessionState {
    pub fn quality_history(&self) -> &ChannelHistory {
        &self.quality
    }

    pub fn frequency_history(&self) -> &HistoryBuffer<f64> {
        &self.frequency
    }

    pub fn temporal_history(&self) -> &HistoryBuffer<TemporalPoint> {
        &self.temporal
    }

    /// Check that the histories advanced together.
    ///
    /// Every tick appends once to each buffer, so each buffer must hold
    /// `min(ticks, capacity)` entries, where `ticks` is at least the longest
    /// buffer length.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.quality.is_aligned() {
            return Err(PipelineError::HistoryCorrupted {
                buffer: "quality",
                reason: "channel histories have different lengths".to_string(),
            });
        }

        let buffers = [
            ("quality", self.quality.len(), self.quality.capacity()),
            ("frequency", self.frequency.len(), self.frequency.capacity()),
            ("temporal", self.temporal.len(), self.temporal.capacity()),
        ];
        let ticks = buffers.iter().map(|(_, len, _)| *len).max().unwrap_or(0);

        for (name, len, capacity) in buffers {
            let expected = ticks.min(capacity);
            if len != expected {
                return Err(PipelineError::HistoryCorrupted {
                    buffer: name,
                    reason: format!("holds {} entries, expected {}", len, expected),
                });
            }
        }
        Ok(())
    }
}

pub struct Pipeline {
    quality: QualityAssessor,
    frequency: FrequencyAnalyzer,
    temporal: TemporalAnalyzer,
    insight: InsightEngine,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            quality: QualityAssessor::new(config.quality),
            frequency: FrequencyAnalyzer::new(config.frequency),
            temporal: TemporalAnalyzer::new(config.temporal),
            insight: InsightEngine::new(config.insight),
        }
    }

    /// Fresh, empty histories sized for this pipeline.
    pub fn new_session_state(&self) -> SessionState {
        SessionState {
            quality: ChannelHistory::new(self.quality.config().history_capacity),
            frequency: HistoryBuffer::new(self.frequency.config().history_capacity),
            temporal: HistoryBuffer::new(self.temporal.config().history_capacity),
        }
    }

    /// Process one sample for the session owning `state`.
    ///
    /// Only a corrupted `state` is an error; any sample value is accepted.
    pub fn process(&self, state: &mut SessionState, sample: &RawSample) -> Result<CompositeRecord, PipelineError> {
        if let Err(e) = state.validate() {
            log::error!("Refusing to process sample: {}", e);
            return Err(e);
        }

        let quality = self.quality.assess(&state.quality, sample);
        let enhanced = quality.report.enhanced_signals;

        let frequency = self.frequency.analyze(&state.frequency, enhanced.heart_rate);

        let point = TemporalPoint {
            timestamp: sample.timestamp,
            heart_rate: frequency.enhanced_heart_rate,
            activity: enhanced.activity,
            temperature: enhanced.temperature,
        };
        let temporal = self.temporal.analyze(&state.temporal, point);

        let insight = self.insight.infer(&quality.report, &frequency, &temporal);

        state.quality.push(&quality.conditioned);
        state.frequency.push(enhanced.heart_rate);
        state.temporal.push(point);

        Ok(CompositeRecord {
            timestamp: sample.timestamp,
            raw_signals: sample.signals(),
            clarity_layer: quality.report,
            ifrs_layer: frequency,
            timesystems_layer: temporal,
            lia_insights: insight,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Notice;
    use crate::frequency::RhythmClass;
    use crate::insight::{Condition, RiskFactor};
    use crate::quality::Assessment;
    use crate::temporal::PatternType;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn morning() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn vitals(heart_rate: f64, spo2: f64, temperature: f64, activity: f64) -> VitalSigns {
        VitalSigns {
            heart_rate,
            spo2,
            temperature,
            activity,
        }
    }

    /// Feed `ticks` identical samples at 10 Hz and return the last record.
    fn sustain(pipeline: &Pipeline, signals: VitalSigns, ticks: usize) -> CompositeRecord {
        let mut state = pipeline.new_session_state();
        let mut last = None;
        for i in 0..ticks {
            let sample = RawSample::new(morning() + Duration::milliseconds(100 * i as i64), signals);
            last = Some(pipeline.process(&mut state, &sample).unwrap());
        }
        last.unwrap()
    }

    fn scenario_a() -> VitalSigns {
        vitals(72.0, 98.0, 36.8, 10.0)
    }

    #[test]
    fn test_scenario_constant_resting() {
        let pipeline = Pipeline::default();
        let record = sustain(&pipeline, scenario_a(), 130);

        assert_eq!(record.clarity_layer.assessment, Assessment::Excellent);
        assert!(record.clarity_layer.artifacts.is_empty());
        assert_eq!(record.timesystems_layer.pattern_type, PatternType::Stable);
        assert_eq!(record.lia_insights.condition, Condition::NormalResting);
        assert!(!record.lia_insights.degraded);
    }

    #[test]
    fn test_scenario_sustained_exertion() {
        let pipeline = Pipeline::default();
        let resting = sustain(&pipeline, scenario_a(), 130);
        let record = sustain(&pipeline, vitals(170.0, 97.0, 37.5, 150.0), 130);

        assert_eq!(record.ifrs_layer.rhythm_classification, RhythmClass::Elevated);
        assert_eq!(record.lia_insights.condition, Condition::IntenseExercise);
        assert!(record.lia_insights.wellness.cardiovascular < resting.lia_insights.wellness.cardiovascular);
        assert!(record.lia_insights.risk_factors.contains(&RiskFactor::ElevatedHeartRate));
    }

    #[test]
    fn test_scenario_low_oxygen() {
        let pipeline = Pipeline::default();
        let resting = sustain(&pipeline, scenario_a(), 130);
        let record = sustain(&pipeline, vitals(72.0, 85.0, 36.8, 10.0), 130);

        assert!(record.lia_insights.risk_factors.contains(&RiskFactor::LowBloodOxygen));
        assert!(record.lia_insights.wellness.overall < resting.lia_insights.wellness.overall);

        let json = serde_json::to_value(&record).unwrap();
        let risks = json["lia_insights"]["risk_factors"].as_array().unwrap();
        assert!(risks.iter().any(|r| r == "low blood oxygen"));
    }

    #[test]
    fn test_scenario_short_history_is_flagged() {
        let pipeline = Pipeline::default();
        let record = sustain(&pipeline, scenario_a(), 10);

        assert!(record.ifrs_layer.degraded);
        assert!(record.timesystems_layer.degraded);
        assert!(record.lia_insights.degraded);
        assert!(record
            .ifrs_layer
            .notices
            .iter()
            .any(|n| matches!(n, Notice::InsufficientHistory { .. })));
        assert!(record
            .timesystems_layer
            .notices
            .iter()
            .any(|n| matches!(n, Notice::InsufficientHistory { .. })));
    }

    #[test]
    fn test_histories_advance_together() {
        let pipeline = Pipeline::default();
        let mut state = pipeline.new_session_state();
        for i in 0..70 {
            let sample = RawSample::new(morning() + Duration::milliseconds(100 * i), scenario_a());
            pipeline.process(&mut state, &sample).unwrap();
        }

        assert_eq!(state.quality_history().len(), 50);
        assert_eq!(state.frequency_history().len(), 64);
        assert_eq!(state.temporal_history().len(), 70);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_corrupted_state_is_rejected_without_mutation() {
        let pipeline = Pipeline::default();
        let mut state = pipeline.new_session_state();
        let sample = RawSample::new(morning(), scenario_a());
        pipeline.process(&mut state, &sample).unwrap();

        state.frequency.push(72.0);
        let temporal_before = state.temporal_history().len();

        match pipeline.process(&mut state, &sample) {
            Err(PipelineError::HistoryCorrupted { buffer, .. }) => assert_eq!(buffer, "quality"),
            other => panic!("expected corruption error, got {:?}", other),
        }
        assert_eq!(state.temporal_history().len(), temporal_before);
        assert_eq!(state.quality_history().len(), 1);
    }

    #[test]
    fn test_record_field_names() {
        let pipeline = Pipeline::default();
        let record = sustain(&pipeline, scenario_a(), 3);
        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();

        for key in [
            "timestamp",
            "raw_signals",
            "clarity_layer",
            "ifrs_layer",
            "timesystems_layer",
            "lia_insights",
        ] {
            assert!(keys.contains(&key), "missing {}", key);
        }
        assert!(json["timestamp"].as_str().unwrap().starts_with("2024-03-01T09:00:00.2"));
        assert_eq!(json["lia_insights"]["condition"], "Normal Resting");
    }

    fn sample_strategy() -> impl Strategy<Value = (f64, f64, f64, f64)> {
        (30.0f64..220.0, 70.0f64..100.0, 34.0f64..41.0, 0.0f64..200.0)
    }

    fn run(samples: &[(f64, f64, f64, f64)]) -> Vec<CompositeRecord> {
        let pipeline = Pipeline::default();
        let mut state = pipeline.new_session_state();
        samples
            .iter()
            .enumerate()
            .map(|(i, &(hr, spo2, temp, activity))| {
                let sample = RawSample::new(
                    morning() + Duration::milliseconds(100 * i as i64),
                    vitals(hr, spo2, temp, activity),
                );
                pipeline.process(&mut state, &sample).unwrap()
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_outputs_stay_in_bounds(samples in prop::collection::vec(sample_strategy(), 1..80)) {
            for record in run(&samples) {
                let clarity = &record.clarity_layer;
                prop_assert!((0.0..=1.0).contains(&clarity.overall_quality));
                prop_assert!(clarity.channel_quality.values().all(|q| (0.0..=1.0).contains(q)));

                prop_assert!((0.0..=100.0).contains(&record.ifrs_layer.hrv.hrv_score));
                prop_assert!((0.0..=100.0).contains(&record.timesystems_layer.rhythm_score));

                let insight = &record.lia_insights;
                let sum: f64 = insight.probabilities.values().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
                prop_assert!((0.0..=1.0).contains(&insight.confidence));

                let w = insight.wellness;
                for score in [w.cardiovascular, w.respiratory, w.activity, w.stress, w.overall] {
                    prop_assert!((0.0..=100.0).contains(&score));
                }
            }
        }

        #[test]
        fn test_replay_is_byte_identical(samples in prop::collection::vec(sample_strategy(), 1..60)) {
            let first: Vec<String> = run(&samples).iter().map(|r| serde_json::to_string(r).unwrap()).collect();
            let second: Vec<String> = run(&samples).iter().map(|r| serde_json::to_string(r).unwrap()).collect();
            prop_assert_eq!(first, second);
        }
    }
}
