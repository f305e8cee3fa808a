//! # Processing Log Module
//!
//! Bounded in-memory log of per-layer processing lines, one line per stage
//! for every processed sample. Complements the `log` output with a record
//! that can be queried at runtime.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::pipeline::CompositeRecord;
use crate::timeseries::HistoryBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Clarity,
    Ifrs,
    Timesystems,
    Lia,
}

impl Layer {
    pub fn tag(&self) -> &'static str {
        match self {
            Layer::Clarity => "CLARITY_LAYER",
            Layer::Ifrs => "IFRS_LAYER",
            Layer::Timesystems => "TIMESYSTEMS_LAYER",
            Layer::Lia => "LIA_ENGINE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: log::Level,
    pub layer: Layer,
    pub session_id: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<5} {} | {} | {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.level,
            self.layer.tag(),
            self.session_id,
            self.message
        )
    }
}

pub struct ProcessingLog {
    entries: HistoryBuffer<LogEntry>,
}

impl ProcessingLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HistoryBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, level: log::Level, layer: Layer, session_id: &str, message: String) {
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            layer,
            session_id: session_id.to_string(),
            message,
        });
    }

    /// Append one line per layer of `record`.
    pub fn record_composite(&mut self, session_id: &str, record: &CompositeRecord) {
        let clarity = &record.clarity_layer;
        let clarity_level = if clarity.artifacts.is_empty() {
            log::Level::Info
        } else {
            log::Level::Warn
        };
        self.record(
            clarity_level,
            Layer::Clarity,
            session_id,
            format!(
                "quality={:.2} | snr={:.1}dB | assessment={} | artifacts={}",
                clarity.overall_quality,
                clarity.snr_db,
                clarity.assessment,
                clarity.artifacts.len()
            ),
        );

        let ifrs = &record.ifrs_layer;
        self.record(
            log::Level::Info,
            Layer::Ifrs,
            session_id,
            format!(
                "hrv_score={:.1} | lf_hf={:.2} | rhythm={} | degraded={}",
                ifrs.hrv.hrv_score, ifrs.lf_hf_ratio, ifrs.rhythm_classification, ifrs.degraded
            ),
        );

        let temporal = &record.timesystems_layer;
        self.record(
            log::Level::Info,
            Layer::Timesystems,
            session_id,
            format!(
                "pattern={} | phase={} | rhythm_score={:.1} | degraded={}",
                temporal.pattern_type, temporal.circadian_phase, temporal.rhythm_score, temporal.degraded
            ),
        );

        let insight = &record.lia_insights;
        let insight_level = if insight.risk_factors.is_empty() {
            log::Level::Info
        } else {
            log::Level::Warn
        };
        self.record(
            insight_level,
            Layer::Lia,
            session_id,
            format!(
                "condition={} | confidence={:.2} | wellness={:.1} | risks={}",
                insight.condition,
                insight.confidence,
                insight.wellness.overall,
                insight.risk_factors.len()
            ),
        );
    }

    /// The newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.last_n(limit)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
