//! # Vital Sign Data Module
//!
//! Sample types handed to the pipeline by the signal source, and the
//! per-channel history container the quality stage keeps between ticks.
//!
//! ## Key Types
//! - `RawSample`: one timestamped reading of all four channels
//! - `VitalSigns`: the four channel values without a timestamp
//! - `Channel`: channel identifier used for routing and reporting
//! - `ChannelHistory`: one `HistoryBuffer` per channel, always the same length

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::timeseries::HistoryBuffer;

/// Channel identifier for routing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    Spo2,
    Temperature,
    Activity,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::HeartRate,
        Channel::Spo2,
        Channel::Temperature,
        Channel::Activity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::HeartRate => "heart_rate",
            Channel::Spo2 => "spo2",
            Channel::Temperature => "temperature",
            Channel::Activity => "activity",
        }
    }
}

/// Values of all four channels at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Beats per minute
    pub heart_rate: f64,
    /// Blood-oxygen saturation in percent
    pub spo2: f64,
    /// Skin temperature in °C
    pub temperature: f64,
    /// Steps per minute
    pub activity: f64,
}

impl VitalSigns {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::Spo2 => self.spo2,
            Channel::Temperature => self.temperature,
            Channel::Activity => self.activity,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::HeartRate => self.heart_rate = value,
            Channel::Spo2 => self.spo2 = value,
            Channel::Temperature => self.temperature = value,
            Channel::Activity => self.activity = value,
        }
    }
}

/// One reading from the signal source.
///
/// The timestamp carries the wearer's UTC offset so the circadian phase is
/// derived from local wall-clock time without consulting the host clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: DateTime<FixedOffset>,
    pub heart_rate: f64,
    pub spo2: f64,
    pub temperature: f64,
    pub activity: f64,
}

impl RawSample {
    pub fn new(timestamp: DateTime<FixedOffset>, signals: VitalSigns) -> Self {
        Self {
            timestamp,
            heart_rate: signals.heart_rate,
            spo2: signals.spo2,
            temperature: signals.temperature,
            activity: signals.activity,
        }
    }

    pub fn signals(&self) -> VitalSigns {
        VitalSigns {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            temperature: self.temperature,
            activity: self.activity,
        }
    }
}

/// Per-channel rolling history owned by the quality stage.
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    heart_rate: HistoryBuffer<f64>,
    spo2: HistoryBuffer<f64>,
    temperature: HistoryBuffer<f64>,
    activity: HistoryBuffer<f64>,
}

impl ChannelHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            heart_rate: HistoryBuffer::new(capacity),
            spo2: HistoryBuffer::new(capacity),
            temperature: HistoryBuffer::new(capacity),
            activity: HistoryBuffer::new(capacity),
        }
    }

    pub fn get(&self, channel: Channel) -> &HistoryBuffer<f64> {
        match channel {
            Channel::HeartRate => &self.heart_rate,
            Channel::Spo2 => &self.spo2,
            Channel::Temperature => &self.temperature,
            Channel::Activity => &self.activity,
        }
    }

    /// Append one value per channel.
    pub fn push(&mut self, signals: &VitalSigns) {
        self.heart_rate.push(signals.heart_rate);
        self.spo2.push(signals.spo2);
        self.temperature.push(signals.temperature);
        self.activity.push(signals.activity);
    }

    /// Number of ticks recorded (all channels advance together).
    pub fn len(&self) -> usize {
        self.heart_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.heart_rate.capacity()
    }

    /// Last recorded values, if any.
    pub fn last(&self) -> Option<VitalSigns> {
        Some(VitalSigns {
            heart_rate: *self.heart_rate.last()?,
            spo2: *self.spo2.last()?,
            temperature: *self.temperature.last()?,
            activity: *self.activity.last()?,
        })
    }

    /// True when every channel holds the same number of entries.
    pub fn is_aligned(&self) -> bool {
        let len = self.heart_rate.len();
        Channel::ALL.iter().all(|&c| self.get(c).len() == len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signals() -> VitalSigns {
        VitalSigns {
            heart_rate: 72.0,
            spo2: 98.0,
            temperature: 36.8,
            activity: 10.0,
        }
    }

    #[test]
    fn test_vital_signs_get_set() {
        let mut vitals = signals();
        for channel in Channel::ALL {
            vitals.set(channel, 1.0);
            assert_eq!(vitals.get(channel), 1.0);
        }
    }

    #[test]
    fn test_raw_sample_signals() {
        let ts = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let sample = RawSample::new(ts, signals());
        assert_eq!(sample.signals(), signals());
        assert_eq!(sample.timestamp, ts);
    }

    #[test]
    fn test_channel_history_advances_together() {
        let mut history = ChannelHistory::new(3);
        assert!(history.last().is_none());

        for _ in 0..5 {
            history.push(&signals());
        }

        assert_eq!(history.len(), 3);
        assert!(history.is_aligned());
        assert_eq!(history.last(), Some(signals()));
    }

    #[test]
    fn test_channel_names() {
        let names: Vec<&str> = Channel::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["heart_rate", "spo2", "temperature", "activity"]);
    }
}
