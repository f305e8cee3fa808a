//! # Frequency Analysis Module
//!
//! Second pipeline stage. Turns the conditioned heart-rate history into
//! heart-rate-variability metrics and a power spectrum.
//!
//! ## Time Domain
//! R-R intervals are derived from instantaneous heart rate
//! (`rr_ms = 60000 / hr`). RMSSD, SDNN and pNN50 are normalized against
//! reference values and combined into `hrv_score`.
//!
//! ## Frequency Domain
//! The heart-rate window is mean-removed, Hann-tapered and transformed with
//! `rustfft`. Bins are spaced on the beat-interval axis: one sample per mean
//! R-R interval, i.e. an effective sample rate of `1000 / mean_rr` Hz.
//! Power is integrated over the VLF, LF and HF bands (half-open intervals).
//!
//! ## Degraded Output
//! Below `min_window` samples no spectrum is computed and neutral values are
//! reported with `degraded = true`. A flat window yields the same neutral
//! values with a `DegenerateComputation` notice.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::config::{FrequencyConfig, Span};
use crate::error::Notice;
use crate::timeseries::{HistoryBuffer, SeriesExt};

const DEGENERATE_POWER: f64 = 1e-12;
/// SDNN (ms) below which an R-R series counts as constant.
const FLAT_SPREAD_MS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmClass {
    NormalSinus,
    Athletic,
    Elevated,
    Low,
    Irregular,
}

impl fmt::Display for RhythmClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RhythmClass::NormalSinus => "normal_sinus",
            RhythmClass::Athletic => "athletic",
            RhythmClass::Elevated => "elevated",
            RhythmClass::Low => "low",
            RhythmClass::Irregular => "irregular",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HrvMetrics {
    /// Root mean square of successive differences (ms)
    pub rmssd: f64,
    /// Standard deviation of R-R intervals (ms)
    pub sdnn: f64,
    /// Fraction of successive differences above 50 ms
    pub pnn50: f64,
    pub hrv_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BandPowers {
    pub vlf_power: f64,
    pub lf_power: f64,
    pub hf_power: f64,
}

/// Output of the frequency stage (`ifrs_layer`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyFeatures {
    pub dominant_frequency_hz: f64,
    pub rr_intervals: Vec<f64>,
    pub hrv: HrvMetrics,
    pub bands: BandPowers,
    pub lf_hf_ratio: f64,
    pub rhythm_classification: RhythmClass,
    pub respiratory_rate_bpm: f64,
    /// Share of in-range spectral power held by the dominant bin
    pub frequency_stability: f64,
    pub mean_heart_rate: f64,
    /// Mean of the most recent heart-rate values; fed to the temporal stage
    pub enhanced_heart_rate: f64,
    /// False when band powers and ratios are neutral substitutes
    pub spectrum_valid: bool,
    pub degraded: bool,
    pub notices: Vec<Notice>,
    pub processing_notes: String,
}

/// One-sided power spectrum bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumBin {
    pub frequency_hz: f64,
    pub power: f64,
}

/// Hann-windowed one-sided periodogram of `values` sampled at `sample_rate`.
///
/// The mean is removed first; the DC bin is not returned. Plans are cached
/// in `planner` across calls.
pub fn power_spectrum(planner: &mut FftPlanner<f64>, values: &[f64], sample_rate: f64) -> Vec<SpectrumBin> {
    let n = values.len();
    if n < 2 || sample_rate <= 0.0 {
        return Vec::new();
    }
    let mean = values.mean().unwrap_or(0.0);

    let window: Vec<f64> = (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();

    let mut buffer: Vec<Complex<f64>> = values
        .iter()
        .zip(&window)
        .map(|(v, w)| Complex::new((v - mean) * w, 0.0))
        .collect();

    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let scale = 2.0 / (sample_rate * window_power);
    (1..=n / 2)
        .map(|k| SpectrumBin {
            frequency_hz: k as f64 * sample_rate / n as f64,
            power: buffer[k].norm_sqr() * scale,
        })
        .collect()
}

/// Time-domain HRV metrics of an R-R series.
pub fn hrv_metrics(rr: &[f64], config: &FrequencyConfig) -> HrvMetrics {
    if rr.len() < 2 {
        return HrvMetrics::default();
    }
    let diffs = rr.successive_differences();
    let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();
    let sdnn = rr.std_dev().unwrap_or(0.0);
    // Rounding noise of a constant series is no variability
    let (rmssd, sdnn) = if sdnn < FLAT_SPREAD_MS { (0.0, 0.0) } else { (rmssd, sdnn) };
    let nn50 = diffs.iter().filter(|d| d.abs() > config.nn50_threshold_ms).count();
    let pnn50 = nn50 as f64 / diffs.len() as f64;

    let total_weight = config.rmssd_weight + config.sdnn_weight + config.pnn50_weight;
    let score = if total_weight > 0.0 {
        (config.rmssd_weight * (rmssd / config.rmssd_reference_ms).min(1.0)
            + config.sdnn_weight * (sdnn / config.sdnn_reference_ms).min(1.0)
            + config.pnn50_weight * pnn50)
            / total_weight
    } else {
        0.0
    };

    HrvMetrics {
        rmssd,
        sdnn,
        pnn50,
        hrv_score: (100.0 * score).clamp(0.0, 100.0),
    }
}

fn band_power(spectrum: &[SpectrumBin], band: &Span, resolution: f64) -> f64 {
    spectrum
        .iter()
        .filter(|bin| band.contains_half_open(bin.frequency_hz))
        .map(|bin| bin.power * resolution)
        .sum()
}

fn peak_in<'a>(spectrum: &'a [SpectrumBin], range: &Span) -> Option<&'a SpectrumBin> {
    spectrum
        .iter()
        .filter(|bin| range.contains(bin.frequency_hz))
        .fold(None, |best: Option<&SpectrumBin>, bin| match best {
            Some(b) if b.power >= bin.power => Some(b),
            _ => Some(bin),
        })
}

struct SpectralSummary {
    dominant_frequency_hz: f64,
    bands: BandPowers,
    lf_hf_ratio: f64,
    respiratory_rate_bpm: f64,
    frequency_stability: f64,
}

pub struct FrequencyAnalyzer {
    config: FrequencyConfig,
    planner: Mutex<FftPlanner<f64>>,
}

impl FrequencyAnalyzer {
    pub fn new(config: FrequencyConfig) -> Self {
        Self {
            config,
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    pub fn config(&self) -> &FrequencyConfig {
        &self.config
    }

    /// Analyze the enhanced heart-rate history plus the current value.
    pub fn analyze(&self, history: &HistoryBuffer<f64>, heart_rate: f64) -> FrequencyFeatures {
        let window = history.window_with(heart_rate, self.config.history_capacity);
        let rr_intervals: Vec<f64> = window.iter().map(|hr| 60000.0 / hr.max(1.0)).collect();
        let mean_heart_rate = window.mean().unwrap_or(heart_rate);
        let recent = &window[window.len().saturating_sub(self.config.enhancement_window)..];
        let enhanced_heart_rate = recent.mean().unwrap_or(heart_rate);
        let hrv = hrv_metrics(&rr_intervals, &self.config);
        let residual_variance = rr_intervals.detrended().variance().unwrap_or(0.0);

        let mut notices = Vec::new();
        let degraded = window.len() < self.config.min_window;
        let spectral = if degraded {
            notices.push(Notice::InsufficientHistory {
                required: self.config.min_window,
                available: window.len(),
            });
            None
        } else if window.variance().unwrap_or(0.0) < self.config.degenerate_variance {
            notices.push(Notice::DegenerateComputation {
                computation: "spectrum",
            });
            None
        } else {
            let mean_rr = rr_intervals.mean().unwrap_or(1000.0);
            self.spectral_summary(&window, 1000.0 / mean_rr)
        };

        let spectrum_valid = spectral.is_some();
        let spectral = spectral.unwrap_or(SpectralSummary {
            dominant_frequency_hz: 0.0,
            bands: BandPowers::default(),
            lf_hf_ratio: self.config.lf_hf_neutral,
            respiratory_rate_bpm: self.config.neutral_respiratory_rate,
            frequency_stability: 0.0,
        });

        let rhythm_classification = self.classify_rhythm(
            mean_heart_rate,
            hrv.hrv_score,
            residual_variance,
            spectrum_valid.then_some(spectral.lf_hf_ratio),
        );

        let processing_notes = format!(
            "Dominant: {:.3} Hz | LF/HF: {:.2} | HRV score: {:.1} | Rhythm: {} | Respiratory: {:.1} bpm{}",
            spectral.dominant_frequency_hz,
            spectral.lf_hf_ratio,
            hrv.hrv_score,
            rhythm_classification,
            spectral.respiratory_rate_bpm,
            if degraded { " | low confidence" } else { "" }
        );

        log::debug!(
            "hrv_score={:.1} lf_hf={:.2} rhythm={} window={}",
            hrv.hrv_score,
            spectral.lf_hf_ratio,
            rhythm_classification,
            window.len()
        );

        FrequencyFeatures {
            dominant_frequency_hz: spectral.dominant_frequency_hz,
            rr_intervals,
            hrv,
            bands: spectral.bands,
            lf_hf_ratio: spectral.lf_hf_ratio,
            rhythm_classification,
            respiratory_rate_bpm: spectral.respiratory_rate_bpm,
            frequency_stability: spectral.frequency_stability,
            mean_heart_rate,
            enhanced_heart_rate,
            spectrum_valid,
            degraded,
            notices,
            processing_notes,
        }
    }

    fn spectral_summary(&self, heart_rate: &[f64], sample_rate: f64) -> Option<SpectralSummary> {
        let spectrum = {
            // Holds only cached plans; a poisoned lock is still usable
            let mut planner = self.planner.lock().unwrap_or_else(PoisonError::into_inner);
            power_spectrum(&mut planner, heart_rate, sample_rate)
        };
        let resolution = sample_rate / heart_rate.len() as f64;
        let physiological = Span::new(self.config.vlf_band.min, self.config.hf_band.max);

        let dominant = peak_in(&spectrum, &physiological)?;
        let in_range: f64 = spectrum
            .iter()
            .filter(|bin| physiological.contains(bin.frequency_hz))
            .map(|bin| bin.power)
            .sum();

        let bands = BandPowers {
            vlf_power: band_power(&spectrum, &self.config.vlf_band, resolution),
            lf_power: band_power(&spectrum, &self.config.lf_band, resolution),
            hf_power: band_power(&spectrum, &self.config.hf_band, resolution),
        };
        let lf_hf_ratio = if bands.hf_power > DEGENERATE_POWER {
            bands.lf_power / bands.hf_power
        } else {
            self.config.lf_hf_sentinel
        };

        let respiratory_rate_bpm = peak_in(&spectrum, &self.config.hf_band)
            .filter(|bin| bin.power > DEGENERATE_POWER)
            .map_or(self.config.neutral_respiratory_rate, |bin| bin.frequency_hz * 60.0);

        Some(SpectralSummary {
            dominant_frequency_hz: dominant.frequency_hz,
            bands,
            lf_hf_ratio,
            respiratory_rate_bpm,
            frequency_stability: if in_range > DEGENERATE_POWER {
                (dominant.power / in_range).clamp(0.0, 1.0)
            } else {
                0.0
            },
        })
    }

    /// First matching rule wins.
    fn classify_rhythm(
        &self,
        mean_heart_rate: f64,
        hrv_score: f64,
        residual_variance: f64,
        lf_hf_ratio: Option<f64>,
    ) -> RhythmClass {
        let normal = &self.config.normal_heart_rate;
        let high_hrv = hrv_score >= self.config.high_hrv_score;

        if normal.contains(mean_heart_rate) && high_hrv {
            RhythmClass::NormalSinus
        } else if mean_heart_rate < normal.min && high_hrv {
            RhythmClass::Athletic
        } else if mean_heart_rate > normal.max {
            RhythmClass::Elevated
        } else if mean_heart_rate < normal.min {
            RhythmClass::Low
        } else if residual_variance > self.config.irregular_rr_variance
            || lf_hf_ratio.is_some_and(|ratio| ratio > self.config.irregular_lf_hf)
        {
            RhythmClass::Irregular
        } else {
            RhythmClass::NormalSinus
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_from(values: &[f64]) -> (HistoryBuffer<f64>, f64) {
        let mut history = HistoryBuffer::new(FrequencyConfig::default().history_capacity);
        let (last, rest) = values.split_last().unwrap();
        for &v in rest {
            history.push(v);
        }
        (history, *last)
    }

    /// Heart rate modulated at `freq_hz` on the beat-interval axis.
    fn modulated(mean: f64, amplitude: f64, freq_hz: f64, n: usize) -> Vec<f64> {
        let sample_rate = mean / 60.0;
        (0..n)
            .map(|i| mean + amplitude * (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_short_history_is_degraded() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&[72.0; 10]);
        let features = analyzer.analyze(&history, current);

        assert!(features.degraded);
        assert!(!features.spectrum_valid);
        assert_eq!(features.lf_hf_ratio, 1.0);
        assert_eq!(features.respiratory_rate_bpm, 15.0);
        assert_eq!(features.rr_intervals.len(), 10);
        assert!(matches!(
            features.notices[0],
            Notice::InsufficientHistory { required: 32, available: 10 }
        ));
    }

    #[test]
    fn test_flat_window_is_degenerate() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&[72.0; 64]);
        let features = analyzer.analyze(&history, current);

        assert!(!features.degraded);
        assert!(!features.spectrum_valid);
        assert_eq!(features.lf_hf_ratio, 1.0);
        assert_eq!(features.hrv.hrv_score, 0.0);
        assert_eq!(features.rhythm_classification, RhythmClass::NormalSinus);
        assert_eq!(
            features.notices,
            vec![Notice::DegenerateComputation { computation: "spectrum" }]
        );
    }

    #[test]
    fn test_rr_intervals_from_heart_rate() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&[60.0, 120.0]);
        let features = analyzer.analyze(&history, current);
        assert_eq!(features.rr_intervals, vec![1000.0, 500.0]);
        assert_eq!(features.mean_heart_rate, 90.0);
    }

    #[test]
    fn test_respiratory_peak_recovered() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&modulated(72.0, 4.0, 0.25, 64));
        let features = analyzer.analyze(&history, current);

        assert!(features.spectrum_valid);
        assert!((features.dominant_frequency_hz - 0.25).abs() < 0.03);
        assert!((features.respiratory_rate_bpm - 15.0).abs() < 2.0);
        assert!(features.bands.hf_power > features.bands.lf_power);
        assert!(features.lf_hf_ratio < 1.0);
        assert!(features.frequency_stability > 0.0 && features.frequency_stability <= 1.0);
    }

    #[test]
    fn test_low_frequency_dominance_is_irregular() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&modulated(75.0, 3.0, 0.08, 64));
        let features = analyzer.analyze(&history, current);

        assert!(features.lf_hf_ratio > 3.0);
        assert!(features.hrv.hrv_score < 60.0);
        assert_eq!(features.rhythm_classification, RhythmClass::Irregular);
    }

    #[test]
    fn test_elevated_rhythm() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&[170.0; 40]);
        let features = analyzer.analyze(&history, current);
        assert_eq!(features.rhythm_classification, RhythmClass::Elevated);
    }

    #[test]
    fn test_athletic_and_low_rhythm() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());

        let alternating: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 50.0 } else { 56.0 }).collect();
        let (history, current) = history_from(&alternating);
        let features = analyzer.analyze(&history, current);
        assert!(features.hrv.hrv_score >= 60.0);
        assert_eq!(features.rhythm_classification, RhythmClass::Athletic);

        let (history, current) = history_from(&[52.0; 40]);
        let features = analyzer.analyze(&history, current);
        assert_eq!(features.rhythm_classification, RhythmClass::Low);
    }

    #[test]
    fn test_hrv_metrics() {
        let config = FrequencyConfig::default();
        let metrics = hrv_metrics(&[800.0, 900.0, 800.0, 900.0, 800.0], &config);

        assert!((metrics.rmssd - 100.0).abs() < 1e-9);
        assert!((metrics.pnn50 - 1.0).abs() < 1e-9);
        assert!((metrics.sdnn - 48.989_794_855_663_56).abs() < 1e-6);
        // 0.4 * 1.0 + 0.4 * 0.4899 + 0.2 * 1.0
        assert!((metrics.hrv_score - 79.595_917_942_265_42).abs() < 1e-6);
    }

    #[test]
    fn test_enhanced_heart_rate_averages_recent_values() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&[60.0, 70.0, 80.0, 90.0]);
        assert_eq!(analyzer.analyze(&history, current).enhanced_heart_rate, 80.0);

        let (history, current) = history_from(&[66.0]);
        assert_eq!(analyzer.analyze(&history, current).enhanced_heart_rate, 66.0);
    }

    #[test]
    fn test_constant_rr_has_no_variability() {
        let rr = vec![60000.0 / 72.0; 64];
        let metrics = hrv_metrics(&rr, &FrequencyConfig::default());
        assert_eq!(metrics.rmssd, 0.0);
        assert_eq!(metrics.sdnn, 0.0);
        assert_eq!(metrics.pnn50, 0.0);
        assert_eq!(metrics.hrv_score, 0.0);
    }

    #[test]
    fn test_planner_reuse_is_repeatable() {
        let analyzer = FrequencyAnalyzer::new(FrequencyConfig::default());
        let (history, current) = history_from(&modulated(72.0, 4.0, 0.25, 64));
        let first = analyzer.analyze(&history, current);
        let second = analyzer.analyze(&history, current);
        assert_eq!(first, second);

        let (shorter, current) = history_from(&modulated(72.0, 4.0, 0.25, 40));
        assert!(analyzer.analyze(&shorter, current).spectrum_valid);
    }

    #[test]
    fn test_power_spectrum_excludes_dc() {
        let mut planner = FftPlanner::new();
        let spectrum = power_spectrum(&mut planner, &[5.0; 16], 1.0);
        assert_eq!(spectrum.len(), 8);
        assert!(spectrum.iter().all(|bin| bin.power.abs() < 1e-20));
        assert!((spectrum[0].frequency_hz - 1.0 / 16.0).abs() < 1e-12);
    }
}
