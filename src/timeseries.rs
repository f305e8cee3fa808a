//! # Rolling History Module
//!
//! Bounded, ordered history of recent values plus the slice statistics every
//! analysis stage needs.
//!
//! ## Key Types
//! - `HistoryBuffer<T>`: fixed-capacity ring buffer, oldest entry evicted first
//! - `SeriesExt`: mean / variance / linear fit helpers over `[f64]`
//!
//! ## Why Separate from the Stages
//! Each stage owns its own buffer inside the session state. Keeping the
//! buffer generic lets the quality, frequency and temporal stages share one
//! eviction policy instead of each re-implementing it.

use std::collections::VecDeque;

/// Fixed-capacity history with ring-buffer semantics.
///
/// `len() <= capacity()` always holds; pushing into a full buffer drops the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.data.back()
    }

    pub fn first(&self) -> Option<&T> {
        self.data.front()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.data.iter()
    }
}

impl<T: Clone> HistoryBuffer<T> {
    /// The most recent `n` entries followed by `current`, oldest first.
    ///
    /// This is the analysis window of a stage: history plus the sample being
    /// processed, without mutating the buffer.
    pub fn window_with(&self, current: T, n: usize) -> Vec<T> {
        let keep = n.saturating_sub(1).min(self.data.len());
        let mut window: Vec<T> = self.data.iter().skip(self.data.len() - keep).cloned().collect();
        window.push(current);
        window
    }

    /// The most recent `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let keep = n.min(self.data.len());
        self.data.iter().skip(self.data.len() - keep).cloned().collect()
    }
}

/// Result of an ordinary least-squares line fit `y = intercept + slope * i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, i: usize) -> f64 {
        self.intercept + self.slope * i as f64
    }
}

/// Statistics over a slice of samples.
pub trait SeriesExt {
    fn mean(&self) -> Option<f64>;
    /// Population variance.
    fn variance(&self) -> Option<f64>;
    fn std_dev(&self) -> Option<f64>;
    fn min_max(&self) -> Option<(f64, f64)>;
    /// Least-squares fit against the sample index. Needs at least two points.
    fn linear_fit(&self) -> Option<LinearFit>;
    /// Values minus their linear trend.
    fn detrended(&self) -> Vec<f64>;
    fn successive_differences(&self) -> Vec<f64>;
}

impl SeriesExt for [f64] {
    fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len() as f64)
    }

    fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        Some(self.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.len() as f64)
    }

    fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    fn min_max(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
    }

    fn linear_fit(&self) -> Option<LinearFit> {
        let n = self.len();
        if n < 2 {
            return None;
        }
        let x_mean = (n - 1) as f64 / 2.0;
        let y_mean = self.mean()?;
        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (i, y) in self.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxy += dx * (y - y_mean);
            sxx += dx * dx;
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Some(LinearFit {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    fn detrended(&self) -> Vec<f64> {
        match self.linear_fit() {
            Some(fit) => self.iter().enumerate().map(|(i, y)| y - fit.at(i)).collect(),
            None => self.iter().map(|_| 0.0).collect(),
        }
    }

    fn successive_differences(&self) -> Vec<f64> {
        self.windows(2).map(|w| w[1] - w[0]).collect()
    }
}
