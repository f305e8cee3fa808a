//! # zen-vitals
//!
//! Multi-layer analysis of wearable vital signs. Each sample (heart rate,
//! SpO2, skin temperature, activity) passes through four stages:
//!
//! 1. `quality`: signal conditioning, artifact detection and quality scoring
//! 2. `frequency`: tachogram spectrum, HRV metrics and rhythm classification
//! 3. `temporal`: trend, pattern and circadian analysis
//! 4. `insight`: condition classification, risk factors and wellness scores
//!
//! `pipeline::Pipeline` chains the stages over per-session histories and
//! emits a `CompositeRecord`. `session::SessionRegistry` owns those histories
//! for many concurrent sessions, and `stream::StreamManager` drives simulated
//! sessions in real time.

pub mod config;
pub mod error;
pub mod frequency;
pub mod insight;
pub mod pipeline;
pub mod processing_log;
pub mod quality;
pub mod session;
pub mod simulator;
pub mod stream;
pub mod temporal;
pub mod timeseries;
pub mod vitals;

pub use config::Config;
pub use error::{ConfigError, Notice, PipelineError, SessionError, StreamError};
pub use pipeline::{CompositeRecord, Pipeline, SessionState};
pub use session::{SessionInfo, SessionKind, SessionRegistry};
pub use vitals::{Channel, RawSample, VitalSigns};
