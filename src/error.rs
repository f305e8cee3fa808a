//! # Error Types Module
//!
//! Centralized error handling for the zen-vitals pipeline and its
//! collaborators. Provides one error type per concern with proper context
//! and error chaining.
//!
//! ## Error Types
//! - `PipelineError`: non-recoverable programmer errors (corrupted history, poisoned session)
//! - `SessionError`: session lookup and lifecycle failures
//! - `ConfigError`: configuration file I/O and parsing errors
//! - `StreamError`: streaming runtime failures
//!
//! ## Non-fatal Conditions
//! Insufficient history, out-of-range samples and degenerate computations are
//! not errors. They are reported as `Notice` values on the stage output so the
//! pipeline always returns a record for in-domain input.

use serde::Serialize;
use std::fmt;

use crate::vitals::Channel;

/// Non-fatal condition observed by a stage while producing its report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Fewer samples than the stage's minimum analysis window
    InsufficientHistory { required: usize, available: usize },
    /// Value was non-finite or outside its physiological bound and was clamped
    InvalidSample { channel: Channel },
    /// A computation had no usable variance; a neutral value was substituted
    DegenerateComputation { computation: &'static str },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InsufficientHistory { required, available } => {
                write!(f, "insufficient history: {} of {} samples", available, required)
            }
            Notice::InvalidSample { channel } => {
                write!(f, "invalid {} value clamped", channel.name())
            }
            Notice::DegenerateComputation { computation } => {
                write!(f, "degenerate {} computation, neutral value used", computation)
            }
        }
    }
}

/// Errors that abort a pipeline invocation
///
/// These indicate a bug or corrupted state, never bad input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A history buffer violates its invariants
    HistoryCorrupted { buffer: &'static str, reason: String },
    /// A thread panicked while holding the session lock
    SessionPoisoned { session_id: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::HistoryCorrupted { buffer, reason } => {
                write!(f, "History buffer '{}' is corrupted: {}", buffer, reason)
            }
            PipelineError::SessionPoisoned { session_id } => {
                write!(f, "Session {} state is poisoned by an earlier panic", session_id)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Errors that can occur during session operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session with this id (never created or already evicted)
    NotFound(String),
    /// Session was ended and accepts no more samples
    Ended(String),
    /// The pipeline failed for this session
    Pipeline(PipelineError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound(id) => write!(f, "Session not found: {}", id),
            SessionError::Ended(id) => write!(f, "Session {} has already ended", id),
            SessionError::Pipeline(e) => write!(f, "Pipeline failure: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for SessionError {
    fn from(e: PipelineError) -> Self {
        SessionError::Pipeline(e)
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while streaming simulated sessions
#[derive(Debug)]
pub enum StreamError {
    /// Failed to create Tokio runtime
    RuntimeCreation(String),
    /// Processing a sample for a session failed
    Session(SessionError),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::RuntimeCreation(msg) => {
                write!(f, "Failed to create async runtime: {}", msg)
            }
            StreamError::Session(e) => write!(f, "Stream session error: {}", e),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Session(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SessionError> for StreamError {
    fn from(e: SessionError) -> Self {
        StreamError::Session(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::HistoryCorrupted {
            buffer: "quality",
            reason: "channels out of step".to_string(),
        };
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_session_error_chain() {
        use std::error::Error;
        let err = SessionError::from(PipelineError::SessionPoisoned {
            session_id: "session_abc".to_string(),
        });
        assert!(err.source().is_some());
        assert!(SessionError::NotFound("x".to_string()).source().is_none());
    }

    #[test]
    fn test_config_error_chain() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::ReadFailed(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_stream_error_chain() {
        use std::error::Error;
        let err = StreamError::from(SessionError::Ended("s".to_string()));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("already ended"));
    }

    #[test]
    fn test_notice_serializes_with_kind_tag() {
        let notice = Notice::InvalidSample { channel: Channel::Spo2 };
        let json = serde_json::to_string(&notice).unwrap();
        assert_eq!(json, r#"{"kind":"invalid_sample","channel":"spo2"}"#);
    }
}
