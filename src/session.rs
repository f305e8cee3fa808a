//! # Session Registry Module
//!
//! Owns the per-session pipeline state and bookkeeping.
//!
//! ## Concurrency
//! Each session lives behind its own `Mutex`, so samples for one session are
//! processed one at a time while different sessions run in parallel. The
//! registry lock is held only long enough to look up the session handle.
//!
//! ## Capacity
//! Sessions are kept in an `LruCache`; once `max_sessions` is reached the
//! least recently used session is evicted together with its history.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{PipelineError, SessionError};
use crate::pipeline::{CompositeRecord, Pipeline, SessionState};
use crate::processing_log::{LogEntry, ProcessingLog};
use crate::vitals::RawSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Workout,
    Meditation,
    Sleep,
    DailyMonitoring,
    Clinical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Bookkeeping of one monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub device_id: String,
    pub user_id: String,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub data_points: u64,
    /// Running mean of the overall wellness score
    pub average_wellness: f64,
    pub summary: Option<String>,
}

struct Session {
    info: SessionInfo,
    state: SessionState,
}

type SessionHandle = Arc<Mutex<Session>>;

fn new_session_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("session_{}", &uuid[..12])
}

fn poisoned(session_id: &str) -> SessionError {
    SessionError::Pipeline(PipelineError::SessionPoisoned {
        session_id: session_id.to_string(),
    })
}

pub struct SessionRegistry {
    pipeline: Arc<Pipeline>,
    sessions: Mutex<LruCache<String, SessionHandle>>,
    processing_log: Mutex<ProcessingLog>,
}

impl SessionRegistry {
    pub fn new(pipeline: Arc<Pipeline>, config: &SessionConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            pipeline,
            sessions: Mutex::new(LruCache::new(capacity)),
            processing_log: Mutex::new(ProcessingLog::new(config.processing_log_capacity)),
        }
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, LruCache<String, SessionHandle>>, SessionError> {
        self.sessions.lock().map_err(|_| poisoned("registry"))
    }

    /// Look up a session, marking it as recently used.
    fn handle(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.lock_sessions()?
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn create_session(&self, device_id: &str, user_id: &str, kind: SessionKind) -> Result<SessionInfo, SessionError> {
        let info = SessionInfo {
            session_id: new_session_id(),
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            kind,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            data_points: 0,
            average_wellness: 0.0,
            summary: None,
        };
        let session = Session {
            info: info.clone(),
            state: self.pipeline.new_session_state(),
        };

        let evicted = self
            .lock_sessions()?
            .push(info.session_id.clone(), Arc::new(Mutex::new(session)));
        if let Some((evicted_id, _)) = evicted {
            log::info!("Session limit reached, evicted {}", evicted_id);
        }

        log::info!(
            "Created session {} for device {} ({:?})",
            info.session_id,
            info.device_id,
            info.kind
        );
        Ok(info)
    }

    /// Run one sample through the pipeline for `session_id`.
    pub fn process(&self, session_id: &str, sample: &RawSample) -> Result<CompositeRecord, SessionError> {
        let handle = self.handle(session_id)?;
        let record = {
            let mut session = handle.lock().map_err(|_| poisoned(session_id))?;
            if session.info.status == SessionStatus::Completed {
                return Err(SessionError::Ended(session_id.to_string()));
            }

            let record = self.pipeline.process(&mut session.state, sample)?;

            let info = &mut session.info;
            info.data_points += 1;
            info.average_wellness +=
                (record.lia_insights.wellness.overall - info.average_wellness) / info.data_points as f64;
            record
        };

        if let Ok(mut processing_log) = self.processing_log.lock() {
            processing_log.record_composite(session_id, &record);
        }
        Ok(record)
    }

    /// Mark a session completed; it keeps its bookkeeping until evicted.
    pub fn end_session(&self, session_id: &str, summary: Option<String>) -> Result<SessionInfo, SessionError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().map_err(|_| poisoned(session_id))?;
        if session.info.status == SessionStatus::Completed {
            return Err(SessionError::Ended(session_id.to_string()));
        }

        session.info.status = SessionStatus::Completed;
        session.info.ended_at = Some(Utc::now());
        session.info.summary = summary;

        log::info!(
            "Ended session {} after {} data points (average wellness {:.1})",
            session_id,
            session.info.data_points,
            session.info.average_wellness
        );
        Ok(session.info.clone())
    }

    pub fn info(&self, session_id: &str) -> Result<SessionInfo, SessionError> {
        let handle = self
            .lock_sessions()?
            .peek(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let session = handle.lock().map_err(|_| poisoned(session_id))?;
        Ok(session.info.clone())
    }

    /// Bookkeeping of every retained session, most recently used first.
    ///
    /// Sessions whose lock is poisoned are skipped.
    pub fn all(&self) -> Result<Vec<SessionInfo>, SessionError> {
        let handles: Vec<SessionHandle> = self.lock_sessions()?.iter().map(|(_, h)| h.clone()).collect();
        Ok(handles
            .iter()
            .filter_map(|h| h.lock().ok().map(|s| s.info.clone()))
            .collect())
    }

    pub fn active_count(&self) -> Result<usize, SessionError> {
        Ok(self
            .all()?
            .iter()
            .filter(|info| info.status == SessionStatus::Active)
            .count())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest processing-log lines across all sessions.
    pub fn recent_log(&self, limit: usize) -> Vec<LogEntry> {
        self.processing_log
            .lock()
            .map(|log| log.recent(limit))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vitals::VitalSigns;
    use chrono::{Duration, FixedOffset, TimeZone};
    use std::thread;

    fn registry(max_sessions: usize) -> SessionRegistry {
        let config = SessionConfig {
            max_sessions,
            processing_log_capacity: 100,
        };
        SessionRegistry::new(Arc::new(Pipeline::default()), &config)
    }

    fn sample(i: i64) -> RawSample {
        let ts = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
            + Duration::milliseconds(100 * i);
        RawSample::new(
            ts,
            VitalSigns {
                heart_rate: 72.0,
                spo2: 98.0,
                temperature: 36.8,
                activity: 10.0,
            },
        )
    }

    #[test]
    fn test_session_id_format() {
        let registry = registry(4);
        let info = registry.create_session("wearable-1", "user-1", SessionKind::Workout).unwrap();

        assert!(info.session_id.starts_with("session_"));
        assert_eq!(info.session_id.len(), "session_".len() + 12);
        assert!(info.session_id["session_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(info.status, SessionStatus::Active);
        assert_eq!(registry.active_count().unwrap(), 1);
    }

    #[test]
    fn test_process_updates_bookkeeping() {
        let registry = registry(4);
        let id = registry
            .create_session("dev", "user", SessionKind::DailyMonitoring)
            .unwrap()
            .session_id;

        let mut wellness = Vec::new();
        for i in 0..5 {
            wellness.push(registry.process(&id, &sample(i)).unwrap().lia_insights.wellness.overall);
        }

        let info = registry.info(&id).unwrap();
        assert_eq!(info.data_points, 5);
        let mean = wellness.iter().sum::<f64>() / 5.0;
        assert!((info.average_wellness - mean).abs() < 1e-9);
        assert_eq!(registry.recent_log(4).len(), 4);
    }

    #[test]
    fn test_unknown_and_ended_sessions() {
        let registry = registry(4);
        assert_eq!(
            registry.process("session_missing", &sample(0)).unwrap_err(),
            SessionError::NotFound("session_missing".to_string())
        );

        let id = registry.create_session("dev", "user", SessionKind::Sleep).unwrap().session_id;
        let ended = registry.end_session(&id, Some("quiet night".to_string())).unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.ended_at.is_some());
        assert_eq!(registry.active_count().unwrap(), 0);

        assert_eq!(registry.process(&id, &sample(0)).unwrap_err(), SessionError::Ended(id.clone()));
        assert_eq!(registry.end_session(&id, None).unwrap_err(), SessionError::Ended(id));
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let registry = registry(2);
        let first = registry.create_session("a", "u", SessionKind::Clinical).unwrap().session_id;
        let second = registry.create_session("b", "u", SessionKind::Clinical).unwrap().session_id;

        // Touch the first session so the second becomes least recently used
        registry.process(&first, &sample(0)).unwrap();
        let third = registry.create_session("c", "u", SessionKind::Clinical).unwrap().session_id;

        assert_eq!(registry.len(), 2);
        assert!(registry.info(&first).is_ok());
        assert!(registry.info(&third).is_ok());
        assert_eq!(registry.info(&second).unwrap_err(), SessionError::NotFound(second));
    }

    #[test]
    fn test_sessions_are_isolated_across_threads() {
        let registry = Arc::new(registry(8));
        let ids: Vec<String> = (0..4)
            .map(|i| {
                registry
                    .create_session(&format!("dev-{}", i), "user", SessionKind::Workout)
                    .unwrap()
                    .session_id
            })
            .collect();

        thread::scope(|scope| {
            for id in &ids {
                // Two writers per session
                for _ in 0..2 {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || {
                        for i in 0..25 {
                            registry.process(id, &sample(i)).unwrap();
                        }
                    });
                }
            }
        });

        for id in &ids {
            assert_eq!(registry.info(id).unwrap().data_points, 50);
        }
    }

    #[test]
    fn test_poisoned_session_is_reported() {
        let registry = registry(4);
        let id = registry.create_session("dev", "user", SessionKind::Workout).unwrap().session_id;

        let handle = registry.handle(&id).unwrap();
        let result = thread::spawn(move || {
            let _guard = handle.lock().unwrap();
            panic!("writer crashed");
        })
        .join();
        assert!(result.is_err());

        match registry.process(&id, &sample(0)) {
            Err(SessionError::Pipeline(PipelineError::SessionPoisoned { session_id })) => {
                assert_eq!(session_id, id)
            }
            other => panic!("expected poisoned session, got {:?}", other.map(|_| ())),
        }
    }
}
