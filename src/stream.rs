//! # Stream Management Module
//!
//! Drives simulated sessions through the pipeline in real time.
//!
//! ## Key Components
//! - `StreamManager`: command loop on a dedicated thread with its own Tokio runtime
//! - `StreamCommand`: start/stop requests from the caller
//! - `StreamUpdate`: records and lifecycle events pushed to the consumer
//!
//! Each running session has an atomic stop flag. Records go out over a
//! bounded channel with `try_send`, so a consumer that falls behind loses
//! records instead of stalling the sessions.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::MissedTickBehavior;

use crate::config::{SimulatorConfig, StreamConfig};
use crate::error::StreamError;
use crate::pipeline::CompositeRecord;
use crate::session::SessionRegistry;
use crate::simulator::{Scenario, SignalSimulator};

#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start { session_id: String, scenario: Scenario },
    Stop { session_id: String },
    StopAll,
}

#[derive(Debug, Clone)]
pub enum StreamUpdate {
    Record {
        session_id: String,
        record: Box<CompositeRecord>,
    },
    /// The session's stream ended after `ticks` processed samples
    Stopped { session_id: String, ticks: u64 },
    Error { session_id: String, message: String },
}

/// Runs simulated sessions on a dedicated thread.
///
/// Created together with the command sender and the update receiver; call
/// `run` from a spawned thread. The loop ends when every command sender is
/// dropped.
pub struct StreamManager {
    registry: Arc<SessionRegistry>,
    stream_config: StreamConfig,
    simulator_config: SimulatorConfig,
    command_receiver: mpsc::Receiver<StreamCommand>,
    update_sender: Sender<StreamUpdate>,
}

impl StreamManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        stream_config: StreamConfig,
        simulator_config: SimulatorConfig,
    ) -> (Self, mpsc::Sender<StreamCommand>, Receiver<StreamUpdate>) {
        let (command_sender, command_receiver) = mpsc::channel();
        let (update_sender, update_receiver) =
            crossbeam_channel::bounded(stream_config.record_channel_capacity.max(1));

        let manager = StreamManager {
            registry,
            stream_config,
            simulator_config,
            command_receiver,
            update_sender,
        };

        (manager, command_sender, update_receiver)
    }

    fn sample_period(&self) -> Duration {
        let hz = self.stream_config.cadence_hz;
        if hz.is_finite() && hz > 0.0 {
            Duration::from_secs_f64(1.0 / hz)
        } else {
            Duration::from_millis(100)
        }
    }

    /// Runs the command loop until the command channel is closed.
    pub fn run(self) -> Result<(), StreamError> {
        let rt = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                let error = StreamError::RuntimeCreation(e.to_string());
                log::error!("{}", error);
                return Err(error);
            }
        };

        let period = self.sample_period();
        let mut stop_flags: HashMap<String, Arc<AtomicBool>> = HashMap::new();

        while let Ok(command) = self.command_receiver.recv() {
            match command {
                StreamCommand::Start { session_id, scenario } => {
                    if let Some(flag) = stop_flags.get(&session_id) {
                        if !flag.load(Ordering::Relaxed) {
                            log::warn!("Stream manager: {} is already streaming", session_id);
                            continue;
                        }
                    }
                    log::info!("Stream manager: Starting {} ({:?})", session_id, scenario);

                    let should_stop = Arc::new(AtomicBool::new(false));
                    stop_flags.insert(session_id.clone(), should_stop.clone());

                    let simulator = SignalSimulator::new(
                        &self.simulator_config,
                        scenario,
                        self.stream_config.cadence_hz,
                        chrono::Local::now().fixed_offset(),
                    );
                    let registry = self.registry.clone();
                    let sender = self.update_sender.clone();

                    rt.spawn(stream_session(registry, session_id, simulator, period, sender, should_stop));
                }
                StreamCommand::Stop { session_id } => {
                    log::info!("Stream manager: Stop requested for {}", session_id);
                    if let Some(flag) = stop_flags.remove(&session_id) {
                        flag.store(true, Ordering::Relaxed);
                    }
                }
                StreamCommand::StopAll => {
                    log::info!("Stream manager: Stopping {} streams", stop_flags.len());
                    for (_, flag) in stop_flags.drain() {
                        flag.store(true, Ordering::Relaxed);
                    }
                }
            }
        }

        log::info!("Stream manager: Command channel closed, shutting down");
        for flag in stop_flags.values() {
            flag.store(true, Ordering::Relaxed);
        }
        rt.shutdown_timeout(Duration::from_secs(1));
        Ok(())
    }
}

async fn stream_session(
    registry: Arc<SessionRegistry>,
    session_id: String,
    mut simulator: SignalSimulator,
    period: Duration,
    sender: Sender<StreamUpdate>,
    should_stop: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;
    let mut dropped: u64 = 0;

    loop {
        interval.tick().await;
        if should_stop.load(Ordering::Relaxed) {
            break;
        }

        let sample = simulator.next_sample();
        match registry.process(&session_id, &sample) {
            Ok(record) => {
                ticks += 1;
                let update = StreamUpdate::Record {
                    session_id: session_id.clone(),
                    record: Box::new(record),
                };
                match sender.try_send(update) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        log::debug!("Stream {}: consumer behind, record dropped", session_id);
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        log::info!("Stream {}: update channel closed", session_id);
                        break;
                    }
                }
            }
            Err(e) => {
                let error = StreamError::from(e);
                log::error!("Stream {}: {}", session_id, error);
                let _ = sender.try_send(StreamUpdate::Error {
                    session_id: session_id.clone(),
                    message: error.to_string(),
                });
                break;
            }
        }
    }

    should_stop.store(true, Ordering::Relaxed);
    if dropped > 0 {
        log::warn!("Stream {}: {} of {} records dropped", session_id, dropped, ticks);
    }
    log::info!(
        "Stream {}: stopped after {} samples ({:?})",
        session_id,
        ticks,
        simulator.scenario()
    );
    if sender
        .try_send(StreamUpdate::Stopped {
            session_id: session_id.clone(),
            ticks,
        })
        .is_err()
    {
        log::debug!("Stream {}: stop notification not delivered", session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::pipeline::Pipeline;
    use crate::session::SessionKind;
    use std::thread;

    fn setup(capacity: usize) -> (Arc<SessionRegistry>, StreamManager, mpsc::Sender<StreamCommand>, Receiver<StreamUpdate>) {
        let registry = Arc::new(SessionRegistry::new(Arc::new(Pipeline::default()), &SessionConfig::default()));
        let stream_config = StreamConfig {
            cadence_hz: 100.0,
            record_channel_capacity: capacity,
        };
        let simulator_config = SimulatorConfig {
            seed: Some(42),
            ..SimulatorConfig::default()
        };
        let (manager, commands, updates) = StreamManager::new(registry.clone(), stream_config, simulator_config);
        (registry, manager, commands, updates)
    }

    #[test]
    fn test_stream_manager_creation() {
        let (_registry, _manager, commands, _updates) = setup(8);
        assert!(commands.send(StreamCommand::StopAll).is_ok());
    }

    #[test]
    fn test_start_receive_and_stop() {
        let (registry, manager, commands, updates) = setup(256);
        let id = registry.create_session("sim", "user", SessionKind::Workout).unwrap().session_id;
        let handle = thread::spawn(move || manager.run());

        commands
            .send(StreamCommand::Start {
                session_id: id.clone(),
                scenario: Scenario::Exercise,
            })
            .unwrap();

        let mut records = 0;
        while records < 5 {
            match updates.recv_timeout(Duration::from_secs(5)).unwrap() {
                StreamUpdate::Record { session_id, record } => {
                    assert_eq!(session_id, id);
                    assert!(record.clarity_layer.overall_quality >= 0.0);
                    records += 1;
                }
                other => panic!("unexpected update {:?}", other),
            }
        }

        commands.send(StreamCommand::Stop { session_id: id.clone() }).unwrap();
        let ticks = loop {
            match updates.recv_timeout(Duration::from_secs(5)).unwrap() {
                StreamUpdate::Stopped { session_id, ticks } => {
                    assert_eq!(session_id, id);
                    break ticks;
                }
                StreamUpdate::Record { .. } => {}
                StreamUpdate::Error { message, .. } => panic!("stream error: {}", message),
            }
        };

        drop(commands);
        assert!(handle.join().unwrap().is_ok());
        assert!(ticks >= 5);
        assert_eq!(registry.info(&id).unwrap().data_points, ticks);
    }

    #[test]
    fn test_unknown_session_reports_error() {
        let (_registry, manager, commands, updates) = setup(16);
        let handle = thread::spawn(move || manager.run());

        commands
            .send(StreamCommand::Start {
                session_id: "session_missing".to_string(),
                scenario: Scenario::Normal,
            })
            .unwrap();

        match updates.recv_timeout(Duration::from_secs(5)).unwrap() {
            StreamUpdate::Error { session_id, message } => {
                assert_eq!(session_id, "session_missing");
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected update {:?}", other),
        }

        drop(commands);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_slow_consumer_drops_records() {
        let (registry, manager, commands, updates) = setup(2);
        let id = registry.create_session("sim", "user", SessionKind::Clinical).unwrap().session_id;
        let handle = thread::spawn(move || manager.run());

        commands
            .send(StreamCommand::Start {
                session_id: id.clone(),
                scenario: Scenario::Rest,
            })
            .unwrap();
        thread::sleep(Duration::from_millis(300));
        commands.send(StreamCommand::StopAll).unwrap();
        drop(commands);
        assert!(handle.join().unwrap().is_ok());

        let received = updates
            .try_iter()
            .filter(|u| matches!(u, StreamUpdate::Record { .. }))
            .count() as u64;
        assert!(received <= 2);
        assert!(registry.info(&id).unwrap().data_points > received);
    }
}
