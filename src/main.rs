use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use zen_vitals::session::SessionKind;
use zen_vitals::simulator::Scenario;
use zen_vitals::stream::{StreamCommand, StreamManager, StreamUpdate};
use zen_vitals::{Config, Pipeline, SessionRegistry};

/// Stream simulated wearable sessions through the vital-sign analysis pipeline
#[derive(Parser, Debug)]
#[command(name = "zen-vitals", version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated scenario for every session
    #[arg(long, value_enum, default_value_t = Scenario::Normal)]
    scenario: Scenario,

    /// How long to stream, in seconds
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Number of concurrent sessions
    #[arg(long, default_value_t = 1)]
    sessions: usize,

    /// Print each record as one JSON line
    #[arg(long)]
    json: bool,
}

fn session_kind(scenario: Scenario) -> SessionKind {
    match scenario {
        Scenario::Normal => SessionKind::DailyMonitoring,
        Scenario::Exercise => SessionKind::Workout,
        Scenario::Rest => SessionKind::Meditation,
        Scenario::Sleep => SessionKind::Sleep,
        Scenario::Hypoxia => SessionKind::Clinical,
    }
}

fn handle_update(update: StreamUpdate, json: bool) {
    match update {
        StreamUpdate::Record { session_id, record } => {
            if json {
                match serde_json::to_string(&record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::error!("Failed to serialize record: {}", e),
                }
            } else {
                log::info!(
                    "{} | HR {:.0} | quality {} | rhythm {} | {} ({:.2}) | wellness {:.1}",
                    session_id,
                    record.raw_signals.heart_rate,
                    record.clarity_layer.assessment,
                    record.ifrs_layer.rhythm_classification,
                    record.lia_insights.condition,
                    record.lia_insights.confidence,
                    record.lia_insights.wellness.overall
                );
            }
        }
        StreamUpdate::Stopped { session_id, ticks } => {
            log::info!("{} stopped after {} samples", session_id, ticks);
        }
        StreamUpdate::Error { session_id, message } => {
            log::error!("{}: {}", session_id, message);
        }
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        log::error!("{}; using default configuration", e);
        Config::default()
    });

    let pipeline = Arc::new(Pipeline::new(config.pipeline.clone()));
    let registry = Arc::new(SessionRegistry::new(pipeline, &config.sessions));

    let mut session_ids = Vec::with_capacity(cli.sessions);
    for i in 0..cli.sessions {
        match registry.create_session(&format!("SIM_{:03}", i + 1), "local", session_kind(cli.scenario)) {
            Ok(info) => session_ids.push(info.session_id),
            Err(e) => log::error!("Failed to create session: {}", e),
        }
    }

    let (manager, command_sender, updates) =
        StreamManager::new(registry.clone(), config.stream.clone(), config.simulator.clone());

    // Spawn a thread to run the simulated streams
    let stream_thread = std::thread::spawn(move || manager.run());

    for session_id in &session_ids {
        let _ = command_sender.send(StreamCommand::Start {
            session_id: session_id.clone(),
            scenario: cli.scenario,
        });
    }

    let deadline = Instant::now() + Duration::from_secs(cli.seconds);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match updates.recv_timeout(remaining) {
            Ok(update) => handle_update(update, cli.json),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => break,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = command_sender.send(StreamCommand::StopAll);
    drop(command_sender);
    match stream_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("{}", e),
        Err(_) => log::error!("Stream thread panicked"),
    }
    for update in updates.try_iter() {
        handle_update(update, cli.json);
    }

    for session_id in &session_ids {
        let summary = registry.info(session_id).ok().map(|info| {
            format!(
                "{} samples, average wellness {:.1}",
                info.data_points, info.average_wellness
            )
        });
        match registry.end_session(session_id, summary) {
            Ok(info) => log::info!(
                "Session {} ({:?}): {}",
                info.session_id,
                info.kind,
                info.summary.unwrap_or_default()
            ),
            Err(e) => log::error!("{}", e),
        }
    }

    for entry in registry.recent_log(8) {
        log::debug!("{}", entry);
    }
}
