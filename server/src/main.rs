use clap::Parser;
use log::{error, info, warn};
use server::config::ServerConfig;
use server::game::MatchSetup;
use server::match_manager::MatchManager;
use shared::{AiDifficulty, MatchEvent, Side};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

/// Runs headless AI-vs-AI matches through the match manager.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Number of matches to run concurrently
    #[clap(short, long, default_value = "1")]
    matches: u32,
    /// Difficulty of the left AI (easy, normal, hard)
    #[clap(short, long, default_value = "normal")]
    difficulty: AiDifficulty,
    /// Difficulty of the right AI; defaults to the left one
    #[clap(short, long)]
    right_difficulty: Option<AiDifficulty>,
    /// Base seed for serve angles and AI noise
    #[clap(short, long, default_value = "24301")]
    seed: u64,
    /// Seconds a match may wait for players before it is aborted
    #[clap(long, default_value = "30")]
    join_timeout_secs: u64,
    /// Seconds a match may stay paused before it is aborted
    #[clap(long, default_value = "60")]
    pause_timeout_secs: u64,
}

/// What one spectator saw of a match.
#[derive(Debug, Default)]
struct MatchReport {
    snapshots: u64,
    snapshot_bytes: u64,
    missed: u64,
    winner: Option<Side>,
    final_score: (u8, u8),
}

/// Main-method of the application.
/// Parses command-line arguments, starts the requested matches and waits for
/// them to finish or for Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::default()
        .with_base_seed(args.seed)
        .with_join_timeout(Duration::from_secs(args.join_timeout_secs))
        .with_pause_timeout(Duration::from_secs(args.pause_timeout_secs));
    let manager = Arc::new(MatchManager::new(config));

    let setup = MatchSetup::ai_vs_ai(
        args.difficulty,
        args.right_difficulty.unwrap_or(args.difficulty),
    );

    let mut spectators = JoinSet::new();
    for n in 1..=args.matches {
        let handle = manager
            .create_match_with(format!("match-{}", n), setup)
            .await?;
        let match_id = handle.match_id().clone();
        let events = handle.into_events();
        spectators.spawn(async move { (match_id, watch_match(events).await) });
    }

    let all_done = async {
        while let Some(joined) = spectators.join_next().await {
            match joined {
                Ok((match_id, report)) => log_report(&match_id.to_string(), &report),
                Err(e) => error!("Spectator task panicked: {}", e),
            }
        }
    };

    tokio::select! {
        _ = all_done => {
            info!("All matches finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    manager.shutdown().await;
    Ok(())
}

async fn watch_match(
    mut events: tokio::sync::broadcast::Receiver<MatchEvent>,
) -> MatchReport {
    let mut report = MatchReport::default();

    loop {
        match events.recv().await {
            Ok(event) => {
                match &event {
                    MatchEvent::Snapshot(state) => {
                        report.snapshots += 1;
                        report.snapshot_bytes += bincode::serialized_size(&event).unwrap_or(0);
                        report.final_score = (state.score1, state.score2);
                    }
                    MatchEvent::Point {
                        match_id,
                        scorer,
                        score1,
                        score2,
                    } => {
                        info!("{}: {} scores ({}-{})", match_id, scorer, score1, score2);
                    }
                    MatchEvent::Completed {
                        winner,
                        final_state,
                    } => {
                        report.winner = Some(*winner);
                        report.final_score = (final_state.score1, final_state.score2);
                    }
                    MatchEvent::Aborted {
                        match_id, reason, ..
                    } => {
                        warn!("{}: {}", match_id, reason);
                    }
                    MatchEvent::Started { .. }
                    | MatchEvent::Paused { .. }
                    | MatchEvent::Resumed { .. } => {}
                }
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => report.missed += missed,
            Err(RecvError::Closed) => break,
        }
    }

    report
}

fn log_report(match_id: &str, report: &MatchReport) {
    let average = if report.snapshots > 0 {
        report.snapshot_bytes as f64 / report.snapshots as f64
    } else {
        0.0
    };

    match report.winner {
        Some(winner) => info!(
            "{}: {} wins {}-{}",
            match_id, winner, report.final_score.0, report.final_score.1
        ),
        None => info!(
            "{}: no winner, stopped at {}-{}",
            match_id, report.final_score.0, report.final_score.1
        ),
    }
    info!(
        "{}: {} snapshots received ({} missed), {:.1} bytes per snapshot",
        match_id, report.snapshots, report.missed, average
    );
}
