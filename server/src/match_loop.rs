//! The task that drives one match.
//!
//! Each live match runs its own `MatchLoop` on the tokio runtime. The loop is
//! the only owner of its `MatchSimulation`, so the tick path needs no locks:
//! lifecycle commands arrive over an mpsc channel, human paddle intents over
//! one watch channel per paddle (last value wins), and every event goes out
//! over a broadcast channel that never blocks the ticker.

use crate::game::{MatchSimulation, MatchStatus};
use log::{debug, info, warn};
use shared::{AbortReason, MatchEvent, PaddleIntent, Side, TICK_RATE};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Lifecycle requests sent to a running match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCommand {
    Attach { side: Side },
    Pause,
    Resume,
    Abort { reason: AbortReason },
}

/// Fixed wall-clock period between two ticks.
pub fn tick_period() -> Duration {
    Duration::from_secs_f64(1.0 / TICK_RATE as f64)
}

pub struct MatchLoop {
    sim: MatchSimulation,
    commands: mpsc::UnboundedReceiver<MatchCommand>,
    left_intents: Option<watch::Receiver<PaddleIntent>>,
    right_intents: Option<watch::Receiver<PaddleIntent>>,
    events: broadcast::Sender<MatchEvent>,
    join_timeout: Duration,
    pause_timeout: Duration,
}

impl MatchLoop {
    pub fn new(
        sim: MatchSimulation,
        commands: mpsc::UnboundedReceiver<MatchCommand>,
        events: broadcast::Sender<MatchEvent>,
        join_timeout: Duration,
        pause_timeout: Duration,
    ) -> Self {
        Self {
            sim,
            commands,
            left_intents: None,
            right_intents: None,
            events,
            join_timeout,
            pause_timeout,
        }
    }

    /// Connects the intent channel of a human-controlled paddle.
    pub fn with_intents(mut self, side: Side, intents: watch::Receiver<PaddleIntent>) -> Self {
        match side {
            Side::Left => self.left_intents = Some(intents),
            Side::Right => self.right_intents = Some(intents),
        }
        self
    }

    /// Runs the match until it completes or is aborted and returns the final
    /// status.
    pub async fn run(mut self) -> MatchStatus {
        let mut ticker = interval(tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        let created_at = Instant::now();
        let mut paused_at: Option<Instant> = None;

        if let Some(event) = self.sim.start_if_ready() {
            self.emit(event);
        }

        while !self.sim.status().is_terminal() {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command, &mut paused_at),
                        None => {
                            // Every handle to this match is gone
                            if let Some(event) = self.sim.abort(AbortReason::Shutdown) {
                                self.emit(event);
                            }
                        }
                    }
                },

                _ = ticker.tick() => {
                    match self.sim.status() {
                        MatchStatus::WaitingForPlayers => {
                            if created_at.elapsed() >= self.join_timeout {
                                warn!("Match {}: players did not join within {:?}",
                                      self.sim.match_id(), self.join_timeout);
                                if let Some(event) = self.sim.abort(AbortReason::JoinTimeout) {
                                    self.emit(event);
                                }
                            }
                        }
                        MatchStatus::Paused => {
                            let expired = paused_at
                                .map_or(false, |since| since.elapsed() >= self.pause_timeout);
                            if expired {
                                warn!("Match {}: pause exceeded {:?}",
                                      self.sim.match_id(), self.pause_timeout);
                                if let Some(event) = self.sim.abort(AbortReason::PauseTimeout) {
                                    self.emit(event);
                                }
                            }
                        }
                        MatchStatus::InProgress => self.run_tick(),
                        MatchStatus::Completed | MatchStatus::Aborted => {}
                    }
                },
            }
        }

        info!(
            "Match {} loop finished ({:?}) after {} ticks",
            self.sim.match_id(),
            self.sim.status(),
            self.sim.tick_count()
        );
        self.sim.status()
    }

    fn handle_command(&mut self, command: MatchCommand, paused_at: &mut Option<Instant>) {
        let event = match command {
            MatchCommand::Attach { side } => match self.sim.attach(side) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Match {}: {}", self.sim.match_id(), e);
                    None
                }
            },
            MatchCommand::Pause => {
                let event = self.sim.pause();
                if event.is_some() {
                    *paused_at = Some(Instant::now());
                }
                event
            }
            MatchCommand::Resume => {
                let event = self.sim.resume();
                if event.is_some() {
                    *paused_at = None;
                }
                event
            }
            MatchCommand::Abort { reason } => self.sim.abort(reason),
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn run_tick(&mut self) {
        for side in [Side::Left, Side::Right] {
            if let Some(intent) = self.latest_intent(side) {
                // Invalid intents are logged by the paddle and stop it
                let _ = self.sim.set_intent(side, intent);
            }
        }

        for event in self.sim.tick() {
            self.emit(event);
        }

        if self.sim.tick_count() % TICK_RATE as u64 == 0 {
            debug!(
                "Match {} tick {}: score {}-{}, ball speed {:.1}, {} subscribers",
                self.sim.match_id(),
                self.sim.tick_count(),
                self.sim.score(Side::Left),
                self.sim.score(Side::Right),
                self.sim.ball().speed(),
                self.events.receiver_count()
            );
        }
    }

    /// The newest intent for `side` if it changed since the last tick.
    fn latest_intent(&mut self, side: Side) -> Option<PaddleIntent> {
        let intents = match side {
            Side::Left => self.left_intents.as_mut(),
            Side::Right => self.right_intents.as_mut(),
        }?;

        match intents.has_changed() {
            Ok(true) => Some(*intents.borrow_and_update()),
            _ => None,
        }
    }

    fn emit(&self, event: MatchEvent) {
        // Nobody listening is fine; a lagging subscriber loses old events
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatchSetup;
    use shared::{AiDifficulty, Direction, MatchId, WIN_SCORE};

    struct Harness {
        commands: mpsc::UnboundedSender<MatchCommand>,
        left: watch::Sender<PaddleIntent>,
        events: broadcast::Receiver<MatchEvent>,
        task: tokio::task::JoinHandle<MatchStatus>,
    }

    fn spawn_match(setup: MatchSetup, join_timeout: Duration, pause_timeout: Duration) -> Harness {
        let sim = MatchSimulation::new(MatchId::from("loop"), setup, 11);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = broadcast::channel(4096);
        let (left_tx, left_rx) = watch::channel(PaddleIntent::STOP);

        let match_loop = MatchLoop::new(sim, cmd_rx, event_tx, join_timeout, pause_timeout)
            .with_intents(Side::Left, left_rx);
        Harness {
            commands: cmd_tx,
            left: left_tx,
            events: event_rx,
            task: tokio::spawn(match_loop.run()),
        }
    }

    fn long() -> Duration {
        Duration::from_secs(3600)
    }

    async fn next_event(events: &mut broadcast::Receiver<MatchEvent>) -> MatchEvent {
        loop {
            match events.recv().await {
                Ok(event) => return event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event stream closed: {}", e),
            }
        }
    }

    #[test]
    fn test_tick_period() {
        let period = tick_period();
        assert!(period > Duration::from_millis(16));
        assert!(period < Duration::from_millis(17));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_when_player_attaches() {
        let mut h = spawn_match(MatchSetup::against(Some(AiDifficulty::Easy)), long(), long());

        h.commands.send(MatchCommand::Attach { side: Side::Left }).unwrap();
        assert!(matches!(next_event(&mut h.events).await, MatchEvent::Started { .. }));

        let mut last = 0;
        for _ in 0..10 {
            if let MatchEvent::Snapshot(state) = next_event(&mut h.events).await {
                assert!(state.tick > last);
                last = state.tick;
            }
        }
        assert!(last > 0);

        h.commands
            .send(MatchCommand::Abort {
                reason: AbortReason::Requested,
            })
            .unwrap();
        assert_eq!(h.task.await.unwrap(), MatchStatus::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_timeout_aborts() {
        let mut h = spawn_match(
            MatchSetup::against(None),
            Duration::from_secs(2),
            long(),
        );

        assert_eq!(h.task.await.unwrap(), MatchStatus::Aborted);
        match next_event(&mut h.events).await {
            MatchEvent::Aborted { reason, .. } => assert_eq!(reason, AbortReason::JoinTimeout),
            other => panic!("expected Aborted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_timeout_aborts() {
        let mut h = spawn_match(
            MatchSetup::against(Some(AiDifficulty::Normal)),
            long(),
            Duration::from_secs(5),
        );
        h.commands.send(MatchCommand::Attach { side: Side::Left }).unwrap();
        h.commands.send(MatchCommand::Pause).unwrap();

        let mut saw_pause = false;
        loop {
            match next_event(&mut h.events).await {
                MatchEvent::Paused { .. } => saw_pause = true,
                MatchEvent::Snapshot(_) => assert!(!saw_pause, "snapshot while paused"),
                MatchEvent::Aborted { reason, .. } => {
                    assert_eq!(reason, AbortReason::PauseTimeout);
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_pause);
        assert_eq!(h.task.await.unwrap(), MatchStatus::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_continues_ticking() {
        let mut h = spawn_match(
            MatchSetup::against(Some(AiDifficulty::Hard)),
            long(),
            Duration::from_secs(5),
        );
        h.commands.send(MatchCommand::Attach { side: Side::Left }).unwrap();
        h.commands.send(MatchCommand::Pause).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.commands.send(MatchCommand::Resume).unwrap();
        // Well past the pause timeout, the match must still be alive
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!h.task.is_finished());

        let mut saw_resume = false;
        let mut snapshots_after_resume = 0;
        while snapshots_after_resume < 5 {
            match next_event(&mut h.events).await {
                MatchEvent::Resumed { .. } => saw_resume = true,
                MatchEvent::Snapshot(_) if saw_resume => snapshots_after_resume += 1,
                MatchEvent::Aborted { .. } => panic!("match aborted after resume"),
                _ => {}
            }
        }
        h.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_intent_reaches_paddle() {
        let mut h = spawn_match(MatchSetup::against(Some(AiDifficulty::Easy)), long(), long());
        h.commands.send(MatchCommand::Attach { side: Side::Left }).unwrap();
        h.left.send(Direction::Down.into()).unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut last_y = None;
        loop {
            match h.events.try_recv() {
                Ok(MatchEvent::Snapshot(state)) => last_y = Some(state.paddle1.y),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        assert_eq!(last_y, Some(520.0));

        h.commands
            .send(MatchCommand::Abort {
                reason: AbortReason::Requested,
            })
            .unwrap();
        assert_eq!(h.task.await.unwrap(), MatchStatus::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_match_runs_to_completion() {
        let mut h = spawn_match(
            MatchSetup::ai_vs_ai(AiDifficulty::Hard, AiDifficulty::Easy),
            long(),
            long(),
        );

        let status = h.task.await.unwrap();
        assert_eq!(status, MatchStatus::Completed);

        let mut completed = None;
        loop {
            match h.events.try_recv() {
                Ok(MatchEvent::Completed {
                    winner,
                    final_state,
                }) => completed = Some((winner, final_state)),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        let (winner, state) = completed.expect("completed event");
        assert_eq!(state.score(winner), WIN_SCORE);
        assert!(state.score(winner.opponent()) < WIN_SCORE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_commands_end_loop() {
        let h = spawn_match(MatchSetup::against(None), long(), long());
        drop(h.commands);
        assert_eq!(h.task.await.unwrap(), MatchStatus::Aborted);
    }
}
