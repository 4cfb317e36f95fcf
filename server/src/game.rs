//! Authoritative state of a single match and its fixed-step simulation.
//!
//! `MatchSimulation` is a plain state machine: it never sleeps or touches a
//! channel. The match loop owns one instance, feeds it commands and intents,
//! calls [`MatchSimulation::tick`] once per tick period and forwards the
//! events it returns.

use crate::ai::AiOpponent;
use crate::error::{MatchError, MatchResult};
use crate::paddle::PaddleController;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::physics::{bounce_off_paddle, required_substeps};
use shared::{
    AbortReason, AiDifficulty, Ball, MatchEvent, MatchId, MatchState, PaddleIntent, Side,
    BALL_INITIAL_SPEED, BALL_MAX_SPEED, MAX_SERVE_ANGLE, TICK_DT, WIN_SCORE,
};

/// Who steers a paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    Human,
    Ai(AiDifficulty),
}

/// Controllers of both sides, fixed when the match is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    pub left: Controller,
    pub right: Controller,
}

impl MatchSetup {
    /// Left is always human; right is the AI when a difficulty is given.
    pub fn against(ai: Option<AiDifficulty>) -> Self {
        Self {
            left: Controller::Human,
            right: ai.map_or(Controller::Human, Controller::Ai),
        }
    }

    pub fn ai_vs_ai(left: AiDifficulty, right: AiDifficulty) -> Self {
        Self {
            left: Controller::Ai(left),
            right: Controller::Ai(right),
        }
    }

    pub fn controller(&self, side: Side) -> Controller {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    WaitingForPlayers,
    InProgress,
    Paused,
    Completed,
    Aborted,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Aborted)
    }
}

#[derive(Debug, Clone)]
struct SideState {
    paddle: PaddleController,
    ai: Option<AiOpponent>,
    attached: bool,
    score: u8,
}

impl SideState {
    fn new(side: Side, controller: Controller, rng: &mut StdRng) -> Self {
        let ai = match controller {
            Controller::Human => None,
            Controller::Ai(difficulty) => Some(AiOpponent::new(difficulty, rng.gen())),
        };
        Self {
            paddle: PaddleController::new(side),
            attached: ai.is_some(),
            ai,
            score: 0,
        }
    }
}

pub struct MatchSimulation {
    match_id: MatchId,
    setup: MatchSetup,
    status: MatchStatus,
    tick: u64,
    ball: Ball,
    left: SideState,
    right: SideState,
    rng: StdRng,
}

impl MatchSimulation {
    pub fn new(match_id: MatchId, setup: MatchSetup, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let left = SideState::new(Side::Left, setup.left, &mut rng);
        let right = SideState::new(Side::Right, setup.right, &mut rng);
        let first = if rng.gen_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        };
        let angle = rng.gen_range(-MAX_SERVE_ANGLE..=MAX_SERVE_ANGLE);

        Self {
            match_id,
            setup,
            status: MatchStatus::WaitingForPlayers,
            tick: 0,
            ball: Ball::serve_from_center(first, angle),
            left,
            right,
            rng,
        }
    }

    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    pub fn setup(&self) -> MatchSetup {
        self.setup
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn score(&self, side: Side) -> u8 {
        self.side(side).score
    }

    pub fn ai(&self, side: Side) -> Option<&AiOpponent> {
        self.side(side).ai.as_ref()
    }

    pub fn is_attached(&self, side: Side) -> bool {
        self.side(side).attached
    }

    fn side(&self, side: Side) -> &SideState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn snapshot(&self) -> MatchState {
        MatchState {
            match_id: self.match_id.clone(),
            tick: self.tick,
            ball: self.ball,
            paddle1: *self.left.paddle.paddle(),
            paddle2: *self.right.paddle.paddle(),
            score1: self.left.score,
            score2: self.right.score,
        }
    }

    /// Marks a human player as present. The match starts once both sides
    /// have a controller; attaching twice is harmless.
    pub fn attach(&mut self, side: Side) -> MatchResult<Option<MatchEvent>> {
        if self.setup.controller(side) != Controller::Human {
            return Err(MatchError::NotHumanControlled { side });
        }
        self.side_mut(side).attached = true;
        Ok(self.start_if_ready())
    }

    /// Starts an all-AI match, which has nobody to wait for.
    pub fn start_if_ready(&mut self) -> Option<MatchEvent> {
        if self.status != MatchStatus::WaitingForPlayers
            || !(self.left.attached && self.right.attached)
        {
            return None;
        }
        self.status = MatchStatus::InProgress;
        info!("Match {} started", self.match_id);
        Some(MatchEvent::Started {
            match_id: self.match_id.clone(),
        })
    }

    /// Steers a human-controlled paddle. Invalid intents stop the paddle and
    /// are reported, but leave the match running.
    pub fn set_intent(&mut self, side: Side, intent: PaddleIntent) -> MatchResult<()> {
        if self.setup.controller(side) != Controller::Human {
            return Err(MatchError::NotHumanControlled { side });
        }
        self.side_mut(side).paddle.set_intent(intent)
    }

    /// Freezes a running match. Returns `None` (and changes nothing) unless
    /// the match is in progress.
    pub fn pause(&mut self) -> Option<MatchEvent> {
        if self.status != MatchStatus::InProgress {
            return None;
        }
        self.status = MatchStatus::Paused;
        info!("Match {} paused at tick {}", self.match_id, self.tick);
        Some(MatchEvent::Paused {
            match_id: self.match_id.clone(),
        })
    }

    /// Returns `None` unless the match is paused.
    pub fn resume(&mut self) -> Option<MatchEvent> {
        if self.status != MatchStatus::Paused {
            return None;
        }
        self.status = MatchStatus::InProgress;
        info!("Match {} resumed", self.match_id);
        Some(MatchEvent::Resumed {
            match_id: self.match_id.clone(),
        })
    }

    /// Ends the match without a winner. Terminal matches stay as they are.
    pub fn abort(&mut self, reason: AbortReason) -> Option<MatchEvent> {
        if self.status.is_terminal() {
            return None;
        }
        self.status = MatchStatus::Aborted;
        info!("Match {} aborted: {}", self.match_id, reason);
        Some(MatchEvent::Aborted {
            match_id: self.match_id.clone(),
            reason,
            last_state: self.snapshot(),
        })
    }

    /// Advances the match by one tick and returns what subscribers should be
    /// told: an optional `Point`, followed by either a `Snapshot` or the final
    /// `Completed` event. Does nothing unless the match is in progress.
    pub fn tick(&mut self) -> Vec<MatchEvent> {
        if self.status != MatchStatus::InProgress {
            return Vec::new();
        }
        self.tick += 1;
        let dt = TICK_DT;

        // The AI reacts to the state the previous snapshot showed
        let ball = self.ball;
        for state in [&mut self.left, &mut self.right] {
            if let Some(ai) = state.ai.as_mut() {
                let intent = ai.update(dt, &ball, state.paddle.paddle());
                if let Err(e) = state.paddle.set_intent(intent) {
                    warn!("Match {}: AI produced {}", self.match_id, e);
                }
            }
        }
        self.left.paddle.step(dt);
        self.right.paddle.step(dt);

        let scorer = self.advance_ball(dt);
        if let Err(e) = self.check_invariants() {
            warn!("Match {} tick {}: {}", self.match_id, self.tick, e);
        }

        let mut events = Vec::with_capacity(2);
        if let Some(scorer) = scorer {
            let score = {
                let state = self.side_mut(scorer);
                state.score += 1;
                state.score
            };
            info!(
                "Match {}: point {} ({}-{})",
                self.match_id, scorer, self.left.score, self.right.score
            );
            events.push(MatchEvent::Point {
                match_id: self.match_id.clone(),
                scorer,
                score1: self.left.score,
                score2: self.right.score,
            });

            if score >= WIN_SCORE {
                self.status = MatchStatus::Completed;
                info!(
                    "Match {} completed after {} ticks, {} wins {}-{}",
                    self.match_id, self.tick, scorer, self.left.score, self.right.score
                );
                events.push(MatchEvent::Completed {
                    winner: scorer,
                    final_state: self.snapshot(),
                });
                return events;
            }

            self.serve(scorer.opponent());
        }

        events.push(MatchEvent::Snapshot(self.snapshot()));
        events
    }

    /// Moves the ball through `dt` in sub-steps, bouncing it off walls and
    /// paddles. Returns the scoring side if a goal line was reached.
    fn advance_ball(&mut self, dt: f32) -> Option<Side> {
        let substeps = required_substeps(self.ball.speed(), dt);
        let substep_dt = dt / substeps as f32;

        for _ in 0..substeps {
            self.ball.integrate(substep_dt);
            self.ball.bounce_off_walls();
            bounce_off_paddle(&mut self.ball, self.left.paddle.paddle(), Side::Left);
            bounce_off_paddle(&mut self.ball, self.right.paddle.paddle(), Side::Right);

            if let Some(goal) = self.ball.goal_reached() {
                return Some(goal.opponent());
            }
        }
        None
    }

    /// Puts a new ball in play toward `toward` and clears both AIs' view of
    /// the finished rally.
    fn serve(&mut self, toward: Side) {
        let angle = self.rng.gen_range(-MAX_SERVE_ANGLE..=MAX_SERVE_ANGLE);
        self.ball = Ball::serve_from_center(toward, angle);
        for state in [&mut self.left, &mut self.right] {
            if let Some(ai) = state.ai.as_mut() {
                ai.reset();
            }
        }
    }

    /// Repairs a ball that ended up somewhere collision handling should have
    /// prevented, and reports what was wrong.
    fn check_invariants(&mut self) -> MatchResult<()> {
        if !self.ball.position.is_finite() || !self.ball.velocity.is_finite() {
            let toward = if self.ball.velocity.x > 0.0 {
                Side::Right
            } else {
                Side::Left
            };
            self.serve(toward);
            return Err(MatchError::InvariantViolation(
                "non-finite ball state, re-served".to_string(),
            ));
        }

        let mut problems = Vec::new();
        if !self.ball.is_inside_viewport() {
            problems.push(format!("ball at y={:.2} outside field", self.ball.position.y));
            self.ball.snap_into_viewport();
        }

        let speed = self.ball.speed();
        let tolerance = 1e-3 * BALL_INITIAL_SPEED;
        if speed < BALL_INITIAL_SPEED - tolerance || speed > BALL_MAX_SPEED + tolerance {
            problems.push(format!("ball speed {:.2} out of range", speed));
            let clamped = speed.clamp(BALL_INITIAL_SPEED, BALL_MAX_SPEED);
            self.ball.velocity = self.ball.velocity.normalize().scale(clamped);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MatchError::InvariantViolation(problems.join(", ")))
        }
    }

    #[cfg(test)]
    pub(crate) fn place_ball(&mut self, ball: Ball) {
        self.ball = ball;
    }

    #[cfg(test)]
    pub(crate) fn set_scores(&mut self, left: u8, right: u8) {
        self.left.score = left;
        self.right.score = right;
    }
}
