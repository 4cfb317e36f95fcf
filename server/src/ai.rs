//! Computer-controlled paddle.
//!
//! The AI looks at the ball at most once per perception interval of its
//! difficulty tier. Each look adds uniform noise to the ball's height and
//! turns the result into one paddle intent, which is then replayed unchanged
//! on every physics tick until the next look. The timer runs on simulated
//! time, so the cadence is independent of how fast the tick loop is driven.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{AiDifficulty, Ball, DifficultyParams, Direction, Paddle, PaddleIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiPhase {
    /// Nothing observed since the last serve; the paddle holds still.
    Idle,
    /// Replaying the last decision while the perception timer runs.
    Observing,
    /// Sampling the ball and choosing a new intent.
    Deciding,
}

/// Turns a perceived target height into an intent for a paddle whose centre
/// is at `paddle_center`.
///
/// The deadzone is measured from the paddle centre, not from `Paddle::y`
/// (the top edge), so a stopped AI holds the ball's height mid-paddle.
pub fn decide(target: f32, paddle_center: f32, deadzone: f32) -> PaddleIntent {
    let diff = target - paddle_center;
    if diff.abs() < deadzone {
        PaddleIntent::STOP
    } else if diff > 0.0 {
        Direction::Down.into()
    } else {
        Direction::Up.into()
    }
}

#[derive(Debug, Clone)]
pub struct AiOpponent {
    difficulty: AiDifficulty,
    params: DifficultyParams,
    phase: AiPhase,
    /// Simulated seconds since the last look (or since the serve).
    since_perception: f32,
    target: Option<f32>,
    intent: PaddleIntent,
    decisions: u64,
    rng: StdRng,
}

impl AiOpponent {
    pub fn new(difficulty: AiDifficulty, seed: u64) -> Self {
        Self::with_rng(difficulty, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(difficulty: AiDifficulty, rng: StdRng) -> Self {
        Self {
            difficulty,
            params: difficulty.params(),
            phase: AiPhase::Idle,
            since_perception: 0.0,
            target: None,
            intent: PaddleIntent::STOP,
            decisions: 0,
            rng,
        }
    }

    pub fn difficulty(&self) -> AiDifficulty {
        self.difficulty
    }

    pub fn phase(&self) -> AiPhase {
        self.phase
    }

    /// The noisy ball height the AI is currently steering toward.
    pub fn target(&self) -> Option<f32> {
        self.target
    }

    pub fn intent(&self) -> PaddleIntent {
        self.intent
    }

    /// Number of intents issued so far.
    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    /// Forgets everything seen during the previous rally.
    pub fn reset(&mut self) {
        self.phase = AiPhase::Idle;
        self.since_perception = 0.0;
        self.target = None;
        self.intent = PaddleIntent::STOP;
    }

    /// Advances the perception timer by `dt` and returns the intent to apply
    /// this tick. `ball` is the most recent state the AI is allowed to see.
    pub fn update(&mut self, dt: f32, ball: &Ball, paddle: &Paddle) -> PaddleIntent {
        self.since_perception += dt;
        if self.since_perception < self.params.perception_interval {
            return self.intent;
        }
        self.since_perception -= self.params.perception_interval;

        self.phase = AiPhase::Deciding;
        let target = self.perceive(ball);
        self.intent = decide(target, paddle.center_y(), self.params.deadzone);
        self.target = Some(target);
        self.decisions += 1;
        self.phase = AiPhase::Observing;

        debug!(
            "AI ({}) sees ball at y={:.1}, aims for {:.1}, intent {:?}",
            self.difficulty, ball.position.y, target, self.intent.direction
        );
        self.intent
    }

    fn perceive(&mut self, ball: &Ball) -> f32 {
        let error_range = self.params.error_range;
        let noise = if error_range > 0.0 {
            self.rng.gen_range(-error_range..=error_range)
        } else {
            0.0
        };
        ball.position.y + noise
    }
}
