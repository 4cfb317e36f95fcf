//! Paddle motion driven by validated intents.

use crate::error::{MatchError, MatchResult};
use log::warn;
use shared::{Direction, Paddle, PaddleIntent, Side, PADDLE_SPEED};

/// Checks an intent and clamps its speed into `[0, PADDLE_SPEED]`.
///
/// Non-finite speeds cannot be clamped meaningfully and are rejected.
pub fn validate_intent(intent: PaddleIntent) -> MatchResult<PaddleIntent> {
    if !intent.speed.is_finite() {
        return Err(MatchError::InvalidIntent(format!(
            "non-finite paddle speed {}",
            intent.speed
        )));
    }
    if intent.direction == Direction::Stop {
        return Ok(PaddleIntent::STOP);
    }
    Ok(PaddleIntent::new(
        intent.direction,
        intent.speed.clamp(0.0, PADDLE_SPEED),
    ))
}

/// Owns one paddle and the intent currently steering it.
#[derive(Debug, Clone)]
pub struct PaddleController {
    side: Side,
    paddle: Paddle,
    intent: PaddleIntent,
}

impl PaddleController {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            paddle: Paddle::new(side),
            intent: PaddleIntent::STOP,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn paddle(&self) -> &Paddle {
        &self.paddle
    }

    pub fn intent(&self) -> PaddleIntent {
        self.intent
    }

    /// Replaces the current intent. An invalid intent stops the paddle and is
    /// reported back, but is never fatal.
    pub fn set_intent(&mut self, intent: PaddleIntent) -> MatchResult<()> {
        match validate_intent(intent) {
            Ok(valid) => {
                self.intent = valid;
                Ok(())
            }
            Err(e) => {
                warn!("{} paddle: {}, stopping", self.side, e);
                self.intent = PaddleIntent::STOP;
                Err(e)
            }
        }
    }

    /// Moves the paddle for `dt` seconds and keeps it fully on screen.
    pub fn step(&mut self, dt: f32) {
        let velocity = self.intent.velocity();
        let max_y = self.paddle.max_y();
        let y = self.paddle.y + velocity * dt;

        self.paddle.y = y.clamp(0.0, max_y);
        // A paddle pinned against a wall is not moving
        self.paddle.velocity = if y == self.paddle.y { velocity } else { 0.0 };
    }
}
