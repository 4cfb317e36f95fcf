//! Data model shared between the simulation server and whatever transport
//! carries its output: gameplay constants, paddle intents, match snapshots and
//! the events subscribers receive.

pub mod physics;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use physics::{Ball, Paddle, Vector2};

pub const TICK_RATE: u32 = 60;
pub const TICK_DT: f32 = 1.0 / TICK_RATE as f32;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;

pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 80.0;
pub const PADDLE_SPEED: f32 = 430.0;
/// Gap between a paddle and the goal line behind it.
pub const PADDLE_MARGIN: f32 = 20.0;

pub const BALL_RADIUS: f32 = 8.0;
pub const BALL_INITIAL_SPEED: f32 = 528.0;
pub const BALL_MAX_SPEED: f32 = 1980.0;
pub const BALL_ACCELERATION: f32 = 1.05;
/// Steepest outgoing angle off a paddle edge, in radians.
pub const MAX_BOUNCE_ANGLE: f32 = std::f32::consts::FRAC_PI_4;
/// Serves leave the centre within this angle of the horizontal.
pub const MAX_SERVE_ANGLE: f32 = std::f32::consts::FRAC_PI_6;

pub const WIN_SCORE: u8 = 11;

/// External identifier of a match, chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub String);

impl MatchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        MatchId(id.to_string())
    }
}

impl From<String> for MatchId {
    fn from(id: String) -> Self {
        MatchId(id)
    }
}

/// Left is player 1, right is player 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Horizontal sign of a ball travelling toward this side.
    pub fn toward(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    pub fn paddle_x(self) -> f32 {
        match self {
            Side::Left => PADDLE_MARGIN,
            Side::Right => WORLD_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Screen coordinates: `Up` moves toward y = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stop,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
            Direction::Stop => 0.0,
        }
    }
}

/// A request to move a paddle, from a human or from the AI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleIntent {
    pub direction: Direction,
    pub speed: f32,
}

impl PaddleIntent {
    pub const STOP: PaddleIntent = PaddleIntent {
        direction: Direction::Stop,
        speed: 0.0,
    };

    pub fn new(direction: Direction, speed: f32) -> Self {
        Self { direction, speed }
    }

    /// Signed vertical velocity this intent asks for, before validation.
    pub fn velocity(&self) -> f32 {
        self.direction.sign() * self.speed
    }
}

impl Default for PaddleIntent {
    fn default() -> Self {
        PaddleIntent::STOP
    }
}

impl From<Direction> for PaddleIntent {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Stop => PaddleIntent::STOP,
            _ => PaddleIntent::new(direction, PADDLE_SPEED),
        }
    }
}

/// Perception and error parameters of one AI tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyParams {
    /// Minimum simulated time between two looks at the ball, in seconds.
    pub perception_interval: f32,
    /// Half-width of the uniform error added to the observed ball y.
    pub error_range: f32,
    /// The AI stops when its paddle centre is closer than this to its target.
    pub deadzone: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

impl AiDifficulty {
    pub fn params(self) -> DifficultyParams {
        match self {
            AiDifficulty::Easy => DifficultyParams {
                perception_interval: 1.0,
                error_range: 120.0,
                deadzone: 30.0,
            },
            AiDifficulty::Normal => DifficultyParams {
                perception_interval: 1.0,
                error_range: 60.0,
                deadzone: 20.0,
            },
            AiDifficulty::Hard => DifficultyParams {
                perception_interval: 1.0,
                error_range: 20.0,
                deadzone: 10.0,
            },
        }
    }
}

impl fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiDifficulty::Easy => f.write_str("easy"),
            AiDifficulty::Normal => f.write_str("normal"),
            AiDifficulty::Hard => f.write_str("hard"),
        }
    }
}

impl FromStr for AiDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "normal" => Ok(AiDifficulty::Normal),
            "hard" => Ok(AiDifficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Full visible state of a match at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub match_id: MatchId,
    pub tick: u64,
    pub ball: Ball,
    pub paddle1: Paddle,
    pub paddle2: Paddle,
    pub score1: u8,
    pub score2: u8,
}

impl MatchState {
    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::Left => &self.paddle1,
            Side::Right => &self.paddle2,
        }
    }

    pub fn score(&self, side: Side) -> u8 {
        match side {
            Side::Left => self.score1,
            Side::Right => self.score2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    Requested,
    JoinTimeout,
    PauseTimeout,
    Shutdown,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Requested => f.write_str("aborted on request"),
            AbortReason::JoinTimeout => f.write_str("players did not join in time"),
            AbortReason::PauseTimeout => f.write_str("pause was not resolved in time"),
            AbortReason::Shutdown => f.write_str("server shutting down"),
        }
    }
}

/// Everything a match subscriber is told, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    Started {
        match_id: MatchId,
    },
    Snapshot(MatchState),
    Point {
        match_id: MatchId,
        scorer: Side,
        score1: u8,
        score2: u8,
    },
    Paused {
        match_id: MatchId,
    },
    Resumed {
        match_id: MatchId,
    },
    Completed {
        winner: Side,
        final_state: MatchState,
    },
    Aborted {
        match_id: MatchId,
        reason: AbortReason,
        last_state: MatchState,
    },
}

impl MatchEvent {
    pub fn match_id(&self) -> &MatchId {
        match self {
            MatchEvent::Started { match_id }
            | MatchEvent::Point { match_id, .. }
            | MatchEvent::Paused { match_id }
            | MatchEvent::Resumed { match_id }
            | MatchEvent::Aborted { match_id, .. } => match_id,
            MatchEvent::Snapshot(state) => &state.match_id,
            MatchEvent::Completed { final_state, .. } => &final_state.match_id,
        }
    }

    /// True for the last event a match ever emits.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchEvent::Completed { .. } | MatchEvent::Aborted { .. }
        )
    }

    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<MatchEvent> {
        bincode::deserialize(bytes)
    }
}
