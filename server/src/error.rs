use shared::{MatchId, Side};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Match already exists: {0}")]
    AlreadyExists(MatchId),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Match aborted: {0}")]
    MatchAborted(MatchId),

    #[error("The {side} paddle is controlled by the AI")]
    NotHumanControlled { side: Side },
}

pub type MatchResult<T> = std::result::Result<T, MatchError>;
