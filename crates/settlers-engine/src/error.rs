use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an action was rejected. A rejected action leaves the game unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Illegal placement: {0}")]
    IllegalPlacement(String),

    #[error("Amount is not a multiple of the trade ratio {ratio}")]
    InvalidRatio { ratio: u32 },

    #[error("Insufficient resources")]
    InsufficientResources,

    #[error("No development cards left in deck")]
    DeckExhausted,

    #[error("Action not allowed in the current phase")]
    IllegalPhaseTransition,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("No pieces remaining")]
    NoPiecesRemaining,

    #[error("Don't have a playable card of that kind")]
    NoSuchCard,

    #[error("Already played a development card this turn")]
    CardLimitReached,

    #[error("Invalid discard")]
    InvalidDiscard,

    #[error("Invalid trade")]
    InvalidTrade,

    #[error("No active trade")]
    NoActiveTrade,

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("Dice must show 1 to 6")]
    InvalidDice,

    #[error("Game is over")]
    GameOver,
}

impl GameError {
    pub(crate) fn placement(reason: impl Into<String>) -> Self {
        GameError::IllegalPlacement(reason.into())
    }
}
