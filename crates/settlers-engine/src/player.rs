//! Seats at the table.

use serde::{Deserialize, Serialize};

/// Seat index, also used as the inventory and ownership key
pub type PlayerId = u8;

/// How hard a bot seat plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BotDifficulty {
    /// Picks any legal action
    Easy,
    /// Prefers building over passing
    #[default]
    Medium,
    /// Builds toward cities and high-yield corners
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    Human,
    Bot(BotDifficulty),
}

/// A seat: a human player or an AI stand-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: PlayerId,
    pub name: String,
    pub kind: ActorKind,
}

impl Actor {
    pub fn human(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ActorKind::Human,
        }
    }

    pub fn bot(id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            id,
            name: format!("Bot {}", id + 1),
            kind: ActorKind::Bot(difficulty),
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.kind, ActorKind::Bot(_))
    }
}
