//! Tunable game rules and building costs.
//!
//! Every field has a default matching the standard game, and `#[serde(default)]`
//! lets a rules file override only what it names.

use crate::inventory::ResourceHand;
use serde::{Deserialize, Serialize};

/// Starting development deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckComposition {
    pub knight: u32,
    pub road_building: u32,
    pub year_of_plenty: u32,
    pub monopoly: u32,
    pub victory_point: u32,
}

impl Default for DeckComposition {
    fn default() -> Self {
        Self {
            knight: 14,
            road_building: 2,
            year_of_plenty: 2,
            monopoly: 2,
            victory_point: 5,
        }
    }
}

/// Pieces each player owns for the whole game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceLimits {
    pub settlements: u32,
    pub cities: u32,
    pub roads: u32,
}

impl Default for PieceLimits {
    fn default() -> Self {
        Self {
            settlements: 5,
            cities: 4,
            roads: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub victory_points_to_win: u32,
    /// Starting bank count of each resource
    pub bank_stock: u32,
    pub deck: DeckComposition,
    pub longest_road_min: u32,
    pub largest_army_min: u32,
    /// Hands strictly larger than this are taxed on a 7
    pub discard_threshold: u32,
    pub pieces: PieceLimits,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            victory_points_to_win: 10,
            bank_stock: 19,
            deck: DeckComposition::default(),
            longest_road_min: 5,
            largest_army_min: 3,
            discard_threshold: 7,
            pieces: PieceLimits::default(),
        }
    }
}

impl Rules {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Building costs
pub mod costs {
    use super::ResourceHand;

    pub fn road() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 0, 0)
    }

    pub fn settlement() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 1, 1)
    }

    pub fn city() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 3, 2, 0)
    }

    pub fn development_card() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 1, 1, 1)
    }
}
