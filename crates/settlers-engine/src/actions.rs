//! Game actions that players can take.
//!
//! This module defines all possible actions in the game and the events
//! that result from those actions.

use crate::game::Phase;
use crate::hex::{EdgeCoord, HexCoord, IntersectionCoord};
use crate::inventory::{Resource, ResourceHand};
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All possible actions a player can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Setup Phase ====================
    /// Opening settlement, free and free-standing
    PlaceSetupSettlement(IntersectionCoord),
    /// Opening road, touching the settlement just placed
    PlaceSetupRoad(EdgeCoord),

    // ==================== Turn Actions ====================
    RollDice,

    // ==================== Robber Actions ====================
    /// Give up half the hand after a 7
    Discard(ResourceHand),
    /// Move the robber and optionally rob a player on the new hex
    MoveRobber {
        to: HexCoord,
        victim: Option<PlayerId>,
    },

    // ==================== Building Actions (Main Phase) ====================
    BuildRoad(EdgeCoord),
    BuildSettlement(IntersectionCoord),
    UpgradeToCity(IntersectionCoord),
    BuyDevelopmentCard,

    // ==================== Development Card Actions ====================
    PlayKnight,
    /// Two free roads; the second may be omitted when no second spot exists
    PlayRoadBuilding {
        first: EdgeCoord,
        second: Option<EdgeCoord>,
    },
    PlayYearOfPlenty(Resource, Resource),
    PlayMonopoly(Resource),

    // ==================== Trading Actions ====================
    /// Trade `amount` of `give` with the bank at the player's best ratio
    TradeWithBank {
        give: Resource,
        amount: u32,
        want: Resource,
    },
    /// Offer a trade to one player, or to everyone when `to` is `None`
    ProposeTrade {
        to: Option<PlayerId>,
        offer: ResourceHand,
        request: ResourceHand,
    },
    AcceptTrade,
    DeclineTrade,
    CancelTrade,

    // ==================== Turn Management ====================
    EndTurn,
}

/// A trade offer between players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub from: PlayerId,
    /// Specific player to trade with, or None for open offer
    pub to: Option<PlayerId>,
    pub offer: ResourceHand,
    pub request: ResourceHand,
}

impl TradeOffer {
    /// Non-empty on both sides
    pub fn is_valid(&self) -> bool {
        !self.offer.is_empty() && !self.request.is_empty()
    }

    pub fn addressed_to(&self, player: PlayerId) -> bool {
        player != self.from && self.to.map_or(true, |to| to == player)
    }
}

/// Events that occur as a result of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    DiceRolled {
        player: PlayerId,
        roll: (u8, u8),
        total: u8,
    },

    /// Resources paid out for a roll
    ResourcesProduced {
        production: BTreeMap<PlayerId, ResourceHand>,
    },

    /// The bank could not cover these resources, so nobody received them
    ProductionWithheld { resources: Vec<Resource> },

    /// Second setup settlement income
    StartingResources {
        player: PlayerId,
        resources: ResourceHand,
    },

    SettlementBuilt {
        player: PlayerId,
        location: IntersectionCoord,
    },

    CityBuilt {
        player: PlayerId,
        location: IntersectionCoord,
    },

    RoadBuilt {
        player: PlayerId,
        location: EdgeCoord,
    },

    DevelopmentCardBought { player: PlayerId },

    KnightPlayed { player: PlayerId },

    RoadBuildingPlayed { player: PlayerId },

    YearOfPlentyPlayed {
        player: PlayerId,
        resources: (Resource, Resource),
    },

    MonopolyPlayed {
        player: PlayerId,
        resource: Resource,
        total_taken: u32,
    },

    /// Players that must discard after a 7, and how many cards each
    DiscardRequired { pending: BTreeMap<PlayerId, u32> },

    CardsDiscarded { player: PlayerId, count: u32 },

    RobberMoved {
        player: PlayerId,
        from: HexCoord,
        to: HexCoord,
    },

    /// `resource` is `None` when the victim had nothing to steal
    ResourceStolen {
        thief: PlayerId,
        victim: PlayerId,
        resource: Option<Resource>,
    },

    BankTrade {
        player: PlayerId,
        gave: Resource,
        gave_count: u32,
        received: Resource,
        received_count: u32,
    },

    TradeProposed { offer: TradeOffer },

    TradeCompleted { from: PlayerId, to: PlayerId },

    TradeDeclined { player: PlayerId },

    /// Withdrawn by the proposer or declined by everyone it was offered to
    TradeCancelled,

    LongestRoadChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        length: u32,
    },

    LargestArmyChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        knights: u32,
    },

    PhaseChanged { phase: Phase },

    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    GameWon {
        player: PlayerId,
        victory_points: u32,
    },
}
