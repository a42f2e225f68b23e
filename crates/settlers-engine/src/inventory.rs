//! Resource and development card holdings.
//!
//! The same [`Inventory`] shape is used for every seat and for the bank. Only
//! [`crate::resources::ResourceEngine`] mutates inventories during a game.

use crate::rules::{DeckComposition, Rules};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five tradeable resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    Brick,
    Lumber,
    Ore,
    Grain,
    Wool,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Ore,
        Resource::Grain,
        Resource::Wool,
    ];
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Brick => "brick",
            Resource::Lumber => "lumber",
            Resource::Ore => "ore",
            Resource::Grain => "grain",
            Resource::Wool => "wool",
        };
        f.write_str(name)
    }
}

/// Counts of each resource type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHand {
    pub brick: u32,
    pub lumber: u32,
    pub ore: u32,
    pub grain: u32,
    pub wool: u32,
}

impl ResourceHand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amounts(brick: u32, lumber: u32, ore: u32, grain: u32, wool: u32) -> Self {
        Self {
            brick,
            lumber,
            ore,
            grain,
            wool,
        }
    }

    /// A hand holding `amount` of a single resource
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    /// `amount` of every resource
    pub fn uniform(amount: u32) -> Self {
        Self::with_amounts(amount, amount, amount, amount, amount)
    }

    pub fn total(&self) -> u32 {
        self.brick + self.lumber + self.ore + self.grain + self.wool
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Brick => self.brick,
            Resource::Lumber => self.lumber,
            Resource::Ore => self.ore,
            Resource::Grain => self.grain,
            Resource::Wool => self.wool,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Brick => &mut self.brick,
            Resource::Lumber => &mut self.lumber,
            Resource::Ore => &mut self.ore,
            Resource::Grain => &mut self.grain,
            Resource::Wool => &mut self.wool,
        }
    }

    pub fn set(&mut self, resource: Resource, count: u32) {
        *self.slot(resource) = count;
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        *self.slot(resource) += amount;
    }

    pub fn add_hand(&mut self, other: &ResourceHand) {
        for resource in Resource::ALL {
            self.add(resource, other.get(resource));
        }
    }

    /// Whether every count in `other` is covered by this hand
    pub fn contains(&self, other: &ResourceHand) -> bool {
        Resource::ALL
            .iter()
            .all(|&r| self.get(r) >= other.get(r))
    }

    /// Remove `amount` of one resource; `false` and unchanged if short
    pub fn try_remove(&mut self, resource: Resource, amount: u32) -> bool {
        let slot = self.slot(resource);
        match slot.checked_sub(amount) {
            Some(left) => {
                *slot = left;
                true
            }
            None => false,
        }
    }

    /// Remove a whole hand; `false` and unchanged if short of anything
    pub fn try_subtract(&mut self, cost: &ResourceHand) -> bool {
        if !self.contains(cost) {
            return false;
        }
        for resource in Resource::ALL {
            *self.slot(resource) -= cost.get(resource);
        }
        true
    }

    /// Take every unit of `resource`, leaving zero
    pub fn take_all(&mut self, resource: Resource) -> u32 {
        std::mem::take(self.slot(resource))
    }

    /// Non-zero entries in `Resource::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::ALL
            .into_iter()
            .map(|r| (r, self.get(r)))
            .filter(|(_, n)| *n > 0)
    }
}

impl FromIterator<(Resource, u32)> for ResourceHand {
    fn from_iter<T: IntoIterator<Item = (Resource, u32)>>(iter: T) -> Self {
        let mut hand = ResourceHand::new();
        for (resource, amount) in iter {
            hand.add(resource, amount);
        }
        hand
    }
}

/// Development card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DevelopmentCard {
    /// Move the robber; counts toward largest army
    Knight,
    /// Two free roads
    RoadBuilding,
    /// Two resources of choice from the bank
    YearOfPlenty,
    /// Every other player hands over one resource type
    Monopoly,
    /// Worth one point, never played
    VictoryPoint,
}

impl DevelopmentCard {
    pub const ALL: [DevelopmentCard; 5] = [
        DevelopmentCard::Knight,
        DevelopmentCard::RoadBuilding,
        DevelopmentCard::YearOfPlenty,
        DevelopmentCard::Monopoly,
        DevelopmentCard::VictoryPoint,
    ];

    pub fn is_playable(&self) -> bool {
        !matches!(self, DevelopmentCard::VictoryPoint)
    }
}

/// Development card counts by type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHand {
    pub knight: u32,
    pub road_building: u32,
    pub year_of_plenty: u32,
    pub monopoly: u32,
    pub victory_point: u32,
}

impl CardHand {
    pub fn get(&self, card: DevelopmentCard) -> u32 {
        match card {
            DevelopmentCard::Knight => self.knight,
            DevelopmentCard::RoadBuilding => self.road_building,
            DevelopmentCard::YearOfPlenty => self.year_of_plenty,
            DevelopmentCard::Monopoly => self.monopoly,
            DevelopmentCard::VictoryPoint => self.victory_point,
        }
    }

    fn slot(&mut self, card: DevelopmentCard) -> &mut u32 {
        match card {
            DevelopmentCard::Knight => &mut self.knight,
            DevelopmentCard::RoadBuilding => &mut self.road_building,
            DevelopmentCard::YearOfPlenty => &mut self.year_of_plenty,
            DevelopmentCard::Monopoly => &mut self.monopoly,
            DevelopmentCard::VictoryPoint => &mut self.victory_point,
        }
    }

    pub fn add(&mut self, card: DevelopmentCard, amount: u32) {
        *self.slot(card) += amount;
    }

    pub fn try_remove(&mut self, card: DevelopmentCard) -> bool {
        let slot = self.slot(card);
        match slot.checked_sub(1) {
            Some(left) => {
                *slot = left;
                true
            }
            None => false,
        }
    }

    pub fn total(&self) -> u32 {
        DevelopmentCard::ALL.iter().map(|&c| self.get(c)).sum()
    }

    pub fn from_deck(deck: &DeckComposition) -> Self {
        Self {
            knight: deck.knight,
            road_building: deck.road_building,
            year_of_plenty: deck.year_of_plenty,
            monopoly: deck.monopoly,
            victory_point: deck.victory_point,
        }
    }
}

/// Holdings of one seat, or of the bank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub resources: ResourceHand,
    /// Cards that may be played (or counted, for victory points)
    pub cards: CardHand,
    /// Cards bought this turn; not playable until the turn ends
    pub fresh_cards: CardHand,
    pub knights_played: u32,
    pub longest_road: bool,
    pub largest_army: bool,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bank's starting stock
    pub fn bank(rules: &Rules) -> Self {
        Self {
            resources: ResourceHand::uniform(rules.bank_stock),
            cards: CardHand::from_deck(&rules.deck),
            ..Self::default()
        }
    }

    /// Every development card held, playable or not
    pub fn card_count(&self, card: DevelopmentCard) -> u32 {
        self.cards.get(card) + self.fresh_cards.get(card)
    }

    pub fn victory_point_cards(&self) -> u32 {
        self.card_count(DevelopmentCard::VictoryPoint)
    }

    /// Move cards bought this turn into the playable pile
    pub fn release_fresh_cards(&mut self) {
        for card in DevelopmentCard::ALL {
            let n = self.fresh_cards.get(card);
            self.cards.add(card, n);
        }
        self.fresh_cards = CardHand::default();
    }
}
