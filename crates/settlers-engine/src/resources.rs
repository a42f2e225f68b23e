//! Bank and player inventories.
//!
//! [`ResourceEngine`] owns every [`Inventory`] in a game and is the only code
//! that moves resources or development cards. Each operation validates both
//! sides before touching either, so a rejected call changes nothing, and no
//! operation creates or destroys resources: everything moves between the bank
//! and the players.

use crate::error::GameError;
use crate::inventory::{DevelopmentCard, Inventory, Resource, ResourceHand};
use crate::management::MapManagement;
use crate::map::HarborKind;
use crate::player::PlayerId;
use crate::rules::Rules;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Result of distributing one dice roll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub per_player: BTreeMap<PlayerId, ResourceHand>,
    /// Resources nobody received because the bank could not cover the demand
    pub withheld: Vec<Resource>,
}

impl Production {
    pub fn total(&self) -> u32 {
        self.per_player.values().map(ResourceHand::total).sum()
    }
}

const DEFAULT_RATIO: u32 = 4;

#[derive(Debug, Clone)]
pub struct ResourceEngine {
    pub(crate) bank: Inventory,
    pub(crate) players: BTreeMap<PlayerId, Inventory>,
    initial_stock: ResourceHand,
}

impl ResourceEngine {
    pub fn new(players: impl IntoIterator<Item = PlayerId>, rules: &Rules) -> Self {
        let bank = Inventory::bank(rules);
        Self {
            initial_stock: bank.resources,
            bank,
            players: players.into_iter().map(|p| (p, Inventory::new())).collect(),
        }
    }

    pub fn bank(&self) -> &Inventory {
        &self.bank
    }

    pub fn inventory(&self, player: PlayerId) -> Result<&Inventory, GameError> {
        self.players.get(&player).ok_or(GameError::UnknownPlayer(player))
    }

    fn inventory_mut(&mut self, player: PlayerId) -> Result<&mut Inventory, GameError> {
        self.players
            .get_mut(&player)
            .ok_or(GameError::UnknownPlayer(player))
    }

    pub fn inventories(&self) -> &BTreeMap<PlayerId, Inventory> {
        &self.players
    }

    /// Resource cards held by `player`, 0 for unknown seats
    pub fn hand_size(&self, player: PlayerId) -> u32 {
        self.players
            .get(&player)
            .map_or(0, |i| i.resources.total())
    }

    /// Bank plus every hand equals the starting stock, per resource
    pub fn conservation_holds(&self) -> bool {
        Resource::ALL.iter().all(|&r| {
            let held: u32 = self.players.values().map(|i| i.resources.get(r)).sum();
            held + self.bank.resources.get(r) == self.initial_stock.get(r)
        })
    }

    // ==================== Production ====================

    /// Pay out every producing hex whose token is `roll`.
    ///
    /// Hexes under the robber produce nothing. If the bank cannot cover the
    /// whole demand for a resource, nobody receives that resource.
    pub fn produce_for_roll(&mut self, roll: u8, board: &MapManagement) -> Production {
        let map = board.map();
        let mut demand: BTreeMap<Resource, BTreeMap<PlayerId, u32>> = BTreeMap::new();
        for hex in map.land_hexes().filter(|h| !h.robber) {
            let Some((resource, token)) = hex.production() else {
                continue;
            };
            if token != roll {
                continue;
            }
            for corner in map.intersections_of_hex(hex.coord) {
                let building = map.building(corner);
                if let Some(owner) = building.owner() {
                    *demand.entry(resource).or_default().entry(owner).or_default() +=
                        building.yield_multiplier();
                }
            }
        }

        let mut production = Production::default();
        for (resource, claims) in demand {
            let total: u32 = claims.values().sum();
            if total > self.bank.resources.get(resource) {
                debug!(%resource, total, "bank short, production withheld");
                production.withheld.push(resource);
                continue;
            }
            for (owner, amount) in claims {
                if !self.players.contains_key(&owner) {
                    continue;
                }
                self.bank.resources.try_remove(resource, amount);
                if let Some(inventory) = self.players.get_mut(&owner) {
                    inventory.resources.add(resource, amount);
                }
                production
                    .per_player
                    .entry(owner)
                    .or_default()
                    .add(resource, amount);
            }
        }
        production
    }

    /// Give `player` up to `hand` from the bank, capped per resource by stock
    pub fn grant(&mut self, player: PlayerId, hand: &ResourceHand) -> Result<ResourceHand, GameError> {
        self.inventory(player)?;
        let granted: ResourceHand = hand
            .iter()
            .map(|(r, n)| (r, n.min(self.bank.resources.get(r))))
            .collect();
        self.bank.resources.try_subtract(&granted);
        self.inventory_mut(player)?.resources.add_hand(&granted);
        Ok(granted)
    }

    /// Pay `cost` to the bank
    pub fn pay(&mut self, player: PlayerId, cost: &ResourceHand) -> Result<(), GameError> {
        let inventory = self.inventory_mut(player)?;
        if !inventory.resources.try_subtract(cost) {
            return Err(GameError::InsufficientResources);
        }
        self.bank.resources.add_hand(cost);
        Ok(())
    }

    pub fn can_afford(&self, player: PlayerId, cost: &ResourceHand) -> bool {
        self.players
            .get(&player)
            .is_some_and(|i| i.resources.contains(cost))
    }

    // ==================== Trading ====================

    /// Best bank ratio for giving away `give`: 4, 3 with any generic harbor,
    /// 2 with a harbor for `give`
    pub fn trade_ratio(&self, player: PlayerId, give: Resource, board: &MapManagement) -> u32 {
        board
            .harbors_of(player)
            .into_iter()
            .map(|h| match h {
                HarborKind::Generic => h.ratio(),
                HarborKind::Specific(r) if r == give => h.ratio(),
                HarborKind::Specific(_) => DEFAULT_RATIO,
            })
            .min()
            .unwrap_or(DEFAULT_RATIO)
    }

    /// Trade `give_amount` of `give` for `give_amount / ratio` of `want`.
    /// Returns how many `want` the player received.
    pub fn trade_with_bank(
        &mut self,
        player: PlayerId,
        give: Resource,
        give_amount: u32,
        want: Resource,
        board: &MapManagement,
    ) -> Result<u32, GameError> {
        if give == want {
            return Err(GameError::InvalidTrade);
        }
        let ratio = self.trade_ratio(player, give, board);
        if give_amount == 0 || give_amount % ratio != 0 {
            return Err(GameError::InvalidRatio { ratio });
        }
        let received = give_amount / ratio;
        if self.inventory(player)?.resources.get(give) < give_amount
            || self.bank.resources.get(want) < received
        {
            return Err(GameError::InsufficientResources);
        }

        let inventory = self.inventory_mut(player)?;
        inventory.resources.try_remove(give, give_amount);
        inventory.resources.add(want, received);
        self.bank.resources.add(give, give_amount);
        self.bank.resources.try_remove(want, received);
        debug!(player, %give, give_amount, %want, received, ratio, "bank trade");
        Ok(received)
    }

    /// Swap `offer` (from `offerer`) for `request` (from `receiver`) in one step
    pub fn trade_with_player(
        &mut self,
        offerer: PlayerId,
        receiver: PlayerId,
        offer: &ResourceHand,
        request: &ResourceHand,
    ) -> Result<(), GameError> {
        if offerer == receiver || offer.is_empty() || request.is_empty() {
            return Err(GameError::InvalidTrade);
        }
        if !self.inventory(offerer)?.resources.contains(offer)
            || !self.inventory(receiver)?.resources.contains(request)
        {
            return Err(GameError::InsufficientResources);
        }
        let from = self.inventory_mut(offerer)?;
        from.resources.try_subtract(offer);
        from.resources.add_hand(request);
        let to = self.inventory_mut(receiver)?;
        to.resources.try_subtract(request);
        to.resources.add_hand(offer);
        debug!(offerer, receiver, "player trade");
        Ok(())
    }

    // ==================== Robber ====================

    /// Cards `player` must give up on a 7: half the hand, rounded down, when
    /// the hand is larger than `threshold`
    pub fn robber_tax(&self, player: PlayerId, threshold: u32) -> u32 {
        let total = self.hand_size(player);
        if total > threshold {
            total / 2
        } else {
            0
        }
    }

    /// Return exactly `required` chosen cards to the bank
    pub fn discard(&mut self, player: PlayerId, hand: &ResourceHand, required: u32) -> Result<(), GameError> {
        if required == 0 || hand.total() != required {
            return Err(GameError::InvalidDiscard);
        }
        let inventory = self.inventory_mut(player)?;
        if !inventory.resources.try_subtract(hand) {
            return Err(GameError::InvalidDiscard);
        }
        self.bank.resources.add_hand(hand);
        Ok(())
    }

    /// Move one resource from `victim` to `thief`, choosing uniformly among
    /// the resource types the victim holds. `None` if the victim has nothing.
    pub fn steal_random<R: Rng>(&mut self, thief: PlayerId, victim: PlayerId, rng: &mut R) -> Option<Resource> {
        if thief == victim || !self.players.contains_key(&thief) {
            return None;
        }
        let held: Vec<Resource> = self
            .players
            .get(&victim)?
            .resources
            .iter()
            .map(|(r, _)| r)
            .collect();
        let stolen = *held.choose(rng)?;
        self.players.get_mut(&victim)?.resources.try_remove(stolen, 1);
        self.players.get_mut(&thief)?.resources.add(stolen, 1);
        Some(stolen)
    }

    // ==================== Development Cards ====================

    /// Draw from the bank's deck, weighted by remaining counts. The card
    /// cannot be played until the player's next turn.
    pub fn draw_development_card<R: Rng>(&mut self, player: PlayerId, rng: &mut R) -> Result<DevelopmentCard, GameError> {
        self.inventory(player)?;
        let weights = DevelopmentCard::ALL.map(|c| self.bank.cards.get(c));
        let dist = WeightedIndex::new(weights).map_err(|_| GameError::DeckExhausted)?;
        let card = DevelopmentCard::ALL[dist.sample(rng)];
        self.bank.cards.try_remove(card);
        self.inventory_mut(player)?.fresh_cards.add(card, 1);
        Ok(card)
    }

    /// Spend a playable card of kind `card`
    pub fn play_card(&mut self, player: PlayerId, card: DevelopmentCard) -> Result<(), GameError> {
        if !card.is_playable() {
            return Err(GameError::NoSuchCard);
        }
        let inventory = self.inventory_mut(player)?;
        if !inventory.cards.try_remove(card) {
            return Err(GameError::NoSuchCard);
        }
        if card == DevelopmentCard::Knight {
            inventory.knights_played += 1;
        }
        Ok(())
    }

    /// Take every `resource` from the other players; returns the amount taken
    pub fn monopoly(&mut self, player: PlayerId, resource: Resource) -> Result<u32, GameError> {
        self.inventory(player)?;
        let taken: u32 = self
            .players
            .iter_mut()
            .filter(|(id, _)| **id != player)
            .map(|(_, inv)| inv.resources.take_all(resource))
            .sum();
        self.inventory_mut(player)?.resources.add(resource, taken);
        Ok(taken)
    }

    /// Two resources of choice from the bank, all or nothing
    pub fn year_of_plenty(&mut self, player: PlayerId, first: Resource, second: Resource) -> Result<(), GameError> {
        self.inventory(player)?;
        let mut wanted = ResourceHand::single(first, 1);
        wanted.add(second, 1);
        if !self.bank.resources.contains(&wanted) {
            return Err(GameError::InsufficientResources);
        }
        self.bank.resources.try_subtract(&wanted);
        self.inventory_mut(player)?.resources.add_hand(&wanted);
        Ok(())
    }

    /// Cards bought this turn become playable
    pub fn end_turn(&mut self, player: PlayerId) {
        if let Some(inventory) = self.players.get_mut(&player) {
            inventory.release_fresh_cards();
        }
    }

    // ==================== Special Cards ====================

    pub fn set_longest_road_holder(&mut self, holder: Option<PlayerId>) {
        for (id, inventory) in self.players.iter_mut() {
            inventory.longest_road = Some(*id) == holder;
        }
    }

    pub fn set_largest_army_holder(&mut self, holder: Option<PlayerId>) {
        for (id, inventory) in self.players.iter_mut() {
            inventory.largest_army = Some(*id) == holder;
        }
    }

    /// Who should hold largest army: at least `min` knights and strictly more
    /// than the current holder
    pub fn largest_army(&self, holder: Option<PlayerId>, min: u32) -> Option<PlayerId> {
        let held = holder
            .and_then(|h| self.players.get(&h))
            .map_or(0, |i| i.knights_played);
        let challenger = self
            .players
            .iter()
            .filter(|(id, inv)| Some(**id) != holder && inv.knights_played >= min && inv.knights_played > held)
            .max_by_key(|(_, inv)| inv.knights_played)
            .map(|(id, _)| *id);
        challenger.or(holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use crate::hex::{HexCoord, Pole};
    use crate::management::PlacementMode;
    use crate::map::MapModel;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;

    fn setup() -> (ResourceEngine, MapManagement) {
        let rules = Rules::default();
        let engine = ResourceEngine::new(0..3, &rules);
        let board = MapManagement::new(MapModel::build_from(&Configuration::beginner()).unwrap());
        (engine, board)
    }

    fn give(engine: &mut ResourceEngine, player: PlayerId, hand: ResourceHand) {
        assert_eq!(engine.grant(player, &hand).unwrap(), hand);
    }

    #[test]
    fn test_production_settlements_and_city() {
        let (mut engine, mut board) = setup();
        // grain 8 at (0, 1)
        let hex = HexCoord::new(0, 1);
        let [n, _, se, _, sw, _] = hex.intersections();
        board.place_settlement(0, n.into(), PlacementMode::Setup).unwrap();
        board.place_settlement(1, se.into(), PlacementMode::Setup).unwrap();
        board.place_settlement(2, sw.into(), PlacementMode::Setup).unwrap();
        board.upgrade_settlement(2, sw.into()).unwrap();

        let production = engine.produce_for_roll(8, &board);
        assert_eq!(production.per_player[&0].grain, 1);
        assert_eq!(production.per_player[&1].grain, 1);
        assert_eq!(production.per_player[&2].grain, 2);
        assert_eq!(engine.bank().resources.grain, 15);
        assert!(engine.conservation_holds());
    }

    #[test]
    fn test_robber_blocks_production() {
        let (mut engine, mut board) = setup();
        let hex = HexCoord::new(0, 1);
        board
            .place_settlement(0, hex.corner(Pole::North).into(), PlacementMode::Setup)
            .unwrap();
        board.move_robber(hex.into()).unwrap();
        let production = engine.produce_for_roll(8, &board);
        assert_eq!(production.total(), 0);
        assert_eq!(engine.bank().resources.grain, 19);
    }

    #[test]
    fn test_shortage_withholds_even_a_single_claimant() {
        let (mut engine, mut board) = setup();
        let hex = HexCoord::new(0, 1);
        let north = hex.corner(Pole::North);
        board.place_settlement(0, north.into(), PlacementMode::Setup).unwrap();
        board.upgrade_settlement(0, north.into()).unwrap();
        // leave a single grain in the bank
        give(&mut engine, 1, ResourceHand::single(Resource::Grain, 18));

        let production = engine.produce_for_roll(8, &board);
        assert_eq!(production.withheld, vec![Resource::Grain]);
        assert!(production.per_player.is_empty());
        assert_eq!(engine.bank().resources.grain, 1);
    }

    #[test]
    fn test_default_ratio_is_four() {
        let (mut engine, board) = setup();
        give(&mut engine, 0, ResourceHand::single(Resource::Ore, 8));
        assert_eq!(engine.trade_ratio(0, Resource::Ore, &board), 4);
        assert_eq!(
            engine.trade_with_bank(0, Resource::Ore, 6, Resource::Wool, &board),
            Err(GameError::InvalidRatio { ratio: 4 })
        );
        assert_eq!(engine.trade_with_bank(0, Resource::Ore, 8, Resource::Wool, &board), Ok(2));
        assert_eq!(engine.inventory(0).unwrap().resources.wool, 2);
        assert!(engine.conservation_holds());
    }

    #[test]
    fn test_generic_harbor_trade() {
        let (mut engine, mut board) = setup();
        let generic = board
            .map()
            .intersections()
            .find(|i| i.harbor == Some(HarborKind::Generic))
            .map(|i| i.coord)
            .unwrap();
        board.place_settlement(0, generic.into(), PlacementMode::Setup).unwrap();
        give(&mut engine, 0, ResourceHand::single(Resource::Lumber, 6));

        assert_eq!(engine.trade_ratio(0, Resource::Lumber, &board), 3);
        assert_eq!(
            engine.trade_with_bank(0, Resource::Lumber, 4, Resource::Brick, &board),
            Err(GameError::InvalidRatio { ratio: 3 })
        );
        assert_eq!(engine.trade_with_bank(0, Resource::Lumber, 6, Resource::Brick, &board), Ok(2));
        let hand = engine.inventory(0).unwrap().resources;
        assert_eq!(hand, ResourceHand::single(Resource::Brick, 2));
        assert_eq!(engine.bank().resources.brick, 17);
        assert_eq!(engine.bank().resources.lumber, 19);
    }

    #[test]
    fn test_specific_harbor_only_for_its_resource() {
        let (engine, mut board) = setup();
        let ore_port = board
            .map()
            .intersections()
            .find(|i| i.harbor == Some(HarborKind::Specific(Resource::Ore)))
            .map(|i| i.coord)
            .unwrap();
        board.place_settlement(0, ore_port.into(), PlacementMode::Setup).unwrap();
        assert_eq!(engine.trade_ratio(0, Resource::Ore, &board), 2);
        assert_eq!(engine.trade_ratio(0, Resource::Wool, &board), 4);
    }

    #[test]
    fn test_bank_trade_needs_stock_on_both_sides() {
        let (mut engine, board) = setup();
        give(&mut engine, 0, ResourceHand::single(Resource::Ore, 3));
        assert_eq!(
            engine.trade_with_bank(0, Resource::Ore, 4, Resource::Wool, &board),
            Err(GameError::InsufficientResources)
        );
        assert_eq!(
            engine.trade_with_bank(0, Resource::Ore, 4, Resource::Ore, &board),
            Err(GameError::InvalidTrade)
        );
    }

    #[test]
    fn test_player_trade_is_atomic() {
        let (mut engine, _) = setup();
        give(&mut engine, 0, ResourceHand::single(Resource::Brick, 2));
        give(&mut engine, 1, ResourceHand::single(Resource::Wool, 1));

        let offer = ResourceHand::single(Resource::Brick, 2);
        let too_much = ResourceHand::single(Resource::Wool, 2);
        assert_eq!(
            engine.trade_with_player(0, 1, &offer, &too_much),
            Err(GameError::InsufficientResources)
        );
        assert_eq!(engine.inventory(0).unwrap().resources.brick, 2);

        let request = ResourceHand::single(Resource::Wool, 1);
        engine.trade_with_player(0, 1, &offer, &request).unwrap();
        assert_eq!(engine.inventory(0).unwrap().resources, request);
        assert_eq!(engine.inventory(1).unwrap().resources, offer);
    }

    #[test]
    fn test_robber_tax_boundaries() {
        let (mut engine, _) = setup();
        give(&mut engine, 0, ResourceHand::with_amounts(2, 2, 2, 2, 1));
        give(&mut engine, 1, ResourceHand::with_amounts(2, 2, 1, 1, 1));
        assert_eq!(engine.robber_tax(0, 7), 4);
        assert_eq!(engine.robber_tax(1, 7), 0);
    }

    #[test]
    fn test_discard_requires_exact_amount() {
        let (mut engine, _) = setup();
        give(&mut engine, 0, ResourceHand::with_amounts(2, 2, 2, 2, 1));
        let three = ResourceHand::with_amounts(1, 1, 1, 0, 0);
        assert_eq!(engine.discard(0, &three, 4), Err(GameError::InvalidDiscard));
        let not_held = ResourceHand::single(Resource::Wool, 4);
        assert_eq!(engine.discard(0, &not_held, 4), Err(GameError::InvalidDiscard));
        let four = ResourceHand::with_amounts(2, 2, 0, 0, 0);
        engine.discard(0, &four, 4).unwrap();
        assert_eq!(engine.hand_size(0), 5);
        assert!(engine.conservation_holds());
    }

    #[test]
    fn test_steal_from_empty_hand_is_noop() {
        let (mut engine, _) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(engine.steal_random(0, 1, &mut rng), None);
        give(&mut engine, 1, ResourceHand::single(Resource::Ore, 1));
        assert_eq!(engine.steal_random(0, 1, &mut rng), Some(Resource::Ore));
        assert_eq!(engine.hand_size(1), 0);
        assert_eq!(engine.hand_size(0), 1);
    }

    #[test]
    fn test_deck_drains_then_reports_exhausted() {
        let (mut engine, _) = setup();
        let mut rng = StdRng::seed_from_u64(3);
        let mut drawn = Vec::new();
        for _ in 0..25 {
            drawn.push(engine.draw_development_card(0, &mut rng).unwrap());
        }
        assert_eq!(
            engine.draw_development_card(0, &mut rng),
            Err(GameError::DeckExhausted)
        );
        let knights = drawn.iter().filter(|c| **c == DevelopmentCard::Knight).count();
        assert_eq!(knights, 14);
        assert_eq!(engine.inventory(0).unwrap().fresh_cards.total(), 25);
    }

    #[test]
    fn test_fresh_cards_cannot_be_played() {
        let (mut engine, _) = setup();
        let mut rng = StdRng::seed_from_u64(5);
        let card = engine.draw_development_card(0, &mut rng).unwrap();
        assert_eq!(engine.play_card(0, card), Err(GameError::NoSuchCard));
        engine.end_turn(0);
        if card.is_playable() {
            assert_eq!(engine.play_card(0, card), Ok(()));
        } else {
            assert_eq!(engine.play_card(0, card), Err(GameError::NoSuchCard));
        }
    }

    #[test]
    fn test_monopoly_and_year_of_plenty() {
        let (mut engine, _) = setup();
        give(&mut engine, 1, ResourceHand::single(Resource::Wool, 3));
        give(&mut engine, 2, ResourceHand::with_amounts(0, 1, 0, 0, 2));
        assert_eq!(engine.monopoly(0, Resource::Wool), Ok(5));
        assert_eq!(engine.inventory(2).unwrap().resources.lumber, 1);

        engine.year_of_plenty(0, Resource::Ore, Resource::Ore).unwrap();
        assert_eq!(engine.inventory(0).unwrap().resources.ore, 2);

        give(&mut engine, 1, ResourceHand::single(Resource::Brick, 19));
        assert_eq!(
            engine.year_of_plenty(0, Resource::Brick, Resource::Ore),
            Err(GameError::InsufficientResources)
        );
        assert_eq!(engine.inventory(0).unwrap().resources.ore, 2);
        assert!(engine.conservation_holds());
    }

    #[test]
    fn test_largest_army_needs_strictly_more() {
        let (mut engine, _) = setup();
        let knights = |engine: &mut ResourceEngine, player: PlayerId, n: u32| {
            engine.players.get_mut(&player).unwrap().knights_played = n;
        };
        knights(&mut engine, 0, 2);
        assert_eq!(engine.largest_army(None, 3), None);
        knights(&mut engine, 0, 3);
        assert_eq!(engine.largest_army(None, 3), Some(0));
        knights(&mut engine, 1, 3);
        assert_eq!(engine.largest_army(Some(0), 3), Some(0));
        knights(&mut engine, 1, 4);
        assert_eq!(engine.largest_army(Some(0), 3), Some(1));
    }

    #[test]
    fn test_unknown_player_is_rejected() {
        let (mut engine, _) = setup();
        assert_eq!(
            engine.pay(9, &ResourceHand::new()),
            Err(GameError::UnknownPlayer(9))
        );
    }
}
