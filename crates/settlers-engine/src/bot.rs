//! AI stand-ins for empty seats.
//!
//! Bots pick from [`Game::legal_actions`], so anything they choose passes the
//! same validation a human action does. Difficulty levels:
//! - Easy: any legal action
//! - Medium: basic heuristics (roll first, build settlements on good corners)
//! - Hard: plans toward cities, trades with the bank for what it is missing

use crate::actions::GameAction;
use crate::game::{Game, Phase};
use crate::hex::{EdgeCoord, HexCoord, IntersectionCoord};
use crate::inventory::{Resource, ResourceHand};
use crate::map::Hex;
use crate::player::{BotDifficulty, PlayerId};
use crate::rules::costs;
use rand::prelude::*;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Expected rolls out of 36 for a number token
pub fn pips(token: u8) -> i32 {
    match token {
        2..=12 => 6 - (7 - token as i32).abs(),
        _ => 0,
    }
}

/// A bot player that can decide on actions
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    rng: StdRng,
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next action for this seat, or `None` when the game isn't waiting on it
    pub fn choose_action(&mut self, game: &Game) -> Option<GameAction> {
        if let Phase::Discard { pending } = game.phase() {
            return pending
                .get(&self.player_id)
                .map(|&owed| GameAction::Discard(bot_discard(game, self.player_id, owed)));
        }

        let valid_actions = game.legal_actions(self.player_id);
        if valid_actions.is_empty() {
            return None;
        }

        match self.difficulty {
            BotDifficulty::Easy => self.choose_easy(&valid_actions),
            BotDifficulty::Medium => self.choose_medium(game, &valid_actions),
            BotDifficulty::Hard => self.choose_hard(game, &valid_actions),
        }
    }

    /// Easy: Just pick a random valid action
    fn choose_easy(&mut self, actions: &[GameAction]) -> Option<GameAction> {
        actions.choose(&mut self.rng).cloned()
    }

    /// Actions of one kind, by reference
    fn of_kind<'a>(actions: &'a [GameAction], kind: fn(&GameAction) -> bool) -> Vec<&'a GameAction> {
        actions.iter().filter(|a| kind(a)).collect()
    }

    /// Moves every difficulty above Easy handles the same way
    fn choose_common(&mut self, game: &Game, actions: &[GameAction]) -> Option<GameAction> {
        if actions.contains(&GameAction::RollDice) {
            return Some(GameAction::RollDice);
        }

        let settlements = Self::of_kind(actions, |a| matches!(a, GameAction::PlaceSetupSettlement(_)));
        if !settlements.is_empty() {
            return self.rank_settlement_spots(game, &settlements).cloned();
        }

        let roads = Self::of_kind(actions, |a| matches!(a, GameAction::PlaceSetupRoad(_)));
        if !roads.is_empty() {
            return self.rank_road_spots(game, &roads).cloned();
        }

        let robber = Self::of_kind(actions, |a| matches!(a, GameAction::MoveRobber { .. }));
        if !robber.is_empty() {
            return self.rank_robber_spots(game, &robber).cloned();
        }

        if actions.contains(&GameAction::DeclineTrade) {
            return Some(self.answer_trade(game, actions));
        }
        None
    }

    /// Medium: Use basic heuristics
    fn choose_medium(&mut self, game: &Game, actions: &[GameAction]) -> Option<GameAction> {
        if let Some(action) = self.choose_common(game, actions) {
            return Some(action);
        }

        let build_settlements = Self::of_kind(actions, |a| matches!(a, GameAction::BuildSettlement(_)));
        if !build_settlements.is_empty() {
            return self.rank_settlement_spots(game, &build_settlements).cloned();
        }

        let cities = Self::of_kind(actions, |a| matches!(a, GameAction::UpgradeToCity(_)));
        if !cities.is_empty() {
            return cities.choose(&mut self.rng).map(|a| (*a).clone());
        }

        // Build roads with 30% chance
        let road_builds = Self::of_kind(actions, |a| matches!(a, GameAction::BuildRoad(_)));
        if !road_builds.is_empty() && self.rng.gen_bool(0.3) {
            return road_builds.choose(&mut self.rng).map(|a| (*a).clone());
        }

        // Buy dev cards with 20% chance
        if actions.contains(&GameAction::BuyDevelopmentCard) && self.rng.gen_bool(0.2) {
            return Some(GameAction::BuyDevelopmentCard);
        }

        if actions.contains(&GameAction::EndTurn) {
            return Some(GameAction::EndTurn);
        }
        actions.choose(&mut self.rng).cloned()
    }

    /// Hard: Strategic planning
    fn choose_hard(&mut self, game: &Game, actions: &[GameAction]) -> Option<GameAction> {
        if let Some(action) = self.choose_common(game, actions) {
            return Some(action);
        }
        let me = self.player_id;
        let board = game.board();
        let knights = game
            .resources()
            .inventory(me)
            .map_or(0, |inv| inv.knights_played);

        // Knight early when the robber sits on our own corner
        let blocked = game
            .map()
            .intersections_of_hex(game.map().robber_position())
            .into_iter()
            .any(|c| game.map().building(c).owner() == Some(me));
        if actions.contains(&GameAction::PlayKnight) && (blocked || knights >= 2) {
            return Some(GameAction::PlayKnight);
        }
        if game.phase() != &Phase::Main {
            return actions.first().cloned();
        }

        // Build priority: City > Settlement > Road
        let cities = Self::of_kind(actions, |a| matches!(a, GameAction::UpgradeToCity(_)));
        if !cities.is_empty() {
            return self.rank_settlement_spots(game, &cities).cloned();
        }

        let build_settlements = Self::of_kind(actions, |a| matches!(a, GameAction::BuildSettlement(_)));
        if !build_settlements.is_empty() {
            return self.rank_settlement_spots_advanced(game, &build_settlements).cloned();
        }

        if let Some(card) = actions
            .iter()
            .find(|a| matches!(a, GameAction::PlayMonopoly(_) | GameAction::PlayYearOfPlenty(..)))
        {
            return Some(self.pick_progress_card(game, actions, card));
        }

        // Roads toward expansion, only while few are out
        let road_builds = Self::of_kind(
            actions,
            |a| matches!(a, GameAction::BuildRoad(_) | GameAction::PlayRoadBuilding { .. }),
        );
        let no_open_spot = board
            .placeable_settlements(me, crate::management::PlacementMode::Normal)
            .is_empty();
        if !road_builds.is_empty() && board.roads_of(me).len() < 8 && no_open_spot {
            return self.rank_road_spots(game, &road_builds).cloned();
        }

        if let Some(trade) = self.bank_trade_toward_goal(game, actions) {
            return Some(trade);
        }

        if actions.contains(&GameAction::BuyDevelopmentCard) && self.rng.gen_bool(0.35) {
            return Some(GameAction::BuyDevelopmentCard);
        }

        if actions.contains(&GameAction::EndTurn) {
            return Some(GameAction::EndTurn);
        }
        actions.choose(&mut self.rng).cloned()
    }

    /// Accept when we give no more than we get
    fn answer_trade(&mut self, game: &Game, actions: &[GameAction]) -> GameAction {
        let acceptable = game.pending_trade().is_some_and(|offer| match self.difficulty {
            BotDifficulty::Easy => self.rng.gen_bool(0.5),
            _ => offer.request.total() <= offer.offer.total(),
        });
        if acceptable && actions.contains(&GameAction::AcceptTrade) {
            GameAction::AcceptTrade
        } else {
            GameAction::DeclineTrade
        }
    }

    /// Monopoly or Year of Plenty on what we need most
    fn pick_progress_card(&self, game: &Game, actions: &[GameAction], fallback: &GameAction) -> GameAction {
        let needed = self.most_needed(game);
        actions
            .iter()
            .find(|a| match a {
                GameAction::PlayYearOfPlenty(first, second) => *first == needed && *second == needed,
                GameAction::PlayMonopoly(r) => *r == needed,
                _ => false,
            })
            .unwrap_or(fallback)
            .clone()
    }

    /// The resource missing most for a city, or a settlement when no city
    /// spot is open
    fn most_needed(&self, game: &Game) -> Resource {
        let hand = game
            .resources()
            .inventory(self.player_id)
            .map(|inv| inv.resources)
            .unwrap_or_default();
        let goal = if game.board().settlements_of(self.player_id).is_empty() {
            costs::settlement()
        } else {
            costs::city()
        };
        Resource::ALL
            .into_iter()
            .max_by_key(|r| goal.get(*r).saturating_sub(hand.get(*r)))
            .unwrap_or(Resource::Ore)
    }

    /// Bank trade that brings us toward the next city or settlement without
    /// spending what that build needs
    fn bank_trade_toward_goal(&self, game: &Game, actions: &[GameAction]) -> Option<GameAction> {
        let hand = game.resources().inventory(self.player_id).ok()?.resources;
        let needed = self.most_needed(game);
        if hand.get(needed) >= costs::city().get(needed) {
            return None;
        }
        let keep: ResourceHand = costs::city();
        actions
            .iter()
            .find(|a| match a {
                GameAction::TradeWithBank { give, amount, want } => {
                    *want == needed && hand.get(*give).saturating_sub(*amount) >= keep.get(*give)
                }
                _ => false,
            })
            .cloned()
    }

    /// Rank settlement spots by tile value
    fn rank_settlement_spots<'a>(&mut self, game: &Game, actions: &[&'a GameAction]) -> Option<&'a GameAction> {
        let mut scored: Vec<_> = actions
            .iter()
            .map(|action| {
                let score = match action {
                    GameAction::PlaceSetupSettlement(v)
                    | GameAction::BuildSettlement(v)
                    | GameAction::UpgradeToCity(v) => self.score_intersection(game, *v),
                    _ => 0,
                };
                (*action, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));

        // Pick from top 3 with some randomness
        let top = scored.iter().take(3).collect::<Vec<_>>();
        top.choose(&mut self.rng).map(|(a, _)| *a)
    }

    /// Advanced settlement ranking with resource diversity
    fn rank_settlement_spots_advanced<'a>(
        &mut self,
        game: &Game,
        actions: &[&'a GameAction],
    ) -> Option<&'a GameAction> {
        let held: HashSet<Resource> = game
            .board()
            .settlements_of(self.player_id)
            .into_iter()
            .chain(game.board().cities_of(self.player_id))
            .flat_map(|c| Self::intersection_resources(game, c))
            .collect();

        let mut scored: Vec<_> = actions
            .iter()
            .map(|action| {
                let score = match action {
                    GameAction::BuildSettlement(v) | GameAction::PlaceSetupSettlement(v) => {
                        let resources = Self::intersection_resources(game, *v);
                        let unique: HashSet<_> = resources.iter().collect();
                        let fresh = unique.iter().filter(|r| !held.contains(r)).count() as i32;
                        self.score_intersection(game, *v) + unique.len() as i32 * 3 + fresh * 5
                    }
                    _ => 0,
                };
                (*action, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));

        // Pick best with small chance for second best
        if scored.len() >= 2 && self.rng.gen_bool(0.1) {
            Some(scored[1].0)
        } else {
            scored.first().map(|(a, _)| *a)
        }
    }

    /// Sum of pips around a corner
    fn score_intersection(&self, game: &Game, at: IntersectionCoord) -> i32 {
        game.map()
            .hexes_of_intersection(at)
            .into_iter()
            .filter_map(|h| game.map().hex(h).and_then(Hex::production))
            .map(|(_, token)| pips(token))
            .sum()
    }

    fn intersection_resources(game: &Game, at: IntersectionCoord) -> Vec<Resource> {
        game.map()
            .hexes_of_intersection(at)
            .into_iter()
            .filter_map(|h| game.map().hex(h).and_then(Hex::production))
            .map(|(resource, _)| resource)
            .collect()
    }

    /// Rank road spots for expansion potential
    fn rank_road_spots<'a>(&mut self, game: &Game, actions: &[&'a GameAction]) -> Option<&'a GameAction> {
        let mut scored: Vec<_> = actions
            .iter()
            .map(|action| {
                let score = match action {
                    GameAction::PlaceSetupRoad(e)
                    | GameAction::BuildRoad(e)
                    | GameAction::PlayRoadBuilding { first: e, .. } => self.score_edge_expansion(game, *e),
                    _ => 0,
                };
                (*action, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        let best = scored.first().map(|(_, s)| *s)?;
        let ties: Vec<_> = scored.iter().take_while(|(_, s)| *s == best).collect();
        ties.choose(&mut self.rng).map(|(a, _)| *a)
    }

    /// Best open corner the road leads to
    fn score_edge_expansion(&self, game: &Game, edge: EdgeCoord) -> i32 {
        let map = game.map();
        edge.endpoints()
            .into_iter()
            .filter(|end| map.intersection(*end).is_some())
            .filter(|end| {
                map.building(*end).is_free()
                    && map
                        .neighbours_of_intersection(*end)
                        .iter()
                        .all(|n| map.building(*n).is_free())
            })
            .map(|end| self.score_intersection(game, end))
            .max()
            .unwrap_or(0)
    }

    /// Rank robber spots to hurt opponents
    fn rank_robber_spots<'a>(&mut self, game: &Game, actions: &[&'a GameAction]) -> Option<&'a GameAction> {
        let mut scored: Vec<_> = actions
            .iter()
            .map(|action| {
                let score = match action {
                    GameAction::MoveRobber { to, victim } => self.score_robber_spot(game, *to, *victim),
                    _ => 0,
                };
                (*action, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.first().map(|(a, _)| *a)
    }

    fn score_robber_spot(&self, game: &Game, hex: HexCoord, victim: Option<PlayerId>) -> i32 {
        let map = game.map();
        let Some(tile) = map.hex(hex) else {
            return -100;
        };
        let value = tile.production().map_or(0, |(_, token)| pips(token));

        // Prefer tiles with opponent buildings, avoid our own
        let mut score = 0;
        for corner in map.intersections_of_hex(hex) {
            let building = map.building(corner);
            match building.owner() {
                Some(owner) if owner == self.player_id => score -= 20,
                Some(_) => score += value * building.yield_multiplier() as i32,
                None => {}
            }
        }

        if let Some(victim) = victim {
            let hand = game.resources().hand_size(victim) as i32;
            score += hand;
            if self.difficulty == BotDifficulty::Hard {
                let board = game.board();
                let visible = board.settlements_of(victim).len() + 2 * board.cities_of(victim).len();
                score += visible as i32 * 3;
            }
        }
        score
    }
}

/// Cards to give up after a 7: from the largest piles first, ties going to
/// the resource listed first
pub fn bot_discard(game: &Game, player_id: PlayerId, owed: u32) -> ResourceHand {
    let Ok(inventory) = game.resources().inventory(player_id) else {
        return ResourceHand::new();
    };
    let mut remaining = inventory.resources;
    let mut discard = ResourceHand::new();

    for _ in 0..owed {
        let Some((resource, count)) = remaining
            .iter()
            .max_by_key(|(resource, count)| (*count, Reverse(*resource)))
        else {
            break;
        };
        if count == 0 {
            break;
        }
        remaining.try_remove(resource, 1);
        discard.add(resource, 1);
    }
    discard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use crate::player::Actor;
    use crate::rules::Rules;

    fn bot_game(difficulty: BotDifficulty) -> Game {
        let actors = vec![Actor::bot(0, difficulty), Actor::bot(1, difficulty)];
        Game::new(actors, &Configuration::beginner(), Rules::default(), 7).unwrap()
    }

    fn complete_setup(game: &mut Game, bots: &mut [Bot]) {
        while matches!(game.phase(), Phase::Setup { .. }) {
            let current = game.current_player();
            let action = bots[current as usize].choose_action(game).unwrap();
            game.apply_action(current, action).unwrap();
        }
    }

    #[test]
    fn test_pips() {
        assert_eq!(pips(6), 5);
        assert_eq!(pips(8), 5);
        assert_eq!(pips(2), 1);
        assert_eq!(pips(12), 1);
        assert_eq!(pips(7), 6);
        assert_eq!(pips(0), 0);
    }

    #[test]
    fn test_bot_creation() {
        let bot = Bot::new(0, BotDifficulty::Easy);
        assert_eq!(bot.player_id, 0);
        assert_eq!(bot.difficulty, BotDifficulty::Easy);
    }

    #[test]
    fn test_easy_bot_chooses_action() {
        let game = bot_game(BotDifficulty::Easy);
        let mut bot = Bot::with_seed(0, BotDifficulty::Easy, 1);
        assert!(bot.choose_action(&game).is_some());

        let mut idle = Bot::with_seed(1, BotDifficulty::Easy, 1);
        assert!(idle.choose_action(&game).is_none(), "not this seat's turn");
    }

    #[test]
    fn test_medium_bot_prioritizes_roll() {
        let mut game = bot_game(BotDifficulty::Medium);
        let mut bots = [
            Bot::with_seed(0, BotDifficulty::Medium, 1),
            Bot::with_seed(1, BotDifficulty::Medium, 2),
        ];
        complete_setup(&mut game, &mut bots);
        assert_eq!(game.phase(), &Phase::Roll);
        assert_eq!(bots[0].choose_action(&game), Some(GameAction::RollDice));
    }

    #[test]
    fn test_setup_picks_productive_corner() {
        let game = bot_game(BotDifficulty::Hard);
        let mut bot = Bot::with_seed(0, BotDifficulty::Hard, 3);
        let Some(GameAction::PlaceSetupSettlement(at)) = bot.choose_action(&game) else {
            panic!("expected a setup settlement");
        };
        let mut scores: Vec<i32> = game
            .legal_actions(0)
            .into_iter()
            .filter_map(|a| match a {
                GameAction::PlaceSetupSettlement(c) => Some(bot.score_intersection(&game, c)),
                _ => None,
            })
            .collect();
        scores.sort_by(|a, b| b.cmp(a));
        assert!(bot.score_intersection(&game, at) >= scores[2], "one of the top three");
    }

    #[test]
    fn test_discard_logic() {
        let mut game = bot_game(BotDifficulty::Easy);
        assert_eq!(bot_discard(&game, 0, 0).total(), 0);

        game.grant_from_bank(0, &ResourceHand::with_amounts(5, 1, 0, 2, 0)).unwrap();
        let discard = bot_discard(&game, 0, 4);
        assert_eq!(discard.total(), 4);
        assert_eq!(discard.brick, 4, "largest pile goes first");

        // brick and grain tie at two after three cards; brick is taken first
        let mut tied = bot_game(BotDifficulty::Easy);
        tied.grant_from_bank(1, &ResourceHand::with_amounts(2, 0, 0, 2, 1)).unwrap();
        assert_eq!(bot_discard(&tied, 1, 2), ResourceHand::with_amounts(1, 0, 0, 1, 0));
        assert_eq!(bot_discard(&tied, 1, 1), ResourceHand::single(Resource::Brick, 1));
    }
}
