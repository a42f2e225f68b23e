//! Turn and phase state machine for one game.
//!
//! [`Game`] owns the board, the inventories and the RNG of a single game and
//! is driven entirely through [`Game::apply_action`]. Every action is checked
//! against the current phase and the acting seat first; a rejected action
//! returns a [`GameError`] and leaves the game untouched. After every accepted
//! action the victory check runs, so a win is detected immediately.

use crate::actions::{GameAction, GameEvent, TradeOffer};
use crate::configuration::{Configuration, ConfigurationError};
use crate::error::GameError;
use crate::hex::{EdgeCoord, HexCoord, IntersectionCoord};
use crate::inventory::{CardHand, DevelopmentCard, Resource, ResourceHand};
use crate::management::{MapManagement, PlacementMode};
use crate::map::{Hex, MapModel, MapView};
use crate::player::{Actor, ActorKind, BotDifficulty, PlayerId};
use crate::resources::ResourceEngine;
use crate::rules::{costs, Rules};
use crate::victory::VictoryCalculator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Game phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Opening placements in snake order
    Setup {
        /// 1 going forward, 2 coming back
        round: u8,
        placing: SetupPlacing,
    },

    /// Start of turn: roll (or play a knight first)
    Roll,

    /// Build, trade and play cards until the turn ends
    Main,

    /// After a 7: these players still owe this many cards
    Discard { pending: BTreeMap<PlayerId, u32> },

    /// The current player must move the robber
    Robber { origin: RobberOrigin },

    GameOver { winner: PlayerId },
}

/// What we're placing during setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupPlacing {
    Settlement,
    Road,
}

/// Why the robber is moving, which decides where play resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobberOrigin {
    /// A 7 was rolled; the turn ends once the robber is placed
    SevenRolled,
    /// Knight played before rolling; back to Roll
    KnightBeforeRoll,
    /// Knight played in the main phase; back to Main
    KnightInMain,
}

/// The public turn state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: Phase,
    pub current: PlayerId,
    pub dice: Option<(u8, u8)>,
    pub turn_number: u32,
    pub longest_road: Option<PlayerId>,
    pub largest_army: Option<PlayerId>,
}

impl GameState {
    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase {
            Phase::GameOver { winner } => Some(winner),
            _ => None,
        }
    }
}

/// An open player trade and who has turned it down
#[derive(Debug, Clone, PartialEq, Eq)]
struct TradeState {
    offer: TradeOffer,
    declined: BTreeSet<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Road,
    Settlement,
    City,
}

/// One seat as seen by a particular viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub kind: ActorKind,
    pub resource_count: u32,
    /// Hidden from other seats
    pub resources: Option<ResourceHand>,
    pub development_card_count: u32,
    /// Playable cards; hidden from other seats
    pub development_cards: Option<CardHand>,
    /// Bought this turn; hidden from other seats
    pub fresh_cards: Option<CardHand>,
    pub knights_played: u32,
    pub longest_road: bool,
    pub largest_army: bool,
    pub road_length: u32,
    /// Points everyone can see (no victory point cards)
    pub public_victory_points: u32,
    /// Full score; hidden from other seats until the game ends
    pub victory_points: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankView {
    pub resources: ResourceHand,
    pub development_cards_left: u32,
}

/// Serializable state for broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub state: GameState,
    pub turn_order: Vec<PlayerId>,
    pub map: MapView,
    pub bank: BankView,
    pub players: Vec<PlayerView>,
    pub pending_trade: Option<TradeOffer>,
}

#[derive(Debug, Clone)]
pub struct Game {
    rules: Rules,
    configuration: Configuration,
    actors: Vec<Actor>,
    turn_order: Vec<PlayerId>,
    board: MapManagement,
    resources: ResourceEngine,
    state: GameState,
    /// Placements finished so far, 0..2n
    setup_step: usize,
    /// Settlement the next setup road must touch
    setup_anchor: Option<IntersectionCoord>,
    knight_played: bool,
    card_played: bool,
    trade: Option<TradeState>,
    forced_dice: Option<(u8, u8)>,
    rng: StdRng,
}

impl Game {
    /// Start a game. Seats play in the order given.
    pub fn new(
        actors: Vec<Actor>,
        configuration: &Configuration,
        rules: Rules,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        let turn_order: Vec<PlayerId> = actors.iter().map(|a| a.id).collect();
        let distinct: BTreeSet<PlayerId> = turn_order.iter().copied().collect();
        if !(2..=4).contains(&actors.len()) || distinct.len() != actors.len() {
            return Err(ConfigurationError::PlayerCount(actors.len()));
        }
        let map = MapModel::build_from(configuration)?;
        let resources = ResourceEngine::new(turn_order.iter().copied(), &rules);
        info!(players = actors.len(), seed, "game created");

        Ok(Self {
            state: GameState {
                phase: Phase::Setup {
                    round: 1,
                    placing: SetupPlacing::Settlement,
                },
                current: turn_order[0],
                dice: None,
                turn_number: 0,
                longest_road: None,
                largest_army: None,
            },
            rules,
            configuration: configuration.clone(),
            actors,
            turn_order,
            board: MapManagement::new(map),
            resources,
            setup_step: 0,
            setup_anchor: None,
            knight_played: false,
            card_played: false,
            trade: None,
            forced_dice: None,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    // ==================== Accessors ====================

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, id: PlayerId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// Hand a seat over to a bot; name and holdings stay with the seat
    pub fn seat_bot(&mut self, player: PlayerId, difficulty: BotDifficulty) -> Result<(), GameError> {
        let actor = self
            .actors
            .iter_mut()
            .find(|a| a.id == player)
            .ok_or(GameError::UnknownPlayer(player))?;
        actor.kind = ActorKind::Bot(difficulty);
        info!(player, ?difficulty, "seat handed to bot");
        Ok(())
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn board(&self) -> &MapManagement {
        &self.board
    }

    pub fn map(&self) -> &MapModel {
        self.board.map()
    }

    pub fn resources(&self) -> &ResourceEngine {
        &self.resources
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn current_player(&self) -> PlayerId {
        self.state.current
    }

    pub fn pending_trade(&self) -> Option<&TradeOffer> {
        self.trade.as_ref().map(|t| &t.offer)
    }

    pub fn is_finished(&self) -> bool {
        self.state.winner().is_some()
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.state.winner()
    }

    pub fn victory_points(&self, player: PlayerId) -> u32 {
        self.resources
            .inventory(player)
            .map_or(0, |inv| VictoryCalculator::calculate(player, &self.board, inv))
    }

    /// Seats whose input the game is waiting for
    pub fn actors_to_move(&self) -> Vec<PlayerId> {
        match &self.state.phase {
            Phase::GameOver { .. } => Vec::new(),
            Phase::Discard { pending } => pending.keys().copied().collect(),
            Phase::Main => {
                let mut waiting = vec![self.state.current];
                if let Some(trade) = &self.trade {
                    waiting.extend(
                        self.turn_order
                            .iter()
                            .copied()
                            .filter(|p| trade.offer.addressed_to(*p) && !trade.declined.contains(p)),
                    );
                }
                waiting
            }
            _ => vec![self.state.current],
        }
    }

    /// Move resources from the bank to a seat, capped by bank stock.
    /// Used to set up scenarios and handicaps outside normal play.
    pub fn grant_from_bank(&mut self, player: PlayerId, hand: &ResourceHand) -> Result<ResourceHand, GameError> {
        self.resources.grant(player, hand)
    }

    // ==================== Actions ====================

    /// Apply one action for `player`, returning what happened
    pub fn apply_action(&mut self, player: PlayerId, action: GameAction) -> Result<Vec<GameEvent>, GameError> {
        let mut events = self.dispatch(player, action).inspect_err(|e| {
            debug!(player, error = %e, "action rejected");
        })?;
        events.extend(self.check_victory());
        Ok(events)
    }

    /// Roll with dice chosen by the caller instead of the game's RNG
    pub fn roll_dice_with(&mut self, player: PlayerId, dice: (u8, u8)) -> Result<Vec<GameEvent>, GameError> {
        if !(1..=6).contains(&dice.0) || !(1..=6).contains(&dice.1) {
            return Err(GameError::InvalidDice);
        }
        self.forced_dice = Some(dice);
        let result = self.apply_action(player, GameAction::RollDice);
        self.forced_dice = None;
        result
    }

    fn may_act(&self, player: PlayerId, action: &GameAction) -> Result<(), GameError> {
        match (&self.state.phase, action) {
            (Phase::Discard { pending }, GameAction::Discard(_)) => {
                if pending.contains_key(&player) {
                    Ok(())
                } else {
                    Err(GameError::NotYourTurn)
                }
            }
            (_, GameAction::AcceptTrade | GameAction::DeclineTrade) => Ok(()),
            _ if player == self.state.current => Ok(()),
            _ => Err(GameError::NotYourTurn),
        }
    }

    fn dispatch(&mut self, player: PlayerId, action: GameAction) -> Result<Vec<GameEvent>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if !self.turn_order.contains(&player) {
            return Err(GameError::UnknownPlayer(player));
        }
        self.may_act(player, &action)?;

        match (self.state.phase.clone(), action) {
            // ==================== Setup Phase ====================
            (
                Phase::Setup {
                    round,
                    placing: SetupPlacing::Settlement,
                },
                GameAction::PlaceSetupSettlement(at),
            ) => self.place_setup_settlement(player, round, at),
            (
                Phase::Setup {
                    placing: SetupPlacing::Road,
                    ..
                },
                GameAction::PlaceSetupRoad(edge),
            ) => self.place_setup_road(player, edge),

            // ==================== Dice Rolling ====================
            (Phase::Roll, GameAction::RollDice) => {
                let dice = self.forced_dice.take().unwrap_or_else(|| {
                    (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6))
                });
                Ok(self.resolve_roll(player, dice))
            }

            (Phase::Roll | Phase::Main, GameAction::PlayKnight) => self.play_knight(player),

            // ==================== Discard ====================
            (Phase::Discard { pending }, GameAction::Discard(hand)) => self.discard(player, pending, hand),

            // ==================== Robber ====================
            (Phase::Robber { origin }, GameAction::MoveRobber { to, victim }) => {
                self.move_robber(player, origin, to, victim)
            }

            (Phase::Main, action) => self.main_action(player, action),

            _ => Err(GameError::IllegalPhaseTransition),
        }
    }

    fn main_action(&mut self, player: PlayerId, action: GameAction) -> Result<Vec<GameEvent>, GameError> {
        match action {
            // ==================== Building ====================
            GameAction::BuildRoad(edge) => {
                let cost = costs::road();
                self.ensure_piece(player, Piece::Road, 1)?;
                self.ensure_affordable(player, &cost)?;
                let location = self.board.place_road(player, edge.into())?;
                self.resources.pay(player, &cost)?;
                let mut events = vec![GameEvent::RoadBuilt { player, location }];
                events.extend(self.refresh_longest_road());
                Ok(events)
            }
            GameAction::BuildSettlement(at) => {
                let cost = costs::settlement();
                self.ensure_piece(player, Piece::Settlement, 1)?;
                self.ensure_affordable(player, &cost)?;
                let location = self
                    .board
                    .place_settlement(player, at.into(), PlacementMode::Normal)?;
                self.resources.pay(player, &cost)?;
                let mut events = vec![GameEvent::SettlementBuilt { player, location }];
                // a new settlement can cut another player's road
                events.extend(self.refresh_longest_road());
                Ok(events)
            }
            GameAction::UpgradeToCity(at) => {
                let cost = costs::city();
                self.ensure_piece(player, Piece::City, 1)?;
                self.ensure_affordable(player, &cost)?;
                let location = self.board.upgrade_settlement(player, at.into())?;
                self.resources.pay(player, &cost)?;
                Ok(vec![GameEvent::CityBuilt { player, location }])
            }
            GameAction::BuyDevelopmentCard => {
                let cost = costs::development_card();
                self.ensure_affordable(player, &cost)?;
                if self.resources.bank().cards.total() == 0 {
                    return Err(GameError::DeckExhausted);
                }
                self.resources.pay(player, &cost)?;
                let card = self.resources.draw_development_card(player, &mut self.rng)?;
                debug!(player, ?card, "development card bought");
                Ok(vec![GameEvent::DevelopmentCardBought { player }])
            }

            // ==================== Development Cards ====================
            GameAction::PlayRoadBuilding { first, second } => self.play_road_building(player, first, second),
            GameAction::PlayYearOfPlenty(a, b) => {
                self.ensure_card_allowed(player, DevelopmentCard::YearOfPlenty)?;
                self.resources.year_of_plenty(player, a, b)?;
                self.resources.play_card(player, DevelopmentCard::YearOfPlenty)?;
                self.card_played = true;
                Ok(vec![GameEvent::YearOfPlentyPlayed {
                    player,
                    resources: (a, b),
                }])
            }
            GameAction::PlayMonopoly(resource) => {
                self.ensure_card_allowed(player, DevelopmentCard::Monopoly)?;
                self.resources.play_card(player, DevelopmentCard::Monopoly)?;
                self.card_played = true;
                let total_taken = self.resources.monopoly(player, resource)?;
                Ok(vec![GameEvent::MonopolyPlayed {
                    player,
                    resource,
                    total_taken,
                }])
            }

            // ==================== Trading ====================
            GameAction::TradeWithBank { give, amount, want } => {
                let received = self
                    .resources
                    .trade_with_bank(player, give, amount, want, &self.board)?;
                Ok(vec![GameEvent::BankTrade {
                    player,
                    gave: give,
                    gave_count: amount,
                    received: want,
                    received_count: received,
                }])
            }
            GameAction::ProposeTrade { to, offer, request } => self.propose_trade(player, to, offer, request),
            GameAction::AcceptTrade => self.accept_trade(player),
            GameAction::DeclineTrade => self.decline_trade(player),
            GameAction::CancelTrade => {
                match &self.trade {
                    Some(trade) if trade.offer.from == player => {}
                    Some(_) => return Err(GameError::InvalidTrade),
                    None => return Err(GameError::NoActiveTrade),
                }
                self.trade = None;
                Ok(vec![GameEvent::TradeCancelled])
            }

            // ==================== Turn Management ====================
            GameAction::EndTurn => Ok(self.end_turn(player)),

            _ => Err(GameError::IllegalPhaseTransition),
        }
    }

    // ==================== Setup ====================

    fn setup_player(&self, step: usize) -> PlayerId {
        let n = self.turn_order.len();
        if step < n {
            self.turn_order[step]
        } else {
            self.turn_order[(2 * n - 1).saturating_sub(step)]
        }
    }

    fn place_setup_settlement(
        &mut self,
        player: PlayerId,
        round: u8,
        at: IntersectionCoord,
    ) -> Result<Vec<GameEvent>, GameError> {
        let location = self
            .board
            .place_settlement(player, at.into(), PlacementMode::Setup)?;
        let mut events = vec![GameEvent::SettlementBuilt { player, location }];

        if round == 2 {
            let map = self.board.map();
            let income: ResourceHand = map
                .hexes_of_intersection(location)
                .into_iter()
                .filter_map(|h| map.hex(h).and_then(Hex::production))
                .map(|(resource, _)| (resource, 1))
                .collect();
            let granted = self.resources.grant(player, &income)?;
            if !granted.is_empty() {
                events.push(GameEvent::StartingResources {
                    player,
                    resources: granted,
                });
            }
        }

        self.setup_anchor = Some(location);
        self.set_phase(
            Phase::Setup {
                round,
                placing: SetupPlacing::Road,
            },
            &mut events,
        );
        Ok(events)
    }

    fn place_setup_road(&mut self, player: PlayerId, edge: EdgeCoord) -> Result<Vec<GameEvent>, GameError> {
        let anchor = self.setup_anchor.ok_or(GameError::IllegalPhaseTransition)?;
        if !edge.endpoints().contains(&anchor) {
            return Err(GameError::placement(
                "setup road must touch the settlement just placed",
            ));
        }
        let location = self.board.place_road(player, edge.into())?;
        let mut events = vec![GameEvent::RoadBuilt { player, location }];
        self.setup_anchor = None;
        self.setup_step += 1;

        let n = self.turn_order.len();
        if self.setup_step >= 2 * n {
            self.state.current = self.turn_order[0];
            self.state.turn_number = 1;
            info!("setup complete");
            self.set_phase(Phase::Roll, &mut events);
        } else {
            self.state.current = self.setup_player(self.setup_step);
            let round = if self.setup_step < n { 1 } else { 2 };
            self.set_phase(
                Phase::Setup {
                    round,
                    placing: SetupPlacing::Settlement,
                },
                &mut events,
            );
        }
        Ok(events)
    }

    // ==================== Dice and Robber ====================

    fn resolve_roll(&mut self, player: PlayerId, (a, b): (u8, u8)) -> Vec<GameEvent> {
        let total = a + b;
        self.state.dice = Some((a, b));
        let mut events = vec![GameEvent::DiceRolled {
            player,
            roll: (a, b),
            total,
        }];

        if total == 7 {
            let threshold = self.rules.discard_threshold;
            let pending: BTreeMap<PlayerId, u32> = self
                .turn_order
                .iter()
                .map(|&p| (p, self.resources.robber_tax(p, threshold)))
                .filter(|(_, owed)| *owed > 0)
                .collect();
            if pending.is_empty() {
                self.set_phase(
                    Phase::Robber {
                        origin: RobberOrigin::SevenRolled,
                    },
                    &mut events,
                );
            } else {
                events.push(GameEvent::DiscardRequired {
                    pending: pending.clone(),
                });
                self.set_phase(Phase::Discard { pending }, &mut events);
            }
        } else {
            let production = self.resources.produce_for_roll(total, &self.board);
            if !production.per_player.is_empty() {
                events.push(GameEvent::ResourcesProduced {
                    production: production.per_player,
                });
            }
            if !production.withheld.is_empty() {
                events.push(GameEvent::ProductionWithheld {
                    resources: production.withheld,
                });
            }
            self.set_phase(Phase::Main, &mut events);
        }
        events
    }

    fn discard(
        &mut self,
        player: PlayerId,
        mut pending: BTreeMap<PlayerId, u32>,
        hand: ResourceHand,
    ) -> Result<Vec<GameEvent>, GameError> {
        let required = pending.get(&player).copied().ok_or(GameError::NotYourTurn)?;
        self.resources.discard(player, &hand, required)?;
        pending.remove(&player);

        let mut events = vec![GameEvent::CardsDiscarded {
            player,
            count: required,
        }];
        let next = if pending.is_empty() {
            Phase::Robber {
                origin: RobberOrigin::SevenRolled,
            }
        } else {
            Phase::Discard { pending }
        };
        self.set_phase(next, &mut events);
        Ok(events)
    }

    fn move_robber(
        &mut self,
        player: PlayerId,
        origin: RobberOrigin,
        to: HexCoord,
        victim: Option<PlayerId>,
    ) -> Result<Vec<GameEvent>, GameError> {
        if let Some(victim) = victim {
            if !self.board.eligible_victims(to, player).contains(&victim) {
                return Err(GameError::placement("victim has no building on that hex"));
            }
        }
        let from = self.board.map().robber_position();
        self.board.move_robber(to.into())?;
        let mut events = vec![GameEvent::RobberMoved { player, from, to }];

        if let Some(victim) = victim {
            let resource = self.resources.steal_random(player, victim, &mut self.rng);
            events.push(GameEvent::ResourceStolen {
                thief: player,
                victim,
                resource,
            });
        }

        match origin {
            RobberOrigin::SevenRolled => events.extend(self.end_turn(player)),
            RobberOrigin::KnightBeforeRoll => self.set_phase(Phase::Roll, &mut events),
            RobberOrigin::KnightInMain => self.set_phase(Phase::Main, &mut events),
        }
        Ok(events)
    }

    // ==================== Development Cards ====================

    fn ensure_card_allowed(&self, player: PlayerId, card: DevelopmentCard) -> Result<(), GameError> {
        if self.card_played {
            return Err(GameError::CardLimitReached);
        }
        if self.resources.inventory(player)?.cards.get(card) == 0 {
            return Err(GameError::NoSuchCard);
        }
        Ok(())
    }

    fn play_knight(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        if self.knight_played {
            return Err(GameError::CardLimitReached);
        }
        self.resources.play_card(player, DevelopmentCard::Knight)?;
        self.knight_played = true;

        let mut events = vec![GameEvent::KnightPlayed { player }];
        events.extend(self.refresh_largest_army());
        let origin = if self.state.phase == Phase::Roll {
            RobberOrigin::KnightBeforeRoll
        } else {
            RobberOrigin::KnightInMain
        };
        self.set_phase(Phase::Robber { origin }, &mut events);
        Ok(events)
    }

    /// Both roads are placed or neither is. A single road is only accepted
    /// when no piece or no legal spot is left for a second one.
    fn play_road_building(
        &mut self,
        player: PlayerId,
        first: EdgeCoord,
        second: Option<EdgeCoord>,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.ensure_card_allowed(player, DevelopmentCard::RoadBuilding)?;
        let needed = if second.is_some() { 2 } else { 1 };
        self.ensure_piece(player, Piece::Road, needed)?;

        let first_at = self.board.place_road(player, first.into())?;
        let second_at = match second {
            Some(edge) => match self.board.place_road(player, edge.into()) {
                Ok(at) => Some(at),
                Err(e) => {
                    self.board.remove_road(first_at);
                    return Err(e);
                }
            },
            None => {
                if self.pieces_left(player, Piece::Road) > 0 && !self.board.placeable_roads(player).is_empty() {
                    self.board.remove_road(first_at);
                    return Err(GameError::placement("a second road can still be placed"));
                }
                None
            }
        };
        self.resources.play_card(player, DevelopmentCard::RoadBuilding)?;
        self.card_played = true;

        let mut events = vec![GameEvent::RoadBuildingPlayed { player }];
        for location in std::iter::once(first_at).chain(second_at) {
            events.push(GameEvent::RoadBuilt { player, location });
        }
        events.extend(self.refresh_longest_road());
        Ok(events)
    }

    // ==================== Trading ====================

    fn propose_trade(
        &mut self,
        player: PlayerId,
        to: Option<PlayerId>,
        offer: ResourceHand,
        request: ResourceHand,
    ) -> Result<Vec<GameEvent>, GameError> {
        let offer = TradeOffer {
            from: player,
            to,
            offer,
            request,
        };
        if !offer.is_valid() {
            return Err(GameError::InvalidTrade);
        }
        if let Some(to) = to {
            if to == player || !self.turn_order.contains(&to) {
                return Err(GameError::InvalidTrade);
            }
        }
        if !self.resources.inventory(player)?.resources.contains(&offer.offer) {
            return Err(GameError::InsufficientResources);
        }
        self.trade = Some(TradeState {
            offer: offer.clone(),
            declined: BTreeSet::new(),
        });
        Ok(vec![GameEvent::TradeProposed { offer }])
    }

    fn accept_trade(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let trade = self.trade.as_ref().ok_or(GameError::NoActiveTrade)?;
        if !trade.offer.addressed_to(player) || trade.declined.contains(&player) {
            return Err(GameError::InvalidTrade);
        }
        let offer = trade.offer.clone();
        self.resources
            .trade_with_player(offer.from, player, &offer.offer, &offer.request)?;
        self.trade = None;
        Ok(vec![GameEvent::TradeCompleted {
            from: offer.from,
            to: player,
        }])
    }

    fn decline_trade(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let trade = self.trade.as_mut().ok_or(GameError::NoActiveTrade)?;
        if !trade.offer.addressed_to(player) {
            return Err(GameError::InvalidTrade);
        }
        trade.declined.insert(player);
        let mut events = vec![GameEvent::TradeDeclined { player }];

        let everyone_declined = self
            .turn_order
            .iter()
            .filter(|p| trade.offer.addressed_to(**p))
            .all(|p| trade.declined.contains(p));
        if everyone_declined {
            self.trade = None;
            events.push(GameEvent::TradeCancelled);
        }
        Ok(events)
    }

    // ==================== Helper Methods ====================

    fn set_phase(&mut self, phase: Phase, events: &mut Vec<GameEvent>) {
        info!(current = self.state.current, ?phase, "phase changed");
        self.state.phase = phase.clone();
        events.push(GameEvent::PhaseChanged { phase });
    }

    fn pieces_left(&self, player: PlayerId, piece: Piece) -> u32 {
        let limits = &self.rules.pieces;
        let (limit, used) = match piece {
            Piece::Road => (limits.roads, self.board.roads_of(player).len()),
            Piece::Settlement => (limits.settlements, self.board.settlements_of(player).len()),
            Piece::City => (limits.cities, self.board.cities_of(player).len()),
        };
        limit.saturating_sub(used as u32)
    }

    fn ensure_piece(&self, player: PlayerId, piece: Piece, needed: u32) -> Result<(), GameError> {
        if self.pieces_left(player, piece) < needed {
            return Err(GameError::NoPiecesRemaining);
        }
        Ok(())
    }

    fn ensure_affordable(&self, player: PlayerId, cost: &ResourceHand) -> Result<(), GameError> {
        if !self.resources.can_afford(player, cost) {
            return Err(GameError::InsufficientResources);
        }
        Ok(())
    }

    fn refresh_longest_road(&mut self) -> Vec<GameEvent> {
        let previous = self.state.longest_road;
        let leader = self
            .board
            .longest_road(previous)
            .filter(|(_, length)| *length >= self.rules.longest_road_min);
        let current = leader.map(|(p, _)| p);
        if current == previous {
            return Vec::new();
        }
        info!(?previous, ?current, "longest road changed hands");
        self.state.longest_road = current;
        self.resources.set_longest_road_holder(current);
        vec![GameEvent::LongestRoadChanged {
            previous,
            current,
            length: leader.map_or(0, |(_, length)| length),
        }]
    }

    fn refresh_largest_army(&mut self) -> Vec<GameEvent> {
        let previous = self.state.largest_army;
        let current = self.resources.largest_army(previous, self.rules.largest_army_min);
        if current == previous {
            return Vec::new();
        }
        info!(?previous, ?current, "largest army changed hands");
        self.state.largest_army = current;
        self.resources.set_largest_army_holder(current);
        let knights = current
            .and_then(|p| self.resources.inventory(p).ok())
            .map_or(0, |inv| inv.knights_played);
        vec![GameEvent::LargestArmyChanged {
            previous,
            current,
            knights,
        }]
    }

    /// First seat at or above the threshold, starting with the current player
    fn check_victory(&mut self) -> Vec<GameEvent> {
        if self.is_finished() {
            return Vec::new();
        }
        let n = self.turn_order.len();
        let start = self
            .turn_order
            .iter()
            .position(|&p| p == self.state.current)
            .unwrap_or(0);
        let winner = (0..n)
            .map(|k| self.turn_order[(start + k) % n])
            .map(|p| (p, self.victory_points(p)))
            .find(|(_, points)| *points >= self.rules.victory_points_to_win);

        let Some((player, victory_points)) = winner else {
            return Vec::new();
        };
        info!(player, victory_points, "game won");
        self.trade = None;
        let mut events = vec![GameEvent::GameWon {
            player,
            victory_points,
        }];
        self.set_phase(Phase::GameOver { winner: player }, &mut events);
        events
    }

    /// Victory check, then hand the turn to the next seat
    fn end_turn(&mut self, player: PlayerId) -> Vec<GameEvent> {
        let won = self.check_victory();
        if !won.is_empty() {
            return won;
        }
        self.resources.end_turn(player);
        let n = self.turn_order.len();
        let index = self
            .turn_order
            .iter()
            .position(|&p| p == self.state.current)
            .unwrap_or(0);
        let next_player = self.turn_order[(index + 1) % n];

        self.state.current = next_player;
        self.state.turn_number += 1;
        self.state.dice = None;
        self.knight_played = false;
        self.card_played = false;
        self.trade = None;
        info!(player, next_player, turn = self.state.turn_number, "turn ended");

        let mut events = vec![GameEvent::TurnEnded { player, next_player }];
        self.set_phase(Phase::Roll, &mut events);
        events
    }

    // ==================== Legal Actions ====================

    fn can_play_knight(&self, player: PlayerId) -> bool {
        !self.knight_played
            && self
                .resources
                .inventory(player)
                .is_ok_and(|inv| inv.cards.knight > 0)
    }

    fn may_play(&self, player: PlayerId, card: DevelopmentCard) -> bool {
        self.ensure_card_allowed(player, card).is_ok()
    }

    /// Every action `player` could take right now.
    ///
    /// Discards are left out: the seat picks which cards to give up.
    pub fn legal_actions(&self, player: PlayerId) -> Vec<GameAction> {
        let mut actions = Vec::new();
        let is_current = player == self.state.current;

        match &self.state.phase {
            Phase::Setup {
                placing: SetupPlacing::Settlement,
                ..
            } if is_current => {
                actions.extend(
                    self.board
                        .placeable_settlements(player, PlacementMode::Setup)
                        .into_iter()
                        .map(GameAction::PlaceSetupSettlement),
                );
            }
            Phase::Setup {
                placing: SetupPlacing::Road,
                ..
            } if is_current => {
                if let Some(anchor) = self.setup_anchor {
                    actions.extend(
                        self.map()
                            .edges_of_intersection(anchor)
                            .into_iter()
                            .filter(|e| self.board.road_placeable(player, (*e).into()))
                            .map(GameAction::PlaceSetupRoad),
                    );
                }
            }
            Phase::Roll if is_current => {
                actions.push(GameAction::RollDice);
                if self.can_play_knight(player) {
                    actions.push(GameAction::PlayKnight);
                }
            }
            Phase::Robber { .. } if is_current => {
                let robber = self.map().robber_position();
                let mut targets: Vec<HexCoord> = self
                    .map()
                    .land_hexes()
                    .map(|h| h.coord)
                    .filter(|c| *c != robber)
                    .collect();
                targets.sort();
                for to in targets {
                    let victims = self.board.eligible_victims(to, player);
                    if victims.is_empty() {
                        actions.push(GameAction::MoveRobber { to, victim: None });
                    } else {
                        actions.extend(victims.into_iter().map(|v| GameAction::MoveRobber { to, victim: Some(v) }));
                    }
                }
            }
            Phase::Main if is_current => self.main_actions(player, &mut actions),
            Phase::Main => {
                if let Some(trade) = &self.trade {
                    if trade.offer.addressed_to(player) && !trade.declined.contains(&player) {
                        if self.resources.can_afford(player, &trade.offer.request) {
                            actions.push(GameAction::AcceptTrade);
                        }
                        actions.push(GameAction::DeclineTrade);
                    }
                }
            }
            _ => {}
        }
        actions
    }

    fn main_actions(&self, player: PlayerId, actions: &mut Vec<GameAction>) {
        actions.push(GameAction::EndTurn);
        let affordable = |cost: ResourceHand| self.resources.can_afford(player, &cost);

        if self.pieces_left(player, Piece::Road) > 0 && affordable(costs::road()) {
            actions.extend(self.board.placeable_roads(player).into_iter().map(GameAction::BuildRoad));
        }
        if self.pieces_left(player, Piece::Settlement) > 0 && affordable(costs::settlement()) {
            actions.extend(
                self.board
                    .placeable_settlements(player, PlacementMode::Normal)
                    .into_iter()
                    .map(GameAction::BuildSettlement),
            );
        }
        if self.pieces_left(player, Piece::City) > 0 && affordable(costs::city()) {
            actions.extend(
                self.board
                    .upgradeable_settlements(player)
                    .into_iter()
                    .map(GameAction::UpgradeToCity),
            );
        }
        if affordable(costs::development_card()) && self.resources.bank().cards.total() > 0 {
            actions.push(GameAction::BuyDevelopmentCard);
        }
        if self.can_play_knight(player) {
            actions.push(GameAction::PlayKnight);
        }

        if self.may_play(player, DevelopmentCard::RoadBuilding) && self.pieces_left(player, Piece::Road) > 0 {
            let two = self.pieces_left(player, Piece::Road) >= 2;
            for first in self.board.placeable_roads(player) {
                let second = two
                    .then(|| {
                        let mut scratch = self.board.clone();
                        scratch.place_road(player, first.into()).ok()?;
                        scratch.placeable_roads(player).into_iter().next()
                    })
                    .flatten();
                actions.push(GameAction::PlayRoadBuilding { first, second });
            }
        }
        if self.may_play(player, DevelopmentCard::YearOfPlenty) {
            let bank = &self.resources.bank().resources;
            for (i, &a) in Resource::ALL.iter().enumerate() {
                for &b in &Resource::ALL[i..] {
                    let mut wanted = ResourceHand::single(a, 1);
                    wanted.add(b, 1);
                    if bank.contains(&wanted) {
                        actions.push(GameAction::PlayYearOfPlenty(a, b));
                    }
                }
            }
        }
        if self.may_play(player, DevelopmentCard::Monopoly) {
            actions.extend(Resource::ALL.map(GameAction::PlayMonopoly));
        }

        if let Ok(inventory) = self.resources.inventory(player) {
            for give in Resource::ALL {
                let ratio = self.resources.trade_ratio(player, give, &self.board);
                if inventory.resources.get(give) < ratio {
                    continue;
                }
                for want in Resource::ALL {
                    if want != give && self.resources.bank().resources.get(want) > 0 {
                        actions.push(GameAction::TradeWithBank {
                            give,
                            amount: ratio,
                            want,
                        });
                    }
                }
            }
        }
        if self.trade.as_ref().is_some_and(|t| t.offer.from == player) {
            actions.push(GameAction::CancelTrade);
        }
    }

    // ==================== Snapshots ====================

    /// Everything visible, for hosts, logs and tests
    pub fn snapshot(&self) -> GameSnapshot {
        self.build_snapshot(|_| true)
    }

    /// What `viewer` may see: other seats' hands and scores stay hidden
    /// until the game ends
    pub fn snapshot_for(&self, viewer: PlayerId) -> GameSnapshot {
        let finished = self.is_finished();
        self.build_snapshot(|p| finished || p == viewer)
    }

    fn build_snapshot(&self, reveal: impl Fn(PlayerId) -> bool) -> GameSnapshot {
        let players = self
            .actors
            .iter()
            .filter_map(|actor| {
                let inv = self.resources.inventory(actor.id).ok()?;
                let shown = reveal(actor.id);
                let total_points = self.victory_points(actor.id);
                Some(PlayerView {
                    id: actor.id,
                    name: actor.name.clone(),
                    kind: actor.kind,
                    resource_count: inv.resources.total(),
                    resources: shown.then_some(inv.resources),
                    development_card_count: inv.cards.total() + inv.fresh_cards.total(),
                    development_cards: shown.then_some(inv.cards),
                    fresh_cards: shown.then_some(inv.fresh_cards),
                    knights_played: inv.knights_played,
                    longest_road: inv.longest_road,
                    largest_army: inv.largest_army,
                    road_length: self.board.road_length(actor.id),
                    public_victory_points: total_points - inv.victory_point_cards(),
                    victory_points: shown.then_some(total_points),
                })
            })
            .collect();

        GameSnapshot {
            state: self.state.clone(),
            turn_order: self.turn_order.clone(),
            map: self.map().view(),
            bank: BankView {
                resources: self.resources.bank().resources,
                development_cards_left: self.resources.bank().cards.total(),
            },
            players,
            pending_trade: self.pending_trade().cloned(),
        }
    }
}
