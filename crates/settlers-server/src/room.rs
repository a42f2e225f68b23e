//! Game room management.

use rand::rngs::StdRng;
use rand::SeedableRng;
use settlers_engine::{
    Actor, Bot, BotDifficulty, Configuration, ConfigurationError, Game, GameAction, GameError, GameEvent,
    GameSnapshot, PlayerId, Rules,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

/// Upper bound on bot moves between two human moves
const MAX_BOT_STEPS: usize = 2_000;

/// Plays the seat of a human who leaves a running game
const STAND_IN: BotDifficulty = BotDifficulty::Medium;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Invalid board: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Game(#[from] GameError),
}

/// A human player in a game room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    /// Seat in the game, assigned when game starts
    pub game_index: Option<PlayerId>,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            game_index: None,
        }
    }
}

/// What a player leaving did to the room
#[derive(Debug, Default)]
pub struct Departure {
    /// No human is left
    pub empty: bool,
    /// Moves made by the bot that took over the seat
    pub events: Vec<GameEvent>,
}

/// Who sits in a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Human(Uuid),
    Bot(BotDifficulty),
}

/// A game room that can hold multiple players.
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Order of seats for turn taking
    pub seats: Vec<Seat>,
    rules: Rules,
    /// The game (once started)
    pub game: Option<Game>,
    bots: BTreeMap<PlayerId, Bot>,
    seed: u64,
}

impl GameRoom {
    pub fn new(id: Uuid, host_id: Uuid, host_name: String, max_players: u8, rules: Rules) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone()));

        Self {
            id,
            name: format!("{}'s Game", host_name),
            max_players: max_players.clamp(2, 4),
            host_id,
            status: RoomStatus::Waiting,
            players,
            seats: vec![Seat::Human(host_id)],
            rules,
            game: None,
            bots: BTreeMap::new(),
            seed: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.max_players as usize
    }

    /// Connections to notify
    pub fn humans(&self) -> impl Iterator<Item = &RoomPlayer> {
        self.players.values()
    }

    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.players.insert(player_id, RoomPlayer::new(player_id, name));
        self.seats.push(Seat::Human(player_id));
        Ok(())
    }

    pub fn add_bot(&mut self, requester_id: Uuid, difficulty: BotDifficulty) -> Result<(), RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        self.seats.push(Seat::Bot(difficulty));
        Ok(())
    }

    /// Take a player out of the room. In a running game a bot takes over
    /// the seat and plays on until a human must act.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<Departure, RoomError> {
        let player = self.players.remove(&player_id).ok_or(RoomError::PlayerNotInRoom)?;

        let seat = player.game_index.filter(|_| self.status == RoomStatus::InGame);
        match seat {
            Some(seat) => self.hand_to_bot(seat)?,
            None => self.seats.retain(|s| *s != Seat::Human(player_id)),
        }

        // If host left, assign new host
        if player_id == self.host_id {
            if let Some(next) = self.seats.iter().find_map(|seat| match seat {
                Seat::Human(id) => Some(*id),
                Seat::Bot(_) => None,
            }) {
                self.host_id = next;
            }
        }

        let empty = self.players.is_empty();
        let events = if seat.is_some() && !empty {
            self.run_bots()
        } else {
            Vec::new()
        };
        Ok(Departure { empty, events })
    }

    fn hand_to_bot(&mut self, seat: PlayerId) -> Result<(), RoomError> {
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        game.seat_bot(seat, STAND_IN)?;
        if let Some(slot) = self.seats.get_mut(seat as usize) {
            *slot = Seat::Bot(STAND_IN);
        }
        self.bots
            .insert(seat, Bot::with_seed(seat, STAND_IN, self.seed.wrapping_add(seat as u64)));
        info!(room = %self.id, seat, "bot took over seat");
        Ok(())
    }

    /// Deal a random board from `seed` and seat everyone in join order.
    /// Returns the events of any bot moves made before a human must act.
    pub fn start_game(&mut self, requester_id: Uuid, seed: u64) -> Result<Vec<GameEvent>, RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.seats.len() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }

        let mut actors = Vec::with_capacity(self.seats.len());
        for (idx, seat) in self.seats.iter().enumerate() {
            let index = idx as PlayerId;
            match *seat {
                Seat::Human(id) => {
                    let player = self.players.get_mut(&id).ok_or(RoomError::PlayerNotInRoom)?;
                    player.game_index = Some(index);
                    actors.push(Actor::human(index, player.name.clone()));
                }
                Seat::Bot(difficulty) => {
                    self.bots
                        .insert(index, Bot::with_seed(index, difficulty, seed.wrapping_add(idx as u64)));
                    actors.push(Actor::bot(index, difficulty));
                }
            }
        }

        self.seed = seed;
        let configuration = Configuration::random(&mut StdRng::seed_from_u64(seed));
        self.game = Some(Game::new(actors, &configuration, self.rules.clone(), seed)?);
        self.status = RoomStatus::InGame;
        info!(room = %self.id, seats = self.seats.len(), "game started");

        Ok(self.run_bots())
    }

    /// Apply a human action, then let bots play until a human must act
    pub fn apply_action(&mut self, player_id: Uuid, action: GameAction) -> Result<Vec<GameEvent>, RoomError> {
        if self.game.is_none() {
            return Err(RoomError::GameNotStarted);
        }
        let seat = self.seat_of(player_id)?;
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;

        let mut events = game.apply_action(seat, action)?;
        events.extend(self.run_bots());
        Ok(events)
    }

    /// Let bot seats act while the game is waiting on any of them.
    ///
    /// A bot whose own choice is missing or rejected falls back to the first
    /// legal action. A game that still waits on bots after the step limit,
    /// or whose bot seat has no legal action at all, is marked finished.
    fn run_bots(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(game) = self.game.as_mut() else {
            return events;
        };

        for _ in 0..MAX_BOT_STEPS {
            let Some(seat) = game
                .actors_to_move()
                .into_iter()
                .find(|seat| self.bots.contains_key(seat))
            else {
                break;
            };
            let Some(bot) = self.bots.get_mut(&seat) else {
                break;
            };
            let chosen = match bot.choose_action(game) {
                Some(action) => {
                    debug!(room = %self.id, seat, ?action, "bot move");
                    game.apply_action(seat, action)
                }
                None => Err(GameError::IllegalPhaseTransition),
            };
            let applied = chosen.or_else(|e| {
                warn!(room = %self.id, seat, error = %e, "bot move failed, playing first legal action");
                let fallback = game
                    .legal_actions(seat)
                    .into_iter()
                    .next()
                    .ok_or(GameError::IllegalPhaseTransition)?;
                game.apply_action(seat, fallback)
            });
            match applied {
                Ok(more) => events.extend(more),
                Err(e) => {
                    warn!(room = %self.id, seat, error = %e, "bot seat is stuck");
                    break;
                }
            }
        }

        let stalled = game
            .actors_to_move()
            .iter()
            .any(|seat| self.bots.contains_key(seat));
        if game.is_finished() {
            self.status = RoomStatus::Finished;
        } else if stalled {
            warn!(room = %self.id, "bots stopped making progress, closing game");
            self.status = RoomStatus::Finished;
        }
        events
    }

    fn seat_of(&self, player_id: Uuid) -> Result<PlayerId, RoomError> {
        self.players
            .get(&player_id)
            .and_then(|p| p.game_index)
            .ok_or(RoomError::PlayerNotInRoom)
    }

    /// Seat of a human in the room, if the game has started
    pub fn game_index(&self, player_id: Uuid) -> Option<PlayerId> {
        self.seat_of(player_id).ok()
    }

    pub fn snapshot_for(&self, player_id: Uuid) -> Option<GameSnapshot> {
        let seat = self.seat_of(player_id).ok()?;
        self.game.as_ref().map(|g| g.snapshot_for(seat))
    }

    pub fn valid_actions_for(&self, player_id: Uuid) -> Vec<GameAction> {
        match (self.game.as_ref(), self.seat_of(player_id)) {
            (Some(game), Ok(seat)) => game.legal_actions(seat),
            _ => Vec::new(),
        }
    }

    pub fn get_winner(&self) -> Option<(PlayerId, String)> {
        let game = self.game.as_ref()?;
        let winner = game.winner()?;
        let name = game.actor(winner)?.name.clone();
        Some((winner, name))
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self
                .seats
                .iter()
                .enumerate()
                .filter_map(|(idx, seat)| match seat {
                    Seat::Human(id) => self.players.get(id).map(|p| PlayerInfo {
                        id: Some(p.id),
                        name: p.name.clone(),
                        bot: None,
                    }),
                    Seat::Bot(difficulty) => Some(PlayerInfo {
                        id: None,
                        name: Actor::bot(idx as PlayerId, *difficulty).name,
                        bot: Some(*difficulty),
                    }),
                })
                .collect(),
            max_players: self.max_players,
            host_id: self.host_id,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlers_engine::{Phase, SetupPlacing};

    fn room(max_players: u8) -> (GameRoom, Uuid) {
        let host_id = Uuid::new_v4();
        let room = GameRoom::new(Uuid::new_v4(), host_id, "Host".to_string(), max_players, Rules::default());
        (room, host_id)
    }

    #[test]
    fn test_create_room() {
        let (room, host_id) = room(4);

        assert_eq!(room.player_count(), 1);
        assert!(!room.is_full());
        assert_eq!(room.host_id, host_id);
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn test_add_remove_players() {
        let (mut room, _) = room(2);

        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();

        assert_eq!(room.player_count(), 2);
        assert!(room.is_full());

        // Can't add more players
        let player3 = Uuid::new_v4();
        assert!(matches!(
            room.add_player(player3, "Player 3".to_string()),
            Err(RoomError::RoomFull)
        ));

        // Remove a player
        let departure = room.remove_player(player2).unwrap();
        assert!(!departure.empty);
        assert!(departure.events.is_empty());
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn test_host_passes_to_next_human() {
        let (mut room, host_id) = room(4);
        room.add_bot(host_id, BotDifficulty::Easy).unwrap();
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();

        assert!(!room.remove_player(host_id).unwrap().empty);
        assert_eq!(room.host_id, player2);
        assert_eq!(room.seats, vec![Seat::Bot(BotDifficulty::Easy), Seat::Human(player2)]);
    }

    #[test]
    fn test_only_host_adds_bots() {
        let (mut room, host_id) = room(3);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        assert!(matches!(room.add_bot(player2, BotDifficulty::Hard), Err(RoomError::NotHost)));
        room.add_bot(host_id, BotDifficulty::Hard).unwrap();
        assert!(matches!(room.add_bot(host_id, BotDifficulty::Hard), Err(RoomError::RoomFull)));

        let info = room.to_info();
        assert_eq!(info.players.len(), 3);
        assert_eq!(info.players[2].bot, Some(BotDifficulty::Hard));
        assert_eq!(info.players[2].name, "Bot 3");
    }

    #[test]
    fn test_start_game() {
        let (mut room, host_id) = room(4);

        // Can't start with only 1 player
        assert!(matches!(room.start_game(host_id, 1), Err(RoomError::NotEnoughPlayers)));

        // Add another player
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();

        // Non-host can't start
        assert!(matches!(room.start_game(player2, 1), Err(RoomError::NotHost)));

        // Host can start
        let events = room.start_game(host_id, 1).unwrap();
        assert!(events.is_empty(), "no bots to move");
        assert_eq!(room.status, RoomStatus::InGame);
        assert_eq!(room.game_index(host_id), Some(0));
        assert_eq!(room.game_index(player2), Some(1));
        assert!(!room.valid_actions_for(host_id).is_empty());
        assert!(room.valid_actions_for(player2).is_empty());

        let err = room.apply_action(player2, GameAction::RollDice).unwrap_err();
        assert!(matches!(err, RoomError::Game(GameError::NotYourTurn)));
    }

    #[test]
    fn test_bots_play_until_human_must_act() {
        let (mut room, host_id) = room(2);
        room.add_bot(host_id, BotDifficulty::Medium).unwrap();
        room.start_game(host_id, 7).unwrap();

        for _ in 0..2 {
            let action = room.valid_actions_for(host_id).remove(0);
            room.apply_action(host_id, action).unwrap();
        }

        // snake order 0, 1, 1, 0: the bot placed both of its rounds
        let game = room.game.as_ref().unwrap();
        assert_eq!(game.current_player(), 0);
        assert_eq!(
            game.phase(),
            &Phase::Setup {
                round: 2,
                placing: SetupPlacing::Settlement
            }
        );
        assert_eq!(game.board().settlements_of(1).len(), 2);
    }

    #[test]
    fn test_bot_first_seat_moves_at_start() {
        let (mut room, host_id) = room(3);
        room.seats = vec![Seat::Bot(BotDifficulty::Easy), Seat::Human(host_id)];

        let events = room.start_game(host_id, 3).unwrap();
        assert!(!events.is_empty());
        assert_eq!(room.game.as_ref().unwrap().current_player(), 1);
        let snapshot = room.snapshot_for(host_id).unwrap();
        assert!(snapshot.players[1].resources.is_some());
        assert!(snapshot.players[0].resources.is_none());
    }

    #[test]
    fn test_bot_takes_over_seat_left_mid_game() {
        let (mut room, host_id) = room(2);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        room.start_game(host_id, 5).unwrap();

        // host owes the first setup placement when leaving
        let departure = room.remove_player(host_id).unwrap();
        assert!(!departure.empty);
        assert!(!departure.events.is_empty());
        assert_eq!(room.host_id, player2);
        assert_eq!(room.seats, vec![Seat::Bot(STAND_IN), Seat::Human(player2)]);
        assert_eq!(room.status, RoomStatus::InGame);
        assert_eq!(room.game_index(host_id), None);

        let game = room.game.as_ref().unwrap();
        assert!(game.actor(0).unwrap().is_bot());
        assert_eq!(game.current_player(), 1);
        assert_eq!(game.board().settlements_of(0).len(), 1);
        assert_eq!(game.board().roads_of(0).len(), 1);

        for _ in 0..4 {
            let action = room.valid_actions_for(player2).remove(0);
            room.apply_action(player2, action).unwrap();
        }
        let game = room.game.as_ref().unwrap();
        assert_eq!(game.board().settlements_of(0).len(), 2);
        assert!(game.actors_to_move().contains(&1));
    }

    #[test]
    fn test_leaving_finished_room_does_not_seat_bot() {
        let (mut room, host_id) = room(2);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        room.start_game(host_id, 5).unwrap();
        room.status = RoomStatus::Finished;

        let departure = room.remove_player(player2).unwrap();
        assert!(departure.events.is_empty());
        assert_eq!(room.seats, vec![Seat::Human(host_id)]);
    }

    #[test]
    fn test_bot_only_table_never_stays_in_game() {
        let (mut room, host_id) = room(4);
        room.seats = vec![Seat::Bot(BotDifficulty::Easy), Seat::Bot(BotDifficulty::Medium)];

        room.start_game(host_id, 11).unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
    }
}
