//! WebSocket protocol messages for multiplayer games.

use serde::{Deserialize, Serialize};
use settlers_engine::{BotDifficulty, GameAction, GameEvent, GameSnapshot, Phase, PlayerId};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game room
    CreateRoom { player_name: String, max_players: u8 },

    /// Join an existing room
    JoinRoom { room_id: Uuid, player_name: String },

    /// Fill a free seat with a bot (host only)
    AddBot { difficulty: BotDifficulty },

    /// Leave current room
    LeaveRoom,

    /// Start the game (host only)
    StartGame,

    /// Submit a game action
    GameAction { action: GameAction },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned connection ID
    Welcome { player_id: Uuid },

    /// Room created successfully
    RoomCreated { room_id: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo },

    /// Left room successfully
    LeftRoom,

    /// Room state updated (player or bot joined/left)
    RoomUpdated { room: RoomInfo },

    /// Game started; `seat` is the receiver's player id in the game
    GameStarted { seat: PlayerId, state: GameSnapshot },

    /// Game state as the receiver may see it
    GameState { state: GameSnapshot },

    /// Outcome of the receiver's own action
    ActionResult {
        success: bool,
        events: Vec<GameEvent>,
        error: Option<String>,
    },

    /// Everything that happened since the last update, bot moves included
    Events { events: Vec<GameEvent> },

    /// Actions the receiver may take now
    ValidActions { actions: Vec<GameAction> },

    /// Whose move it is
    TurnChanged { player_id: PlayerId, phase: Phase },

    /// List of available rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,

    /// Game finished
    GameOver { winner: PlayerId, winner_name: String },
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
}

/// A seat in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// `None` for bots
    pub id: Option<Uuid>,
    pub name: String,
    pub bot: Option<BotDifficulty>,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}
