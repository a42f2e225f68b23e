//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::GameRoom;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use settlers_engine::GameEvent;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Messages addressed to single connections
type Outbox = Vec<(Uuid, ServerMessage)>;

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    /// All active rooms; a room's entry guard serialises its actions
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Deliver collected messages; call with no room guard held
    fn deliver(&self, outbox: Outbox) {
        for (player_id, msg) in outbox {
            self.send_to_player(player_id, msg);
        }
    }

    /// Broadcast a message to all players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        self.broadcast_to_room_except(room_id, Uuid::nil(), msg);
    }

    /// Broadcast a message to all players in a room except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        let recipients: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.players.keys().copied().filter(|id| *id != except).collect(),
            None => return,
        };
        for player_id in recipients {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Get list of waiting rooms.
    pub fn get_waiting_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Per-seat view of the game after `events`
fn game_update(room: &GameRoom, events: &[GameEvent]) -> Outbox {
    let Some(game) = room.game.as_ref() else {
        return Vec::new();
    };
    let winner = room.get_winner();
    let mut outbox = Vec::new();

    for player in room.humans() {
        if !events.is_empty() {
            outbox.push((
                player.id,
                ServerMessage::Events {
                    events: events.to_vec(),
                },
            ));
        }
        if let Some(state) = room.snapshot_for(player.id) {
            outbox.push((player.id, ServerMessage::GameState { state }));
        }
        outbox.push((
            player.id,
            ServerMessage::ValidActions {
                actions: room.valid_actions_for(player.id),
            },
        ));
        outbox.push((
            player.id,
            ServerMessage::TurnChanged {
                player_id: game.current_player(),
                phase: game.phase().clone(),
            },
        ));
        if let Some((winner, winner_name)) = &winner {
            outbox.push((
                player.id,
                ServerMessage::GameOver {
                    winner: *winner,
                    winner_name: winner_name.clone(),
                },
            ));
        }
    }
    outbox
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Settlers server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a player ID
    let player_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = ServerMessage::Welcome { player_id };
    ws_sender.send(Message::Text(serde_json::to_string(&welcome)?)).await?;

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Cannot encode message: {}", e),
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: format!("invalid message: {e}"),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

fn error_message(message: impl ToString) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

/// Handle a client message.
pub(crate) fn handle_message(player_id: Uuid, msg: ClientMessage, state: &ServerState) {
    debug!(%player_id, ?msg, "client message");
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            max_players,
        } => {
            let room_id = Uuid::new_v4();
            let room = GameRoom::new(room_id, player_id, player_name, max_players, state.config.rules.clone());
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info });
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => {
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                state.send_to_player(player_id, error_message("Room not found"));
                return;
            };
            match room.add_player(player_id, player_name) {
                Ok(()) => {
                    let room_info = room.to_info();
                    drop(room); // Release lock before broadcasting
                    state.player_rooms.insert(player_id, room_id);

                    state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info.clone() });
                    state.broadcast_to_room_except(room_id, player_id, ServerMessage::RoomUpdated { room: room_info });
                }
                Err(e) => state.send_to_player(player_id, error_message(e)),
            }
        }

        ClientMessage::AddBot { difficulty } => {
            let Some(room_id) = state.player_rooms.get(&player_id).map(|r| *r) else {
                state.send_to_player(player_id, error_message("Not in a room"));
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };
            match room.add_bot(player_id, difficulty) {
                Ok(()) => {
                    let room_info = room.to_info();
                    drop(room);
                    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
                }
                Err(e) => state.send_to_player(player_id, error_message(e)),
            }
        }

        ClientMessage::LeaveRoom => {
            if leave_room(player_id, state) {
                state.send_to_player(player_id, ServerMessage::LeftRoom);
            }
        }

        ClientMessage::StartGame => {
            let Some(room_id) = state.player_rooms.get(&player_id).map(|r| *r) else {
                state.send_to_player(player_id, error_message("Not in a room"));
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };
            let seed: u64 = rand::random();
            match room.start_game(player_id, seed) {
                Ok(events) => {
                    let mut outbox: Outbox = room
                        .humans()
                        .filter_map(|p| {
                            let seat = room.game_index(p.id)?;
                            let snapshot = room.snapshot_for(p.id)?;
                            Some((p.id, ServerMessage::GameStarted { seat, state: snapshot }))
                        })
                        .collect();
                    outbox.extend(game_update(&room, &events));
                    drop(room);
                    state.deliver(outbox);
                }
                Err(e) => state.send_to_player(player_id, error_message(e)),
            }
        }

        ClientMessage::GameAction { action } => {
            let Some(room_id) = state.player_rooms.get(&player_id).map(|r| *r) else {
                state.send_to_player(player_id, error_message("Not in a room"));
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };
            match room.apply_action(player_id, action) {
                Ok(events) => {
                    let mut outbox = vec![(
                        player_id,
                        ServerMessage::ActionResult {
                            success: true,
                            events: events.clone(),
                            error: None,
                        },
                    )];
                    outbox.extend(game_update(&room, &events));
                    drop(room);
                    state.deliver(outbox);
                }
                Err(e) => {
                    drop(room);
                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionResult {
                            success: false,
                            events: vec![],
                            error: Some(e.to_string()),
                        },
                    );
                }
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Handle player disconnect.
/// Take a player out of their room, closing it once no human is left.
/// A bot takes over a seat left mid-game; everyone still seated sees its moves.
fn leave_room(player_id: Uuid, state: &ServerState) -> bool {
    let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
        return false;
    };
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return true;
    };

    let departure = match room.remove_player(player_id) {
        Ok(departure) => departure,
        Err(e) => {
            warn!(%player_id, %room_id, error = %e, "leave failed");
            return true;
        }
    };
    if departure.empty {
        drop(room);
        state.rooms.remove(&room_id);
        info!(%room_id, "room closed");
        return true;
    }

    let room_info = room.to_info();
    let outbox = game_update(&room, &departure.events);
    drop(room);
    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    state.deliver(outbox);
    true
}

/// A dropped connection leaves its room; there is no way back into a seat
fn handle_disconnect(player_id: Uuid, state: &ServerState) {
    leave_room(player_id, state);
}
