//! Settlers - a hex-board trading and building game engine
//!
//! This crate provides the core rules of the game, including:
//! - Hex, intersection and edge coordinates for the board
//! - Board generation, validation and adjacency queries
//! - Placement rules, longest road and the robber
//! - Resource and development card bookkeeping with a bank
//! - A turn and phase state machine with full rule enforcement
//! - Bots that play any seat
//!
//! # Architecture
//!
//! The engine is platform-agnostic and does no I/O. Hosts (see the
//! `settlers-server` crate) drive a [`Game`] with [`GameAction`]s and
//! broadcast the resulting [`GameEvent`]s and [`GameSnapshot`]s.
//!
//! # Modules
//!
//! - [`hex`]: Coordinate system for hexes, intersections and edges
//! - [`configuration`]: Board layouts, beginner and random
//! - [`map`]: The built board and its adjacency queries
//! - [`management`]: Placement rules, roads and the robber
//! - [`resources`]: Bank, hands, trades and development cards
//! - [`game`]: Turn and phase state machine
//! - [`bot`]: AI players

pub mod actions;
pub mod bot;
pub mod configuration;
pub mod error;
pub mod game;
pub mod hex;
pub mod inventory;
pub mod management;
pub mod map;
pub mod player;
pub mod resources;
pub mod rules;
pub mod victory;

// Re-export commonly used types
pub use actions::{GameAction, GameEvent, TradeOffer};
pub use bot::{bot_discard, Bot};
pub use configuration::{Configuration, ConfigurationError};
pub use error::GameError;
pub use game::{Game, GameSnapshot, GameState, Phase, PlayerView, RobberOrigin, SetupPlacing};
pub use hex::{Direction, EdgeCoord, HexCoord, IntersectionCoord, MapPoint, Pole};
pub use inventory::{CardHand, DevelopmentCard, Inventory, Resource, ResourceHand};
pub use management::{MapManagement, PlacementMode};
pub use map::{Building, HarborKind, HexKind, MapModel, MapView};
pub use player::{Actor, ActorKind, BotDifficulty, PlayerId};
pub use resources::ResourceEngine;
pub use rules::Rules;
pub use victory::VictoryCalculator;
