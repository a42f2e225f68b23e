//! Shared helpers for the engine integration tests.
//!
//! Log level comes from `TEST_LOG`, then `RUST_LOG`, then `"warn"`:
//!
//! ```bash
//! TEST_LOG=debug cargo test -p settlers-engine
//! ```

#![allow(dead_code)]

use once_cell::sync::OnceCell;
use settlers_engine::*;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize test logging once per test binary
pub fn init_logging() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}

/// Human seats 0..n on the beginner board
pub fn new_game(players: u8, seed: u64) -> Game {
    init_logging();
    let actors = (0..players)
        .map(|id| Actor::human(id, format!("Player {}", id + 1)))
        .collect();
    Game::new(actors, &Configuration::beginner(), Rules::default(), seed).unwrap()
}

/// Helper to get any valid action of a specific type
pub fn find_action<F>(game: &Game, player: PlayerId, filter: F) -> Option<GameAction>
where
    F: Fn(&GameAction) -> bool,
{
    game.legal_actions(player).into_iter().find(filter)
}

/// Run through complete setup phase with valid placements
pub fn complete_setup(game: &mut Game) {
    let mut iterations = 0;
    let max_iterations = 100;

    while matches!(game.phase(), Phase::Setup { .. }) && iterations < max_iterations {
        let player = game.current_player();
        let action = game
            .legal_actions(player)
            .into_iter()
            .next()
            .expect("setup always has a legal placement");
        game.apply_action(player, action).unwrap();
        iterations += 1;
    }

    assert_eq!(game.phase(), &Phase::Roll, "setup should finish within {max_iterations} placements");
}

/// Grant from the bank until `player` holds exactly `target` cards,
/// cycling through resource types
pub fn top_up(game: &mut Game, player: PlayerId, target: u32) {
    let mut held = game.resources().hand_size(player);
    assert!(held <= target, "player {player} already holds {held}");
    for resource in Resource::ALL.into_iter().cycle() {
        if held == target {
            break;
        }
        held += game
            .grant_from_bank(player, &ResourceHand::single(resource, 1))
            .unwrap()
            .total();
    }
}

/// Exactly one robber, and it sits where the map says it does
pub fn assert_single_robber(game: &Game) {
    let map = game.map();
    assert_eq!(map.robber_count(), 1);
    let flagged: Vec<_> = map.hexes().filter(|h| h.robber).map(|h| h.coord).collect();
    assert_eq!(flagged, vec![map.robber_position()]);
}
