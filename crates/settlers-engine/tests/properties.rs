//! Property-based tests for board, bank and robber invariants

mod common;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use settlers_engine::*;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    }
}

fn board_from_seed(seed: u64) -> MapManagement {
    let configuration = Configuration::random(&mut StdRng::seed_from_u64(seed));
    MapManagement::new(MapModel::build_from(&configuration).unwrap())
}

fn resource() -> impl Strategy<Value = Resource> {
    prop::sample::select(Resource::ALL.to_vec())
}

proptest! {
    #![proptest_config(config())]

    /// Property: Distance rule
    /// No two buildings are ever adjacent, and no intersection next to a
    /// building is offered as placeable.
    #[test]
    fn prop_distance_rule_holds(
        seed in any::<u64>(),
        picks in prop::collection::vec((0u8..4, any::<prop::sample::Index>()), 1..40),
    ) {
        let mut board = board_from_seed(seed);
        let corners: Vec<IntersectionCoord> = board.map().intersections().map(|i| i.coord).collect();

        for (player, index) in picks {
            let at = *index.get(&corners);
            let placeable = board.settlement_placeable(player, at.into(), PlacementMode::Setup);
            let placed = board.place_settlement(player, at.into(), PlacementMode::Setup);
            prop_assert_eq!(placeable, placed.is_ok());
        }

        for corner in &corners {
            let occupied = !board.map().building(*corner).is_free();
            let crowded = board
                .map()
                .neighbours_of_intersection(*corner)
                .iter()
                .any(|n| !board.map().building(*n).is_free());
            prop_assert!(!(occupied && crowded), "{corner} has an adjacent building");
            if crowded {
                for player in 0..4 {
                    prop_assert!(!board.settlement_placeable(player, (*corner).into(), PlacementMode::Setup));
                }
            }
        }
    }

    /// Property: Discard rule
    /// Over the threshold a player owes half, rounded down; at or below it nothing.
    #[test]
    fn prop_robber_tax(amounts in prop::array::uniform5(0u32..6)) {
        let rules = Rules::default();
        let mut engine = ResourceEngine::new(0..2, &rules);
        let hand = ResourceHand::with_amounts(amounts[0], amounts[1], amounts[2], amounts[3], amounts[4]);
        engine.grant(0, &hand).unwrap();

        let total = hand.total();
        let owed = engine.robber_tax(0, rules.discard_threshold);
        if total > 7 {
            prop_assert_eq!(owed, total / 2);
        } else {
            prop_assert_eq!(owed, 0);
        }
    }

    /// Property: Resource conservation
    /// Grants, payments, trades, steals and monopolies never create or
    /// destroy resources.
    #[test]
    fn prop_bank_operations_conserve(
        seed in any::<u64>(),
        ops in prop::collection::vec((0u8..6, 0u8..3, 0u8..3, resource(), resource(), 1u32..9), 1..60),
    ) {
        let rules = Rules::default();
        let board = board_from_seed(seed);
        let mut engine = ResourceEngine::new(0..3, &rules);
        let mut rng = StdRng::seed_from_u64(seed);

        for (op, a, b, give, want, amount) in ops {
            // rejected operations must not change anything either
            let _ = match op {
                0 => engine.grant(a, &ResourceHand::single(give, amount)).map(|_| ()),
                1 => engine.pay(a, &ResourceHand::single(give, amount)),
                2 => engine.trade_with_bank(a, give, amount, want, &board).map(|_| ()),
                3 => engine.trade_with_player(
                    a,
                    b,
                    &ResourceHand::single(give, 1),
                    &ResourceHand::single(want, 1),
                ),
                4 => {
                    engine.steal_random(a, b, &mut rng);
                    Ok(())
                }
                _ => engine.monopoly(a, give).map(|_| ()),
            };
            prop_assert!(engine.conservation_holds());
        }
    }

    /// Property: Robber invariant and conservation through whole games
    #[test]
    fn prop_bot_games_keep_invariants(seed in any::<u64>(), players in 2u8..=4) {
        common::init_logging();
        let configuration = Configuration::random(&mut StdRng::seed_from_u64(seed));
        let actors: Vec<Actor> = (0..players).map(|id| Actor::bot(id, BotDifficulty::Easy)).collect();
        let mut game = Game::new(actors, &configuration, Rules::default(), seed).unwrap();
        let mut bots: Vec<Bot> = (0..players)
            .map(|id| Bot::with_seed(id, BotDifficulty::Easy, seed ^ id as u64))
            .collect();

        for _ in 0..400 {
            let Some(&seat) = game.actors_to_move().first() else {
                break;
            };
            let Some(action) = bots[seat as usize].choose_action(&game) else {
                break;
            };
            prop_assert!(game.apply_action(seat, action).is_ok());
            prop_assert_eq!(game.map().robber_count(), 1);
            prop_assert!(game.resources().conservation_holds());
        }
    }

    /// Property: Moving the robber never duplicates or loses it
    #[test]
    fn prop_robber_moves(seed in any::<u64>(), targets in prop::collection::vec((-3i32..=3, -3i32..=3), 1..30)) {
        let mut board = board_from_seed(seed);
        for (q, r) in targets {
            let before = board.map().robber_position();
            let result = board.move_robber(MapPoint::hex(q, r));
            prop_assert_eq!(board.map().robber_count(), 1);
            match result {
                Ok(to) => {
                    prop_assert_ne!(to, before);
                    prop_assert_eq!(board.map().robber_position(), to);
                    prop_assert!(board.map().hex(to).is_some_and(|h| h.is_land()));
                }
                Err(_) => prop_assert_eq!(board.map().robber_position(), before),
            }
        }
    }
}
