//! Property tests for the rule engine.

use proptest::prelude::*;

use ludo_server::core::{DeterministicRng, ScriptedDice};
use ludo_server::game::board::{is_safe, HOME_STRETCH_LEN};
use ludo_server::game::engine::{
    eligible_pieces, move_piece, replay_match, resolve_move, roll_dice, MatchAction, PITY_LIMIT,
};
use ludo_server::game::{ActionRejected, MatchState, PieceIndex, Player, Position};

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::Base),
        (0u8..52).prop_map(Position::Track),
        (0u8..HOME_STRETCH_LEN).prop_map(Position::HomeStretch),
        Just(Position::Home),
    ]
}

fn any_player() -> impl Strategy<Value = Player> {
    prop_oneof![Just(Player::One), Just(Player::Two)]
}

fn board() -> impl Strategy<Value = MatchState> {
    prop::array::uniform8(position()).prop_map(|squares| {
        let mut state = MatchState::new();
        for (i, square) in squares.into_iter().enumerate() {
            let player = Player::ALL[i / PieceIndex::COUNT];
            let piece = PieceIndex::ALL[i % PieceIndex::COUNT];
            state = state.with_position(player, piece, square);
        }
        state
    })
}

/// One step of a recorded game.
struct Step {
    before: MatchState,
    after: MatchState,
    forced: bool,
    rolled: u8,
}

/// Play `turns` rolls with seeded dice, picking pieces from `choices`.
fn play(seed: u64, choices: &[u8], turns: usize) -> (MatchState, Vec<MatchAction>, Vec<Step>) {
    let mut rng = DeterministicRng::new(seed);
    let mut state = MatchState::new();
    let mut actions = Vec::new();
    let mut steps = Vec::new();

    for turn in 0..turns {
        if state.is_over() {
            break;
        }
        let player = state.turn();
        let before = state.clone();
        let (next, roll) = roll_dice(&state, player, &mut rng).unwrap();
        actions.push(MatchAction::Roll { player, value: roll.value });
        state = next;

        if !roll.eligible.is_empty() {
            let pick = choices[turn % choices.len()] as usize;
            let piece = roll.eligible[pick % roll.eligible.len()];
            state = move_piece(&state, player, piece).unwrap().0;
            actions.push(MatchAction::Move { player, piece });
        }

        steps.push(Step { before, after: state.clone(), forced: roll.forced, rolled: roll.value });
    }

    (state, actions, steps)
}

proptest! {
    #[test]
    fn prop_base_moves_only_on_six(state in board(), player in any_player(), value in 1u8..=6) {
        for piece in eligible_pieces(&state, player, value) {
            if state.position(player, piece).is_base() {
                prop_assert_eq!(value, 6);
            }
        }
    }

    #[test]
    fn prop_eligible_never_overshoots(state in board(), player in any_player(), value in 1u8..=6) {
        for piece in eligible_pieces(&state, player, value) {
            match state.position(player, piece) {
                Position::Home => prop_assert!(false, "home piece listed as eligible"),
                Position::HomeStretch(k) => prop_assert!(value <= HOME_STRETCH_LEN - k),
                _ => {}
            }
        }
    }

    #[test]
    fn prop_eligible_pieces_can_move(state in board(), player in any_player(), value in 1u8..=6) {
        prop_assume!(!state.is_over());
        let eligible = eligible_pieces(&state, player, value);

        let mut dice = ScriptedDice::new([value]);
        let (rolled, outcome) = roll_dice(&state.clone().with_turn(player).with_pity(player, 0), player, &mut dice).unwrap();
        prop_assert_eq!(&outcome.eligible, &eligible);

        for piece in PieceIndex::ALL {
            let result = move_piece(&rolled, player, piece);
            if eligible.is_empty() {
                // The roll already passed the turn
                prop_assert_eq!(result.unwrap_err(), ActionRejected::NotYourTurn { expected: player.opponent() });
            } else if eligible.contains(&piece) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.unwrap_err(), ActionRejected::PieceNotEligible(piece));
            }
        }
    }

    #[test]
    fn prop_captures_only_on_unsafe_track(state in board(), player in any_player(), value in 1u8..=6) {
        let opponent = player.opponent();
        for piece in eligible_pieces(&state, player, value) {
            let (next, resolution) = resolve_move(&state, player, piece, value);
            let landing = *resolution.path.last().unwrap();

            for other in PieceIndex::ALL {
                let was = state.position(opponent, other);
                let now = next.position(opponent, other);
                if was == now {
                    continue;
                }
                prop_assert_eq!(now, Position::Base);
                prop_assert!(was.track_square().is_some());
                prop_assert!(!is_safe(was));
                prop_assert_eq!(was, landing);
                prop_assert!(resolution.captures.iter().any(|c| c.piece == other));
            }

            // The mover's other pieces never move
            for own in PieceIndex::ALL.into_iter().filter(|p| *p != piece) {
                prop_assert_eq!(state.position(player, own), next.position(player, own));
            }
        }
    }

    #[test]
    fn prop_pity_stays_bounded(seed in any::<u64>(), choices in prop::collection::vec(any::<u8>(), 1..8)) {
        let (_, _, steps) = play(seed, &choices, 300);
        for step in &steps {
            for player in Player::ALL {
                prop_assert!(step.after.pity(player) <= PITY_LIMIT);
            }
            let roller = step.before.turn();
            if step.before.pity(roller) >= PITY_LIMIT {
                prop_assert!(step.forced);
                prop_assert_eq!(step.rolled, 6);
            }
            if step.rolled == 6 {
                prop_assert_eq!(step.after.pity(roller), 0);
            }
        }
    }

    #[test]
    fn prop_win_iff_all_home(seed in any::<u64>(), choices in prop::collection::vec(any::<u8>(), 1..8)) {
        let (_, _, steps) = play(seed, &choices, 400);
        for step in &steps {
            for player in Player::ALL {
                let all_home = step.after.positions(player).iter().all(|p| p.is_home());
                prop_assert_eq!(step.after.has_won(player), all_home);
                if step.before.has_won(player) {
                    prop_assert!(step.after.has_won(player));
                }
            }
        }
    }

    #[test]
    fn prop_replay_reproduces_state(seed in any::<u64>(), choices in prop::collection::vec(any::<u8>(), 1..8)) {
        let (state, actions, _) = play(seed, &choices, 200);
        let replayed = replay_match(&actions).unwrap();
        prop_assert_eq!(replayed.compute_hash(), state.compute_hash());
        prop_assert_eq!(replayed, state);
    }
}

#[test]
fn test_same_seed_same_game() {
    let (a, actions_a, _) = play(99, &[0, 3, 1], 250);
    let (b, actions_b, _) = play(99, &[0, 3, 1], 250);
    assert_eq!(actions_a, actions_b);
    assert_eq!(a.compute_hash(), b.compute_hash());
}

#[test]
fn test_matches_run_to_a_winner() {
    // Always moving the highest eligible piece finishes well within the bound
    let mut rng = DeterministicRng::new(2024);
    let mut state = MatchState::new();
    let mut rolls = 0;

    while !state.is_over() {
        rolls += 1;
        assert!(rolls < 5000, "match did not finish");

        let player = state.turn();
        let (next, roll) = roll_dice(&state, player, &mut rng).unwrap();
        state = next;
        if let Some(piece) = roll.eligible.last() {
            state = move_piece(&state, player, *piece).unwrap().0;
        }
    }

    let winner = state.winner().unwrap();
    assert!(state.has_won(winner));
    assert_eq!(
        roll_dice(&state, state.turn(), &mut rng).unwrap_err(),
        ActionRejected::MatchOver
    );
}
