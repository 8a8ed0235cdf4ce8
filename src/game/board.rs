//! Board Topology
//!
//! Static layout of the board: the 52-square shared track, each player's
//! entry square, turning point, home stretch, home and base slots, and the
//! safe squares. Pure data plus the single-step advance rule.
//!
//! ## Addressable squares
//!
//! Renderers address every square with one integer:
//!
//! | Square            | P1          | P2          |
//! |-------------------|-------------|-------------|
//! | Shared track      | `0..=51`    | `0..=51`    |
//! | Home stretch `k`  | `100 + k`   | `200 + k`   |
//! | Home              | `105`       | `205`       |
//! | Base slot `i`     | `500 + i`   | `600 + i`   |

use crate::game::state::{Player, PieceIndex, Position};

/// Squares on the shared circular track.
pub const TRACK_LEN: u8 = 52;

/// Squares in each player's private approach to home.
pub const HOME_STRETCH_LEN: u8 = 5;

/// Track squares where captures never happen. Both entry squares are safe.
pub const SAFE_SQUARES: [u8; 8] = [0, 8, 13, 21, 26, 34, 39, 47];

const ENTRY_SQUARES: [u8; 2] = [0, 26];
const TURNING_POINTS: [u8; 2] = [50, 24];
const HOME_STRETCH_ORIGIN: [u16; 2] = [100, 200];
const BASE_ORIGIN: [u16; 2] = [500, 600];

/// Track coordinate a piece lands on when it leaves base.
#[inline]
pub fn entry_square(player: Player) -> u8 {
    ENTRY_SQUARES[player.index()]
}

/// Last track square before the player turns into their home stretch.
#[inline]
pub fn turning_point(player: Player) -> u8 {
    TURNING_POINTS[player.index()]
}

/// Addressable square of home stretch index `k` (`k == HOME_STRETCH_LEN` is home).
#[inline]
pub fn home_stretch_square(player: Player, k: u8) -> u16 {
    HOME_STRETCH_ORIGIN[player.index()] + k as u16
}

/// Addressable square of the player's home.
#[inline]
pub fn home_square(player: Player) -> u16 {
    home_stretch_square(player, HOME_STRETCH_LEN)
}

/// Addressable base slot owned by one piece.
#[inline]
pub fn base_square(player: Player, piece: PieceIndex) -> u16 {
    BASE_ORIGIN[player.index()] + piece.get() as u16
}

/// Addressable square for a piece at `position`.
pub fn square_of(player: Player, piece: PieceIndex, position: Position) -> u16 {
    match position {
        Position::Base => base_square(player, piece),
        Position::Track(n) => n as u16,
        Position::HomeStretch(k) => home_stretch_square(player, k),
        Position::Home => home_square(player),
    }
}

/// Is `position` a safe square? Only track squares can be.
pub fn is_safe(position: Position) -> bool {
    match position {
        Position::Track(n) => SAFE_SQUARES.contains(&n),
        _ => false,
    }
}

/// Does `position` exist on the board? Track squares run `0..52` and
/// stretch indices `0..5`.
pub fn is_valid(position: Position) -> bool {
    match position {
        Position::Track(n) => n < TRACK_LEN,
        Position::HomeStretch(k) => k < HOME_STRETCH_LEN,
        Position::Base | Position::Home => true,
    }
}

/// Position reached by moving exactly one step along `player`'s route.
///
/// `Base` steps onto the entry square and `Home` stays put; the engine
/// never asks for either but the function is total.
pub fn advance_one_step(player: Player, position: Position) -> Position {
    match position {
        Position::Base => Position::Track(entry_square(player)),
        Position::Track(n) if n == turning_point(player) => Position::HomeStretch(0),
        Position::Track(n) => Position::Track((n + 1) % TRACK_LEN),
        Position::HomeStretch(k) if k + 1 >= HOME_STRETCH_LEN => Position::Home,
        Position::HomeStretch(k) => Position::HomeStretch(k + 1),
        Position::Home => Position::Home,
    }
}

/// Steps left before `position` reaches home along `player`'s route.
///
/// `None` for a piece still in base. Only meaningful for [`is_valid`]
/// positions.
pub fn steps_to_home(player: Player, position: Position) -> Option<u8> {
    match position {
        Position::Base => None,
        Position::Track(n) => {
            let turn = turning_point(player);
            let on_track = (turn + TRACK_LEN - n % TRACK_LEN) % TRACK_LEN;
            Some(on_track + 1 + HOME_STRETCH_LEN)
        }
        Position::HomeStretch(k) => Some(HOME_STRETCH_LEN.saturating_sub(k)),
        Position::Home => Some(0),
    }
}
