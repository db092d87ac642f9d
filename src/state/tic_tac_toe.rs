//! Tic-tac-toe board derivation from an unordered move log.
//!
//! The derivation is pure so it can be recomputed whenever the move log changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::facts::Move;

/// Number of cells on the board.
pub const BOARD_SIZE: usize = 9;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Mark placed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// Mark owning the move with the given zero-based turn index.
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 { Mark::X } else { Mark::O }
    }

    /// The other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// Outcome of a finished (or not yet finished) game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Winner {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

/// Role a player holds in a particular game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    #[serde(rename = "X")]
    X,
    #[serde(rename = "O")]
    O,
    Observer,
}

impl PlayerRole {
    /// Mark played by this role, `None` for observers.
    pub fn mark(self) -> Option<Mark> {
        match self {
            PlayerRole::X => Some(Mark::X),
            PlayerRole::O => Some(Mark::O),
            PlayerRole::Observer => None,
        }
    }
}

impl From<Mark> for PlayerRole {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => PlayerRole::X,
            Mark::O => PlayerRole::O,
        }
    }
}

/// Board state derived from the move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TicTacToeState {
    #[schema(value_type = Vec<Option<Mark>>)]
    pub board: [Option<Mark>; BOARD_SIZE],
    pub current_player: Mark,
    pub winner: Option<Winner>,
    pub is_game_over: bool,
}

/// User-correctable reasons a move is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("It is not your turn")]
    NotYourTurn,
    #[error("Position already occupied")]
    PositionOccupied,
    #[error("Game is already over")]
    GameOver,
    #[error("Position must be between 0 and 8")]
    InvalidPosition,
}

/// Derive the board from `moves`, regardless of the order they were delivered in.
///
/// Moves are applied by ascending `index`. A move whose position is off the board or
/// whose cell is already taken is skipped, so the earliest move on a cell wins.
pub fn compute_tic_tac_toe_state(moves: &[Move]) -> TicTacToeState {
    let mut ordered: Vec<&Move> = moves.iter().collect();
    ordered.sort_by_key(|mv| mv.index);

    let mut board = [None; BOARD_SIZE];
    for mv in ordered {
        let Some(cell) = usize::try_from(mv.position)
            .ok()
            .and_then(|position| board.get_mut(position))
        else {
            continue;
        };
        if cell.is_none() {
            *cell = Some(Mark::for_index(mv.index as usize));
        }
    }

    let board_full = board.iter().all(Option::is_some);
    let winner = find_line_winner(&board)
        .map(Winner::from)
        .or(board_full.then_some(Winner::Draw));

    TicTacToeState {
        board,
        current_player: Mark::for_index(moves.len()),
        winner,
        is_game_over: winner.is_some() || board_full,
    }
}

fn find_line_winner(board: &[Option<Mark>; BOARD_SIZE]) -> Option<Mark> {
    LINES.iter().find_map(|&[a, b, c]| match (board[a], board[b], board[c]) {
        (Some(first), Some(second), Some(third)) if first == second && second == third => {
            Some(first)
        }
        _ => None,
    })
}

/// Map a player to their role given who challenged whom and who moves first.
pub fn compute_player_role<T: PartialEq + ?Sized>(
    player: &T,
    challenger: &T,
    opponent: &T,
    challenger_starts: bool,
) -> PlayerRole {
    let challenger_mark = if challenger_starts { Mark::X } else { Mark::O };
    if player == challenger {
        challenger_mark.into()
    } else if player == opponent {
        challenger_mark.opponent().into()
    } else {
        PlayerRole::Observer
    }
}

/// Whether `role` holds the mark expected to move next. Observers never do.
pub fn compute_is_current_player_turn(state: &TicTacToeState, role: PlayerRole) -> bool {
    role.mark() == Some(state.current_player)
}

/// Check whether `role` may play `position` on the current board.
pub fn validate_move(
    state: &TicTacToeState,
    role: PlayerRole,
    position: u32,
) -> Result<(), MoveError> {
    if state.is_game_over {
        return Err(MoveError::GameOver);
    }
    let cell = usize::try_from(position)
        .ok()
        .and_then(|position| state.board.get(position))
        .ok_or(MoveError::InvalidPosition)?;
    if !compute_is_current_player_turn(state, role) {
        return Err(MoveError::NotYourTurn);
    }
    if cell.is_some() {
        return Err(MoveError::PositionOccupied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::dao::facts::FactHash;

    fn mv(index: u32, position: u32) -> Move {
        Move {
            game: FactHash::new("game"),
            index,
            position,
        }
    }

    const X: Option<Mark> = Some(Mark::X);
    const O: Option<Mark> = Some(Mark::O);
    const E: Option<Mark> = None;

    #[test]
    fn empty_game_starts_with_x() {
        let state = compute_tic_tac_toe_state(&[]);
        assert_eq!(state.board, [None; BOARD_SIZE]);
        assert_eq!(state.current_player, Mark::X);
        assert_eq!(state.winner, None);
        assert!(!state.is_game_over);
    }

    #[test]
    fn three_moves_alternate_marks() {
        let state = compute_tic_tac_toe_state(&[mv(0, 0), mv(1, 4), mv(2, 1)]);
        assert_eq!(state.board, [X, X, E, E, O, E, E, E, E]);
        assert_eq!(state.current_player, Mark::O);
        assert_eq!(state.winner, None);
        assert!(!state.is_game_over);
    }

    #[test]
    fn out_of_order_delivery_is_sorted_by_index() {
        let ordered = compute_tic_tac_toe_state(&[mv(0, 0), mv(1, 4), mv(2, 1)]);
        let shuffled = compute_tic_tac_toe_state(&[mv(2, 1), mv(0, 0), mv(1, 4)]);
        assert_eq!(ordered, shuffled);
    }

    #[test]
    fn occupied_cell_keeps_first_mark() {
        let state = compute_tic_tac_toe_state(&[mv(0, 4), mv(1, 4)]);
        assert_eq!(state.board[4], X);
        assert_eq!(state.board.iter().filter(|cell| cell.is_some()).count(), 1);
    }

    #[test]
    fn off_board_positions_are_ignored() {
        let state = compute_tic_tac_toe_state(&[mv(0, 9), mv(1, 42)]);
        assert_eq!(state.board, [None; BOARD_SIZE]);
        assert_eq!(state.current_player, Mark::X);
    }

    #[test]
    fn top_row_wins_for_x() {
        let state = compute_tic_tac_toe_state(&[mv(0, 0), mv(1, 3), mv(2, 1), mv(3, 4), mv(4, 2)]);
        assert_eq!(state.board, [X, X, X, O, O, E, E, E, E]);
        assert_eq!(state.winner, Some(Winner::X));
        assert!(state.is_game_over);
    }

    #[test]
    fn diagonal_wins_for_o() {
        let state = compute_tic_tac_toe_state(&[
            mv(0, 1),
            mv(1, 0),
            mv(2, 2),
            mv(3, 4),
            mv(4, 3),
            mv(5, 8),
        ]);
        assert_eq!(state.winner, Some(Winner::O));
        assert!(state.is_game_over);
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        // X O X / X O O / O X X
        let state = compute_tic_tac_toe_state(&[
            mv(0, 0),
            mv(1, 1),
            mv(2, 2),
            mv(3, 4),
            mv(4, 3),
            mv(5, 5),
            mv(6, 7),
            mv(7, 6),
            mv(8, 8),
        ]);
        assert_eq!(state.board, [X, O, X, X, O, O, O, X, X]);
        assert_eq!(state.winner, Some(Winner::Draw));
        assert!(state.is_game_over);
    }

    #[test]
    fn player_role_follows_who_starts() {
        assert_eq!(compute_player_role("a", "a", "b", true), PlayerRole::X);
        assert_eq!(compute_player_role("b", "a", "b", true), PlayerRole::O);
        assert_eq!(compute_player_role("a", "a", "b", false), PlayerRole::O);
        assert_eq!(compute_player_role("b", "a", "b", false), PlayerRole::X);
        assert_eq!(compute_player_role("c", "a", "b", true), PlayerRole::Observer);
    }

    #[test]
    fn turn_follows_move_parity() {
        let state = compute_tic_tac_toe_state(&[mv(0, 0)]);
        assert!(compute_is_current_player_turn(&state, PlayerRole::O));
        assert!(!compute_is_current_player_turn(&state, PlayerRole::X));
        assert!(!compute_is_current_player_turn(&state, PlayerRole::Observer));
    }

    #[test]
    fn validate_move_reports_user_errors() {
        let state = compute_tic_tac_toe_state(&[mv(0, 0)]);
        assert_eq!(
            validate_move(&state, PlayerRole::X, 1),
            Err(MoveError::NotYourTurn)
        );
        assert_eq!(
            validate_move(&state, PlayerRole::O, 0),
            Err(MoveError::PositionOccupied)
        );
        assert_eq!(
            validate_move(&state, PlayerRole::O, 9),
            Err(MoveError::InvalidPosition)
        );
        assert_eq!(validate_move(&state, PlayerRole::O, 4), Ok(()));

        let finished =
            compute_tic_tac_toe_state(&[mv(0, 0), mv(1, 3), mv(2, 1), mv(3, 4), mv(4, 2)]);
        assert_eq!(
            validate_move(&finished, PlayerRole::O, 8),
            Err(MoveError::GameOver)
        );
        assert_eq!(MoveError::GameOver.to_string(), "Game is already over");
        assert_eq!(MoveError::NotYourTurn.to_string(), "It is not your turn");
        assert_eq!(
            MoveError::PositionOccupied.to_string(),
            "Position already occupied"
        );
    }

    #[test]
    fn winner_serializes_draw_in_lowercase() {
        assert_eq!(serde_json::to_string(&Winner::Draw).unwrap(), "\"draw\"");
        assert_eq!(serde_json::to_string(&Winner::X).unwrap(), "\"X\"");
        assert_eq!(
            serde_json::to_string(&PlayerRole::Observer).unwrap(),
            "\"observer\""
        );
    }

    fn move_log() -> impl Strategy<Value = (Vec<Move>, Vec<Move>)> {
        proptest::collection::vec(0u32..12, 0..12).prop_flat_map(|positions| {
            let moves: Vec<Move> = positions
                .iter()
                .enumerate()
                .map(|(index, &position)| mv(index as u32, position))
                .collect();
            (Just(moves.clone()), Just(moves).prop_shuffle())
        })
    }

    proptest! {
        #[test]
        fn derivation_ignores_delivery_order((moves, shuffled) in move_log()) {
            prop_assert_eq!(
                compute_tic_tac_toe_state(&moves),
                compute_tic_tac_toe_state(&shuffled)
            );
        }
    }
}
