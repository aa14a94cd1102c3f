//! Tests for the board engine: coordinate validation, move application,
//! free-spot enumeration and terminal evaluation.

use gridplay::{Board, BoardState, CoordError, Field, Mark};

fn field(row: i32, col: i32) -> Field {
    Field::new(Some(row), Some(col)).expect("Coordinates should be valid")
}

/// Applies a sequence of (row, col, mark) moves.
fn play_out(moves: &[(i32, i32, Mark)]) -> Board {
    let mut board = Board::new();
    for &(row, col, mark) in moves {
        let f = field(row, col);
        assert!(board.is_move_possible(f), "Cell ({row},{col}) occupied");
        board.apply_move(f, mark);
    }
    board
}

#[test]
fn test_new_board_is_empty_and_in_play() {
    let board = Board::new();
    assert_eq!(board.free_spots().len(), 9);
    assert_eq!(board.evaluate(), BoardState::InPlay);
}

#[test]
fn test_field_rejects_out_of_range_row() {
    let err = Field::new(Some(0), Some(2)).expect_err("Row 0 must be rejected");
    match err {
        CoordError::InvalidFields(fields) => {
            assert_eq!(fields.len(), 1);
            assert!(fields.contains_key("row"));
        }
        other => panic!("Expected InvalidFields, got {other:?}"),
    }
}

#[test]
fn test_field_collects_one_error_per_invalid_field() {
    let err = Field::new(Some(4), Some(-1)).expect_err("Both fields invalid");
    match err {
        CoordError::InvalidFields(fields) => {
            assert!(fields.contains_key("row"));
            assert!(fields.contains_key("col"));
        }
        other => panic!("Expected InvalidFields, got {other:?}"),
    }
}

#[test]
fn test_field_single_missing_coordinate_is_a_field_error() {
    let err = Field::new(Some(2), None).expect_err("Missing col must be rejected");
    match err {
        CoordError::InvalidFields(fields) => {
            assert_eq!(fields.len(), 1);
            assert!(fields.contains_key("col"));
        }
        other => panic!("Expected InvalidFields, got {other:?}"),
    }
}

#[test]
fn test_field_both_missing_is_distinct_error() {
    let err = Field::new(None, None).expect_err("Missing both must be rejected");
    assert_eq!(err, CoordError::MissingFields);
}

#[test]
fn test_occupied_cell_is_not_playable() {
    let mut board = Board::new();
    board.apply_move(field(2, 2), Mark::X);
    assert!(!board.is_move_possible(field(2, 2)));
    assert!(board.is_move_possible(field(1, 1)));
}

#[test]
fn test_free_spots_scan_row_major() {
    let mut board = Board::new();
    board.apply_move(field(1, 1), Mark::X);
    board.apply_move(field(2, 3), Mark::O);

    let spots = board.free_spots();
    assert_eq!(spots.len(), 7);
    // First free spot after (1,1) is (1,2); (2,3) is skipped later.
    assert_eq!(spots[0], field(1, 2));
    assert_eq!(spots[1], field(1, 3));
    assert_eq!(spots[4], field(3, 1));
}

#[test]
fn test_row_win() {
    let board = play_out(&[
        (2, 1, Mark::O),
        (2, 2, Mark::O),
        (2, 3, Mark::O),
    ]);
    assert_eq!(board.evaluate(), BoardState::Won(Mark::O));
}

#[test]
fn test_column_win() {
    let board = play_out(&[
        (1, 3, Mark::X),
        (2, 3, Mark::X),
        (3, 3, Mark::X),
    ]);
    assert_eq!(board.evaluate(), BoardState::Won(Mark::X));
}

#[test]
fn test_main_diagonal_win() {
    let board = play_out(&[
        (1, 1, Mark::X),
        (2, 2, Mark::X),
        (3, 3, Mark::X),
    ]);
    assert_eq!(board.evaluate(), BoardState::Won(Mark::X));
}

#[test]
fn test_anti_diagonal_win() {
    let board = play_out(&[
        (1, 3, Mark::O),
        (2, 2, Mark::O),
        (3, 1, Mark::O),
    ]);
    assert_eq!(board.evaluate(), BoardState::Won(Mark::O));
}

#[test]
fn test_draw_full_board_no_line() {
    // X O X / X O O / O X X
    let board = play_out(&[
        (1, 1, Mark::X),
        (1, 2, Mark::O),
        (1, 3, Mark::X),
        (2, 1, Mark::X),
        (2, 2, Mark::O),
        (2, 3, Mark::O),
        (3, 1, Mark::O),
        (3, 2, Mark::X),
        (3, 3, Mark::X),
    ]);
    assert!(board.free_spots().is_empty());
    assert_eq!(board.evaluate(), BoardState::Draw);
}

#[test]
fn test_partial_board_stays_in_play() {
    let board = play_out(&[(1, 1, Mark::X), (2, 2, Mark::O), (3, 3, Mark::X)]);
    assert_eq!(board.evaluate(), BoardState::InPlay);
}

#[test]
fn test_win_detected_before_draw_on_full_board() {
    // Full board where X completes the last row with the final move.
    let board = play_out(&[
        (1, 1, Mark::X),
        (1, 2, Mark::O),
        (1, 3, Mark::X),
        (2, 1, Mark::O),
        (2, 2, Mark::X),
        (2, 3, Mark::O),
        (3, 1, Mark::O),
        (3, 2, Mark::X),
        (3, 3, Mark::X),
    ]);
    // The diagonal (1,1)(2,2)(3,3) is complete; never reported as a draw.
    assert_eq!(board.evaluate(), BoardState::Won(Mark::X));
}

#[test]
fn test_board_json_round_trips() {
    let board = play_out(&[(1, 2, Mark::X), (3, 1, Mark::O)]);
    let json = serde_json::to_string(&board).expect("Serialize failed");
    assert!(json.contains("\"X\""));
    let restored: Board = serde_json::from_str(&json).expect("Deserialize failed");
    assert_eq!(restored, board);
}

#[test]
fn test_mark_db_strings() {
    assert_eq!(Mark::X.to_db_string(), "X");
    assert_eq!(Mark::from_db_string("O"), Some(Mark::O));
    assert_eq!(Mark::from_db_string("Z"), None);
    assert_eq!(Mark::X.opponent(), Mark::O);
}
