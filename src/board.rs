//! Board engine: pure 3x3 grid rules.
//!
//! All coordinate translation lives here. The public boundary speaks the
//! externally-facing 1-based convention via [`Field`]; the stored
//! representation is 0-based row-major.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Board side length.
const SIDE: usize = 3;

/// A player's mark on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// The X mark.
    X,
    /// The O mark.
    O,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// Picks a mark uniformly at random.
    pub fn random() -> Self {
        if rand::rng().random_bool(0.5) {
            Mark::X
        } else {
            Mark::O
        }
    }

    /// Converts the mark to the string stored in the database.
    pub fn to_db_string(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }

    /// Parses the mark from the string stored in the database.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "X" => Some(Mark::X),
            "O" => Some(Mark::O),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Error produced when 1-based coordinates fail validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    /// Both coordinates were absent from the input.
    MissingFields,
    /// One entry per invalid field, keyed by field name.
    InvalidFields(BTreeMap<&'static str, String>),
}

impl std::fmt::Display for CoordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordError::MissingFields => write!(f, "row and col fields are required"),
            CoordError::InvalidFields(fields) => write!(f, "invalid fields: {fields:?}"),
        }
    }
}

impl std::error::Error for CoordError {}

/// Validated 1-based board coordinates.
///
/// Construction is the only way to obtain a `Field`, so any `Field` handed
/// to the board is guaranteed in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Field {
    row: usize,
    col: usize,
}

impl Field {
    /// Validates optional 1-based coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::MissingFields`] when both coordinates are
    /// absent, otherwise [`CoordError::InvalidFields`] with one entry per
    /// missing or out-of-range field.
    pub fn new(row: Option<i32>, col: Option<i32>) -> Result<Self, CoordError> {
        if row.is_none() && col.is_none() {
            return Err(CoordError::MissingFields);
        }

        let mut errors = BTreeMap::new();
        let row = Self::check("row", row, &mut errors);
        let col = Self::check("col", col, &mut errors);

        match (row, col) {
            (Some(row), Some(col)) => Ok(Self { row, col }),
            _ => Err(CoordError::InvalidFields(errors)),
        }
    }

    fn check(
        name: &'static str,
        value: Option<i32>,
        errors: &mut BTreeMap<&'static str, String>,
    ) -> Option<usize> {
        match value {
            Some(v) if (1..=SIDE as i32).contains(&v) => Some(v as usize),
            Some(v) => {
                errors.insert(name, format!("must be between 1 and {SIDE}, got {v}"));
                None
            }
            None => {
                errors.insert(name, "field is required".to_string());
                None
            }
        }
    }

    /// 1-based row.
    pub fn row(&self) -> usize {
        self.row
    }

    /// 1-based column.
    pub fn col(&self) -> usize {
        self.col
    }

    fn index(&self) -> (usize, usize) {
        (self.row - 1, self.col - 1)
    }

    fn from_index(row: usize, col: usize) -> Self {
        Self {
            row: row + 1,
            col: col + 1,
        }
    }
}

/// Terminal evaluation of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    /// Moves remain and no line is complete.
    InPlay,
    /// Three identical marks complete a line.
    Won(Mark),
    /// Board full, no line complete.
    Draw,
}

impl BoardState {
    /// True when no further moves are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BoardState::InPlay)
    }
}

/// 3x3 tic-tac-toe board.
///
/// Serializes as a 3x3 array of `null | "X" | "O"`, which is also the JSON
/// persisted in the games table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<Mark>; SIDE]; SIDE],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, row: usize, col: usize) -> Option<Mark> {
        self.cells[row][col]
    }

    /// True iff the cell at `field` is empty.
    pub fn is_move_possible(&self, field: Field) -> bool {
        let (row, col) = field.index();
        self.cell(row, col).is_none()
    }

    /// Writes `mark` into the cell at `field`.
    ///
    /// The caller must have already confirmed [`Self::is_move_possible`];
    /// there is no internal re-check.
    pub fn apply_move(&mut self, field: Field, mark: Mark) {
        let (row, col) = field.index();
        self.cells[row][col] = Some(mark);
    }

    /// All empty cells in row-major scan order.
    pub fn free_spots(&self) -> Vec<Field> {
        let mut spots = Vec::new();
        for row in 0..SIDE {
            for col in 0..SIDE {
                if self.cell(row, col).is_none() {
                    spots.push(Field::from_index(row, col));
                }
            }
        }
        spots
    }

    /// Evaluates the board for a terminal state.
    ///
    /// Lines are checked in a fixed order: row 0, column 0, row 1,
    /// column 1, row 2, column 2, then the two diagonals. With no complete
    /// line and no free spot the result is a draw.
    pub fn evaluate(&self) -> BoardState {
        for i in 0..SIDE {
            if let Some(mark) = self.line_winner(|j| self.cell(i, j)) {
                return BoardState::Won(mark);
            }
            if let Some(mark) = self.line_winner(|j| self.cell(j, i)) {
                return BoardState::Won(mark);
            }
        }
        if let Some(mark) = self.line_winner(|j| self.cell(j, j)) {
            return BoardState::Won(mark);
        }
        if let Some(mark) = self.line_winner(|j| self.cell(j, SIDE - 1 - j)) {
            return BoardState::Won(mark);
        }

        if self.free_spots().is_empty() {
            BoardState::Draw
        } else {
            BoardState::InPlay
        }
    }

    fn line_winner(&self, cell_at: impl Fn(usize) -> Option<Mark>) -> Option<Mark> {
        let first = cell_at(0)?;
        (1..SIDE).all(|j| cell_at(j) == Some(first)).then_some(first)
    }
}
