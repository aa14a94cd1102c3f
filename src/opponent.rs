//! Opponent move selection.

use crate::board::{Board, Field};
use rand::Rng;

/// Strategy for choosing the counter-move after a human move.
pub trait OpponentStrategy: Send + Sync {
    /// Picks a free spot on the board.
    ///
    /// Callers guarantee at least one free spot exists.
    fn choose(&self, board: &Board) -> Field;
}

/// Picks uniformly at random among the free spots.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOpponent;

impl OpponentStrategy for RandomOpponent {
    fn choose(&self, board: &Board) -> Field {
        let spots = board.free_spots();
        spots[rand::rng().random_range(0..spots.len())]
    }
}
