//! Credit accounting rules.
//!
//! Credits gate session and game creation only, never continuation of a
//! game already in progress.

use derive_more::{Display, Error};

/// Credits debited when a session or game starts.
pub const PLAY_COST: i32 = 3;

/// Credits awarded for winning a game.
pub const WIN_BONUS: i32 = 4;

/// Rejected debit that would drive a balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("insufficient credits: balance {balance}, required {required}")]
pub struct InsufficientCredits {
    /// Balance at the time of the rejected debit.
    pub balance: i32,
    /// Amount the debit required.
    pub required: i32,
}

/// Debits `amount` from `balance`.
///
/// # Errors
///
/// Returns [`InsufficientCredits`] if the result would be negative. The
/// balance is never clamped.
pub fn debit(balance: i32, amount: i32) -> Result<i32, InsufficientCredits> {
    if balance < amount {
        return Err(InsufficientCredits {
            balance,
            required: amount,
        });
    }
    Ok(balance - amount)
}

/// Credits `amount` to `balance`.
pub fn credit(balance: i32, amount: i32) -> i32 {
    balance + amount
}

/// True when the balance can cover starting another game.
pub fn can_afford_game(balance: i32) -> bool {
    balance >= PLAY_COST
}
