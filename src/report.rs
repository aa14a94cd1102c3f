//! High-score derivation: email masking and time-played formatting.

use chrono::NaiveDateTime;

/// Mask shown between the visible head and tail of an email.
const MASK: &str = "****";

/// Visible characters at each end of a masked email.
const VISIBLE: usize = 3;

/// Anonymizes an email for the high-score table.
///
/// The first three and last three characters stay visible with a
/// fixed-length mask in between: `"test_email@gmail.com"` becomes
/// `"tes****com"`. Inputs shorter than seven characters would echo most of
/// the address, so they render fully masked.
pub fn mask_email(email: &str) -> String {
    let chars: Vec<char> = email.chars().collect();
    if chars.len() < 2 * VISIBLE + 1 {
        return MASK.to_string();
    }
    let head: String = chars[..VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE..].iter().collect();
    format!("{head}{MASK}{tail}")
}

/// Renders the elapsed time of a session.
///
/// Whole minutes truncate: below one minute the seconds are shown,
/// otherwise only the minute count. A session without an end timestamp
/// renders as `"In progress"`.
pub fn format_time_played(
    created_at: NaiveDateTime,
    ended_at: Option<NaiveDateTime>,
) -> String {
    let Some(ended_at) = ended_at else {
        return "In progress".to_string();
    };
    let elapsed = ended_at.signed_duration_since(created_at);
    let minutes = elapsed.num_minutes();
    if minutes == 0 {
        format!("{} seconds", elapsed.num_seconds())
    } else {
        format!("{} minutes", minutes)
    }
}
