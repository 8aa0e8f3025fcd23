//! Per-user fan-out of raw moves

use crate::types::{Candidate, PriceMove, UserConfig};
use std::sync::Arc;

/// Subscription, interval, threshold and direction must all hold
pub fn admits(user: &UserConfig, mv: &PriceMove) -> bool {
    user.subscribes_to(mv.exchange)
        && user.interval_mins == mv.interval_mins
        && mv.change_pct.abs() >= user.threshold_pct
        && user.signal_type.admits(mv.change_pct)
}

/// Every (user, move) pair the user's settings admit
pub fn fan_out(users: &[Arc<UserConfig>], moves: &[PriceMove]) -> Vec<Candidate> {
    moves
        .iter()
        .flat_map(|mv| {
            users
                .iter()
                .filter(move |user| admits(user, mv))
                .map(move |user| Candidate::from_move(Arc::clone(user), mv))
        })
        .collect()
}
