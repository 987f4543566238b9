//! Total ordering and competition ranking for round results and standings.
//!
//! Entries sort by a primary key descending (correct before incorrect, or
//! higher score first) and a time key ascending. Entries whose keys compare
//! equal share a rank; the next distinct entry takes its 1-based position,
//! so a tie at the top produces 1, 1, 3.

use std::cmp::Ordering;

use crate::answers::RoundResult;
use crate::stats::PlayerStats;

/// Two times closer than this (seconds) are treated as a tie.
pub const TIME_EPSILON: f32 = 1e-4;

/// Float comparison tolerant of accumulation noise.
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

/// Something that can be placed in a ranked list.
pub trait Rankable {
    /// Higher is better.
    fn primary_key(&self) -> i64;
    /// Lower is better.
    fn time_key(&self) -> f32;
    fn set_rank(&mut self, rank: u32);
}

impl Rankable for RoundResult {
    fn primary_key(&self) -> i64 {
        i64::from(self.is_correct)
    }

    fn time_key(&self) -> f32 {
        self.response_time_seconds
    }

    fn set_rank(&mut self, rank: u32) {
        self.rank = rank;
    }
}

impl Rankable for PlayerStats {
    fn primary_key(&self) -> i64 {
        i64::from(self.cumulative_score)
    }

    fn time_key(&self) -> f32 {
        self.cumulative_correct_time_seconds
    }

    fn set_rank(&mut self, rank: u32) {
        self.rank = rank;
    }
}

fn compare<T: Rankable>(a: &T, b: &T) -> Ordering {
    b.primary_key()
        .cmp(&a.primary_key())
        .then_with(|| a.time_key().total_cmp(&b.time_key()))
}

fn same_keys<T: Rankable>(a: &T, b: &T) -> bool {
    a.primary_key() == b.primary_key() && approx_eq(a.time_key(), b.time_key())
}

/// Stable-sort `items` and assign competition ranks in place.
pub fn rank<T: Rankable>(items: &mut [T]) {
    items.sort_by(compare);

    let mut previous_rank = 0u32;
    for i in 0..items.len() {
        let position = i as u32 + 1;
        let rank = if i > 0 && same_keys(&items[i - 1], &items[i]) {
            previous_rank
        } else {
            position
        };
        items[i].set_rank(rank);
        previous_rank = rank;
    }
}

/// The round winner: the correct result with the smallest response time.
/// On an exact tie the first one in `results` wins.
pub fn round_winner(results: &[RoundResult]) -> Option<&RoundResult> {
    results
        .iter()
        .filter(|r| r.is_correct)
        .fold(None, |best: Option<&RoundResult>, r| match best {
            Some(b) if b.response_time_seconds <= r.response_time_seconds => Some(b),
            _ => Some(r),
        })
}
