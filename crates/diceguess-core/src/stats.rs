use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::answers::RoundResult;
use crate::player::{ActorId, fallback_name};
use crate::ranking;

/// A player's running totals across rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub actor_id: ActorId,
    pub display_name: String,
    /// Rounds won (fastest correct answer).
    pub cumulative_score: u32,
    /// Sum of response times over every correct answer.
    pub cumulative_correct_time_seconds: f32,
    pub rank: u32,
}

impl PlayerStats {
    fn new(actor_id: ActorId, display_name: String) -> Self {
        Self {
            actor_id,
            display_name,
            cumulative_score: 0,
            cumulative_correct_time_seconds: 0.0,
            rank: 0,
        }
    }
}

/// Per-peer scoreboard. Every peer feeds it the same broadcast results, so
/// every peer ends up with the same standings without any owner.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    stats: BTreeMap<ActorId, PlayerStats>,
    standings: Vec<PlayerStats>,
    rounds_applied: u32,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one round's results into the scoreboard and re-rank.
    ///
    /// Correct answers add their response time; only the round winner (the
    /// fastest correct answer) gains a point.
    pub fn apply_round_result(&mut self, results: &[RoundResult]) {
        let winner = ranking::round_winner(results).map(|r| r.actor_id);

        for r in results {
            let stats = self.stats.entry(r.actor_id).or_insert_with(|| {
                let name = r.display_name.trim();
                let name = if name.is_empty() {
                    fallback_name(r.actor_id)
                } else {
                    name.to_string()
                };
                PlayerStats::new(r.actor_id, name)
            });

            if r.is_correct {
                stats.cumulative_correct_time_seconds += r.response_time_seconds;
                if winner == Some(r.actor_id) {
                    stats.cumulative_score += 1;
                }
            }
        }

        self.rounds_applied += 1;
        self.rerank();
    }

    fn rerank(&mut self) {
        // BTreeMap order makes tie order identical on every peer.
        self.standings = self.stats.values().cloned().collect();
        ranking::rank(&mut self.standings);
        for s in &self.standings {
            if let Some(entry) = self.stats.get_mut(&s.actor_id) {
                entry.rank = s.rank;
            }
        }
    }

    /// Ranked standings, best first.
    pub fn standings(&self) -> &[PlayerStats] {
        &self.standings
    }

    pub fn get(&self, actor_id: ActorId) -> Option<&PlayerStats> {
        self.stats.get(&actor_id)
    }

    pub fn rounds_applied(&self) -> u32 {
        self.rounds_applied
    }

    pub fn clear(&mut self) {
        self.stats.clear();
        self.standings.clear();
        self.rounds_applied = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(actor_id: u32, is_correct: bool, time: f32) -> RoundResult {
        RoundResult {
            actor_id,
            display_name: format!("P{actor_id}"),
            answer: Some(0),
            is_correct,
            response_time_seconds: time,
            rank: 0,
        }
    }

    #[test]
    fn only_fastest_correct_scores() {
        let mut agg = StatsAggregator::new();
        agg.apply_round_result(&[
            result(1, true, 1.2),
            result(2, false, 0.8),
            result(3, true, 2.0),
        ]);
        let a = agg.get(1).unwrap();
        assert_eq!(a.cumulative_score, 1);
        assert!((a.cumulative_correct_time_seconds - 1.2).abs() < 1e-6);
        let b = agg.get(2).unwrap();
        assert_eq!(b.cumulative_score, 0);
        assert_eq!(b.cumulative_correct_time_seconds, 0.0);
        let c = agg.get(3).unwrap();
        assert_eq!(c.cumulative_score, 0);
        assert!((c.cumulative_correct_time_seconds - 2.0).abs() < 1e-6);

        let ids: Vec<u32> = agg.standings().iter().map(|s| s.actor_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(agg.get(1).unwrap().rank, 1);
    }

    #[test]
    fn no_correct_answers_means_no_scorer() {
        let mut agg = StatsAggregator::new();
        agg.apply_round_result(&[result(1, false, 1.0), result(2, false, 2.0)]);
        assert!(agg.standings().iter().all(|s| s.cumulative_score == 0));
        // Everyone tied on (0, 0.0)
        assert!(agg.standings().iter().all(|s| s.rank == 1));
    }

    #[test]
    fn exactly_one_scorer_on_tied_fastest() {
        let mut agg = StatsAggregator::new();
        agg.apply_round_result(&[result(4, true, 1.5), result(2, true, 1.5)]);
        let total: u32 = agg.standings().iter().map(|s| s.cumulative_score).sum();
        assert_eq!(total, 1);
        assert_eq!(agg.get(4).unwrap().cumulative_score, 1);
    }

    #[test]
    fn rounds_applied_in_either_order_agree() {
        let round1 = [result(1, true, 1.0), result(2, true, 2.0)];
        let round2 = [result(1, false, 0.5), result(2, true, 3.0), result(3, true, 1.0)];

        let mut forward = StatsAggregator::new();
        forward.apply_round_result(&round1);
        forward.apply_round_result(&round2);

        let mut backward = StatsAggregator::new();
        backward.apply_round_result(&round2);
        backward.apply_round_result(&round1);

        assert_eq!(forward.standings(), backward.standings());
        assert_eq!(forward.rounds_applied(), 2);
    }

    #[test]
    fn blank_name_gets_fallback() {
        let mut agg = StatsAggregator::new();
        let mut r = result(7, true, 1.0);
        r.display_name = "  ".into();
        agg.apply_round_result(&[r]);
        assert_eq!(agg.get(7).unwrap().display_name, "Player 7");
    }

    #[test]
    fn standings_order_by_score_then_time() {
        let mut agg = StatsAggregator::new();
        // Round 1: 2 wins. Round 2: 1 wins. Round 3: 1 wins.
        agg.apply_round_result(&[result(1, true, 3.0), result(2, true, 1.0)]);
        agg.apply_round_result(&[result(1, true, 1.0), result(2, true, 2.0)]);
        agg.apply_round_result(&[result(1, true, 1.0), result(2, false, 9.0)]);
        let s = agg.standings();
        assert_eq!(s[0].actor_id, 1);
        assert_eq!(s[0].cumulative_score, 2);
        assert_eq!(s[1].actor_id, 2);
        assert_eq!(s[1].rank, 2);

        agg.clear();
        assert!(agg.standings().is_empty());
    }
}
