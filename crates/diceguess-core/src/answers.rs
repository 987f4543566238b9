use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::player::{ActorId, Player, Roster, fallback_name};
use crate::ranking;

fn player_name(player: &Player) -> String {
    let name = player.display_name.trim();
    if name.is_empty() {
        fallback_name(player.actor_id)
    } else {
        name.to_string()
    }
}

/// A raw answer received by the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub actor_id: ActorId,
    pub raw_answer: i64,
    /// Seconds between the dice appearing on the submitter's screen and the
    /// answer being sent, as measured by the submitter.
    pub submitted_at: f32,
}

impl AnswerSubmission {
    /// Exact integer equality against the authoritative product.
    pub fn is_correct(&self, product: i64) -> bool {
        self.raw_answer == product
    }
}

/// One player's judged result for a round. Computed once on the master and
/// replicated verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub actor_id: ActorId,
    pub display_name: String,
    /// `None` when the player never submitted a valid answer.
    pub answer: Option<i64>,
    pub is_correct: bool,
    pub response_time_seconds: f32,
    pub rank: u32,
}

/// Whether a call to [`AnswerCollector::submit`] recorded anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// The actor already submitted this round; nothing changed.
    Duplicate,
}

/// Master-side accumulator of answers for the current round.
///
/// Keeps submissions in arrival order and enforces one submission per actor.
/// Separately tracks which actors have *answered*: an actor whose input was
/// malformed still acknowledges via [`AnswerCollector::mark_answered`] so the
/// round does not stall waiting for them.
#[derive(Debug, Default)]
pub struct AnswerCollector {
    round: u32,
    submissions: Vec<AnswerSubmission>,
    submitted: HashSet<ActorId>,
    answered: HashSet<ActorId>,
}

impl AnswerCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything collected and start accepting answers for `round`.
    pub fn begin_round(&mut self, round: u32) {
        self.round = round;
        self.submissions.clear();
        self.submitted.clear();
        self.answered.clear();
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Record an answer. A second submission from the same actor is ignored.
    pub fn submit(
        &mut self,
        actor_id: ActorId,
        raw_answer: i64,
        response_time: f32,
    ) -> SubmitOutcome {
        if !self.submitted.insert(actor_id) {
            return SubmitOutcome::Duplicate;
        }
        self.answered.insert(actor_id);
        self.submissions.push(AnswerSubmission {
            actor_id,
            raw_answer,
            submitted_at: response_time.max(0.0),
        });
        SubmitOutcome::Accepted
    }

    /// Record that an actor is done answering without adding a submission.
    /// Returns true if this is the first acknowledgment from that actor.
    pub fn mark_answered(&mut self, actor_id: ActorId) -> bool {
        self.answered.insert(actor_id)
    }

    /// Stop counting a departed actor as answered. Any submission it made is
    /// kept and still judged. Returns true if the answered count dropped.
    pub fn forget(&mut self, actor_id: ActorId) -> bool {
        self.answered.remove(&actor_id)
    }

    pub fn submissions(&self) -> &[AnswerSubmission] {
        &self.submissions
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }

    /// Number of distinct actors that have answered (with or without a valid
    /// submission).
    pub fn answered_count(&self) -> usize {
        self.answered.len()
    }

    pub fn has_answered(&self, actor_id: ActorId) -> bool {
        self.answered.contains(&actor_id)
    }

    /// True iff every connected player has answered. An empty room is never
    /// considered done.
    pub fn all_answered(&self, player_count: usize) -> bool {
        player_count > 0 && self.answered_count() >= player_count
    }

    /// Judge every submission against `product` and rank the results.
    ///
    /// Roster players without a submission are padded in as incorrect
    /// non-answers timed at `elapsed`, so the result set covers the whole room.
    pub fn judge(&self, product: i64, roster: &Roster, elapsed: f32) -> Vec<RoundResult> {
        let mut results: Vec<RoundResult> = self
            .submissions
            .iter()
            .map(|s| RoundResult {
                actor_id: s.actor_id,
                display_name: roster.display_name(s.actor_id),
                answer: Some(s.raw_answer),
                is_correct: s.is_correct(product),
                response_time_seconds: s.submitted_at,
                rank: 0,
            })
            .collect();

        for player in roster.players() {
            if !self.submitted.contains(&player.actor_id) {
                results.push(RoundResult {
                    actor_id: player.actor_id,
                    display_name: player_name(player),
                    answer: None,
                    is_correct: false,
                    response_time_seconds: elapsed.max(0.0),
                    rank: 0,
                });
            }
        }

        for r in &results {
            if r.is_correct {
                tracing::debug!(
                    round = self.round,
                    actor_id = r.actor_id,
                    time = r.response_time_seconds,
                    "correct answer"
                );
            } else {
                tracing::debug!(
                    round = self.round,
                    actor_id = r.actor_id,
                    expected = product,
                    got = ?r.answer,
                    "wrong answer"
                );
            }
        }

        ranking::rank(&mut results);
        results
    }
}
