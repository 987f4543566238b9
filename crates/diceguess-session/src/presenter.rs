use diceguess_core::answers::RoundResult;
use diceguess_core::countdown::CountdownStep;
use diceguess_core::dice::DiceValue;
use diceguess_core::player::ActorId;
use diceguess_core::presentation::Presenter;
use diceguess_core::stats::PlayerStats;

/// Presenter for headless peers: everything becomes a log line tagged with
/// the local actor.
#[derive(Debug, Clone)]
pub struct LogPresenter {
    actor_id: ActorId,
}

impl LogPresenter {
    pub fn new(actor_id: ActorId) -> Self {
        Self { actor_id }
    }
}

impl Presenter for LogPresenter {
    fn start_round_display(&mut self, round: u32, max_rounds: u32) {
        tracing::info!(actor_id = self.actor_id, round, max_rounds, "round starting");
    }

    fn show_countdown_display(&mut self, step: CountdownStep) {
        if step != CountdownStep::Finished {
            tracing::debug!(actor_id = self.actor_id, "countdown {step}");
        }
    }

    fn show_dice(&mut self, dice: &[DiceValue]) {
        let faces: Vec<u32> = dice.iter().map(|d| d.value).collect();
        tracing::debug!(actor_id = self.actor_id, ?faces, "dice on table");
    }

    fn set_answer_input_enabled(&mut self, enabled: bool) {
        tracing::trace!(actor_id = self.actor_id, enabled, "answer input");
    }

    fn show_round_results(
        &mut self,
        results: &[RoundResult],
        correct_answer: i64,
        _standings: &[PlayerStats],
    ) {
        for r in results {
            tracing::debug!(
                actor_id = self.actor_id,
                player = r.actor_id,
                rank = r.rank,
                answer = ?r.answer,
                correct = r.is_correct,
                response_time = r.response_time_seconds,
                "round result"
            );
        }
        tracing::info!(
            actor_id = self.actor_id,
            correct_answer,
            players = results.len(),
            "round results"
        );
    }

    fn update_ready_label(&mut self, ready: u32, total: u32) {
        tracing::debug!(actor_id = self.actor_id, "ready {ready}/{total}");
    }

    fn show_final_results(&mut self, standings: &[PlayerStats]) {
        for s in standings {
            tracing::info!(
                actor_id = self.actor_id,
                rank = s.rank,
                player = %s.display_name,
                score = s.cumulative_score,
                correct_time = s.cumulative_correct_time_seconds,
                "final standing"
            );
        }
    }
}
