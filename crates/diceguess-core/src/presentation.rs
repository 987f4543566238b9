use crate::answers::RoundResult;
use crate::countdown::CountdownStep;
use crate::dice::DiceValue;
use crate::stats::PlayerStats;

/// Everything the coordinator tells the player-facing layer. Implementations
/// render it however they like (scene, terminal, log lines, test recorder).
///
/// All methods are fire-and-forget; the coordinator never reads back from the
/// presenter.
pub trait Presenter: Send {
    /// A new round begins (1-based).
    fn start_round_display(&mut self, round: u32, max_rounds: u32);

    fn show_countdown_display(&mut self, step: CountdownStep);

    /// The dice for the current round are on the table.
    fn show_dice(&mut self, _dice: &[DiceValue]) {}

    fn set_answer_input_enabled(&mut self, enabled: bool);

    fn show_round_results(
        &mut self,
        results: &[RoundResult],
        correct_answer: i64,
        standings: &[PlayerStats],
    );

    fn update_ready_label(&mut self, ready: u32, total: u32);

    fn show_final_results(&mut self, standings: &[PlayerStats]);
}

/// Presenter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn start_round_display(&mut self, _round: u32, _max_rounds: u32) {}
    fn show_countdown_display(&mut self, _step: CountdownStep) {}
    fn set_answer_input_enabled(&mut self, _enabled: bool) {}
    fn show_round_results(
        &mut self,
        _results: &[RoundResult],
        _correct_answer: i64,
        _standings: &[PlayerStats],
    ) {
    }
    fn update_ready_label(&mut self, _ready: u32, _total: u32) {}
    fn show_final_results(&mut self, _standings: &[PlayerStats]) {}
}
