//! Per-peer round state machine.
//!
//! Every peer runs one [`RoundCoordinator`]. The master peer additionally owns
//! the authoritative pieces (dice, answer collection, judging, ready gate) and
//! drives transitions by broadcasting round-tagged messages; other peers follow
//! those messages and only ever send requests to the master.
//!
//! The coordinator performs no I/O. Every entry point returns the [`Outbound`]
//! actions the caller must hand to the transport.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::answers::{AnswerCollector, RoundResult, SubmitOutcome};
use crate::countdown::{Countdown, CountdownStep};
use crate::dice::{self, DiceValue, DieCatalog};
use crate::error::{self, GameError};
use crate::net::messages::{
    DiceSpawnedMsg, GameMessage, GameOverMsg, RequestIncrementAnsweredMsg,
    RequestIncrementReadyMsg, ShowResultsMsg, StartNextRoundMsg, SubmitAnswerMsg,
};
use crate::net::protocol::{self, ProtocolError};
use crate::player::{ActorId, Player, SessionContext};
use crate::presentation::Presenter;
use crate::ready::{AckOutcome, ReadyGate};
use crate::room::{PropertyWrite, RoomProperties, RoomProperty, RoundConfig};
use crate::settings::RoundSettings;
use crate::stats::{PlayerStats, StatsAggregator};

/// Lifecycle of a round as seen by one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Before the first round.
    Idle,
    WaitingForReady,
    Countdown,
    Collecting,
    Judging,
    ShowingResults,
    GameOver,
}

/// Something the transport must deliver on the coordinator's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Deliver to the master peer only.
    ToMaster(GameMessage),
    /// Deliver to every peer except the sender. The sender has already
    /// applied the message locally.
    Broadcast(GameMessage),
    /// Write to the replicated room properties. Every peer, the writer
    /// included, is notified of the change.
    SetProperties(PropertyWrite),
}

pub struct RoundCoordinator {
    ctx: SessionContext,
    settings: RoundSettings,
    catalog: DieCatalog,
    presenter: Box<dyn Presenter>,
    rng: StdRng,
    properties: RoomProperties,

    phase: RoundPhase,
    current_round: u32,
    round_config: RoundConfig,
    countdown: Countdown,
    /// Seconds since construction, advanced by [`RoundCoordinator::tick`].
    clock: f32,
    phase_entered_at: f32,

    dice: Vec<DiceValue>,
    /// Set once this round's dice are known locally, even if the set is empty.
    dice_received: bool,
    dice_seen_at: Option<f32>,
    local_answered: bool,
    local_ready: bool,

    // Master-only state
    correct_answer: i64,
    collector: AnswerCollector,
    ready: ReadyGate,

    stats: StatsAggregator,
    last_results: Vec<RoundResult>,
    last_correct_answer: Option<i64>,
    outbox: Vec<Outbound>,
}

impl RoundCoordinator {
    pub fn new(
        ctx: SessionContext,
        settings: RoundSettings,
        catalog: DieCatalog,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        let countdown = Countdown::new(settings.countdown_from, settings.countdown_interval_secs);
        let round_config =
            RoundConfig::new(settings.default_dice_count, settings.default_max_rounds);
        let total = ctx.player_count() as u32;
        Self {
            ctx,
            settings,
            catalog,
            presenter,
            rng: StdRng::seed_from_u64(rand::random()),
            properties: RoomProperties::default(),
            phase: RoundPhase::Idle,
            current_round: 0,
            round_config,
            countdown,
            clock: 0.0,
            phase_entered_at: 0.0,
            dice: Vec::new(),
            dice_received: false,
            dice_seen_at: None,
            local_answered: false,
            local_ready: false,
            correct_answer: 0,
            collector: AnswerCollector::new(),
            ready: ReadyGate::new(total),
            stats: StatsAggregator::new(),
            last_results: Vec::new(),
            last_correct_answer: None,
            outbox: Vec::new(),
        }
    }

    /// Use a fixed seed for dice generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn round_config(&self) -> RoundConfig {
        self.round_config
    }

    pub fn local_actor(&self) -> ActorId {
        self.ctx.local_actor()
    }

    pub fn is_master(&self) -> bool {
        self.ctx.is_master()
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn properties(&self) -> &RoomProperties {
        &self.properties
    }

    /// Dice for the current round, once they have been revealed locally.
    pub fn dice(&self) -> &[DiceValue] {
        if self.dice_seen_at.is_some() {
            self.dice.as_slice()
        } else {
            &[]
        }
    }

    /// Whether the local player already answered this round.
    pub fn has_answered(&self) -> bool {
        self.local_answered
    }

    /// Whether the local player can type an answer right now.
    pub fn accepts_answer(&self) -> bool {
        self.phase == RoundPhase::Collecting && self.dice_seen_at.is_some() && !self.local_answered
    }

    /// Whether a ready acknowledgment from the local player would be counted.
    pub fn accepts_ready(&self) -> bool {
        matches!(
            self.phase,
            RoundPhase::ShowingResults | RoundPhase::WaitingForReady
        ) && !self.local_ready
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn standings(&self) -> &[PlayerStats] {
        self.stats.standings()
    }

    pub fn last_results(&self) -> &[RoundResult] {
        &self.last_results
    }

    pub fn last_correct_answer(&self) -> Option<i64> {
        self.last_correct_answer
    }

    // ------------------------------------------------------------------
    // Local commands
    // ------------------------------------------------------------------

    /// Start the game, or force the next round from any phase (master only).
    ///
    /// Any collection in progress is abandoned: the collector is reset and
    /// late messages tagged with the old round are ignored. When the final
    /// round has already been played the game ends instead.
    pub fn start_game(&mut self) -> Vec<Outbound> {
        if let Err(e) = self.require_master("start_game") {
            tracing::debug!(error = %e, "ignoring start request");
            return Vec::new();
        }
        if self.phase == RoundPhase::Idle {
            self.round_config = self.configured_round();
        }
        if self.current_round >= self.round_config.max_rounds {
            self.master_end_game();
        } else {
            self.master_start_round(self.current_round + 1);
        }
        self.drain()
    }

    /// Advance the local clock by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Vec<Outbound> {
        let dt = dt.max(0.0);
        self.clock += dt;

        match self.phase {
            RoundPhase::Countdown => {
                for step in self.countdown.advance(dt) {
                    self.presenter.show_countdown_display(step);
                    if step == CountdownStep::Finished {
                        self.enter_collecting();
                    }
                }
            },
            RoundPhase::Collecting if self.is_master() => {
                let since = self.dice_seen_at.unwrap_or(self.phase_entered_at);
                let timed_out = self
                    .settings
                    .answer_timeout()
                    .is_some_and(|limit| self.clock - since >= limit.as_secs_f32());
                if timed_out {
                    tracing::info!(
                        round = self.current_round,
                        answered = self.collector.answered_count(),
                        players = self.ctx.player_count(),
                        "answer timeout reached"
                    );
                    self.master_judge();
                } else {
                    self.master_check_all_answered();
                }
            },
            RoundPhase::ShowingResults => {
                if self.clock - self.phase_entered_at >= self.settings.results_hold().as_secs_f32()
                {
                    self.enter_phase(RoundPhase::WaitingForReady);
                    self.refresh_ready_label();
                    self.master_try_advance();
                }
            },
            RoundPhase::WaitingForReady => self.master_try_advance(),
            _ => {},
        }

        self.drain()
    }

    /// Submit the local player's typed answer.
    ///
    /// Input that does not parse is dropped, but the answered acknowledgment
    /// is still sent so the round does not wait on this player.
    pub fn submit_local_answer(&mut self, input: &str) -> Vec<Outbound> {
        if !self.accepts_answer() {
            tracing::debug!(
                round = self.current_round,
                phase = ?self.phase,
                answered = self.local_answered,
                "answer input ignored"
            );
            return Vec::new();
        }
        self.local_answered = true;
        self.presenter.set_answer_input_enabled(false);

        let actor_id = self.ctx.local_actor();
        let round = self.current_round;
        let msg = match error::parse_answer(input) {
            Ok(answer) => {
                let response_time = self.dice_seen_at.map_or(0.0, |t| self.clock - t);
                tracing::info!(round, actor_id, answer, response_time, "answer submitted");
                GameMessage::SubmitAnswer(SubmitAnswerMsg {
                    actor_id,
                    answer,
                    response_time,
                    round,
                })
            },
            Err(e) => {
                tracing::warn!(round, actor_id, error = %e, "dropping malformed answer");
                GameMessage::RequestIncrementAnswered(RequestIncrementAnsweredMsg {
                    actor_id,
                    round,
                })
            },
        };
        self.send_to_master(msg);
        self.drain()
    }

    /// The local player is ready for the next round.
    pub fn acknowledge_ready(&mut self) -> Vec<Outbound> {
        if !self.accepts_ready() {
            tracing::debug!(
                round = self.current_round,
                phase = ?self.phase,
                "ready acknowledgment ignored"
            );
            return Vec::new();
        }
        self.local_ready = true;
        let msg = GameMessage::RequestIncrementReady(RequestIncrementReadyMsg {
            actor_id: self.ctx.local_actor(),
            round: self.current_round,
        });
        self.send_to_master(msg);
        self.drain()
    }

    // ------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------

    /// Decode and handle a wire message. Undecodable data is dropped.
    pub fn handle_wire(&mut self, from: ActorId, data: &[u8]) -> Vec<Outbound> {
        match protocol::decode_game_message(data) {
            Ok(msg) => self.handle_message(from, msg),
            Err(e) => {
                tracing::warn!(from, error = %e, "dropping undecodable message");
                Vec::new()
            },
        }
    }

    /// Handle a message delivered by the transport from actor `from`.
    pub fn handle_message(&mut self, from: ActorId, msg: GameMessage) -> Vec<Outbound> {
        let msg_type = msg.message_type();
        if msg_type.is_to_master() {
            if let Err(e) = self.require_master("handle_request") {
                tracing::debug!(from, ?msg_type, error = %e, "dropping request");
                return Vec::new();
            }
        } else if self.ctx.roster().master() != Some(from) {
            tracing::warn!(
                from,
                ?msg_type,
                master = ?self.ctx.roster().master(),
                "dropping broadcast from non-master"
            );
            return Vec::new();
        }

        match msg {
            GameMessage::SubmitAnswer(m) => {
                if m.actor_id != from {
                    tracing::warn!(from, claimed = m.actor_id, "answer actor mismatch");
                }
                self.master_receive_answer(from, m.answer, m.response_time, m.round);
            },
            GameMessage::RequestIncrementAnswered(m) => {
                self.master_receive_answered(from, m.round);
            },
            GameMessage::RequestIncrementReady(m) => {
                self.master_receive_ready(from, m.round);
            },
            GameMessage::StartNextRound(m) => self.on_start_next_round(m.round),
            GameMessage::DiceSpawned(m) => self.on_dice_spawned(m),
            GameMessage::ShowResults(m) => {
                if let Err(e) = self.on_show_results(&m) {
                    tracing::warn!(round = m.round, error = %e, "dropping results");
                }
            },
            GameMessage::GameOver(m) => self.on_game_over(m.round),
        }

        self.drain()
    }

    /// Fold a revisioned room-property change into the local copy.
    pub fn apply_property_update(&mut self, revision: u64, write: &PropertyWrite) -> Vec<Outbound> {
        let changed = self.properties.merge(write, revision);
        for key in changed {
            match key {
                RoomProperty::ReadyCount => self.refresh_ready_label(),
                RoomProperty::AnsweredCount => {
                    tracing::debug!(
                        round = self.current_round,
                        answered = self.properties.answered_count(),
                        "answered count changed"
                    );
                },
                RoomProperty::DiceNumber | RoomProperty::RoundNumber => {
                    tracing::debug!(
                        key = %key,
                        value = ?self.properties.get(key),
                        "room setting changed"
                    );
                },
            }
        }
        self.drain()
    }

    pub fn player_joined(&mut self, player: Player) -> Vec<Outbound> {
        tracing::info!(actor_id = player.actor_id, name = %player.display_name, "player joined");
        self.ctx.roster_mut().insert(player);
        self.ready.set_total(self.ctx.player_count() as u32);
        self.refresh_ready_label();
        self.drain()
    }

    pub fn player_left(&mut self, actor_id: ActorId) -> Vec<Outbound> {
        tracing::info!(actor_id, "player left");
        self.ctx.roster_mut().remove(actor_id);
        self.ready.forget(actor_id);
        self.ready.set_total(self.ctx.player_count() as u32);
        self.refresh_ready_label();

        if self.is_master() {
            // A departed actor no longer counts toward AnsweredCount
            let dropped = self.collector.forget(actor_id);
            match self.phase {
                RoundPhase::Collecting if dropped => self.master_publish_answered(),
                RoundPhase::Collecting => self.master_check_all_answered(),
                RoundPhase::WaitingForReady => self.master_try_advance(),
                _ => {},
            }
        }
        self.drain()
    }

    /// The transport elected a new master.
    pub fn master_changed(&mut self, new_master: ActorId) -> Vec<Outbound> {
        let was_master = self.is_master();
        self.ctx.roster_mut().set_master(new_master);
        if self.is_master() && !was_master {
            if matches!(self.phase, RoundPhase::Idle | RoundPhase::GameOver) {
                tracing::info!(actor_id = new_master, "became master");
            } else {
                tracing::warn!(
                    actor_id = new_master,
                    round = self.current_round,
                    phase = ?self.phase,
                    "became master mid-game; in-flight round state is not recovered"
                );
            }
        }
        self.drain()
    }

    // ------------------------------------------------------------------
    // Transitions shared by every peer
    // ------------------------------------------------------------------

    fn enter_phase(&mut self, phase: RoundPhase) {
        tracing::debug!(
            round = self.current_round,
            from = ?self.phase,
            to = ?phase,
            "phase change"
        );
        self.phase = phase;
        self.phase_entered_at = self.clock;
    }

    fn enter_round(&mut self, round: u32) {
        self.current_round = round;
        self.round_config = self.configured_round();
        self.dice.clear();
        self.dice_received = false;
        self.dice_seen_at = None;
        self.local_answered = false;
        self.local_ready = false;

        tracing::info!(
            round,
            max_rounds = self.round_config.max_rounds,
            dice = self.round_config.dice_count,
            "round starting"
        );
        self.presenter
            .start_round_display(round, self.round_config.max_rounds);
        self.presenter.set_answer_input_enabled(false);
        self.enter_phase(RoundPhase::Countdown);
        let first = self.countdown.start();
        self.presenter.show_countdown_display(first);
    }

    fn enter_collecting(&mut self) {
        self.enter_phase(RoundPhase::Collecting);
        if self.is_master() && !self.dice_received {
            self.master_spawn_dice();
        }
        if self.dice_received {
            self.reveal_dice();
        }
    }

    fn reveal_dice(&mut self) {
        if self.dice_seen_at.is_some() {
            return;
        }
        self.dice_seen_at = Some(self.clock);
        self.presenter.show_dice(&self.dice);
        self.presenter.set_answer_input_enabled(!self.local_answered);
    }

    fn on_start_next_round(&mut self, round: u32) {
        if round <= self.current_round && self.phase != RoundPhase::Idle {
            tracing::debug!(round, current = self.current_round, "stale round start");
            return;
        }
        self.enter_round(round);
    }

    fn on_dice_spawned(&mut self, msg: DiceSpawnedMsg) {
        if msg.round != self.current_round {
            tracing::debug!(round = msg.round, current = self.current_round, "stale dice");
            return;
        }
        if self.dice_seen_at.is_some() {
            return;
        }
        self.dice = msg.dice;
        self.dice_received = true;
        // Dice that arrive during our own countdown wait for it to finish.
        if self.phase == RoundPhase::Collecting {
            self.reveal_dice();
        }
    }

    fn on_show_results(&mut self, msg: &ShowResultsMsg) -> Result<(), ProtocolError> {
        if msg.round != self.current_round
            || matches!(
                self.phase,
                RoundPhase::ShowingResults | RoundPhase::WaitingForReady | RoundPhase::GameOver
            )
        {
            tracing::debug!(
                round = msg.round,
                current = self.current_round,
                phase = ?self.phase,
                "stale results"
            );
            return Ok(());
        }
        let results = msg.to_results()?;
        self.apply_results(results, msg.correct_answer);
        Ok(())
    }

    fn apply_results(&mut self, results: Vec<RoundResult>, correct_answer: i64) {
        self.countdown.cancel();
        self.stats.apply_round_result(&results);
        self.presenter.set_answer_input_enabled(false);
        self.presenter
            .show_round_results(&results, correct_answer, self.stats.standings());
        self.last_results = results;
        self.last_correct_answer = Some(correct_answer);
        self.local_ready = false;
        self.enter_phase(RoundPhase::ShowingResults);
    }

    fn on_game_over(&mut self, round: u32) {
        if round < self.current_round || self.phase == RoundPhase::GameOver {
            tracing::debug!(round, current = self.current_round, "stale game over");
            return;
        }
        self.show_game_over();
    }

    fn show_game_over(&mut self) {
        self.countdown.cancel();
        self.presenter.set_answer_input_enabled(false);
        self.enter_phase(RoundPhase::GameOver);
        if let Some(winner) = self.stats.standings().first() {
            tracing::info!(
                actor_id = winner.actor_id,
                name = %winner.display_name,
                score = winner.cumulative_score,
                "game over"
            );
        }
        self.presenter.show_final_results(self.stats.standings());
    }

    fn refresh_ready_label(&mut self) {
        if matches!(
            self.phase,
            RoundPhase::ShowingResults | RoundPhase::WaitingForReady
        ) {
            self.presenter.update_ready_label(
                self.properties.ready_count(),
                self.ctx.player_count() as u32,
            );
        }
    }

    fn configured_round(&self) -> RoundConfig {
        self.properties.round_config_or(
            self.settings.default_dice_count,
            self.settings.default_max_rounds,
        )
    }

    // ------------------------------------------------------------------
    // Master-only behaviour
    // ------------------------------------------------------------------

    fn require_master(&self, operation: &'static str) -> Result<(), GameError> {
        if self.is_master() {
            Ok(())
        } else {
            Err(GameError::AuthorityMismatch {
                operation,
                actor_id: self.ctx.local_actor(),
            })
        }
    }

    fn send_to_master(&mut self, msg: GameMessage) {
        if self.is_master() {
            let from = self.ctx.local_actor();
            match msg {
                GameMessage::SubmitAnswer(m) => {
                    self.master_receive_answer(from, m.answer, m.response_time, m.round);
                },
                GameMessage::RequestIncrementAnswered(m) => {
                    self.master_receive_answered(from, m.round);
                },
                GameMessage::RequestIncrementReady(m) => self.master_receive_ready(from, m.round),
                other => {
                    tracing::warn!(msg_type = ?other.message_type(), "not a master request");
                },
            }
        } else {
            self.outbox.push(Outbound::ToMaster(msg));
        }
    }

    fn broadcast(&mut self, msg: GameMessage) {
        self.outbox.push(Outbound::Broadcast(msg));
    }

    fn set_properties(&mut self, write: PropertyWrite) {
        self.outbox.push(Outbound::SetProperties(write));
    }

    fn master_start_round(&mut self, round: u32) {
        self.collector.begin_round(round);
        self.ready.reset(self.ctx.player_count() as u32);
        self.correct_answer = 0;
        self.set_properties(PropertyWrite {
            answered_count: Some(0),
            ready_count: Some(0),
            ..PropertyWrite::default()
        });
        self.broadcast(GameMessage::StartNextRound(StartNextRoundMsg { round }));
        self.enter_round(round);
    }

    fn master_spawn_dice(&mut self) {
        let area = self.settings.spawn_area();
        self.dice = dice::roll_dice(
            &self.catalog,
            self.round_config.dice_count,
            &area,
            &mut self.rng,
        );
        if self.dice.len() < self.round_config.dice_count as usize {
            tracing::warn!(
                round = self.current_round,
                wanted = self.round_config.dice_count,
                spawned = self.dice.len(),
                "spawned fewer dice than configured"
            );
        }
        self.dice_received = true;
        self.correct_answer = dice::product(&self.dice);
        tracing::debug!(
            round = self.current_round,
            values = ?self.dice.iter().map(|d| d.value).collect::<Vec<_>>(),
            product = self.correct_answer,
            "dice spawned"
        );
        self.broadcast(GameMessage::DiceSpawned(DiceSpawnedMsg {
            round: self.current_round,
            dice: self.dice.clone(),
        }));
    }

    fn master_accepts_answers_for(&self, round: u32, from: ActorId) -> bool {
        if round != self.current_round || self.phase != RoundPhase::Collecting {
            tracing::debug!(
                from,
                round,
                current = self.current_round,
                phase = ?self.phase,
                "dropping answer outside collection"
            );
            return false;
        }
        true
    }

    fn master_receive_answer(
        &mut self,
        from: ActorId,
        answer: i64,
        response_time: f32,
        round: u32,
    ) {
        if !self.master_accepts_answers_for(round, from) {
            return;
        }
        match self.collector.submit(from, answer, response_time) {
            SubmitOutcome::Accepted => {
                tracing::debug!(
                    round,
                    actor_id = from,
                    answer,
                    response_time,
                    "answer received"
                );
                self.master_publish_answered();
            },
            SubmitOutcome::Duplicate => {
                tracing::debug!(round, actor_id = from, "duplicate answer ignored");
            },
        }
    }

    fn master_receive_answered(&mut self, from: ActorId, round: u32) {
        if !self.master_accepts_answers_for(round, from) {
            return;
        }
        if self.collector.mark_answered(from) {
            self.master_publish_answered();
        }
    }

    fn master_publish_answered(&mut self) {
        self.set_properties(PropertyWrite::answered_count(
            self.collector.answered_count() as u32,
        ));
        self.master_check_all_answered();
    }

    fn master_check_all_answered(&mut self) {
        if self.phase == RoundPhase::Collecting
            && self.collector.all_answered(self.ctx.player_count())
        {
            self.master_judge();
        }
    }

    fn master_judge(&mut self) {
        self.enter_phase(RoundPhase::Judging);
        let elapsed = self.dice_seen_at.map_or(0.0, |t| self.clock - t);
        let results = self
            .collector
            .judge(self.correct_answer, self.ctx.roster(), elapsed);
        let round = self.current_round;
        tracing::info!(
            round,
            correct_answer = self.correct_answer,
            results = results.len(),
            "round judged"
        );

        self.broadcast(GameMessage::ShowResults(ShowResultsMsg::from_results(
            round,
            self.correct_answer,
            &results,
        )));
        self.apply_results(results, self.correct_answer);

        self.ready.reset(self.ctx.player_count() as u32);
        self.set_properties(PropertyWrite::ready_count(0));

        if round >= self.round_config.max_rounds {
            self.master_end_game();
        }
    }

    fn master_end_game(&mut self) {
        self.broadcast(GameMessage::GameOver(GameOverMsg {
            round: self.current_round,
        }));
        self.show_game_over();
    }

    fn master_receive_ready(&mut self, from: ActorId, round: u32) {
        if round != self.current_round
            || !matches!(
                self.phase,
                RoundPhase::ShowingResults | RoundPhase::WaitingForReady
            )
        {
            tracing::debug!(
                from,
                round,
                phase = ?self.phase,
                "dropping ready outside ready phase"
            );
            return;
        }
        match self.ready.acknowledge(from) {
            AckOutcome::Counted(counter) => {
                tracing::debug!(
                    round,
                    actor_id = from,
                    ready = counter.count,
                    total = counter.total,
                    "player ready"
                );
                self.set_properties(PropertyWrite::ready_count(counter.count));
                self.master_try_advance();
            },
            AckOutcome::Duplicate => {
                tracing::debug!(round, actor_id = from, "duplicate ready ignored");
            },
        }
    }

    fn master_try_advance(&mut self) {
        if !self.is_master() || self.phase != RoundPhase::WaitingForReady {
            return;
        }
        if self.ready.take_satisfied() {
            if self.current_round >= self.round_config.max_rounds {
                self.master_end_game();
            } else {
                self.master_start_round(self.current_round + 1);
            }
        }
    }

    fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }
}

impl std::fmt::Debug for RoundCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundCoordinator")
            .field("local", &self.ctx.local_actor())
            .field("master", &self.ctx.roster().master())
            .field("phase", &self.phase)
            .field("round", &self.current_round)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Roster;
    use crate::presentation::NullPresenter;
    use crate::test_helpers::{LocalRoom, PresenterEvent, make_players};

    fn room(players: usize, dice: u32, rounds: u32) -> LocalRoom {
        LocalRoom::new(players, dice, rounds, RoundSettings::default())
    }

    /// Run the 3-2-1-GO countdown so every peer has the dice on screen.
    fn reach_collecting(room: &mut LocalRoom) {
        room.run_for(4.0, 0.5);
    }

    fn phases(room: &LocalRoom) -> Vec<RoundPhase> {
        room.actor_ids()
            .into_iter()
            .map(|id| room.peer(id).phase())
            .collect()
    }

    #[test]
    fn master_round_start_sequence() {
        let mut room = room(2, 3, 5);
        room.start_game();
        reach_collecting(&mut room);

        let dice = room.peer(1).dice().iter().map(|d| d.value).collect();
        assert_eq!(
            room.events(1),
            vec![
                PresenterEvent::RoundStarted {
                    round: 1,
                    max_rounds: 5
                },
                PresenterEvent::AnswerInput(false),
                PresenterEvent::Countdown(CountdownStep::Number(3)),
                PresenterEvent::Countdown(CountdownStep::Number(2)),
                PresenterEvent::Countdown(CountdownStep::Number(1)),
                PresenterEvent::Countdown(CountdownStep::Go),
                PresenterEvent::Countdown(CountdownStep::Finished),
                PresenterEvent::Dice(dice),
                PresenterEvent::AnswerInput(true),
            ]
        );
        assert_eq!(room.peer(1).dice().len(), 3);
        assert_eq!(room.peer(2).dice(), room.peer(1).dice());
        assert!(room.peer(2).accepts_answer());
    }

    #[test]
    fn full_game_ends_with_identical_standings_everywhere() {
        let mut room = room(3, 3, 2);
        room.start_game();

        for round in 1..=2 {
            reach_collecting(&mut room);
            for id in room.actor_ids() {
                assert_eq!(room.peer(id).current_round(), round);
                assert_eq!(room.peer(id).phase(), RoundPhase::Collecting);
                assert_eq!(room.peer(id).dice().len(), 3);
            }
            let answer = room.answer_for(1);
            assert_eq!(room.answer_for(3), answer);

            room.tick_all(0.5);
            room.submit(2, &answer.to_string());
            room.tick_all(0.5);
            room.submit(1, &answer.to_string());
            room.submit(3, &(answer + 1).to_string());

            if round == 1 {
                assert!(phases(&room).iter().all(|p| *p == RoundPhase::ShowingResults));
                // Response time is measured from the local dice reveal
                let winner = &room.peer(1).last_results()[0];
                assert_eq!(winner.actor_id, 2);
                assert!((winner.response_time_seconds - 0.5).abs() < 1e-4);
                room.ready_all();
                room.tick_all(1.0);
            }
        }

        assert!(phases(&room).iter().all(|p| *p == RoundPhase::GameOver));
        let standings = room.peer(1).standings().to_vec();
        assert_eq!(standings[0].actor_id, 2);
        assert_eq!(standings[0].cumulative_score, 2);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(
            standings.iter().map(|s| s.cumulative_score).sum::<u32>(),
            2
        );
        for id in [2, 3] {
            assert_eq!(room.peer(id).standings(), standings.as_slice());
            assert_eq!(room.peer(id).current_round(), 2);
            assert!(
                room.events(id)
                    .contains(&PresenterEvent::FinalResults(standings.clone()))
            );
        }
    }

    #[test]
    fn reference_scenario_ranks_correct_then_fastest() {
        // A=1, B=2, C=3. A correct @1.2, B wrong @0.8, C correct @2.0
        let mut room = room(3, 3, 3);
        room.start_game();
        reach_collecting(&mut room);
        let answer = room.answer_for(1);

        room.tick_all(0.8);
        room.submit(2, &(answer + 7).to_string());
        room.tick_all(0.4);
        room.submit(1, &answer.to_string());
        room.tick_all(0.8);
        room.submit(3, &answer.to_string());

        let results = room.peer(1).last_results().to_vec();
        let summary: Vec<(u32, bool, u32)> = results
            .iter()
            .map(|r| (r.actor_id, r.is_correct, r.rank))
            .collect();
        assert_eq!(summary, vec![(1, true, 1), (3, true, 2), (2, false, 3)]);
        assert_eq!(room.peer(1).last_correct_answer(), Some(answer));

        for id in [2, 3] {
            assert_eq!(room.peer(id).last_results(), results.as_slice());
            assert_eq!(room.peer(id).stats().get(1).map(|s| s.cumulative_score), Some(1));
            assert_eq!(room.peer(id).stats().get(3).map(|s| s.cumulative_score), Some(0));
        }
    }

    #[test]
    fn malformed_answer_still_counts_as_answered() {
        let mut room = room(2, 2, 3);
        room.start_game();
        reach_collecting(&mut room);
        let answer = room.answer_for(1);

        room.submit(2, "twelve");
        assert!(room.peer(2).has_answered());
        assert_eq!(room.peer(1).phase(), RoundPhase::Collecting);
        assert_eq!(room.peer(2).properties().answered_count(), 1);

        room.submit(1, &answer.to_string());
        assert_eq!(room.peer(1).phase(), RoundPhase::ShowingResults);
        let results = room.peer(2).last_results();
        let typo = results.iter().find(|r| r.actor_id == 2).unwrap();
        assert_eq!(typo.answer, None);
        assert!(!typo.is_correct);
    }

    #[test]
    fn duplicate_answers_are_ignored() {
        let mut room = room(3, 2, 3);
        room.start_game();
        reach_collecting(&mut room);

        room.submit(2, "4");
        // Second local submission never leaves the peer
        room.submit(2, "5");
        // A replayed message reaching the master is dropped
        let out = room.peer_mut(1).handle_message(
            2,
            GameMessage::SubmitAnswer(SubmitAnswerMsg {
                actor_id: 2,
                answer: 9,
                response_time: 0.1,
                round: 1,
            }),
        );
        assert!(out.is_empty());
        assert_eq!(room.peer(1).properties().answered_count(), 1);
        assert_eq!(room.peer(1).phase(), RoundPhase::Collecting);
    }

    #[test]
    fn non_master_cannot_start_game() {
        let mut room = room(3, 2, 3);
        room.start_game_on(2);
        assert!(phases(&room).iter().all(|p| *p == RoundPhase::Idle));
        assert_eq!(room.peer(2).current_round(), 0);
    }

    #[test]
    fn forced_restart_abandons_collection() {
        let mut room = room(3, 2, 5);
        room.start_game();
        reach_collecting(&mut room);
        room.submit(2, "4");
        assert_eq!(room.peer(1).properties().answered_count(), 1);

        room.start_game();
        for id in room.actor_ids() {
            assert_eq!(room.peer(id).current_round(), 2);
            assert_eq!(room.peer(id).phase(), RoundPhase::Countdown);
            assert!(!room.peer(id).has_answered());
        }
        assert_eq!(room.peer(3).properties().answered_count(), 0);

        // A late answer for the abandoned round is dropped
        let out = room.peer_mut(1).handle_message(
            3,
            GameMessage::SubmitAnswer(SubmitAnswerMsg {
                actor_id: 3,
                answer: 4,
                response_time: 1.0,
                round: 1,
            }),
        );
        assert!(out.is_empty());
        assert!(room.peer(1).standings().is_empty());

        reach_collecting(&mut room);
        assert!(phases(&room).iter().all(|p| *p == RoundPhase::Collecting));
    }

    #[test]
    fn ready_gate_waits_for_every_player() {
        let mut room = room(3, 2, 3);
        room.start_game();
        reach_collecting(&mut room);
        for id in room.actor_ids() {
            room.submit(id, "1");
        }
        assert_eq!(room.peer(1).phase(), RoundPhase::ShowingResults);

        room.ready(1);
        room.ready(2);
        room.ready(2);
        room.run_for(2.0, 0.5);
        assert_eq!(room.peer(1).phase(), RoundPhase::WaitingForReady);
        assert_eq!(room.peer(1).current_round(), 1);
        assert!(
            room.events(3)
                .contains(&PresenterEvent::ReadyLabel { ready: 2, total: 3 })
        );

        room.ready(3);
        for id in room.actor_ids() {
            assert_eq!(room.peer(id).current_round(), 2);
            assert_eq!(room.peer(id).phase(), RoundPhase::Countdown);
        }
        assert_eq!(room.peer(2).properties().ready_count(), 0);
    }

    #[test]
    fn leaving_player_completes_collection() {
        let mut room = room(3, 2, 3);
        room.start_game();
        reach_collecting(&mut room);
        let answer = room.answer_for(1);
        room.submit(1, &answer.to_string());
        room.submit(2, &answer.to_string());
        assert_eq!(room.peer(1).phase(), RoundPhase::Collecting);

        room.remove_player(3);
        assert_eq!(room.peer(1).phase(), RoundPhase::ShowingResults);
        assert_eq!(room.peer(2).last_results().len(), 2);
    }

    #[test]
    fn answer_timeout_judges_missing_players() {
        let settings = RoundSettings {
            answer_timeout_secs: Some(5.0),
            ..RoundSettings::default()
        };
        let mut room = LocalRoom::new(3, 2, 3, settings);
        room.start_game();
        reach_collecting(&mut room);
        let answer = room.answer_for(1);
        room.submit(1, &answer.to_string());

        room.run_for(4.5, 0.5);
        assert_eq!(room.peer(1).phase(), RoundPhase::Collecting);
        room.tick_all(0.5);
        assert_eq!(room.peer(1).phase(), RoundPhase::ShowingResults);

        let results = room.peer(2).last_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].actor_id, 1);
        assert!(results[1..].iter().all(|r| r.answer.is_none() && !r.is_correct));
    }

    #[test]
    fn single_round_game_goes_straight_to_game_over() {
        let mut room = room(2, 1, 1);
        room.start_game();
        reach_collecting(&mut room);
        room.submit(1, "0");
        room.submit(2, "0");
        assert!(phases(&room).iter().all(|p| *p == RoundPhase::GameOver));

        // Restarting after the last round never exceeds the round count
        room.start_game();
        assert_eq!(room.peer(1).current_round(), 1);
        assert_eq!(room.peer(2).phase(), RoundPhase::GameOver);
    }

    #[test]
    fn broadcast_from_non_master_is_dropped() {
        let mut room = room(3, 2, 3);
        let out = room.peer_mut(2).handle_message(
            3,
            GameMessage::StartNextRound(StartNextRoundMsg { round: 1 }),
        );
        assert!(out.is_empty());
        assert_eq!(room.peer(2).phase(), RoundPhase::Idle);
    }

    #[test]
    fn request_on_non_master_is_dropped() {
        let mut room = room(2, 2, 3);
        room.start_game();
        reach_collecting(&mut room);
        let out = room.peer_mut(2).handle_message(
            1,
            GameMessage::RequestIncrementReady(RequestIncrementReadyMsg {
                actor_id: 1,
                round: 1,
            }),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn undecodable_wire_data_is_dropped() {
        let mut room = room(2, 2, 3);
        assert!(room.peer_mut(2).handle_wire(1, &[0xFF, 0x00]).is_empty());
        assert!(room.peer_mut(2).handle_wire(1, &[]).is_empty());
        assert_eq!(room.peer(2).phase(), RoundPhase::Idle);
    }

    #[test]
    fn master_leaving_hands_role_to_lowest_actor() {
        let mut room = room(3, 2, 3);
        room.start_game();
        room.remove_player(1);
        assert_eq!(room.master(), 2);
        assert!(room.peer(2).is_master());
        assert!(!room.peer(3).is_master());
        assert_eq!(room.peer(3).context().player_count(), 2);
    }

    #[test]
    fn departed_answers_do_not_close_collection() {
        let mut room = room(4, 2, 3);
        room.start_game();
        reach_collecting(&mut room);
        let answer = room.answer_for(1).to_string();
        for id in [1, 3, 4] {
            room.submit(id, &answer);
        }
        assert_eq!(room.peer(2).properties().answered_count(), 3);

        room.remove_player(3);
        room.remove_player(4);
        assert_eq!(room.peer(1).phase(), RoundPhase::Collecting);
        assert!(room.peer(2).accepts_answer());
        assert_eq!(room.peer(2).properties().answered_count(), 1);
        assert!(
            room.peer(2).properties().answered_count() as usize
                <= room.peer(2).context().player_count()
        );

        room.submit(2, &answer);
        assert_eq!(room.peer(1).phase(), RoundPhase::ShowingResults);
        // Submissions from departed players are still judged
        let results = room.peer(2).last_results();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_correct));
    }

    fn solo_master(settings: RoundSettings, catalog: DieCatalog) -> RoundCoordinator {
        let ctx = SessionContext::new(1, Roster::new(make_players(1)));
        RoundCoordinator::new(ctx, settings, catalog, Box::new(NullPresenter)).with_seed(1)
    }

    #[test]
    fn empty_catalog_round_still_times_out() {
        let settings = RoundSettings {
            answer_timeout_secs: Some(5.0),
            ..RoundSettings::default()
        };
        let mut master = solo_master(settings, DieCatalog::default());
        master.start_game();
        for _ in 0..8 {
            master.tick(0.5);
        }
        assert_eq!(master.phase(), RoundPhase::Collecting);
        assert!(master.dice().is_empty());
        assert!(master.accepts_answer());

        for _ in 0..10 {
            master.tick(0.5);
        }
        assert_eq!(master.phase(), RoundPhase::ShowingResults);
        let results = master.last_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].answer, None);
    }

    #[test]
    fn empty_catalog_round_accepts_answers() {
        let mut master = solo_master(RoundSettings::default(), DieCatalog::default());
        master.start_game();
        for _ in 0..8 {
            master.tick(0.5);
        }
        assert!(master.accepts_answer());
        master.submit_local_answer("1");
        assert_eq!(master.phase(), RoundPhase::ShowingResults);
        assert_eq!(master.last_correct_answer(), Some(1));
        assert!(master.last_results()[0].is_correct);
    }

    #[test]
    fn empty_dice_broadcast_reveals_on_peers() {
        let mut room = room(2, 2, 3);
        room.start_game();
        // Peer 2 is mid-countdown; deliver an empty dice set for the round
        let out = room.peer_mut(2).handle_message(
            1,
            GameMessage::DiceSpawned(DiceSpawnedMsg {
                round: 1,
                dice: Vec::new(),
            }),
        );
        assert!(out.is_empty());
        for _ in 0..8 {
            room.peer_mut(2).tick(0.5);
        }
        assert_eq!(room.peer(2).phase(), RoundPhase::Collecting);
        assert!(room.peer(2).accepts_answer());
    }
}
