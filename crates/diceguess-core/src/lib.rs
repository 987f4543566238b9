pub mod answers;
pub mod coordinator;
pub mod countdown;
pub mod dice;
pub mod error;
pub mod net;
pub mod player;
pub mod presentation;
pub mod ranking;
pub mod ready;
pub mod room;
pub mod settings;
pub mod stats;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::answers::RoundResult;
    use crate::coordinator::{Outbound, RoundCoordinator};
    use crate::countdown::CountdownStep;
    use crate::dice::{self, DiceValue, DieCatalog};
    use crate::net::protocol::encode_game_message;
    use crate::player::{ActorId, Player, Roster, SessionContext};
    use crate::presentation::Presenter;
    use crate::room::PropertyWrite;
    use crate::settings::RoundSettings;
    use crate::stats::PlayerStats;

    /// Create `n` test players with sequential IDs starting at 1. Player 1 is
    /// the master.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                actor_id: i as ActorId + 1,
                display_name: format!("Player{}", i + 1),
                is_master: i == 0,
            })
            .collect()
    }

    /// One presenter call, as captured by [`RecordingPresenter`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum PresenterEvent {
        RoundStarted { round: u32, max_rounds: u32 },
        Countdown(CountdownStep),
        Dice(Vec<u32>),
        AnswerInput(bool),
        Results {
            results: Vec<RoundResult>,
            correct_answer: i64,
            standings: Vec<PlayerStats>,
        },
        ReadyLabel { ready: u32, total: u32 },
        FinalResults(Vec<PlayerStats>),
    }

    pub type PresenterLog = Arc<Mutex<Vec<PresenterEvent>>>;

    /// Presenter that records every call into a shared log.
    #[derive(Debug, Default, Clone)]
    pub struct RecordingPresenter {
        log: PresenterLog,
    }

    impl RecordingPresenter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn log(&self) -> PresenterLog {
            Arc::clone(&self.log)
        }

        fn push(&self, event: PresenterEvent) {
            self.log
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        }
    }

    impl Presenter for RecordingPresenter {
        fn start_round_display(&mut self, round: u32, max_rounds: u32) {
            self.push(PresenterEvent::RoundStarted { round, max_rounds });
        }

        fn show_countdown_display(&mut self, step: CountdownStep) {
            self.push(PresenterEvent::Countdown(step));
        }

        fn show_dice(&mut self, dice: &[DiceValue]) {
            self.push(PresenterEvent::Dice(dice.iter().map(|d| d.value).collect()));
        }

        fn set_answer_input_enabled(&mut self, enabled: bool) {
            self.push(PresenterEvent::AnswerInput(enabled));
        }

        fn show_round_results(
            &mut self,
            results: &[RoundResult],
            correct_answer: i64,
            standings: &[PlayerStats],
        ) {
            self.push(PresenterEvent::Results {
                results: results.to_vec(),
                correct_answer,
                standings: standings.to_vec(),
            });
        }

        fn update_ready_label(&mut self, ready: u32, total: u32) {
            self.push(PresenterEvent::ReadyLabel { ready, total });
        }

        fn show_final_results(&mut self, standings: &[PlayerStats]) {
            self.push(PresenterEvent::FinalResults(standings.to_vec()));
        }
    }

    struct LocalPeer {
        coordinator: RoundCoordinator,
        log: PresenterLog,
    }

    /// Synchronous in-memory room: routes every [`Outbound`] between a set of
    /// coordinators through the wire codec, stamping property writes with a
    /// monotonically increasing revision.
    pub struct LocalRoom {
        peers: Vec<LocalPeer>,
        master: ActorId,
        revision: u64,
    }

    impl LocalRoom {
        /// A room of `n` players (actor 1 is master) configured for
        /// `dice_count` dice over `max_rounds` rounds.
        pub fn new(n: usize, dice_count: u32, max_rounds: u32, settings: RoundSettings) -> Self {
            let players = make_players(n);
            let peers = players
                .iter()
                .map(|p| {
                    let presenter = RecordingPresenter::new();
                    let log = presenter.log();
                    let ctx = SessionContext::new(p.actor_id, Roster::new(players.clone()));
                    let coordinator = RoundCoordinator::new(
                        ctx,
                        settings.clone(),
                        DieCatalog::standard_d6(),
                        Box::new(presenter),
                    )
                    .with_seed(u64::from(p.actor_id));
                    LocalPeer { coordinator, log }
                })
                .collect();
            let mut room = Self {
                peers,
                master: 1,
                revision: 0,
            };
            room.write_properties(PropertyWrite::room_settings(dice_count, max_rounds));
            room
        }

        pub fn master(&self) -> ActorId {
            self.master
        }

        pub fn actor_ids(&self) -> Vec<ActorId> {
            self.peers
                .iter()
                .map(|p| p.coordinator.local_actor())
                .collect()
        }

        pub fn peer(&self, actor_id: ActorId) -> &RoundCoordinator {
            &self.peers[self.index(actor_id)].coordinator
        }

        pub fn peer_mut(&mut self, actor_id: ActorId) -> &mut RoundCoordinator {
            let idx = self.index(actor_id);
            &mut self.peers[idx].coordinator
        }

        /// Presenter calls recorded for one peer so far.
        pub fn events(&self, actor_id: ActorId) -> Vec<PresenterEvent> {
            self.peers[self.index(actor_id)]
                .log
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        pub fn clear_events(&self) {
            for p in &self.peers {
                p.log.lock().unwrap_or_else(|e| e.into_inner()).clear();
            }
        }

        fn index(&self, actor_id: ActorId) -> usize {
            self.peers
                .iter()
                .position(|p| p.coordinator.local_actor() == actor_id)
                .unwrap_or_else(|| panic!("no peer with actor id {actor_id}"))
        }

        pub fn write_properties(&mut self, write: PropertyWrite) {
            let master = self.master;
            self.route(master, vec![Outbound::SetProperties(write)]);
        }

        pub fn start_game(&mut self) {
            let master = self.master;
            let idx = self.index(master);
            let out = self.peers[idx].coordinator.start_game();
            self.route(master, out);
        }

        /// Same as [`LocalRoom::start_game`] but issued on any peer.
        pub fn start_game_on(&mut self, actor_id: ActorId) {
            let idx = self.index(actor_id);
            let out = self.peers[idx].coordinator.start_game();
            self.route(actor_id, out);
        }

        /// Advance every peer's clock by `dt`, routing whatever they emit.
        pub fn tick_all(&mut self, dt: f32) {
            for id in self.actor_ids() {
                let idx = self.index(id);
                let out = self.peers[idx].coordinator.tick(dt);
                self.route(id, out);
            }
        }

        /// Tick every peer in `dt` steps for `seconds` of simulated time.
        pub fn run_for(&mut self, seconds: f32, dt: f32) {
            let steps = (seconds / dt).round() as usize;
            for _ in 0..steps {
                self.tick_all(dt);
            }
        }

        pub fn submit(&mut self, actor_id: ActorId, input: &str) {
            let idx = self.index(actor_id);
            let out = self.peers[idx].coordinator.submit_local_answer(input);
            self.route(actor_id, out);
        }

        pub fn ready(&mut self, actor_id: ActorId) {
            let idx = self.index(actor_id);
            let out = self.peers[idx].coordinator.acknowledge_ready();
            self.route(actor_id, out);
        }

        pub fn ready_all(&mut self) {
            for id in self.actor_ids() {
                self.ready(id);
            }
        }

        /// The correct answer for the dice `actor_id` currently sees.
        pub fn answer_for(&self, actor_id: ActorId) -> i64 {
            dice::product(self.peer(actor_id).dice())
        }

        /// Disconnect a player. When the master leaves, the lowest remaining
        /// actor id takes over.
        pub fn remove_player(&mut self, actor_id: ActorId) {
            let idx = self.index(actor_id);
            self.peers.remove(idx);
            for id in self.actor_ids() {
                let i = self.index(id);
                let out = self.peers[i].coordinator.player_left(actor_id);
                self.route(id, out);
            }
            if actor_id == self.master
                && let Some(next) = self.actor_ids().into_iter().min()
            {
                self.master = next;
                for id in self.actor_ids() {
                    let i = self.index(id);
                    let out = self.peers[i].coordinator.master_changed(next);
                    self.route(id, out);
                }
            }
        }

        /// Deliver outbound actions until the room is quiet.
        pub fn route(&mut self, from: ActorId, out: Vec<Outbound>) {
            let mut queue: VecDeque<(ActorId, Outbound)> =
                out.into_iter().map(|o| (from, o)).collect();

            while let Some((sender, action)) = queue.pop_front() {
                match action {
                    Outbound::ToMaster(msg) => {
                        let bytes = encode(&msg);
                        let master = self.master;
                        let Some(idx) = self
                            .peers
                            .iter()
                            .position(|p| p.coordinator.local_actor() == master)
                        else {
                            continue;
                        };
                        let produced = self.peers[idx].coordinator.handle_wire(sender, &bytes);
                        queue.extend(produced.into_iter().map(|o| (master, o)));
                    },
                    Outbound::Broadcast(msg) => {
                        let bytes = encode(&msg);
                        for id in self.actor_ids() {
                            if id == sender {
                                continue;
                            }
                            let idx = self.index(id);
                            let produced = self.peers[idx].coordinator.handle_wire(sender, &bytes);
                            queue.extend(produced.into_iter().map(|o| (id, o)));
                        }
                    },
                    Outbound::SetProperties(write) => {
                        self.revision += 1;
                        let revision = self.revision;
                        for id in self.actor_ids() {
                            let idx = self.index(id);
                            let produced = self.peers[idx]
                                .coordinator
                                .apply_property_update(revision, &write);
                            queue.extend(produced.into_iter().map(|o| (id, o)));
                        }
                    },
                }
            }
        }
    }

    fn encode(msg: &crate::net::messages::GameMessage) -> Vec<u8> {
        match encode_game_message(msg) {
            Ok(bytes) => bytes,
            Err(e) => panic!("failed to encode {:?}: {e}", msg.message_type()),
        }
    }
}
