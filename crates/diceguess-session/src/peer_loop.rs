use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use diceguess_core::coordinator::{Outbound, RoundCoordinator, RoundPhase};
use diceguess_core::dice::{self, DieCatalog};
use diceguess_core::net::protocol::DEFAULT_TICK_RATE_HZ;
use diceguess_core::player::{ActorId, Roster, SessionContext};
use diceguess_core::room::{PropertyWrite, RoundConfig};
use diceguess_core::settings::RoundSettings;
use diceguess_core::stats::PlayerStats;
use diceguess_relay::{RelayError, RelayEvent, SharedRelayState};

use crate::bot::{Bot, BotAction, BotProfile};
use crate::presenter::LogPresenter;

/// Commands sent from the driver (UI, simulation) to a peer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    StartGame,
    SubmitAnswer(String),
    Ready,
    Leave,
}

/// Progress reported by a peer loop to its driver.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerReport {
    PhaseChanged {
        actor_id: ActorId,
        round: u32,
        phase: RoundPhase,
    },
    DiceRevealed {
        actor_id: ActorId,
        round: u32,
        product: i64,
    },
    GameOver {
        actor_id: ActorId,
        standings: Vec<PlayerStats>,
    },
    Left {
        actor_id: ActorId,
    },
}

/// How a peer enters its room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEntry {
    /// Create the room and become its master.
    Create(String),
    Join(String),
}

/// Configuration for one peer.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub display_name: String,
    pub settings: RoundSettings,
    pub catalog: DieCatalog,
    pub tick_rate_hz: u32,
    /// Seed for dice and bot decisions. Random when unset.
    pub seed: Option<u64>,
    /// Drive this peer with a bot instead of commands.
    pub bot: Option<BotProfile>,
    /// Dice and round counts the master publishes once it is in the room.
    pub room_settings: Option<RoundConfig>,
}

impl PeerConfig {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            settings: RoundSettings::default(),
            catalog: DieCatalog::standard_d6(),
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            seed: None,
            bot: None,
            room_settings: None,
        }
    }
}

/// A running peer task.
#[derive(Debug)]
pub struct PeerHandle {
    pub actor_id: ActorId,
    pub room_code: String,
    commands: mpsc::UnboundedSender<PeerCommand>,
    task: JoinHandle<()>,
}

impl PeerHandle {
    /// Queue a command. Returns false if the peer loop has exited.
    pub fn send(&self, cmd: PeerCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    /// Wait for the peer loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(actor_id = self.actor_id, error = %e, "peer task failed");
        }
    }
}

/// Enter a relay room and spawn the peer loop as a tokio task.
pub async fn spawn_peer(
    relay: &SharedRelayState,
    entry: RoomEntry,
    config: PeerConfig,
    reports: mpsc::UnboundedSender<PeerReport>,
) -> Result<PeerHandle, RelayError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (actor_id, room_code) = {
        let mut state = relay.write().await;
        match entry {
            RoomEntry::Create(code) => {
                let id = state.create_room(code.clone(), config.display_name.clone(), event_tx)?;
                (id, code)
            },
            RoomEntry::Join(code) => {
                let id = state.join_room(&code, config.display_name.clone(), event_tx)?;
                (id, code)
            },
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let link = RelayLink {
        relay: Arc::clone(relay),
        room_code: room_code.clone(),
        actor_id,
        reports,
    };
    let task = tokio::spawn(async move {
        run_peer_loop(link, config, event_rx, cmd_rx).await;
    });

    Ok(PeerHandle {
        actor_id,
        room_code,
        commands: cmd_tx,
        task,
    })
}

/// A peer's connection to the relay and to its driver.
struct RelayLink {
    relay: SharedRelayState,
    room_code: String,
    actor_id: ActorId,
    reports: mpsc::UnboundedSender<PeerReport>,
}

impl RelayLink {
    async fn dispatch(&self, out: Vec<Outbound>) {
        if out.is_empty() {
            return;
        }
        let mut state = self.relay.write().await;
        for action in out {
            if let Err(e) = state.dispatch(&self.room_code, self.actor_id, action) {
                tracing::warn!(actor_id = self.actor_id, error = %e, "relay rejected action");
            }
        }
    }

    async fn leave(&self) {
        let result = self
            .relay
            .write()
            .await
            .leave_room(&self.room_code, self.actor_id);
        match result {
            Ok(destroyed) => {
                tracing::info!(actor_id = self.actor_id, destroyed, "left room");
            },
            Err(e) => tracing::warn!(actor_id = self.actor_id, error = %e, "leave failed"),
        }
        let _ = self.reports.send(PeerReport::Left {
            actor_id: self.actor_id,
        });
    }

    fn report(&self, report: PeerReport) {
        let _ = self.reports.send(report);
    }
}

/// What the driver has already been told.
#[derive(Default)]
struct Reported {
    phase: Option<(u32, RoundPhase)>,
    dice_round: u32,
    game_over: bool,
}

impl Reported {
    fn update(&mut self, link: &RelayLink, coordinator: &RoundCoordinator) {
        let actor_id = link.actor_id;
        let round = coordinator.current_round();
        let phase = coordinator.phase();

        if self.phase != Some((round, phase)) {
            self.phase = Some((round, phase));
            link.report(PeerReport::PhaseChanged {
                actor_id,
                round,
                phase,
            });
        }
        if !coordinator.dice().is_empty() && self.dice_round != round {
            self.dice_round = round;
            link.report(PeerReport::DiceRevealed {
                actor_id,
                round,
                product: dice::product(coordinator.dice()),
            });
        }
        if phase == RoundPhase::GameOver && !self.game_over {
            self.game_over = true;
            link.report(PeerReport::GameOver {
                actor_id,
                standings: coordinator.standings().to_vec(),
            });
        }
    }
}

/// One peer: a coordinator fed by relay events, driver commands and a fixed
/// rate tick. Relay events are drained before commands so a command never
/// overtakes a room change that was already delivered.
async fn run_peer_loop(
    link: RelayLink,
    config: PeerConfig,
    mut events: mpsc::UnboundedReceiver<RelayEvent>,
    mut commands: mpsc::UnboundedReceiver<PeerCommand>,
) {
    let actor_id = link.actor_id;
    let Some(RelayEvent::Joined {
        players,
        properties,
        revision,
        ..
    }) = events.recv().await
    else {
        tracing::warn!(actor_id, "relay closed before the room snapshot arrived");
        return;
    };

    let seed = config.seed.unwrap_or_else(rand::random);
    let ctx = SessionContext::new(actor_id, Roster::new(players));
    let mut coordinator = RoundCoordinator::new(
        ctx,
        config.settings,
        config.catalog,
        Box::new(LogPresenter::new(actor_id)),
    )
    .with_seed(seed);
    let mut bot = config.bot.map(|profile| Bot::new(profile, seed.wrapping_add(1)));
    let mut reported = Reported::default();

    if revision > 0 {
        let out = coordinator.apply_property_update(revision, &properties);
        link.dispatch(out).await;
    }
    if coordinator.is_master()
        && let Some(rc) = config.room_settings
    {
        let write = PropertyWrite::room_settings(rc.dice_count, rc.max_rounds);
        link.dispatch(vec![Outbound::SetProperties(write)]).await;
    }

    let dt = 1.0 / config.tick_rate_hz.max(1) as f32;
    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(actor_id, room = %link.room_code, bot = bot.is_some(), "peer loop started");

    loop {
        let out = tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => handle_event(&mut coordinator, event),
                None => {
                    tracing::info!(actor_id, "relay channel closed");
                    break;
                },
            },
            cmd = commands.recv() => match cmd {
                Some(PeerCommand::StartGame) => coordinator.start_game(),
                Some(PeerCommand::SubmitAnswer(input)) => coordinator.submit_local_answer(&input),
                Some(PeerCommand::Ready) => coordinator.acknowledge_ready(),
                Some(PeerCommand::Leave) | None => {
                    link.leave().await;
                    break;
                },
            },
            _ = interval.tick() => {
                let mut out = coordinator.tick(dt);
                if let Some(bot) = bot.as_mut()
                    && let Some(action) = bot.poll(&coordinator, dt)
                {
                    out.extend(match action {
                        BotAction::Answer(input) => coordinator.submit_local_answer(&input),
                        BotAction::Ready => coordinator.acknowledge_ready(),
                    });
                }
                out
            },
        };
        link.dispatch(out).await;
        reported.update(&link, &coordinator);
    }
}

fn handle_event(coordinator: &mut RoundCoordinator, event: RelayEvent) -> Vec<Outbound> {
    match event {
        RelayEvent::Message { from, data } => coordinator.handle_wire(from, &data),
        RelayEvent::PropertiesChanged { revision, write } => {
            coordinator.apply_property_update(revision, &write)
        },
        RelayEvent::PlayerJoined(player) => coordinator.player_joined(player),
        RelayEvent::PlayerLeft(actor_id) => coordinator.player_left(actor_id),
        RelayEvent::MasterChanged(actor_id) => coordinator.master_changed(actor_id),
        RelayEvent::Joined { actor_id, .. } => {
            tracing::warn!(actor_id, "ignoring repeated room snapshot");
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diceguess_relay::RelayState;
    use tokio::sync::RwLock;

    fn shared_relay() -> SharedRelayState {
        Arc::new(RwLock::new(RelayState::new(4)))
    }

    fn fast_settings() -> RoundSettings {
        RoundSettings {
            countdown_from: 1,
            countdown_interval_secs: 0.02,
            results_hold_secs: 0.02,
            ..RoundSettings::default()
        }
    }

    async fn next_report(rx: &mut mpsc::UnboundedReceiver<PeerReport>) -> PeerReport {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("report within timeout")
            .expect("report channel open")
    }

    #[tokio::test]
    async fn joining_missing_room_fails() {
        let relay = shared_relay();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = spawn_peer(
            &relay,
            RoomEntry::Join("NOPE-0000".into()),
            PeerConfig::new("Bob"),
            tx,
        )
        .await;
        assert!(matches!(result, Err(RelayError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn host_publishes_room_settings() {
        let relay = shared_relay();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut config = PeerConfig::new("Host");
        config.room_settings = Some(RoundConfig::new(2, 3));
        let host = spawn_peer(&relay, RoomEntry::Create("ROOM-0001".into()), config, tx)
            .await
            .unwrap();
        assert_eq!(host.actor_id, 1);

        // First report marks the loop as running, so the settings write is done
        let _ = next_report(&mut rx).await;
        {
            let state = relay.read().await;
            let props = state.properties("ROOM-0001").unwrap();
            assert_eq!(props.dice_count(), 2);
            assert_eq!(props.max_rounds(), 3);
        }

        assert!(host.send(PeerCommand::Leave));
        host.join().await;
        assert!(!relay.read().await.room_exists("ROOM-0001"));
    }

    #[tokio::test]
    async fn single_peer_plays_one_round_by_command() {
        let relay = shared_relay();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut config = PeerConfig::new("Solo");
        config.settings = fast_settings();
        config.tick_rate_hz = 100;
        config.seed = Some(9);
        config.room_settings = Some(RoundConfig::new(3, 1));
        let peer = spawn_peer(&relay, RoomEntry::Create("SOLO-0001".into()), config, tx)
            .await
            .unwrap();

        peer.send(PeerCommand::StartGame);
        let product = loop {
            if let PeerReport::DiceRevealed { round, product, .. } = next_report(&mut rx).await {
                assert_eq!(round, 1);
                break product;
            }
        };
        peer.send(PeerCommand::SubmitAnswer(product.to_string()));

        let standings = loop {
            if let PeerReport::GameOver { standings, .. } = next_report(&mut rx).await {
                break standings;
            }
        };
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].cumulative_score, 1);
        assert_eq!(standings[0].display_name, "Solo");

        peer.send(PeerCommand::Leave);
        peer.join().await;
    }
}
