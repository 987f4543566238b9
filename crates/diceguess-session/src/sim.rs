//! Headless simulation: a full room of bots playing one game through the
//! in-process relay.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};

use diceguess_core::player::ActorId;
use diceguess_core::room::RoundConfig;
use diceguess_core::stats::PlayerStats;
use diceguess_relay::{RelayState, SharedRelayState};

use crate::bot::BotProfile;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::peer_loop::{PeerCommand, PeerConfig, PeerHandle, PeerReport, RoomEntry, spawn_peer};

/// Outcome of a simulated game.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub room_code: String,
    /// Final standings as seen by each peer.
    pub final_standings: BTreeMap<ActorId, Vec<PlayerStats>>,
}

impl SimulationReport {
    /// The master's (lowest actor id) view of the final standings.
    pub fn standings(&self) -> &[PlayerStats] {
        self.final_standings
            .values()
            .next()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether every peer ended with the same standings.
    pub fn is_consistent(&self) -> bool {
        let mut views = self.final_standings.values();
        match views.next() {
            Some(first) => views.all(|v| v == first),
            None => true,
        }
    }
}

fn peer_config(config: &SessionConfig, index: usize) -> PeerConfig {
    let mut peer = PeerConfig::new(format!("Bot{}", index + 1));
    peer.settings = config.round.clone();
    peer.tick_rate_hz = config.sim.tick_rate_hz;
    peer.seed = config.sim.seed.map(|s| s.wrapping_add(index as u64 * 1000));
    peer.bot = Some(BotProfile {
        accuracy: config.sim.bot_accuracy,
        think_min_secs: config.sim.think_min_secs,
        think_max_secs: config.sim.think_max_secs,
    });
    peer
}

/// Run one game with `sim.bot_count` bots and return every peer's final
/// standings.
pub async fn run_simulation(config: &SessionConfig) -> Result<SimulationReport, SessionError> {
    config.validate().map_err(SessionError::Config)?;

    let relay: SharedRelayState = Arc::new(RwLock::new(
        RelayState::new(config.room.max_rooms).with_max_players(config.room.max_players),
    ));
    let room_code = relay.read().await.unique_room_code();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();

    let mut peers: Vec<PeerHandle> = Vec::with_capacity(config.sim.bot_count);
    for index in 0..config.sim.bot_count {
        let mut peer = peer_config(config, index);
        let entry = if index == 0 {
            peer.room_settings = Some(RoundConfig::new(
                config.room.dice_count,
                config.room.round_count,
            ));
            RoomEntry::Create(room_code.clone())
        } else {
            RoomEntry::Join(room_code.clone())
        };
        match spawn_peer(&relay, entry, peer, report_tx.clone()).await {
            Ok(handle) => peers.push(handle),
            Err(e) => {
                shutdown(peers).await;
                return Err(e.into());
            },
        }
    }
    drop(report_tx);

    tracing::info!(
        room = %room_code,
        players = peers.len(),
        dice = config.room.dice_count,
        rounds = config.room.round_count,
        "simulation starting"
    );
    if let Some(host) = peers.first() {
        host.send(PeerCommand::StartGame);
    }

    let expected = peers.len();
    let wait = async {
        let mut finished = BTreeMap::new();
        while finished.len() < expected {
            match report_rx.recv().await {
                Some(PeerReport::GameOver {
                    actor_id,
                    standings,
                }) => {
                    finished.insert(actor_id, standings);
                },
                Some(PeerReport::PhaseChanged {
                    actor_id,
                    round,
                    phase,
                }) => {
                    tracing::trace!(actor_id, round, ?phase, "phase changed");
                },
                Some(_) => {},
                None => return Err(SessionError::Aborted),
            }
        }
        Ok(finished)
    };
    let outcome =
        tokio::time::timeout(Duration::from_secs(config.sim.timeout_secs), wait).await;

    shutdown(peers).await;

    let final_standings = match outcome {
        Ok(result) => result?,
        Err(_) => return Err(SessionError::TimedOut(config.sim.timeout_secs)),
    };
    Ok(SimulationReport {
        room_code,
        final_standings,
    })
}

async fn shutdown(peers: Vec<PeerHandle>) {
    for peer in &peers {
        peer.send(PeerCommand::Leave);
    }
    for peer in peers {
        peer.join().await;
    }
}
