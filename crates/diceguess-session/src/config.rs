use serde::Deserialize;

use diceguess_core::net::protocol::DEFAULT_TICK_RATE_HZ;
use diceguess_core::room::{
    DEFAULT_DICE_COUNT, DEFAULT_MAX_ROUNDS, MAX_DICE_COUNT, MAX_PLAYERS_PER_ROOM,
};
use diceguess_core::settings::RoundSettings;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "diceguess.toml";

/// Top-level session configuration, loaded from `diceguess.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub round: RoundSettings,
    pub room: RoomConfig,
    pub sim: SimConfig,
}

/// Room-level settings the master publishes when it creates the room.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub dice_count: u32,
    pub round_count: u32,
    pub max_players: usize,
    pub max_rooms: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            dice_count: DEFAULT_DICE_COUNT,
            round_count: DEFAULT_MAX_ROUNDS,
            max_players: MAX_PLAYERS_PER_ROOM,
            max_rooms: 16,
        }
    }
}

/// Headless simulation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of bot players, the room master included.
    pub bot_count: usize,
    /// Probability in `[0, 1]` that a bot answers correctly.
    pub bot_accuracy: f64,
    pub think_min_secs: f32,
    pub think_max_secs: f32,
    pub tick_rate_hz: u32,
    /// Fixed seed for dice and bots. Random when unset.
    pub seed: Option<u64>,
    /// Abort the simulation after this many seconds.
    pub timeout_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bot_count: MAX_PLAYERS_PER_ROOM,
            bot_accuracy: 0.7,
            think_min_secs: 0.5,
            think_max_secs: 2.5,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            seed: None,
            timeout_secs: 600,
        }
    }
}

impl SessionConfig {
    /// Check for values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        self.round.validate().map_err(|e| format!("round.{e}"))?;

        if self.room.dice_count == 0 || self.room.dice_count > MAX_DICE_COUNT {
            return Err(format!("room.dice_count must be between 1 and {MAX_DICE_COUNT}"));
        }
        if self.room.round_count == 0 {
            return Err("room.round_count must be > 0".into());
        }
        if self.room.max_players == 0 || self.room.max_players > MAX_PLAYERS_PER_ROOM {
            return Err(format!(
                "room.max_players must be between 1 and {MAX_PLAYERS_PER_ROOM}"
            ));
        }
        if self.room.max_rooms == 0 {
            return Err("room.max_rooms must be > 0".into());
        }

        if self.sim.bot_count == 0 || self.sim.bot_count > self.room.max_players {
            return Err(format!(
                "sim.bot_count must be between 1 and room.max_players ({})",
                self.room.max_players
            ));
        }
        if !(0.0..=1.0).contains(&self.sim.bot_accuracy) {
            return Err("sim.bot_accuracy must be within [0, 1]".into());
        }
        if !self.sim.think_min_secs.is_finite()
            || self.sim.think_min_secs < 0.0
            || !self.sim.think_max_secs.is_finite()
            || self.sim.think_max_secs < self.sim.think_min_secs
        {
            return Err("sim think time must satisfy 0 <= think_min_secs <= think_max_secs".into());
        }
        if self.sim.tick_rate_hz == 0 {
            return Err("sim.tick_rate_hz must be > 0".into());
        }
        if self.sim.timeout_secs == 0 {
            return Err("sim.timeout_secs must be > 0".into());
        }
        Ok(())
    }

    /// Load config from `diceguess.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<SessionConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {path}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    SessionConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No {path} found, using defaults");
                SessionConfig::default()
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `DICEGUESS_*` overrides read through `lookup`. Values that do
    /// not parse are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DICEGUESS_DICE_COUNT")
            && let Ok(n) = val.parse::<u32>()
        {
            self.room.dice_count = n;
        }
        if let Some(val) = lookup("DICEGUESS_ROUND_COUNT")
            && let Ok(n) = val.parse::<u32>()
        {
            self.room.round_count = n;
        }
        if let Some(val) = lookup("DICEGUESS_ANSWER_TIMEOUT")
            && let Ok(n) = val.parse::<f32>()
        {
            self.round.answer_timeout_secs = Some(n);
        }
        if let Some(val) = lookup("DICEGUESS_BOT_COUNT")
            && let Ok(n) = val.parse::<usize>()
        {
            self.sim.bot_count = n;
        }
        if let Some(val) = lookup("DICEGUESS_BOT_ACCURACY")
            && let Ok(n) = val.parse::<f64>()
        {
            self.sim.bot_accuracy = n;
        }
        if let Some(val) = lookup("DICEGUESS_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            self.sim.tick_rate_hz = n;
        }
        if let Some(val) = lookup("DICEGUESS_SEED")
            && let Ok(n) = val.parse::<u64>()
        {
            self.sim.seed = Some(n);
        }
    }
}
