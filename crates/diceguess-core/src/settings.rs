use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dice::{SpawnArea, SpawnPoint};
use crate::room::{DEFAULT_DICE_COUNT, DEFAULT_MAX_ROUNDS, MAX_DICE_COUNT};

/// Timing and spawn parameters for the round coordinator.
///
/// Every field has a default, so a partial `[round]` table (or none at all)
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundSettings {
    /// First number shown by the countdown.
    pub countdown_from: u32,
    /// Seconds per countdown step.
    pub countdown_interval_secs: f32,
    /// Hard ceiling on answer collection, measured from the dice appearing.
    /// `None` waits for every player.
    pub answer_timeout_secs: Option<f32>,
    /// How long results stay on screen before the ready phase.
    pub results_hold_secs: f32,
    pub spawn_radius: f32,
    pub spawn_min_distance: f32,
    pub spawn_max_attempts: u32,
    /// Dice per round when the room does not say otherwise.
    pub default_dice_count: u32,
    /// Rounds per game when the room does not say otherwise.
    pub default_max_rounds: u32,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_interval_secs: 1.0,
            answer_timeout_secs: None,
            results_hold_secs: 1.0,
            spawn_radius: 2.0,
            spawn_min_distance: 1.0,
            spawn_max_attempts: 100,
            default_dice_count: DEFAULT_DICE_COUNT,
            default_max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl RoundSettings {
    pub fn spawn_area(&self) -> SpawnArea {
        SpawnArea {
            center: SpawnPoint::default(),
            radius: self.spawn_radius,
            min_distance: self.spawn_min_distance,
            max_attempts: self.spawn_max_attempts,
        }
    }

    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f32)
    }

    pub fn results_hold(&self) -> Duration {
        Duration::from_secs_f32(self.results_hold_secs.max(0.0))
    }

    /// Check for values that would stall or break a round.
    pub fn validate(&self) -> Result<(), String> {
        if !self.countdown_interval_secs.is_finite() || self.countdown_interval_secs < 0.0 {
            return Err("countdown_interval_secs must be a non-negative number".into());
        }
        if !self.results_hold_secs.is_finite() || self.results_hold_secs < 0.0 {
            return Err("results_hold_secs must be a non-negative number".into());
        }
        if let Some(t) = self.answer_timeout_secs
            && (!t.is_finite() || t <= 0.0)
        {
            return Err("answer_timeout_secs must be positive when set".into());
        }
        if !self.spawn_radius.is_finite() || self.spawn_radius < 0.0 {
            return Err("spawn_radius must be non-negative".into());
        }
        if self.spawn_max_attempts == 0 {
            return Err("spawn_max_attempts must be at least 1".into());
        }
        if self.default_dice_count == 0 || self.default_max_rounds == 0 {
            return Err("default dice count and round count must be at least 1".into());
        }
        if self.default_dice_count > MAX_DICE_COUNT {
            return Err(format!("default_dice_count must be at most {MAX_DICE_COUNT}"));
        }
        Ok(())
    }
}
