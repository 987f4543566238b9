use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dice count used when the room has not published `DiceNumber`.
pub const DEFAULT_DICE_COUNT: u32 = 5;
/// Round count used when the room has not published `RoundNumber`.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
/// Upper bound on dice per round. 6^20 still fits the i64 product.
pub const MAX_DICE_COUNT: u32 = 20;
/// Maximum number of players a room accepts.
pub const MAX_PLAYERS_PER_ROOM: usize = 4;

/// Keys of the replicated room property map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomProperty {
    AnsweredCount,
    DiceNumber,
    RoundNumber,
    ReadyCount,
}

impl RoomProperty {
    pub const ALL: [RoomProperty; 4] = [
        RoomProperty::AnsweredCount,
        RoomProperty::DiceNumber,
        RoomProperty::RoundNumber,
        RoomProperty::ReadyCount,
    ];

    /// Wire key used in the shared key/value map.
    pub fn key(self) -> &'static str {
        match self {
            Self::AnsweredCount => "AnsweredCount",
            Self::DiceNumber => "DiceNumber",
            Self::RoundNumber => "RoundNumber",
            Self::ReadyCount => "ReadyCount",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl std::fmt::Display for RoomProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A last-writer-wins register. A write is accepted when its revision is
/// strictly newer than the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lww<T> {
    pub value: Option<T>,
    pub revision: u64,
}

impl<T: PartialEq + Copy> Lww<T> {
    /// Apply a write. Returns true when the visible value changed.
    fn apply(&mut self, value: T, revision: u64) -> bool {
        if revision <= self.revision && self.value.is_some() {
            return false;
        }
        let changed = self.value != Some(value);
        self.value = Some(value);
        self.revision = revision;
        changed
    }
}

/// A partial write to the room property map. Unset fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyWrite {
    pub answered_count: Option<u32>,
    pub dice_number: Option<u32>,
    pub round_number: Option<u32>,
    pub ready_count: Option<u32>,
}

impl PropertyWrite {
    pub fn answered_count(count: u32) -> Self {
        Self {
            answered_count: Some(count),
            ..Self::default()
        }
    }

    pub fn ready_count(count: u32) -> Self {
        Self {
            ready_count: Some(count),
            ..Self::default()
        }
    }

    pub fn room_settings(dice_number: u32, round_number: u32) -> Self {
        Self {
            dice_number: Some(dice_number),
            round_number: Some(round_number),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.answered_count.is_none()
            && self.dice_number.is_none()
            && self.round_number.is_none()
            && self.ready_count.is_none()
    }

    /// Combine two writes; fields set in `later` win.
    pub fn merged_with(self, later: PropertyWrite) -> Self {
        Self {
            answered_count: later.answered_count.or(self.answered_count),
            dice_number: later.dice_number.or(self.dice_number),
            round_number: later.round_number.or(self.round_number),
            ready_count: later.ready_count.or(self.ready_count),
        }
    }
}

/// Typed view of the replicated room property map. Every peer holds a copy
/// and folds in writes via [`RoomProperties::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomProperties {
    answered_count: Lww<u32>,
    dice_number: Lww<u32>,
    round_number: Lww<u32>,
    ready_count: Lww<u32>,
}

impl RoomProperties {
    /// Merge a write stamped with `revision`. Returns the keys whose visible
    /// value changed, in key order.
    pub fn merge(&mut self, write: &PropertyWrite, revision: u64) -> Vec<RoomProperty> {
        let mut changed = Vec::new();
        if let Some(v) = write.answered_count
            && self.answered_count.apply(v, revision)
        {
            changed.push(RoomProperty::AnsweredCount);
        }
        if let Some(v) = write.dice_number
            && self.dice_number.apply(v, revision)
        {
            changed.push(RoomProperty::DiceNumber);
        }
        if let Some(v) = write.round_number
            && self.round_number.apply(v, revision)
        {
            changed.push(RoomProperty::RoundNumber);
        }
        if let Some(v) = write.ready_count
            && self.ready_count.apply(v, revision)
        {
            changed.push(RoomProperty::ReadyCount);
        }
        changed
    }

    pub fn answered_count(&self) -> u32 {
        self.answered_count.value.unwrap_or(0)
    }

    pub fn ready_count(&self) -> u32 {
        self.ready_count.value.unwrap_or(0)
    }

    pub fn dice_count(&self) -> u32 {
        self.dice_number.value.unwrap_or(DEFAULT_DICE_COUNT)
    }

    pub fn max_rounds(&self) -> u32 {
        self.round_number.value.unwrap_or(DEFAULT_MAX_ROUNDS)
    }

    /// Snapshot the round configuration from the current properties.
    pub fn round_config(&self) -> RoundConfig {
        RoundConfig::new(self.dice_count(), self.max_rounds())
    }

    /// Like [`RoomProperties::round_config`], with caller-supplied fallbacks
    /// for unset properties.
    pub fn round_config_or(&self, dice_count: u32, max_rounds: u32) -> RoundConfig {
        RoundConfig::new(
            self.dice_number.value.unwrap_or(dice_count),
            self.round_number.value.unwrap_or(max_rounds),
        )
    }

    pub fn get(&self, key: RoomProperty) -> Option<u32> {
        match key {
            RoomProperty::AnsweredCount => self.answered_count.value,
            RoomProperty::DiceNumber => self.dice_number.value,
            RoomProperty::RoundNumber => self.round_number.value,
            RoomProperty::ReadyCount => self.ready_count.value,
        }
    }

    /// The whole map as a write, for sending a snapshot to a joining peer.
    pub fn as_write(&self) -> PropertyWrite {
        PropertyWrite {
            answered_count: self.answered_count.value,
            dice_number: self.dice_number.value,
            round_number: self.round_number.value,
            ready_count: self.ready_count.value,
        }
    }

    /// Highest revision folded into any field.
    pub fn revision(&self) -> u64 {
        self.answered_count
            .revision
            .max(self.dice_number.revision)
            .max(self.round_number.revision)
            .max(self.ready_count.revision)
    }

    /// Render the set properties as a string-keyed JSON object.
    pub fn to_json_map(&self) -> Map<String, Value> {
        RoomProperty::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|v| (key.key().to_string(), Value::from(v))))
            .collect()
    }
}

impl PropertyWrite {
    /// Parse a string-keyed JSON object. Unknown keys and non-integer values
    /// are skipped.
    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        let mut write = PropertyWrite::default();
        for (key, value) in map {
            let Some(prop) = RoomProperty::from_key(key) else {
                tracing::debug!(key = %key, "ignoring unknown room property");
                continue;
            };
            let Some(v) = value.as_u64().and_then(|v| u32::try_from(v).ok()) else {
                tracing::warn!(key = %key, value = %value, "room property is not a u32");
                continue;
            };
            match prop {
                RoomProperty::AnsweredCount => write.answered_count = Some(v),
                RoomProperty::DiceNumber => write.dice_number = Some(v),
                RoomProperty::RoundNumber => write.round_number = Some(v),
                RoomProperty::ReadyCount => write.ready_count = Some(v),
            }
        }
        write
    }
}

/// Per-round configuration, captured from room properties when a round
/// starts and held fixed for the rest of that round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub dice_count: u32,
    pub max_rounds: u32,
}

impl RoundConfig {
    /// Both values are clamped to at least 1; the dice count is also capped
    /// at [`MAX_DICE_COUNT`].
    pub fn new(dice_count: u32, max_rounds: u32) -> Self {
        Self {
            dice_count: dice_count.clamp(1, MAX_DICE_COUNT),
            max_rounds: max_rounds.max(1),
        }
    }
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DICE_COUNT, DEFAULT_MAX_ROUNDS)
    }
}

/// Generate a room code in `ABCD-1234` form.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    let letters: String = (0..4)
        .map(|_| char::from(b'A' + rng.random_range(0..26u8)))
        .collect();
    let digits: u16 = rng.random_range(0..10_000);
    format!("{letters}-{digits:04}")
}
