//! Save-data shapes persisted per account.
//!
//! Only the fields the server inspects are typed. Everything the game client
//! owns (party rosters, modifiers, arena, trainer, game stats) is carried as
//! [`Opaque`] CBOR values so a decode/encode cycle never loses data.
//!
//! Every struct is `#[serde(default)]`: new optional fields can be appended
//! without invalidating blobs written before they existed.

use std::collections::BTreeMap;

use ciborium::Value;
use serde::{Deserialize, Serialize};

/// Number of independent session slots per account.
pub const SESSION_SLOT_COUNT: i32 = 5;

/// An order-preserving, untyped value passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opaque(pub Value);

impl Default for Opaque {
    fn default() -> Self {
        Opaque(Value::Null)
    }
}

impl Opaque {
    /// Looks up a text key in a map value and reads it as an integer.
    ///
    /// Floats are truncated, since the client serializes every number the same way.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        let Value::Map(entries) = &self.0 else {
            return None;
        };

        entries.iter().find_map(|(k, v)| match k {
            Value::Text(name) if name == key => match v {
                Value::Integer(i) => i64::try_from(*i).ok(),
                Value::Float(f) => Some(*f as i64),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Game mode of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum GameMode {
    #[default]
    Classic,
    Endless,
    SpliceEndless,
    Daily,
    Challenge,
    /// A mode this server does not know about yet.
    Other(i32),
}

impl From<i32> for GameMode {
    fn from(value: i32) -> Self {
        match value {
            0 => GameMode::Classic,
            1 => GameMode::Endless,
            2 => GameMode::SpliceEndless,
            3 => GameMode::Daily,
            4 => GameMode::Challenge,
            other => GameMode::Other(other),
        }
    }
}

impl From<GameMode> for i32 {
    fn from(mode: GameMode) -> Self {
        match mode {
            GameMode::Classic => 0,
            GameMode::Endless => 1,
            GameMode::SpliceEndless => 2,
            GameMode::Daily => 3,
            GameMode::Challenge => 4,
            GameMode::Other(other) => other,
        }
    }
}

/// Battle type of the wave a session was saved on.
///
/// Wire value 0 is the regular wave flow the completion rule keys on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum BattleType {
    #[default]
    Classic,
    Trainer,
    Clear,
    Other(i32),
}

impl From<i32> for BattleType {
    fn from(value: i32) -> Self {
        match value {
            0 => BattleType::Classic,
            1 => BattleType::Trainer,
            2 => BattleType::Clear,
            other => BattleType::Other(other),
        }
    }
}

impl From<BattleType> for i32 {
    fn from(battle_type: BattleType) -> Self {
        match battle_type {
            BattleType::Classic => 0,
            BattleType::Trainer => 1,
            BattleType::Clear => 2,
            BattleType::Other(other) => other,
        }
    }
}

/// Per-species dex progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DexEntry {
    pub seen_attr: u64,
    pub caught_attr: u64,
    pub nature_attr: u64,
    pub seen_count: i32,
    pub caught_count: i32,
    pub hatched_count: i32,
    pub ivs: Vec<i32>,
}

/// An unhatched egg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EggData {
    pub id: i64,
    pub gacha_type: i32,
    pub hatch_waves: i32,
    pub timestamp: i64,
}

/// Per-account meta-progression save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemSave {
    pub trainer_id: u32,
    pub secret_id: u32,
    pub gender: i32,
    pub dex_data: BTreeMap<u32, DexEntry>,
    pub starter_data: BTreeMap<u32, Opaque>,
    pub game_stats: Opaque,
    pub unlocks: BTreeMap<u32, bool>,
    pub achv_unlocks: BTreeMap<String, i64>,
    pub voucher_unlocks: BTreeMap<String, i64>,
    pub voucher_counts: BTreeMap<String, i64>,
    pub eggs: Vec<EggData>,
    pub game_version: String,
    pub timestamp: i64,
}

/// An in-progress run stored in one session slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSave {
    pub seed: String,
    pub play_time: i64,
    pub game_mode: GameMode,
    pub party: Vec<Opaque>,
    pub enemy_party: Vec<Opaque>,
    pub modifiers: Vec<Opaque>,
    pub enemy_modifiers: Vec<Opaque>,
    pub arena: Opaque,
    pub pokeball_counts: BTreeMap<String, i64>,
    pub money: i64,
    pub score: i64,
    pub wave_index: i32,
    pub battle_type: BattleType,
    pub trainer: Opaque,
    pub game_version: String,
    pub timestamp: i64,
}
