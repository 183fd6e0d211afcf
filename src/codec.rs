//! Save-data codec: self-describing CBOR streamed through zstd.
//!
//! CBOR keeps field names in the payload, so fields can be appended to the
//! save structs without breaking blobs written earlier. Any failure in either
//! stage is reported as `AppError::Corrupt`; decoding builds a fresh value and
//! never touches an existing one.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::savedata::{SessionSave, SystemSave};

/// zstd compression level for save blobs.
pub const COMPRESSION_LEVEL: i32 = 3;

/// The two save shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    System,
    Session,
}

impl SaveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveKind::System => "system",
            SaveKind::Session => "session",
        }
    }
}

/// A value the codec knows how to store.
pub trait SaveData: Serialize + DeserializeOwned {
    const KIND: SaveKind;
}

impl SaveData for SystemSave {
    const KIND: SaveKind = SaveKind::System;
}

impl SaveData for SessionSave {
    const KIND: SaveKind = SaveKind::Session;
}

/// Serializes and compresses `save`.
pub fn encode<T: SaveData>(save: &T) -> Result<Vec<u8>> {
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), COMPRESSION_LEVEL)
        .map_err(|e| AppError::Internal(format!("zstd encoder: {}", e)))?;

    ciborium::into_writer(save, &mut encoder).map_err(|e| {
        AppError::Internal(format!("{} save encode failed: {}", T::KIND.as_str(), e))
    })?;

    encoder
        .finish()
        .map_err(|e| AppError::Internal(format!("{} save compression failed: {}", T::KIND.as_str(), e)))
}

/// Decompresses and deserializes a blob produced by [`encode`].
pub fn decode<T: SaveData>(bytes: &[u8]) -> Result<T> {
    let decoder = zstd::stream::Decoder::new(bytes)
        .map_err(|e| AppError::Corrupt(format!("{} save: {}", T::KIND.as_str(), e)))?;

    ciborium::from_reader(decoder)
        .map_err(|e| AppError::Corrupt(format!("{} save: {}", T::KIND.as_str(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::savedata::{BattleType, DexEntry, EggData, GameMode, Opaque};
    use ciborium::Value;
    use serde::Deserialize;

    fn sample_system() -> SystemSave {
        let mut save = SystemSave {
            trainer_id: 48213,
            secret_id: 9120,
            gender: 1,
            game_version: "1.0.4".to_string(),
            timestamp: 1_714_000_000_000,
            game_stats: Opaque(Value::Map(vec![
                (Value::Text("battles".into()), Value::Integer(42i64.into())),
                (Value::Text("playTime".into()), Value::Integer(3600i64.into())),
            ])),
            ..Default::default()
        };
        save.dex_data.insert(
            25,
            DexEntry {
                seen_attr: 3,
                caught_attr: 1,
                nature_attr: 8,
                seen_count: 4,
                caught_count: 1,
                hatched_count: 0,
                ivs: vec![31, 0, 12, 7, 19, 25],
            },
        );
        save.voucher_counts.insert("0".to_string(), 2);
        save.eggs.push(EggData {
            id: 77,
            gacha_type: 1,
            hatch_waves: 10,
            timestamp: 1_714_000_000_000,
        });
        save
    }

    fn sample_session() -> SessionSave {
        SessionSave {
            seed: "x8Kq2".to_string(),
            play_time: 812,
            game_mode: GameMode::Daily,
            party: vec![Opaque(Value::Map(vec![(
                Value::Text("species".into()),
                Value::Integer(6i64.into()),
            )]))],
            arena: Opaque(Value::Map(vec![(Value::Text("biome".into()), Value::Integer(3i64.into()))])),
            money: 1500,
            score: 230,
            wave_index: 17,
            battle_type: BattleType::Trainer,
            trainer: Opaque(Value::Bytes(vec![1, 2, 3])),
            game_version: "1.0.4".to_string(),
            timestamp: 1_714_000_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn saves_survive_encode_decode() {
        let system = sample_system();
        assert_eq!(decode::<SystemSave>(&encode(&system).unwrap()).unwrap(), system);

        let session = sample_session();
        assert_eq!(decode::<SessionSave>(&encode(&session).unwrap()).unwrap(), session);
    }

    #[test]
    fn empty_saves_survive_encode_decode() {
        let system = SystemSave::default();
        assert_eq!(decode::<SystemSave>(&encode(&system).unwrap()).unwrap(), system);

        let session = SessionSave::default();
        assert_eq!(decode::<SessionSave>(&encode(&session).unwrap()).unwrap(), session);
    }

    #[test]
    fn opaque_map_order_is_preserved() {
        let mut session = sample_session();
        session.arena = Opaque(Value::Map(vec![
            (Value::Text("zeta".into()), Value::Bool(true)),
            (Value::Text("alpha".into()), Value::Null),
            (Value::Integer(5i64.into()), Value::Float(1.5)),
        ]));

        let decoded: SessionSave = decode(&encode(&session).unwrap()).unwrap();
        assert_eq!(decoded.arena, session.arena);
    }

    #[test]
    fn blobs_are_compressed() {
        let bytes = encode(&sample_system()).unwrap();
        assert_eq!(&bytes[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
    }

    #[test]
    fn garbage_and_truncation_are_corrupt() {
        assert!(matches!(decode::<SystemSave>(b"definitely not zstd"), Err(AppError::Corrupt(_))));
        assert!(matches!(decode::<SystemSave>(&[]), Err(AppError::Corrupt(_))));

        let bytes = encode(&sample_system()).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(decode::<SystemSave>(truncated), Err(AppError::Corrupt(_))));
    }

    #[test]
    fn schema_mismatch_is_corrupt() {
        #[derive(Serialize, Deserialize)]
        struct Wrong {
            #[serde(rename = "trainerId")]
            trainer_id: String,
        }
        impl SaveData for Wrong {
            const KIND: SaveKind = SaveKind::System;
        }

        let bytes = encode(&Wrong { trainer_id: "not a number".into() }).unwrap();
        assert!(matches!(decode::<SystemSave>(&bytes), Err(AppError::Corrupt(_))));
    }

    #[test]
    fn older_blobs_decode_with_new_fields_defaulted() {
        #[derive(Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct EarlySession {
            seed: String,
            wave_index: i32,
            score: i64,
        }
        impl SaveData for EarlySession {
            const KIND: SaveKind = SaveKind::Session;
        }

        let bytes = encode(&EarlySession {
            seed: "abc".into(),
            wave_index: 12,
            score: 90,
        })
        .unwrap();

        let decoded: SessionSave = decode(&bytes).unwrap();
        assert_eq!(decoded.seed, "abc");
        assert_eq!(decoded.wave_index, 12);
        assert_eq!(decoded.score, 90);
        assert_eq!(decoded.game_mode, GameMode::Classic);
        assert!(decoded.party.is_empty());
    }
}
