use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::model::structures::ai_variant::AiVariant;
use crate::model::structures::setting_value::SettingValue;

pub type PlayerId = u32;

/// One eligible cooperative replay after normalization. Settings hold only
/// the classified keys for the record's variant; a missing entry is a null.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub id: String,
    pub variant: AiVariant,
    pub map_name: String,
    pub start_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub did_ai_win: bool,
    /// Humans on winning teams. Empty when the AI won.
    pub winners: BTreeSet<PlayerId>,
    /// Every human in the lobby.
    pub participants: BTreeSet<PlayerId>,
    pub damage_award: Option<PlayerId>,
    pub damage_award_value: Option<u64>,
    pub eco_award: Option<PlayerId>,
    pub settings: BTreeMap<String, SettingValue>,
}

impl GameRecord {
    pub fn human_win(&self) -> bool {
        !self.did_ai_win
    }

    pub fn setting(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }
}

/// A record plus the evidence merged into it from dominated and dominating
/// lobbies. Starts out as a copy of the record's own outcome.
#[derive(Debug, Clone)]
pub struct ExtendedRecord {
    pub record: GameRecord,
    pub winners_extended: BTreeSet<PlayerId>,
    pub players_extended: BTreeSet<PlayerId>,
    pub merged_win_replays: Vec<String>,
    pub merged_loss_replays: Vec<String>,
}

impl ExtendedRecord {
    pub fn new(record: GameRecord) -> Self {
        let winners_extended = record.winners.clone();
        let players_extended = record.participants.clone();
        Self {
            record,
            winners_extended,
            players_extended,
            merged_win_replays: Vec::new(),
            merged_loss_replays: Vec::new(),
        }
    }
}
