use std::collections::{BTreeMap, BTreeSet};

use crate::model::structures::game_record::PlayerId;
use crate::model::structures::setting_value::SettingValue;

/// One emitted row of the difficulty table: a map plus a full setting
/// combination, with the evidence of every game played on it.
#[derive(Debug, Clone)]
pub struct GroupedSetting {
    pub map_name: String,
    /// Values of the classified keys, nulls included. Identical across all
    /// games of the group by construction.
    pub settings: BTreeMap<String, Option<SettingValue>>,
    /// `1 - |winners| / |players|` over the extended sets.
    pub difficulty: f64,
    /// Extended winners in display order: games by damage award value
    /// descending, first occurrence kept.
    pub winners: Vec<PlayerId>,
    /// Extended participants in the same display order.
    pub players: Vec<PlayerId>,
    pub win_replays: Vec<String>,
    pub merged_win_replays: Vec<String>,
    pub loss_replays: Vec<String>,
    pub merged_loss_replays: Vec<String>,
    /// Raw winner sets of the group's own games, chronological, with empty
    /// sets dropped. Completion walks replay these.
    pub games_winners: Vec<BTreeSet<PlayerId>>,
    /// Union of the raw winner sets.
    pub winners_flat: BTreeSet<PlayerId>,
}

impl GroupedSetting {
    pub fn winners_count(&self) -> usize {
        self.winners.len()
    }

    pub fn players_count(&self) -> usize {
        self.players.len()
    }

    pub fn players_set(&self) -> BTreeSet<PlayerId> {
        self.players.iter().copied().collect()
    }

    /// Deterministic tiebreak for sorting groups that agree on difficulty,
    /// player count and map.
    pub fn settings_sort_key(&self) -> String {
        self.settings
            .values()
            .map(|value| match value {
                Some(value) => value.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}
