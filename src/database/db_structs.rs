use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One fetched replay document from the snapshot. The lobby settings sit
/// flattened beside the roster fields, one entry per modoption.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReplay {
    pub id: String,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: Option<i64>,
    #[serde(rename = "Map Name")]
    pub map_name: Option<String>,
    #[serde(rename = "Map")]
    pub map: Option<RawMap>,
    #[serde(rename = "AllyTeams")]
    pub ally_teams: Option<Vec<RawAllyTeam>>,
    pub awards: Option<RawAwards>,
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMap {
    #[serde(rename = "scriptName")]
    pub script_name: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAllyTeam {
    #[serde(rename = "winningTeam")]
    pub winning_team: Option<bool>,
    #[serde(rename = "Players", default)]
    pub players: Vec<RawPlayer>,
    #[serde(rename = "AIs", default)]
    pub ais: Vec<RawAi>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayer {
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    #[serde(rename = "teamId")]
    pub team_id: Option<i64>,
    pub name: Option<String>,
    pub handicap: Option<f64>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAi {
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
    #[serde(rename = "teamId")]
    pub team_id: Option<i64>,
    pub handicap: Option<f64>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAwards {
    #[serde(rename = "fightingUnitsDestroyed", default)]
    pub fighting_units_destroyed: Vec<RawTeamAward>,
    #[serde(rename = "mostResourcesProduced")]
    pub most_resources_produced: Option<RawTeamAward>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTeamAward {
    #[serde(rename = "teamId")]
    pub team_id: Option<i64>,
    pub value: Option<u64>
}

/// One exported grouped-settings row. Setting columns ride along flattened,
/// mirroring how the classifier names them.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedSettingRow {
    #[serde(rename = "Difficulty")]
    pub difficulty: f64,
    #[serde(rename = "#Winners")]
    pub winners_count: u32,
    #[serde(rename = "#Players")]
    pub players_count: u32,
    #[serde(rename = "Winners")]
    pub winners: String,
    #[serde(rename = "Players")]
    pub players: String,
    #[serde(rename = "Win Replays")]
    pub win_replays: Vec<String>,
    #[serde(rename = "Merged Win Replays")]
    pub merged_win_replays: Vec<String>,
    #[serde(rename = "Loss Replays")]
    pub loss_replays: Vec<String>,
    #[serde(rename = "Merged Loss Replays")]
    pub merged_loss_replays: Vec<String>,
    #[serde(rename = "Copy Paste")]
    pub copy_paste: String,
    #[serde(rename = "Map")]
    pub map: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>
}

/// One exported rating row, display names resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerRatingRow {
    #[serde(rename = "Player")]
    pub player: String,
    #[serde(rename = "Award Rate")]
    pub award_rate: Option<f64>,
    #[serde(rename = "Weighted Award Rate")]
    pub weighted_award_rate: f64,
    #[serde(rename = "Difficulty Record")]
    pub difficulty_record: f64,
    #[serde(rename = "Difficulty Score")]
    pub difficulty_score: f64,
    #[serde(rename = "Difficulty Losers Sum")]
    pub difficulty_losers_sum: u32,
    #[serde(rename = "#Settings")]
    pub setting_combinations: u32,
    #[serde(rename = "#Games")]
    pub games_played: u32,
    #[serde(rename = "Win Rate")]
    pub win_rate: f64,
    #[serde(rename = "Combined Rank")]
    pub combined_rank: f64,
    #[serde(rename = "PVE Rating")]
    pub pve_rating: f64
}
