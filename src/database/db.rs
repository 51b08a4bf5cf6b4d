use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::database::db_structs::{GroupedSettingRow, PlayerRatingRow, RawReplay};
use crate::model::classification::{
    BARBARIAN_HANDICAP_KEY, BARBARIAN_PER_PLAYER_KEY, NUTTYB_HP_KEY,
};
use crate::model::pve_model::VariantResult;
use crate::model::structures::game_record::PlayerId;
use crate::model::structures::grouped_setting::GroupedSetting;
use crate::model::structures::setting_value::SettingValue;

const NUTTYB_TWEAKS_DOC: &str =
    "https://docs.google.com/document/d/1ycQV-T__ilKeTKxbCyGjlTKw_6nmDSFdJo-kPmPrjIs";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot store json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Filesystem boundary of the pipeline: reads the replay snapshot and
/// writes the per-variant exports.
pub struct SnapshotStore {
    snapshot_path: PathBuf,
    output_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(snapshot_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Reads the snapshot file, a JSON array of raw replay documents.
    pub fn load_replays(&self) -> Result<Vec<RawReplay>, StoreError> {
        let raw = fs::read_to_string(&self.snapshot_path)?;
        let replays: Vec<RawReplay> = serde_json::from_str(&raw)?;
        info!(
            replays = replays.len(),
            path = %self.snapshot_path.display(),
            "loaded replay snapshot"
        );
        Ok(replays)
    }

    /// Writes every export for the processed variants: the four difficulty
    /// tiers of grouped settings, the rating table per variant and the
    /// combined ratings document.
    pub fn publish(
        &self,
        results: &[VariantResult],
        player_names: &HashMap<PlayerId, String>,
    ) -> Result<Vec<PathBuf>, StoreError> {
        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();
        let mut combined = serde_json::Map::new();

        for result in results {
            let prefix = result.variant.to_string();

            let rows: Vec<GroupedSettingRow> = result
                .grouped_settings
                .iter()
                .map(|group| grouped_row(group, result, player_names, &prefix))
                .collect();

            written.push(self.write_json(
                &format!("{prefix}.all.grouped_gamesettings.json"),
                &rows,
            )?);

            let hardest = rows.iter().map(|row| row.difficulty).fold(f64::NEG_INFINITY, f64::max);
            let easiest = rows.iter().map(|row| row.difficulty).fold(f64::INFINITY, f64::min);
            let tier = |name: &str, keep: &dyn Fn(&GroupedSettingRow) -> bool| {
                (
                    format!("{prefix}.{name}.grouped_gamesettings.json"),
                    rows.iter().filter(|row| keep(row)).cloned().collect::<Vec<_>>(),
                )
            };
            for (name, tier_rows) in [
                tier("regular", &|row| {
                    row.difficulty > easiest && row.difficulty < hardest
                }),
                tier("unbeaten", &|row| row.difficulty == hardest),
                tier("cheese", &|row| row.difficulty == easiest),
            ] {
                written.push(self.write_json(&name, &tier_rows)?);
            }

            let mut rating_rows: Vec<PlayerRatingRow> = result
                .ratings
                .iter()
                .map(|rating| PlayerRatingRow {
                    player: display_name(player_names, rating.player_id),
                    award_rate: rating.award_rate,
                    weighted_award_rate: rating.weighted_award_rate,
                    difficulty_record: rating.difficulty_record,
                    difficulty_score: rating.difficulty_score,
                    difficulty_losers_sum: rating.difficulty_losers_sum,
                    setting_combinations: rating.setting_combinations,
                    games_played: rating.games_played,
                    win_rate: rating.win_rate,
                    combined_rank: rating.combined_rank,
                    pve_rating: rating.pve_rating,
                })
                .collect();
            rating_rows.sort_by(|a, b| {
                b.pve_rating
                    .total_cmp(&a.pve_rating)
                    .then_with(|| a.player.cmp(&b.player))
            });
            written.push(self.write_json(
                &format!("PveRating.{prefix}_gamesettings.json"),
                &rating_rows,
            )?);

            let ratings_by_name: serde_json::Map<String, Value> = rating_rows
                .iter()
                .map(|row| (row.player.clone(), Value::from(row.pve_rating)))
                .collect();
            combined.insert(format!("{prefix}AI"), Value::Object(ratings_by_name));

            info!(
                variant = %result.variant,
                groups = rows.len(),
                rated_players = rating_rows.len(),
                "published variant exports"
            );
        }

        written.push(self.write_json(
            "pve_ratings.json",
            &serde_json::json!({ "pve_ratings": combined }),
        )?);
        Ok(written)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StoreError> {
        let path = self.output_dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(value)?)?;
        Ok(path)
    }
}

fn display_name(player_names: &HashMap<PlayerId, String>, player: PlayerId) -> String {
    player_names
        .get(&player)
        .cloned()
        .unwrap_or_else(|| player.to_string())
}

fn joined_names(player_names: &HashMap<PlayerId, String>, players: &[PlayerId]) -> String {
    players
        .iter()
        .map(|&player| display_name(player_names, player))
        .join(", ")
}

fn setting_json(value: &SettingValue) -> Value {
    match value {
        SettingValue::Int(value) => Value::from(*value),
        SettingValue::Float(value) => Value::from(*value),
        SettingValue::Text(value) => Value::from(value.clone()),
        SettingValue::Ordinal(_, label) => Value::from(*label),
    }
}

fn grouped_row(
    group: &GroupedSetting,
    result: &VariantResult,
    player_names: &HashMap<PlayerId, String>,
    prefix: &str,
) -> GroupedSettingRow {
    // setting columns carry the grouped keys plus the remembered constants,
    // so a row reads as the complete lobby setup
    let mut settings: std::collections::BTreeMap<String, Value> = group
        .settings
        .iter()
        .map(|(key, value)| {
            (
                key.clone(),
                value.as_ref().map_or(Value::Null, setting_json),
            )
        })
        .collect();
    for (key, value) in &result.dropped_constants {
        settings
            .entry(key.clone())
            .or_insert_with(|| setting_json(value));
    }

    GroupedSettingRow {
        difficulty: group.difficulty,
        winners_count: group.winners_count() as u32,
        players_count: group.players_count() as u32,
        winners: joined_names(player_names, &group.winners),
        players: joined_names(player_names, &group.players),
        win_replays: group.win_replays.clone(),
        merged_win_replays: group.merged_win_replays.clone(),
        loss_replays: group.loss_replays.clone(),
        merged_loss_replays: group.merged_loss_replays.clone(),
        copy_paste: build_paste(group, result, prefix),
        map: group.map_name.clone(),
        settings,
    }
}

/// The lobby setup block for one grouped setting. Only keys that vary
/// across the corpus print a line; display-only keys and engine defaults
/// are skipped.
fn build_paste(group: &GroupedSetting, result: &VariantResult, prefix: &str) -> String {
    let mut paste =
        String::from("\n!preset coop\n!draft_mode disabled\n!unit_market 1\n!teamsize 16\n");
    if !group.map_name.is_empty() {
        paste.push_str(&format!("!map {}\n", group.map_name));
    }

    for (key, value) in &group.settings {
        if matches!(
            key.as_str(),
            NUTTYB_HP_KEY | BARBARIAN_HANDICAP_KEY | BARBARIAN_PER_PLAYER_KEY
        ) {
            continue;
        }
        let Some(value) = value else { continue };

        let rendered = if key.ends_with("_spawntimemult") {
            match value {
                SettingValue::Float(multiplier) => {
                    ((multiplier * 10.0).round() / 10.0).to_string()
                }
                other => other.to_string(),
            }
        } else {
            value.to_string()
        };
        let rendered = rendered.trim();
        let rendered = rendered.strip_suffix(".0").unwrap_or(rendered);
        if rendered.is_empty() {
            continue;
        }
        if (key.starts_with("multiplier_") && rendered == "1")
            || (key.starts_with("unit_restrictions_") && rendered == "0")
        {
            continue;
        }

        if key.contains("tweak") {
            paste.push_str(&format!("!bSet {key} {rendered}\n"));
        } else {
            paste.push_str(&format!("!{key} {rendered}\n"));
        }
    }

    // the preset keys that never made a line still drive the footer
    let nuttyb = group
        .settings
        .get(NUTTYB_HP_KEY)
        .is_some_and(Option::is_some)
        || result.dropped_constants.contains_key(NUTTYB_HP_KEY);
    let nuttyb_link = if nuttyb {
        format!(" and {NUTTYB_TWEAKS_DOC}")
    } else {
        String::new()
    };
    paste.push_str(&format!(
        "$welcome-message Settings from {prefix}.all.grouped_gamesettings{nuttyb_link}\n"
    ));

    let tweaked = |key: &str, value: Option<&SettingValue>| {
        key.contains("tweak") && value.is_some_and(|value| value.label() != Some(""))
    };
    let modded = group
        .settings
        .iter()
        .any(|(key, value)| tweaked(key, value.as_ref()))
        || result
            .dropped_constants
            .iter()
            .any(|(key, value)| tweaked(key, Some(value)));
    if modded {
        paste.push_str(&format!("$rename [Modded] {prefix}\n"));
    }

    paste
}
