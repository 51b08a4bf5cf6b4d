use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use tracing::warn;

use crate::model::classification::VariantClassifier;
use crate::model::structures::game_record::{ExtendedRecord, PlayerId};
use crate::model::structures::grouped_setting::GroupedSetting;
use crate::model::structures::setting_value::SettingValue;

/// Groups a variant's records by map plus the full classified setting
/// vector, nulls included, and condenses each group's evidence into one
/// difficulty row.
pub fn group_settings(
    records: &[ExtendedRecord],
    classifier: &VariantClassifier,
) -> Vec<GroupedSetting> {
    let names = classifier.grouping_key_names();

    let mut groups: IndexMap<(String, Vec<Option<SettingValue>>), Vec<usize>> = IndexMap::new();
    for (idx, record) in records.iter().enumerate() {
        let values: Vec<Option<SettingValue>> = names
            .iter()
            .map(|name| record.record.setting(name).cloned())
            .collect();
        groups
            .entry((record.record.map_name.clone(), values))
            .or_default()
            .push(idx);
    }

    let mut grouped: Vec<GroupedSetting> = groups
        .into_iter()
        .filter_map(|((map_name, values), indices)| {
            condense_group(records, &names, map_name, values, indices)
        })
        .collect();

    grouped.sort_by(|a, b| {
        b.difficulty
            .total_cmp(&a.difficulty)
            .then_with(|| b.players_count().cmp(&a.players_count()))
            .then_with(|| a.map_name.cmp(&b.map_name))
            .then_with(|| a.settings_sort_key().cmp(&b.settings_sort_key()))
    });
    grouped
}

/// Damage award descending; award-less games last; stable over time.
fn damage_cmp(a: &ExtendedRecord, b: &ExtendedRecord) -> Ordering {
    b.record
        .damage_award_value
        .cmp(&a.record.damage_award_value)
        .then_with(|| a.record.start_time.cmp(&b.record.start_time))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn duration_cmp(a: &ExtendedRecord, b: &ExtendedRecord) -> Ordering {
    b.record
        .duration_ms
        .cmp(&a.record.duration_ms)
        .then_with(|| a.record.start_time.cmp(&b.record.start_time))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn chrono_cmp(a: &ExtendedRecord, b: &ExtendedRecord) -> Ordering {
    a.record
        .start_time
        .cmp(&b.record.start_time)
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn first_seen(players: impl Iterator<Item = PlayerId>) -> Vec<PlayerId> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for player in players {
        if seen.insert(player) {
            ordered.push(player);
        }
    }
    ordered
}

fn dedup_excluding(ids: impl Iterator<Item = String>, exclude: &[String]) -> Vec<String> {
    let mut seen: BTreeSet<String> = exclude.iter().cloned().collect();
    let mut ordered = Vec::new();
    for id in ids {
        if seen.insert(id.clone()) {
            ordered.push(id);
        }
    }
    ordered
}

fn condense_group(
    records: &[ExtendedRecord],
    names: &[&'static str],
    map_name: String,
    values: Vec<Option<SettingValue>>,
    indices: Vec<usize>,
) -> Option<GroupedSetting> {
    let mut winners_union: BTreeSet<PlayerId> = BTreeSet::new();
    let mut players_union: BTreeSet<PlayerId> = BTreeSet::new();
    for &idx in &indices {
        winners_union.extend(&records[idx].winners_extended);
        players_union.extend(&records[idx].players_extended);
    }

    if players_union.is_empty() {
        warn!(map = %map_name, games = indices.len(), "dropping group with an empty player set");
        return None;
    }
    let difficulty = 1.0 - winners_union.len() as f64 / players_union.len() as f64;

    let mut damage_order = indices.clone();
    damage_order.sort_by(|&a, &b| damage_cmp(&records[a], &records[b]));
    let mut duration_order = indices.clone();
    duration_order.sort_by(|&a, &b| duration_cmp(&records[a], &records[b]));
    let mut chrono_order = indices;
    chrono_order.sort_by(|&a, &b| chrono_cmp(&records[a], &records[b]));

    let winners = first_seen(
        damage_order
            .iter()
            .flat_map(|&idx| records[idx].winners_extended.iter().copied()),
    );
    let players = first_seen(
        damage_order
            .iter()
            .flat_map(|&idx| records[idx].players_extended.iter().copied()),
    );

    let win_replays: Vec<String> = damage_order
        .iter()
        .filter(|&&idx| records[idx].record.human_win())
        .map(|&idx| records[idx].record.id.clone())
        .collect();
    let loss_replays: Vec<String> = duration_order
        .iter()
        .filter(|&&idx| records[idx].record.did_ai_win)
        .map(|&idx| records[idx].record.id.clone())
        .collect();

    // merged lists never repeat a replay the group already holds directly
    let merged_win_replays = dedup_excluding(
        damage_order
            .iter()
            .flat_map(|&idx| records[idx].merged_win_replays.iter().cloned()),
        &win_replays,
    );
    let merged_loss_replays = dedup_excluding(
        duration_order
            .iter()
            .flat_map(|&idx| records[idx].merged_loss_replays.iter().cloned()),
        &loss_replays,
    );

    let games_winners: Vec<BTreeSet<PlayerId>> = chrono_order
        .iter()
        .map(|&idx| records[idx].record.winners.clone())
        .filter(|winners| !winners.is_empty())
        .collect();
    let winners_flat: BTreeSet<PlayerId> = chrono_order
        .iter()
        .flat_map(|&idx| records[idx].record.winners.iter().copied())
        .collect();

    let settings: BTreeMap<String, Option<SettingValue>> = names
        .iter()
        .map(|name| name.to_string())
        .zip(values)
        .collect();

    Some(GroupedSetting {
        map_name,
        settings,
        difficulty,
        winners,
        players,
        win_replays,
        merged_win_replays,
        loss_replays,
        merged_loss_replays,
        games_winners,
        winners_flat,
    })
}
