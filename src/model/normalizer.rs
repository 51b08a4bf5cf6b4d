use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::database::db_structs::{RawAi, RawAllyTeam, RawReplay};
use crate::model::classification::{
    nuttyb_hp_tier, ordinal_for, variant_keys, ClassificationError, FillDefault, KeyDef, ValueKind,
    BARBARIAN_HANDICAP_KEY, BARBARIAN_PER_PLAYER_KEY, NUTTYB_HP_KEY, NUTTYB_HP_TIERS,
};
use crate::model::constants::SPAWN_TIME_FLIP_DATE;
use crate::model::structures::ai_variant::AiVariant;
use crate::model::structures::game_record::{GameRecord, PlayerId};
use crate::model::structures::setting_value::SettingValue;

lazy_static! {
    /// Trailing version tag of a map script name, e.g. " V1.2" or "_v16a".
    static ref MAP_VERSION_SUFFIX: Regex = Regex::new(r"(?i)[_\s]+[v\d\.]+\w*$").unwrap();
}

/// Replays the eligibility gauntlet rejected, by reason.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkippedReplays {
    pub missing_roster: u32,
    pub foreign_ai: u32,
    pub no_duration: u32,
    pub no_winner: u32,
    pub too_many_teams: u32,
    pub mixed_teams: u32,
    pub handicapped_players: u32,
    pub bad_start_time: u32,
    pub no_map: u32,
    pub no_variant: u32,
    pub multiple_variants: u32,
}

impl SkippedReplays {
    pub fn total(&self) -> u32 {
        self.missing_roster
            + self.foreign_ai
            + self.no_duration
            + self.no_winner
            + self.too_many_teams
            + self.mixed_teams
            + self.handicapped_players
            + self.bad_start_time
            + self.no_map
            + self.no_variant
            + self.multiple_variants
    }
}

/// Typed, flat view of the snapshot, sorted by start time then id. A lobby
/// fielding two different AIs at once is rated against neither; its
/// difficulty belongs to the combination, not to either opponent alone.
#[derive(Debug, Default)]
pub struct NormalizedCorpus {
    pub records: Vec<GameRecord>,
    pub player_names: HashMap<PlayerId, String>,
    pub skipped: SkippedReplays,
}

pub fn normalize(replays: &[RawReplay]) -> Result<NormalizedCorpus, ClassificationError> {
    let mut records = Vec::new();
    let mut names: HashMap<PlayerId, (DateTime<Utc>, String)> = HashMap::new();
    let mut skipped = SkippedReplays::default();

    for raw in replays {
        let Some(teams) = raw.ally_teams.as_deref() else {
            skipped.missing_roster += 1;
            debug!(id = %raw.id, "skipping replay without a roster");
            continue;
        };

        if !ai_roster_supported(teams) {
            skipped.foreign_ai += 1;
            debug!(id = %raw.id, "skipping replay with an unsupported AI");
            continue;
        }
        let duration_ms = raw.duration_ms.unwrap_or(0);
        if duration_ms <= 0 {
            skipped.no_duration += 1;
            debug!(id = %raw.id, "skipping replay without a duration");
            continue;
        }
        if !teams.iter().any(|team| team.winning_team == Some(true)) {
            skipped.no_winner += 1;
            debug!(id = %raw.id, "skipping replay without a winning team");
            continue;
        }
        if teams.len() >= 3 {
            skipped.too_many_teams += 1;
            debug!(id = %raw.id, teams = teams.len(), "skipping replay with too many teams");
            continue;
        }
        if teams
            .iter()
            .any(|team| !team.players.is_empty() && !team.ais.is_empty())
        {
            skipped.mixed_teams += 1;
            debug!(id = %raw.id, "skipping replay with a mixed player/AI team");
            continue;
        }
        if teams
            .iter()
            .flat_map(|team| &team.players)
            .any(|player| player.handicap.is_some_and(|handicap| handicap > 0.0))
        {
            skipped.handicapped_players += 1;
            debug!(id = %raw.id, "skipping replay with handicapped players");
            continue;
        }

        let Some(start_time) = parse_start_time(raw.start_time.as_deref()) else {
            skipped.bad_start_time += 1;
            debug!(id = %raw.id, time = ?raw.start_time, "skipping replay with an unparseable start time");
            continue;
        };
        let Some(map_name) = map_name(raw) else {
            skipped.no_map += 1;
            debug!(id = %raw.id, "skipping replay without a map name");
            continue;
        };

        let fielded: Vec<AiVariant> = AiVariant::iter()
            .filter(|variant| roster_fields_variant(teams, *variant))
            .collect();
        let variant = match fielded[..] {
            [variant] => variant,
            [] => {
                skipped.no_variant += 1;
                debug!(id = %raw.id, "skipping replay without a rated AI");
                continue;
            }
            _ => {
                skipped.multiple_variants += 1;
                debug!(id = %raw.id, variants = fielded.len(), "skipping replay against several AIs at once");
                continue;
            }
        };

        let (damage_award, damage_award_value, eco_award) = awards(raw, teams);
        remember_names(&mut names, teams, start_time);
        records.push(GameRecord {
            id: raw.id.clone(),
            variant,
            map_name,
            start_time,
            duration_ms,
            did_ai_win: variant_won(teams, variant),
            winners: winning_player_ids(teams),
            participants: player_ids(teams),
            damage_award,
            damage_award_value,
            eco_award,
            settings: settings_for(variant, raw, teams, start_time)?,
        });
    }

    records.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });

    info!(
        replays = replays.len(),
        records = records.len(),
        skipped = skipped.total(),
        "normalized snapshot"
    );

    Ok(NormalizedCorpus {
        records,
        player_names: names
            .into_iter()
            .map(|(id, (_, name))| (id, name))
            .collect(),
        skipped,
    })
}

/// Every fielded AI must be one of the rated opponents. A lobby without any
/// AIs passes here and gets dropped later for having no variant.
fn ai_roster_supported(teams: &[RawAllyTeam]) -> bool {
    teams
        .iter()
        .flat_map(|team| &team.ais)
        .filter_map(|ai| ai.short_name.as_deref())
        .all(|name| AiVariant::try_from(name).is_ok())
}

fn roster_fields_variant(teams: &[RawAllyTeam], variant: AiVariant) -> bool {
    teams
        .iter()
        .flat_map(|team| &team.ais)
        .any(|ai| ai.short_name.as_deref() == Some(variant.ai_name()))
}

/// The variant beat the humans when any winning team fields it.
fn variant_won(teams: &[RawAllyTeam], variant: AiVariant) -> bool {
    teams
        .iter()
        .filter(|team| team.winning_team == Some(true))
        .flat_map(|team| &team.ais)
        .any(|ai| ai.short_name.as_deref() == Some(variant.ai_name()))
}

fn winning_player_ids(teams: &[RawAllyTeam]) -> BTreeSet<PlayerId> {
    teams
        .iter()
        .filter(|team| team.winning_team == Some(true))
        .flat_map(|team| &team.players)
        .filter_map(|player| player.user_id.and_then(|id| u32::try_from(id).ok()))
        .collect()
}

fn player_ids(teams: &[RawAllyTeam]) -> BTreeSet<PlayerId> {
    teams
        .iter()
        .flat_map(|team| &team.players)
        .filter_map(|player| player.user_id.and_then(|id| u32::try_from(id).ok()))
        .collect()
}

fn parse_start_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// The list endpoint's display name when present, otherwise the script name
/// with its trailing version tag stripped.
fn map_name(raw: &RawReplay) -> Option<String> {
    if let Some(name) = raw.map_name.as_deref() {
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    let script_name = raw.map.as_ref()?.script_name.as_deref()?;
    let stripped = MAP_VERSION_SUFFIX.replace(script_name, "").into_owned();
    (!stripped.is_empty()).then_some(stripped)
}

/// Award ids resolved through the team id -> user id roster map. A lookup
/// that lands on an AI team leaves the award unassigned, and the damage
/// value only counts when its award resolved.
fn awards(
    raw: &RawReplay,
    teams: &[RawAllyTeam],
) -> (Option<PlayerId>, Option<u64>, Option<PlayerId>) {
    let Some(awards) = raw.awards.as_ref() else {
        return (None, None, None);
    };

    let mut team_to_user: HashMap<i64, PlayerId> = HashMap::new();
    for player in teams.iter().flat_map(|team| &team.players) {
        if let (Some(team_id), Some(user_id)) = (player.team_id, player.user_id) {
            if let Ok(user_id) = u32::try_from(user_id) {
                team_to_user.insert(team_id, user_id);
            }
        }
    }

    let top_damage = awards.fighting_units_destroyed.first();
    let damage_award = top_damage
        .and_then(|entry| entry.team_id)
        .and_then(|team_id| team_to_user.get(&team_id).copied());
    let damage_award_value = damage_award.and_then(|_| top_damage.and_then(|entry| entry.value));
    let eco_award = awards
        .most_resources_produced
        .as_ref()
        .and_then(|entry| entry.team_id)
        .and_then(|team_id| team_to_user.get(&team_id).copied());

    (damage_award, damage_award_value, eco_award)
}

fn remember_names(
    names: &mut HashMap<PlayerId, (DateTime<Utc>, String)>,
    teams: &[RawAllyTeam],
    start_time: DateTime<Utc>,
) {
    for player in teams.iter().flat_map(|team| &team.players) {
        let (Some(user_id), Some(name)) = (player.user_id, player.name.as_deref()) else {
            continue;
        };
        let Ok(user_id) = u32::try_from(user_id) else {
            continue;
        };
        let entry = names
            .entry(user_id)
            .or_insert_with(|| (start_time, name.to_string()));
        if start_time >= entry.0 {
            *entry = (start_time, name.to_string());
        }
    }
}

/// The typed setting vector for one variant: every declared key parsed per
/// its kind, fills applied for absent values, plus the derived keys.
fn settings_for(
    variant: AiVariant,
    raw: &RawReplay,
    teams: &[RawAllyTeam],
    start_time: DateTime<Utc>,
) -> Result<BTreeMap<String, SettingValue>, ClassificationError> {
    let mut settings = BTreeMap::new();

    for def in variant_keys(variant) {
        if matches!(
            def.name,
            NUTTYB_HP_KEY | BARBARIAN_HANDICAP_KEY | BARBARIAN_PER_PLAYER_KEY
        ) {
            continue;
        }

        let mut value = parse_setting(def, raw.settings.get(def.name))?;
        if def.name.ends_with("_spawntimemult") {
            let parsed = match value {
                Some(SettingValue::Float(multiplier)) => Some(multiplier),
                _ => None,
            };
            value = Some(SettingValue::Float(spawn_time_multiplier(
                parsed, start_time,
            )));
        }
        if value.is_none() {
            value = fill_value(def)?;
        }
        if let Some(value) = value {
            settings.insert(def.name.to_string(), value);
        }
    }

    if variant_keys(variant).iter().any(|def| def.name == NUTTYB_HP_KEY) {
        if let Some(Value::String(payload)) = raw.settings.get("tweakdefs1") {
            if let Some(tier) = nuttyb_hp_tier(payload) {
                if let Some(value) = ordinal_for(NUTTYB_HP_TIERS, tier) {
                    settings.insert(NUTTYB_HP_KEY.to_string(), value);
                }
            }
        }
    }

    if variant == AiVariant::Barbarian {
        if let Some(handicap) = barbarian_handicap(teams) {
            settings.insert(BARBARIAN_HANDICAP_KEY.to_string(), SettingValue::Int(handicap));
        }
        settings.insert(
            BARBARIAN_PER_PLAYER_KEY.to_string(),
            SettingValue::Float(barbarian_per_player(teams)),
        );
    }

    Ok(settings)
}

fn parse_setting(
    def: &KeyDef,
    raw: Option<&Value>,
) -> Result<Option<SettingValue>, ClassificationError> {
    let Some(value) = raw else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }

    match def.kind {
        ValueKind::Int => json_int(value)
            .map(|parsed| Some(SettingValue::Int(parsed)))
            .ok_or_else(|| unexpected_kind(def, value)),
        ValueKind::Float => json_float(value)
            .map(|parsed| Some(SettingValue::Float(parsed)))
            .ok_or_else(|| unexpected_kind(def, value)),
        ValueKind::Text => json_text(value)
            .map(|parsed| Some(SettingValue::Text(parsed)))
            .ok_or_else(|| unexpected_kind(def, value)),
        ValueKind::Enum(labels) => {
            let Some(label) = json_text(value) else {
                return Err(unexpected_kind(def, value));
            };
            match ordinal_for(labels, &label) {
                Some(parsed) => Ok(Some(parsed)),
                None => Err(ClassificationError::UnknownLabel {
                    key: def.name.to_string(),
                    label,
                }),
            }
        }
    }
}

fn fill_value(def: &KeyDef) -> Result<Option<SettingValue>, ClassificationError> {
    let Some(fill) = def.fill else {
        return Ok(None);
    };
    let value = match (fill, def.kind) {
        (FillDefault::Int(value), _) => SettingValue::Int(value),
        (FillDefault::Float(value), _) => SettingValue::Float(value),
        (FillDefault::Text(value), _) => SettingValue::Text(value.to_string()),
        (FillDefault::Label(label), ValueKind::Enum(labels)) => {
            ordinal_for(labels, label).ok_or_else(|| ClassificationError::UnknownLabel {
                key: def.name.to_string(),
                label: label.to_string(),
            })?
        }
        (FillDefault::Label(label), _) => {
            return Err(ClassificationError::UnknownLabel {
                key: def.name.to_string(),
                label: label.to_string(),
            })
        }
    };
    Ok(Some(value))
}

/// The engine flipped this multiplier's meaning on the cutover day; older
/// replays store the reciprocal. Absent means the engine default of 1, and
/// a zero inverts to 1 rather than infinity.
fn spawn_time_multiplier(raw: Option<f64>, start_time: DateTime<Utc>) -> f64 {
    let (year, month, day) = SPAWN_TIME_FLIP_DATE;
    let value = raw.unwrap_or(1.0);
    let flipped = NaiveDate::from_ymd_opt(year, month, day)
        .is_some_and(|flip_date| start_time.date_naive() > flip_date);
    if flipped {
        return value;
    }
    let inverted = 1.0 / value;
    if inverted == f64::INFINITY {
        1.0
    } else {
        inverted
    }
}

fn barbarian_ais(teams: &[RawAllyTeam]) -> impl Iterator<Item = &RawAi> {
    teams
        .iter()
        .flat_map(|team| &team.ais)
        .filter(|ai| ai.short_name.as_deref() == Some(AiVariant::Barbarian.ai_name()))
}

/// Mean handicap across the Barbarian bots, rounded to whole percent.
fn barbarian_handicap(teams: &[RawAllyTeam]) -> Option<i64> {
    let handicaps: Vec<f64> = barbarian_ais(teams).filter_map(|ai| ai.handicap).collect();
    if handicaps.is_empty() {
        return None;
    }
    let mean = handicaps.iter().sum::<f64>() / handicaps.len() as f64;
    Some(mean.round() as i64)
}

/// Bots per human, one decimal. An empty lobby divides to infinity and is
/// screened out before Barbarian classification.
fn barbarian_per_player(teams: &[RawAllyTeam]) -> f64 {
    let bots = barbarian_ais(teams).count() as f64;
    let players = teams
        .iter()
        .map(|team| team.players.len())
        .sum::<usize>() as f64;
    (bots / players * 10.0).round() / 10.0
}

fn json_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.is_finite())
                .map(|float| float as i64)
        }),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|float| float.fract() == 0.0 && float.is_finite())
                    .map(|float| float as i64)
            })
        }
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

fn json_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(f64::from(u8::from(*flag))),
        _ => None,
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn unexpected_kind(def: &KeyDef, value: &Value) -> ClassificationError {
    ClassificationError::UnexpectedKind {
        key: def.name.to_string(),
        expected: kind_name(def.kind),
        found: json_kind(value),
    }
}

fn kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Int => "integer",
        ValueKind::Float => "decimal",
        ValueKind::Text => "text",
        ValueKind::Enum(_) => "label",
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use crate::database::db_structs::RawReplay;
    use crate::model::classification::ClassificationError;
    use crate::model::normalizer::normalize;
    use crate::model::structures::ai_variant::AiVariant;
    use crate::model::structures::setting_value::SettingValue;

    fn replay(value: serde_json::Value) -> RawReplay {
        serde_json::from_value(value).unwrap()
    }

    fn raptor_replay(id: &str, start_time: &str, ai_won: bool) -> serde_json::Value {
        json!({
            "id": id,
            "startTime": start_time,
            "durationMs": 1_800_000,
            "Map": { "scriptName": "All That Glitters v2.2" },
            "AllyTeams": [
                {
                    "winningTeam": !ai_won,
                    "Players": [
                        { "userId": 1, "teamId": 10, "name": "alpha" },
                        { "userId": 2, "teamId": 11, "name": "beta" }
                    ],
                    "AIs": []
                },
                {
                    "winningTeam": ai_won,
                    "Players": [],
                    "AIs": [{ "shortName": "RaptorsAI", "teamId": 20 }]
                }
            ],
            "awards": {
                "fightingUnitsDestroyed": [
                    { "teamId": 10, "value": 5000 },
                    { "teamId": 11, "value": 1200 }
                ],
                "mostResourcesProduced": { "teamId": 11, "value": 90_000 }
            },
            "raptor_difficulty": "epic",
            "startmetal": 1000
        })
    }

    #[test]
    fn test_eligible_replay_normalizes() {
        let corpus =
            normalize(&[replay(raptor_replay("r1", "2024-07-01T12:00:00.000Z", false))]).unwrap();

        assert_eq!(corpus.records.len(), 1);
        assert_eq!(corpus.skipped.total(), 0);

        let record = &corpus.records[0];
        assert_eq!(record.variant, AiVariant::Raptors);
        assert_eq!(record.map_name, "All That Glitters");
        assert!(record.human_win());
        assert_eq!(record.winners, BTreeSet::from([1, 2]));
        assert_eq!(record.participants, BTreeSet::from([1, 2]));
        assert_eq!(record.damage_award, Some(1));
        assert_eq!(record.damage_award_value, Some(5000));
        assert_eq!(record.eco_award, Some(2));
        assert_eq!(
            record.setting("raptor_difficulty"),
            Some(&SettingValue::Ordinal(5, "epic"))
        );
        assert_eq!(record.setting("startmetal"), Some(&SettingValue::Int(1000)));
        assert_eq!(corpus.player_names.get(&1).map(String::as_str), Some("alpha"));
    }

    #[test]
    fn test_ai_win_empties_winners() {
        let corpus =
            normalize(&[replay(raptor_replay("r1", "2024-07-01T12:00:00.000Z", true))]).unwrap();

        let record = &corpus.records[0];
        assert!(record.did_ai_win);
        assert!(record.winners.is_empty());
        assert_eq!(record.participants, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_fills_applied_for_absent_keys() {
        let corpus =
            normalize(&[replay(raptor_replay("r1", "2024-07-01T12:00:00.000Z", false))]).unwrap();

        let record = &corpus.records[0];
        assert_eq!(record.setting("evocom"), Some(&SettingValue::Int(0)));
        assert_eq!(
            record.setting("evocomlevelupmethod"),
            Some(&SettingValue::Text("dynamic".to_string()))
        );
        assert_eq!(
            record.setting("commanderbuildersenabled"),
            Some(&SettingValue::Ordinal(0, "disabled"))
        );
        // no declared default, stays null
        assert_eq!(record.setting("multiplier_shieldpower"), None);
    }

    #[test]
    fn test_spawn_time_multiplier_inverted_before_cutover() {
        let mut before = raptor_replay("old", "2024-06-01T12:00:00.000Z", false);
        before["raptor_spawntimemult"] = json!(0.5);
        let mut after = raptor_replay("new", "2024-07-01T12:00:00.000Z", false);
        after["raptor_spawntimemult"] = json!(0.5);
        let mut zeroed = raptor_replay("zero", "2024-06-01T12:00:00.000Z", false);
        zeroed["raptor_spawntimemult"] = json!(0.0);

        let corpus = normalize(&[replay(before), replay(after), replay(zeroed)]).unwrap();

        let by_id = |id: &str| {
            corpus
                .records
                .iter()
                .find(|record| record.id == id)
                .unwrap()
        };
        assert_eq!(
            by_id("old").setting("raptor_spawntimemult"),
            Some(&SettingValue::Float(2.0))
        );
        assert_eq!(
            by_id("new").setting("raptor_spawntimemult"),
            Some(&SettingValue::Float(0.5))
        );
        assert_eq!(
            by_id("zero").setting("raptor_spawntimemult"),
            Some(&SettingValue::Float(1.0))
        );
    }

    #[test]
    fn test_foreign_ai_skipped() {
        let mut foreign = raptor_replay("f1", "2024-07-01T12:00:00.000Z", false);
        foreign["AllyTeams"][1]["AIs"] = json!([{ "shortName": "CircuitAI" }]);

        let corpus = normalize(&[replay(foreign)]).unwrap();

        assert!(corpus.records.is_empty());
        assert_eq!(corpus.skipped.foreign_ai, 1);
    }

    #[test]
    fn test_ai_only_damage_award_left_unassigned() {
        // the bot out-damaged everyone; its team id resolves to no player
        let mut lobby = raptor_replay("r1", "2024-07-01T12:00:00.000Z", false);
        lobby["awards"]["fightingUnitsDestroyed"] = json!([{ "teamId": 20, "value": 99000 }]);

        let corpus = normalize(&[replay(lobby)]).unwrap();

        let record = &corpus.records[0];
        assert_eq!(record.damage_award, None);
        assert_eq!(record.damage_award_value, None);
        assert_eq!(record.eco_award, Some(2));
    }

    #[test]
    fn test_award_kept_when_value_missing() {
        let mut lobby = raptor_replay("r1", "2024-07-01T12:00:00.000Z", false);
        lobby["awards"]["fightingUnitsDestroyed"] = json!([{ "teamId": 10 }]);

        let corpus = normalize(&[replay(lobby)]).unwrap();

        let record = &corpus.records[0];
        assert_eq!(record.damage_award, Some(1));
        assert_eq!(record.damage_award_value, None);
    }

    #[test]
    fn test_nuttyb_tier_derived_from_tweakdefs() {
        let mut lobby = raptor_replay("r1", "2024-07-01T12:00:00.000Z", false);
        lobby["tweakdefs1"] = json!("bG9jYWwgaHBNdWx0ID0gMg==");

        let corpus = normalize(&[replay(lobby)]).unwrap();

        assert_eq!(
            corpus.records[0].setting("nuttyb_hp"),
            Some(&SettingValue::Ordinal(1, "Epic+"))
        );
    }

    #[test]
    fn test_barbarian_lobby_derives_bot_pressure_keys() {
        let lobby = json!({
            "id": "b1",
            "startTime": "2024-07-01T12:00:00.000Z",
            "durationMs": 900_000,
            "Map": { "scriptName": "Glacier Pass_v1.1" },
            "AllyTeams": [
                {
                    "winningTeam": false,
                    "Players": [
                        { "userId": 7, "teamId": 1, "name": "gamma" },
                        { "userId": 8, "teamId": 2, "name": "delta" }
                    ],
                    "AIs": []
                },
                {
                    "winningTeam": true,
                    "Players": [],
                    "AIs": [
                        { "shortName": "BARb", "teamId": 3, "handicap": 50 },
                        { "shortName": "BARb", "teamId": 4, "handicap": 51 },
                        { "shortName": "BARb", "teamId": 5, "handicap": 50 }
                    ]
                }
            ]
        });

        let corpus = normalize(&[replay(lobby)]).unwrap();

        let record = &corpus.records[0];
        assert_eq!(record.variant, AiVariant::Barbarian);
        assert!(record.did_ai_win);
        assert_eq!(record.map_name, "Glacier Pass");
        assert_eq!(
            record.setting("Barbarian Handicap"),
            Some(&SettingValue::Int(50))
        );
        assert_eq!(
            record.setting("Barbarian Per Player"),
            Some(&SettingValue::Float(1.5))
        );
        assert_eq!(record.setting("nuttyb_hp"), None);
    }

    #[test]
    fn test_two_ai_kinds_in_one_lobby_rated_against_neither() {
        let lobby = json!({
            "id": "m1",
            "startTime": "2024-07-01T12:00:00.000Z",
            "durationMs": 2_400_000,
            "Map": { "scriptName": "All That Glitters v2.2" },
            "AllyTeams": [
                {
                    "winningTeam": true,
                    "Players": [{ "userId": 1, "teamId": 10, "name": "alpha" }],
                    "AIs": []
                },
                {
                    "winningTeam": false,
                    "Players": [],
                    "AIs": [
                        { "shortName": "RaptorsAI", "teamId": 20 },
                        { "shortName": "ScavengersAI", "teamId": 21 }
                    ]
                }
            ]
        });

        let corpus = normalize(&[replay(lobby)]).unwrap();

        assert!(corpus.records.is_empty());
        assert_eq!(corpus.skipped.multiple_variants, 1);
    }

    #[test]
    fn test_unknown_difficulty_label_is_fatal() {
        let mut lobby = raptor_replay("r1", "2024-07-01T12:00:00.000Z", false);
        lobby["raptor_difficulty"] = json!("nightmare");

        let error = normalize(&[replay(lobby)]).unwrap_err();

        assert!(matches!(
            error,
            ClassificationError::UnknownLabel { ref key, .. } if key == "raptor_difficulty"
        ));
    }

    #[test]
    fn test_records_sorted_by_start_time() {
        let corpus = normalize(&[
            replay(raptor_replay("late", "2024-07-02T12:00:00.000Z", false)),
            replay(raptor_replay("early", "2024-07-01T12:00:00.000Z", false)),
        ])
        .unwrap();

        let ids: Vec<&str> = corpus.records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_latest_name_wins() {
        let mut renamed = raptor_replay("r2", "2024-07-02T12:00:00.000Z", false);
        renamed["AllyTeams"][0]["Players"][0]["name"] = json!("alpha_renamed");

        let corpus = normalize(&[
            replay(renamed),
            replay(raptor_replay("r1", "2024-07-01T12:00:00.000Z", false)),
        ])
        .unwrap();

        assert_eq!(
            corpus.player_names.get(&1).map(String::as_str),
            Some("alpha_renamed")
        );
    }
}
