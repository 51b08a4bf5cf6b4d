use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::classification::HORDE_DIFFICULTIES;
use crate::model::structures::ai_variant::AiVariant;
use crate::model::structures::game_record::{GameRecord, PlayerId};
use crate::model::structures::setting_value::SettingValue;

/// Fixed corpus epoch so tests control chronology without touching wall
/// time.
pub fn corpus_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
}

pub fn generate_record(
    id: &str,
    variant: AiVariant,
    did_ai_win: bool,
    winners: &[PlayerId],
    participants: &[PlayerId],
    settings: &[(&str, SettingValue)],
) -> GameRecord {
    GameRecord {
        id: id.to_string(),
        variant,
        map_name: "All That Glitters".to_string(),
        start_time: corpus_epoch(),
        duration_ms: 1_800_000,
        did_ai_win,
        winners: winners.iter().copied().collect(),
        participants: participants.iter().copied().collect(),
        damage_award: participants.first().copied(),
        damage_award_value: Some(1000),
        eco_award: participants.last().copied(),
        settings: settings
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    }
}

/// Same as [`generate_record`] but placed `minute` minutes after the corpus
/// epoch.
pub fn generate_record_at(
    minute: i64,
    id: &str,
    variant: AiVariant,
    did_ai_win: bool,
    winners: &[PlayerId],
    participants: &[PlayerId],
    settings: &[(&str, SettingValue)],
) -> GameRecord {
    let mut record = generate_record(id, variant, did_ai_win, winners, participants, settings);
    record.start_time = corpus_epoch() + Duration::minutes(minute);
    record
}

/// Seeded Raptors corpus with varied lobbies, outcomes and settings.
/// Player ids are drawn from `1..=players`.
pub fn generate_corpus(count: usize, players: PlayerId, seed: u64) -> Vec<GameRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let start_metals = [500i64, 1000, 2000];
    let spawn_mults = [0.5f64, 1.0, 1.5];

    (0..count)
        .map(|i| {
            let team_size = rng.random_range(1..=4.min(players as usize));
            let mut team: BTreeSet<PlayerId> = BTreeSet::new();
            while team.len() < team_size {
                team.insert(rng.random_range(1..=players));
            }
            let team: Vec<PlayerId> = team.into_iter().collect();

            let did_ai_win = rng.random_bool(0.45);
            let winners: Vec<PlayerId> = if did_ai_win { Vec::new() } else { team.clone() };

            let tier = rng.random_range(0..HORDE_DIFFICULTIES.len());
            let settings = vec![
                (
                    "startmetal",
                    SettingValue::Int(start_metals[rng.random_range(0..start_metals.len())]),
                ),
                (
                    "raptor_difficulty",
                    SettingValue::Ordinal(tier as u8, HORDE_DIFFICULTIES[tier]),
                ),
                (
                    "raptor_spawntimemult",
                    SettingValue::Float(spawn_mults[rng.random_range(0..spawn_mults.len())]),
                ),
            ];

            let mut record = generate_record(
                &format!("bench-{}", i),
                AiVariant::Raptors,
                did_ai_win,
                &winners,
                &team,
                &settings,
            );
            record.start_time = corpus_epoch() + Duration::minutes(i as i64);
            record.damage_award_value = Some(rng.random_range(100..10_000));
            record
        })
        .collect()
}
