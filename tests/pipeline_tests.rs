mod common;

use pve_processor::model::normalizer::normalize;
use pve_processor::model::pve_model::{ProcessorConfig, PveModel, VariantResult};
use pve_processor::model::structures::ai_variant::AiVariant;
use pve_processor::model::structures::game_record::GameRecord;
use pve_processor::model::structures::propagation_mode::PropagationMode;
use pve_processor::model::structures::setting_value::SettingValue;
use pve_processor::utils::test_utils::{generate_corpus, generate_record_at};
use serde_json::json;

fn process(records: Vec<GameRecord>, mode: PropagationMode) -> Vec<VariantResult> {
    let config = ProcessorConfig {
        propagation_mode: mode,
        ..ProcessorConfig::default()
    };
    PveModel::new(&config).unwrap().process(records).unwrap()
}

#[test]
fn test_generated_corpus_rates_every_player() {
    common::init_test_env();
    let results = process(generate_corpus(150, 10, 42), PropagationMode::SinglePass);

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.variant, AiVariant::Raptors);
    assert!(!result.grouped_settings.is_empty());
    assert!(!result.ratings.is_empty());

    for rating in &result.ratings {
        assert!(rating.games_played > 0);
        assert!((0.0..=30.0).contains(&rating.pve_rating));
        assert!((0.0..=1.0).contains(&rating.win_rate));
    }
    for group in &result.grouped_settings {
        assert!((0.0..=1.0).contains(&group.difficulty));
        assert!(group.players_count() >= group.winners_count());
    }
    // hardest setups first
    for pair in result.grouped_settings.windows(2) {
        assert!(pair[0].difficulty >= pair[1].difficulty);
    }
}

#[test]
fn test_win_under_harder_settings_extends_easier_group() {
    common::init_test_env();
    let records = vec![
        generate_record_at(
            0,
            "hard-win",
            AiVariant::Raptors,
            false,
            &[1, 2],
            &[1, 2],
            &[("startmetal", SettingValue::Int(500))],
        ),
        generate_record_at(
            10,
            "easy-loss",
            AiVariant::Raptors,
            true,
            &[],
            &[3, 4],
            &[("startmetal", SettingValue::Int(2000))],
        ),
    ];

    let results = process(records, PropagationMode::SinglePass);
    let groups = &results[0].grouped_settings;

    let by_metal = |metal: i64| {
        groups
            .iter()
            .find(|group| {
                group.settings.get("startmetal") == Some(&Some(SettingValue::Int(metal)))
            })
            .unwrap()
    };

    let easy = by_metal(2000);
    assert!(easy.winners.contains(&1) && easy.winners.contains(&2));
    assert_eq!(easy.players.len(), 4);
    assert_eq!(easy.merged_win_replays, vec!["hard-win".to_string()]);

    let hard = by_metal(500);
    assert!(hard.players.contains(&3) && hard.players.contains(&4));
    assert_eq!(hard.merged_loss_replays, vec!["easy-loss".to_string()]);
    assert_eq!(hard.winners, vec![1, 2]);
}

#[test]
fn test_fixpoint_converges_and_never_loses_evidence() {
    common::init_test_env();
    let records = generate_corpus(80, 8, 7);

    let single = process(records.clone(), PropagationMode::SinglePass);
    let fixpoint = process(records, PropagationMode::Fixpoint);

    assert_eq!(single[0].passes, 1);
    assert!(fixpoint[0].passes >= 2);
    assert_eq!(
        single[0].grouped_settings.len(),
        fixpoint[0].grouped_settings.len()
    );

    let winner_total = |result: &VariantResult| -> usize {
        result
            .grouped_settings
            .iter()
            .map(|group| group.winners_count())
            .sum()
    };
    assert!(winner_total(&fixpoint[0]) >= winner_total(&single[0]));
}

#[test]
fn test_replay_snapshot_flows_to_ratings() {
    common::init_test_env();

    let team = |winning: bool, players: serde_json::Value| {
        json!({ "winningTeam": winning, "Players": players, "AIs": [] })
    };
    let ai_team = |winning: bool| {
        json!({
            "winningTeam": winning,
            "Players": [],
            "AIs": [{ "shortName": "RaptorsAI", "teamId": 20 }]
        })
    };
    let replays: Vec<pve_processor::database::db_structs::RawReplay> = serde_json::from_value(json!([
        {
            "id": "win-hard",
            "startTime": "2024-07-01T12:00:00.000Z",
            "durationMs": 1_800_000,
            "Map": { "scriptName": "All That Glitters v2.2" },
            "AllyTeams": [
                team(true, json!([
                    { "userId": 1, "teamId": 10, "name": "alpha" },
                    { "userId": 2, "teamId": 11, "name": "beta" }
                ])),
                ai_team(false)
            ],
            "awards": {
                "fightingUnitsDestroyed": [{ "teamId": 10, "value": 5000 }],
                "mostResourcesProduced": { "teamId": 11, "value": 90_000 }
            },
            "raptor_difficulty": "epic",
            "startmetal": 500
        },
        {
            "id": "loss-easy",
            "startTime": "2024-07-01T14:00:00.000Z",
            "durationMs": 1_200_000,
            "Map": { "scriptName": "All That Glitters v2.2" },
            "AllyTeams": [
                team(false, json!([{ "userId": 3, "teamId": 10, "name": "gamma" }])),
                ai_team(true)
            ],
            "raptor_difficulty": "epic",
            "startmetal": 2000
        }
    ]))
    .unwrap();

    let corpus = normalize(&replays).unwrap();
    assert_eq!(corpus.records.len(), 2);
    assert_eq!(corpus.skipped.total(), 0);
    assert_eq!(corpus.player_names.get(&1).map(String::as_str), Some("alpha"));

    let results = process(corpus.records, PropagationMode::SinglePass);
    let ratings = &results[0].ratings;

    // only winners get rated; gamma never beat anything
    let ids: Vec<u32> = ratings.iter().map(|rating| rating.player_id).collect();
    assert_eq!(ids, vec![1, 2]);

    // the two winners share every signal and collapse to the ceiling
    assert!(ratings.iter().all(|rating| rating.pve_rating == 30.0));
}

#[test]
fn test_replay_order_does_not_change_ratings() {
    common::init_test_env();
    let records = vec![
        generate_record_at(
            0,
            "a",
            AiVariant::Raptors,
            false,
            &[1],
            &[1, 2],
            &[("startmetal", SettingValue::Int(500))],
        ),
        generate_record_at(
            5,
            "b",
            AiVariant::Raptors,
            true,
            &[],
            &[2, 3],
            &[("startmetal", SettingValue::Int(1000))],
        ),
        generate_record_at(
            9,
            "c",
            AiVariant::Raptors,
            false,
            &[3],
            &[3],
            &[("startmetal", SettingValue::Int(2000))],
        ),
    ];
    let mut reversed = records.clone();
    reversed.reverse();

    let forward = process(records, PropagationMode::SinglePass);
    let backward = process(reversed, PropagationMode::SinglePass);

    let summary = |result: &VariantResult| -> Vec<(u32, f64)> {
        result
            .ratings
            .iter()
            .map(|rating| (rating.player_id, rating.pve_rating))
            .collect()
    };
    assert_eq!(summary(&forward[0]), summary(&backward[0]));
}
