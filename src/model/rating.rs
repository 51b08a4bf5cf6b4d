use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::model::completion::{difficulty_signals, CompletionModel};
use crate::model::constants::{
    GAMES_RANK_CEILING, RATING_SCALE, WEIGHT_DIFFICULTY_LOSERS_SUM, WEIGHT_DIFFICULTY_SCORE,
    WEIGHT_GAMES_PLAYED, WEIGHT_SETTING_COMBINATIONS, WEIGHT_WEIGHTED_AWARD_RATE,
    WEIGHT_WIN_RATE,
};
use crate::model::structures::game_record::{ExtendedRecord, PlayerId};
use crate::model::structures::grouped_setting::GroupedSetting;
use crate::model::structures::player_rating::{PlayerAggregate, PlayerRating};

/// Per-player aggregates over the participant rows of a variant's records.
///
/// Every signal reads the raw roster, not the extended sets. The award
/// rates only sample games the player won that had award data and more
/// than one participant; the weighted rate additionally scales each sample
/// by the count of teammates.
pub fn basic_aggregates(records: &[ExtendedRecord]) -> BTreeMap<PlayerId, PlayerAggregate> {
    #[derive(Default)]
    struct Accum {
        games: u32,
        wins: u32,
        award_samples: u32,
        award_hits: u32,
        weighted_sum: f64,
    }

    let mut accum: BTreeMap<PlayerId, Accum> = BTreeMap::new();
    for record in records {
        let has_awards =
            record.record.damage_award.is_some() && record.record.eco_award.is_some();
        let lobby_size = record.record.participants.len();

        for &player in &record.record.participants {
            let entry = accum.entry(player).or_default();
            entry.games += 1;

            let won = record.record.winners.contains(&player);
            if won {
                entry.wins += 1;
            }
            if won && lobby_size > 1 && has_awards {
                let hits = u32::from(record.record.damage_award == Some(player))
                    + u32::from(record.record.eco_award == Some(player));
                entry.award_samples += 1;
                entry.award_hits += hits;
                entry.weighted_sum += hits as f64 * (lobby_size - 1) as f64;
            }
        }
    }

    accum
        .into_iter()
        .map(|(player, entry)| {
            let aggregate = PlayerAggregate {
                games_played: entry.games,
                win_rate: entry.wins as f64 / entry.games as f64,
                award_rate: (entry.award_samples > 0)
                    .then(|| entry.award_hits as f64 / entry.award_samples as f64),
                weighted_award_rate: if entry.award_samples > 0 {
                    entry.weighted_sum / entry.award_samples as f64
                } else {
                    0.0
                },
            };
            (player, aggregate)
        })
        .collect()
}

/// Fractional ranking, ascending and 1-based. Ties share the mean of the
/// positions they occupy.
pub fn fractional_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len()
            && values[order[end + 1]].total_cmp(&values[order[start]]).is_eq()
        {
            end += 1;
        }
        let rank = (start + end + 2) as f64 / 2.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rates every player that holds an extended win in an emitted group.
///
/// Each signal is fractionally ranked over the rated population, the ranks
/// are combined by fixed weights, and the weighted sums are min-max scaled
/// onto `[0, RATING_SCALE]`. Rows come back sorted best first.
pub fn rate_players(
    groups: &[GroupedSetting],
    aggregates: &BTreeMap<PlayerId, PlayerAggregate>,
    model: &CompletionModel,
) -> Vec<PlayerRating> {
    let rated: Vec<PlayerId> = groups
        .iter()
        .flat_map(|group| group.winners.iter().copied())
        .collect::<BTreeSet<PlayerId>>()
        .into_iter()
        .collect();
    if rated.is_empty() {
        return Vec::new();
    }

    let signals = difficulty_signals(model, groups);

    let mut beaten: BTreeMap<PlayerId, BTreeSet<PlayerId>> = BTreeMap::new();
    let mut combinations: BTreeMap<PlayerId, u32> = BTreeMap::new();
    for group in groups {
        let losers: Vec<PlayerId> = group
            .players
            .iter()
            .copied()
            .filter(|player| !group.winners_flat.contains(player))
            .collect();
        for &winner in &group.winners_flat {
            beaten.entry(winner).or_default().extend(losers.iter().copied());
            *combinations.entry(winner).or_insert(0) += 1;
        }
    }

    let aggregate_of = |player: PlayerId| aggregates.get(&player).cloned().unwrap_or_default();

    let weighted_award: Vec<f64> = rated
        .iter()
        .map(|&player| aggregate_of(player).weighted_award_rate)
        .collect();
    let losers_sum: Vec<f64> = rated
        .iter()
        .map(|&player| beaten.get(&player).map_or(0, BTreeSet::len) as f64)
        .collect();
    let score: Vec<f64> = rated
        .iter()
        .map(|&player| signals.get(&player).copied().unwrap_or_default().difficulty_score)
        .collect();
    let combos: Vec<f64> = rated
        .iter()
        .map(|&player| combinations.get(&player).copied().unwrap_or(0) as f64)
        .collect();
    let games: Vec<f64> = rated
        .iter()
        .map(|&player| aggregate_of(player).games_played.min(GAMES_RANK_CEILING) as f64)
        .collect();
    let win_rate: Vec<f64> = rated
        .iter()
        .map(|&player| aggregate_of(player).win_rate)
        .collect();

    let award_rank = fractional_ranks(&weighted_award);
    let losers_rank = fractional_ranks(&losers_sum);
    let score_rank = fractional_ranks(&score);
    let combos_rank = fractional_ranks(&combos);
    let games_rank = fractional_ranks(&games);
    let win_rank = fractional_ranks(&win_rate);

    let combined: Vec<f64> = (0..rated.len())
        .map(|i| {
            award_rank[i] * WEIGHT_WEIGHTED_AWARD_RATE
                + losers_rank[i] * WEIGHT_DIFFICULTY_LOSERS_SUM
                + score_rank[i] * WEIGHT_DIFFICULTY_SCORE
                + combos_rank[i] * WEIGHT_SETTING_COMBINATIONS
                + games_rank[i] * WEIGHT_GAMES_PLAYED
                + win_rank[i] * WEIGHT_WIN_RATE
        })
        .collect();

    let lowest = combined.iter().copied().fold(f64::INFINITY, f64::min);
    let highest = combined.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = highest - lowest;
    if span == 0.0 {
        warn!(
            players = rated.len(),
            "rank spread is degenerate, every rating collapses to the ceiling"
        );
    } else {
        debug!(players = rated.len(), "combined ranks span {lowest} to {highest}");
    }

    let mut rows: Vec<PlayerRating> = rated
        .iter()
        .enumerate()
        .map(|(i, &player)| {
            let aggregate = aggregate_of(player);
            let signal = signals.get(&player).copied().unwrap_or_default();
            let pve_rating = if span == 0.0 {
                RATING_SCALE
            } else {
                round2((combined[i] - lowest) / span * RATING_SCALE)
            };
            PlayerRating {
                player_id: player,
                award_rate: aggregate.award_rate,
                weighted_award_rate: aggregate.weighted_award_rate,
                difficulty_record: signal.difficulty_record,
                difficulty_score: signal.difficulty_score,
                difficulty_losers_sum: losers_sum[i] as u32,
                setting_combinations: combinations.get(&player).copied().unwrap_or(0),
                games_played: aggregate.games_played,
                win_rate: aggregate.win_rate,
                combined_rank: combined[i],
                pve_rating,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.pve_rating
            .total_cmp(&a.pve_rating)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    rows
}
