use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::model::constants::TOP_SETTING_COMBINATIONS;
use crate::model::structures::game_record::PlayerId;
use crate::model::structures::grouped_setting::GroupedSetting;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration needs at least three points, got {0}")]
    TooFewPoints(usize),
    #[error("calibration fit is singular: {0}")]
    SingularFit(String),
    #[error("calibration point {0:?} is not of the form size:units")]
    InvalidPoint(String),
}

/// Parses a `"1:1,2:4,5:11,16:40"` style calibration override.
pub fn parse_calibration(raw: &str) -> Result<Vec<(f64, f64)>, CalibrationError> {
    raw.split(',')
        .map(|pair| {
            let (size, units) = pair
                .split_once(':')
                .ok_or_else(|| CalibrationError::InvalidPoint(pair.to_string()))?;
            let size = size
                .trim()
                .parse::<f64>()
                .map_err(|_| CalibrationError::InvalidPoint(pair.to_string()))?;
            let units = units
                .trim()
                .parse::<f64>()
                .map_err(|_| CalibrationError::InvalidPoint(pair.to_string()))?;
            Ok((size, units))
        })
        .collect()
}

/// Quadratic model of how many completion units a win must cover for a
/// given lobby size. Least-squares fit over the calibration anchors, so the
/// anchors need not lie on one parabola.
#[derive(Debug, Clone)]
pub struct CompletionModel {
    quadratic: f64,
    linear: f64,
    constant: f64,
}

impl CompletionModel {
    pub fn fit(points: &[(f64, f64)]) -> Result<Self, CalibrationError> {
        if points.len() < 3 {
            return Err(CalibrationError::TooFewPoints(points.len()));
        }

        let design = DMatrix::from_fn(points.len(), 3, |row, col| match col {
            0 => points[row].0 * points[row].0,
            1 => points[row].0,
            _ => 1.0,
        });
        let observed = DVector::from_iterator(points.len(), points.iter().map(|point| point.1));

        let solution = design
            .svd(true, true)
            .solve(&observed, 1e-12)
            .map_err(|message| CalibrationError::SingularFit(message.to_string()))?;

        Ok(Self {
            quadratic: solution[0],
            linear: solution[1],
            constant: solution[2],
        })
    }

    pub fn expected_units(&self, lobby_size: usize) -> f64 {
        let n = lobby_size as f64;
        self.quadratic * n * n + self.linear * n + self.constant
    }

    /// Completion credit the player earned toward a group's difficulty goal
    /// `goal`, in `[0, goal]`.
    ///
    /// Folds the player's winning lobbies in chronologically. Each win pays
    /// for the teammates it newly brings: `k` contributors (the player plus
    /// novel teammates) out of the `expected_units(n)` a lobby of size `n`
    /// must cover. A solo win completes outright. Replaying with the same
    /// teammates still pays the `k = 1` minimum, so the credit is
    /// monotonically non-decreasing in the number of wins.
    pub fn completion_for(&self, player: PlayerId, goal: f64, group: &GroupedSetting) -> f64 {
        let mut visited: BTreeSet<PlayerId> = BTreeSet::new();
        let mut completion = 0.0f64;

        for lobby in &group.games_winners {
            if !lobby.contains(&player) {
                continue;
            }
            let novel: Vec<PlayerId> = lobby
                .iter()
                .copied()
                .filter(|teammate| *teammate != player && !visited.contains(teammate))
                .collect();
            let contributors = (novel.len() + 1) as f64;
            visited.extend(novel);

            let addition = if lobby.len() == 1 {
                goal
            } else {
                goal / (self.expected_units(lobby.len()).max(1.0) / contributors)
            };
            completion = (completion + addition).min(goal);
            if completion >= goal {
                break;
            }
        }

        completion
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultySignals {
    /// Hardest difficulty the player holds an extended win on.
    pub difficulty_record: f64,
    /// Mean of the player's best difficulty times completion products.
    pub difficulty_score: f64,
}

/// Difficulty signals per player over every group they appear in as an
/// extended winner.
pub fn difficulty_signals(
    model: &CompletionModel,
    groups: &[GroupedSetting],
) -> BTreeMap<PlayerId, DifficultySignals> {
    let mut products: BTreeMap<PlayerId, Vec<(f64, f64)>> = BTreeMap::new();
    for group in groups {
        for &player in &group.winners {
            let completion = model.completion_for(player, group.difficulty, group);
            products
                .entry(player)
                .or_default()
                .push((group.difficulty, group.difficulty * completion));
        }
    }

    products
        .into_iter()
        .map(|(player, entries)| {
            let difficulty_record = entries.iter().map(|entry| entry.0).fold(0.0, f64::max);
            let mut best: Vec<f64> = entries.into_iter().map(|entry| entry.1).collect();
            best.sort_by(|a, b| b.total_cmp(a));
            best.truncate(TOP_SETTING_COMBINATIONS);
            let difficulty_score = best.iter().sum::<f64>() / best.len() as f64;
            (
                player,
                DifficultySignals {
                    difficulty_record,
                    difficulty_score,
                },
            )
        })
        .collect()
}
