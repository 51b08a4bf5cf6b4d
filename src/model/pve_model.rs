use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, info};

use crate::model::classification::{
    ClassificationError, VariantClassifier, BARBARIAN_PER_PLAYER_KEY,
};
use crate::model::completion::{CalibrationError, CompletionModel};
use crate::model::constants::DEFAULT_CALIBRATION;
use crate::model::extension::extend_evidence;
use crate::model::grouping::group_settings;
use crate::model::rating::{basic_aggregates, rate_players};
use crate::model::structures::ai_variant::AiVariant;
use crate::model::structures::game_record::{ExtendedRecord, GameRecord};
use crate::model::structures::grouped_setting::GroupedSetting;
use crate::model::structures::player_rating::PlayerRating;
use crate::model::structures::propagation_mode::PropagationMode;
use crate::model::structures::setting_value::SettingValue;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub propagation_mode: PropagationMode,
    /// `(lobby size, completion units)` anchors for the completion curve.
    pub calibration: Vec<(f64, f64)>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            propagation_mode: PropagationMode::default(),
            calibration: DEFAULT_CALIBRATION.to_vec(),
        }
    }
}

/// Everything the pipeline produced for one variant.
pub struct VariantResult {
    pub variant: AiVariant,
    pub grouped_settings: Vec<GroupedSetting>,
    /// Keys that never varied across the variant's corpus, with the value
    /// every lobby shared. Exports fold these back into each row.
    pub dropped_constants: BTreeMap<String, SettingValue>,
    pub ratings: Vec<PlayerRating>,
    pub skipped_sources: usize,
    pub passes: usize,
}

/// The full pipeline for a normalized corpus: split by variant, extend
/// evidence across dominated lobbies, group into difficulty rows and rate
/// the winners.
pub struct PveModel {
    completion: CompletionModel,
    propagation_mode: PropagationMode,
}

impl PveModel {
    pub fn new(config: &ProcessorConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            completion: CompletionModel::fit(&config.calibration)?,
            propagation_mode: config.propagation_mode,
        })
    }

    pub fn process(&self, records: Vec<GameRecord>) -> Result<Vec<VariantResult>, ProcessorError> {
        let mut partitions: BTreeMap<AiVariant, Vec<GameRecord>> = BTreeMap::new();
        for record in records {
            partitions.entry(record.variant).or_default().push(record);
        }

        let mut results = Vec::new();
        for (variant, subset) in partitions {
            let subset = match variant {
                AiVariant::Barbarian => screen_barbarian_entries(subset),
                _ => subset,
            };
            if subset.is_empty() {
                debug!(%variant, "no records survive entry screening");
                continue;
            }
            results.push(self.process_variant(variant, subset)?);
        }
        Ok(results)
    }

    fn process_variant(
        &self,
        variant: AiVariant,
        records: Vec<GameRecord>,
    ) -> Result<VariantResult, ProcessorError> {
        let classifier = VariantClassifier::new(variant, &records)?;
        let extended: Vec<ExtendedRecord> =
            records.into_iter().map(ExtendedRecord::new).collect();

        let outcome = extend_evidence(extended, &classifier, self.propagation_mode)?;
        let aggregates = basic_aggregates(&outcome.records);
        let grouped_settings = group_settings(&outcome.records, &classifier);
        let ratings = rate_players(&grouped_settings, &aggregates, &self.completion);

        info!(
            %variant,
            records = outcome.records.len(),
            groups = grouped_settings.len(),
            rated_players = ratings.len(),
            skipped_sources = outcome.skipped_sources,
            passes = outcome.passes,
            "processed variant"
        );

        Ok(VariantResult {
            variant,
            grouped_settings,
            dropped_constants: classifier.dropped_constants().clone(),
            ratings,
            skipped_sources: outcome.skipped_sources,
            passes: outcome.passes,
        })
    }
}

/// Barbarian lobbies are only rated in their stock form: a bounded bot
/// ratio and no unit multiplier tampering. A multiplier key posted by any
/// lobby of the partition must read exactly 1 everywhere, nulls included.
fn screen_barbarian_entries(records: Vec<GameRecord>) -> Vec<GameRecord> {
    let before = records.len();

    let mut records: Vec<GameRecord> = records
        .into_iter()
        .filter(|record| {
            !matches!(
                record.setting(BARBARIAN_PER_PLAYER_KEY),
                Some(SettingValue::Float(ratio)) if !ratio.is_finite()
            )
        })
        .collect();

    let multiplier_keys: BTreeSet<String> = records
        .iter()
        .flat_map(|record| record.settings.keys())
        .filter(|name| name.starts_with("multiplier_"))
        .cloned()
        .collect();
    records.retain(|record| {
        multiplier_keys
            .iter()
            .all(|key| record.setting(key) == Some(&SettingValue::Float(1.0)))
    });

    if records.len() < before {
        debug!(
            dropped = before - records.len(),
            "screened modified Barbarian lobbies"
        );
    }
    records
}
