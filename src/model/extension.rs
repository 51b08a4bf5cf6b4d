use std::cmp::Ordering;
use std::collections::BTreeSet;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::model::classification::{
    ClassificationError, ComparisonKeys, KeyDef, VariantClassifier,
};
use crate::model::constants::MAX_FIXPOINT_PASSES;
use crate::model::structures::game_record::{ExtendedRecord, PlayerId};
use crate::model::structures::propagation_mode::PropagationMode;
use crate::model::structures::setting_value::SettingValue;
use crate::utils::progress_utils::progress_bar;

pub struct ExtensionOutcome {
    pub records: Vec<ExtendedRecord>,
    /// Records that could not act as merge sources because a compared key
    /// was null.
    pub skipped_sources: usize,
    pub passes: usize,
}

/// Records in different buckets can never be comparable: they differ on the
/// map or on some narrowed equal key.
#[derive(Debug, PartialEq, Eq, Hash)]
struct BucketKey<'a> {
    map_name: &'a str,
    equal: Vec<(&'static str, Option<&'a SettingValue>)>,
}

fn bucket_key<'a>(record: &'a ExtendedRecord, classifier: &VariantClassifier) -> BucketKey<'a> {
    let keys = classifier.comparison_keys(&record.record);
    BucketKey {
        map_name: &record.record.map_name,
        equal: keys
            .equal
            .iter()
            .map(|def| (def.name, record.record.setting(def.name)))
            .collect(),
    }
}

#[derive(Debug)]
struct Patch {
    target: usize,
    source: usize,
    win: bool,
}

/// A record with a null on any compared key cannot donate its outcome.
/// Null-comparable keys are exempt; their null is part of the identity.
fn source_blocked(record: &ExtendedRecord, keys: &ComparisonKeys<'_>) -> bool {
    keys.equal
        .iter()
        .chain(keys.higher.iter())
        .chain(keys.lower.iter())
        .any(|def| !def.null_comparable && record.record.setting(def.name).is_none())
}

/// Ordering of target against source on one key. `Ok(None)` means the pair
/// does not compare on this key at all (a null facing a value).
fn harder_cmp(
    def: &KeyDef,
    target: &ExtendedRecord,
    source: &ExtendedRecord,
) -> Result<Option<Ordering>, ClassificationError> {
    match (
        target.record.setting(def.name),
        source.record.setting(def.name),
    ) {
        (None, None) if def.null_comparable => Ok(Some(Ordering::Equal)),
        (Some(target_value), Some(source_value)) => {
            match target_value.partial_cmp(source_value) {
                Some(ord) => Ok(Some(ord)),
                None => Err(ClassificationError::IncomparableValues {
                    key: def.name.to_string(),
                    left: target_value.to_string(),
                    right: source_value.to_string(),
                }),
            }
        }
        _ => Ok(None),
    }
}

/// Whether the target lobby inherits the source's outcome. A win flows to
/// lobbies that are easier or equal on every axis, a loss to lobbies that
/// are harder or equal.
fn inherits_outcome(
    target: &ExtendedRecord,
    source: &ExtendedRecord,
    keys: &ComparisonKeys<'_>,
    win: bool,
) -> Result<bool, ClassificationError> {
    for def in &keys.higher {
        match harder_cmp(def, target, source)? {
            Some(ord) => {
                let ok = if win {
                    ord != Ordering::Greater
                } else {
                    ord != Ordering::Less
                };
                if !ok {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
    }
    for def in &keys.lower {
        match harder_cmp(def, target, source)? {
            Some(ord) => {
                let ok = if win {
                    ord != Ordering::Less
                } else {
                    ord != Ordering::Greater
                };
                if !ok {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
    }
    Ok(true)
}

fn collect_patches(
    records: &[ExtendedRecord],
    buckets: &[Vec<usize>],
    classifier: &VariantClassifier,
    bar: &indicatif::ProgressBar,
) -> Result<(Vec<Patch>, usize), ClassificationError> {
    let per_bucket: Vec<Result<(Vec<Patch>, usize), ClassificationError>> = buckets
        .par_iter()
        .map(|indices| {
            let mut patches = Vec::new();
            let mut skipped = 0usize;
            // all records of a bucket share their toggle values, so the
            // narrowed key set of the first record holds for every pair
            let keys = classifier.comparison_keys(&records[indices[0]].record);

            for &source_idx in indices {
                let source = &records[source_idx];
                if source_blocked(source, &keys) {
                    debug!(record = %source.record.id, "source skipped, null on a compared key");
                    skipped += 1;
                    bar.inc(1);
                    continue;
                }

                let win = source.record.human_win();
                for &target_idx in indices {
                    if target_idx == source_idx {
                        continue;
                    }
                    if inherits_outcome(&records[target_idx], source, &keys, win)? {
                        patches.push(Patch {
                            target: target_idx,
                            source: source_idx,
                            win,
                        });
                    }
                }
                bar.inc(1);
            }

            Ok((patches, skipped))
        })
        .collect();

    let mut patches = Vec::new();
    let mut skipped = 0;
    for outcome in per_bucket {
        let (bucket_patches, bucket_skipped) = outcome?;
        patches.extend(bucket_patches);
        skipped += bucket_skipped;
    }
    Ok((patches, skipped))
}

fn apply_patches(
    records: &mut [ExtendedRecord],
    patches: &[Patch],
    payload: &[(BTreeSet<PlayerId>, BTreeSet<PlayerId>)],
    source_ids: &[String],
) -> bool {
    let mut grew = false;

    for patch in patches {
        let (winners, players) = &payload[patch.source];
        let source_id = &source_ids[patch.source];
        let target = &mut records[patch.target];

        if patch.win {
            if !target.merged_win_replays.iter().any(|id| id == source_id) {
                target.merged_win_replays.push(source_id.clone());
                grew = true;
            }
            for &player in winners {
                grew |= target.winners_extended.insert(player);
            }
        } else if !target.merged_loss_replays.iter().any(|id| id == source_id) {
            target.merged_loss_replays.push(source_id.clone());
            grew = true;
        }
        for &player in players {
            grew |= target.players_extended.insert(player);
        }
    }

    grew
}

/// Propagates outcomes between dominated lobbies of one variant.
///
/// Comparisons always read the records' own settings, which never change,
/// so the comparable pairs are fixed up front. What a merge carries is the
/// evidence snapshot taken at the start of the pass; in single-pass mode
/// that is each record's own outcome.
pub fn extend_evidence(
    records: Vec<ExtendedRecord>,
    classifier: &VariantClassifier,
    mode: PropagationMode,
) -> Result<ExtensionOutcome, ClassificationError> {
    let mut records = records;

    let buckets: Vec<Vec<usize>> = {
        let mut map: IndexMap<BucketKey<'_>, Vec<usize>> = IndexMap::new();
        for (idx, record) in records.iter().enumerate() {
            map.entry(bucket_key(record, classifier))
                .or_default()
                .push(idx);
        }
        map.into_values().collect()
    };
    debug!(
        variant = %classifier.variant(),
        records = records.len(),
        buckets = buckets.len(),
        "bucketed corpus for evidence extension"
    );

    let source_ids: Vec<String> = records.iter().map(|r| r.record.id.clone()).collect();
    let mut skipped_sources = 0;
    let mut passes = 0;

    loop {
        passes += 1;
        let bar = progress_bar(
            records.len() as u64,
            format!("{} evidence pass {}", classifier.variant(), passes),
        );
        let (patches, skipped) = collect_patches(&records, &buckets, classifier, &bar)?;
        bar.finish();
        skipped_sources = skipped;

        let payload: Vec<(BTreeSet<PlayerId>, BTreeSet<PlayerId>)> = records
            .iter()
            .map(|r| (r.winners_extended.clone(), r.players_extended.clone()))
            .collect();
        let grew = apply_patches(&mut records, &patches, &payload, &source_ids);

        match mode {
            PropagationMode::SinglePass => break,
            PropagationMode::Fixpoint => {
                if !grew {
                    break;
                }
                if passes >= MAX_FIXPOINT_PASSES {
                    warn!(passes, "evidence still growing at the pass cap, stopping");
                    break;
                }
            }
        }
    }

    Ok(ExtensionOutcome {
        records,
        skipped_sources,
        passes,
    })
}
