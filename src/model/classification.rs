use std::collections::{BTreeMap, HashSet};

use lazy_static::lazy_static;
use thiserror::Error;
use tracing::debug;

use crate::model::structures::ai_variant::AiVariant;
use crate::model::structures::game_record::GameRecord;
use crate::model::structures::setting_value::SettingValue;

/// Difficulty axis of a classified key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Must match exactly between comparable lobbies.
    Equal,
    /// A higher value means a harder lobby.
    HigherHarder,
    /// A lower value means a harder lobby.
    LowerHarder,
}

/// Kind a key's raw value parses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Text,
    /// Closed label set, ordered easiest to hardest.
    Enum(&'static [&'static str]),
}

/// Default applied when a replay does not carry the key at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillDefault {
    Int(i64),
    Float(f64),
    Text(&'static str),
    Label(&'static str),
}

/// One entry of the declarative setting table.
#[derive(Debug, Clone, Copy)]
pub struct KeyDef {
    pub name: &'static str,
    pub kind: ValueKind,
    pub axis: Axis,
    /// When true, two nulls on this key still compare. A null against a
    /// value never does.
    pub null_comparable: bool,
    pub fill: Option<FillDefault>,
}

impl KeyDef {
    fn new(name: &'static str, kind: ValueKind, axis: Axis) -> Self {
        Self {
            name,
            kind,
            axis,
            null_comparable: false,
            fill: None,
        }
    }

    fn equal(name: &'static str, kind: ValueKind) -> Self {
        Self::new(name, kind, Axis::Equal)
    }

    fn higher(name: &'static str, kind: ValueKind) -> Self {
        Self::new(name, kind, Axis::HigherHarder)
    }

    fn lower(name: &'static str, kind: ValueKind) -> Self {
        Self::new(name, kind, Axis::LowerHarder)
    }

    fn with_fill(mut self, fill: FillDefault) -> Self {
        self.fill = Some(fill);
        self
    }

    fn null_comparable(mut self) -> Self {
        self.null_comparable = true;
        self
    }

    fn into_equal(mut self) -> Self {
        self.axis = Axis::Equal;
        self
    }
}

pub const ENABLED_STATES: &[&str] = &["disabled", "enabled"];
pub const COM_RESPAWN_STATES: &[&str] = &["disabled", "team", "all"];
pub const HORDE_DIFFICULTIES: &[&str] = &["veryeasy", "easy", "normal", "hard", "veryhard", "epic"];
pub const NUTTYB_HP_TIERS: &[&str] = &["Epic", "Epic+", "Epic++", "Epicer+", "Epicer++", "Epicest"];

pub const NUTTYB_HP_KEY: &str = "nuttyb_hp";
pub const BARBARIAN_HANDICAP_KEY: &str = "Barbarian Handicap";
pub const BARBARIAN_PER_PLAYER_KEY: &str = "Barbarian Per Player";

lazy_static! {
    /// `tweakdefs1` payloads of the published NuttyB HP presets, easiest
    /// tier first. New community releases get appended to their tier.
    pub static ref NUTTYB_HP_TWEAKS: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("Epic", vec![
            "bG9jYWwgaHBNdWx0ID0gMS41",
            "bG9jYWwgaHBNdWx0ID0gMS41IC0tIGxlZ2FjeQ==",
        ]),
        ("Epic+", vec!["bG9jYWwgaHBNdWx0ID0gMg=="]),
        ("Epic++", vec!["bG9jYWwgaHBNdWx0ID0gMi41"]),
        ("Epicer+", vec![
            "bG9jYWwgaHBNdWx0ID0gMw==",
            "bG9jYWwgaHBNdWx0ID0gMyAtLSBsZWdhY3k=",
        ]),
        ("Epicer++", vec!["bG9jYWwgaHBNdWx0ID0gMy41"]),
        ("Epicest", vec!["bG9jYWwgaHBNdWx0ID0gNA=="]),
    ];
}

/// Tier label for a raw `tweakdefs1` payload, if it is a known NuttyB HP
/// preset.
pub fn nuttyb_hp_tier(tweakdefs1: &str) -> Option<&'static str> {
    NUTTYB_HP_TWEAKS
        .iter()
        .find(|(_, payloads)| payloads.iter().any(|payload| *payload == tweakdefs1))
        .map(|(tier, _)| *tier)
}

/// Ordinal value for `label` within an ordered label set.
pub fn ordinal_for(labels: &'static [&'static str], label: &str) -> Option<SettingValue> {
    labels
        .iter()
        .position(|candidate| *candidate == label)
        .map(|rank| SettingValue::Ordinal(rank as u8, labels[rank]))
}

/// When the toggle holds its disabled value, every key whose name contains
/// the fragment stops mattering for comparability. The toggle itself keeps
/// comparing.
#[derive(Debug, Clone, Copy)]
pub struct ConditionalRule {
    pub toggle: &'static str,
    pub fragment: &'static str,
    pub disabled: DisabledValue,
}

#[derive(Debug, Clone, Copy)]
pub enum DisabledValue {
    IntZero,
    Label(&'static str),
}

impl ConditionalRule {
    pub fn is_disabled(&self, value: Option<&SettingValue>) -> bool {
        match (self.disabled, value) {
            (DisabledValue::IntZero, Some(SettingValue::Int(0))) => true,
            (DisabledValue::Label(label), Some(value)) => value.label() == Some(label),
            _ => false,
        }
    }
}

pub const CONDITIONAL_RULES: &[ConditionalRule] = &[
    ConditionalRule {
        toggle: "evocom",
        fragment: "evocom",
        disabled: DisabledValue::IntZero,
    },
    ConditionalRule {
        toggle: "commanderbuildersenabled",
        fragment: "commanderbuilders",
        disabled: DisabledValue::Label("disabled"),
    },
    ConditionalRule {
        toggle: "assistdronesenabled",
        fragment: "assistdrones",
        disabled: DisabledValue::Label("disabled"),
    },
];

/// Base table shared by the horde variants. Raptors and Scavengers each see
/// this minus the other variant's prefixed keys.
fn horde_table() -> Vec<KeyDef> {
    use FillDefault as F;
    use ValueKind as K;

    let mut table = vec![
        // start resources
        KeyDef::lower("startmetal", K::Int),
        KeyDef::lower("startmetalstorage", K::Int),
        KeyDef::lower("startenergy", K::Int),
        KeyDef::lower("startenergystorage", K::Int),
        // commander rules
        KeyDef::lower("comrespawn", K::Enum(COM_RESPAWN_STATES)).with_fill(F::Label("disabled")),
        KeyDef::lower("disable_fogofwar", K::Int),
        // evolving commanders; leveluprate is minutes per level
        KeyDef::equal("evocom", K::Int).with_fill(F::Int(0)),
        KeyDef::higher("evocomleveluprate", K::Float).with_fill(F::Float(5.0)),
        KeyDef::lower("evocomlevelcap", K::Int).with_fill(F::Int(10)),
        KeyDef::lower("evocomxpmultiplier", K::Float).with_fill(F::Float(1.0)),
        KeyDef::equal("evocomlevelupmethod", K::Text).with_fill(F::Text("dynamic")),
        // commander builders
        KeyDef::equal("commanderbuildersenabled", K::Enum(ENABLED_STATES))
            .with_fill(F::Label("disabled")),
        KeyDef::lower("commanderbuildersbuildpower", K::Int),
        KeyDef::lower("commanderbuildersrange", K::Int),
        // assist drones
        KeyDef::equal("assistdronesenabled", K::Enum(ENABLED_STATES))
            .with_fill(F::Label("disabled")),
        KeyDef::lower("assistdronescount", K::Int),
        KeyDef::lower("assistdronesair", K::Int),
        KeyDef::lower("assistdronesbuildpowermultiplier", K::Int),
        // horde pacing
        KeyDef::higher("raptor_difficulty", K::Enum(HORDE_DIFFICULTIES)),
        KeyDef::higher("scav_difficulty", K::Enum(HORDE_DIFFICULTIES)),
        KeyDef::higher("raptor_spawncountmult", K::Int),
        KeyDef::higher("scav_spawncountmult", K::Int),
        KeyDef::lower("raptor_spawntimemult", K::Float).with_fill(F::Float(1.0)),
        KeyDef::lower("scav_spawntimemult", K::Float).with_fill(F::Float(1.0)),
        KeyDef::lower("raptor_graceperiodmult", K::Float),
        KeyDef::lower("scav_graceperiodmult", K::Float).with_fill(F::Float(1.0)),
        KeyDef::lower("raptor_queentimemult", K::Float),
        KeyDef::lower("scav_bosstimemult", K::Float),
        KeyDef::higher("raptor_firstwavesboost", K::Float),
        KeyDef::equal("raptor_endless", K::Int),
        KeyDef::equal("scav_endless", K::Int),
        KeyDef::equal("raptor_raptorstart", K::Text).with_fill(F::Text("")),
        KeyDef::equal("scav_scavstart", K::Text).with_fill(F::Text("")),
        // NuttyB preset derived from tweakdefs1; absent on both sides still
        // compares
        KeyDef::higher(NUTTYB_HP_KEY, K::Enum(NUTTYB_HP_TIERS)).null_comparable(),
        // exact-match lobby rules
        KeyDef::equal("deathmode", K::Text).with_fill(F::Text("")),
        KeyDef::equal("scoremode", K::Text).with_fill(F::Text("")),
        KeyDef::equal("transportenemy", K::Text).with_fill(F::Text("")),
        KeyDef::equal("ruins", K::Text).with_fill(F::Text("")),
        KeyDef::equal("ruins_density", K::Text).with_fill(F::Text("")),
        KeyDef::equal("lootboxes", K::Text).with_fill(F::Text("")),
        KeyDef::equal("lootboxes_density", K::Text).with_fill(F::Text("")),
        KeyDef::equal("experimentalshields", K::Text).with_fill(F::Text("")),
        KeyDef::equal("experimentalextraunits", K::Int),
        KeyDef::equal("maxunits", K::Int),
        KeyDef::equal("norush", K::Int),
        KeyDef::equal("norushtimer", K::Int),
        KeyDef::equal("map_waterlevel", K::Int),
        KeyDef::equal("unit_market", K::Int),
    ];

    for name in [
        "unit_restrictions_noair",
        "unit_restrictions_noconverters",
        "unit_restrictions_noendgamelrpc",
        "unit_restrictions_noextractors",
        "unit_restrictions_nolrpc",
        "unit_restrictions_nonukes",
        "unit_restrictions_notacnukes",
        "unit_restrictions_notech2",
        "unit_restrictions_notech3",
    ] {
        table.push(KeyDef::equal(name, K::Int).with_fill(F::Int(0)));
    }

    // only the four commonly absent multipliers default to neutral; the
    // rest stay null when a lobby never posted them
    for name in [
        "multiplier_buildtimecost",
        "multiplier_energycost",
        "multiplier_maxdamage",
        "multiplier_metalcost",
    ] {
        table.push(KeyDef::equal(name, K::Float).with_fill(F::Float(1.0)));
    }
    for name in [
        "multiplier_builddistance",
        "multiplier_buildpower",
        "multiplier_energyconversion",
        "multiplier_energyproduction",
        "multiplier_losrange",
        "multiplier_maxvelocity",
        "multiplier_metalextraction",
        "multiplier_radarrange",
        "multiplier_resourceincome",
        "multiplier_shieldpower",
        "multiplier_turnrate",
        "multiplier_weapondamage",
        "multiplier_weaponrange",
    ] {
        table.push(KeyDef::equal(name, K::Float));
    }

    for name in [
        "tweakunits",
        "tweakunits1",
        "tweakunits2",
        "tweakunits3",
        "tweakunits4",
        "tweakunits5",
        "tweakunits6",
        "tweakunits7",
        "tweakunits8",
        "tweakunits9",
        "tweakdefs",
        "tweakdefs1",
        "tweakdefs2",
        "tweakdefs3",
        "tweakdefs4",
        "tweakdefs5",
        "tweakdefs6",
        "tweakdefs7",
        "tweakdefs8",
        "tweakdefs9",
    ] {
        table.push(KeyDef::equal(name, K::Text).with_fill(F::Text("")));
    }

    table
}

/// Barbarian lobbies carry no horde keys. Difficulty against the bots is
/// the bot count per player and their handicap; respawn and fog keep their
/// axes, every other shared key must match exactly.
fn barbarian_table() -> Vec<KeyDef> {
    let mut table: Vec<KeyDef> = horde_table()
        .into_iter()
        .filter(|key| {
            !key.name.starts_with("raptor_")
                && !key.name.starts_with("scav_")
                && key.name != NUTTYB_HP_KEY
        })
        .map(|key| match key.name {
            "comrespawn" | "disable_fogofwar" => key,
            _ => key.into_equal(),
        })
        .collect();

    table.push(KeyDef::higher(BARBARIAN_PER_PLAYER_KEY, ValueKind::Float));
    table.push(KeyDef::higher(BARBARIAN_HANDICAP_KEY, ValueKind::Int));
    table
}

fn keys_for(variant: AiVariant) -> Vec<KeyDef> {
    match variant.foreign_prefix() {
        None => barbarian_table(),
        Some(prefix) => horde_table()
            .into_iter()
            .filter(|key| !key.name.starts_with(prefix))
            .collect(),
    }
}

lazy_static! {
    static ref BARBARIAN_KEYS: Vec<KeyDef> = keys_for(AiVariant::Barbarian);
    static ref RAPTORS_KEYS: Vec<KeyDef> = keys_for(AiVariant::Raptors);
    static ref SCAVENGERS_KEYS: Vec<KeyDef> = keys_for(AiVariant::Scavengers);
}

/// Declared keys for a variant, before any corpus-driven drops.
pub fn variant_keys(variant: AiVariant) -> &'static [KeyDef] {
    match variant {
        AiVariant::Barbarian => &BARBARIAN_KEYS,
        AiVariant::Raptors => &RAPTORS_KEYS,
        AiVariant::Scavengers => &SCAVENGERS_KEYS,
    }
}

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("setting {key} holds a {found} where {expected} was declared")]
    UnexpectedKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("setting {key} holds unknown label {label:?}")]
    UnknownLabel { key: String, label: String },
    #[error("setting {key} cannot rank {left} against {right}")]
    IncomparableValues {
        key: String,
        left: String,
        right: String,
    },
    #[error("setting {key} sits on an ordered axis but its kind only supports equality")]
    UnorderableAxis { key: &'static str },
}

fn validate(def: &KeyDef) -> Result<(), ClassificationError> {
    if def.axis != Axis::Equal && def.kind == ValueKind::Text {
        return Err(ClassificationError::UnorderableAxis { key: def.name });
    }
    Ok(())
}

/// Constants that are the engine default anyway get dropped without being
/// remembered for export.
fn silently_dropped(name: &str, value: &SettingValue) -> bool {
    (name.starts_with("multiplier_") && *value == SettingValue::Float(1.0))
        || (name.starts_with("tweak") && value.label() == Some(""))
}

/// The comparison axes that remain for one record after its toggles are
/// applied.
#[derive(Debug, Default)]
pub struct ComparisonKeys<'a> {
    pub equal: Vec<&'a KeyDef>,
    pub higher: Vec<&'a KeyDef>,
    pub lower: Vec<&'a KeyDef>,
}

/// Setting table of one variant, specialized to its record corpus. Keys
/// that never vary across the corpus are dropped up front; their values are
/// remembered so exports can still print the full lobby setup.
pub struct VariantClassifier {
    variant: AiVariant,
    keys: Vec<KeyDef>,
    dropped_constants: BTreeMap<String, SettingValue>,
}

impl VariantClassifier {
    pub fn new(variant: AiVariant, records: &[GameRecord]) -> Result<Self, ClassificationError> {
        let mut keys = Vec::new();
        let mut dropped_constants = BTreeMap::new();

        for def in variant_keys(variant) {
            validate(def)?;

            let mut observed: HashSet<Option<&SettingValue>> = HashSet::new();
            for record in records {
                observed.insert(record.setting(def.name));
                if observed.len() > 1 {
                    break;
                }
            }

            if observed.len() > 1 {
                keys.push(*def);
                continue;
            }

            debug!(variant = %variant, key = def.name, "dropping constant key");
            if let Some(Some(value)) = observed.into_iter().next() {
                if !silently_dropped(def.name, value) {
                    dropped_constants.insert(def.name.to_string(), value.clone());
                }
            }
        }

        Ok(Self {
            variant,
            keys,
            dropped_constants,
        })
    }

    pub fn variant(&self) -> AiVariant {
        self.variant
    }

    /// Keys that survived the constant drop, in table order.
    pub fn keys(&self) -> &[KeyDef] {
        &self.keys
    }

    pub fn grouping_key_names(&self) -> Vec<&'static str> {
        self.keys.iter().map(|key| key.name).collect()
    }

    pub fn dropped_constants(&self) -> &BTreeMap<String, SettingValue> {
        &self.dropped_constants
    }

    pub fn comparison_keys(&self, record: &GameRecord) -> ComparisonKeys<'_> {
        let mut keys = ComparisonKeys::default();
        for def in &self.keys {
            if self.narrowed_out(def.name, record) {
                continue;
            }
            match def.axis {
                Axis::Equal => keys.equal.push(def),
                Axis::HigherHarder => keys.higher.push(def),
                Axis::LowerHarder => keys.lower.push(def),
            }
        }
        keys
    }

    fn narrowed_out(&self, name: &str, record: &GameRecord) -> bool {
        CONDITIONAL_RULES.iter().any(|rule| {
            name != rule.toggle
                && name.contains(rule.fragment)
                && rule.is_disabled(record.setting(rule.toggle))
        })
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use crate::model::classification::{
        nuttyb_hp_tier, ordinal_for, Axis, VariantClassifier, BARBARIAN_HANDICAP_KEY,
        HORDE_DIFFICULTIES,
    };
    use crate::model::structures::ai_variant::AiVariant;
    use crate::model::structures::setting_value::SettingValue;
    use crate::utils::test_utils::generate_record;

    #[test]
    fn test_all_tables_pass_validation() {
        for variant in AiVariant::iter() {
            assert!(VariantClassifier::new(variant, &[]).is_ok());
        }
    }

    #[test]
    fn test_constant_key_dropped_and_remembered() {
        let records = vec![
            generate_record(
                "a",
                AiVariant::Raptors,
                false,
                &[1],
                &[1],
                &[
                    ("startmetal", SettingValue::Int(1000)),
                    ("raptor_difficulty", SettingValue::Ordinal(5, "epic")),
                ],
            ),
            generate_record(
                "b",
                AiVariant::Raptors,
                false,
                &[1],
                &[1],
                &[
                    ("startmetal", SettingValue::Int(2000)),
                    ("raptor_difficulty", SettingValue::Ordinal(5, "epic")),
                ],
            ),
        ];

        let classifier = VariantClassifier::new(AiVariant::Raptors, &records).unwrap();
        let names = classifier.grouping_key_names();

        assert!(names.contains(&"startmetal"));
        assert!(!names.contains(&"raptor_difficulty"));
        assert_eq!(
            classifier.dropped_constants().get("raptor_difficulty"),
            Some(&SettingValue::Ordinal(5, "epic"))
        );
    }

    #[test]
    fn test_engine_default_constants_are_forgotten() {
        let records = vec![
            generate_record(
                "a",
                AiVariant::Raptors,
                false,
                &[1],
                &[1],
                &[
                    ("startmetal", SettingValue::Int(1000)),
                    ("multiplier_weapondamage", SettingValue::Float(1.0)),
                    ("tweakdefs1", SettingValue::Text(String::new())),
                ],
            ),
            generate_record(
                "b",
                AiVariant::Raptors,
                false,
                &[1],
                &[1],
                &[
                    ("startmetal", SettingValue::Int(2000)),
                    ("multiplier_weapondamage", SettingValue::Float(1.0)),
                    ("tweakdefs1", SettingValue::Text(String::new())),
                ],
            ),
        ];

        let classifier = VariantClassifier::new(AiVariant::Raptors, &records).unwrap();

        assert!(!classifier.dropped_constants().contains_key("multiplier_weapondamage"));
        assert!(!classifier.dropped_constants().contains_key("tweakdefs1"));
    }

    #[test]
    fn test_null_counts_as_a_distinct_value() {
        let records = vec![
            generate_record(
                "a",
                AiVariant::Raptors,
                false,
                &[1],
                &[1],
                &[("startmetal", SettingValue::Int(1000))],
            ),
            generate_record("b", AiVariant::Raptors, false, &[1], &[1], &[]),
        ];

        let classifier = VariantClassifier::new(AiVariant::Raptors, &records).unwrap();
        assert!(classifier.grouping_key_names().contains(&"startmetal"));
    }

    #[test]
    fn test_disabled_toggle_narrows_subsystem_but_not_itself() {
        let settings = |evocom: i64, cap: i64| {
            vec![
                ("evocom", SettingValue::Int(evocom)),
                ("evocomlevelcap", SettingValue::Int(cap)),
            ]
        };
        let records = vec![
            generate_record("a", AiVariant::Raptors, false, &[1], &[1], &settings(0, 10)),
            generate_record("b", AiVariant::Raptors, false, &[1], &[1], &settings(1, 20)),
        ];
        let classifier = VariantClassifier::new(AiVariant::Raptors, &records).unwrap();

        let narrowed = classifier.comparison_keys(&records[0]);
        assert!(narrowed.equal.iter().any(|key| key.name == "evocom"));
        assert!(!narrowed.lower.iter().any(|key| key.name == "evocomlevelcap"));

        let full = classifier.comparison_keys(&records[1]);
        assert!(full.lower.iter().any(|key| key.name == "evocomlevelcap"));
    }

    #[test]
    fn test_label_toggle_narrows_its_subsystem() {
        let settings = |state: &'static str, count: i64| {
            vec![
                (
                    "assistdronesenabled",
                    SettingValue::Ordinal(if state == "enabled" { 1 } else { 0 }, state),
                ),
                ("assistdronescount", SettingValue::Int(count)),
            ]
        };
        let records = vec![
            generate_record("a", AiVariant::Raptors, false, &[1], &[1], &settings("disabled", 0)),
            generate_record("b", AiVariant::Raptors, false, &[1], &[1], &settings("enabled", 8)),
        ];
        let classifier = VariantClassifier::new(AiVariant::Raptors, &records).unwrap();

        let narrowed = classifier.comparison_keys(&records[0]);
        assert!(!narrowed.lower.iter().any(|key| key.name == "assistdronescount"));
        assert!(narrowed
            .equal
            .iter()
            .any(|key| key.name == "assistdronesenabled"));
    }

    #[test]
    fn test_barbarian_axes() {
        let defs = super::variant_keys(AiVariant::Barbarian);

        assert!(defs.iter().all(|key| !key.name.starts_with("raptor_")));
        assert!(defs.iter().all(|key| !key.name.starts_with("scav_")));
        assert!(defs.iter().all(|key| key.name != super::NUTTYB_HP_KEY));

        let axis_of = |name: &str| defs.iter().find(|key| key.name == name).map(|key| key.axis);
        assert_eq!(axis_of("comrespawn"), Some(Axis::LowerHarder));
        assert_eq!(axis_of("startmetal"), Some(Axis::Equal));
        assert_eq!(axis_of(BARBARIAN_HANDICAP_KEY), Some(Axis::HigherHarder));
    }

    #[test]
    fn test_nuttyb_tier_lookup() {
        assert_eq!(nuttyb_hp_tier("bG9jYWwgaHBNdWx0ID0gNA=="), Some("Epicest"));
        assert_eq!(nuttyb_hp_tier("not a preset"), None);
    }

    #[test]
    fn test_ordinal_for_ranks_by_position() {
        assert_eq!(
            ordinal_for(HORDE_DIFFICULTIES, "veryhard"),
            Some(SettingValue::Ordinal(4, "veryhard"))
        );
        assert_eq!(ordinal_for(HORDE_DIFFICULTIES, "impossible"), None);
    }
}
