use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// A single typed lobby setting value.
///
/// Values only ever compare against values of the same kind. Ordering is
/// defined for `Int`, `Float` and `Ordinal`; free-form `Text` is equality
/// only, so a text key can never land on a harder/easier axis by accident.
#[derive(Debug, Clone)]
pub enum SettingValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// A label from a closed, difficulty-ordered label set. The rank is the
    /// label's position in the declared order.
    Ordinal(u8, &'static str),
}

/// Collapses `-0.0` into `0.0` so equality and hashing agree.
fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl SettingValue {
    /// Kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
            SettingValue::Text(_) => "text",
            SettingValue::Ordinal(_, _) => "ordinal",
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            SettingValue::Text(text) => Some(text),
            SettingValue::Ordinal(_, label) => Some(label),
            _ => None,
        }
    }
}

impl PartialEq for SettingValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SettingValue::Int(a), SettingValue::Int(b)) => a == b,
            (SettingValue::Float(a), SettingValue::Float(b)) => {
                canonical_bits(*a) == canonical_bits(*b)
            }
            (SettingValue::Text(a), SettingValue::Text(b)) => a == b,
            (SettingValue::Ordinal(a, _), SettingValue::Ordinal(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SettingValue {}

impl Hash for SettingValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            SettingValue::Int(a) => {
                0u8.hash(state);
                a.hash(state);
            }
            SettingValue::Float(a) => {
                1u8.hash(state);
                canonical_bits(*a).hash(state);
            }
            SettingValue::Text(a) => {
                2u8.hash(state);
                a.hash(state);
            }
            SettingValue::Ordinal(a, _) => {
                3u8.hash(state);
                a.hash(state);
            }
        }
    }
}

impl PartialOrd for SettingValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (SettingValue::Int(a), SettingValue::Int(b)) => Some(a.cmp(b)),
            (SettingValue::Float(a), SettingValue::Float(b)) => a.partial_cmp(b),
            (SettingValue::Ordinal(a, _), SettingValue::Ordinal(b, _)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Int(a) => write!(f, "{}", a),
            SettingValue::Float(a) => write!(f, "{}", a),
            SettingValue::Text(a) => write!(f, "{}", a),
            SettingValue::Ordinal(_, label) => write!(f, "{}", label),
        }
    }
}
