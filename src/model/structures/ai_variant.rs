use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// The cooperative AI opponents a lobby can be played against. Every rated
/// replay contains exactly one of these.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, EnumIter, Deserialize, Serialize, PartialOrd, Ord)]
pub enum AiVariant {
    Barbarian,
    Raptors,
    Scavengers,
}

impl AiVariant {
    /// Short name the replay exporter uses for this AI in `AllyTeams[].AIs`.
    pub fn ai_name(&self) -> &'static str {
        match self {
            AiVariant::Barbarian => "BARb",
            AiVariant::Raptors => "RaptorsAI",
            AiVariant::Scavengers => "ScavengersAI",
        }
    }

    /// Prefix of the setting keys that belong to the *other* horde variant
    /// and must not be classified for this one. Barbarian lobbies carry no
    /// horde keys at all, so there is nothing to exclude.
    pub fn foreign_prefix(&self) -> Option<&'static str> {
        match self {
            AiVariant::Barbarian => None,
            AiVariant::Raptors => Some("scav_"),
            AiVariant::Scavengers => Some("raptor_"),
        }
    }
}

impl Display for AiVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AiVariant::Barbarian => write!(f, "Barbarian"),
            AiVariant::Raptors => write!(f, "Raptors"),
            AiVariant::Scavengers => write!(f, "Scavengers"),
        }
    }
}

impl TryFrom<&str> for AiVariant {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "BARb" => Ok(AiVariant::Barbarian),
            "RaptorsAI" => Ok(AiVariant::Raptors),
            "ScavengersAI" => Ok(AiVariant::Scavengers),
            _ => Err(()),
        }
    }
}
