use std::fmt::{Display, Formatter};

use clap::ValueEnum;

/// How far won/lost evidence propagates between dominated lobbies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PropagationMode {
    /// A single sweep where every merge reads the frozen pre-merge evidence.
    #[default]
    SinglePass,
    /// Repeated sweeps that feed extended evidence back in until no set
    /// grows any further.
    Fixpoint,
}

impl Display for PropagationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropagationMode::SinglePass => write!(f, "single-pass"),
            PropagationMode::Fixpoint => write!(f, "fixpoint"),
        }
    }
}
