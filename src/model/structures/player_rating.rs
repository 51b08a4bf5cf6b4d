use crate::model::structures::game_record::PlayerId;

/// Per-player aggregates taken straight from the participant rows of the
/// variant's records, before any group evidence is considered.
#[derive(Debug, Clone, Default)]
pub struct PlayerAggregate {
    pub games_played: u32,
    pub win_rate: f64,
    /// Mean of damage/eco award hits over games with award data and more
    /// than one participant. None when no game qualifies.
    pub award_rate: Option<f64>,
    pub weighted_award_rate: f64,
}

/// The final rating row for one player of a variant.
#[derive(Debug, Clone)]
pub struct PlayerRating {
    pub player_id: PlayerId,
    pub award_rate: Option<f64>,
    pub weighted_award_rate: f64,
    pub difficulty_record: f64,
    pub difficulty_score: f64,
    pub difficulty_losers_sum: u32,
    pub setting_combinations: u32,
    pub games_played: u32,
    pub win_rate: f64,
    pub combined_rank: f64,
    pub pve_rating: f64,
}
