// Model constants
pub const WEIGHT_WEIGHTED_AWARD_RATE: f64 = 1.0;
pub const WEIGHT_DIFFICULTY_LOSERS_SUM: f64 = 0.4;
pub const WEIGHT_DIFFICULTY_SCORE: f64 = 0.25;
pub const WEIGHT_SETTING_COMBINATIONS: f64 = 0.01;
pub const WEIGHT_GAMES_PLAYED: f64 = 0.5;
pub const WEIGHT_WIN_RATE: f64 = 0.005;
/// Final ratings are min-max normalized onto this scale.
pub const RATING_SCALE: f64 = 30.0;
/// Games played is clipped to this before ranking.
pub const GAMES_RANK_CEILING: u32 = 20;
/// The difficulty score averages the player's best products over this many
/// setting combinations.
pub const TOP_SETTING_COMBINATIONS: usize = 5;
/// (lobby size, cumulative contribution units) anchors for the completion
/// model fit.
pub const DEFAULT_CALIBRATION: [(f64, f64); 4] =
    [(1.0, 1.0), (2.0, 4.0), (5.0, 11.0), (16.0, 40.0)];
/// Fixpoint propagation gives up after this many sweeps.
pub const MAX_FIXPOINT_PASSES: usize = 16;
/// `spawntimemult` flipped meaning on this day; older records store the
/// reciprocal. (year, month, day)
pub const SPAWN_TIME_FLIP_DATE: (i32, u32, u32) = (2024, 6, 5);
