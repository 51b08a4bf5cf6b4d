pub mod ai_variant;
pub mod game_record;
pub mod grouped_setting;
pub mod player_rating;
pub mod propagation_mode;
pub mod setting_value;
