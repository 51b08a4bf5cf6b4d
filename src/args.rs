use std::path::PathBuf;

use clap::Parser;

use crate::model::structures::propagation_mode::PropagationMode;

#[derive(Parser, Clone)]
#[command(
    display_name = "PvE Rating Processor",
    author = "PvE Rating",
    long_about = "Generates difficulty ratings for cooperative PvE lobbies from a replay snapshot"
)]
pub struct Args {
    /// Path to the replay snapshot, a JSON array of replay documents as
    /// served by the replay API
    #[arg(short, long, env = "PVE_SNAPSHOT", help = "Replay snapshot JSON file")]
    pub snapshot: PathBuf,

    /// Directory the grouped settings and rating exports are written to
    #[arg(
        short,
        long,
        env = "PVE_OUTPUT_DIR",
        default_value = "output",
        help = "Export output directory"
    )]
    pub output_dir: PathBuf,

    /// How far won/lost evidence propagates between dominated lobbies
    #[arg(long, value_enum, default_value_t = PropagationMode::SinglePass)]
    pub propagation_mode: PropagationMode,

    /// Completion model calibration points, formatted like so: 1:1,2:4,5:11,16:40
    #[arg(
        short,
        long,
        env = "PVE_CALIBRATION",
        help = "Override the lobby-size calibration points (size:units pairs)"
    )]
    pub calibration: Option<String>,

    /// Announce the finished run on RabbitMQ after the exports are written
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub amqp: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "RUST_LOG",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        help = "Sets the logging verbosity"
    )]
    pub log_level: String
}
